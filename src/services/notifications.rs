//! Completion notifications
//!
//! Scheduling is best effort: nothing in the timer core waits for, or reads
//! back, the outcome.

use std::{
    collections::HashMap,
    process::Stdio,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
    time::Duration,
};

use chrono::Utc;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Title of the completion notification
pub const NOTIFICATION_TITLE: &str = "One Timer";

/// Body of the completion notification
pub const NOTIFICATION_BODY: &str = "Timer finished!";

pub trait Notifier: Send + Sync {
    fn schedule(&self, id: &str, title: &str, delay: Duration, sound: Option<&str>);
    fn cancel(&self, id: &str);
    fn cancel_all(&self);
}

/// Delivers notifications through systemd user timers running `notify-send`,
/// so they fire even after the scheduling process has exited.
#[derive(Debug, Clone)]
pub struct SystemdNotifier {
    unit_prefix: String,
}

impl SystemdNotifier {
    pub fn new() -> Self {
        Self {
            unit_prefix: "one-timer".to_string(),
        }
    }

    fn unit_name(&self, id: &str) -> String {
        format!("{}-{}-{}", self.unit_prefix, id, Utc::now().timestamp_millis())
    }

    fn unit_pattern(&self, id: Option<&str>) -> String {
        match id {
            Some(id) => format!("{}-{}-*.timer", self.unit_prefix, id),
            None => format!("{}-*.timer", self.unit_prefix),
        }
    }

    /// Start a command without waiting on it. The child outlives this
    /// process if it has to.
    fn spawn(&self, what: &'static str, program: &str, args: Vec<String>) {
        if tokio::runtime::Handle::try_current().is_err() {
            warn!("No runtime available, skipping {}", what);
            return;
        }

        debug!("Running {} {:?}", program, args);
        let child = Command::new(program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();

        match child {
            Ok(mut child) => {
                tokio::spawn(async move {
                    match child.wait().await {
                        Ok(status) if status.success() => debug!("{} succeeded", what),
                        Ok(status) => warn!("{} failed ({})", what, status),
                        Err(e) => warn!("Failed to wait for {}: {}", what, e),
                    }
                });
            }
            Err(e) => warn!("Failed to execute {}: {}", program, e),
        }
    }
}

impl Default for SystemdNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier for SystemdNotifier {
    fn schedule(&self, id: &str, title: &str, delay: Duration, sound: Option<&str>) {
        let secs = delay.as_secs_f64().ceil().max(1.0) as u64;
        let mut args = vec![
            "--user".to_string(),
            format!("--on-active={}s", secs),
            format!("--unit={}", self.unit_name(id)),
            "--timer-property=AccuracySec=100ms".to_string(),
            "notify-send".to_string(),
            "--urgency=critical".to_string(),
        ];
        if let Some(sound) = sound {
            args.push(format!("--hint=string:sound-name:{}", sound.trim_end_matches(".wav")));
        }
        args.push(title.to_string());
        args.push(NOTIFICATION_BODY.to_string());

        info!("Scheduling notification '{}' in {}s", id, secs);
        self.spawn("notification schedule", "systemd-run", args);
    }

    fn cancel(&self, id: &str) {
        info!("Cancelling notification '{}'", id);
        self.spawn(
            "notification cancel",
            "systemctl",
            vec!["--user".to_string(), "stop".to_string(), self.unit_pattern(Some(id))],
        );
    }

    fn cancel_all(&self) {
        info!("Cancelling all notifications");
        self.spawn(
            "notification cancel-all",
            "systemctl",
            vec!["--user".to_string(), "stop".to_string(), self.unit_pattern(None)],
        );
    }
}

/// Only logs. Used where no notification daemon is available.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn schedule(&self, id: &str, title: &str, delay: Duration, sound: Option<&str>) {
        info!(
            "Notification '{}' ({}) would fire in {:.1}s with sound {:?}",
            id,
            title,
            delay.as_secs_f64(),
            sound
        );
    }

    fn cancel(&self, id: &str) {
        info!("Notification '{}' cancelled", id);
    }

    fn cancel_all(&self) {
        info!("All notifications cancelled");
    }
}

/// Drops every request
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledNotifier;

impl Notifier for DisabledNotifier {
    fn schedule(&self, id: &str, _title: &str, _delay: Duration, _sound: Option<&str>) {
        debug!("Notifications disabled, not scheduling '{}'", id);
    }

    fn cancel(&self, _id: &str) {}

    fn cancel_all(&self) {}
}

/// A notification waiting to fire
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingNotification {
    pub title: String,
    pub delay: Duration,
    pub sound: Option<String>,
}

/// Keeps pending notifications in memory and counts calls
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    pending: Mutex<HashMap<String, PendingNotification>>,
    calls: AtomicUsize,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self, id: &str) -> Option<PendingNotification> {
        self.pending.lock().ok()?.get(id).cloned()
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Notifier for MemoryNotifier {
    fn schedule(&self, id: &str, title: &str, delay: Duration, sound: Option<&str>) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut pending) = self.pending.lock() {
            pending.insert(
                id.to_string(),
                PendingNotification {
                    title: title.to_string(),
                    delay,
                    sound: sound.map(str::to_string),
                },
            );
        }
    }

    fn cancel(&self, id: &str) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut pending) = self.pending.lock() {
            pending.remove(id);
        }
    }

    fn cancel_all(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut pending) = self.pending.lock() {
            pending.clear();
        }
    }
}
