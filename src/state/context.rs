//! One execution context's view of the timer
//!
//! A context (the foreground terminal, the status-card server) keeps an
//! in-memory copy of the record and, while the timer runs, a local
//! countdown. Both are disposable: the store is the ground truth and
//! [`TimerContext::reconcile`] rebuilds local state from it.

use std::{
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use chrono::{DateTime, Utc};
use tokio::{sync::watch, task::JoinHandle};
use tracing::{debug, info};

use super::{record::TimerRecord, Sound};
use crate::{
    commands::{self, TimerCommand},
    error::Result,
    services::Services,
    tasks::countdown::countdown_task,
};

/// Countdown cadence
pub const TICK_INTERVAL: Duration = Duration::from_millis(100);

/// Wait after reaching zero before expiring, to absorb clock skew against
/// the persisted `end_at`
pub const EXPIRY_GRACE: Duration = Duration::from_millis(250);

/// How long the completed card stays up
pub const TEARDOWN_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct ContextSettings {
    pub tick: Duration,
    pub grace: Duration,
    pub teardown_delay: Duration,
    /// Whether this context plays the completion sound
    pub play_sound: bool,
}

impl Default for ContextSettings {
    fn default() -> Self {
        Self {
            tick: TICK_INTERVAL,
            grace: EXPIRY_GRACE,
            teardown_delay: TEARDOWN_DELAY,
            play_sound: true,
        }
    }
}

struct CountdownHandle {
    epoch: u64,
    task: JoinHandle<()>,
}

pub struct TimerContext {
    timer_id: String,
    services: Arc<Services>,
    settings: ContextSettings,
    record: Mutex<TimerRecord>,
    countdown: Mutex<Option<CountdownHandle>>,
    /// Bumped whenever a countdown starts or stops; stale tasks compare
    /// against it and back off
    countdown_epoch: AtomicU64,
    pub(super) suppress_sound: AtomicBool,
    /// Held for the duration of a finish sequence
    pub(super) finishing: Mutex<()>,
    remaining_tx: watch::Sender<Duration>,
}

impl TimerContext {
    /// Load (or lazily create) the record and adopt any live status card.
    /// Call [`reconcile`](Self::reconcile) before rendering.
    pub fn new(
        services: Arc<Services>,
        timer_id: impl Into<String>,
        settings: ContextSettings,
    ) -> Result<Arc<Self>> {
        let timer_id = timer_id.into();
        let record = services.store.load_or_create(&timer_id, services.clock.now())?;
        services.cards.restore(&timer_id);

        let (remaining_tx, _) = watch::channel(record.remaining(services.clock.now()));
        info!(
            "Timer context ready for '{}' (total {}s)",
            timer_id,
            record.total.as_secs()
        );

        Ok(Arc::new(Self {
            timer_id,
            services,
            settings,
            record: Mutex::new(record),
            countdown: Mutex::new(None),
            countdown_epoch: AtomicU64::new(0),
            suppress_sound: AtomicBool::new(false),
            finishing: Mutex::new(()),
            remaining_tx,
        }))
    }

    pub fn timer_id(&self) -> &str {
        &self.timer_id
    }

    pub fn services(&self) -> &Arc<Services> {
        &self.services
    }

    pub fn settings(&self) -> &ContextSettings {
        &self.settings
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.services.clock.now()
    }

    /// In-memory copy of the record as of the last read or write
    pub fn record(&self) -> TimerRecord {
        self.record
            .lock()
            .map(|r| r.clone())
            .unwrap_or_else(|e| e.into_inner().clone())
    }

    /// Remaining time derived from the in-memory record and the clock
    pub fn remaining(&self) -> Duration {
        self.record().remaining(self.now())
    }

    /// Live remaining time, republished on every countdown tick
    pub fn subscribe_remaining(&self) -> watch::Receiver<Duration> {
        self.remaining_tx.subscribe()
    }

    pub fn has_countdown(&self) -> bool {
        self.countdown.lock().map(|c| c.is_some()).unwrap_or(false)
    }

    /// Start (or resume) the timer from this context
    pub fn start(self: &Arc<Self>) -> Result<TimerRecord> {
        let record = TimerCommand::Resume.perform(&self.services, &self.timer_id)?;
        self.reconcile()?;
        Ok(record)
    }

    pub fn pause(self: &Arc<Self>) -> Result<TimerRecord> {
        let record = TimerCommand::Pause.perform(&self.services, &self.timer_id)?;
        self.reconcile()?;
        Ok(record)
    }

    pub fn reset(self: &Arc<Self>) -> Result<TimerRecord> {
        let record = TimerCommand::Cancel.perform(&self.services, &self.timer_id)?;
        self.reconcile()?;
        Ok(record)
    }

    pub fn set_duration(&self, duration: Duration, sound: Option<Sound>) -> Result<TimerRecord> {
        let record = commands::set_duration(&self.services, &self.timer_id, duration, sound)?;
        self.adopt(record.clone());
        Ok(record)
    }

    pub fn set_sound(&self, sound: Sound) -> Result<TimerRecord> {
        let record = commands::set_sound(&self.services, &self.timer_id, sound)?;
        self.adopt(record.clone());
        Ok(record)
    }

    /// Replace the in-memory copy and publish its remaining time
    pub(crate) fn adopt(&self, record: TimerRecord) {
        let remaining = record.remaining(self.now());
        match self.record.lock() {
            Ok(mut current) => *current = record,
            Err(e) => *e.into_inner() = record,
        }
        self.publish_remaining(remaining);
    }

    pub(crate) fn publish_remaining(&self, remaining: Duration) {
        self.remaining_tx.send_replace(remaining);
    }

    /// Replace any running countdown with a fresh one
    pub(crate) fn start_countdown(self: &Arc<Self>) {
        self.stop_countdown();
        let epoch = self.countdown_epoch.fetch_add(1, Ordering::SeqCst) + 1;
        let task = tokio::spawn(countdown_task(Arc::downgrade(self), epoch));
        if let Ok(mut countdown) = self.countdown.lock() {
            *countdown = Some(CountdownHandle { epoch, task });
        }
        debug!("Countdown {} started", epoch);
    }

    /// Stop ticking now. Pending grace-period completions of the stopped
    /// countdown become no-ops. Returns whether a countdown was running.
    pub(crate) fn stop_countdown(&self) -> bool {
        self.countdown_epoch.fetch_add(1, Ordering::SeqCst);
        let handle = self.countdown.lock().ok().and_then(|mut c| c.take());
        match handle {
            Some(handle) => {
                handle.task.abort();
                debug!("Countdown {} stopped", handle.epoch);
                true
            }
            None => false,
        }
    }

    pub(crate) fn is_current_countdown(&self, epoch: u64) -> bool {
        self.countdown_epoch.load(Ordering::SeqCst) == epoch
    }

    /// Drop the handle of a countdown that ended on its own
    pub(crate) fn release_countdown(&self, epoch: u64) {
        if let Ok(mut countdown) = self.countdown.lock() {
            if countdown.as_ref().is_some_and(|c| c.epoch == epoch) {
                *countdown = None;
            }
        }
    }
}

impl Drop for TimerContext {
    fn drop(&mut self) {
        if let Ok(mut countdown) = self.countdown.lock() {
            if let Some(handle) = countdown.take() {
                handle.task.abort();
            }
        }
    }
}
