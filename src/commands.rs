//! Command actuators
//!
//! One-shot handlers behind the status card's buttons. Each one re-reads the
//! record, checks its precondition, applies a single transition, persists
//! it, brings the card and the notification along, and finally broadcasts
//! within its own process. Other processes find out on their next
//! reconciliation.

use std::{fmt, str::FromStr, time::Duration};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
    error::Result,
    services::{notifications::NOTIFICATION_TITLE, Services, TimerEvent},
    state::{
        machine::{self, StartKind},
        Sound, TimerRecord,
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerCommand {
    Pause,
    Resume,
    Cancel,
}

impl TimerCommand {
    pub fn name(&self) -> &'static str {
        match self {
            TimerCommand::Pause => "pause",
            TimerCommand::Resume => "resume",
            TimerCommand::Cancel => "cancel",
        }
    }

    /// Run the command against the persisted record and return the record
    /// as written. On error nothing is written.
    pub fn perform(self, services: &Services, timer_id: &str) -> Result<TimerRecord> {
        let now = services.clock.now();
        // A command can be the first access; its precondition still applies
        let mut record = services.store.load_or_create(timer_id, now)?;

        match self {
            TimerCommand::Pause => {
                let remaining = machine::pause(&mut record, now).inspect_err(|e| {
                    warn!("Pause command rejected: {}", e);
                })?;
                services.store.upsert(&record, now)?;
                services.notifier.cancel(timer_id);
                services.cards.pause(timer_id, remaining, record.total);
                info!("Pause command: {}s remaining", remaining.as_secs_f64());
            }
            TimerCommand::Resume => {
                let kind = machine::resume(&mut record, now).inspect_err(|e| {
                    warn!("Resume command rejected: {}", e);
                })?;
                services.store.upsert(&record, now)?;
                if let Some(end_at) = record.end_at() {
                    schedule_completion(services, &record, end_at, now);
                    services.cards.show_running(timer_id, end_at, record.total);
                    match kind {
                        StartKind::Fresh => info!("Resume command: started, ends at {}", end_at),
                        StartKind::Resumed => info!("Resume command: resumed, ends at {}", end_at),
                    }
                }
            }
            TimerCommand::Cancel => {
                machine::reset(&mut record).inspect_err(|e| {
                    warn!("Cancel command rejected: {}", e);
                })?;
                services.store.upsert(&record, now)?;
                services.notifier.cancel(timer_id);
                services.cards.end(timer_id);
                info!("Cancel command: reset to {}s", record.total.as_secs());
            }
        }

        services.broadcast(TimerEvent::StateChanged);
        Ok(record)
    }
}

impl fmt::Display for TimerCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TimerCommand {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pause" => Ok(TimerCommand::Pause),
            "resume" | "start" => Ok(TimerCommand::Resume),
            "cancel" | "reset" => Ok(TimerCommand::Cancel),
            other => Err(format!("unknown command '{}'", other)),
        }
    }
}

/// Change the configured length and sound. Only while paused; any live
/// card is ended since it describes the old length.
pub fn set_duration(
    services: &Services,
    timer_id: &str,
    duration: Duration,
    sound: Option<Sound>,
) -> Result<TimerRecord> {
    let now = services.clock.now();
    let mut record = services.store.load_or_create(timer_id, now)?;
    machine::set_duration(&mut record, duration, sound)?;
    services.store.upsert(&record, now)?;

    if services.cards.is_active(timer_id) {
        services.cards.end(timer_id);
    }
    info!(
        "Duration set to {}s with sound {}",
        duration.as_secs(),
        record.sound_or_default()
    );

    services.broadcast(TimerEvent::StateChanged);
    Ok(record)
}

/// Change only the completion sound
pub fn set_sound(services: &Services, timer_id: &str, sound: Sound) -> Result<TimerRecord> {
    let now = services.clock.now();
    let mut record = services.store.load_or_create(timer_id, now)?;
    machine::set_sound(&mut record, sound);
    services.store.upsert(&record, now)?;
    services.broadcast(TimerEvent::StateChanged);
    Ok(record)
}

/// Schedule the completion notification, if `end_at` is still ahead
pub(crate) fn schedule_completion(
    services: &Services,
    record: &TimerRecord,
    end_at: DateTime<Utc>,
    now: DateTime<Utc>,
) {
    match (end_at - now).to_std() {
        Ok(delay) if !delay.is_zero() => {
            let sound = record.sound.map(|s| s.file_name());
            services
                .notifier
                .schedule(&record.id, NOTIFICATION_TITLE, delay, sound.as_deref());
        }
        _ => info!("Skipped scheduling notification, end time already reached"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::{TimerError, TransitionError},
        services::{Clock, ManualClock, MemoryNotifier, MemorySoundPlayer, MemoryStore, MemorySurface},
        state::{TimerStatus, DEFAULT_TIMER_ID},
    };
    use chrono::TimeZone;
    use std::sync::Arc;

    struct Fixture {
        clock: ManualClock,
        surface: Arc<MemorySurface>,
        notifier: Arc<MemoryNotifier>,
        services: Services,
    }

    fn fixture() -> Fixture {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2025, 5, 20, 9, 0, 0).unwrap());
        let surface = Arc::new(MemorySurface::new());
        let notifier = Arc::new(MemoryNotifier::new());
        let services = Services::new(
            Arc::new(MemoryStore::new()),
            Arc::new(clock.clone()),
            surface.clone(),
            notifier.clone(),
            Arc::new(MemorySoundPlayer::new()),
        );
        Fixture {
            clock,
            surface,
            notifier,
            services,
        }
    }

    #[test]
    fn test_first_command_creates_default_record() {
        let f = fixture();
        assert!(matches!(
            TimerCommand::Pause.perform(&f.services, DEFAULT_TIMER_ID),
            Err(TimerError::InvalidTransition(TransitionError::AlreadyPaused))
        ));
        let stored = f.services.store.fetch(DEFAULT_TIMER_ID).unwrap().unwrap();
        assert!(stored.is_idle());
        assert_eq!(f.surface.mutation_count(), 0);
    }

    #[test]
    fn test_cancel_on_fresh_store_is_already_reset() {
        let f = fixture();
        assert!(matches!(
            TimerCommand::Cancel.perform(&f.services, DEFAULT_TIMER_ID),
            Err(TimerError::InvalidTransition(TransitionError::AlreadyReset))
        ));
    }

    #[test]
    fn test_resume_on_fresh_store_starts_timer() {
        let f = fixture();
        let record = TimerCommand::Resume.perform(&f.services, DEFAULT_TIMER_ID).unwrap();
        assert_eq!(record.status(f.clock.now()), TimerStatus::Running);
        assert_eq!(record.remaining(f.clock.now()), Duration::from_secs(60));
        assert_eq!(f.surface.live_count(DEFAULT_TIMER_ID), 1);
    }

    #[test]
    fn test_resume_pause_cancel_cycle() {
        let f = fixture();
        f.services.store.load_or_create(DEFAULT_TIMER_ID, f.clock.now()).unwrap();
        let mut events = f.services.subscribe();

        let record = TimerCommand::Resume.perform(&f.services, DEFAULT_TIMER_ID).unwrap();
        assert_eq!(record.status(f.clock.now()), TimerStatus::Running);
        assert_eq!(f.surface.live_count(DEFAULT_TIMER_ID), 1);
        assert_eq!(
            f.notifier.pending(DEFAULT_TIMER_ID).map(|p| p.delay),
            Some(Duration::from_secs(60))
        );
        assert_eq!(events.try_recv().unwrap(), TimerEvent::StateChanged);

        f.clock.advance(Duration::from_secs(20));
        let record = TimerCommand::Pause.perform(&f.services, DEFAULT_TIMER_ID).unwrap();
        assert_eq!(record.remaining(f.clock.now()), Duration::from_secs(40));
        assert!(f.notifier.pending(DEFAULT_TIMER_ID).is_none());
        let card = f.surface.card(DEFAULT_TIMER_ID).unwrap();
        assert_eq!(card.content.adjusted_remaining, Some(Duration::from_secs(40)));

        let record = TimerCommand::Cancel.perform(&f.services, DEFAULT_TIMER_ID).unwrap();
        assert!(record.is_idle());
        assert_eq!(f.surface.live_count(DEFAULT_TIMER_ID), 0);
    }

    #[test]
    fn test_cancel_when_idle_fails_and_leaves_record() {
        let f = fixture();
        let before = f.services.store.load_or_create(DEFAULT_TIMER_ID, f.clock.now()).unwrap();

        let result = TimerCommand::Cancel.perform(&f.services, DEFAULT_TIMER_ID);
        assert!(matches!(
            result,
            Err(TimerError::InvalidTransition(TransitionError::AlreadyReset))
        ));
        assert_eq!(f.services.store.fetch(DEFAULT_TIMER_ID).unwrap(), Some(before));
        assert_eq!(f.notifier.call_count(), 0);
    }

    #[test]
    fn test_resume_while_running_fails() {
        let f = fixture();
        f.services.store.load_or_create(DEFAULT_TIMER_ID, f.clock.now()).unwrap();
        TimerCommand::Resume.perform(&f.services, DEFAULT_TIMER_ID).unwrap();

        let result = TimerCommand::Resume.perform(&f.services, DEFAULT_TIMER_ID);
        assert!(matches!(
            result,
            Err(TimerError::InvalidTransition(TransitionError::AlreadyRunning))
        ));
        assert_eq!(f.surface.request_count(), 1);
    }

    #[test]
    fn test_pause_while_paused_fails() {
        let f = fixture();
        f.services.store.load_or_create(DEFAULT_TIMER_ID, f.clock.now()).unwrap();
        assert!(matches!(
            TimerCommand::Pause.perform(&f.services, DEFAULT_TIMER_ID),
            Err(TimerError::InvalidTransition(TransitionError::AlreadyPaused))
        ));
    }

    #[test]
    fn test_set_duration_ends_live_card() {
        let f = fixture();
        f.services.store.load_or_create(DEFAULT_TIMER_ID, f.clock.now()).unwrap();
        TimerCommand::Resume.perform(&f.services, DEFAULT_TIMER_ID).unwrap();
        TimerCommand::Pause.perform(&f.services, DEFAULT_TIMER_ID).unwrap();

        let record =
            set_duration(&f.services, DEFAULT_TIMER_ID, Duration::from_secs(300), Some(Sound::Gong))
                .unwrap();
        assert!(record.is_idle());
        assert_eq!(record.total, Duration::from_secs(300));
        assert_eq!(f.surface.live_count(DEFAULT_TIMER_ID), 0);
    }

    #[test]
    fn test_command_parsing() {
        assert_eq!("start".parse::<TimerCommand>().unwrap(), TimerCommand::Resume);
        assert_eq!("Reset".parse::<TimerCommand>().unwrap(), TimerCommand::Cancel);
        assert!("stop".parse::<TimerCommand>().is_err());
    }
}
