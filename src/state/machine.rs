//! Timer state machine
//!
//! Pure transitions over a [`TimerRecord`]. Nothing here touches the store,
//! the status card or the clock; callers pass `now` in and persist the result.
//! A transition that returns an error leaves the record exactly as it was.
//!
//! ```text
//! Idle --start--> Running --pause--> Paused --resume--> Running
//!   ^                |                  |
//!   |              expire             reset
//!   +----------------+------------------+
//! ```

use std::time::Duration;

use chrono::{DateTime, SubsecRound, Utc};

use super::record::{Sound, TimerPhase, TimerRecord};
use crate::error::{TimerError, TransitionError};

/// Longest configurable run, 99:59:59
pub const MAX_DURATION: Duration = Duration::from_secs(99 * 3600 + 59 * 60 + 59);

/// How a start was classified
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartKind {
    /// Full duration remaining
    Fresh,
    /// Continuing from a paused remainder
    Resumed,
}

/// Start (or resume) the countdown. Valid from `Idle` and `Paused`.
pub fn start(
    record: &mut TimerRecord,
    now: DateTime<Utc>,
) -> Result<StartKind, TransitionError> {
    let remaining = match record.phase {
        TimerPhase::Running { .. } => return Err(TransitionError::AlreadyRunning),
        TimerPhase::Paused { remaining } => remaining,
    };

    let (kind, length) = if remaining == record.total {
        (StartKind::Fresh, record.total)
    } else {
        (StartKind::Resumed, remaining)
    };

    // Millisecond precision, as persisted
    let now = now.trunc_subsecs(3);
    record.phase = TimerPhase::Running {
        end_at: now + to_chrono(length),
    };
    record.started_at = Some(now);
    Ok(kind)
}

/// Resume from pause. Same rules as [`start`], kept separate so callers
/// state their intent.
pub fn resume(
    record: &mut TimerRecord,
    now: DateTime<Utc>,
) -> Result<StartKind, TransitionError> {
    start(record, now)
}

/// Freeze the remaining time. Valid only while running.
pub fn pause(record: &mut TimerRecord, now: DateTime<Utc>) -> Result<Duration, TransitionError> {
    match record.phase {
        TimerPhase::Running { .. } => {
            let remaining = Duration::from_millis(record.remaining(now).as_millis() as u64);
            record.phase = TimerPhase::Paused { remaining };
            Ok(remaining)
        }
        TimerPhase::Paused { .. } => Err(TransitionError::AlreadyPaused),
    }
}

/// Return to the ground state. Rejected when already idle.
pub fn reset(record: &mut TimerRecord) -> Result<(), TransitionError> {
    if record.is_idle() {
        return Err(TransitionError::AlreadyReset);
    }
    rearm(record);
    Ok(())
}

/// Complete a run whose time is up and re-arm for the next use.
///
/// Accepts a running record past its `end_at`, or a paused record with
/// nothing left.
pub fn expire(record: &mut TimerRecord, now: DateTime<Utc>) -> Result<(), TransitionError> {
    if !record.remaining(now).is_zero() {
        return Err(TransitionError::NotExpired);
    }
    rearm(record);
    Ok(())
}

/// Configure a new length (and sound). Only while paused.
pub fn set_duration(
    record: &mut TimerRecord,
    duration: Duration,
    sound: Option<Sound>,
) -> Result<(), TimerError> {
    if !record.is_paused() {
        return Err(TransitionError::AlreadyRunning.into());
    }
    if duration.is_zero() || duration > MAX_DURATION {
        return Err(TimerError::InvalidDuration);
    }
    record.total = duration;
    record.phase = TimerPhase::Paused {
        remaining: duration,
    };
    record.started_at = None;
    if let Some(sound) = sound {
        record.sound = Some(sound);
    }
    Ok(())
}

pub fn set_sound(record: &mut TimerRecord, sound: Sound) {
    record.sound = Some(sound);
}

fn rearm(record: &mut TimerRecord) {
    record.phase = TimerPhase::Paused {
        remaining: record.total,
    };
    record.started_at = None;
}

pub(crate) fn to_chrono(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::record::{TimerStatus, DEFAULT_TIMER_ID};
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 20, 9, 0, 0).unwrap()
    }

    fn secs(n: i64) -> chrono::Duration {
        chrono::Duration::seconds(n)
    }

    fn fresh() -> TimerRecord {
        TimerRecord::idle(DEFAULT_TIMER_ID, Duration::from_secs(60))
    }

    fn assert_phase_invariant(record: &TimerRecord) {
        assert_eq!(record.is_paused(), record.end_at().is_none());
    }

    #[test]
    fn test_fsm_transition_idle_to_running() {
        let mut record = fresh();
        assert_eq!(start(&mut record, t0()), Ok(StartKind::Fresh));
        assert_eq!(record.end_at(), Some(t0() + secs(60)));
        assert_eq!(record.started_at, Some(t0()));
        assert!(!record.is_paused());
    }

    #[test]
    fn test_fsm_transition_running_to_paused() {
        let mut record = fresh();
        start(&mut record, t0()).unwrap();
        let remaining = pause(&mut record, t0() + secs(15)).unwrap();

        assert_eq!(remaining, Duration::from_secs(45));
        assert_eq!(record.phase, TimerPhase::Paused { remaining });
        assert_eq!(record.started_at, Some(t0()));
        assert_eq!(record.status(t0()), TimerStatus::Paused);
    }

    #[test]
    fn test_fsm_transition_paused_to_running_uses_remaining() {
        let mut record = fresh();
        start(&mut record, t0()).unwrap();
        pause(&mut record, t0() + secs(20)).unwrap();

        let later = t0() + secs(100);
        assert_eq!(resume(&mut record, later), Ok(StartKind::Resumed));
        assert_eq!(record.end_at(), Some(later + secs(40)));
    }

    #[test]
    fn test_fsm_invalid_transition_running_to_running() {
        let mut record = fresh();
        start(&mut record, t0()).unwrap();
        let before = record.clone();

        assert_eq!(start(&mut record, t0() + secs(1)), Err(TransitionError::AlreadyRunning));
        assert_eq!(resume(&mut record, t0() + secs(1)), Err(TransitionError::AlreadyRunning));
        assert_eq!(record, before);
    }

    #[test]
    fn test_fsm_invalid_transition_paused_to_paused() {
        let mut record = fresh();
        let before = record.clone();
        assert_eq!(pause(&mut record, t0()), Err(TransitionError::AlreadyPaused));
        assert_eq!(record, before);
    }

    #[test]
    fn test_reset_when_idle_is_rejected_and_record_unchanged() {
        let mut record = fresh();
        let before = record.clone();
        assert_eq!(reset(&mut record), Err(TransitionError::AlreadyReset));
        assert_eq!(record, before);
    }

    #[test]
    fn test_reset_from_running_and_paused() {
        let mut record = fresh();
        start(&mut record, t0()).unwrap();
        reset(&mut record).unwrap();
        assert!(record.is_idle());
        assert!(record.started_at.is_none());

        start(&mut record, t0()).unwrap();
        pause(&mut record, t0() + secs(5)).unwrap();
        reset(&mut record).unwrap();
        assert!(record.is_idle());
    }

    #[test]
    fn test_pause_after_end_clamps_to_zero() {
        let mut record = fresh();
        start(&mut record, t0()).unwrap();
        let remaining = pause(&mut record, t0() + secs(90)).unwrap();
        assert_eq!(remaining, Duration::ZERO);
        assert_eq!(record.status(t0()), TimerStatus::Finished);
    }

    #[test]
    fn test_expire_requires_elapsed_time() {
        let mut record = fresh();
        start(&mut record, t0()).unwrap();
        assert_eq!(expire(&mut record, t0() + secs(30)), Err(TransitionError::NotExpired));

        expire(&mut record, t0() + secs(61)).unwrap();
        assert!(record.is_idle());
        assert!(record.started_at.is_none());
        assert!(record.end_at().is_none());
    }

    #[test]
    fn test_set_duration_only_while_paused() {
        let mut record = fresh();
        set_duration(&mut record, Duration::from_secs(90), Some(Sound::Gong)).unwrap();
        assert_eq!(record.total, Duration::from_secs(90));
        assert!(record.is_idle());
        assert_eq!(record.sound, Some(Sound::Gong));

        assert!(matches!(
            set_duration(&mut record, Duration::ZERO, None),
            Err(TimerError::InvalidDuration)
        ));
        assert!(matches!(
            set_duration(&mut record, MAX_DURATION + Duration::from_secs(1), None),
            Err(TimerError::InvalidDuration)
        ));

        start(&mut record, t0()).unwrap();
        assert!(matches!(
            set_duration(&mut record, Duration::from_secs(5), None),
            Err(TimerError::InvalidTransition(TransitionError::AlreadyRunning))
        ));
    }

    #[test]
    fn test_instants_are_kept_to_millisecond_precision() {
        let mut record = fresh();
        let now = t0() + chrono::Duration::nanoseconds(1_234_567);
        start(&mut record, now).unwrap();
        assert_eq!(record.end_at(), Some(t0() + chrono::Duration::milliseconds(60_001)));

        let remaining = pause(&mut record, now + chrono::Duration::nanoseconds(500_000)).unwrap();
        assert_eq!(remaining.subsec_nanos() % 1_000_000, 0);
    }

    #[test]
    fn test_invariant_holds_across_transition_sequences() {
        // Every operation from every reachable state, two levels deep
        type Op = fn(&mut TimerRecord, DateTime<Utc>);
        let ops: [Op; 5] = [
            |r, now| {
                let _ = start(r, now);
            },
            |r, now| {
                let _ = pause(r, now);
            },
            |r, now| {
                let _ = resume(r, now);
            },
            |r, _| {
                let _ = reset(r);
            },
            |r, now| {
                let _ = expire(r, now);
            },
        ];

        for (i, first) in ops.iter().enumerate() {
            for (j, second) in ops.iter().enumerate() {
                for third in ops.iter() {
                    let mut record = fresh();
                    let mut now = t0();
                    for op in [first, second, third] {
                        now += secs(7 * (i as i64 + j as i64 + 1));
                        op(&mut record, now);
                        assert_phase_invariant(&record);
                        assert!(record.remaining(now) <= record.total);
                    }
                }
            }
        }
    }
}
