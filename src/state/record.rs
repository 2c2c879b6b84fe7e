//! Persisted timer record and derived status

use std::{fmt, str::FromStr, time::Duration};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identity of the single persisted timer
pub const DEFAULT_TIMER_ID: &str = "single-timer";

/// Length of a freshly created timer
pub const DEFAULT_DURATION: Duration = Duration::from_secs(60);

/// Completion sound choices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sound {
    #[default]
    Chord,
    Gong,
}

impl Sound {
    pub const ALL: [Sound; 2] = [Sound::Chord, Sound::Gong];

    pub fn name(&self) -> &'static str {
        match self {
            Sound::Chord => "chord",
            Sound::Gong => "gong",
        }
    }

    /// File name of the bundled sound
    pub fn file_name(&self) -> String {
        format!("{}.wav", self.name())
    }
}

impl fmt::Display for Sound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Sound {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().trim_end_matches(".wav").to_lowercase();
        Sound::ALL
            .into_iter()
            .find(|sound| sound.name() == name)
            .ok_or_else(|| format!("unknown sound '{}'", s))
    }
}

/// Running or paused. The only place `end_at` and the authoritative
/// remaining duration live, so they can never disagree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum TimerPhase {
    Running { end_at: DateTime<Utc> },
    Paused { remaining: Duration },
}

/// Coarse classification of a record at a given instant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerStatus {
    /// Paused with the full duration remaining
    Idle,
    /// Paused part-way through
    Paused,
    /// Counting down towards `end_at`
    Running,
    /// No time left but not yet auto-reset
    Finished,
}

/// The single persisted timer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerRecord {
    pub id: String,
    pub total: Duration,
    #[serde(flatten)]
    pub phase: TimerPhase,
    /// Informational only
    pub started_at: Option<DateTime<Utc>>,
    pub sound: Option<Sound>,
}

impl TimerRecord {
    /// Ground state: full duration remaining, paused
    pub fn idle(id: impl Into<String>, total: Duration) -> Self {
        Self {
            id: id.into(),
            total,
            phase: TimerPhase::Paused { remaining: total },
            started_at: None,
            sound: Some(Sound::default()),
        }
    }

    pub fn is_paused(&self) -> bool {
        matches!(self.phase, TimerPhase::Paused { .. })
    }

    pub fn end_at(&self) -> Option<DateTime<Utc>> {
        match self.phase {
            TimerPhase::Running { end_at } => Some(end_at),
            TimerPhase::Paused { .. } => None,
        }
    }

    /// Authoritative remaining time: `end_at - now` clamped at zero while
    /// running, the stored value while paused.
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        match self.phase {
            TimerPhase::Running { end_at } => remaining_until(end_at, now),
            TimerPhase::Paused { remaining } => remaining,
        }
    }

    /// `1 - remaining / total`, zero for an empty timer
    pub fn progress(&self, now: DateTime<Utc>) -> f64 {
        if self.total.is_zero() {
            return 0.0;
        }
        let ratio = self.remaining(now).as_secs_f64() / self.total.as_secs_f64();
        (1.0 - ratio).clamp(0.0, 1.0)
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.phase, TimerPhase::Paused { remaining } if remaining == self.total)
    }

    pub fn status(&self, now: DateTime<Utc>) -> TimerStatus {
        match self.phase {
            TimerPhase::Running { .. } if self.remaining(now).is_zero() => TimerStatus::Finished,
            TimerPhase::Running { .. } => TimerStatus::Running,
            TimerPhase::Paused { remaining } if remaining.is_zero() => TimerStatus::Finished,
            TimerPhase::Paused { remaining } if remaining == self.total => TimerStatus::Idle,
            TimerPhase::Paused { .. } => TimerStatus::Paused,
        }
    }

    pub fn sound_or_default(&self) -> Sound {
        self.sound.unwrap_or_default()
    }
}

/// `end_at - now`, never negative
pub fn remaining_until(end_at: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (end_at - now).to_std().unwrap_or(Duration::ZERO)
}
