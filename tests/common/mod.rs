//! Shared fixtures: several "processes" sharing one SQLite file and one
//! status surface, each with its own store connection and services bundle.

#![allow(dead_code)]

use std::{path::PathBuf, sync::Arc, time::Duration};

use chrono::{DateTime, TimeZone, Utc};
use tempfile::TempDir;
use tokio::time::Instant;

use one_timer::{
    services::{Clock, MemoryNotifier, MemorySoundPlayer, MemorySurface, Services, SqliteStore},
    state::{ContextSettings, TimerContext, DEFAULT_TIMER_ID},
};

/// Wall clock driven by tokio's (pausable) clock, so countdown ticks and
/// `now()` advance together under `start_paused`
#[derive(Debug, Clone)]
pub struct TokioClock {
    base: DateTime<Utc>,
    started: Instant,
}

impl TokioClock {
    pub fn new() -> Self {
        Self {
            base: Utc.with_ymd_and_hms(2025, 5, 20, 9, 0, 0).unwrap(),
            started: Instant::now(),
        }
    }
}

impl Clock for TokioClock {
    fn now(&self) -> DateTime<Utc> {
        self.base + chrono::Duration::from_std(self.started.elapsed()).unwrap()
    }
}

pub struct Harness {
    _dir: TempDir,
    pub db: PathBuf,
    pub clock: Arc<dyn Clock>,
    pub surface: Arc<MemorySurface>,
    pub notifier: Arc<MemoryNotifier>,
    pub sounds: Arc<MemorySoundPlayer>,
}

impl Harness {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let dir = TempDir::new().unwrap();
        Self {
            db: dir.path().join("timer.sqlite3"),
            _dir: dir,
            clock,
            surface: Arc::new(MemorySurface::new()),
            notifier: Arc::new(MemoryNotifier::new()),
            sounds: Arc::new(MemorySoundPlayer::new()),
        }
    }

    pub fn with_tokio_clock() -> Self {
        Self::new(Arc::new(TokioClock::new()))
    }

    /// A fresh services bundle on its own database connection
    pub fn process(&self) -> Arc<Services> {
        Arc::new(Services::new(
            Arc::new(SqliteStore::open(&self.db).unwrap()),
            Arc::clone(&self.clock),
            self.surface.clone(),
            self.notifier.clone(),
            self.sounds.clone(),
        ))
    }

    pub fn context(&self, play_sound: bool) -> Arc<TimerContext> {
        let settings = ContextSettings {
            play_sound,
            ..ContextSettings::default()
        };
        TimerContext::new(self.process(), DEFAULT_TIMER_ID, settings).unwrap()
    }

    /// Mutating calls observed on the surface and notifier so far
    pub fn external_calls(&self) -> (usize, usize) {
        (self.surface.mutation_count(), self.notifier.call_count())
    }
}

pub fn secs(s: u64) -> Duration {
    Duration::from_secs(s)
}
