//! Durable storage for the timer record
//!
//! Every process opens its own connection to the same SQLite file. There is
//! no locking across calls: each `upsert` is a complete overwrite and the
//! most recently completed write wins.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard},
    time::Duration,
};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info, warn};

use crate::{
    error::{Result, TimerError},
    state::{Sound, TimerPhase, TimerRecord, DEFAULT_DURATION},
};

pub trait RecordStore: Send + Sync {
    /// Read the record straight from storage
    fn fetch(&self, id: &str) -> Result<Option<TimerRecord>>;

    /// Overwrite (or insert) the record as of `now`
    fn upsert(&self, record: &TimerRecord, now: DateTime<Utc>) -> Result<()>;

    /// Insert the ground-state record unless one already exists, and return
    /// whatever is stored afterwards
    fn create_default(&self, id: &str, now: DateTime<Utc>) -> Result<TimerRecord>;

    /// Fetch, lazily creating the default record on first access
    fn load_or_create(&self, id: &str, now: DateTime<Utc>) -> Result<TimerRecord> {
        match self.fetch(id)? {
            Some(record) => Ok(record),
            None => {
                info!("No timer record for '{}', creating default", id);
                self.create_default(id, now)
            }
        }
    }

    /// Fetch, failing with `RecordNotFound` when absent
    fn fetch_required(&self, id: &str) -> Result<TimerRecord> {
        self.fetch(id)?
            .ok_or_else(|| TimerError::RecordNotFound(id.to_string()))
    }
}

/// SQLite-backed store shared by every process through the database file
pub struct SqliteStore {
    conn: Mutex<Connection>,
    path: PathBuf,
}

impl SqliteStore {
    const SCHEMA_VERSION: i32 = 1;

    /// Open (creating if needed) the database. Any failure here is reported
    /// as `StoreUnavailable`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                TimerError::StoreUnavailable(format!("{}: {}", parent.display(), e))
            })?;
        }

        let conn = Connection::open(&path)
            .map_err(|e| TimerError::StoreUnavailable(format!("{}: {}", path.display(), e)))?;

        // Several processes write this file; wait for their locks instead of failing
        conn.busy_timeout(Duration::from_secs(5))
            .map_err(|e| TimerError::StoreUnavailable(e.to_string()))?;
        if let Err(e) = conn.pragma_update(None, "journal_mode", "WAL") {
            warn!("Failed to enable WAL mode: {}. Continuing with default journal mode.", e);
        }
        if let Err(e) = conn.pragma_update(None, "synchronous", "NORMAL") {
            warn!("Failed to set synchronous=NORMAL: {}", e);
        }

        let store = Self {
            conn: Mutex::new(conn),
            path,
        };
        store
            .run_migrations()
            .map_err(|e| TimerError::StoreUnavailable(format!("migration failed: {}", e)))?;

        debug!("Opened timer store at {}", store.path.display());
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| TimerError::StoreUnavailable(format!("connection mutex poisoned: {}", e)))
    }

    fn run_migrations(&self) -> Result<()> {
        let conn = self.lock_conn()?;
        let current: i32 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;

        if current < 1 {
            conn.execute(
                "CREATE TABLE IF NOT EXISTS timers (
                    id TEXT PRIMARY KEY,
                    total_ms INTEGER NOT NULL,
                    remaining_ms INTEGER NOT NULL,
                    started_at_ms INTEGER,
                    end_at_ms INTEGER,
                    is_paused INTEGER NOT NULL DEFAULT 1,
                    sound TEXT,
                    updated_at_ms INTEGER NOT NULL
                )",
                [],
            )?;
        }

        if current < Self::SCHEMA_VERSION {
            conn.pragma_update(None, "user_version", Self::SCHEMA_VERSION)?;
        }
        Ok(())
    }
}

/// Raw column values of one `timers` row
struct TimerRow {
    id: String,
    total_ms: i64,
    remaining_ms: i64,
    started_at_ms: Option<i64>,
    end_at_ms: Option<i64>,
    is_paused: bool,
    sound: Option<String>,
}

impl TimerRow {
    fn from_record(record: &TimerRecord, now: DateTime<Utc>) -> Self {
        Self {
            id: record.id.clone(),
            total_ms: duration_to_ms(record.total),
            // Advisory while running
            remaining_ms: duration_to_ms(record.remaining(now)),
            started_at_ms: record.started_at.map(|t| t.timestamp_millis()),
            end_at_ms: record.end_at().map(|t| t.timestamp_millis()),
            is_paused: record.is_paused(),
            sound: record.sound.map(|s| s.name().to_string()),
        }
    }

    /// A stored `end_at` always wins: such a row decodes as running even
    /// when `is_paused` claims otherwise.
    fn into_record(self) -> TimerRecord {
        let total = ms_to_duration(self.total_ms);
        let end_at = self.end_at_ms.and_then(DateTime::<Utc>::from_timestamp_millis);

        if self.is_paused == end_at.is_some() {
            warn!(
                "Timer record '{}' is inconsistent (is_paused={}, end_at={:?}); resolving by end_at",
                self.id, self.is_paused, end_at
            );
        }

        let phase = match end_at {
            Some(end_at) => TimerPhase::Running { end_at },
            None => TimerPhase::Paused {
                remaining: ms_to_duration(self.remaining_ms).min(total),
            },
        };

        let sound = self.sound.as_deref().and_then(|name| match name.parse::<Sound>() {
            Ok(sound) => Some(sound),
            Err(e) => {
                warn!("Ignoring stored sound: {}", e);
                None
            }
        });

        TimerRecord {
            id: self.id,
            total,
            phase,
            started_at: self.started_at_ms.and_then(DateTime::<Utc>::from_timestamp_millis),
            sound,
        }
    }
}

impl RecordStore for SqliteStore {
    fn fetch(&self, id: &str) -> Result<Option<TimerRecord>> {
        let conn = self.lock_conn()?;
        let row = conn
            .query_row(
                "SELECT id, total_ms, remaining_ms, started_at_ms, end_at_ms, is_paused, sound
                 FROM timers WHERE id = ?1",
                params![id],
                |r| {
                    Ok(TimerRow {
                        id: r.get(0)?,
                        total_ms: r.get(1)?,
                        remaining_ms: r.get(2)?,
                        started_at_ms: r.get(3)?,
                        end_at_ms: r.get(4)?,
                        is_paused: r.get(5)?,
                        sound: r.get(6)?,
                    })
                },
            )
            .optional()?;
        Ok(row.map(TimerRow::into_record))
    }

    fn upsert(&self, record: &TimerRecord, now: DateTime<Utc>) -> Result<()> {
        let row = TimerRow::from_record(record, now);
        let conn = self.lock_conn()?;
        conn.execute(
            "INSERT INTO timers
                (id, total_ms, remaining_ms, started_at_ms, end_at_ms, is_paused, sound, updated_at_ms)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(id) DO UPDATE SET
                total_ms = ?2,
                remaining_ms = ?3,
                started_at_ms = ?4,
                end_at_ms = ?5,
                is_paused = ?6,
                sound = ?7,
                updated_at_ms = ?8",
            params![
                row.id,
                row.total_ms,
                row.remaining_ms,
                row.started_at_ms,
                row.end_at_ms,
                row.is_paused,
                row.sound,
                now.timestamp_millis()
            ],
        )?;
        debug!(
            "Saved timer '{}': paused={}, remaining_ms={}, end_at_ms={:?}",
            row.id, row.is_paused, row.remaining_ms, row.end_at_ms
        );
        Ok(())
    }

    fn create_default(&self, id: &str, now: DateTime<Utc>) -> Result<TimerRecord> {
        let record = TimerRecord::idle(id, DEFAULT_DURATION);
        let row = TimerRow::from_record(&record, now);
        {
            let conn = self.lock_conn()?;
            // Another process may have created it in the meantime; keep theirs
            conn.execute(
                "INSERT OR IGNORE INTO timers
                    (id, total_ms, remaining_ms, started_at_ms, end_at_ms, is_paused, sound, updated_at_ms)
                 VALUES (?1, ?2, ?3, NULL, NULL, 1, ?4, ?5)",
                params![
                    row.id,
                    row.total_ms,
                    row.remaining_ms,
                    row.sound,
                    now.timestamp_millis()
                ],
            )?;
        }
        self.fetch_required(id)
    }
}

/// Process-local store. Cloned handles are not shared; wrap it in an `Arc`
/// to hand the same instance to several contexts.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<String, TimerRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, TimerRecord>>> {
        self.records
            .lock()
            .map_err(|e| TimerError::StoreUnavailable(format!("memory store poisoned: {}", e)))
    }
}

impl RecordStore for MemoryStore {
    fn fetch(&self, id: &str) -> Result<Option<TimerRecord>> {
        Ok(self.lock()?.get(id).cloned())
    }

    fn upsert(&self, record: &TimerRecord, _now: DateTime<Utc>) -> Result<()> {
        self.lock()?.insert(record.id.clone(), record.clone());
        Ok(())
    }

    fn create_default(&self, id: &str, _now: DateTime<Utc>) -> Result<TimerRecord> {
        let mut records = self.lock()?;
        let record = records
            .entry(id.to_string())
            .or_insert_with(|| TimerRecord::idle(id, DEFAULT_DURATION));
        Ok(record.clone())
    }
}

fn duration_to_ms(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}

fn ms_to_duration(ms: i64) -> Duration {
    Duration::from_millis(ms.max(0) as u64)
}
