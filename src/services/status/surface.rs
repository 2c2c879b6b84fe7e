//! Registries that actually hold live status cards
//!
//! A surface plays the role of the OS: cards it holds are visible to every
//! context that shares it, whichever process created them.

use std::{
    fs,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
    time::Duration,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::{Result, TimerError};

/// What a status card shows
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardContent {
    pub end_at: Option<DateTime<Utc>>,
    pub is_paused: bool,
    /// Meaningful only when paused or finished
    pub adjusted_remaining: Option<Duration>,
    pub total: Duration,
}

impl CardContent {
    pub fn running(end_at: DateTime<Utc>, total: Duration) -> Self {
        Self {
            end_at: Some(end_at),
            is_paused: false,
            adjusted_remaining: None,
            total,
        }
    }

    pub fn paused(remaining: Duration, total: Duration) -> Self {
        Self {
            end_at: None,
            is_paused: true,
            adjusted_remaining: Some(remaining),
            total,
        }
    }

    pub fn completed(total: Duration) -> Self {
        Self {
            end_at: None,
            is_paused: false,
            adjusted_remaining: Some(Duration::ZERO),
            total,
        }
    }

    pub fn is_completed(&self) -> bool {
        !self.is_paused && self.end_at.is_none()
    }
}

/// Identity of one card instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardHandle {
    pub timer_id: String,
    pub token: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveCard {
    #[serde(flatten)]
    pub handle: CardHandle,
    pub content: CardContent,
    pub stale_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl LiveCard {
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        self.stale_at.is_some_and(|stale_at| now >= stale_at)
    }
}

pub trait StatusSurface: Send + Sync {
    /// Cards currently shown (active or stale)
    fn live_cards(&self) -> Result<Vec<LiveCard>>;

    fn request(
        &self,
        timer_id: &str,
        content: CardContent,
        stale_at: Option<DateTime<Utc>>,
    ) -> Result<CardHandle>;

    fn update(
        &self,
        handle: &CardHandle,
        content: CardContent,
        stale_at: Option<DateTime<Utc>>,
    ) -> Result<()>;

    /// Dismiss immediately. Ending a card that is already gone is not an error.
    fn end(&self, handle: &CardHandle) -> Result<()>;
}

/// Cards stored as JSON files, one per timer id, so external renderers
/// (status bars, widgets) can pick them up.
#[derive(Debug, Clone)]
pub struct FileSurface {
    dir: PathBuf,
}

impl FileSurface {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn card_path(&self, timer_id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", timer_id))
    }

    fn read_card(&self, path: &Path) -> Result<Option<LiveCard>> {
        match fs::read(path) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Write through a temp file and rename so readers never see half a card
    fn write_card(&self, card: &LiveCard) -> Result<()> {
        let path = self.card_path(&card.handle.timer_id);
        let tmp = path.with_extension(format!("json.{}.tmp", card.handle.token.simple()));
        fs::write(&tmp, serde_json::to_vec_pretty(card)?)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn owned_card(&self, handle: &CardHandle) -> Result<Option<LiveCard>> {
        let card = self.read_card(&self.card_path(&handle.timer_id))?;
        Ok(card.filter(|card| card.handle.token == handle.token))
    }
}

impl StatusSurface for FileSurface {
    fn live_cards(&self) -> Result<Vec<LiveCard>> {
        let mut cards = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            match self.read_card(&path) {
                Ok(Some(card)) => cards.push(card),
                Ok(None) => {}
                Err(e) => debug!("Skipping unreadable card {}: {}", path.display(), e),
            }
        }
        Ok(cards)
    }

    fn request(
        &self,
        timer_id: &str,
        content: CardContent,
        stale_at: Option<DateTime<Utc>>,
    ) -> Result<CardHandle> {
        let handle = CardHandle {
            timer_id: timer_id.to_string(),
            token: Uuid::new_v4(),
        };
        self.write_card(&LiveCard {
            handle: handle.clone(),
            content,
            stale_at,
            updated_at: Utc::now(),
        })?;
        Ok(handle)
    }

    fn update(
        &self,
        handle: &CardHandle,
        content: CardContent,
        stale_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let mut card = self.owned_card(handle)?.ok_or_else(|| {
            TimerError::Surface(format!("card {} is no longer live", handle.token))
        })?;
        card.content = content;
        card.stale_at = stale_at;
        card.updated_at = Utc::now();
        self.write_card(&card)
    }

    fn end(&self, handle: &CardHandle) -> Result<()> {
        // Leave a card that belongs to a newer instance alone
        if self.owned_card(handle)?.is_some() {
            match fs::remove_file(self.card_path(&handle.timer_id)) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

/// In-process registry that counts calls. Share one instance between
/// contexts to model the OS registry they all see.
#[derive(Debug, Default)]
pub struct MemorySurface {
    cards: Mutex<Vec<LiveCard>>,
    requests: AtomicUsize,
    updates: AtomicUsize,
    ends: AtomicUsize,
}

impl MemorySurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    pub fn update_count(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    pub fn end_count(&self) -> usize {
        self.ends.load(Ordering::SeqCst)
    }

    /// Total surface calls that change what is shown
    pub fn mutation_count(&self) -> usize {
        self.request_count() + self.update_count() + self.end_count()
    }

    pub fn live_count(&self, timer_id: &str) -> usize {
        self.lock()
            .map(|cards| cards.iter().filter(|c| c.handle.timer_id == timer_id).count())
            .unwrap_or(0)
    }

    pub fn card(&self, timer_id: &str) -> Option<LiveCard> {
        self.lock()
            .ok()?
            .iter()
            .find(|c| c.handle.timer_id == timer_id)
            .cloned()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Vec<LiveCard>>> {
        self.cards
            .lock()
            .map_err(|e| TimerError::Surface(format!("memory surface poisoned: {}", e)))
    }
}

impl StatusSurface for MemorySurface {
    fn live_cards(&self) -> Result<Vec<LiveCard>> {
        Ok(self.lock()?.clone())
    }

    fn request(
        &self,
        timer_id: &str,
        content: CardContent,
        stale_at: Option<DateTime<Utc>>,
    ) -> Result<CardHandle> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let handle = CardHandle {
            timer_id: timer_id.to_string(),
            token: Uuid::new_v4(),
        };
        self.lock()?.push(LiveCard {
            handle: handle.clone(),
            content,
            stale_at,
            updated_at: Utc::now(),
        });
        Ok(handle)
    }

    fn update(
        &self,
        handle: &CardHandle,
        content: CardContent,
        stale_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        let mut cards = self.lock()?;
        let card = cards
            .iter_mut()
            .find(|c| c.handle == *handle)
            .ok_or_else(|| TimerError::Surface(format!("card {} is no longer live", handle.token)))?;
        card.content = content;
        card.stale_at = stale_at;
        card.updated_at = Utc::now();
        Ok(())
    }

    fn end(&self, handle: &CardHandle) -> Result<()> {
        self.ends.fetch_add(1, Ordering::SeqCst);
        self.lock()?.retain(|c| c.handle != *handle);
        Ok(())
    }
}
