//! Process-wide services
//!
//! One [`Services`] bundle is built per process at startup and shared by the
//! context and command handlers running in it. Nothing in here reaches other
//! processes except through the store, the status surface and the notifier.

pub mod clock;
pub mod notifications;
pub mod sound;
pub mod status;
pub mod store;

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::debug;

pub use clock::{Clock, ManualClock, SystemClock};
pub use notifications::{DisabledNotifier, LogNotifier, MemoryNotifier, Notifier, SystemdNotifier};
pub use sound::{CommandSoundPlayer, MemorySoundPlayer, SoundPlayer};
pub use status::{FileSurface, MemorySurface, StatusCardManager, StatusSurface};
pub use store::{MemoryStore, RecordStore, SqliteStore};

/// Same-process notifications. Never delivered across processes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerEvent {
    /// The persisted record was changed by something in this process
    StateChanged,
    /// A finish sequence completed
    Finished,
}

pub struct Services {
    pub store: Arc<dyn RecordStore>,
    pub clock: Arc<dyn Clock>,
    pub cards: Arc<StatusCardManager>,
    pub notifier: Arc<dyn Notifier>,
    pub sounds: Arc<dyn SoundPlayer>,
    events: broadcast::Sender<TimerEvent>,
}

impl Services {
    pub fn new(
        store: Arc<dyn RecordStore>,
        clock: Arc<dyn Clock>,
        surface: Arc<dyn StatusSurface>,
        notifier: Arc<dyn Notifier>,
        sounds: Arc<dyn SoundPlayer>,
    ) -> Self {
        let (events, _) = broadcast::channel(64);
        let cards = Arc::new(StatusCardManager::new(surface, Arc::clone(&clock)));
        Self {
            store,
            clock,
            cards,
            notifier,
            sounds,
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TimerEvent> {
        self.events.subscribe()
    }

    /// Best effort: with no listener in this process the event is dropped
    pub fn broadcast(&self, event: TimerEvent) {
        if let Err(e) = self.events.send(event) {
            debug!("No same-process listener for {:?}", e.0);
        }
    }
}

