//! Timer state: the persisted record, its state machine, and the
//! per-context reconciliation built on them

pub mod context;
pub mod finish;
pub mod machine;
pub mod reconcile;
pub mod record;

pub use context::{ContextSettings, TimerContext, EXPIRY_GRACE, TEARDOWN_DELAY, TICK_INTERVAL};
pub use finish::FinishTrigger;
pub use reconcile::Reconciliation;
pub use record::{
    Sound, TimerPhase, TimerRecord, TimerStatus, DEFAULT_DURATION, DEFAULT_TIMER_ID,
};
