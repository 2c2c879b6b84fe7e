//! Error taxonomy for the timer core

use thiserror::Error;

/// A state-machine precondition that did not hold.
///
/// Transitions that fail with one of these leave the record untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("timer is already running")]
    AlreadyRunning,
    #[error("timer is already paused")]
    AlreadyPaused,
    #[error("timer is already reset")]
    AlreadyReset,
    #[error("timer has not expired yet")]
    NotExpired,
}

/// Errors surfaced by the store, the collaborators and the command actuators
#[derive(Debug, Error)]
pub enum TimerError {
    /// The persistence layer could not be opened. Fatal for a command actuator.
    #[error("timer store unavailable: {0}")]
    StoreUnavailable(String),

    /// The singleton record is missing
    #[error("timer record '{0}' not found")]
    RecordNotFound(String),

    #[error("invalid transition: {0}")]
    InvalidTransition(#[from] TransitionError),

    #[error("invalid duration: must be between 1s and 99:59:59")]
    InvalidDuration,

    #[error("store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("status surface error: {0}")]
    Surface(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TimerError {
    /// Whether this error is a rejected transition rather than an infrastructure failure
    pub fn is_invalid_transition(&self) -> bool {
        matches!(self, TimerError::InvalidTransition(_))
    }
}

pub type Result<T> = std::result::Result<T, TimerError>;
