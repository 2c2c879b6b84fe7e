//! One Timer - a single countdown timer shared by independent processes
//!
//! The timer record lives in SQLite. A foreground terminal, a status-card
//! server and short-lived command handlers each read it, act on it and
//! reconcile their local view against it whenever they become active.

pub mod api;
pub mod commands;
pub mod config;
pub mod error;
pub mod services;
pub mod state;
pub mod tasks;
pub mod utils;

// Re-export commonly used types
pub use api::create_router;
pub use commands::TimerCommand;
pub use config::Config;
pub use error::{Result, TimerError, TransitionError};
pub use services::Services;
pub use state::{ContextSettings, Reconciliation, TimerContext, TimerRecord};
pub use utils::signals::shutdown_signal;
