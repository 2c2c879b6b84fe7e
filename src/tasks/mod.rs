//! Background tasks module
//! 
//! Long-running tasks owned by a timer context: the countdown, the
//! activation listener and the foreground terminal loop.

pub mod activation;
pub mod countdown;
pub mod foreground;

// Re-export main task functions
pub use activation::{activation_task, reconcile_logged};
pub use countdown::countdown_task;
pub use foreground::run_foreground;
