//! Utility functions module
//! 
//! Signal handling and display formatting shared by the surfaces.

pub mod format;
pub mod signals;

// Re-export main functions
pub use format::{format_remaining, format_uptime, progress_bar};
pub use signals::{activation_signals, next_activation, shutdown_signal};
