//! External status representation: the live card mirrored outside the
//! interactive surface

pub mod manager;
pub mod surface;

pub use manager::{StatusCardManager, COMPLETED_STALE_AFTER, RUNNING_STALE_AFTER};
pub use surface::{CardContent, CardHandle, FileSurface, LiveCard, MemorySurface, StatusSurface};
