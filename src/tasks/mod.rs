//! Background Tasks Module
//!
//! - TTL Cleanup: sweeps expired fallback entries at the configured interval

mod cleanup;

pub use cleanup::spawn_cleanup_task;
