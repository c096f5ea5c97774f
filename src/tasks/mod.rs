//! Background Tasks Module
//!
//! Contains background tasks a long-running host can attach to the cache.
//!
//! # Tasks
//! - Expiry sweep: Removes expired entries at configured intervals

mod sweep;

pub use sweep::{spawn_configured_sweep_task, spawn_sweep_task};
