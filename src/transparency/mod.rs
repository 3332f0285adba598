//! Transparency module.
//!
//! Tracks what the visitor tracker does, so silent failures remain
//! auditable from the `status` command.

pub mod log;

pub use log::{
    create_shared_log, create_shared_log_with_persistence, SharedTrackingLog, TrackingLog,
    TrackingStats,
};
