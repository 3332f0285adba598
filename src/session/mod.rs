//! Session recording.
//!
//! - [`types`]: the persisted session and user documents
//! - [`interaction`]: click target resolution
//! - [`recorder`]: the in-memory session state machine
//! - [`controller`]: timers and persistence around a live recorder

pub mod controller;
pub mod interaction;
pub mod recorder;
pub mod types;

pub use controller::{SessionController, SessionTiming};
pub use interaction::{ClickTarget, ElementInfo};
pub use recorder::{RecorderState, ScrollPosition, SessionRecorder, Visibility};
pub use types::{DeviceSummary, InteractionEvent, SessionRecord, SessionUpdate, UserRecord};
