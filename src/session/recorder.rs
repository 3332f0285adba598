//! Session recorder state machine.
//!
//! ```text
//! Initializing ──activate()──▶ Active ──finalize()──▶ Finalized
//! ```
//!
//! The recorder is purely in-memory. It accumulates foreground time, the
//! deepest scroll position and tracked clicks, and hands out cumulative
//! [`SessionUpdate`] snapshots for the controller to persist.

use crate::session::interaction::ClickTarget;
use crate::session::types::{InteractionEvent, SessionRecord, SessionUpdate};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecorderState {
    Initializing,
    Active,
    Finalized,
}

/// Page visibility as reported by the browser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Visibility {
    #[default]
    Visible,
    Hidden,
}

/// Scroll measurements, in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScrollPosition {
    pub offset: f64,
    pub viewport_height: f64,
    pub document_height: f64,
}

impl ScrollPosition {
    pub fn new(offset: f64, viewport_height: f64, document_height: f64) -> Self {
        Self {
            offset,
            viewport_height,
            document_height,
        }
    }

    /// Fraction of the document seen so far, 0-1. `None` for a degenerate
    /// document.
    pub fn depth(&self) -> Option<f64> {
        if self.document_height.is_nan() || self.document_height <= 0.0 {
            return None;
        }
        let seen = (self.offset.max(0.0) + self.viewport_height.max(0.0)) / self.document_height;
        Some(seen.clamp(0.0, 1.0))
    }
}

pub struct SessionRecorder {
    state: RecorderState,
    record: SessionRecord,
    visibility: Visibility,
    active: Duration,
    max_depth: f64,
    final_update: Option<SessionUpdate>,
}

impl SessionRecorder {
    /// Start recording a freshly created record.
    pub fn new(record: SessionRecord) -> Self {
        Self {
            state: RecorderState::Initializing,
            active: Duration::from_secs(record.active_secs),
            max_depth: f64::from(record.max_scroll_pct.min(100)) / 100.0,
            record,
            visibility: Visibility::Visible,
            final_update: None,
        }
    }

    /// Mark the initial write as done. Only valid from `Initializing`.
    pub fn activate(&mut self) -> bool {
        if self.state == RecorderState::Initializing {
            self.state = RecorderState::Active;
            true
        } else {
            false
        }
    }

    pub fn state(&self) -> RecorderState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == RecorderState::Active
    }

    pub fn record(&self) -> &SessionRecord {
        &self.record
    }

    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    pub fn set_visibility(&mut self, visibility: Visibility) {
        self.visibility = visibility;
    }

    /// Accumulator tick. Counts `elapsed` only while active and visible.
    pub fn tick(&mut self, elapsed: Duration) -> bool {
        if !self.is_active() || self.visibility != Visibility::Visible {
            return false;
        }
        self.active += elapsed;
        self.record.active_secs = self.active.as_secs();
        true
    }

    /// Observe a scroll event; returns the running maximum percentage.
    pub fn observe_scroll(&mut self, position: ScrollPosition) -> u8 {
        if self.is_active() {
            if let Some(depth) = position.depth() {
                self.max_depth = self.max_depth.max(depth);
                self.record.max_scroll_pct = (self.max_depth * 100.0).round() as u8;
            }
        }
        self.record.max_scroll_pct
    }

    /// Observe a click; appends and returns the event if the target is tracked.
    pub fn observe_click(
        &mut self,
        target: &ClickTarget,
        at: DateTime<Utc>,
    ) -> Option<InteractionEvent> {
        if !self.is_active() {
            return None;
        }
        let event = InteractionEvent {
            label: target.resolve_label()?,
            at,
        };
        self.record.events.push(event.clone());
        Some(event)
    }

    fn snapshot(&self) -> SessionUpdate {
        SessionUpdate {
            last_seen: self.record.last_seen,
            active_secs: self.record.active_secs,
            max_scroll_pct: self.record.max_scroll_pct,
            events: self.record.events.clone(),
            finalized: None,
        }
    }

    /// Cumulative snapshot for a periodic heartbeat write.
    pub fn heartbeat(&mut self, now: DateTime<Utc>) -> Option<SessionUpdate> {
        if !self.is_active() {
            return None;
        }
        self.record.last_seen = self.record.last_seen.max(now);
        Some(self.snapshot())
    }

    /// Final snapshot. The first call from `Active` freezes the session; later
    /// calls return the same frozen snapshot so a repeated write is a no-op.
    pub fn finalize(&mut self, now: DateTime<Utc>) -> Option<SessionUpdate> {
        match self.state {
            RecorderState::Initializing => None,
            RecorderState::Finalized => self.final_update.clone(),
            RecorderState::Active => {
                self.record.last_seen = self.record.last_seen.max(now);
                self.record.finalized = true;
                self.state = RecorderState::Finalized;

                let mut update = self.snapshot();
                update.finalized = Some(true);
                self.final_update = Some(update.clone());
                Some(update)
            }
        }
    }
}
