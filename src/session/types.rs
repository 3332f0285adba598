//! Persisted visitor records.

use crate::classifier::{DeviceType, SessionContext, DIRECT, UNKNOWN};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A tracked click: the resolved label plus the client timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionEvent {
    pub label: String,
    pub at: DateTime<Utc>,
}

/// One document per page visit in the `visitors` collection.
///
/// Every field has a default so partially written or older documents still
/// deserialize.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionRecord {
    pub session_id: String,
    pub client_id: String,
    pub context: SessionContext,
    pub ip: Option<String>,
    pub started_at: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    /// Seconds the page was foreground-visible
    pub active_secs: u64,
    /// Deepest scroll position observed, 0-100
    pub max_scroll_pct: u8,
    pub events: Vec<InteractionEvent>,
    /// The visitor's visit count when this session started
    pub visit_number: u32,
    pub finalized: bool,
}

/// Cumulative engagement snapshot merged into a stored [`SessionRecord`].
///
/// Always carries totals, never deltas, so applying the same update twice is
/// harmless.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionUpdate {
    pub last_seen: DateTime<Utc>,
    pub active_secs: u64,
    pub max_scroll_pct: u8,
    pub events: Vec<InteractionEvent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finalized: Option<bool>,
}

impl SessionRecord {
    /// IP for display; "Unknown" when the lookup failed or was disabled.
    pub fn display_ip(&self) -> &str {
        self.ip
            .as_deref()
            .filter(|ip| !ip.trim().is_empty())
            .unwrap_or(UNKNOWN)
    }
}

/// Device summary kept on the user record.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceSummary {
    pub browser: String,
    pub os: String,
    pub device_type: DeviceType,
    pub device_model: String,
}

impl From<&SessionContext> for DeviceSummary {
    fn from(ctx: &SessionContext) -> Self {
        Self {
            browser: ctx.browser.clone(),
            os: ctx.os.clone(),
            device_type: ctx.device_type,
            device_model: ctx.device_model.clone(),
        }
    }
}

/// One document per client id in the `users` collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserRecord {
    pub client_id: String,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    /// Source of the very first visit; never overwritten
    pub first_source: String,
    pub visit_count: u32,
    pub last_device: DeviceSummary,
}

impl Default for UserRecord {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            first_seen: DateTime::<Utc>::default(),
            last_seen: DateTime::<Utc>::default(),
            first_source: DIRECT.to_string(),
            visit_count: 0,
            last_device: DeviceSummary::default(),
        }
    }
}

impl UserRecord {
    /// Create the record for a first visit.
    pub fn first_visit(client_id: &str, context: &SessionContext, now: DateTime<Utc>) -> Self {
        Self {
            client_id: client_id.to_string(),
            first_seen: now,
            last_seen: now,
            first_source: context.source.clone(),
            visit_count: 1,
            last_device: DeviceSummary::from(context),
        }
    }

    /// Fold a new visit into an existing record.
    pub fn record_visit(&mut self, context: &SessionContext, now: DateTime<Utc>) {
        self.last_seen = self.last_seen.max(now);
        self.visit_count = self.visit_count.saturating_add(1);
        self.last_device = DeviceSummary::from(context);
    }
}
