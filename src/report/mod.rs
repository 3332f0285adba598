//! Visitor reports.
//!
//! Reads the recent sessions back from the store, rescores each one from its
//! own stored aggregates and renders a text or CSV export.

pub mod csv;
pub mod text;

use crate::config::Config;
use crate::identity::redact;
use crate::scoring::{IntentLabel, IntentScorer, ScoringInput};
use crate::session::SessionRecord;
use crate::store::{DocumentStore, RecentQuery, StoreError, VISITORS};
use crate::transparency::SharedTrackingLog;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use chrono_tz::Tz;
use statrs::statistics::{Data, Distribution, Median};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Returned by [`ReportGenerator::download`] when nothing matched.
pub const NO_DATA_MESSAGE: &str = "No recent visitors.";

/// Placeholder for absent values.
pub const NOT_AVAILABLE: &str = "N/A";

/// Output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Text,
    Csv,
}

impl ReportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ReportFormat::Text => "txt",
            ReportFormat::Csv => "csv",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ReportFormat::Text => "text/plain; charset=utf-8",
            ReportFormat::Csv => "text/csv; charset=utf-8",
        }
    }
}

/// Errors raised while building a report.
#[derive(Debug)]
pub enum ReportError {
    Store(StoreError),
    Io(std::io::Error),
}

impl std::fmt::Display for ReportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReportError::Store(e) => write!(f, "{e}"),
            ReportError::Io(e) => write!(f, "IO error: {e}"),
        }
    }
}

impl std::error::Error for ReportError {}

impl From<StoreError> for ReportError {
    fn from(e: StoreError) -> Self {
        ReportError::Store(e)
    }
}

impl From<std::io::Error> for ReportError {
    fn from(e: std::io::Error) -> Self {
        ReportError::Io(e)
    }
}

/// One scored session, with every field already reduced to display text.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportRow {
    pub session_id: String,
    pub last_seen: String,
    /// IP when captured, otherwise the redacted client id
    pub identity: String,
    pub device_type: String,
    pub device_model: String,
    pub os: String,
    pub browser: String,
    pub source: String,
    pub visit_number: u32,
    pub active_secs: u64,
    pub scroll_pct: u8,
    pub events: Vec<String>,
    pub intent: IntentLabel,
}

impl ReportRow {
    pub fn from_record(record: &SessionRecord, scorer: &dyn IntentScorer, tz: Tz) -> Self {
        let identity = match record.ip.as_deref().map(str::trim) {
            Some(ip) if !ip.is_empty() => ip.to_string(),
            _ if record.client_id.is_empty() => crate::classifier::UNKNOWN.to_string(),
            _ => format!("client {}", redact(&record.client_id)),
        };
        let ctx = &record.context;

        Self {
            session_id: or_placeholder(&record.session_id, NOT_AVAILABLE),
            last_seen: format_timestamp(record.last_seen, tz),
            identity,
            device_type: ctx.device_type.to_string(),
            device_model: or_placeholder(&ctx.device_model, crate::classifier::UNKNOWN),
            os: or_placeholder(&ctx.os, crate::classifier::UNKNOWN),
            browser: or_placeholder(&ctx.browser, crate::classifier::UNKNOWN),
            source: or_placeholder(&ctx.source, crate::classifier::DIRECT),
            visit_number: record.visit_number,
            active_secs: record.active_secs,
            scroll_pct: record.max_scroll_pct.min(100),
            events: record.events.iter().map(|e| e.label.clone()).collect(),
            intent: scorer.score(&ScoringInput::from_record(record)),
        }
    }

    /// Active time as `m:ss`.
    pub fn duration(&self) -> String {
        format_duration(self.active_secs)
    }

    /// Event labels in order, or "N/A".
    pub fn events_display(&self, separator: &str) -> String {
        if self.events.is_empty() {
            NOT_AVAILABLE.to_string()
        } else {
            self.events.join(separator)
        }
    }
}

/// Aggregate figures for the report header.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReportSummary {
    pub sessions: usize,
    pub mean_active_secs: f64,
    pub median_scroll_pct: f64,
}

impl ReportSummary {
    pub fn from_rows(rows: &[ReportRow]) -> Self {
        if rows.is_empty() {
            return Self {
                sessions: 0,
                mean_active_secs: 0.0,
                median_scroll_pct: 0.0,
            };
        }

        let active = Data::new(rows.iter().map(|r| r.active_secs as f64).collect::<Vec<_>>());
        let scroll = Data::new(rows.iter().map(|r| r.scroll_pct as f64).collect::<Vec<_>>());

        Self {
            sessions: rows.len(),
            mean_active_secs: active.mean().unwrap_or(0.0),
            median_scroll_pct: scroll.median(),
        }
    }
}

/// Everything a renderer needs.
#[derive(Debug, Clone)]
pub struct Report {
    pub generated_at: String,
    pub window_days: u32,
    pub scoring: &'static str,
    pub summary: ReportSummary,
    pub rows: Vec<ReportRow>,
}

impl Report {
    pub fn render(&self, format: ReportFormat) -> String {
        match format {
            ReportFormat::Text => text::render(self),
            ReportFormat::Csv => csv::render(self),
        }
    }
}

/// Builds reports from the `visitors` collection.
pub struct ReportGenerator {
    store: Arc<dyn DocumentStore>,
    scorer: Box<dyn IntentScorer>,
    tz: Tz,
    export_dir: PathBuf,
    log: Option<SharedTrackingLog>,
}

impl ReportGenerator {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        scorer: Box<dyn IntentScorer>,
        tz: Tz,
        export_dir: PathBuf,
    ) -> Self {
        Self {
            store,
            scorer,
            tz,
            export_dir,
            log: None,
        }
    }

    pub fn from_config(config: &Config, store: Arc<dyn DocumentStore>) -> Self {
        Self::new(
            store,
            config.scoring.scorer(),
            config.timezone(),
            config.export_path.clone(),
        )
    }

    /// Count generated reports in the given tracking log.
    pub fn with_log(mut self, log: SharedTrackingLog) -> Self {
        self.log = Some(log);
        self
    }

    pub fn export_dir(&self) -> &Path {
        &self.export_dir
    }

    /// Query and score the sessions last seen within `window_days` of `now`.
    ///
    /// Returns `None` when no session matched.
    pub fn build(
        &self,
        window_days: u32,
        max_records: usize,
        now: DateTime<Utc>,
    ) -> Result<Option<Report>, ReportError> {
        let since = now
            .checked_sub_signed(ChronoDuration::days(i64::from(window_days)))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let docs = self
            .store
            .query_recent(VISITORS, &RecentQuery::last_seen_since(since, max_records))?;

        let rows: Vec<ReportRow> = docs
            .into_iter()
            .filter_map(|doc| match serde_json::from_value::<SessionRecord>(doc) {
                Ok(record) => Some(record),
                Err(e) => {
                    tracing::warn!("Skipping unreadable session record: {}", e);
                    None
                }
            })
            .map(|record| ReportRow::from_record(&record, self.scorer.as_ref(), self.tz))
            .collect();

        if rows.is_empty() {
            return Ok(None);
        }

        Ok(Some(Report {
            generated_at: format_timestamp(now, self.tz),
            window_days,
            scoring: self.scorer.name(),
            summary: ReportSummary::from_rows(&rows),
            rows,
        }))
    }

    /// Render the report, or `None` when no session matched.
    pub fn render(
        &self,
        format: ReportFormat,
        window_days: u32,
        max_records: usize,
        now: DateTime<Utc>,
    ) -> Result<Option<String>, ReportError> {
        let rendered = self
            .build(window_days, max_records, now)?
            .map(|report| report.render(format));
        if rendered.is_some() {
            if let Some(log) = &self.log {
                log.record_report();
            }
        }
        Ok(rendered)
    }

    /// Render and write the report to the export directory.
    ///
    /// Returns the written path, or `None` (and writes nothing) when no
    /// session matched.
    pub fn export(
        &self,
        format: ReportFormat,
        window_days: u32,
        max_records: usize,
        now: DateTime<Utc>,
    ) -> Result<Option<PathBuf>, ReportError> {
        let Some(content) = self.render(format, window_days, max_records, now)? else {
            return Ok(None);
        };

        std::fs::create_dir_all(&self.export_dir)?;
        let path = self.export_dir.join(format!(
            "portfolio_insights_{}.{}",
            now.timestamp_millis(),
            format.extension()
        ));
        std::fs::write(&path, content)?;
        tracing::info!("Report written to {}", path.display());
        Ok(Some(path))
    }

    /// [`ReportGenerator::export`] reduced to a status message. Never fails.
    pub fn download(
        &self,
        format: ReportFormat,
        window_days: u32,
        max_records: usize,
        now: DateTime<Utc>,
    ) -> String {
        match self.export(format, window_days, max_records, now) {
            Ok(Some(path)) => format!("Report generated: {}", path.display()),
            Ok(None) => NO_DATA_MESSAGE.to_string(),
            Err(e) => {
                tracing::error!("Report generation failed: {}", e);
                format!("Report generation failed: {e}")
            }
        }
    }
}

/// Seconds as `m:ss`.
pub fn format_duration(secs: u64) -> String {
    format!("{}:{:02}", secs / 60, secs % 60)
}

fn format_timestamp(at: DateTime<Utc>, tz: Tz) -> String {
    at.with_timezone(&tz).format("%Y-%m-%d %H:%M:%S %Z").to_string()
}

fn or_placeholder(value: &str, placeholder: &str) -> String {
    if value.trim().is_empty() {
        placeholder.to_string()
    } else {
        value.to_string()
    }
}
