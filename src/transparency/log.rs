//! Tracking transparency log.
//!
//! Counts what the tracker did (sessions opened, heartbeats, recorded clicks,
//! store writes and their failures) so failures of fire-and-forget writes stay
//! observable without ever surfacing to the visitor.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Tracking statistics for the current process.
#[derive(Debug)]
pub struct TrackingLog {
    /// Sessions that reached the active state
    sessions_started: AtomicU64,
    /// Sessions abandoned because the initial write failed
    sessions_aborted: AtomicU64,
    /// Sessions finalized
    sessions_finalized: AtomicU64,
    /// Heartbeats queued
    heartbeats: AtomicU64,
    /// Interaction events recorded
    events_recorded: AtomicU64,
    /// Background writes applied
    writes_applied: AtomicU64,
    /// Background writes that failed
    write_failures: AtomicU64,
    /// Reports produced
    reports_generated: AtomicU64,
    /// Log start time
    started_at: DateTime<Utc>,
    /// Path for persisting stats
    persist_path: Option<PathBuf>,
}

impl TrackingLog {
    pub fn new() -> Self {
        Self {
            sessions_started: AtomicU64::new(0),
            sessions_aborted: AtomicU64::new(0),
            sessions_finalized: AtomicU64::new(0),
            heartbeats: AtomicU64::new(0),
            events_recorded: AtomicU64::new(0),
            writes_applied: AtomicU64::new(0),
            write_failures: AtomicU64::new(0),
            reports_generated: AtomicU64::new(0),
            started_at: Utc::now(),
            persist_path: None,
        }
    }

    /// Create a tracking log that loads and saves its counters at `path`.
    pub fn with_persistence(path: PathBuf) -> Self {
        let mut log = Self::new();
        log.persist_path = Some(path);

        if let Err(e) = log.load() {
            tracing::warn!("Could not load previous tracking stats: {}", e);
        }

        log
    }

    pub fn record_session_started(&self) {
        self.sessions_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_session_aborted(&self) {
        self.sessions_aborted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_session_finalized(&self) {
        self.sessions_finalized.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_heartbeat(&self) {
        self.heartbeats.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_event(&self) {
        self.events_recorded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_write(&self) {
        self.writes_applied.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_write_failure(&self) {
        self.write_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_report(&self) {
        self.reports_generated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn stats(&self) -> TrackingStats {
        TrackingStats {
            sessions_started: self.sessions_started.load(Ordering::Relaxed),
            sessions_aborted: self.sessions_aborted.load(Ordering::Relaxed),
            sessions_finalized: self.sessions_finalized.load(Ordering::Relaxed),
            heartbeats: self.heartbeats.load(Ordering::Relaxed),
            events_recorded: self.events_recorded.load(Ordering::Relaxed),
            writes_applied: self.writes_applied.load(Ordering::Relaxed),
            write_failures: self.write_failures.load(Ordering::Relaxed),
            reports_generated: self.reports_generated.load(Ordering::Relaxed),
            started_at: self.started_at,
            uptime_secs: (Utc::now() - self.started_at).num_seconds().max(0) as u64,
        }
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        let stats = self.stats();
        format!(
            "Tracking Statistics:\n\
             - Sessions started: {}\n\
             - Sessions aborted: {}\n\
             - Sessions finalized: {}\n\
             - Heartbeats: {}\n\
             - Interaction events: {}\n\
             - Store writes: {} ({} failed)\n\
             - Reports generated: {}\n\
             \n\
             Privacy Guarantee:\n\
             - No keystrokes or form contents captured\n\
             - Clicks recorded only on tracked or interactive elements\n\
             - No cross-site tracking",
            stats.sessions_started,
            stats.sessions_aborted,
            stats.sessions_finalized,
            stats.heartbeats,
            stats.events_recorded,
            stats.writes_applied,
            stats.write_failures,
            stats.reports_generated,
        )
    }

    /// Save stats to disk.
    pub fn save(&self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let stats = self.stats();
            let persisted = PersistedStats {
                sessions_started: stats.sessions_started,
                sessions_aborted: stats.sessions_aborted,
                sessions_finalized: stats.sessions_finalized,
                heartbeats: stats.heartbeats,
                events_recorded: stats.events_recorded,
                writes_applied: stats.writes_applied,
                write_failures: stats.write_failures,
                reports_generated: stats.reports_generated,
                last_updated: Utc::now(),
            };

            let json = serde_json::to_string_pretty(&persisted).map_err(std::io::Error::other)?;
            std::fs::write(path, json)?;
        }
        Ok(())
    }

    fn load(&mut self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if path.exists() {
                let content = std::fs::read_to_string(path)?;
                let persisted: PersistedStats =
                    serde_json::from_str(&content).map_err(std::io::Error::other)?;

                self.sessions_started
                    .store(persisted.sessions_started, Ordering::Relaxed);
                self.sessions_aborted
                    .store(persisted.sessions_aborted, Ordering::Relaxed);
                self.sessions_finalized
                    .store(persisted.sessions_finalized, Ordering::Relaxed);
                self.heartbeats.store(persisted.heartbeats, Ordering::Relaxed);
                self.events_recorded
                    .store(persisted.events_recorded, Ordering::Relaxed);
                self.writes_applied
                    .store(persisted.writes_applied, Ordering::Relaxed);
                self.write_failures
                    .store(persisted.write_failures, Ordering::Relaxed);
                self.reports_generated
                    .store(persisted.reports_generated, Ordering::Relaxed);
            }
        }
        Ok(())
    }
}

impl Default for TrackingLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of tracking statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingStats {
    pub sessions_started: u64,
    pub sessions_aborted: u64,
    pub sessions_finalized: u64,
    pub heartbeats: u64,
    pub events_recorded: u64,
    pub writes_applied: u64,
    pub write_failures: u64,
    pub reports_generated: u64,
    pub started_at: DateTime<Utc>,
    pub uptime_secs: u64,
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedStats {
    #[serde(default)]
    sessions_started: u64,
    #[serde(default)]
    sessions_aborted: u64,
    #[serde(default)]
    sessions_finalized: u64,
    #[serde(default)]
    heartbeats: u64,
    #[serde(default)]
    events_recorded: u64,
    #[serde(default)]
    writes_applied: u64,
    #[serde(default)]
    write_failures: u64,
    #[serde(default)]
    reports_generated: u64,
    last_updated: DateTime<Utc>,
}

/// Thread-safe shared tracking log.
pub type SharedTrackingLog = Arc<TrackingLog>;

pub fn create_shared_log() -> SharedTrackingLog {
    Arc::new(TrackingLog::new())
}

pub fn create_shared_log_with_persistence(path: PathBuf) -> SharedTrackingLog {
    Arc::new(TrackingLog::with_persistence(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracking_log_counting() {
        let log = TrackingLog::new();

        log.record_session_started();
        log.record_event();
        log.record_event();
        log.record_write_failure();

        let stats = log.stats();
        assert_eq!(stats.sessions_started, 1);
        assert_eq!(stats.events_recorded, 2);
        assert_eq!(stats.write_failures, 1);
        assert_eq!(stats.writes_applied, 0);
    }

    #[test]
    fn test_persistence_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tracking.json");

        let log = TrackingLog::with_persistence(path.clone());
        log.record_heartbeat();
        log.record_heartbeat();
        log.record_report();
        log.save().unwrap();

        let reloaded = TrackingLog::with_persistence(path);
        let stats = reloaded.stats();
        assert_eq!(stats.heartbeats, 2);
        assert_eq!(stats.reports_generated, 1);
    }

    #[test]
    fn test_summary_format() {
        let summary = TrackingLog::new().summary();

        assert!(summary.contains("Sessions started"));
        assert!(summary.contains("Store writes"));
        assert!(summary.contains("Privacy Guarantee"));
    }
}
