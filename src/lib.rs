//! Portfolio Insights - visitor analytics for a personal portfolio site.
//!
//! Tracks each page visit as a session, estimates how serious the visit
//! looks, and renders ad-hoc text or CSV reports from the recorded sessions.
//!
//! # Privacy Guarantees
//!
//! - **No content**: keystrokes and form contents are never captured
//! - **Opaque identity**: visitors are a random client id, redacted in reports
//! - **Tracked clicks only**: clicks count only on tracked or interactive elements
//! - **Transparency**: all tracking activity is counted and auditable
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     Portfolio Insights                       │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌──────────┐   ┌────────────┐   ┌──────────────────┐        │
//! │  │ Identity │──▶│ Classifier │──▶│ Session Recorder │        │
//! │  └──────────┘   └────────────┘   └──────────────────┘        │
//! │                                           │ heartbeat /      │
//! │                                           ▼ finalize         │
//! │  ┌──────────┐   ┌────────────┐   ┌──────────────────┐        │
//! │  │  Report  │◀──│   Scorer   │◀──│  Document Store  │        │
//! │  └──────────┘   └────────────┘   └──────────────────┘        │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use portfolio_insights::{ClientSignals, Config, Tracker};
//! use portfolio_insights::transparency::create_shared_log;
//!
//! # async fn visit() {
//! let config = Config::load().unwrap_or_default();
//! let tracker = Tracker::from_config(&config, create_shared_log());
//!
//! let signals = ClientSignals {
//!     user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7)".to_string(),
//!     referrer: "https://www.linkedin.com/".to_string(),
//!     ..Default::default()
//! };
//! if let Some(session) = tracker.track_visit(signals).await {
//!     session.finalize().await;
//! }
//! # }
//! ```

pub mod classifier;
pub mod config;
pub mod identity;
pub mod ip;
pub mod report;
pub mod scoring;
pub mod session;
pub mod store;
pub mod tracker;
pub mod transparency;

#[cfg(feature = "server")]
pub mod server;

// Re-export key types at crate root for convenience
pub use classifier::{classify, ClientSignals, DeviceType, ScreenInfo, SessionContext};
pub use config::{Config, ConfigError};
pub use identity::{ClientIdentity, IdentityResolver, SessionId};
pub use report::{ReportError, ReportFormat, ReportGenerator};
pub use scoring::{IntentLabel, IntentScorer, ScoringInput, ScoringStrategy};
pub use session::{SessionController, SessionRecord, SessionRecorder, UserRecord};
pub use store::{DocumentStore, StoreError};
pub use tracker::{Tracker, TrackingError};
pub use transparency::{SharedTrackingLog, TrackingLog, TrackingStats};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Privacy declaration that can be displayed to visitors.
pub const PRIVACY_DECLARATION: &str = r#"
╔══════════════════════════════════════════════════════════════════╗
║          PORTFOLIO INSIGHTS - PRIVACY DECLARATION                ║
╠══════════════════════════════════════════════════════════════════╣
║                                                                  ║
║  This site records anonymous visit statistics.                   ║
║                                                                  ║
║  ✓ WHAT WE RECORD:                                               ║
║    • Browser, operating system and device class                  ║
║    • Which site referred you here                                ║
║    • Time spent on the page and how far you scrolled             ║
║    • Clicks on links and buttons (their label only)              ║
║                                                                  ║
║  ✗ WHAT WE NEVER RECORD:                                         ║
║    • Anything you type                                           ║
║    • Your name, email or any account                             ║
║    • Activity on other sites                                     ║
║                                                                  ║
║  You are identified only by a random id stored in your           ║
║  browser. Clearing site data gives you a new one.                ║
║                                                                  ║
║  Tracking statistics can be viewed anytime with:                 ║
║    portfolio-insights status                                     ║
║                                                                  ║
╚══════════════════════════════════════════════════════════════════╝
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_privacy_declaration_contents() {
        assert!(PRIVACY_DECLARATION.contains("PRIVACY"));
        assert!(PRIVACY_DECLARATION.contains("NEVER RECORD"));
        assert!(PRIVACY_DECLARATION.contains("Anything you type"));
    }
}
