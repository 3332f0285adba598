//! End-to-end visit tracking against an in-memory store.

use chrono::{Duration as ChronoDuration, Utc};
use portfolio_insights::classifier::{ClientSignals, ScreenInfo};
use portfolio_insights::identity::{KeyStore, MemoryKeyStore};
use portfolio_insights::ip::{IpLookup, NoIpLookup, StaticIp};
use portfolio_insights::report::{ReportFormat, ReportGenerator, NO_DATA_MESSAGE};
use portfolio_insights::scoring::{AdditiveScorer, IntentLabel, ScoringStrategy};
use portfolio_insights::session::{
    ClickTarget, ElementInfo, RecorderState, ScrollPosition, SessionRecord, SessionTiming,
    UserRecord,
};
use portfolio_insights::store::{
    DocumentStore, MemoryStore, RecentQuery, StoreError, USERS, VISITORS,
};
use portfolio_insights::tracker::Tracker;
use portfolio_insights::transparency::{create_shared_log, SharedTrackingLog};
use serde_json::Value;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const DESKTOP_CHROME: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

const HEADLESS: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
(KHTML, like Gecko) HeadlessChrome/120.0.0.0 Safari/537.36";

struct Harness {
    store: Arc<MemoryStore>,
    tracker: Tracker,
    log: SharedTrackingLog,
}

fn harness_with(ip: Arc<dyn IpLookup>, timing: SessionTiming) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let log = create_shared_log();
    let key_store: Arc<dyn KeyStore> = Arc::new(MemoryKeyStore::new());
    let tracker = Tracker::new(store.clone(), key_store, ip, log.clone(), timing);
    Harness {
        store,
        tracker,
        log,
    }
}

fn harness() -> Harness {
    harness_with(
        Arc::new(StaticIp("203.0.113.7".to_string())),
        SessionTiming {
            tick: Duration::from_secs(60),
            heartbeat: Duration::from_secs(60),
        },
    )
}

fn linkedin_desktop() -> ClientSignals {
    ClientSignals {
        user_agent: DESKTOP_CHROME.to_string(),
        referrer: "https://www.linkedin.com/feed/".to_string(),
        screen: ScreenInfo::new(1920, 1080, 2.0),
        locale: "en-US".to_string(),
    }
}

fn stored_session(store: &MemoryStore, id: &str) -> SessionRecord {
    let doc = store
        .get(VISITORS, id)
        .expect("store readable")
        .expect("session document exists");
    serde_json::from_value(doc).expect("session document decodes")
}

#[tokio::test]
async fn test_linkedin_desktop_visit_scores_top_tier() {
    let h = harness();
    let session = h
        .tracker
        .track_visit(linkedin_desktop())
        .await
        .expect("session starts");
    assert_eq!(session.state().await, RecorderState::Active);

    session
        .record_scroll(ScrollPosition::new(1400.0, 800.0, 2000.0))
        .await;
    let event = session
        .record_click(&ClickTarget::new(vec![
            ElementInfo::new("span"),
            ElementInfo::new("a").tracked("Resume Download"),
        ]))
        .await
        .expect("tracked click");
    assert_eq!(event.label, "Resume Download");

    session.finalize().await;
    session.flush().await;

    let record = stored_session(&h.store, session.session_id());
    assert!(record.finalized);
    assert_eq!(record.context.source, "LinkedIn");
    assert_eq!(record.context.os, "MacOS");
    assert_eq!(record.max_scroll_pct, 100);
    assert_eq!(record.ip.as_deref(), Some("203.0.113.7"));
    assert_eq!(record.visit_number, 1);

    let scorer = ScoringStrategy::Additive.scorer();
    let label = scorer.score(&portfolio_insights::ScoringInput::from_record(&record));
    assert_eq!(label, IntentLabel::LikelyRecruiter);

    let stats = h.log.stats();
    assert_eq!(stats.sessions_started, 1);
    assert_eq!(stats.sessions_finalized, 1);
    assert_eq!(stats.events_recorded, 1);
}

#[tokio::test]
async fn test_finalize_twice_leaves_store_unchanged() {
    let h = harness();
    let session = h
        .tracker
        .track_visit(linkedin_desktop())
        .await
        .expect("session starts");
    session
        .record_scroll(ScrollPosition::new(200.0, 800.0, 2000.0))
        .await;

    session.finalize().await;
    session.flush().await;
    let visitor_once = h.store.get(VISITORS, session.session_id()).unwrap();
    let user_once = h.store.get(USERS, session.client_id()).unwrap();

    session.finalize().await;
    session.flush().await;
    assert_eq!(h.store.get(VISITORS, session.session_id()).unwrap(), visitor_once);
    assert_eq!(h.store.get(USERS, session.client_id()).unwrap(), user_once);
    assert_eq!(h.log.stats().sessions_finalized, 1);
    assert_eq!(session.state().await, RecorderState::Finalized);
}

#[tokio::test]
async fn test_events_after_finalize_are_ignored() {
    let h = harness();
    let session = h
        .tracker
        .track_visit(linkedin_desktop())
        .await
        .expect("session starts");
    session.finalize().await;

    let click = ClickTarget::new(vec![ElementInfo::new("button").with_text("Contact")]);
    assert!(session.record_click(&click).await.is_none());
    assert!(!session.heartbeat_now().await);

    session.flush().await;
    assert!(stored_session(&h.store, session.session_id())
        .events
        .is_empty());
}

#[tokio::test]
async fn test_heartbeats_are_monotonic() {
    let h = harness_with(
        Arc::new(NoIpLookup),
        SessionTiming {
            tick: Duration::from_millis(20),
            heartbeat: Duration::from_millis(50),
        },
    );
    let session = h
        .tracker
        .track_visit(linkedin_desktop())
        .await
        .expect("session starts");

    let mut previous = stored_session(&h.store, session.session_id());
    for step in 0..6 {
        if step == 2 {
            session
                .record_scroll(ScrollPosition::new(600.0, 800.0, 2000.0))
                .await;
        }
        if step == 4 {
            // Scrolling back up never lowers the stored depth
            session
                .record_scroll(ScrollPosition::new(0.0, 800.0, 2000.0))
                .await;
        }
        tokio::time::sleep(Duration::from_millis(120)).await;
        session.flush().await;

        let current = stored_session(&h.store, session.session_id());
        assert!(current.last_seen >= previous.last_seen);
        assert!(current.active_secs >= previous.active_secs);
        assert!(current.max_scroll_pct >= previous.max_scroll_pct);
        previous = current;
    }

    assert!(h.log.stats().heartbeats >= 1);
    assert_eq!(previous.max_scroll_pct, 70);
    assert_eq!(previous.ip, None);
    assert_eq!(previous.display_ip(), "Unknown");
    session.finalize().await;
}

#[tokio::test]
async fn test_returning_visitor_keeps_first_source() {
    let h = harness();

    let first = h
        .tracker
        .track_visit(linkedin_desktop())
        .await
        .expect("first session");
    first.finalize().await;
    first.flush().await;

    // Same millisecond would reuse the session id
    tokio::time::sleep(Duration::from_millis(5)).await;

    let direct = ClientSignals {
        referrer: String::new(),
        ..linkedin_desktop()
    };
    let second = h.tracker.track_visit(direct).await.expect("second session");
    second.finalize().await;
    second.flush().await;

    assert_eq!(first.client_id(), second.client_id());
    assert_ne!(first.session_id(), second.session_id());

    let user: UserRecord = serde_json::from_value(
        h.store
            .get(USERS, second.client_id())
            .unwrap()
            .expect("user document"),
    )
    .unwrap();
    assert_eq!(user.visit_count, 2);
    assert_eq!(user.first_source, "LinkedIn");

    let record = stored_session(&h.store, second.session_id());
    assert_eq!(record.visit_number, 2);
    assert_eq!(record.context.source, "Direct");
}

#[tokio::test]
async fn test_headless_agent_is_suspicious() {
    let h = harness();
    let signals = ClientSignals {
        user_agent: HEADLESS.to_string(),
        ..linkedin_desktop()
    };
    let session = h.tracker.track_visit(signals).await.expect("session starts");
    session
        .record_scroll(ScrollPosition::new(1400.0, 800.0, 2000.0))
        .await;
    session.finalize().await;
    session.flush().await;

    let record = stored_session(&h.store, session.session_id());
    for strategy in [ScoringStrategy::Additive, ScoringStrategy::Weighted] {
        let input = portfolio_insights::ScoringInput::from_record(&record);
        assert_eq!(strategy.scorer().score(&input), IntentLabel::Suspicious);
    }
}

/// Rejects every write, like a document database with locked-down rules.
struct DeniedStore;

impl DocumentStore for DeniedStore {
    fn get(&self, _collection: &str, _id: &str) -> Result<Option<Value>, StoreError> {
        Ok(None)
    }

    fn merge(&self, _collection: &str, _id: &str, _patch: Value) -> Result<(), StoreError> {
        Err(StoreError::PermissionDenied("writes disabled".to_string()))
    }

    fn query_recent(
        &self,
        _collection: &str,
        _query: &RecentQuery,
    ) -> Result<Vec<Value>, StoreError> {
        Ok(Vec::new())
    }
}

#[tokio::test]
async fn test_denied_initial_write_disables_tracking() {
    let log = create_shared_log();
    let tracker = Tracker::new(
        Arc::new(DeniedStore),
        Arc::new(MemoryKeyStore::new()),
        Arc::new(NoIpLookup),
        log.clone(),
        SessionTiming::default(),
    );

    assert!(tracker.start_session(linkedin_desktop()).await.is_err());
    assert!(tracker.track_visit(linkedin_desktop()).await.is_none());

    let stats = log.stats();
    assert_eq!(stats.sessions_started, 0);
    assert_eq!(stats.sessions_aborted, 1);
}

/// Rejects writes to the `users` collection only.
struct UsersLockedStore(MemoryStore);

impl DocumentStore for UsersLockedStore {
    fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError> {
        self.0.get(collection, id)
    }

    fn merge(&self, collection: &str, id: &str, patch: Value) -> Result<(), StoreError> {
        if collection == USERS {
            return Err(StoreError::PermissionDenied("users locked".to_string()));
        }
        self.0.merge(collection, id, patch)
    }

    fn query_recent(&self, collection: &str, query: &RecentQuery) -> Result<Vec<Value>, StoreError> {
        self.0.query_recent(collection, query)
    }
}

#[tokio::test]
async fn test_rejected_user_write_leaves_no_session() {
    let store = Arc::new(UsersLockedStore(MemoryStore::new()));
    let log = create_shared_log();
    let tracker = Tracker::new(
        store.clone(),
        Arc::new(MemoryKeyStore::new()),
        Arc::new(NoIpLookup),
        log.clone(),
        SessionTiming::default(),
    );

    assert!(tracker.track_visit(linkedin_desktop()).await.is_none());

    let since = Utc::now() - ChronoDuration::days(1);
    let sessions = store
        .query_recent(VISITORS, &RecentQuery::last_seen_since(since, 10))
        .unwrap();
    assert!(sessions.is_empty());
    assert_eq!(log.stats().sessions_aborted, 1);
}

/// Keeps every `visitors` patch in arrival order.
#[derive(Default)]
struct PatchLog {
    inner: MemoryStore,
    visitor_patches: Mutex<Vec<Value>>,
}

impl DocumentStore for PatchLog {
    fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError> {
        self.inner.get(collection, id)
    }

    fn merge(&self, collection: &str, id: &str, patch: Value) -> Result<(), StoreError> {
        if collection == VISITORS {
            self.visitor_patches.lock().unwrap().push(patch.clone());
        }
        self.inner.merge(collection, id, patch)
    }

    fn query_recent(&self, collection: &str, query: &RecentQuery) -> Result<Vec<Value>, StoreError> {
        self.inner.query_recent(collection, query)
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_writes_never_regress() {
    let store = Arc::new(PatchLog::default());
    let tracker = Tracker::new(
        store.clone(),
        Arc::new(MemoryKeyStore::new()),
        Arc::new(NoIpLookup),
        create_shared_log(),
        SessionTiming {
            tick: Duration::from_secs(60),
            heartbeat: Duration::from_secs(60),
        },
    );
    let session = Arc::new(
        tracker
            .track_visit(linkedin_desktop())
            .await
            .expect("session starts"),
    );

    let mut tasks = Vec::new();
    for i in 0..8 {
        let clicker = session.clone();
        tasks.push(tokio::spawn(async move {
            for j in 0..10 {
                let label = format!("link-{i}-{j}");
                let target = ClickTarget::new(vec![ElementInfo::new("a").tracked(&label)]);
                clicker.record_click(&target).await;
            }
        }));
        let beater = session.clone();
        tasks.push(tokio::spawn(async move {
            for _ in 0..10 {
                beater.heartbeat_now().await;
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }
    session.finalize().await;
    session.flush().await;

    let patches = store.visitor_patches.lock().unwrap().clone();
    let mut events_seen = 0;
    let mut last_seen = None;
    for patch in &patches {
        if let Some(events) = patch.get("events").and_then(Value::as_array) {
            assert!(events.len() >= events_seen, "event list shrank");
            events_seen = events.len();
        }
        if let Some(seen) = patch.get("last_seen").and_then(Value::as_str) {
            let seen = chrono::DateTime::parse_from_rfc3339(seen).unwrap();
            assert!(last_seen.map_or(true, |previous| seen >= previous));
            last_seen = Some(seen);
        }
    }
    assert_eq!(events_seen, 80);
    assert_eq!(stored_session(&store.inner, session.session_id()).events.len(), 80);
}

#[tokio::test]
async fn test_report_over_tracked_sessions() {
    let h = harness();
    let dir = tempfile::tempdir().unwrap();
    let reports = ReportGenerator::new(
        h.store.clone(),
        Box::new(AdditiveScorer),
        chrono_tz::Tz::UTC,
        dir.path().to_path_buf(),
    );

    let now = Utc::now();
    assert_eq!(
        reports.download(ReportFormat::Text, 7, 500, now),
        NO_DATA_MESSAGE
    );
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);

    let session = h
        .tracker
        .track_visit(linkedin_desktop())
        .await
        .expect("session starts");
    session
        .record_click(&ClickTarget::new(vec![
            ElementInfo::new("a").with_href("https://github.com/someone")
        ]))
        .await;
    session.finalize().await;
    session.flush().await;

    let text = reports
        .render(ReportFormat::Text, 7, 500, Utc::now() + ChronoDuration::seconds(1))
        .unwrap()
        .expect("one session");
    assert!(text.contains("Identity: 203.0.113.7"));
    assert!(text.contains("Source: LinkedIn"));
    assert!(text.contains("Interactions: https://github.com/someone"));

    let message = reports.download(ReportFormat::Csv, 7, 500, Utc::now());
    assert!(message.starts_with("Report generated: "));
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
}
