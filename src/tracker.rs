//! Visit tracking entry point.
//!
//! [`Tracker::start_session`] runs the initialization phase (identity,
//! classification, IP lookup, initial writes) and hands back a live
//! [`SessionController`]. If the initial writes fail, no controller is
//! created: tracking stays off for that page load rather than leaving partial
//! records behind.

use crate::classifier::{classify, ClientSignals};
use crate::config::Config;
use crate::identity::{ClientIdentity, FileKeyStore, IdentityResolver, KeyStore, SessionId};
use crate::ip::{IpLookup, NoIpLookup};
use crate::session::{SessionController, SessionRecord, SessionTiming, UserRecord};
use crate::store::{DocumentStore, JsonFileStore, StoreError, WriteQueue, USERS, VISITORS};
use crate::transparency::SharedTrackingLog;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Errors that stop a session from starting.
#[derive(Debug)]
pub enum TrackingError {
    /// The initial write was rejected
    Store(StoreError),
    /// A record could not be encoded
    Serialization(String),
    /// The initialization task died
    Runtime(String),
}

impl std::fmt::Display for TrackingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrackingError::Store(e) => write!(f, "Tracking store error: {e}"),
            TrackingError::Serialization(e) => write!(f, "Tracking serialization error: {e}"),
            TrackingError::Runtime(e) => write!(f, "Tracking runtime error: {e}"),
        }
    }
}

impl std::error::Error for TrackingError {}

impl From<StoreError> for TrackingError {
    fn from(e: StoreError) -> Self {
        TrackingError::Store(e)
    }
}

impl From<serde_json::Error> for TrackingError {
    fn from(e: serde_json::Error) -> Self {
        TrackingError::Serialization(e.to_string())
    }
}

/// Shared tracking dependencies. Cheap to clone.
#[derive(Clone)]
pub struct Tracker {
    store: Arc<dyn DocumentStore>,
    identity: Arc<IdentityResolver<Arc<dyn KeyStore>>>,
    ip: Arc<dyn IpLookup>,
    writes: WriteQueue,
    log: SharedTrackingLog,
    timing: SessionTiming,
}

impl Tracker {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        key_store: Arc<dyn KeyStore>,
        ip: Arc<dyn IpLookup>,
        log: SharedTrackingLog,
        timing: SessionTiming,
    ) -> Self {
        let writes = WriteQueue::spawn(store.clone(), log.clone());
        Self {
            store,
            identity: Arc::new(IdentityResolver::new(key_store)),
            ip,
            writes,
            log,
            timing,
        }
    }

    /// Build a tracker over the file-backed stores named by `config`.
    pub fn from_config(config: &Config, log: SharedTrackingLog) -> Self {
        let store: Arc<dyn DocumentStore> = Arc::new(JsonFileStore::new(config.store_path()));
        let key_store: Arc<dyn KeyStore> =
            Arc::new(FileKeyStore::new(config.local_storage_path()));
        let timing = SessionTiming {
            tick: config.tick_interval,
            heartbeat: config.heartbeat_interval,
        };
        Self::new(store, key_store, ip_lookup_for(config), log, timing)
    }

    pub fn store(&self) -> Arc<dyn DocumentStore> {
        self.store.clone()
    }

    pub fn log(&self) -> &SharedTrackingLog {
        &self.log
    }

    /// The persisted client id, created on first use.
    pub fn client_id(&self) -> ClientIdentity {
        self.identity.client_id()
    }

    /// Run initialization and start a live session.
    pub async fn start_session(
        &self,
        signals: ClientSignals,
    ) -> Result<SessionController, TrackingError> {
        let store = self.store.clone();
        let identity = self.identity.clone();
        let ip = self.ip.clone();
        let now = Utc::now();

        let record = tokio::task::spawn_blocking(move || {
            initialize(store.as_ref(), identity.as_ref(), ip.as_ref(), signals, now)
        })
        .await
        .map_err(|e| TrackingError::Runtime(e.to_string()))??;

        Ok(SessionController::launch(
            record,
            self.writes.clone(),
            self.log.clone(),
            self.timing,
        ))
    }

    /// Like [`Tracker::start_session`], but failures are logged and counted
    /// instead of returned.
    pub async fn track_visit(&self, signals: ClientSignals) -> Option<SessionController> {
        match self.start_session(signals).await {
            Ok(controller) => Some(controller),
            Err(e) => {
                self.log.record_session_aborted();
                tracing::error!("Tracking disabled for this visit: {}", e);
                None
            }
        }
    }
}

#[cfg(feature = "remote")]
fn ip_lookup_for(config: &Config) -> Arc<dyn IpLookup> {
    if config.ip_lookup {
        Arc::new(crate::ip::IpifyLookup::new())
    } else {
        Arc::new(NoIpLookup)
    }
}

#[cfg(not(feature = "remote"))]
fn ip_lookup_for(config: &Config) -> Arc<dyn IpLookup> {
    if config.ip_lookup {
        tracing::debug!("IP lookup requested but the remote feature is disabled");
    }
    Arc::new(NoIpLookup)
}

/// Initialization phase: resolve identity, classify, and write the initial
/// session and user records.
fn initialize<K: KeyStore>(
    store: &dyn DocumentStore,
    identity: &IdentityResolver<K>,
    ip: &dyn IpLookup,
    signals: ClientSignals,
    now: DateTime<Utc>,
) -> Result<SessionRecord, TrackingError> {
    let client = identity.client_id();
    let context = classify(&signals);
    let session_id = SessionId::derive(&client, now);

    let user = match store.get(USERS, client.as_str())? {
        Some(doc) => match serde_json::from_value::<UserRecord>(doc) {
            Ok(mut user) => {
                user.record_visit(&context, now);
                user
            }
            Err(e) => {
                tracing::warn!(client_id = %client, "Unreadable user record, starting over: {}", e);
                UserRecord::first_visit(client.as_str(), &context, now)
            }
        },
        None => UserRecord::first_visit(client.as_str(), &context, now),
    };

    let record = SessionRecord {
        session_id: session_id.to_string(),
        client_id: client.to_string(),
        context,
        ip: ip.lookup(),
        started_at: now,
        last_seen: now,
        active_secs: 0,
        max_scroll_pct: 0,
        events: Vec::new(),
        visit_number: user.visit_count,
        finalized: false,
    };

    // User first: a rejected user write must not leave a session behind
    // for the reports to pick up
    let user_patch = serde_json::to_value(&user)?;
    let session_patch = serde_json::to_value(&record)?;
    store.merge(USERS, client.as_str(), user_patch)?;
    store.merge(VISITORS, record.session_id.as_str(), session_patch)?;

    tracing::debug!(
        session_id = %record.session_id,
        visit = record.visit_number,
        source = %record.context.source,
        "Session initialized"
    );
    Ok(record)
}
