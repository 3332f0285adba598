//! Live session controller.
//!
//! Owns a [`SessionRecorder`] together with its two periodic tasks: the
//! accumulator ticker and the persistence heartbeat. All writes after the
//! initial one are queued on the [`WriteQueue`] so no call here waits on the
//! store. Each write is queued while the recorder lock is held, so snapshots
//! reach the store in the order they were taken.

use crate::session::interaction::ClickTarget;
use crate::session::recorder::{RecorderState, ScrollPosition, SessionRecorder, Visibility};
use crate::session::types::{InteractionEvent, SessionRecord, SessionUpdate};
use crate::store::{WriteQueue, USERS, VISITORS};
use crate::transparency::SharedTrackingLog;
use chrono::{DateTime, Utc};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time;

/// Timer settings for a live session.
#[derive(Debug, Clone, Copy)]
pub struct SessionTiming {
    /// Accumulator tick
    pub tick: Duration,
    /// Heartbeat write interval
    pub heartbeat: Duration,
}

impl Default for SessionTiming {
    fn default() -> Self {
        Self {
            tick: Duration::from_secs(1),
            heartbeat: Duration::from_secs(15),
        }
    }
}

pub struct SessionController {
    session_id: String,
    client_id: String,
    recorder: Arc<Mutex<SessionRecorder>>,
    writes: WriteQueue,
    log: SharedTrackingLog,
    timers: std::sync::Mutex<Vec<JoinHandle<()>>>,
}

impl SessionController {
    /// Take over a record whose initial write succeeded and start its timers.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn launch(
        record: SessionRecord,
        writes: WriteQueue,
        log: SharedTrackingLog,
        timing: SessionTiming,
    ) -> Self {
        let session_id = record.session_id.clone();
        let client_id = record.client_id.clone();

        let mut recorder = SessionRecorder::new(record);
        recorder.activate();
        let recorder = Arc::new(Mutex::new(recorder));
        log.record_session_started();

        let ticker = spawn_ticker(recorder.clone(), timing.tick);
        let heartbeat = spawn_heartbeat(
            recorder.clone(),
            writes.clone(),
            log.clone(),
            session_id.clone(),
            timing.heartbeat,
        );

        tracing::info!(session_id = %session_id, "Session active");

        Self {
            session_id,
            client_id,
            recorder,
            writes,
            log,
            timers: std::sync::Mutex::new(vec![ticker, heartbeat]),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub async fn state(&self) -> RecorderState {
        self.recorder.lock().await.state()
    }

    /// Copy of the in-memory record.
    pub async fn snapshot(&self) -> SessionRecord {
        self.recorder.lock().await.record().clone()
    }

    pub async fn set_visibility(&self, visibility: Visibility) {
        self.recorder.lock().await.set_visibility(visibility);
    }

    /// Feed a scroll event; returns the running maximum depth percentage.
    pub async fn record_scroll(&self, position: ScrollPosition) -> u8 {
        self.recorder.lock().await.observe_scroll(position)
    }

    /// Feed a click. Tracked clicks are appended and queued for the store.
    pub async fn record_click(&self, target: &ClickTarget) -> Option<InteractionEvent> {
        let mut recorder = self.recorder.lock().await;
        let event = recorder.observe_click(target, Utc::now())?;
        // Queued under the guard so a stale heartbeat cannot land after it
        self.writes.merge(
            VISITORS,
            self.session_id.clone(),
            json!({ "events": recorder.record().events }),
        );
        drop(recorder);

        self.log.record_event();
        tracing::debug!(session_id = %self.session_id, label = %event.label, "Interaction recorded");
        Some(event)
    }

    /// Queue a heartbeat write right away.
    pub async fn heartbeat_now(&self) -> bool {
        send_heartbeat(&self.recorder, &self.writes, &self.log, &self.session_id, Utc::now()).await
    }

    /// End the session: one last merge, a last-seen touch on the user, and
    /// both timers cancelled.
    ///
    /// Safe to call any number of times; later calls repeat the identical
    /// final write.
    pub async fn finalize(&self) {
        self.cancel_timers();

        let mut recorder = self.recorder.lock().await;
        let first = recorder.state() == RecorderState::Active;
        let Some(update) = recorder.finalize(Utc::now()) else {
            return;
        };
        queue_update(&self.writes, &self.session_id, &update);
        self.writes.merge(
            USERS,
            self.client_id.clone(),
            json!({ "last_seen": update.last_seen }),
        );
        drop(recorder);

        if first {
            self.log.record_session_finalized();
            tracing::info!(
                session_id = %self.session_id,
                active_secs = update.active_secs,
                scroll_pct = update.max_scroll_pct,
                events = update.events.len(),
                "Session finalized"
            );
        }
    }

    /// Wait until every queued write has reached the store.
    pub async fn flush(&self) {
        self.writes.flush_async().await;
    }

    fn cancel_timers(&self) {
        if let Ok(mut timers) = self.timers.lock() {
            for handle in timers.drain(..) {
                handle.abort();
            }
        }
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.cancel_timers();
    }
}

fn queue_update(writes: &WriteQueue, session_id: &str, update: &SessionUpdate) {
    match serde_json::to_value(update) {
        Ok(patch) => writes.merge(VISITORS, session_id.to_string(), patch),
        Err(e) => tracing::warn!(session_id, "Could not encode session update: {}", e),
    }
}

async fn send_heartbeat(
    recorder: &Mutex<SessionRecorder>,
    writes: &WriteQueue,
    log: &SharedTrackingLog,
    session_id: &str,
    now: DateTime<Utc>,
) -> bool {
    let mut guard = recorder.lock().await;
    let Some(update) = guard.heartbeat(now) else {
        return false;
    };
    queue_update(writes, session_id, &update);
    drop(guard);

    log.record_heartbeat();
    true
}

fn spawn_ticker(recorder: Arc<Mutex<SessionRecorder>>, tick: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = time::interval(tick);
        // The first tick completes immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            let mut guard = recorder.lock().await;
            if guard.state() == RecorderState::Finalized {
                break;
            }
            guard.tick(tick);
        }
    })
}

fn spawn_heartbeat(
    recorder: Arc<Mutex<SessionRecorder>>,
    writes: WriteQueue,
    log: SharedTrackingLog,
    session_id: String,
    every: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = time::interval(every);
        interval.tick().await;
        loop {
            interval.tick().await;
            if !send_heartbeat(&recorder, &writes, &log, &session_id, Utc::now()).await {
                break;
            }
        }
    })
}
