//! Background write queue.
//!
//! Heartbeat and finalize writes must never block the caller, so they are
//! handed to a dedicated writer thread over a channel and applied in order.
//! A failed write is logged and counted in the tracking log; it is not
//! retried.

use crate::store::DocumentStore;
use crate::transparency::SharedTrackingLog;
use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use serde_json::Value;
use std::sync::Arc;
use std::thread;

/// An operation for the writer thread.
#[derive(Debug)]
pub enum WriteOp {
    /// Merge-upsert a document
    Merge {
        collection: &'static str,
        id: String,
        patch: Value,
    },
    /// Signal once every earlier operation has been applied
    Barrier(Sender<()>),
}

/// Handle to the writer thread. Cheap to clone.
#[derive(Clone)]
pub struct WriteQueue {
    sender: Sender<WriteOp>,
}

impl WriteQueue {
    /// Spawn a writer thread applying operations to `store`.
    ///
    /// The thread exits once every handle has been dropped.
    pub fn spawn(store: Arc<dyn DocumentStore>, log: SharedTrackingLog) -> Self {
        let (sender, receiver) = unbounded();
        thread::Builder::new()
            .name("store-writer".to_string())
            .spawn(move || run_writer(store, log, receiver))
            .map(|_| ())
            .unwrap_or_else(|e| tracing::error!("Could not start store writer: {}", e));
        Self { sender }
    }

    /// Queue a merge-upsert. Returns immediately.
    pub fn merge(&self, collection: &'static str, id: impl Into<String>, patch: Value) {
        let op = WriteOp::Merge {
            collection,
            id: id.into(),
            patch,
        };
        if self.sender.send(op).is_err() {
            tracing::warn!("Store writer has stopped; dropping write to {}", collection);
        }
    }

    /// Block until every write queued so far has been applied.
    pub fn flush(&self) {
        let (ack_tx, ack_rx) = bounded(1);
        if self.sender.send(WriteOp::Barrier(ack_tx)).is_ok() {
            let _ = ack_rx.recv();
        }
    }

    /// Async variant of [`WriteQueue::flush`].
    pub async fn flush_async(&self) {
        let queue = self.clone();
        if let Err(e) = tokio::task::spawn_blocking(move || queue.flush()).await {
            tracing::warn!("Store flush interrupted: {}", e);
        }
    }
}

fn run_writer(store: Arc<dyn DocumentStore>, log: SharedTrackingLog, receiver: Receiver<WriteOp>) {
    for op in receiver {
        match op {
            WriteOp::Merge {
                collection,
                id,
                patch,
            } => match store.merge(collection, &id, patch) {
                Ok(()) => log.record_write(),
                Err(e) => {
                    log.record_write_failure();
                    tracing::warn!(collection, id = %id, "Background write failed: {}", e);
                }
            },
            WriteOp::Barrier(ack) => {
                let _ = ack.send(());
            }
        }
    }
    tracing::debug!("Store writer stopped");
}
