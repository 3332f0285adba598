//! Document store abstraction.
//!
//! Records are JSON documents grouped into collections and keyed by id.
//! Writes are merge-upserts: object fields present in the patch replace the
//! stored ones (recursively for nested objects), everything else is kept.

pub mod file;
pub mod memory;
pub mod queue;

use chrono::{DateTime, Utc};
use serde_json::Value;

pub use file::JsonFileStore;
pub use memory::MemoryStore;
pub use queue::{WriteOp, WriteQueue};

/// Collection holding one document per session.
pub const VISITORS: &str = "visitors";

/// Collection holding one document per client id.
pub const USERS: &str = "users";

/// Field every query filters and orders on.
pub const LAST_SEEN_FIELD: &str = "last_seen";

/// Store errors.
#[derive(Debug)]
pub enum StoreError {
    /// The backend refused the operation
    PermissionDenied(String),
    /// The backend could not be reached or read
    Unavailable(String),
    /// A document could not be encoded or decoded
    Serialization(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::PermissionDenied(e) => write!(f, "Permission denied: {e}"),
            StoreError::Unavailable(e) => write!(f, "Store unavailable: {e}"),
            StoreError::Serialization(e) => write!(f, "Serialization error: {e}"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::PermissionDenied => StoreError::PermissionDenied(e.to_string()),
            _ => StoreError::Unavailable(e.to_string()),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

/// A "recent documents" query: `field >= since`, newest first, capped.
#[derive(Debug, Clone)]
pub struct RecentQuery {
    pub field: String,
    pub since: DateTime<Utc>,
    pub limit: usize,
}

impl RecentQuery {
    pub fn last_seen_since(since: DateTime<Utc>, limit: usize) -> Self {
        Self {
            field: LAST_SEEN_FIELD.to_string(),
            since,
            limit,
        }
    }

    /// Timestamp of `field` in a document, if present and parseable.
    fn timestamp_of(&self, doc: &Value) -> Option<DateTime<Utc>> {
        doc.get(&self.field)
            .and_then(Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|t| t.with_timezone(&Utc))
    }

    /// Filter, order and cap a set of documents.
    pub fn apply<'a>(&self, docs: impl Iterator<Item = &'a Value>) -> Vec<Value> {
        let mut matching: Vec<(DateTime<Utc>, &Value)> = docs
            .filter_map(|doc| self.timestamp_of(doc).map(|t| (t, doc)))
            .filter(|(t, _)| *t >= self.since)
            .collect();
        matching.sort_by(|a, b| b.0.cmp(&a.0));
        matching
            .into_iter()
            .take(self.limit)
            .map(|(_, doc)| doc.clone())
            .collect()
    }
}

/// A document database with merge-upsert writes.
pub trait DocumentStore: Send + Sync {
    /// Fetch a document by id.
    fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError>;

    /// Merge `patch` into the document, creating it if absent.
    fn merge(&self, collection: &str, id: &str, patch: Value) -> Result<(), StoreError>;

    /// Run a recent-documents query.
    fn query_recent(&self, collection: &str, query: &RecentQuery) -> Result<Vec<Value>, StoreError>;
}

/// Merge `patch` into `target` in place.
pub fn merge_json(target: &mut Value, patch: Value) {
    match (target, patch) {
        (Value::Object(target), Value::Object(patch)) => {
            for (key, value) in patch {
                let nested = value.is_object() && target.get(&key).is_some_and(Value::is_object);
                match target.get_mut(&key) {
                    Some(existing) if nested => merge_json(existing, value),
                    _ => {
                        target.insert(key, value);
                    }
                }
            }
        }
        (target, patch) => *target = patch,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    #[test]
    fn test_merge_json_keeps_untouched_fields() {
        let mut doc = json!({ "a": 1, "nested": { "x": 1, "y": 2 }, "list": [1, 2] });
        merge_json(&mut doc, json!({ "b": 2, "nested": { "y": 3 }, "list": [3] }));
        assert_eq!(
            doc,
            json!({ "a": 1, "b": 2, "nested": { "x": 1, "y": 3 }, "list": [3] })
        );
    }

    #[test]
    fn test_recent_query_orders_and_caps() {
        let now = Utc::now();
        let docs = vec![
            json!({ "id": "old", "last_seen": (now - Duration::days(10)).to_rfc3339() }),
            json!({ "id": "a", "last_seen": (now - Duration::hours(2)).to_rfc3339() }),
            json!({ "id": "b", "last_seen": (now - Duration::hours(1)).to_rfc3339() }),
            json!({ "id": "c", "last_seen": now.to_rfc3339() }),
            json!({ "id": "no-timestamp" }),
        ];
        let query = RecentQuery::last_seen_since(now - Duration::days(7), 2);
        let result = query.apply(docs.iter());

        let ids: Vec<&str> = result.iter().map(|d| d["id"].as_str().unwrap()).collect();
        assert_eq!(ids, vec!["c", "b"]);
    }
}
