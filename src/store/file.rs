//! Document store persisted as one JSON file per collection.

use crate::store::{merge_json, DocumentStore, RecentQuery, StoreError};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// File-backed document store rooted at a directory.
///
/// Each collection lives in `<root>/<collection>.json` as an id -> document
/// map. Suitable for a single process; concurrent writers in one process are
/// serialized by an internal lock.
#[derive(Debug)]
pub struct JsonFileStore {
    root: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn collection_path(&self, collection: &str) -> PathBuf {
        self.root.join(format!("{collection}.json"))
    }

    fn load(&self, collection: &str) -> Result<BTreeMap<String, Value>, StoreError> {
        let path = self.collection_path(collection);
        if !path.exists() {
            return Ok(BTreeMap::new());
        }
        let content = std::fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&content)?)
    }

    fn save(&self, collection: &str, docs: &BTreeMap<String, Value>) -> Result<(), StoreError> {
        std::fs::create_dir_all(&self.root)?;
        let path = self.collection_path(collection);
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_string_pretty(docs)?)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn guard(&self) -> Result<std::sync::MutexGuard<'_, ()>, StoreError> {
        self.lock
            .lock()
            .map_err(|e| StoreError::Unavailable(format!("store lock poisoned: {e}")))
    }
}

impl DocumentStore for JsonFileStore {
    fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError> {
        let _guard = self.guard()?;
        Ok(self.load(collection)?.remove(id))
    }

    fn merge(&self, collection: &str, id: &str, patch: Value) -> Result<(), StoreError> {
        let _guard = self.guard()?;
        let mut docs = self.load(collection)?;
        let doc = docs
            .entry(id.to_string())
            .or_insert_with(|| Value::Object(serde_json::Map::new()));
        merge_json(doc, patch);
        self.save(collection, &docs)
    }

    fn query_recent(&self, collection: &str, query: &RecentQuery) -> Result<Vec<Value>, StoreError> {
        let _guard = self.guard()?;
        let docs = self.load(collection)?;
        Ok(query.apply(docs.values()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use serde_json::json;

    #[test]
    fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());
        let now = Utc::now();

        store
            .merge("visitors", "s1", json!({ "last_seen": now.to_rfc3339(), "active_secs": 5 }))
            .unwrap();
        store
            .merge("visitors", "s1", json!({ "active_secs": 9 }))
            .unwrap();

        // A fresh handle sees the persisted state
        let reopened = JsonFileStore::new(dir.path());
        let doc = reopened.get("visitors", "s1").unwrap().unwrap();
        assert_eq!(doc["active_secs"], 9);

        let recent = reopened
            .query_recent("visitors", &RecentQuery::last_seen_since(now - Duration::days(1), 10))
            .unwrap();
        assert_eq!(recent.len(), 1);
    }

    #[test]
    fn test_missing_collection_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("nested"));
        assert_eq!(store.get("users", "x").unwrap(), None);
        let recent = store
            .query_recent("users", &RecentQuery::last_seen_since(Utc::now(), 10))
            .unwrap();
        assert!(recent.is_empty());
    }
}
