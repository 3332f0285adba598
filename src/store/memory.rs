//! In-memory document store.

use crate::store::{merge_json, DocumentStore, RecentQuery, StoreError};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

type Collections = HashMap<String, BTreeMap<String, Value>>;

/// Document store held entirely in memory. Used by tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<Collections>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents in a collection.
    pub fn len(&self, collection: &str) -> usize {
        self.collections
            .read()
            .map(|c| c.get(collection).map_or(0, BTreeMap::len))
            .unwrap_or(0)
    }

    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }
}

fn poisoned<E: std::fmt::Display>(e: E) -> StoreError {
    StoreError::Unavailable(format!("store lock poisoned: {e}"))
}

impl DocumentStore for MemoryStore {
    fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError> {
        let collections = self.collections.read().map_err(poisoned)?;
        Ok(collections
            .get(collection)
            .and_then(|docs| docs.get(id))
            .cloned())
    }

    fn merge(&self, collection: &str, id: &str, patch: Value) -> Result<(), StoreError> {
        let mut collections = self.collections.write().map_err(poisoned)?;
        let doc = collections
            .entry(collection.to_string())
            .or_default()
            .entry(id.to_string())
            .or_insert_with(|| Value::Object(serde_json::Map::new()));
        merge_json(doc, patch);
        Ok(())
    }

    fn query_recent(&self, collection: &str, query: &RecentQuery) -> Result<Vec<Value>, StoreError> {
        let collections = self.collections.read().map_err(poisoned)?;
        Ok(collections
            .get(collection)
            .map(|docs| query.apply(docs.values()))
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_merge_upsert() {
        let store = MemoryStore::new();
        store.merge("users", "u1", json!({ "a": 1 })).unwrap();
        store.merge("users", "u1", json!({ "b": 2 })).unwrap();

        assert_eq!(store.get("users", "u1").unwrap(), Some(json!({ "a": 1, "b": 2 })));
        assert_eq!(store.get("users", "missing").unwrap(), None);
        assert_eq!(store.len("users"), 1);
        assert!(store.is_empty("visitors"));
    }
}
