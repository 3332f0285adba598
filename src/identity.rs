//! Visitor identity resolution.
//!
//! A client id is generated once per browser profile and persisted in a small
//! local key store (the analogue of the browser's local storage). Session ids
//! are derived from the client id and the session start time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};
use uuid::Uuid;

/// Local storage key holding the client id.
pub const CLIENT_ID_KEY: &str = "visitor_client_id";

/// Persisted per-browser identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientIdentity(String);

impl ClientIdentity {
    /// Generate a fresh random identity.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short opaque form for reports, e.g. "a1b2c3d4…".
    pub fn redacted(&self) -> String {
        redact(&self.0)
    }
}

impl From<String> for ClientIdentity {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for ClientIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Shorten an identifier to its first eight characters.
pub fn redact(id: &str) -> String {
    let prefix: String = id.chars().take(8).collect();
    if prefix.len() < id.len() {
        format!("{prefix}…")
    } else {
        prefix
    }
}

/// Per-page-load session identifier: `<client id>-<unix millis>`.
///
/// Two sessions started by the same client within the same millisecond would
/// collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn derive(client: &ClientIdentity, started_at: DateTime<Utc>) -> Self {
        Self(format!("{}-{}", client.as_str(), started_at.timestamp_millis()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Small string key-value store surviving between visits.
pub trait KeyStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, std::io::Error>;
    fn set(&self, key: &str, value: &str) -> Result<(), std::io::Error>;
}

impl<T: KeyStore + ?Sized> KeyStore for std::sync::Arc<T> {
    fn get(&self, key: &str) -> Result<Option<String>, std::io::Error> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), std::io::Error> {
        (**self).set(key, value)
    }
}

/// In-process key store. Cleared when dropped.
#[derive(Debug, Default)]
pub struct MemoryKeyStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove every key, as if the visitor cleared site data.
    pub fn clear(&self) {
        if let Ok(mut values) = self.values.lock() {
            values.clear();
        }
    }
}

impl KeyStore for MemoryKeyStore {
    fn get(&self, key: &str) -> Result<Option<String>, std::io::Error> {
        let values = self
            .values
            .lock()
            .map_err(|e| std::io::Error::other(e.to_string()))?;
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), std::io::Error> {
        let mut values = self
            .values
            .lock()
            .map_err(|e| std::io::Error::other(e.to_string()))?;
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Key store backed by a JSON object on disk.
#[derive(Debug)]
pub struct FileKeyStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileKeyStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    fn read_all(&self) -> Result<HashMap<String, String>, std::io::Error> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }
        let content = std::fs::read_to_string(&self.path)?;
        serde_json::from_str(&content).map_err(std::io::Error::other)
    }
}

impl KeyStore for FileKeyStore {
    fn get(&self, key: &str) -> Result<Option<String>, std::io::Error> {
        let _guard = self
            .lock
            .lock()
            .map_err(|e| std::io::Error::other(e.to_string()))?;
        Ok(self.read_all()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), std::io::Error> {
        let _guard = self
            .lock
            .lock()
            .map_err(|e| std::io::Error::other(e.to_string()))?;
        let mut values = self.read_all()?;
        values.insert(key.to_string(), value.to_string());

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&values).map_err(std::io::Error::other)?;
        std::fs::write(&self.path, json)
    }
}

/// Resolves the persisted client id, creating it on first use.
pub struct IdentityResolver<K: KeyStore> {
    store: K,
    ephemeral: OnceLock<ClientIdentity>,
}

impl<K: KeyStore> IdentityResolver<K> {
    pub fn new(store: K) -> Self {
        Self {
            store,
            ephemeral: OnceLock::new(),
        }
    }

    /// Return the persisted client id, generating and persisting one if absent.
    ///
    /// If the store cannot be read or written the id is kept only for the
    /// lifetime of this resolver.
    pub fn client_id(&self) -> ClientIdentity {
        if let Some(id) = self.ephemeral.get() {
            return id.clone();
        }

        match self.store.get(CLIENT_ID_KEY) {
            Ok(Some(existing)) if !existing.trim().is_empty() => {
                return ClientIdentity(existing);
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!("Client id storage unreadable, using ephemeral id: {}", e);
                return self.ephemeral.get_or_init(ClientIdentity::generate).clone();
            }
        }

        let fresh = ClientIdentity::generate();
        if let Err(e) = self.store.set(CLIENT_ID_KEY, fresh.as_str()) {
            tracing::warn!("Could not persist client id, using ephemeral id: {}", e);
            return self.ephemeral.get_or_init(|| fresh).clone();
        }
        tracing::debug!(client_id = %fresh, "Created new client id");
        fresh
    }

    pub fn store(&self) -> &K {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    struct BrokenStore;

    impl KeyStore for BrokenStore {
        fn get(&self, _key: &str) -> Result<Option<String>, std::io::Error> {
            Err(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "storage disabled",
            ))
        }

        fn set(&self, _key: &str, _value: &str) -> Result<(), std::io::Error> {
            Err(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "storage disabled",
            ))
        }
    }

    #[test]
    fn test_client_id_is_stable() {
        let resolver = IdentityResolver::new(MemoryKeyStore::new());
        let first = resolver.client_id();
        let second = resolver.client_id();
        assert_eq!(first, second);
    }

    #[test]
    fn test_cleared_storage_yields_new_id() {
        let resolver = IdentityResolver::new(MemoryKeyStore::new());
        let first = resolver.client_id();
        resolver.store().clear();
        let second = resolver.client_id();
        assert_ne!(first, second);
    }

    #[test]
    fn test_broken_storage_degrades_to_ephemeral() {
        let resolver = IdentityResolver::new(BrokenStore);
        let first = resolver.client_id();
        assert!(!first.as_str().is_empty());
        assert_eq!(first, resolver.client_id());
    }

    #[test]
    fn test_file_key_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("local_storage.json");

        let first = IdentityResolver::new(FileKeyStore::new(path.clone())).client_id();
        let second = IdentityResolver::new(FileKeyStore::new(path)).client_id();
        assert_eq!(first, second);
    }

    #[test]
    fn test_session_id_derivation() {
        let client = ClientIdentity::from("abc".to_string());
        let at = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
        assert_eq!(SessionId::derive(&client, at).as_str(), "abc-1700000000123");
    }

    #[test]
    fn test_redact() {
        assert_eq!(redact("0123456789abcdef"), "01234567…");
        assert_eq!(redact("short"), "short");
    }
}
