use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::time::Duration;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::time::Instant;

/// An error returned by a [`KeyValueStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing Redis failed.
    #[error("redis operation failed")]
    Redis(#[from] ds_redis::RedisError),

    /// The key holds a value of a different type than the operation expects.
    #[error("key {0} holds the wrong kind of value")]
    WrongType(String),
}

/// A key/value store with per-key expiry.
///
/// Keys map either to a plain string value or to a hash of string fields. Expiry always applies to
/// the whole key. Implementations must be safe to share between tasks.
pub trait KeyValueStore: Send + Sync {
    /// Returns the string value stored at `key`, or `None` if it does not exist or has expired.
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<String>, StoreError>> + Send;

    /// Stores `value` at `key`, replacing any previous value, expiring after `ttl`.
    fn set(
        &self,
        key: &str,
        value: String,
        ttl: Duration,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Stores `value` at `key` only if the key does not exist yet.
    ///
    /// Returns `true` if the value was stored.
    fn set_nx(
        &self,
        key: &str,
        value: String,
        ttl: Duration,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;

    /// Removes `key`. Removing a missing key is not an error.
    fn delete(&self, key: &str) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Returns a single field of the hash stored at `key`.
    fn hget(
        &self,
        key: &str,
        field: &str,
    ) -> impl Future<Output = Result<Option<String>, StoreError>> + Send;

    /// Replaces the hash stored at `key` with `fields`.
    ///
    /// With `ttl` set to `None`, the hash does not expire.
    fn hset_all(
        &self,
        key: &str,
        fields: Vec<(String, String)>,
        ttl: Option<Duration>,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}

#[derive(Debug)]
enum MemoryValue {
    String(String),
    Hash(BTreeMap<String, String>),
}

#[derive(Debug)]
struct MemoryEntry {
    value: MemoryValue,
    expires_at: Option<Instant>,
}

impl MemoryEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|expires_at| now >= expires_at)
    }
}

/// An in-process [`KeyValueStore`].
///
/// Expiry follows the tokio clock, so tests running with a paused runtime can advance time to
/// expire entries.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, MemoryEntry>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of live keys in the store.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .lock()
            .values()
            .filter(|entry| !entry.is_expired(now))
            .count()
    }

    /// Returns `true` if the store holds no live keys.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the remaining time to live of `key`, if it exists and expires.
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        let entries = self.entries.lock();
        let entry = entries.get(key).filter(|e| !e.is_expired(now))?;
        entry.expires_at.map(|at| at.saturating_duration_since(now))
    }

    fn with_live_entry<R>(&self, key: &str, f: impl FnOnce(Option<&mut MemoryEntry>) -> R) -> R {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        if entries.get(key).is_some_and(|e| e.is_expired(now)) {
            entries.remove(key);
        }
        f(entries.get_mut(key))
    }

    fn insert(&self, key: &str, value: MemoryValue, ttl: Option<Duration>) {
        let entry = MemoryEntry {
            value,
            expires_at: ttl.map(|ttl| Instant::now() + ttl),
        };
        self.entries.lock().insert(key.to_owned(), entry);
    }
}

impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.with_live_entry(key, |entry| match entry.map(|e| &e.value) {
            None => Ok(None),
            Some(MemoryValue::String(value)) => Ok(Some(value.clone())),
            Some(MemoryValue::Hash(_)) => Err(StoreError::WrongType(key.to_owned())),
        })
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), StoreError> {
        self.insert(key, MemoryValue::String(value), Some(ttl));
        Ok(())
    }

    async fn set_nx(&self, key: &str, value: String, ttl: Duration) -> Result<bool, StoreError> {
        let exists = self.with_live_entry(key, |entry| entry.is_some());
        if exists {
            return Ok(false);
        }

        self.insert(key, MemoryValue::String(value), Some(ttl));
        Ok(true)
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.entries.lock().remove(key);
        Ok(())
    }

    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>, StoreError> {
        self.with_live_entry(key, |entry| match entry.map(|e| &e.value) {
            None => Ok(None),
            Some(MemoryValue::Hash(fields)) => Ok(fields.get(field).cloned()),
            Some(MemoryValue::String(_)) => Err(StoreError::WrongType(key.to_owned())),
        })
    }

    async fn hset_all(
        &self,
        key: &str,
        fields: Vec<(String, String)>,
        ttl: Option<Duration>,
    ) -> Result<(), StoreError> {
        if fields.is_empty() {
            self.entries.lock().remove(key);
            return Ok(());
        }

        self.insert(key, MemoryValue::Hash(fields.into_iter().collect()), ttl);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_set_expires() {
        let store = MemoryStore::new();
        store
            .set("key", "value".to_owned(), Duration::from_secs(10))
            .await
            .unwrap();

        assert_eq!(store.get("key").await.unwrap().as_deref(), Some("value"));
        assert_eq!(store.ttl("key"), Some(Duration::from_secs(10)));

        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(store.get("key").await.unwrap(), None);
        assert!(store.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_nx() {
        let store = MemoryStore::new();
        let ttl = Duration::from_secs(5);

        assert!(store.set_nx("lock", "1".to_owned(), ttl).await.unwrap());
        assert!(!store.set_nx("lock", "1".to_owned(), ttl).await.unwrap());

        tokio::time::advance(ttl).await;
        assert!(store.set_nx("lock", "1".to_owned(), ttl).await.unwrap());
    }

    #[tokio::test]
    async fn test_hash_replaces_fields() {
        let store = MemoryStore::new();
        let fields = vec![("1".to_owned(), "0.5".to_owned())];
        store.hset_all("hash", fields, None).await.unwrap();

        let fields = vec![("2".to_owned(), "0.25".to_owned())];
        store.hset_all("hash", fields, None).await.unwrap();

        assert_eq!(store.hget("hash", "1").await.unwrap(), None);
        assert_eq!(
            store.hget("hash", "2").await.unwrap().as_deref(),
            Some("0.25")
        );
        assert_eq!(store.ttl("hash"), None);
    }

    #[tokio::test]
    async fn test_wrong_type() {
        let store = MemoryStore::new();
        store
            .set("key", "value".to_owned(), Duration::from_secs(10))
            .await
            .unwrap();

        assert!(matches!(
            store.hget("key", "field").await,
            Err(StoreError::WrongType(_))
        ));
    }
}
