//! Session store: persistence of in-flight handshake records.

use crate::error::StoreResult;
use crate::record::HandshakeRecord;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Storage of pending handshake records keyed by state token.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Fetch the record stored under `key`, `None` when absent.
    async fn get(&self, key: &str) -> StoreResult<Option<HandshakeRecord>>;

    /// Insert or overwrite the record stored under `key`.
    async fn set(&self, key: &str, record: &HandshakeRecord) -> StoreResult<()>;

    /// Remove `key`. Removing an absent key succeeds.
    async fn delete(&self, key: &str) -> StoreResult<()>;

    /// Fetch and remove `key`. Backends that can do this atomically should
    /// override it; the default is only atomic under the dispatcher's lock.
    async fn take(&self, key: &str) -> StoreResult<Option<HandshakeRecord>> {
        let record = self.get(key).await?;
        if record.is_some() {
            self.delete(key).await?;
        }
        Ok(record)
    }
}

struct StoredRecord {
    record: HandshakeRecord,
    expires_at: Option<DateTime<Utc>>,
}

impl StoredRecord {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| now > at)
    }
}

/// In-memory implementation of SessionStore
#[derive(Clone)]
pub struct InMemorySessionStore {
    records: Arc<RwLock<HashMap<String, StoredRecord>>>,
    ttl: Option<Duration>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self {
            records: Arc::new(RwLock::new(HashMap::new())),
            ttl: None,
        }
    }

    /// Records older than `ttl_seconds` read as absent. A TTL too large to
    /// represent means records never expire.
    pub fn with_ttl(mut self, ttl_seconds: u64) -> Self {
        self.ttl = i64::try_from(ttl_seconds)
            .ok()
            .and_then(Duration::try_seconds);
        self
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// Drop expired records, returning how many were removed.
    pub async fn cleanup_expired(&self) -> usize {
        let mut records = self.records.write().await;
        let now = Utc::now();
        let before = records.len();
        records.retain(|_, stored| !stored.is_expired(now));
        before - records.len()
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, key: &str) -> StoreResult<Option<HandshakeRecord>> {
        let records = self.records.read().await;
        Ok(records
            .get(key)
            .filter(|stored| !stored.is_expired(Utc::now()))
            .map(|stored| stored.record.clone()))
    }

    async fn set(&self, key: &str, record: &HandshakeRecord) -> StoreResult<()> {
        let stored = StoredRecord {
            record: record.clone(),
            expires_at: self
                .ttl
                .and_then(|ttl| Utc::now().checked_add_signed(ttl)),
        };
        self.records.write().await.insert(key.to_string(), stored);
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.records.write().await.remove(key);
        Ok(())
    }

    async fn take(&self, key: &str) -> StoreResult<Option<HandshakeRecord>> {
        let mut records = self.records.write().await;
        Ok(records
            .remove(key)
            .filter(|stored| !stored.is_expired(Utc::now()))
            .map(|stored| stored.record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> HandshakeRecord {
        HandshakeRecord::new("google", vec!["email".to_string(), "profile".to_string()])
    }

    #[tokio::test]
    async fn test_in_memory_session_store() {
        let store = InMemorySessionStore::new();
        let record = record();
        let key = record.state().to_string();

        store.set(&key, &record).await.unwrap();
        let fetched = store.get(&key).await.unwrap().unwrap();
        assert_eq!(fetched, record);

        store.delete(&key).await.unwrap();
        assert!(store.get(&key).await.unwrap().is_none());

        // Deleting again is not an error
        store.delete(&key).await.unwrap();
    }

    #[tokio::test]
    async fn test_set_overwrites() {
        let store = InMemorySessionStore::new();
        let mut record = record();
        let key = record.state().to_string();

        store.set(&key, &record).await.unwrap();
        record.extend_scopes(["openid"]).unwrap();
        store.set(&key, &record).await.unwrap();

        let fetched = store.get(&key).await.unwrap().unwrap();
        assert_eq!(fetched.scopes(), ["email", "profile", "openid"]);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_take_removes_record() {
        let store = InMemorySessionStore::new();
        let record = record();
        let key = record.state().to_string();
        store.set(&key, &record).await.unwrap();

        assert!(store.take(&key).await.unwrap().is_some());
        assert!(store.take(&key).await.unwrap().is_none());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_expired_record_cleanup() {
        let store = InMemorySessionStore::new().with_ttl(300);
        let record = record();
        let key = record.state().to_string();
        store.set(&key, &record).await.unwrap();

        // Manually set to expired
        store
            .records
            .write()
            .await
            .get_mut(&key)
            .unwrap()
            .expires_at = Some(Utc::now() - Duration::minutes(1));

        assert!(store.get(&key).await.unwrap().is_none());

        let cleaned = store.cleanup_expired().await;
        assert_eq!(cleaned, 1);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_huge_ttl_never_expires() {
        for ttl_seconds in [10_000_000_000_000, u64::MAX] {
            let store = InMemorySessionStore::new().with_ttl(ttl_seconds);
            let record = record();
            let key = record.state().to_string();

            store.set(&key, &record).await.unwrap();
            assert!(store.get(&key).await.unwrap().is_some());
            assert_eq!(store.cleanup_expired().await, 0);
        }
    }

    #[tokio::test]
    async fn test_default_take_uses_get_and_delete() {
        struct Wrapped(InMemorySessionStore);

        #[async_trait]
        impl SessionStore for Wrapped {
            async fn get(&self, key: &str) -> StoreResult<Option<HandshakeRecord>> {
                self.0.get(key).await
            }
            async fn set(&self, key: &str, record: &HandshakeRecord) -> StoreResult<()> {
                self.0.set(key, record).await
            }
            async fn delete(&self, key: &str) -> StoreResult<()> {
                self.0.delete(key).await
            }
        }

        let store = Wrapped(InMemorySessionStore::new());
        let record = record();
        store.set(record.state(), &record).await.unwrap();

        let taken = store.take(record.state()).await.unwrap();
        assert_eq!(taken, Some(record.clone()));
        assert!(store.get(record.state()).await.unwrap().is_none());
    }
}
