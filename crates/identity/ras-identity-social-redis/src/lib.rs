//! Redis session store for social login handshakes.
//!
//! Records are stored as JSON under `<prefix>:<state>`. [`SessionStore::take`]
//! uses `GETDEL`, so a state token is consumed at most once even when several
//! processes share the same Redis instance.

use async_trait::async_trait;
use deadpool_redis::{Config as PoolConfig, Connection, Pool, Runtime};
use ras_identity_social::{HandshakeRecord, SessionStore, StoreError, StoreResult};
use redis::AsyncCommands;
use std::time::Duration;
use tracing::debug;

/// Redis-backed [`SessionStore`] with connection pooling.
#[derive(Clone)]
pub struct RedisSessionStore {
    pool: Pool,
    expiration: Option<Duration>,
    key_prefix: String,
}

impl RedisSessionStore {
    /// Store using a pool created from `connection_url`.
    pub fn new(connection_url: impl Into<String>) -> StoreResult<Self> {
        let config = PoolConfig::from_url(connection_url.into());
        Self::with_pool_config(config)
    }

    pub fn with_pool_config(config: PoolConfig) -> StoreResult<Self> {
        let pool = config
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| StoreError::Backend(format!("Failed to create Redis pool: {}", e)))?;
        Ok(Self::from_pool(pool))
    }

    pub fn from_pool(pool: Pool) -> Self {
        Self {
            pool,
            expiration: None,
            key_prefix: "social".to_string(),
        }
    }

    /// Pending handshakes expire after `expiration` (whole seconds).
    pub fn with_expiration(mut self, expiration: Duration) -> Self {
        self.expiration = Some(expiration);
        self
    }

    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    fn build_key(&self, key: &str) -> String {
        if self.key_prefix.is_empty() {
            key.to_string()
        } else {
            format!("{}:{}", self.key_prefix, key)
        }
    }

    async fn connection(&self) -> StoreResult<Connection> {
        self.pool
            .get()
            .await
            .map_err(|e| StoreError::Backend(format!("Failed to get connection from pool: {}", e)))
    }

    fn decode(value: Option<Vec<u8>>) -> StoreResult<Option<HandshakeRecord>> {
        value
            .map(|bytes| HandshakeRecord::from_json(&bytes))
            .transpose()
            .map_err(StoreError::from)
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn get(&self, key: &str) -> StoreResult<Option<HandshakeRecord>> {
        let mut conn = self.connection().await?;
        let value: Option<Vec<u8>> = conn
            .get(self.build_key(key))
            .await
            .map_err(|e| StoreError::Backend(format!("Failed to get value from Redis: {}", e)))?;
        Self::decode(value)
    }

    async fn set(&self, key: &str, record: &HandshakeRecord) -> StoreResult<()> {
        let full_key = self.build_key(key);
        let serialized = record.to_json()?;
        let mut conn = self.connection().await?;

        match self.expiration {
            Some(expiration) => {
                let seconds = expiration.as_secs().max(1);
                let _: () = conn.set_ex(&full_key, serialized, seconds).await.map_err(|e| {
                    StoreError::Backend(format!("Failed to set value in Redis: {}", e))
                })?;
            }
            None => {
                let _: () = conn.set(&full_key, serialized).await.map_err(|e| {
                    StoreError::Backend(format!("Failed to set value in Redis: {}", e))
                })?;
            }
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        let mut conn = self.connection().await?;
        let _: () = conn.del(self.build_key(key)).await.map_err(|e| {
            StoreError::Backend(format!("Failed to delete value from Redis: {}", e))
        })?;
        Ok(())
    }

    async fn take(&self, key: &str) -> StoreResult<Option<HandshakeRecord>> {
        let mut conn = self.connection().await?;
        let value: Option<Vec<u8>> = conn.get_del(self.build_key(key)).await.map_err(|e| {
            StoreError::Backend(format!("Failed to take value from Redis: {}", e))
        })?;
        debug!("GETDEL on handshake key returned {}", value.is_some());
        Self::decode(value)
    }
}
