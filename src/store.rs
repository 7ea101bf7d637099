//! Swap Store
//!
//! Persistence gateway for decoded swaps. Every write is an idempotent upsert
//! keyed by the storage key: create if absent, otherwise overwrite all fields.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use thiserror::Error;

use crate::record::DecodedSwapRecord;

/// Default Redis key prefix for swap hashes
pub const DEFAULT_KEY_PREFIX: &str = "swap";

/// Errors that can occur while persisting
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Idempotent upsert of swap records
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SwapStore: Send + Sync {
    /// Create or fully overwrite the record stored under `key`
    async fn upsert(&self, key: &str, record: &DecodedSwapRecord) -> Result<(), StoreError>;
}

/// Redis-backed store writing one hash per key
pub struct RedisSwapStore {
    connection: MultiplexedConnection,
    key_prefix: String,
}

impl RedisSwapStore {
    pub fn new(connection: MultiplexedConnection, key_prefix: impl Into<String>) -> Self {
        Self {
            connection,
            key_prefix: key_prefix.into(),
        }
    }

    /// Open a multiplexed connection to `url`
    pub async fn connect(url: &str, key_prefix: impl Into<String>) -> Result<Self, StoreError> {
        let client = redis::Client::open(url)?;
        let connection = client.get_multiplexed_async_connection().await?;
        Ok(Self::new(connection, key_prefix))
    }

    /// Redis key of the hash holding `key`
    pub fn redis_key(&self, key: &str) -> String {
        redis_key(&self.key_prefix, key)
    }

    pub fn key_prefix(&self) -> &str {
        &self.key_prefix
    }
}

/// Build `prefix:key`
pub fn redis_key(prefix: &str, key: &str) -> String {
    format!("{prefix}:{key}")
}

#[async_trait]
impl SwapStore for RedisSwapStore {
    async fn upsert(&self, key: &str, record: &DecodedSwapRecord) -> Result<(), StoreError> {
        let mut connection = self.connection.clone();
        let fields = record.fields();
        connection
            .hset_multiple::<_, _, _, ()>(self.redis_key(key), &fields[..])
            .await?;
        Ok(())
    }
}

/// In-process store keeping the latest record per key
#[derive(Default)]
pub struct MemorySwapStore {
    records: Mutex<HashMap<String, DecodedSwapRecord>>,
    writes: Mutex<Vec<String>>,
}

impl MemorySwapStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<DecodedSwapRecord> {
        lock(&self.records).get(key).cloned()
    }

    /// Number of distinct keys stored
    pub fn len(&self) -> usize {
        lock(&self.records).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.records).is_empty()
    }

    /// Keys in the order upserts were received
    pub fn writes(&self) -> Vec<String> {
        lock(&self.writes).clone()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[async_trait]
impl SwapStore for MemorySwapStore {
    async fn upsert(&self, key: &str, record: &DecodedSwapRecord) -> Result<(), StoreError> {
        lock(&self.records).insert(key.to_string(), record.clone());
        lock(&self.writes).push(key.to_string());
        Ok(())
    }
}
