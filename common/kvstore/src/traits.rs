//! Key-Value Store traits

use async_trait::async_trait;
use thiserror::Error;

/// Error types for KV store operations
#[derive(Error, Debug, Clone)]
pub enum KVStoreError {
    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    #[error("IO error: {0}")]
    IoError(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

impl From<std::io::Error> for KVStoreError {
    fn from(err: std::io::Error) -> Self {
        KVStoreError::IoError(err.to_string())
    }
}

pub type KVStoreResult<T> = Result<T, KVStoreError>;

/// An ordered map from string keys to values.
///
/// Keys are kept sorted, so related entries can share a `/`-separated
/// prefix and be listed together with [`KVStore::scan_prefix`].
#[async_trait]
pub trait KVStore: Send + Sync {
    type Value: Clone + Send + Sync;

    async fn get(&self, key: &str) -> KVStoreResult<Option<Self::Value>>;

    /// Insert or overwrite `key`.
    async fn put(&self, key: String, value: Self::Value) -> KVStoreResult<()>;

    /// Remove `key`, returning its previous value.
    async fn remove(&self, key: &str) -> KVStoreResult<Option<Self::Value>>;

    async fn contains_key(&self, key: &str) -> KVStoreResult<bool>;

    /// Every entry whose key starts with `prefix`, in key order.
    async fn scan_prefix(&self, prefix: &str) -> KVStoreResult<Vec<(String, Self::Value)>>;

    async fn len(&self) -> KVStoreResult<usize>;

    /// Make every completed write durable. Stores without a durable
    /// medium have nothing to do here.
    async fn flush(&self) -> KVStoreResult<()> {
        Ok(())
    }
}
