//! Key-Value Store implementations

use crate::traits::*;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::ops::Bound;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::debug;

/// In-memory key-value store implementation
#[derive(Debug, Clone)]
pub struct MemoryKVStore<V> {
    data: Arc<RwLock<BTreeMap<String, V>>>,
}

impl<V> Default for MemoryKVStore<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> MemoryKVStore<V> {
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }

    fn with_entries(entries: BTreeMap<String, V>) -> Self {
        Self {
            data: Arc::new(RwLock::new(entries)),
        }
    }
}

#[async_trait]
impl<V> KVStore for MemoryKVStore<V>
where
    V: Clone + Send + Sync + 'static,
{
    type Value = V;

    async fn get(&self, key: &str) -> KVStoreResult<Option<V>> {
        Ok(self.data.read().await.get(key).cloned())
    }

    async fn put(&self, key: String, value: V) -> KVStoreResult<()> {
        self.data.write().await.insert(key, value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> KVStoreResult<Option<V>> {
        Ok(self.data.write().await.remove(key))
    }

    async fn contains_key(&self, key: &str) -> KVStoreResult<bool> {
        Ok(self.data.read().await.contains_key(key))
    }

    async fn scan_prefix(&self, prefix: &str) -> KVStoreResult<Vec<(String, V)>> {
        let data = self.data.read().await;
        Ok(data
            .range::<str, _>((Bound::Included(prefix), Bound::Unbounded))
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect())
    }

    async fn len(&self) -> KVStoreResult<usize> {
        Ok(self.data.read().await.len())
    }
}

/// A [`MemoryKVStore`] mirrored to one file.
///
/// The whole map is bincode-encoded and rewritten on every
/// [`KVStore::flush`]; writes between flushes live only in memory.
#[derive(Debug)]
pub struct FileKVStore<V> {
    path: PathBuf,
    store: MemoryKVStore<V>,
}

impl<V> FileKVStore<V>
where
    V: Clone + Send + Sync + bincode::Encode + bincode::Decode<()> + 'static,
{
    /// Open the store at `path`, loading it when the file exists and
    /// creating it (with any missing parent directories) otherwise. An
    /// existing empty file is an empty store.
    pub async fn open<P: AsRef<Path>>(path: P) -> KVStoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        if path.is_dir() {
            return Err(KVStoreError::ConfigurationError(format!(
                "{} is a directory",
                path.display()
            )));
        }

        if path.exists() {
            let entries = Self::load(&path).await?;
            debug!("Opened kv store {} with {} entries", path.display(), entries.len());
            return Ok(Self {
                path,
                store: MemoryKVStore::with_entries(entries),
            });
        }

        // Write the empty store now so an unusable location fails here
        // rather than on the first flush.
        let store = Self {
            path,
            store: MemoryKVStore::new(),
        };
        store.flush().await?;
        debug!("Created kv store {}", store.path.display());
        Ok(store)
    }

    async fn load(path: &Path) -> KVStoreResult<BTreeMap<String, V>> {
        let buffer = fs::read(path).await?;
        if buffer.is_empty() {
            return Ok(BTreeMap::new());
        }
        let (entries, _) = bincode::decode_from_slice(&buffer, bincode::config::standard())
            .map_err(|e| KVStoreError::DeserializationError(e.to_string()))?;
        Ok(entries)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl<V> KVStore for FileKVStore<V>
where
    V: Clone + Send + Sync + bincode::Encode + bincode::Decode<()> + 'static,
{
    type Value = V;

    async fn get(&self, key: &str) -> KVStoreResult<Option<V>> {
        self.store.get(key).await
    }

    async fn put(&self, key: String, value: V) -> KVStoreResult<()> {
        self.store.put(key, value).await
    }

    async fn remove(&self, key: &str) -> KVStoreResult<Option<V>> {
        self.store.remove(key).await
    }

    async fn contains_key(&self, key: &str) -> KVStoreResult<bool> {
        self.store.contains_key(key).await
    }

    async fn scan_prefix(&self, prefix: &str) -> KVStoreResult<Vec<(String, V)>> {
        self.store.scan_prefix(prefix).await
    }

    async fn len(&self) -> KVStoreResult<usize> {
        self.store.len().await
    }

    async fn flush(&self) -> KVStoreResult<()> {
        let bytes = {
            let data = self.store.data.read().await;
            bincode::encode_to_vec(&*data, bincode::config::standard())
                .map_err(|e| KVStoreError::SerializationError(e.to_string()))?
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        // Write next to the target and rename so a crash never leaves a torn file.
        let staging = self.path.with_extension("tmp");
        let mut file = File::create(&staging).await?;
        file.write_all(&bytes).await?;
        file.sync_all().await?;
        fs::rename(&staging, &self.path).await?;

        debug!("Flushed {} bytes to kv store {}", bytes.len(), self.path.display());
        Ok(())
    }
}
