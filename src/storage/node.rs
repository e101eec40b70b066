use std::collections::HashMap;
use std::path::Path;

use crate::cluster::NodeId;

use super::cache::LruCache;
use super::wal::{StoreError, WalStore};

/// One logical node: a WAL-backed store fronted by an LRU read cache.
///
/// The node id is immutable for the node's lifetime and names the WAL file
/// (`<id>.wal`) inside the data directory.
pub struct StorageNode {
    id: NodeId,
    store: WalStore,
    cache: LruCache<String, String>,
}

impl StorageNode {
    pub fn open(
        id: NodeId,
        data_dir: &Path,
        cache_capacity: usize,
    ) -> Result<Self, StoreError> {
        let store = WalStore::open(data_dir.join(format!("{id}.wal")))?;
        Ok(Self {
            id,
            store,
            cache: LruCache::new(cache_capacity),
        })
    }

    pub fn id(&self) -> &NodeId {
        &self.id
    }

    /// Path of this node's backing log file.
    pub fn wal_path(&self) -> &Path {
        self.store.path()
    }

    pub fn put(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.store.put(key, value)?;
        self.cache.put(key.to_string(), value.to_string());
        Ok(())
    }

    /// Cache first; a store hit populates the cache on the way out.
    pub fn get(&self, key: &str) -> Option<String> {
        if let Some(value) = self.cache.get(key) {
            return Some(value);
        }
        let value = self.store.get(key)?;
        self.cache.put(key.to_string(), value.clone());
        Some(value)
    }

    pub fn remove(&self, key: &str) -> Result<bool, StoreError> {
        let removed = self.store.remove(key)?;
        self.cache.remove(key);
        Ok(removed)
    }

    pub fn put_batch(&self, entries: &HashMap<String, String>) -> Result<(), StoreError> {
        self.store.put_batch(entries)?;
        for (key, value) in entries {
            self.cache.put(key.clone(), value.clone());
        }
        Ok(())
    }

    pub fn remove_batch(&self, keys: &[String]) -> Result<usize, StoreError> {
        let removed = self.store.remove_batch(keys)?;
        for key in keys {
            self.cache.remove(key);
        }
        Ok(removed)
    }

    pub fn all_keys(&self) -> Vec<String> {
        self.store.all_keys()
    }

    pub fn all_data(&self) -> HashMap<String, String> {
        self.store.all_data()
    }

    pub fn key_count(&self) -> usize {
        self.store.len()
    }

    /// Snapshot of the entries whose keys satisfy `predicate`; the
    /// redistribution planner uses this to select keys to move.
    pub fn keys_for_redistribution(
        &self,
        predicate: impl Fn(&str) -> bool,
    ) -> HashMap<String, String> {
        self.store
            .all_data()
            .into_iter()
            .filter(|(key, _)| predicate(key))
            .collect()
    }
}
