//! In-memory cluster
//!
//! Used for testing and ephemeral clusters. Not persistent.

use crate::cluster::{Cluster, ClusterResult, ClusterStats};
use bytes::Bytes;
use kineticio_core::{ChunkKey, ClusterError};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// In-memory cluster
pub struct MemoryCluster {
    id: String,

    /// Chunk storage, keyed by rendered chunk key
    values: RwLock<HashMap<String, Bytes>>,

    /// Maximum capacity (0 = unlimited)
    max_capacity: u64,

    /// Current bytes used
    bytes_used: AtomicU64,

    /// Operation counters
    reads: AtomicU64,
    writes: AtomicU64,
    deletes: AtomicU64,
}

impl MemoryCluster {
    /// Create a new in-memory cluster
    pub fn new(id: impl Into<String>) -> Self {
        Self::with_capacity(id, 0)
    }

    /// Create with a maximum capacity
    pub fn with_capacity(id: impl Into<String>, max_bytes: u64) -> Self {
        Self {
            id: id.into(),
            values: RwLock::new(HashMap::new()),
            max_capacity: max_bytes,
            bytes_used: AtomicU64::new(0),
            reads: AtomicU64::new(0),
            writes: AtomicU64::new(0),
            deletes: AtomicU64::new(0),
        }
    }

    /// All stored keys, sorted
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.values.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Clear all stored values
    pub fn clear(&self) {
        let mut values = self.values.write();
        values.clear();
        self.bytes_used.store(0, Ordering::SeqCst);
    }
}

impl Cluster for MemoryCluster {
    fn id(&self) -> &str {
        &self.id
    }

    fn get(&self, key: &ChunkKey) -> ClusterResult<Option<Bytes>> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        let values = self.values.read();
        Ok(values.get(key.as_str()).cloned())
    }

    fn put(&self, key: &ChunkKey, value: Bytes) -> ClusterResult<()> {
        let value_len = value.len() as u64;
        let mut values = self.values.write();
        let replaced = values.get(key.as_str()).map_or(0, |old| old.len() as u64);

        // Check capacity
        if self.max_capacity > 0 {
            let current = self.bytes_used.load(Ordering::SeqCst);
            if current - replaced + value_len > self.max_capacity {
                return Err(ClusterError::CapacityExceeded {
                    used: current,
                    capacity: self.max_capacity,
                });
            }
        }

        values.insert(key.as_str().to_string(), value);
        self.bytes_used.fetch_sub(replaced, Ordering::SeqCst);
        self.bytes_used.fetch_add(value_len, Ordering::SeqCst);
        self.writes.fetch_add(1, Ordering::Relaxed);

        Ok(())
    }

    fn exists(&self, key: &ChunkKey) -> ClusterResult<bool> {
        let values = self.values.read();
        Ok(values.contains_key(key.as_str()))
    }

    fn delete(&self, key: &ChunkKey) -> ClusterResult<bool> {
        let mut values = self.values.write();

        if let Some(old) = values.remove(key.as_str()) {
            self.bytes_used.fetch_sub(old.len() as u64, Ordering::SeqCst);
            self.deletes.fetch_add(1, Ordering::Relaxed);
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn flush(&self) -> ClusterResult<()> {
        // Nothing is buffered
        Ok(())
    }

    fn stats(&self) -> ClusterResult<ClusterStats> {
        let values = self.values.read();
        Ok(ClusterStats {
            key_count: values.len() as u64,
            bytes_used: self.bytes_used.load(Ordering::SeqCst),
            bytes_capacity: self.max_capacity,
            reads: self.reads.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
            avg_read_latency_us: 0,
            avg_write_latency_us: 0,
        })
    }
}
