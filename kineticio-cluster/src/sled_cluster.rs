//! Sled-based cluster
//!
//! Persists chunks in a single sled tree. Sled is pure Rust and needs no
//! external service, which makes it a convenient single-device cluster.

use crate::cluster::{Cluster, ClusterResult, ClusterStats};
use bytes::Bytes;
use kineticio_core::{ChunkKey, ClusterError};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info};

const TREE_CHUNKS: &str = "chunks";

fn device_error(err: sled::Error) -> ClusterError {
    match err {
        sled::Error::Io(e) => ClusterError::Io(e),
        other => ClusterError::Device(other.to_string()),
    }
}

/// Sled-backed cluster
pub struct SledCluster {
    id: String,
    db: sled::Db,
    chunks: sled::Tree,

    /// Operation counters
    reads: AtomicU64,
    writes: AtomicU64,
    deletes: AtomicU64,
}

impl SledCluster {
    /// Open or create a cluster store at `path`
    pub fn open<P: AsRef<Path>>(id: impl Into<String>, path: P) -> ClusterResult<Self> {
        let id = id.into();
        info!(cluster_id = %id, path = ?path.as_ref(), "Opening Sled cluster");

        let db = sled::open(path.as_ref()).map_err(device_error)?;
        Self::from_db(id, db)
    }

    /// Open a throwaway store (for testing)
    pub fn open_temporary(id: impl Into<String>) -> ClusterResult<Self> {
        let db = sled::Config::new()
            .temporary(true)
            .open()
            .map_err(device_error)?;
        Self::from_db(id.into(), db)
    }

    fn from_db(id: String, db: sled::Db) -> ClusterResult<Self> {
        let chunks = db.open_tree(TREE_CHUNKS).map_err(device_error)?;
        Ok(Self {
            id,
            db,
            chunks,
            reads: AtomicU64::new(0),
            writes: AtomicU64::new(0),
            deletes: AtomicU64::new(0),
        })
    }
}

impl Cluster for SledCluster {
    fn id(&self) -> &str {
        &self.id
    }

    fn get(&self, key: &ChunkKey) -> ClusterResult<Option<Bytes>> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        let value = self.chunks.get(key.as_bytes()).map_err(device_error)?;
        Ok(value.map(|v| Bytes::copy_from_slice(&v)))
    }

    fn put(&self, key: &ChunkKey, value: Bytes) -> ClusterResult<()> {
        self.chunks
            .insert(key.as_bytes(), value.as_ref())
            .map_err(device_error)?;
        self.writes.fetch_add(1, Ordering::Relaxed);
        debug!(cluster_id = %self.id, key = %key, size = value.len(), "Stored chunk");
        Ok(())
    }

    fn exists(&self, key: &ChunkKey) -> ClusterResult<bool> {
        self.chunks.contains_key(key.as_bytes()).map_err(device_error)
    }

    fn delete(&self, key: &ChunkKey) -> ClusterResult<bool> {
        let removed = self.chunks.remove(key.as_bytes()).map_err(device_error)?;
        if removed.is_some() {
            self.deletes.fetch_add(1, Ordering::Relaxed);
        }
        Ok(removed.is_some())
    }

    fn flush(&self) -> ClusterResult<()> {
        self.db.flush().map_err(device_error)?;
        Ok(())
    }

    fn stats(&self) -> ClusterResult<ClusterStats> {
        let mut key_count = 0u64;
        let mut bytes_used = 0u64;
        for item in self.chunks.iter() {
            let (_, value) = item.map_err(device_error)?;
            key_count += 1;
            bytes_used += value.len() as u64;
        }

        Ok(ClusterStats {
            key_count,
            bytes_used,
            bytes_capacity: 0,
            reads: self.reads.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
            avg_read_latency_us: 0,
            avg_write_latency_us: 0,
        })
    }
}
