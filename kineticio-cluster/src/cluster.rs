//! Cluster contract
//!
//! Defines the interface every device cluster must satisfy to hold file
//! chunks. Values are whole chunks; a put always replaces the previous
//! value under that key.

use bytes::Bytes;
use kineticio_core::{ChunkKey, ClusterError};

/// Result type for cluster operations
pub type ClusterResult<T> = std::result::Result<T, ClusterError>;

/// Cluster statistics
#[derive(Debug, Clone, Default)]
pub struct ClusterStats {
    /// Number of keys stored
    pub key_count: u64,

    /// Total bytes used by values
    pub bytes_used: u64,

    /// Total capacity (0 = unlimited)
    pub bytes_capacity: u64,

    /// Number of get operations
    pub reads: u64,

    /// Number of put operations
    pub writes: u64,

    /// Number of delete operations
    pub deletes: u64,

    /// Average get latency in microseconds
    pub avg_read_latency_us: u64,

    /// Average put latency in microseconds
    pub avg_write_latency_us: u64,
}

impl ClusterStats {
    /// Calculate usage percentage
    pub fn usage_percent(&self) -> f64 {
        if self.bytes_capacity == 0 {
            0.0
        } else {
            (self.bytes_used as f64 / self.bytes_capacity as f64) * 100.0
        }
    }

    /// Check if the cluster is full
    pub fn is_full(&self) -> bool {
        self.bytes_capacity > 0 && self.bytes_used >= self.bytes_capacity
    }

    /// Available space in bytes
    pub fn bytes_available(&self) -> u64 {
        if self.bytes_capacity == 0 {
            u64::MAX
        } else {
            self.bytes_capacity.saturating_sub(self.bytes_used)
        }
    }
}

/// A set of storage devices addressed collectively by one identifier.
///
/// Implementations are shared between threads and file handles, and may
/// block on device I/O.
pub trait Cluster: Send + Sync {
    /// Identifier this cluster is registered under
    fn id(&self) -> &str;

    /// Retrieve a value; `None` if the key is absent
    fn get(&self, key: &ChunkKey) -> ClusterResult<Option<Bytes>>;

    /// Store a value, replacing any previous one
    fn put(&self, key: &ChunkKey, value: Bytes) -> ClusterResult<()>;

    /// Check if a key exists
    fn exists(&self, key: &ChunkKey) -> ClusterResult<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Remove a value; `false` if it was not present
    fn delete(&self, key: &ChunkKey) -> ClusterResult<bool>;

    /// Flush any pending writes to the devices
    fn flush(&self) -> ClusterResult<()>;

    /// Get cluster statistics
    fn stats(&self) -> ClusterResult<ClusterStats>;
}
