//! RocksDB cluster
//!
//! Persistent cluster on a RocksDB LSM tree, tuned for chunk-sized values
//! with high write throughput.

use crate::cluster::{Cluster, ClusterResult, ClusterStats};
use bytes::Bytes;
use kineticio_core::{ChunkKey, ClusterError};
use rocksdb::{BlockBasedOptions, Cache, DBCompressionType, Options, WriteOptions, DB};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Column family holding chunk values
const CF_CHUNKS: &str = "chunks";

fn device_error(context: &str, err: rocksdb::Error) -> ClusterError {
    ClusterError::Device(format!("{context}: {err}"))
}

/// RocksDB tuning settings
#[derive(Debug, Clone)]
pub struct RocksSettings {
    /// Path to the database directory
    pub path: PathBuf,

    /// Maximum capacity in bytes (0 = unlimited)
    pub max_capacity: u64,

    /// Enable LZ4 compression for stored chunks
    pub compression: bool,

    /// Block cache size in bytes
    pub cache_size: usize,

    /// Number of background compaction threads
    pub compaction_threads: usize,
}

impl Default for RocksSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./kineticio_data"),
            max_capacity: 0,
            compression: true,
            cache_size: 64 * 1024 * 1024, // 64 MB
            compaction_threads: 2,
        }
    }
}

impl RocksSettings {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn with_max_capacity(mut self, bytes: u64) -> Self {
        self.max_capacity = bytes;
        self
    }

    pub fn with_cache_size(mut self, bytes: usize) -> Self {
        self.cache_size = bytes;
        self
    }
}

/// RocksDB-backed cluster
pub struct RocksCluster {
    id: String,
    db: DB,
    settings: RocksSettings,

    /// Operation counters
    reads: AtomicU64,
    writes: AtomicU64,
    deletes: AtomicU64,

    /// Cumulative latency in microseconds
    read_latency_total_us: AtomicU64,
    write_latency_total_us: AtomicU64,
}

impl RocksCluster {
    /// Open or create a RocksDB cluster
    pub fn open(id: impl Into<String>, settings: RocksSettings) -> ClusterResult<Self> {
        let id = id.into();
        info!(cluster_id = %id, path = ?settings.path, "Opening RocksDB cluster");

        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);
        opts.set_max_open_files(1000);
        opts.set_keep_log_file_num(10);
        opts.increase_parallelism(settings.compaction_threads as i32);
        opts.set_max_background_jobs(settings.compaction_threads as i32);

        if settings.compression {
            opts.set_compression_type(DBCompressionType::Lz4);
        }

        let cache = Cache::new_lru_cache(settings.cache_size);
        let mut block_opts = BlockBasedOptions::default();
        block_opts.set_block_cache(&cache);
        block_opts.set_block_size(64 * 1024); // 64KB blocks (1MB chunks)
        block_opts.set_cache_index_and_filter_blocks(true);
        opts.set_block_based_table_factory(&block_opts);

        // Chunks are large values
        opts.set_min_write_buffer_number(2);
        opts.set_max_write_buffer_number(4);
        opts.set_write_buffer_size(64 * 1024 * 1024);

        let cf_descriptors = vec![rocksdb::ColumnFamilyDescriptor::new(
            CF_CHUNKS,
            opts.clone(),
        )];

        std::fs::create_dir_all(&settings.path)?;

        let db = DB::open_cf_descriptors(&opts, &settings.path, cf_descriptors)
            .map_err(|e| device_error("failed to open RocksDB", e))?;

        Ok(Self {
            id,
            db,
            settings,
            reads: AtomicU64::new(0),
            writes: AtomicU64::new(0),
            deletes: AtomicU64::new(0),
            read_latency_total_us: AtomicU64::new(0),
            write_latency_total_us: AtomicU64::new(0),
        })
    }

    fn cf_chunks(&self) -> ClusterResult<Arc<rocksdb::BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(CF_CHUNKS)
            .ok_or_else(|| ClusterError::Device(format!("missing column family '{CF_CHUNKS}'")))
    }

    /// Get approximate on-disk size
    pub fn approximate_size(&self) -> u64 {
        self.db
            .property_int_value("rocksdb.total-sst-files-size")
            .ok()
            .flatten()
            .unwrap_or(0)
    }
}

impl Cluster for RocksCluster {
    fn id(&self) -> &str {
        &self.id
    }

    fn get(&self, key: &ChunkKey) -> ClusterResult<Option<Bytes>> {
        let start = Instant::now();
        let cf = self.cf_chunks()?;

        let value = self
            .db
            .get_cf(&cf, key.as_bytes())
            .map_err(|e| device_error("read failed", e))?;

        let elapsed_us = start.elapsed().as_micros() as u64;
        self.read_latency_total_us
            .fetch_add(elapsed_us, Ordering::Relaxed);
        self.reads.fetch_add(1, Ordering::Relaxed);

        Ok(value.map(Bytes::from))
    }

    fn put(&self, key: &ChunkKey, value: Bytes) -> ClusterResult<()> {
        let start = Instant::now();

        if self.settings.max_capacity > 0 {
            let used = self.approximate_size();
            if used + value.len() as u64 > self.settings.max_capacity {
                return Err(ClusterError::CapacityExceeded {
                    used,
                    capacity: self.settings.max_capacity,
                });
            }
        }

        let mut write_opts = WriteOptions::default();
        write_opts.set_sync(false);

        let cf = self.cf_chunks()?;
        self.db
            .put_cf_opt(&cf, key.as_bytes(), &value, &write_opts)
            .map_err(|e| device_error("write failed", e))?;

        let elapsed_us = start.elapsed().as_micros() as u64;
        self.write_latency_total_us
            .fetch_add(elapsed_us, Ordering::Relaxed);
        self.writes.fetch_add(1, Ordering::Relaxed);
        debug!(cluster_id = %self.id, key = %key, size = value.len(), latency_us = elapsed_us, "Stored chunk");

        Ok(())
    }

    fn exists(&self, key: &ChunkKey) -> ClusterResult<bool> {
        let cf = self.cf_chunks()?;

        // key_may_exist has no false negatives
        if !self.db.key_may_exist_cf(&cf, key.as_bytes()) {
            return Ok(false);
        }

        let value = self
            .db
            .get_pinned_cf(&cf, key.as_bytes())
            .map_err(|e| device_error("exists check failed", e))?;
        Ok(value.is_some())
    }

    fn delete(&self, key: &ChunkKey) -> ClusterResult<bool> {
        if !self.exists(key)? {
            return Ok(false);
        }

        let cf = self.cf_chunks()?;
        self.db
            .delete_cf(&cf, key.as_bytes())
            .map_err(|e| device_error("delete failed", e))?;

        self.deletes.fetch_add(1, Ordering::Relaxed);
        debug!(cluster_id = %self.id, key = %key, "Deleted chunk");
        Ok(true)
    }

    fn flush(&self) -> ClusterResult<()> {
        let cf = self.cf_chunks()?;
        self.db
            .flush_cf(&cf)
            .map_err(|e| device_error("flush failed", e))
    }

    fn stats(&self) -> ClusterResult<ClusterStats> {
        let cf = self.cf_chunks()?;
        let mut key_count = 0u64;
        let mut bytes_used = 0u64;

        for item in self.db.iterator_cf(&cf, rocksdb::IteratorMode::Start) {
            let (_, value) = item.map_err(|e| device_error("scan failed", e))?;
            key_count += 1;
            bytes_used += value.len() as u64;
        }

        let reads = self.reads.load(Ordering::Relaxed);
        let writes = self.writes.load(Ordering::Relaxed);
        let avg_read_latency_us = self
            .read_latency_total_us
            .load(Ordering::Relaxed)
            .checked_div(reads)
            .unwrap_or(0);
        let avg_write_latency_us = self
            .write_latency_total_us
            .load(Ordering::Relaxed)
            .checked_div(writes)
            .unwrap_or(0);

        Ok(ClusterStats {
            key_count,
            bytes_used,
            bytes_capacity: self.settings.max_capacity,
            reads,
            writes,
            deletes: self.deletes.load(Ordering::Relaxed),
            avg_read_latency_us,
            avg_write_latency_us,
        })
    }
}

impl Drop for RocksCluster {
    fn drop(&mut self) {
        info!(cluster_id = %self.id, "Closing RocksDB cluster");
    }
}
