//! Cluster registry
//!
//! Resolves cluster identifiers to live cluster handles. Configured
//! clusters are opened lazily on first resolve and then shared by every
//! file handle bound to them. Only the registry creates or retires
//! cluster handles.

use crate::cluster::{Cluster, ClusterResult};
use crate::config::{BackendSpec, KineticConfig};
use crate::memory::MemoryCluster;
use crate::rocks::{RocksCluster, RocksSettings};
use crate::sled_cluster::SledCluster;
use kineticio_core::{KineticIoError, Result};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

enum Entry {
    /// Known from configuration, not opened yet
    Configured(Arc<PendingOpen>),
    Live(Arc<dyn Cluster>),
}

/// Backend waiting for its first resolve. `gate` admits one opener at a
/// time; the registry map stays unlocked while the backend opens.
struct PendingOpen {
    spec: BackendSpec,
    gate: Mutex<()>,
}

/// Registry of known clusters
pub struct ClusterRegistry {
    entries: RwLock<HashMap<String, Entry>>,
    lookups: AtomicU64,
}

impl ClusterRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            lookups: AtomicU64::new(0),
        }
    }

    /// Create a registry knowing every cluster in `config`. Nothing is
    /// opened until a cluster is resolved.
    pub fn from_config(config: &KineticConfig) -> Self {
        let entries = config
            .clusters
            .iter()
            .map(|spec| {
                let pending = PendingOpen {
                    spec: spec.backend.clone(),
                    gate: Mutex::new(()),
                };
                (spec.id.clone(), Entry::Configured(Arc::new(pending)))
            })
            .collect();

        info!(clusters = config.clusters.len(), "Cluster registry initialized");

        Self {
            entries: RwLock::new(entries),
            lookups: AtomicU64::new(0),
        }
    }

    /// Register a live cluster under its own id, returning the handle it
    /// replaced (if any was live).
    pub fn register(&self, cluster: Arc<dyn Cluster>) -> Option<Arc<dyn Cluster>> {
        let id = cluster.id().to_string();
        debug!(cluster_id = %id, "Registering cluster");

        match self.entries.write().insert(id, Entry::Live(cluster)) {
            Some(Entry::Live(previous)) => Some(previous),
            _ => None,
        }
    }

    /// Forget a cluster. File handles already bound to it keep their
    /// reference; later resolves report `ClusterNotFound`.
    pub fn retire(&self, cluster_id: &str) -> bool {
        let removed = self.entries.write().remove(cluster_id).is_some();
        if removed {
            info!(cluster_id = %cluster_id, "Cluster retired");
        }
        removed
    }

    /// Resolve a cluster id to a live handle.
    ///
    /// Callers must have validated the address first; this is where
    /// configuration lookups and backend opens happen.
    pub fn resolve(&self, cluster_id: &str) -> Result<Arc<dyn Cluster>> {
        self.lookups.fetch_add(1, Ordering::Relaxed);

        let pending = match self.entries.read().get(cluster_id) {
            Some(Entry::Live(cluster)) => return Ok(Arc::clone(cluster)),
            Some(Entry::Configured(pending)) => Arc::clone(pending),
            None => return Err(not_configured(cluster_id)),
        };

        // A second open of a sled or rocks path fails on the database
        // lock, so openers of one cluster queue on its gate.
        let _gate = pending.gate.lock();
        match self.entries.read().get(cluster_id) {
            Some(Entry::Live(cluster)) => return Ok(Arc::clone(cluster)),
            Some(Entry::Configured(_)) => {}
            None => return Err(not_configured(cluster_id)),
        }

        let cluster = open_backend(cluster_id, &pending.spec).map_err(|e| {
            KineticIoError::ClusterNotFound {
                cluster_id: cluster_id.to_string(),
                reason: format!("failed to open: {e}"),
            }
        })?;

        info!(cluster_id = %cluster_id, "Cluster opened");
        let mut entries = self.entries.write();
        // Retired while opening: the caller still gets the handle
        let still_pending = matches!(
            entries.get(cluster_id),
            Some(Entry::Configured(current)) if Arc::ptr_eq(current, &pending)
        );
        if still_pending {
            entries.insert(cluster_id.to_string(), Entry::Live(Arc::clone(&cluster)));
        }
        Ok(cluster)
    }

    /// Whether `cluster_id` has a live handle
    pub fn is_live(&self, cluster_id: &str) -> bool {
        matches!(self.entries.read().get(cluster_id), Some(Entry::Live(_)))
    }

    /// Known cluster ids, sorted
    pub fn cluster_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.entries.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Number of `resolve` calls so far
    pub fn lookups(&self) -> u64 {
        self.lookups.load(Ordering::Relaxed)
    }
}

impl Default for ClusterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn not_configured(cluster_id: &str) -> KineticIoError {
    KineticIoError::ClusterNotFound {
        cluster_id: cluster_id.to_string(),
        reason: "not configured".to_string(),
    }
}

fn open_backend(cluster_id: &str, spec: &BackendSpec) -> ClusterResult<Arc<dyn Cluster>> {
    let cluster: Arc<dyn Cluster> = match spec {
        BackendSpec::Memory { capacity_bytes } => {
            Arc::new(MemoryCluster::with_capacity(cluster_id, *capacity_bytes))
        }
        BackendSpec::Sled { path } => Arc::new(SledCluster::open(cluster_id, path)?),
        BackendSpec::Rocks {
            path,
            cache_size,
            capacity_bytes,
        } => {
            let settings = RocksSettings::new(path)
                .with_cache_size(*cache_size)
                .with_max_capacity(*capacity_bytes);
            Arc::new(RocksCluster::open(cluster_id, settings)?)
        }
    };
    Ok(cluster)
}
