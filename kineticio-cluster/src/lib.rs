//! KineticIO Cluster Layer
//!
//! Provides the device cluster contract and its implementations:
//! - `Cluster` trait: get/put/exists by chunk key
//! - `MemoryCluster` for testing and ephemeral data
//! - `SledCluster` and `RocksCluster` for persistent clusters
//! - `ClusterRegistry` resolving cluster ids to live handles
//! - `KineticConfig` TOML configuration

pub mod cluster;
pub mod config;
pub mod memory;
pub mod registry;
pub mod rocks;
pub mod sled_cluster;

pub use cluster::{Cluster, ClusterResult, ClusterStats};
pub use config::{BackendSpec, ClusterSpec, ConfigError, KineticConfig, LayoutSettings};
pub use memory::MemoryCluster;
pub use registry::ClusterRegistry;
pub use rocks::{RocksCluster, RocksSettings};
pub use sled_cluster::SledCluster;
