//! Configuration management
//!
//! Loads the chunk layout and the set of known clusters from a TOML file,
//! with environment variable overrides.

use kineticio_core::{ChunkLayout, KineticIoError, DEFAULT_CHUNK_SIZE};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable overriding the chunk size
pub const ENV_CHUNK_SIZE: &str = "KINETICIO_CHUNK_SIZE";

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

impl From<ConfigError> for KineticIoError {
    fn from(err: ConfigError) -> Self {
        KineticIoError::Configuration(err.to_string())
    }
}

/// Complete kineticio configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KineticConfig {
    /// Chunk layout shared by every file
    #[serde(default)]
    pub layout: LayoutSettings,

    /// Known clusters
    #[serde(default)]
    pub clusters: Vec<ClusterSpec>,
}

/// Chunk layout settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutSettings {
    /// Chunk size in bytes
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

impl Default for LayoutSettings {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
        }
    }
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

/// One configured cluster
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterSpec {
    /// Identifier used in addresses
    pub id: String,

    #[serde(flatten)]
    pub backend: BackendSpec,
}

/// Backend a cluster is opened with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum BackendSpec {
    /// Ephemeral in-memory cluster
    Memory {
        /// Maximum capacity (0 = unlimited)
        #[serde(default)]
        capacity_bytes: u64,
    },

    /// Sled database at `path`
    Sled { path: PathBuf },

    /// RocksDB database at `path`
    Rocks {
        path: PathBuf,

        /// Block cache size in bytes
        #[serde(default = "default_rocks_cache")]
        cache_size: usize,

        /// Maximum capacity (0 = unlimited)
        #[serde(default)]
        capacity_bytes: u64,
    },
}

fn default_rocks_cache() -> usize {
    64 * 1024 * 1024
}

impl KineticConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: KineticConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML file, apply environment overrides, then validate
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: KineticConfig = toml::from_str(&content)?;
        let config = config.with_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration with fallback to defaults
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load config, using defaults");
                Self::default()
            }
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        ChunkLayout::new(self.layout.chunk_size)
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;

        let mut seen = HashSet::new();
        for cluster in &self.clusters {
            if cluster.id.is_empty() {
                return Err(ConfigError::ValidationError(
                    "cluster id cannot be empty".to_string(),
                ));
            }
            if cluster.id.contains(':') || cluster.id.contains('/') {
                return Err(ConfigError::ValidationError(format!(
                    "cluster id '{}' cannot contain ':' or '/'",
                    cluster.id
                )));
            }
            if !seen.insert(cluster.id.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "duplicate cluster id '{}'",
                    cluster.id
                )));
            }
        }

        Ok(())
    }

    /// Apply environment variable overrides
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(value) = std::env::var(ENV_CHUNK_SIZE) {
            match value.parse::<usize>() {
                Ok(size) => self.layout.chunk_size = size,
                Err(e) => tracing::warn!(
                    var = ENV_CHUNK_SIZE,
                    value = %value,
                    error = %e,
                    "Ignoring unparsable chunk size override"
                ),
            }
        }
        self
    }

    /// Add an in-memory cluster
    pub fn with_memory_cluster(mut self, id: impl Into<String>) -> Self {
        self.clusters.push(ClusterSpec {
            id: id.into(),
            backend: BackendSpec::Memory { capacity_bytes: 0 },
        });
        self
    }

    /// Validated chunk layout
    pub fn chunk_layout(&self) -> Result<ChunkLayout, KineticIoError> {
        ChunkLayout::new(self.layout.chunk_size)
    }

    /// Look up a configured cluster
    pub fn cluster(&self, id: &str) -> Option<&ClusterSpec> {
        self.clusters.iter().find(|c| c.id == id)
    }
}
