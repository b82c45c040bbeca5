//! File I/O factory
//!
//! Turns `kinetic:` addresses into file handles. Hosts reach the factory
//! only through [`FactoryEntryPoints`], a versioned create/destroy pair,
//! so the whole subsystem is built and torn down as one unit.

use crate::file::KineticFileIo;
use crate::io::{FileIo, FileIoFactory};
use kineticio_cluster::{ClusterRegistry, KineticConfig};
use kineticio_core::{ChunkLayout, KineticAddress, Result};
use std::sync::Arc;
use tracing::{debug, info};

/// Bumped whenever `FactoryEntryPoints` or the traits behind it change
pub const FACTORY_ABI_VERSION: u32 = 1;

pub type CreateFactoryFn = fn(&KineticConfig) -> Result<Box<dyn FileIoFactory>>;
pub type DestroyFactoryFn = fn(Box<dyn FileIoFactory>);

/// Construct/destroy pair exposed to hosts
#[derive(Clone, Copy)]
pub struct FactoryEntryPoints {
    pub abi_version: u32,
    pub create: CreateFactoryFn,
    pub destroy: DestroyFactoryFn,
}

impl FactoryEntryPoints {
    pub fn is_compatible(&self, expected_version: u32) -> bool {
        self.abi_version == expected_version
    }
}

static ENTRY_POINTS: FactoryEntryPoints = FactoryEntryPoints {
    abi_version: FACTORY_ABI_VERSION,
    create: create_factory,
    destroy: destroy_factory,
};

/// Entry points of this implementation
pub fn entry_points() -> &'static FactoryEntryPoints {
    &ENTRY_POINTS
}

/// Build a factory from configuration. Clusters open lazily on first use.
pub fn create_factory(config: &KineticConfig) -> Result<Box<dyn FileIoFactory>> {
    let factory = KineticFileIoFactory::from_config(config)?;
    info!(
        clusters = config.clusters.len(),
        chunk_size = factory.layout.chunk_size(),
        "File I/O factory created"
    );
    Ok(Box::new(factory))
}

/// Tear down a factory made by [`create_factory`]. Handles it produced
/// keep working until they are dropped.
pub fn destroy_factory(factory: Box<dyn FileIoFactory>) {
    drop(factory);
    debug!("File I/O factory destroyed");
}

/// Factory binding file handles to clusters from a registry
pub struct KineticFileIoFactory {
    registry: Arc<ClusterRegistry>,
    layout: ChunkLayout,
}

impl KineticFileIoFactory {
    pub fn new(registry: Arc<ClusterRegistry>, layout: ChunkLayout) -> Self {
        Self { registry, layout }
    }

    pub fn from_config(config: &KineticConfig) -> Result<Self> {
        config.validate()?;
        let layout = config.chunk_layout()?;
        let registry = Arc::new(ClusterRegistry::from_config(config));
        Ok(Self::new(registry, layout))
    }

    pub fn registry(&self) -> &Arc<ClusterRegistry> {
        &self.registry
    }

    pub fn layout(&self) -> ChunkLayout {
        self.layout
    }

    /// Parse `address`, then resolve its cluster. A malformed address
    /// never reaches the registry.
    pub fn file_io(&self, address: &str) -> Result<KineticFileIo> {
        let address = KineticAddress::parse(address)?;
        let cluster = self.registry.resolve(address.cluster_id())?;

        debug!(address = %address, "File handle created");
        Ok(KineticFileIo::new(address, cluster, self.layout))
    }
}

impl FileIoFactory for KineticFileIoFactory {
    fn make_file_io(&self, address: &str) -> Result<Box<dyn FileIo>> {
        Ok(Box::new(self.file_io(address)?))
    }
}
