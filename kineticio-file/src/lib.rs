//! KineticIO File Layer
//!
//! Presents open/read/write/stat/close over a Kinetic device cluster.
//! A file is split into fixed-size chunks, each stored as one key/value
//! record under `<path>_<index>`.
//!
//! Hosts obtain a [`FileIoFactory`] through [`entry_points`] and create
//! file handles from `kinetic:<cluster>:<path>` addresses.

pub mod factory;
pub mod file;
pub mod io;

pub use factory::{
    create_factory, destroy_factory, entry_points, FactoryEntryPoints, KineticFileIoFactory,
    FACTORY_ABI_VERSION,
};
pub use file::{FileIoRef, KineticFileIo};
pub use io::{FileIo, FileIoFactory, FileStat, FileState, OpenFlags};

pub use kineticio_cluster::KineticConfig;
pub use kineticio_core::{ErrorReport, KineticAddress, KineticIoError, Result};
