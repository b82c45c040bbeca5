//! File I/O interfaces
//!
//! Callers only depend on these traits; the concrete handle and factory
//! types stay behind them so implementations can be swapped.

use kineticio_core::{KineticAddress, Result};
use std::fmt;

/// Lifecycle state of a file handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileState {
    /// Made by a factory, not opened yet
    Created,
    Opened,
    /// Terminal
    Closed,
}

impl fmt::Display for FileState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FileState::Created => "created",
            FileState::Opened => "opened",
            FileState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Options for `FileIo::open`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OpenFlags {
    create: bool,
    truncate: bool,
}

impl OpenFlags {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the file if it has no chunks yet
    pub fn create(mut self, create: bool) -> Self {
        self.create = create;
        self
    }

    /// Discard existing contents
    pub fn truncate(mut self, truncate: bool) -> Self {
        self.truncate = truncate;
        self
    }

    pub fn is_create(&self) -> bool {
        self.create
    }

    pub fn is_truncate(&self) -> bool {
        self.truncate
    }
}

/// File metadata returned by `FileIo::stat`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    /// Size in bytes
    pub size: u64,

    /// Number of chunks holding the file
    pub chunk_count: u64,

    /// Chunk size of the layout
    pub chunk_size: usize,
}

/// One logical file on a device cluster.
///
/// Every call is blocking. Calls on one handle are mutually exclusive;
/// a multi-call sequence that must be atomic needs external serialization.
pub trait FileIo: Send + Sync {
    /// Address the handle was created from
    fn address(&self) -> &KineticAddress;

    /// Open the file, deriving its size from the stored chunks
    fn open(&self, flags: OpenFlags) -> Result<()>;

    /// Read into `buf` starting at `offset`; returns bytes read, 0 at or
    /// past end of file
    fn read(&self, offset: u64, buf: &mut [u8]) -> Result<usize>;

    /// Write `buf` at `offset`; returns bytes written. On a cluster
    /// failure the error carries the bytes durably written before it.
    ///
    /// Writing past end of file zero-fills the gap first, one put per gap
    /// chunk, with the handle locked for the whole fill. A write at offset
    /// `n * chunk_size` of an empty file costs `n` puts before any data
    /// lands; callers producing sparse files should expect that cost.
    fn write(&self, offset: u64, buf: &[u8]) -> Result<usize>;

    /// Cached file metadata; never touches the cluster
    fn stat(&self) -> Result<FileStat>;

    /// Flush and close. Closing twice is a no-op.
    fn close(&self) -> Result<()>;

    fn state(&self) -> Result<FileState>;
}

/// Creates file handles from address strings
pub trait FileIoFactory: Send + Sync {
    /// Validate `address`, resolve its cluster and bind a new handle to it
    fn make_file_io(&self, address: &str) -> Result<Box<dyn FileIo>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_flags_builder() {
        let flags = OpenFlags::new().create(true);
        assert!(flags.is_create());
        assert!(!flags.is_truncate());

        let flags = flags.truncate(true).create(false);
        assert!(!flags.is_create());
        assert!(flags.is_truncate());
        assert_eq!(OpenFlags::default(), OpenFlags::new());
    }

    #[test]
    fn test_state_display() {
        assert_eq!(FileState::Created.to_string(), "created");
        assert_eq!(FileState::Closed.to_string(), "closed");
    }
}
