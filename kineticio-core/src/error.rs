//! Error types for KineticIO
//!
//! `KineticIoError` is the single error surfaced by every file-level
//! operation. Each variant maps to a POSIX error code so hosts can report
//! failures the way a filesystem would.

use std::fmt;
use thiserror::Error;

/// Result type alias for KineticIO operations
pub type Result<T> = std::result::Result<T, KineticIoError>;

/// Failure reported by a cluster implementation.
///
/// This layer never reinterprets these; they travel to the caller inside
/// `KineticIoError::ClusterIo`.
#[derive(Error, Debug)]
pub enum ClusterError {
    #[error("Device I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Device error: {0}")]
    Device(String),

    #[error("Cluster full: {used} / {capacity} bytes")]
    CapacityExceeded { used: u64, capacity: u64 },

    #[error("Cluster unavailable: {0}")]
    Unavailable(String),

    /// A chunk inside the file's size is absent from the cluster
    #[error("Missing chunk: {0}")]
    MissingChunk(String),
}

impl ClusterError {
    /// POSIX error code for this failure
    pub fn errno(&self) -> i32 {
        match self {
            ClusterError::Io(e) => e.raw_os_error().unwrap_or(libc::EIO),
            ClusterError::Device(_) => libc::EIO,
            ClusterError::CapacityExceeded { .. } => libc::ENOSPC,
            ClusterError::Unavailable(_) => libc::EIO,
            ClusterError::MissingChunk(_) => libc::EIO,
        }
    }
}

/// Unified error type for KineticIO
#[derive(Error, Debug)]
pub enum KineticIoError {
    // ===== Addressing Errors =====
    #[error("Invalid address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("Cluster not found: {cluster_id} ({reason})")]
    ClusterNotFound { cluster_id: String, reason: String },

    // ===== Chunk Errors =====
    #[error("Chunk index out of range: {index} (max: {max})")]
    ChunkIndexOutOfRange { index: u64, max: u64 },

    #[error("Invalid chunk size: {size} bytes (allowed: {min}..={max})")]
    InvalidChunkSize { size: usize, min: usize, max: usize },

    // ===== Handle Lifecycle Errors =====
    #[error("File handle used after destruction")]
    UseAfterDestruction,

    #[error("File not open: {0}")]
    NotOpen(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    // ===== Cluster Errors =====
    #[error("Cluster I/O error after {completed} bytes: {source}")]
    ClusterIo {
        completed: u64,
        #[source]
        source: ClusterError,
    },

    // ===== Configuration Errors =====
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl KineticIoError {
    pub fn invalid_address(address: impl Into<String>, reason: impl Into<String>) -> Self {
        KineticIoError::InvalidAddress {
            address: address.into(),
            reason: reason.into(),
        }
    }

    /// Wrap a cluster failure that happened after `completed` bytes were
    /// durably transferred.
    pub fn cluster_io(completed: u64, source: ClusterError) -> Self {
        KineticIoError::ClusterIo { completed, source }
    }

    /// Bytes durably transferred before the failure (0 for errors raised
    /// before any I/O).
    pub fn completed(&self) -> u64 {
        match self {
            KineticIoError::ClusterIo { completed, .. } => *completed,
            _ => 0,
        }
    }

    /// POSIX error code. `InvalidAddress` and `ClusterNotFound` are fixed
    /// at `EINVAL` and `ENODEV`.
    pub fn errno(&self) -> i32 {
        use libc::*;
        match self {
            KineticIoError::InvalidAddress { .. } => EINVAL,
            KineticIoError::ClusterNotFound { .. } => ENODEV,
            KineticIoError::ChunkIndexOutOfRange { .. } => EFBIG,
            KineticIoError::InvalidChunkSize { .. } => EINVAL,
            KineticIoError::UseAfterDestruction => EBADF,
            KineticIoError::NotOpen(_) => EBADF,
            KineticIoError::FileNotFound(_) => ENOENT,
            KineticIoError::ClusterIo { source, .. } => source.errno(),
            KineticIoError::Configuration(_) => EINVAL,
        }
    }

    /// Code + message pair for hosts that speak POSIX.
    pub fn report(&self) -> ErrorReport {
        ErrorReport {
            code: self.errno(),
            message: self.to_string(),
        }
    }
}

impl From<ClusterError> for KineticIoError {
    fn from(err: ClusterError) -> Self {
        KineticIoError::ClusterIo {
            completed: 0,
            source: err,
        }
    }
}

/// POSIX-style error code plus human readable message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorReport {
    pub code: i32,
    pub message: String,
}

impl fmt::Display for ErrorReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[errno {}] {}", self.code, self.message)
    }
}
