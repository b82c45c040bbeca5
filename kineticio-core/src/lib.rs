//! KineticIO Core Library
//!
//! Core abstractions shared by every kineticio crate.
//! This crate provides:
//! - Address parsing (`kinetic:<cluster>:<path>`)
//! - Chunk keys and the fixed chunk layout used to split files
//! - The destruction-safe lock guarding file handle lifecycles
//! - Common error handling with POSIX error codes

pub mod address;
pub mod chunk;
pub mod error;
pub mod lock;

pub use address::{KineticAddress, SCHEME};
pub use chunk::{chunk_key, ChunkKey, ChunkLayout, ChunkSpan, ChunkSpans};
pub use error::{ClusterError, ErrorReport, KineticIoError, Result};
pub use lock::{DestructionGuard, DestructionSafeLock};

/// Chunk size constants
///
/// The default matches the largest value a Kinetic device accepts.
pub const MIN_CHUNK_SIZE: usize = 4 * 1024; // 4 KB
pub const DEFAULT_CHUNK_SIZE: usize = 1024 * 1024; // 1 MB
pub const MAX_CHUNK_SIZE: usize = 64 * 1024 * 1024; // 64 MB

/// Number of decimal digits in the chunk index part of a chunk key
pub const CHUNK_INDEX_DIGITS: usize = 10;

/// Largest chunk index that still renders in `CHUNK_INDEX_DIGITS` digits
pub const MAX_CHUNK_INDEX: u64 = 9_999_999_999;
