//! Kinetic file handle
//!
//! Splits byte-range reads and writes into per-chunk get/put calls against
//! the bound cluster. Chunks `0..=last` always exist and every chunk but
//! the last is full, so the file size can be recovered from the cluster
//! alone.
//!
//! All handle state sits behind a [`DestructionSafeLock`]. Dropping the
//! handle marks the lock destructed before the cluster reference is
//! released; a [`FileIoRef`] still held elsewhere then fails with
//! `UseAfterDestruction`.

use crate::io::{FileIo, FileStat, FileState, OpenFlags};
use bytes::Bytes;
use kineticio_cluster::{Cluster, ClusterResult};
use kineticio_core::{
    ChunkKey, ChunkLayout, ChunkSpan, ClusterError, DestructionSafeLock, KineticAddress,
    KineticIoError, Result, MAX_CHUNK_INDEX,
};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Mutable handle state, guarded by the destruction-safe lock
struct HandleState {
    /// Released on destruction
    cluster: Option<Arc<dyn Cluster>>,
    lifecycle: FileState,
    /// Authoritative once opened
    size: u64,
    /// Chunks were put since the last flush
    dirty: bool,
}

impl HandleState {
    fn cluster(&self) -> Result<Arc<dyn Cluster>> {
        self.cluster
            .as_ref()
            .map(Arc::clone)
            .ok_or(KineticIoError::UseAfterDestruction)
    }

    fn require_open(&self, address: &KineticAddress) -> Result<Arc<dyn Cluster>> {
        if self.lifecycle != FileState::Opened {
            return Err(KineticIoError::NotOpen(format!(
                "{address} is {}",
                self.lifecycle
            )));
        }
        self.cluster()
    }
}

struct FileInner {
    address: KineticAddress,
    layout: ChunkLayout,
    state: DestructionSafeLock<HandleState>,
}

impl FileInner {
    fn chunk_key(&self, index: u64) -> Result<ChunkKey> {
        self.address.chunk_key(index)
    }

    fn chunk_exists(&self, cluster: &dyn Cluster, index: u64) -> Result<bool> {
        Ok(cluster.exists(&self.chunk_key(index)?)?)
    }

    /// Index of the last stored chunk, `None` if the file has no chunks
    fn last_chunk_index(&self, cluster: &dyn Cluster) -> Result<Option<u64>> {
        if !self.chunk_exists(cluster, 0)? {
            return Ok(None);
        }

        let mut lo = 0u64;
        let mut hi = 1u64;
        while hi <= MAX_CHUNK_INDEX && self.chunk_exists(cluster, hi)? {
            lo = hi;
            hi = hi.saturating_mul(2);
        }

        // lo exists; hi is absent or past the last representable index
        let mut hi = hi.min(MAX_CHUNK_INDEX + 1);
        while hi - lo > 1 {
            let mid = lo + (hi - lo) / 2;
            if self.chunk_exists(cluster, mid)? {
                lo = mid;
            } else {
                hi = mid;
            }
        }

        Ok(Some(lo))
    }

    /// Size of a file whose last chunk is `last`
    fn derive_size(&self, cluster: &dyn Cluster, last: u64) -> Result<u64> {
        let (start, end) = self.layout.chunk_byte_range(last);
        let trailing = cluster
            .get(&self.chunk_key(last)?)?
            .map_or(0, |chunk| chunk.len() as u64);
        Ok((start + trailing).min(end))
    }

    /// Delete chunks `0..=last`, highest index first, so an interrupted
    /// truncate still leaves a contiguous prefix.
    fn remove_chunks(&self, cluster: &dyn Cluster, last: u64) -> Result<()> {
        for index in (0..=last).rev() {
            cluster.delete(&self.chunk_key(index)?)?;
        }
        Ok(())
    }

    fn open(&self, flags: OpenFlags) -> Result<()> {
        let mut state = self.state.acquire()?;
        if state.lifecycle == FileState::Closed {
            return Err(KineticIoError::NotOpen(format!(
                "{} is closed",
                self.address
            )));
        }
        let cluster = state.cluster()?;

        let size = match self.last_chunk_index(cluster.as_ref())? {
            None if flags.is_create() => 0,
            None => return Err(KineticIoError::FileNotFound(self.address.to_string())),
            Some(last) if flags.is_truncate() => {
                self.remove_chunks(cluster.as_ref(), last)?;
                state.dirty = true;
                debug!(address = %self.address, chunks = last + 1, "Truncated file");
                0
            }
            Some(last) => self.derive_size(cluster.as_ref(), last)?,
        };

        state.size = size;
        state.lifecycle = FileState::Opened;
        debug!(address = %self.address, size, "File opened");
        Ok(())
    }

    fn read(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        let state = self.state.acquire()?;
        let cluster = state.require_open(&self.address)?;

        if buf.is_empty() || offset >= state.size {
            return Ok(0);
        }
        let len = (state.size - offset).min(buf.len() as u64) as usize;

        let mut copied = 0usize;
        let mut gets = 0u32;
        for span in self.layout.spans(offset, len) {
            let key = self.chunk_key(span.index)?;
            gets += 1;
            let chunk = match cluster.get(&key) {
                Ok(Some(chunk)) => chunk,
                Ok(None) => {
                    warn!(address = %self.address, key = %key, copied, "Chunk missing below file size");
                    return Err(KineticIoError::cluster_io(
                        copied as u64,
                        ClusterError::MissingChunk(key.to_string()),
                    ));
                }
                Err(e) => return Err(KineticIoError::cluster_io(copied as u64, e)),
            };

            let available = chunk
                .len()
                .saturating_sub(span.offset_in_chunk)
                .min(span.len);
            if available > 0 {
                buf[span.buf_offset..span.buf_offset + available].copy_from_slice(
                    &chunk[span.offset_in_chunk..span.offset_in_chunk + available],
                );
                copied += available;
            }
            if available < span.len {
                break;
            }
        }

        debug!(address = %self.address, offset, copied, gets, "Read complete");
        Ok(copied)
    }

    fn write(&self, offset: u64, buf: &[u8]) -> Result<usize> {
        let mut state = self.state.acquire()?;
        let cluster = state.require_open(&self.address)?;

        if buf.is_empty() {
            return Ok(0);
        }
        self.layout.check_range(offset, buf.len())?;

        if offset > state.size {
            self.zero_fill(&mut state, cluster.as_ref(), offset)?;
        }

        let chunk_size = self.layout.chunk_size();
        let mut written = 0usize;
        let mut puts = 0u32;
        for span in self.layout.spans(offset, buf.len()) {
            let key = self.chunk_key(span.index)?;
            let data = &buf[span.buf_offset..span.buf_offset + span.len];

            if let Err(e) = store_span(cluster.as_ref(), &key, &span, data, chunk_size) {
                warn!(
                    address = %self.address,
                    offset,
                    requested = buf.len(),
                    written,
                    error = %e,
                    "Write stopped early"
                );
                return Err(KineticIoError::cluster_io(written as u64, e));
            }

            puts += 1;
            written += span.len;
            state.size = state.size.max(offset + written as u64);
            state.dirty = true;
        }

        debug!(address = %self.address, offset, written, puts, size = state.size, "Write complete");
        Ok(written)
    }

    /// Zero-fill `[size, end)` so no chunk below the write is missing
    fn zero_fill(&self, state: &mut HandleState, cluster: &dyn Cluster, end: u64) -> Result<()> {
        let start = state.size;
        let chunk_size = self.layout.chunk_size();
        let zeros = vec![0u8; chunk_size];

        for span in self.layout.spans(start, (end - start) as usize) {
            let key = self.chunk_key(span.index)?;
            if let Err(e) = store_span(cluster, &key, &span, &zeros[..span.len], chunk_size) {
                warn!(address = %self.address, gap_start = start, gap_end = end, error = %e, "Zero fill failed");
                return Err(KineticIoError::cluster_io(0, e));
            }
            state.size = start + (span.buf_offset + span.len) as u64;
            state.dirty = true;
        }

        debug!(address = %self.address, gap_start = start, gap_end = end, "Zero-filled gap");
        Ok(())
    }

    fn stat(&self) -> Result<FileStat> {
        let state = self.state.acquire()?;
        state.require_open(&self.address)?;

        Ok(FileStat {
            size: state.size,
            chunk_count: self.layout.chunk_count(state.size),
            chunk_size: self.layout.chunk_size(),
        })
    }

    fn flush(&self) -> Result<()> {
        let mut state = self.state.acquire()?;
        let cluster = state.require_open(&self.address)?;
        if state.dirty {
            cluster.flush()?;
            state.dirty = false;
        }
        Ok(())
    }

    fn close(&self) -> Result<()> {
        let mut state = self.state.acquire()?;
        match state.lifecycle {
            FileState::Closed => return Ok(()),
            FileState::Created => {}
            FileState::Opened => {
                if state.dirty {
                    state.cluster()?.flush()?;
                    state.dirty = false;
                }
            }
        }

        state.lifecycle = FileState::Closed;
        debug!(address = %self.address, size = state.size, "File closed");
        Ok(())
    }

    fn lifecycle(&self) -> Result<FileState> {
        Ok(self.state.acquire()?.lifecycle)
    }
}

/// Write `data` into the chunk at `key`, preserving bytes outside the span
fn store_span(
    cluster: &dyn Cluster,
    key: &ChunkKey,
    span: &ChunkSpan,
    data: &[u8],
    chunk_size: usize,
) -> ClusterResult<()> {
    if span.covers_chunk(chunk_size) {
        return cluster.put(key, Bytes::copy_from_slice(data));
    }

    let mut chunk = match cluster.get(key)? {
        Some(existing) => existing.to_vec(),
        None => Vec::with_capacity(span.end_in_chunk()),
    };
    if chunk.len() < span.end_in_chunk() {
        chunk.resize(span.end_in_chunk(), 0);
    }
    chunk[span.offset_in_chunk..span.end_in_chunk()].copy_from_slice(data);
    cluster.put(key, Bytes::from(chunk))
}

/// File handle bound to one cluster
pub struct KineticFileIo {
    inner: Arc<FileInner>,
}

impl KineticFileIo {
    /// Bind a new handle in the `Created` state
    pub fn new(address: KineticAddress, cluster: Arc<dyn Cluster>, layout: ChunkLayout) -> Self {
        Self {
            inner: Arc::new(FileInner {
                address,
                layout,
                state: DestructionSafeLock::new(HandleState {
                    cluster: Some(cluster),
                    lifecycle: FileState::Created,
                    size: 0,
                    dirty: false,
                }),
            }),
        }
    }

    pub fn layout(&self) -> ChunkLayout {
        self.inner.layout
    }

    /// Flush chunks put since the last flush
    pub fn flush(&self) -> Result<()> {
        self.inner.flush()
    }

    /// Back-reference for background work. It stops working once this
    /// handle is dropped.
    pub fn background_ref(&self) -> FileIoRef {
        FileIoRef {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl FileIo for KineticFileIo {
    fn address(&self) -> &KineticAddress {
        &self.inner.address
    }

    fn open(&self, flags: OpenFlags) -> Result<()> {
        self.inner.open(flags)
    }

    fn read(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        self.inner.read(offset, buf)
    }

    fn write(&self, offset: u64, buf: &[u8]) -> Result<usize> {
        self.inner.write(offset, buf)
    }

    fn stat(&self) -> Result<FileStat> {
        self.inner.stat()
    }

    fn close(&self) -> Result<()> {
        self.inner.close()
    }

    fn state(&self) -> Result<FileState> {
        self.inner.lifecycle()
    }
}

impl Drop for KineticFileIo {
    fn drop(&mut self) {
        let address = &self.inner.address;
        let destroyed = self.inner.state.mark_destructed_with(|state| {
            // Dropping an open handle with unflushed writes acts as a close
            if state.lifecycle == FileState::Opened && state.dirty {
                if let Some(cluster) = state.cluster.as_ref() {
                    match cluster.flush() {
                        Ok(()) => state.dirty = false,
                        Err(e) => warn!(address = %address, error = %e, "Flush on drop failed"),
                    }
                }
            }
            state.lifecycle = FileState::Closed;
            state.cluster = None;
        });
        if destroyed {
            debug!(address = %self.inner.address, "File handle destroyed");
        }
    }
}

impl fmt::Debug for KineticFileIo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KineticFileIo")
            .field("address", &self.inner.address)
            .field("layout", &self.inner.layout)
            .finish_non_exhaustive()
    }
}

/// Shared back-reference to a file handle
#[derive(Clone)]
pub struct FileIoRef {
    inner: Arc<FileInner>,
}

impl FileIoRef {
    pub fn address(&self) -> &KineticAddress {
        &self.inner.address
    }

    /// Whether the owning handle is still alive
    pub fn is_live(&self) -> bool {
        !self.inner.state.is_destructed()
    }

    pub fn read(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        self.inner.read(offset, buf)
    }

    pub fn write(&self, offset: u64, buf: &[u8]) -> Result<usize> {
        self.inner.write(offset, buf)
    }

    pub fn stat(&self) -> Result<FileStat> {
        self.inner.stat()
    }

    pub fn flush(&self) -> Result<()> {
        self.inner.flush()
    }
}

impl fmt::Debug for FileIoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileIoRef")
            .field("address", &self.inner.address)
            .field("live", &self.is_live())
            .finish()
    }
}
