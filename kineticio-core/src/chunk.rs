//! Chunk keys and layout
//!
//! A logical file is split into fixed-size chunks. Chunk `i` of the file at
//! `path` is stored under the device key `<path>_<i>`, with `i` rendered as
//! a zero-padded 10-digit decimal. The padding makes the mapping injective
//! for every index in `[0, 10^10)`.

use crate::error::{KineticIoError, Result};
use crate::{CHUNK_INDEX_DIGITS, DEFAULT_CHUNK_SIZE, MAX_CHUNK_INDEX, MAX_CHUNK_SIZE, MIN_CHUNK_SIZE};
use std::fmt;

const KEY_SEPARATOR: char = '_';

/// Device key of one chunk
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkKey {
    key: String,
    index: u64,
}

impl ChunkKey {
    /// The rendered key
    pub fn as_str(&self) -> &str {
        &self.key
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.key.as_bytes()
    }

    /// Chunk index encoded in the key
    pub fn index(&self) -> u64 {
        self.index
    }

    /// Relative path the key was derived from
    pub fn path(&self) -> &str {
        // key = path + '_' + 10 digits
        &self.key[..self.key.len() - CHUNK_INDEX_DIGITS - 1]
    }

    pub fn into_string(self) -> String {
        self.key
    }
}

impl fmt::Debug for ChunkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChunkKey({})", self.key)
    }
}

impl fmt::Display for ChunkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key)
    }
}

impl AsRef<[u8]> for ChunkKey {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

/// Render the device key for chunk `index` of `relative_path`.
pub fn chunk_key(relative_path: &str, index: u64) -> Result<ChunkKey> {
    if index > MAX_CHUNK_INDEX {
        return Err(KineticIoError::ChunkIndexOutOfRange {
            index,
            max: MAX_CHUNK_INDEX,
        });
    }

    Ok(ChunkKey {
        key: format!(
            "{relative_path}{KEY_SEPARATOR}{index:0width$}",
            width = CHUNK_INDEX_DIGITS
        ),
        index,
    })
}

/// Fixed chunk layout of a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkLayout {
    chunk_size: usize,
}

impl Default for ChunkLayout {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl ChunkLayout {
    /// Create a layout, rejecting sizes outside `[MIN_CHUNK_SIZE, MAX_CHUNK_SIZE]`
    pub fn new(chunk_size: usize) -> Result<Self> {
        if !(MIN_CHUNK_SIZE..=MAX_CHUNK_SIZE).contains(&chunk_size) {
            return Err(KineticIoError::InvalidChunkSize {
                size: chunk_size,
                min: MIN_CHUNK_SIZE,
                max: MAX_CHUNK_SIZE,
            });
        }
        Ok(Self { chunk_size })
    }

    #[inline]
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    #[inline]
    pub fn chunk_index_of(&self, file_offset: u64) -> u64 {
        file_offset / self.chunk_size as u64
    }

    /// File byte range `[start, end)` covered by a chunk
    #[inline]
    pub fn chunk_byte_range(&self, chunk_index: u64) -> (u64, u64) {
        let start = chunk_index * self.chunk_size as u64;
        (start, start + self.chunk_size as u64)
    }

    /// Number of chunks holding a file of `size` bytes
    #[inline]
    pub fn chunk_count(&self, size: u64) -> u64 {
        size.div_ceil(self.chunk_size as u64)
    }

    /// Largest file size whose chunks all have a representable index
    pub fn max_file_size(&self) -> u64 {
        (MAX_CHUNK_INDEX + 1) * self.chunk_size as u64
    }

    /// Check that every chunk touched by `[offset, offset + len)` has a
    /// representable index.
    pub fn check_range(&self, offset: u64, len: usize) -> Result<()> {
        if len == 0 {
            return Ok(());
        }
        let last_byte = offset
            .checked_add(len as u64 - 1)
            .ok_or(KineticIoError::ChunkIndexOutOfRange {
                index: u64::MAX,
                max: MAX_CHUNK_INDEX,
            })?;
        let index = self.chunk_index_of(last_byte);
        if index > MAX_CHUNK_INDEX {
            return Err(KineticIoError::ChunkIndexOutOfRange {
                index,
                max: MAX_CHUNK_INDEX,
            });
        }
        Ok(())
    }

    /// Chunk spans covering `[offset, offset + len)`, in increasing index order
    pub fn spans(&self, offset: u64, len: usize) -> ChunkSpans {
        ChunkSpans {
            chunk_size: self.chunk_size as u64,
            start: offset,
            pos: offset,
            end: offset.saturating_add(len as u64),
        }
    }
}

/// The part of one chunk touched by a byte-range request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkSpan {
    /// Chunk index
    pub index: u64,
    /// Offset of the first touched byte inside the chunk
    pub offset_in_chunk: usize,
    /// Number of touched bytes
    pub len: usize,
    /// Offset of the first touched byte inside the caller's buffer
    pub buf_offset: usize,
}

impl ChunkSpan {
    /// End of the touched range inside the chunk (exclusive)
    #[inline]
    pub fn end_in_chunk(&self) -> usize {
        self.offset_in_chunk + self.len
    }

    /// Whether the span replaces the chunk's entire contents
    #[inline]
    pub fn covers_chunk(&self, chunk_size: usize) -> bool {
        self.offset_in_chunk == 0 && self.len == chunk_size
    }
}

/// Iterator over the chunk spans of a byte range
#[derive(Debug, Clone)]
pub struct ChunkSpans {
    chunk_size: u64,
    start: u64,
    pos: u64,
    end: u64,
}

impl Iterator for ChunkSpans {
    type Item = ChunkSpan;

    fn next(&mut self) -> Option<ChunkSpan> {
        if self.pos >= self.end {
            return None;
        }

        let index = self.pos / self.chunk_size;
        let offset_in_chunk = self.pos % self.chunk_size;
        let len = (self.chunk_size - offset_in_chunk).min(self.end - self.pos);

        let span = ChunkSpan {
            index,
            offset_in_chunk: offset_in_chunk as usize,
            len: len as usize,
            buf_offset: (self.pos - self.start) as usize,
        };
        self.pos += len;
        Some(span)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_key_format() {
        assert_eq!(chunk_key("file1", 3).unwrap().as_str(), "file1_0000000003");
        assert_eq!(chunk_key("file1", 0).unwrap().as_str(), "file1_0000000000");
        assert_eq!(
            chunk_key("a/b", MAX_CHUNK_INDEX).unwrap().as_str(),
            "a/b_9999999999"
        );
    }

    #[test]
    fn test_chunk_key_out_of_range() {
        let result = chunk_key("file1", MAX_CHUNK_INDEX + 1);
        assert!(matches!(
            result,
            Err(KineticIoError::ChunkIndexOutOfRange {
                index: 10_000_000_000,
                ..
            })
        ));
    }

    #[test]
    fn test_chunk_key_parts() {
        let key = chunk_key("dir/x_1", 42).unwrap();
        assert_eq!(key.index(), 42);
        assert_eq!(key.path(), "dir/x_1");
        assert_eq!(key.to_string(), "dir/x_1_0000000042");
    }

    #[test]
    fn test_layout_bounds() {
        assert!(ChunkLayout::new(MIN_CHUNK_SIZE).is_ok());
        assert!(ChunkLayout::new(MAX_CHUNK_SIZE).is_ok());
        assert!(matches!(
            ChunkLayout::new(MIN_CHUNK_SIZE - 1),
            Err(KineticIoError::InvalidChunkSize { .. })
        ));
        assert!(ChunkLayout::new(MAX_CHUNK_SIZE + 1).is_err());
        assert_eq!(ChunkLayout::default().chunk_size(), DEFAULT_CHUNK_SIZE);
    }

    #[test]
    fn test_spans_unaligned() {
        let layout = ChunkLayout::new(4096).unwrap();
        let spans: Vec<ChunkSpan> = layout.spans(4000, 5000).collect();

        assert_eq!(
            spans,
            vec![
                ChunkSpan { index: 0, offset_in_chunk: 4000, len: 96, buf_offset: 0 },
                ChunkSpan { index: 1, offset_in_chunk: 0, len: 4096, buf_offset: 96 },
                ChunkSpan { index: 2, offset_in_chunk: 0, len: 808, buf_offset: 4192 },
            ]
        );
        assert!(spans[1].covers_chunk(4096));
        assert!(!spans[2].covers_chunk(4096));
    }

    #[test]
    fn test_spans_empty() {
        let layout = ChunkLayout::new(4096).unwrap();
        assert_eq!(layout.spans(100, 0).count(), 0);
    }

    #[test]
    fn test_chunk_count() {
        let layout = ChunkLayout::new(4096).unwrap();
        assert_eq!(layout.chunk_count(0), 0);
        assert_eq!(layout.chunk_count(1), 1);
        assert_eq!(layout.chunk_count(4096), 1);
        assert_eq!(layout.chunk_count(4097), 2);
        assert_eq!(layout.chunk_byte_range(2), (8192, 12288));
    }

    #[test]
    fn test_check_range() {
        let layout = ChunkLayout::new(4096).unwrap();
        let max = layout.max_file_size();

        assert!(layout.check_range(max - 1, 1).is_ok());
        assert!(layout.check_range(max, 0).is_ok());
        assert!(matches!(
            layout.check_range(max, 1),
            Err(KineticIoError::ChunkIndexOutOfRange { .. })
        ));
        assert!(layout.check_range(u64::MAX, 2).is_err());
    }
}
