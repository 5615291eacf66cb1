//! Chunk planning
//!
//! Splits a file's byte range into contiguous, non-overlapping ranges,
//! one per transfer task.

use std::fmt;

/// A contiguous byte interval assigned to one transfer task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransferRange {
    /// Starting byte offset
    pub offset: u64,
    /// Number of bytes (never zero)
    pub length: u64,
}

impl TransferRange {
    /// Create a new range
    pub fn new(offset: u64, length: u64) -> Self {
        Self { offset, length }
    }

    /// One past the last byte of the range
    pub fn end(&self) -> u64 {
        self.offset + self.length
    }
}

impl fmt::Display for TransferRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.offset, self.end())
    }
}

/// Produces range partitions for a given worker budget and chunk ceiling
#[derive(Debug, Clone, Copy)]
pub struct ChunkPlanner {
    max_workers: u64,
    max_chunk_bytes: u64,
}

impl ChunkPlanner {
    /// Create a planner; zero budgets are clamped to 1
    pub fn new(max_workers: usize, max_chunk_bytes: u64) -> Self {
        Self {
            max_workers: (max_workers as u64).max(1),
            max_chunk_bytes: max_chunk_bytes.max(1),
        }
    }

    /// Plan the ranges for a file of `file_size` bytes
    pub fn plan(&self, file_size: u64) -> Vec<TransferRange> {
        plan(file_size, self.max_workers as usize, self.max_chunk_bytes)
    }
}

/// Split `[0, file_size)` into ordered, non-overlapping ranges.
///
/// Small files (up to `max_chunk_bytes`) get a single range. Larger files are
/// cut into `min(ceil(file_size / max_workers), max_chunk_bytes)` sized chunks,
/// the last one possibly shorter. An empty file yields no ranges.
pub fn plan(file_size: u64, max_workers: usize, max_chunk_bytes: u64) -> Vec<TransferRange> {
    let max_workers = (max_workers as u64).max(1);
    let max_chunk_bytes = max_chunk_bytes.max(1);

    if file_size == 0 {
        return Vec::new();
    }

    if file_size <= max_chunk_bytes {
        return vec![TransferRange::new(0, file_size)];
    }

    let chunk_size = file_size.div_ceil(max_workers).min(max_chunk_bytes);
    let mut ranges = Vec::with_capacity(file_size.div_ceil(chunk_size) as usize);

    let mut offset = 0u64;
    while offset < file_size {
        let length = chunk_size.min(file_size - offset);
        if length > 0 {
            ranges.push(TransferRange::new(offset, length));
        }
        offset += chunk_size;
    }

    ranges
}

/// Whole-file plan used by the sequential mode
pub fn plan_sequential(file_size: u64) -> Vec<TransferRange> {
    if file_size == 0 {
        Vec::new()
    } else {
        vec![TransferRange::new(0, file_size)]
    }
}
