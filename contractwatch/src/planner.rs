//! Splits a block span into the chunks providers are willing to serve.

use std::fmt;

use serde::{Deserialize, Serialize};

/// An inclusive range of block numbers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockRange {
    pub from: u64,
    pub to: u64,
}

impl BlockRange {
    pub fn new(from: u64, to: u64) -> Self {
        Self { from, to }
    }

    /// Number of blocks covered, both ends included.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> u64 {
        self.to - self.from + 1
    }

    /// Halves the range, the first half taking the extra block.
    /// Returns `None` for a single block.
    pub fn split(&self) -> Option<(BlockRange, BlockRange)> {
        if self.from == self.to {
            None
        } else {
            let middle = self.from + (self.len() - 1) / 2;

            Some((
                BlockRange::new(self.from, middle),
                BlockRange::new(middle + 1, self.to),
            ))
        }
    }
}

impl fmt::Display for BlockRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.from, self.to)
    }
}

/// Resolves where planning starts for a checkpoint-like mark.
/// `-1` means nothing has been queried yet, so planning starts at creation.
pub fn resolve_start(mark: i64, creation_block: u64) -> u64 {
    if mark < 0 {
        creation_block
    } else {
        mark as u64
    }
}

/// First block after a high-water mark of blocks already handed out.
/// `-1` means nothing has been handed out yet.
pub fn resolve_next(mark: i64, creation_block: u64) -> u64 {
    if mark < 0 {
        creation_block
    } else {
        (mark as u64 + 1).max(creation_block)
    }
}

/// Plans the ordered, contiguous chunks covering `[start, head]`.
/// Each chunk spans at most `chunk_size` blocks; the last one may be shorter.
/// Nothing is planned when `start > head`.
pub fn plan(start: u64, head: u64, chunk_size: u64) -> Vec<BlockRange> {
    assert!(chunk_size > 0, "chunk size must be positive");

    let mut chunks = vec![];
    let mut from = start;

    while from <= head {
        let to = from.saturating_add(chunk_size - 1).min(head);
        chunks.push(BlockRange::new(from, to));

        if to == u64::MAX {
            break;
        }
        from = to + 1;
    }

    chunks
}
