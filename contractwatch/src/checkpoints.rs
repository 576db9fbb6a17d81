//! Durable, monotonic per-contract checkpoints (`last_queried_block`).

use derive_more::Display;

use crate::planner::BlockRange;
use crate::repos::RepoError;
use crate::scheduler::{Chunk, ChunkStatus};

#[derive(Debug, Display, Clone, PartialEq)]
pub enum CheckpointError {
    #[display("checkpoint of {address} cannot move back from {current} to {attempted}")]
    Regression {
        address: String,
        current: i64,
        attempted: i64,
    },
    #[display("contract {_0} is not tracked")]
    NotTracked(String),
    #[display("{_0}")]
    Repo(RepoError),
}

impl std::error::Error for CheckpointError {}

impl From<RepoError> for CheckpointError {
    fn from(value: RepoError) -> Self {
        CheckpointError::Repo(value)
    }
}

/// The store enforces monotonicity itself: `set_checkpoint` below the
/// stored value fails with `Regression` and changes nothing, and setting
/// the stored value again is a no-op.
#[async_trait::async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn get_checkpoint(&self, address: &str) -> Result<i64, CheckpointError>;
    async fn set_checkpoint(&self, address: &str, block: i64) -> Result<(), CheckpointError>;
}

/// Moves the checkpoint forward, treating a concurrent writer that got
/// further first as success. Returns whether this call advanced it.
pub async fn advance<S: CheckpointStore + ?Sized>(
    store: &S,
    address: &str,
    block: i64,
) -> Result<bool, CheckpointError> {
    match store.set_checkpoint(address, block).await {
        Ok(()) => Ok(true),
        Err(CheckpointError::Regression { .. }) => Ok(false),
        Err(error) => Err(error),
    }
}

/// End of the longest run of completed chunks that starts right after the
/// checkpoint. Blocks at or below the result are all indexed.
pub fn completed_frontier(checkpoint: i64, creation_block: u64, chunks: &[Chunk]) -> i64 {
    let mut frontier = if checkpoint < 0 {
        creation_block as i64 - 1
    } else {
        checkpoint
    };

    let mut chunks: Vec<_> = chunks.iter().filter(|chunk| chunk.to_block > frontier).collect();
    chunks.sort_by_key(|chunk| (chunk.from_block, chunk.to_block));

    for chunk in chunks {
        if chunk.from_block > frontier + 1 || chunk.get_status() != ChunkStatus::Completed {
            break;
        }
        frontier = frontier.max(chunk.to_block);
    }

    frontier
}

/// Chunks above the checkpoint that must run again: failed ones and
/// pending ones whose lease ran out.
pub fn redispatchable(
    checkpoint: i64,
    chunks: &[Chunk],
    now: chrono::DateTime<chrono::Utc>,
    lease_ms: u64,
) -> Vec<BlockRange> {
    chunks
        .iter()
        .filter(|chunk| chunk.to_block > checkpoint)
        .filter(|chunk| match chunk.get_status() {
            ChunkStatus::Failed => true,
            ChunkStatus::Pending => chunk.is_lease_expired(now, lease_ms),
            ChunkStatus::Completed => false,
        })
        .map(Chunk::get_range)
        .collect()
}
