use std::sync::Arc;

use derive_more::Display;

use crate::abi_sources::AbiSource;
use crate::{Chain, Repo};

pub const DEFAULT_CHUNK_SIZE: u64 = 3_000;
pub const DEFAULT_INGESTION_RATE_MS: u64 = 90_000;
pub const DEFAULT_MAX_CHUNK_ATTEMPTS: u32 = 5;
pub const DEFAULT_MAX_CONCURRENT_CHUNKS: usize = 8;
pub const DEFAULT_CHUNK_LEASE_MS: u64 = 10 * 60 * 1_000;
pub const DEFAULT_CHUNK_TIMEOUT_MS: u64 = 60_000;
pub const DEFAULT_RETRY_BACKOFF_MS: u64 = 1_000;

#[derive(Debug, Display, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[display("chunk size must be positive")]
    ZeroChunkSize,
    #[display("ingestion rate must be positive")]
    ZeroIngestionRate,
    #[display("at least one attempt per chunk is required")]
    ZeroChunkAttempts,
    #[display("at least one concurrent chunk is required")]
    ZeroConcurrentChunks,
    #[display("a JSON-RPC url is required")]
    NoJsonRpcUrl,
}

impl std::error::Error for ConfigError {}

/// When the checkpoint of a contract moves.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CheckpointPolicy {
    /// Right after dispatching up to head, whether or not the chunks land.
    AdvanceOnDispatch,
    /// Only over chunks that completed, contiguously from the checkpoint.
    #[default]
    AdvanceOnCompletion,
}

#[derive(Clone)]
pub struct Config<R: Repo> {
    pub repo: R,
    pub chain: Chain,
    pub abi_source: Option<Arc<dyn AbiSource>>,
    pub chunk_size: u64,
    pub ingestion_rate_ms: u64,
    pub checkpoint_policy: CheckpointPolicy,
    pub max_chunk_attempts: u32,
    pub max_concurrent_chunks: usize,
    pub chunk_lease_ms: u64,
    pub chunk_timeout_ms: u64,
    pub retry_backoff_ms: u64,
}

impl<R: Repo> Config<R> {
    pub fn new(repo: R, chain: Chain) -> Self {
        Self {
            repo,
            chain,
            abi_source: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
            ingestion_rate_ms: DEFAULT_INGESTION_RATE_MS,
            checkpoint_policy: CheckpointPolicy::default(),
            max_chunk_attempts: DEFAULT_MAX_CHUNK_ATTEMPTS,
            max_concurrent_chunks: DEFAULT_MAX_CONCURRENT_CHUNKS,
            chunk_lease_ms: DEFAULT_CHUNK_LEASE_MS,
            chunk_timeout_ms: DEFAULT_CHUNK_TIMEOUT_MS,
            retry_backoff_ms: DEFAULT_RETRY_BACKOFF_MS,
        }
    }

    pub fn with_abi_source(mut self, abi_source: impl AbiSource + 'static) -> Self {
        self.abi_source = Some(Arc::new(abi_source));

        self
    }

    pub fn with_chunk_size(mut self, chunk_size: u64) -> Self {
        self.chunk_size = chunk_size;

        self
    }

    pub fn with_ingestion_rate_ms(mut self, ingestion_rate_ms: u64) -> Self {
        self.ingestion_rate_ms = ingestion_rate_ms;

        self
    }

    pub fn with_checkpoint_policy(mut self, checkpoint_policy: CheckpointPolicy) -> Self {
        self.checkpoint_policy = checkpoint_policy;

        self
    }

    pub fn with_max_chunk_attempts(mut self, max_chunk_attempts: u32) -> Self {
        self.max_chunk_attempts = max_chunk_attempts;

        self
    }

    pub fn with_max_concurrent_chunks(mut self, max_concurrent_chunks: usize) -> Self {
        self.max_concurrent_chunks = max_concurrent_chunks;

        self
    }

    pub fn with_chunk_lease_ms(mut self, chunk_lease_ms: u64) -> Self {
        self.chunk_lease_ms = chunk_lease_ms;

        self
    }

    pub fn with_chunk_timeout_ms(mut self, chunk_timeout_ms: u64) -> Self {
        self.chunk_timeout_ms = chunk_timeout_ms;

        self
    }

    pub fn with_retry_backoff_ms(mut self, retry_backoff_ms: u64) -> Self {
        self.retry_backoff_ms = retry_backoff_ms;

        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 {
            Err(ConfigError::ZeroChunkSize)
        } else if self.ingestion_rate_ms == 0 {
            Err(ConfigError::ZeroIngestionRate)
        } else if self.max_chunk_attempts == 0 {
            Err(ConfigError::ZeroChunkAttempts)
        } else if self.max_concurrent_chunks == 0 {
            Err(ConfigError::ZeroConcurrentChunks)
        } else if self.chain.json_rpc_url.trim().is_empty() {
            Err(ConfigError::NoJsonRpcUrl)
        } else {
            Ok(())
        }
    }
}

impl<R: Repo> std::fmt::Debug for Config<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("repo", &self.repo)
            .field("chain", &self.chain)
            .field("chunk_size", &self.chunk_size)
            .field("ingestion_rate_ms", &self.ingestion_rate_ms)
            .field("checkpoint_policy", &self.checkpoint_policy)
            .field("max_chunk_attempts", &self.max_chunk_attempts)
            .field("max_concurrent_chunks", &self.max_concurrent_chunks)
            .finish()
    }
}
