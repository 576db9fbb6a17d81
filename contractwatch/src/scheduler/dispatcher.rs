use std::sync::{Arc, Mutex};
use std::time::Duration;

use ethers::types::H256;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, warn};

use crate::checkpoints;
use crate::config::{CheckpointPolicy, Config};
use crate::contracts::TrackedContract;
use crate::ingester::{self, IngesterError, Provider};
use crate::planner::BlockRange;
use crate::Repo;

/// One chunk of one contract, ready to be indexed.
#[derive(Clone, Debug, PartialEq)]
pub struct ChunkJob {
    pub contract: TrackedContract,
    pub event_topics: Vec<H256>,
    pub range: BlockRange,
}

/// Hands chunk jobs to whatever runs them. Dispatching never waits for the
/// job to finish.
pub trait ChunkDispatcher: Send + Sync {
    fn dispatch(&self, job: ChunkJob);
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_ms: u64,
    pub attempt_timeout_ms: u64,
}

impl RetryPolicy {
    pub fn from_config<R: Repo>(config: &Config<R>) -> Self {
        Self {
            max_attempts: config.max_chunk_attempts,
            backoff_ms: config.retry_backoff_ms,
            attempt_timeout_ms: config.chunk_timeout_ms,
        }
    }

    /// Delay after the given failed attempt, doubling each time.
    pub fn backoff(&self, attempts_so_far: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempts_so_far.saturating_sub(1));

        Duration::from_millis(self.backoff_ms.saturating_mul(factor))
    }
}

/// Indexes a range with retries.
///
/// Each attempt is bounded by the policy's timeout. Ranges the provider
/// refuses are halved until they go through, every half getting its own
/// attempts. Terminal errors are returned right away.
pub async fn index_with_retries<P: Provider + ?Sized, R: Repo>(
    provider: &P,
    repo: &R,
    contract: &TrackedContract,
    event_topics: &[H256],
    range: BlockRange,
    retry_policy: &RetryPolicy,
) -> Result<u64, IngesterError> {
    let mut ranges = vec![range];
    let mut indexed = 0;

    while let Some(range) = ranges.pop() {
        match index_range(provider, repo, contract, event_topics, range, retry_policy).await {
            Ok(count) => indexed += count,
            Err(IngesterError::RangeTooLarge { range, reason }) => match range.split() {
                Some((first_half, second_half)) => {
                    debug!(contract = %contract.address, %range, %reason, "splitting chunk");

                    ranges.push(second_half);
                    ranges.push(first_half);
                }
                None => return Err(IngesterError::RangeTooLarge { range, reason }),
            },
            Err(error) => return Err(error),
        }
    }

    Ok(indexed)
}

async fn index_range<P: Provider + ?Sized, R: Repo>(
    provider: &P,
    repo: &R,
    contract: &TrackedContract,
    event_topics: &[H256],
    range: BlockRange,
    retry_policy: &RetryPolicy,
) -> Result<u64, IngesterError> {
    let attempt_timeout = Duration::from_millis(retry_policy.attempt_timeout_ms);
    let mut attempt = 1;

    loop {
        let result = timeout(
            attempt_timeout,
            ingester::index_chunk(provider, repo, contract, event_topics, range),
        )
        .await
        .unwrap_or_else(|_elapsed| {
            Err(IngesterError::UpstreamUnavailable(format!(
                "attempt timed out after {}ms",
                retry_policy.attempt_timeout_ms
            )))
        });

        match result {
            Err(error @ IngesterError::RangeTooLarge { .. }) => return Err(error),
            Err(error) if error.is_terminal() || attempt >= retry_policy.max_attempts => {
                return Err(error)
            }
            Err(error) => {
                warn!(
                    contract = %contract.address,
                    from_block = range.from,
                    to_block = range.to,
                    attempt,
                    %error,
                    "chunk attempt failed"
                );

                sleep(retry_policy.backoff(attempt)).await;
                attempt += 1;
            }
            indexed => return indexed,
        }
    }
}

/// Runs every job on its own tokio task, at most `max_concurrent_chunks` at
/// a time, and records the outcome in the chunk ledger.
pub struct TokioDispatcher<P: Provider + 'static, R: Repo> {
    provider: Arc<P>,
    repo: R,
    checkpoint_policy: CheckpointPolicy,
    retry_policy: RetryPolicy,
    permits: Arc<Semaphore>,
    in_flight: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl<P: Provider + 'static, R: Repo> TokioDispatcher<P, R> {
    pub fn new(provider: Arc<P>, config: &Config<R>) -> Self {
        Self {
            provider,
            repo: config.repo.clone(),
            checkpoint_policy: config.checkpoint_policy,
            retry_policy: RetryPolicy::from_config(config),
            permits: Arc::new(Semaphore::new(config.max_concurrent_chunks)),
            in_flight: Arc::new(Mutex::new(vec![])),
        }
    }

    /// Waits for every job dispatched so far.
    pub async fn wait_idle(&self) {
        loop {
            let handles: Vec<_> = match self.in_flight.lock() {
                Ok(mut in_flight) => in_flight.drain(..).collect(),
                Err(_) => return,
            };

            if handles.is_empty() {
                return;
            }

            for handle in handles {
                if let Err(join_error) = handle.await {
                    error!(%join_error, "chunk task ended abnormally");
                }
            }
        }
    }

    /// Aborts every job still running. Their chunks stay pending and are
    /// picked up again once their lease expires.
    pub fn abort_all(&self) {
        if let Ok(mut in_flight) = self.in_flight.lock() {
            for handle in in_flight.drain(..) {
                handle.abort();
            }
        }
    }
}

impl<P: Provider + 'static, R: Repo> ChunkDispatcher for TokioDispatcher<P, R> {
    fn dispatch(&self, job: ChunkJob) {
        let provider = self.provider.clone();
        let repo = self.repo.clone();
        let checkpoint_policy = self.checkpoint_policy;
        let retry_policy = self.retry_policy.clone();
        let permits = self.permits.clone();

        let handle = tokio::spawn(async move {
            let Ok(_permit) = permits.acquire_owned().await else {
                return;
            };

            run_job(provider.as_ref(), &repo, checkpoint_policy, &retry_policy, job).await
        });

        if let Ok(mut in_flight) = self.in_flight.lock() {
            in_flight.retain(|handle| !handle.is_finished());
            in_flight.push(handle);
        }
    }
}

async fn run_job<P: Provider + ?Sized, R: Repo>(
    provider: &P,
    repo: &R,
    checkpoint_policy: CheckpointPolicy,
    retry_policy: &RetryPolicy,
    ChunkJob {
        contract,
        event_topics,
        range,
    }: ChunkJob,
) {
    let address = contract.address.as_str();
    let tracks_ledger = checkpoint_policy == CheckpointPolicy::AdvanceOnCompletion;

    let outcome = match index_with_retries(
        provider,
        repo,
        &contract,
        &event_topics,
        range,
        retry_policy,
    )
    .await
    {
        Ok(indexed) => {
            debug!(contract = address, %range, indexed, "chunk completed");

            if tracks_ledger {
                complete(repo, &contract, &range).await
            } else {
                Ok(())
            }
        }
        Err(error) => {
            error!(contract = address, %range, %error, "chunk failed");

            if error.is_terminal() {
                if let Err(repo_error) = repo.block_contract(address, &error.to_string()).await {
                    error!(contract = address, %repo_error, "could not block contract");
                }
            }

            if tracks_ledger {
                repo.fail_chunk(address, &range, &error.to_string()).await.map_err(Into::into)
            } else {
                Ok(())
            }
        }
    };

    if let Err(error) = outcome {
        error!(contract = address, %range, %error, "could not record chunk outcome");
    }
}

/// Marks the chunk completed and moves the checkpoint over whatever
/// contiguous prefix of the ledger is now complete.
async fn complete<R: Repo>(
    repo: &R,
    contract: &TrackedContract,
    range: &BlockRange,
) -> Result<(), IngesterError> {
    let address = contract.address.as_str();
    repo.complete_chunk(address, range).await?;

    let checkpoint = repo.get_checkpoint(address).await?;
    let chunks = repo.get_chunks(address).await?;
    let creation_block = contract.get_creation_block();
    let frontier = checkpoints::completed_frontier(checkpoint, creation_block, &chunks);

    if frontier > checkpoint && frontier >= creation_block as i64 {
        if checkpoints::advance(repo, address, frontier).await? {
            info!(contract = address, checkpoint = frontier, "advanced checkpoint");
        }
    }

    Ok(())
}
