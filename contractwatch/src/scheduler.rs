//! The recurring tick: plan every tracked contract up to head and hand the
//! chunks to a dispatcher.

mod chunks;
mod dispatcher;

pub use chunks::{Chunk, ChunkStatus};
pub use dispatcher::{
    index_with_retries, ChunkDispatcher, ChunkJob, RetryPolicy, TokioDispatcher,
};

use std::collections::BTreeSet;

use chrono::Utc;
use ethers::types::H256;
use tracing::{debug, error, info};

use crate::checkpoints;
use crate::config::{CheckpointPolicy, Config};
use crate::contracts::{ContractAbi, TrackedContract};
use crate::ingester::{self, IngesterError, Provider};
use crate::planner::{self, BlockRange};
use crate::Repo;

/// What one tick did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TickSummary {
    pub head: u64,
    pub contracts: usize,
    pub dispatched_chunks: usize,
    pub redispatched_chunks: usize,
    /// Contracts skipped because indexing them is blocked.
    pub blocked_contracts: Vec<String>,
    /// Contracts whose planning failed this tick.
    pub failed_contracts: Vec<String>,
}

#[derive(Debug, Default)]
struct ContractTick {
    dispatched_chunks: usize,
    redispatched_chunks: usize,
}

/// Runs one tick over every tracked contract.
///
/// Only a failure to read head or to list the contracts fails the tick.
/// A contract whose planning fails is logged and counted; the others go on.
pub async fn tick<R: Repo, P: Provider + ?Sized, D: ChunkDispatcher + ?Sized>(
    config: &Config<R>,
    provider: &P,
    dispatcher: &D,
) -> Result<TickSummary, IngesterError> {
    let head = ingester::fetch_current_block_number(provider).await?;
    let contracts = config.repo.get_all_contracts().await?;

    let mut summary = TickSummary {
        head,
        contracts: contracts.len(),
        ..Default::default()
    };

    for contract in contracts.iter() {
        if contract.is_blocked() {
            debug!(contract = %contract.address, "skipping blocked contract");
            summary.blocked_contracts.push(contract.address.clone());
            continue;
        }

        match tick_contract(config, contract, head, dispatcher).await {
            Ok(contract_tick) => {
                summary.dispatched_chunks += contract_tick.dispatched_chunks;
                summary.redispatched_chunks += contract_tick.redispatched_chunks;
            }
            Err(error) => {
                error!(contract = %contract.address, %error, "could not plan contract");
                summary.failed_contracts.push(contract.address.clone());
            }
        }
    }

    info!(
        head,
        contracts = summary.contracts,
        dispatched = summary.dispatched_chunks,
        redispatched = summary.redispatched_chunks,
        blocked = summary.blocked_contracts.len(),
        failed = summary.failed_contracts.len(),
        "tick finished"
    );

    Ok(summary)
}

async fn tick_contract<R: Repo, D: ChunkDispatcher + ?Sized>(
    config: &Config<R>,
    contract: &TrackedContract,
    head: u64,
    dispatcher: &D,
) -> Result<ContractTick, IngesterError> {
    let abi = contract.get_abi().map_err(|error| IngesterError::InvalidAbi(error.to_string()))?;

    match config.checkpoint_policy {
        CheckpointPolicy::AdvanceOnDispatch => {
            advance_on_dispatch(config, contract, &abi, head, dispatcher).await
        }
        CheckpointPolicy::AdvanceOnCompletion => {
            advance_on_completion(config, contract, &abi, head, dispatcher).await
        }
    }
}

/// Signature hashes of every event some application of the contract
/// subscribes to. Empty when nothing subscribes, which fetches every log.
///
/// Read only after the contract's marks moved, so an application stored
/// meanwhile either gets these topics or a backfill over the marked blocks.
async fn subscribed_topics<R: Repo>(
    repo: &R,
    contract: &TrackedContract,
    abi: &ContractAbi,
) -> Result<Vec<H256>, IngesterError> {
    let event_names: BTreeSet<String> = repo
        .get_applications_by_contract(&contract.address)
        .await?
        .iter()
        .flat_map(|application| application.get_event_names())
        .collect();
    let event_names: Vec<_> = event_names.into_iter().collect();

    Ok(abi.event_topics(&event_names))
}

async fn advance_on_dispatch<R: Repo, D: ChunkDispatcher + ?Sized>(
    config: &Config<R>,
    contract: &TrackedContract,
    abi: &ContractAbi,
    head: u64,
    dispatcher: &D,
) -> Result<ContractTick, IngesterError> {
    let checkpoint = config.repo.get_checkpoint(&contract.address).await?;
    let start = planner::resolve_start(checkpoint, contract.get_creation_block());
    let ranges = planner::plan(start, head, config.chunk_size);

    if ranges.is_empty() {
        return Ok(ContractTick::default());
    }

    checkpoints::advance(&config.repo, &contract.address, head as i64).await?;

    let event_topics = subscribed_topics(&config.repo, contract, abi).await?;
    dispatch_all(dispatcher, contract, &event_topics, &ranges);

    Ok(ContractTick {
        dispatched_chunks: ranges.len(),
        redispatched_chunks: 0,
    })
}

async fn advance_on_completion<R: Repo, D: ChunkDispatcher + ?Sized>(
    config: &Config<R>,
    contract: &TrackedContract,
    abi: &ContractAbi,
    head: u64,
    dispatcher: &D,
) -> Result<ContractTick, IngesterError> {
    let repo = &config.repo;
    let address = contract.address.as_str();

    let checkpoint = repo.get_checkpoint(address).await?;
    if checkpoint >= 0 {
        repo.prune_chunks(address, checkpoint).await?;
    }

    let chunks = repo.get_chunks(address).await?;
    let redispatched = checkpoints::redispatchable(
        checkpoint,
        &chunks,
        Utc::now(),
        config.chunk_lease_ms,
    );

    let dispatch_mark = contract.last_dispatched_block.max(checkpoint);
    let start = planner::resolve_next(dispatch_mark, contract.get_creation_block());
    let planned = planner::plan(start, head, config.chunk_size);

    let ranges: Vec<BlockRange> = redispatched.iter().chain(planned.iter()).copied().collect();
    if ranges.is_empty() {
        return Ok(ContractTick::default());
    }

    repo.upsert_pending_chunks(address, &ranges).await?;
    if !planned.is_empty() {
        repo.advance_dispatched_block(address, head as i64).await?;
    }

    let event_topics = subscribed_topics(repo, contract, abi).await?;
    dispatch_all(dispatcher, contract, &event_topics, &ranges);

    Ok(ContractTick {
        dispatched_chunks: planned.len(),
        redispatched_chunks: redispatched.len(),
    })
}

fn dispatch_all<D: ChunkDispatcher + ?Sized>(
    dispatcher: &D,
    contract: &TrackedContract,
    event_topics: &[H256],
    ranges: &[BlockRange],
) {
    for range in ranges {
        dispatcher.dispatch(ChunkJob {
            contract: contract.clone(),
            event_topics: event_topics.to_vec(),
            range: *range,
        });
    }
}
