use ethers::types::H256;
use tracing::{debug, info, warn};

use crate::contracts::TrackedContract;
use crate::decoder::{self, DecodeError};
use crate::events::IndexedEvent;
use crate::planner::BlockRange;
use crate::Repo;

use super::log_fetcher;
use super::provider::Provider;
use super::IngesterError;

/// Fetches, decodes and persists the events of one contract in one range.
///
/// Idempotent: indexing the same range again, or concurrently, stores each
/// log once. Logs no ABI event matches are skipped. Logs that match an event
/// but do not fit it are skipped too and block the contract with the
/// mismatch as diagnostic. Fetch or persistence failures fail the whole
/// chunk with nothing written.
///
/// Returns the number of decoded events of the range.
#[tracing::instrument(
    name = "index_chunk",
    skip_all,
    fields(contract = %contract.address, from_block = range.from, to_block = range.to)
)]
pub async fn index_chunk<P: Provider + ?Sized, R: Repo>(
    provider: &P,
    repo: &R,
    contract: &TrackedContract,
    event_topics: &[H256],
    range: BlockRange,
) -> Result<u64, IngesterError> {
    let abi = contract.get_abi().map_err(|error| IngesterError::InvalidAbi(error.to_string()))?;
    let logs = log_fetcher::fetch(provider, &contract.address, event_topics, range).await?;

    let mut events = Vec::with_capacity(logs.len());
    let mut abi_mismatch = None;

    for log in logs.iter() {
        match decoder::decode(log, &abi) {
            Ok(decoded_event) => {
                events.push(IndexedEvent::new(&contract.address, log, &decoded_event))
            }
            Err(DecodeError::UnknownEvent(topic0)) => {
                debug!(
                    block = log.block_number,
                    log_index = log.log_index,
                    ?topic0,
                    "skipping unknown event"
                );
            }
            Err(error @ DecodeError::AbiMismatch { .. }) => {
                warn!(
                    block = log.block_number,
                    log_index = log.log_index,
                    %error,
                    "skipping undecodable log"
                );
                abi_mismatch.get_or_insert(error);
            }
        }
    }

    let inserted = repo.upsert_events(&events).await?;

    if let Some(error) = abi_mismatch {
        repo.block_contract(&contract.address, &error.to_string()).await?;
    }

    info!(logs = logs.len(), events = events.len(), inserted, "indexed chunk");

    Ok(events.len() as u64)
}
