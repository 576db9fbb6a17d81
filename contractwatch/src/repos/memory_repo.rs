//! In-memory repo.
//!
//! Keeps contracts, applications, events, chunks and backfills in RAM with
//! the same semantics as the Postgres repo. Useful for tests and for
//! short-lived indexers that don't need persistence.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;

use crate::applications::Application;
use crate::backfills::{Backfill, BackfillStatus};
use crate::checkpoints::{CheckpointError, CheckpointStore};
use crate::contracts::{
    ContractAbi, ContractStatus, IndexingStatus, TrackedContract, UnsavedTrackedContract,
};
use crate::events::{EventsQuery, IndexedEvent};
use crate::planner::BlockRange;
use crate::scheduler::{Chunk, ChunkStatus};

use super::repo::{Migratable, Repo, RepoError};

type ChunkKey = (String, i64, i64);

#[derive(Debug, Default)]
struct MemoryState {
    next_contract_id: i32,
    contracts: BTreeMap<String, TrackedContract>,
    applications: BTreeMap<String, Application>,
    events: Vec<IndexedEvent>,
    event_ids: HashSet<uuid::Uuid>,
    chunks: BTreeMap<ChunkKey, Chunk>,
    backfills: BTreeMap<String, Backfill>,
}

impl MemoryState {
    fn contract_mut(&mut self, address: &str) -> Result<&mut TrackedContract, RepoError> {
        self.contracts
            .get_mut(&address.to_lowercase())
            .ok_or_else(|| RepoError::Unknown(format!("contract {address} is not tracked")))
    }

    fn chunk_key(address: &str, range: &BlockRange) -> ChunkKey {
        (address.to_lowercase(), range.from as i64, range.to as i64)
    }
}

#[derive(Clone, Debug, Default)]
pub struct MemoryRepo {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryRepo {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> Result<MutexGuard<'_, MemoryState>, RepoError> {
        self.state.lock().map_err(|error| RepoError::Unknown(error.to_string()))
    }

    pub fn event_count(&self) -> usize {
        self.state().map(|state| state.events.len()).unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl Migratable for MemoryRepo {
    async fn migrate(&self) -> Result<(), RepoError> {
        Ok(())
    }
}

#[async_trait::async_trait]
impl CheckpointStore for MemoryRepo {
    async fn get_checkpoint(&self, address: &str) -> Result<i64, CheckpointError> {
        let state = self.state()?;

        state
            .contracts
            .get(&address.to_lowercase())
            .map(|contract| contract.last_queried_block)
            .ok_or_else(|| CheckpointError::NotTracked(address.to_lowercase()))
    }

    async fn set_checkpoint(&self, address: &str, block: i64) -> Result<(), CheckpointError> {
        let mut state = self.state()?;
        let address = address.to_lowercase();
        let contract = state
            .contracts
            .get_mut(&address)
            .ok_or_else(|| CheckpointError::NotTracked(address.clone()))?;

        if block < contract.last_queried_block {
            return Err(CheckpointError::Regression {
                address,
                current: contract.last_queried_block,
                attempted: block,
            });
        }

        if block > contract.last_queried_block {
            contract.last_queried_block = block;
            contract.updated_at = Utc::now();
        }

        Ok(())
    }
}

#[async_trait::async_trait]
impl Repo for MemoryRepo {
    async fn create_contract(
        &self,
        contract: &UnsavedTrackedContract,
    ) -> Result<TrackedContract, RepoError> {
        let mut state = self.state()?;
        let address = contract.address.to_lowercase();

        if let Some(existing) = state.contracts.get(&address) {
            return Ok(existing.clone());
        }

        state.next_contract_id += 1;
        let now = Utc::now();
        let tracked_contract = TrackedContract {
            id: state.next_contract_id,
            address: address.clone(),
            abi: contract.abi.clone(),
            creation_block: contract.creation_block,
            creation_tx_hash: contract.creation_tx_hash.clone(),
            last_queried_block: contract.last_queried_block,
            last_dispatched_block: contract.last_dispatched_block,
            indexing_status: contract.indexing_status.clone(),
            indexing_error: None,
            inserted_at: now,
            updated_at: now,
        };
        state.contracts.insert(address, tracked_contract.clone());

        Ok(tracked_contract)
    }

    async fn get_contract(&self, address: &str) -> Result<Option<TrackedContract>, RepoError> {
        Ok(self.state()?.contracts.get(&address.to_lowercase()).cloned())
    }

    async fn get_all_contracts(&self) -> Result<Vec<TrackedContract>, RepoError> {
        let mut contracts: Vec<_> = self.state()?.contracts.values().cloned().collect();
        contracts.sort_by_key(|contract| contract.id);

        Ok(contracts)
    }

    async fn delete_contract(&self, address: &str) -> Result<(), RepoError> {
        let mut state = self.state()?;
        let address = address.to_lowercase();

        state.contracts.remove(&address);
        state.applications.retain(|_, application| application.contract_address != address);
        state.backfills.retain(|_, backfill| backfill.contract_address != address);
        state.chunks.retain(|(chunk_address, _, _), _| *chunk_address != address);

        let MemoryState {
            events, event_ids, ..
        } = &mut *state;
        events.retain(|event| {
            let keep = event.contract_address != address;
            if !keep {
                event_ids.remove(&event.id);
            }
            keep
        });

        Ok(())
    }

    async fn update_contract_abi(
        &self,
        address: &str,
        abi: &ContractAbi,
    ) -> Result<(), RepoError> {
        let mut state = self.state()?;
        let contract = state.contract_mut(address)?;

        contract.abi = abi.as_json().clone();
        contract.indexing_status = IndexingStatus::Active.to_string();
        contract.indexing_error = None;
        contract.updated_at = Utc::now();

        Ok(())
    }

    async fn block_contract(&self, address: &str, error: &str) -> Result<(), RepoError> {
        let mut state = self.state()?;
        let contract = state.contract_mut(address)?;

        contract.indexing_status = IndexingStatus::Blocked.to_string();
        contract.indexing_error = Some(error.to_string());
        contract.updated_at = Utc::now();

        Ok(())
    }

    async fn advance_dispatched_block(&self, address: &str, block: i64) -> Result<(), RepoError> {
        let mut state = self.state()?;
        let contract = state.contract_mut(address)?;

        if block > contract.last_dispatched_block {
            contract.last_dispatched_block = block;
            contract.updated_at = Utc::now();
        }

        Ok(())
    }

    async fn upsert_events(&self, events: &[IndexedEvent]) -> Result<u64, RepoError> {
        let mut state = self.state()?;
        let mut inserted = 0;

        for event in events {
            if state.event_ids.insert(event.id) {
                state.events.push(event.clone());
                inserted += 1;
            }
        }

        Ok(inserted)
    }

    async fn get_events(&self, query: &EventsQuery) -> Result<Vec<IndexedEvent>, RepoError> {
        let state = self.state()?;
        let mut events: Vec<_> = state.events.iter().filter(|e| query.matches(e)).collect();
        events.sort_by_key(|event| (event.block_number, event.log_index));

        Ok(events
            .into_iter()
            .skip(query.offset.max(0) as usize)
            .take(query.limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn create_application(&self, application: &Application) -> Result<(), RepoError> {
        let mut state = self.state()?;

        if !state.contracts.contains_key(&application.contract_address) {
            return Err(RepoError::Unknown(format!(
                "contract {} is not tracked",
                application.contract_address
            )));
        }
        state.applications.insert(application.id.clone(), application.clone());

        Ok(())
    }

    async fn get_application(
        &self,
        account_id: &str,
        id: &str,
    ) -> Result<Option<Application>, RepoError> {
        let state = self.state()?;

        Ok(state.applications.get(id).filter(|app| app.account_id == account_id).cloned())
    }

    async fn get_applications(&self, account_id: &str) -> Result<Vec<Application>, RepoError> {
        let state = self.state()?;
        let mut applications: Vec<_> = state
            .applications
            .values()
            .filter(|application| application.account_id == account_id)
            .cloned()
            .collect();
        applications.sort_by_key(|application| application.inserted_at);

        Ok(applications)
    }

    async fn get_applications_by_contract(
        &self,
        address: &str,
    ) -> Result<Vec<Application>, RepoError> {
        let state = self.state()?;
        let address = address.to_lowercase();

        Ok(state
            .applications
            .values()
            .filter(|application| application.contract_address == address)
            .cloned()
            .collect())
    }

    async fn delete_application(&self, id: &str) -> Result<(), RepoError> {
        let mut state = self.state()?;

        state.applications.remove(id);
        state.backfills.remove(id);

        Ok(())
    }

    async fn upsert_pending_chunks(
        &self,
        address: &str,
        ranges: &[BlockRange],
    ) -> Result<(), RepoError> {
        let mut state = self.state()?;

        for range in ranges {
            let key = MemoryState::chunk_key(address, range);

            match state.chunks.get_mut(&key) {
                Some(chunk) => {
                    chunk.status = ChunkStatus::Pending.to_string();
                    chunk.attempts += 1;
                    chunk.dispatched_at = Utc::now();
                }
                None => {
                    state.chunks.insert(key, Chunk::pending(address, range));
                }
            }
        }

        Ok(())
    }

    async fn complete_chunk(&self, address: &str, range: &BlockRange) -> Result<(), RepoError> {
        let mut state = self.state()?;

        if let Some(chunk) = state.chunks.get_mut(&MemoryState::chunk_key(address, range)) {
            chunk.status = ChunkStatus::Completed.to_string();
            chunk.last_error = None;
            chunk.completed_at = Some(Utc::now());
        }

        Ok(())
    }

    async fn fail_chunk(
        &self,
        address: &str,
        range: &BlockRange,
        error: &str,
    ) -> Result<(), RepoError> {
        let mut state = self.state()?;

        if let Some(chunk) = state.chunks.get_mut(&MemoryState::chunk_key(address, range)) {
            if chunk.get_status() != ChunkStatus::Completed {
                chunk.status = ChunkStatus::Failed.to_string();
                chunk.last_error = Some(error.to_string());
            }
        }

        Ok(())
    }

    async fn get_chunks(&self, address: &str) -> Result<Vec<Chunk>, RepoError> {
        let state = self.state()?;
        let address = address.to_lowercase();

        Ok(state
            .chunks
            .values()
            .filter(|chunk| chunk.contract_address == address)
            .cloned()
            .collect())
    }

    async fn prune_chunks(&self, address: &str, up_to: i64) -> Result<(), RepoError> {
        let mut state = self.state()?;
        let address = address.to_lowercase();

        state.chunks.retain(|(chunk_address, _, to_block), _| {
            *chunk_address != address || *to_block > up_to
        });

        Ok(())
    }

    async fn create_backfill(&self, backfill: &Backfill) -> Result<(), RepoError> {
        let mut state = self.state()?;

        state
            .backfills
            .entry(backfill.application_id.clone())
            .or_insert_with(|| backfill.clone());

        Ok(())
    }

    async fn get_pending_backfills(&self) -> Result<Vec<Backfill>, RepoError> {
        let state = self.state()?;
        let pending = BackfillStatus::Pending.to_string();

        Ok(state.backfills.values().filter(|b| b.status == pending).cloned().collect())
    }

    async fn update_backfill_status(
        &self,
        application_id: &str,
        status: BackfillStatus,
        error: Option<&str>,
    ) -> Result<(), RepoError> {
        let mut state = self.state()?;

        if let Some(backfill) = state.backfills.get_mut(application_id) {
            backfill.status = status.to_string();
            backfill.last_error = error.map(|error| error.to_string());
            backfill.updated_at = Utc::now();
        }

        Ok(())
    }

    async fn load_contract_statuses(&self) -> Result<Vec<ContractStatus>, RepoError> {
        let state = self.state()?;

        Ok(state
            .contracts
            .values()
            .map(|contract| {
                let count_chunks = |status: ChunkStatus| {
                    state
                        .chunks
                        .values()
                        .filter(|c| c.contract_address == contract.address)
                        .filter(|c| c.get_status() == status)
                        .count() as i64
                };

                let backfills: Vec<_> = state
                    .backfills
                    .values()
                    .filter(|b| b.contract_address == contract.address)
                    .collect();
                let count_backfills = |status: BackfillStatus| {
                    backfills.iter().filter(|b| b.get_status() == status).count() as i64
                };

                ContractStatus {
                    address: contract.address.clone(),
                    creation_block: contract.creation_block,
                    last_queried_block: contract.last_queried_block,
                    last_dispatched_block: contract.last_dispatched_block,
                    indexing_status: contract.indexing_status.clone(),
                    indexing_error: contract.indexing_error.clone(),
                    pending_chunks: count_chunks(ChunkStatus::Pending),
                    failed_chunks: count_chunks(ChunkStatus::Failed),
                    pending_backfills: count_backfills(BackfillStatus::Pending),
                    failed_backfills: count_backfills(BackfillStatus::Failed),
                    backfill_error: backfills
                        .iter()
                        .filter(|b| b.last_error.is_some())
                        .max_by_key(|b| b.updated_at)
                        .and_then(|b| b.last_error.clone()),
                }
            })
            .collect())
    }
}
