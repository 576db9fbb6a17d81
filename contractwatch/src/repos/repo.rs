use derive_more::Display;
use std::fmt::Debug;

use serde::de::DeserializeOwned;

use crate::applications::Application;
use crate::backfills::{Backfill, BackfillStatus};
use crate::checkpoints::CheckpointStore;
use crate::contracts::{ContractAbi, ContractStatus, TrackedContract, UnsavedTrackedContract};
use crate::events::{EventsQuery, IndexedEvent};
use crate::planner::BlockRange;
use crate::scheduler::Chunk;

#[derive(Debug, Display, Clone, PartialEq)]
pub enum RepoError {
    #[display("repo not connected")]
    NotConnected,
    #[display("repo error: {_0}")]
    Unknown(String),
}

impl std::error::Error for RepoError {}

/// Everything the pipeline persists.
/// Writes are idempotent so at-least-once callers can retry them freely.
#[async_trait::async_trait]
pub trait Repo:
    CheckpointStore + Migratable + Clone + Debug + Sync + Send + 'static
{
    /// Creates the contract unless its address is already tracked,
    /// returning whichever row ends up stored.
    async fn create_contract(
        &self,
        contract: &UnsavedTrackedContract,
    ) -> Result<TrackedContract, RepoError>;
    async fn get_contract(&self, address: &str) -> Result<Option<TrackedContract>, RepoError>;
    async fn get_all_contracts(&self) -> Result<Vec<TrackedContract>, RepoError>;
    /// Removes the contract with its events, chunks and backfills.
    async fn delete_contract(&self, address: &str) -> Result<(), RepoError>;
    /// Replaces the ABI and lifts any block on the contract.
    async fn update_contract_abi(&self, address: &str, abi: &ContractAbi)
        -> Result<(), RepoError>;
    async fn block_contract(&self, address: &str, error: &str) -> Result<(), RepoError>;
    /// Raises the dispatch mark; lower values leave it untouched.
    async fn advance_dispatched_block(&self, address: &str, block: i64) -> Result<(), RepoError>;

    /// Inserts events in one transaction, skipping ids already stored.
    /// Returns how many rows were new.
    async fn upsert_events(&self, events: &[IndexedEvent]) -> Result<u64, RepoError>;
    async fn get_events(&self, query: &EventsQuery) -> Result<Vec<IndexedEvent>, RepoError>;

    async fn create_application(&self, application: &Application) -> Result<(), RepoError>;
    async fn get_application(
        &self,
        account_id: &str,
        id: &str,
    ) -> Result<Option<Application>, RepoError>;
    async fn get_applications(&self, account_id: &str) -> Result<Vec<Application>, RepoError>;
    async fn get_applications_by_contract(
        &self,
        address: &str,
    ) -> Result<Vec<Application>, RepoError>;
    async fn delete_application(&self, id: &str) -> Result<(), RepoError>;

    /// Records (or re-records) chunks as pending with a fresh dispatch time.
    async fn upsert_pending_chunks(
        &self,
        address: &str,
        ranges: &[BlockRange],
    ) -> Result<(), RepoError>;
    async fn complete_chunk(&self, address: &str, range: &BlockRange) -> Result<(), RepoError>;
    async fn fail_chunk(
        &self,
        address: &str,
        range: &BlockRange,
        error: &str,
    ) -> Result<(), RepoError>;
    async fn get_chunks(&self, address: &str) -> Result<Vec<Chunk>, RepoError>;
    /// Drops chunks ending at or below `up_to`.
    async fn prune_chunks(&self, address: &str, up_to: i64) -> Result<(), RepoError>;

    async fn create_backfill(&self, backfill: &Backfill) -> Result<(), RepoError>;
    async fn get_pending_backfills(&self) -> Result<Vec<Backfill>, RepoError>;
    async fn update_backfill_status(
        &self,
        application_id: &str,
        status: BackfillStatus,
        error: Option<&str>,
    ) -> Result<(), RepoError>;

    async fn load_contract_statuses(&self) -> Result<Vec<ContractStatus>, RepoError>;
}

#[async_trait::async_trait]
pub trait HasRawQueryClient {
    type RawQueryClient: Send + Sync;

    async fn get_raw_query_client(&self) -> Result<Self::RawQueryClient, RepoError>;
}

#[async_trait::async_trait]
pub trait ExecutesWithRawQuery: HasRawQueryClient {
    async fn execute_raw_query(
        client: &Self::RawQueryClient,
        query: &str,
    ) -> Result<(), RepoError>;
}

#[async_trait::async_trait]
pub trait LoadsDataWithRawQuery: HasRawQueryClient {
    async fn load_data_list_from_raw_query<Data: Send + DeserializeOwned>(
        client: &Self::RawQueryClient,
        query: &str,
    ) -> Result<Vec<Data>, RepoError>;
}

pub trait RepoMigrations {
    fn create_contracts_migration() -> &'static [&'static str];
    fn create_applications_migration() -> &'static [&'static str];
    fn create_events_migration() -> &'static [&'static str];
    fn create_chunks_migration() -> &'static [&'static str];
    fn create_backfills_migration() -> &'static [&'static str];
    fn drop_all_migration() -> &'static [&'static str];

    fn get_internal_migrations() -> Vec<&'static str> {
        [
            Self::create_contracts_migration(),
            Self::create_applications_migration(),
            Self::create_events_migration(),
            Self::create_chunks_migration(),
            Self::create_backfills_migration(),
        ]
        .concat()
    }

    fn get_reset_internal_migrations() -> Vec<&'static str> {
        Self::drop_all_migration().to_vec()
    }
}

#[async_trait::async_trait]
pub trait Migratable: Sync + Send {
    /// Brings the store's schema up to date. Safe to run on every start.
    async fn migrate(&self) -> Result<(), RepoError>;
}

pub struct SQLikeMigrations;

impl SQLikeMigrations {
    pub fn create_contracts() -> &'static [&'static str] {
        &[
            "CREATE TABLE IF NOT EXISTS contractwatch_contracts (
                id SERIAL PRIMARY KEY,
                address VARCHAR NOT NULL,
                abi JSON NOT NULL,
                creation_block BIGINT NOT NULL,
                creation_tx_hash VARCHAR NOT NULL,
                last_queried_block BIGINT NOT NULL DEFAULT -1,
                last_dispatched_block BIGINT NOT NULL DEFAULT -1,
                indexing_status VARCHAR NOT NULL DEFAULT 'active',
                indexing_error TEXT,
                inserted_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )",
            "CREATE UNIQUE INDEX IF NOT EXISTS contractwatch_contracts_address_index
        ON contractwatch_contracts(address)",
        ]
    }

    pub fn create_applications() -> &'static [&'static str] {
        &[
            "CREATE TABLE IF NOT EXISTS contractwatch_applications (
                id VARCHAR PRIMARY KEY,
                account_id VARCHAR NOT NULL,
                contract_address VARCHAR NOT NULL
                    REFERENCES contractwatch_contracts(address) ON DELETE CASCADE,
                name VARCHAR(100) NOT NULL,
                start_block BIGINT NOT NULL,
                event_names JSON NOT NULL,
                inserted_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )",
            "CREATE INDEX IF NOT EXISTS contractwatch_applications_account_index
        ON contractwatch_applications(account_id)",
            "CREATE INDEX IF NOT EXISTS contractwatch_applications_contract_index
        ON contractwatch_applications(contract_address)",
        ]
    }

    pub fn create_events() -> &'static [&'static str] {
        &[
            "CREATE TABLE IF NOT EXISTS contractwatch_events (
                id uuid PRIMARY KEY,
                contract_address VARCHAR NOT NULL
                    REFERENCES contractwatch_contracts(address) ON DELETE CASCADE,
                name VARCHAR NOT NULL,
                block_number BIGINT NOT NULL,
                block_hash VARCHAR NOT NULL,
                transaction_hash VARCHAR NOT NULL,
                transaction_index BIGINT NOT NULL,
                log_index BIGINT NOT NULL,
                topics JSON NOT NULL,
                data TEXT NOT NULL,
                args JSON NOT NULL,
                inserted_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )",
            "CREATE UNIQUE INDEX IF NOT EXISTS contractwatch_events_transaction_log_index
            ON contractwatch_events(transaction_hash, log_index)",
            "CREATE INDEX IF NOT EXISTS contractwatch_events_contract_block_log_index
            ON contractwatch_events(contract_address, block_number, log_index)",
        ]
    }

    pub fn create_chunks() -> &'static [&'static str] {
        &["CREATE TABLE IF NOT EXISTS contractwatch_chunks (
                contract_address VARCHAR NOT NULL
                    REFERENCES contractwatch_contracts(address) ON DELETE CASCADE,
                from_block BIGINT NOT NULL,
                to_block BIGINT NOT NULL,
                status VARCHAR NOT NULL,
                attempts INTEGER NOT NULL DEFAULT 1,
                last_error TEXT,
                dispatched_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                completed_at TIMESTAMPTZ,
                PRIMARY KEY (contract_address, from_block, to_block)
            )"]
    }

    pub fn create_backfills() -> &'static [&'static str] {
        &["CREATE TABLE IF NOT EXISTS contractwatch_backfills (
                application_id VARCHAR PRIMARY KEY
                    REFERENCES contractwatch_applications(id) ON DELETE CASCADE,
                contract_address VARCHAR NOT NULL,
                from_block BIGINT NOT NULL,
                to_block BIGINT NOT NULL,
                event_names JSON NOT NULL,
                status VARCHAR NOT NULL,
                last_error TEXT,
                inserted_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )"]
    }

    pub fn drop_all() -> &'static [&'static str] {
        &[
            "DROP TABLE IF EXISTS contractwatch_backfills",
            "DROP TABLE IF EXISTS contractwatch_chunks",
            "DROP TABLE IF EXISTS contractwatch_events",
            "DROP TABLE IF EXISTS contractwatch_applications",
            "DROP TABLE IF EXISTS contractwatch_contracts",
        ]
    }
}
