mod migrations;
mod raw_queries;

pub use raw_queries::PostgresRepoRawQueryClient;

use chrono::Utc;
use diesel::{
    upsert::excluded, BoolExpressionMethods, ExpressionMethods, OptionalExtension, QueryDsl,
};
use diesel_async::{
    pooled_connection::{bb8::PooledConnection, AsyncDieselConnectionManager},
    scoped_futures::ScopedFutureExt,
    AsyncConnection, AsyncPgConnection, RunQueryDsl,
};

use crate::applications::Application;
use crate::backfills::{Backfill, BackfillStatus};
use crate::checkpoints::{CheckpointError, CheckpointStore};
use crate::contracts::{
    ContractAbi, ContractStatus, IndexingStatus, TrackedContract, UnsavedTrackedContract,
};
use crate::events::{EventsQuery, IndexedEvent};
use crate::planner::BlockRange;
use crate::scheduler::{Chunk, ChunkStatus};

use super::repo::{HasRawQueryClient, LoadsDataWithRawQuery, Repo, RepoError};

pub type Conn<'a> = PooledConnection<'a, AsyncPgConnection>;
pub type Pool = bb8::Pool<AsyncDieselConnectionManager<AsyncPgConnection>>;

/// Rows per `INSERT` statement; Postgres caps bind parameters per query.
const EVENTS_INSERT_BATCH_SIZE: usize = 1_000;

#[derive(Clone)]
pub struct PostgresRepo {
    url: String,
    pool: Pool,
}

impl std::fmt::Debug for PostgresRepo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresRepo").field("pool", &self.pool.state()).finish()
    }
}

impl From<diesel::result::Error> for RepoError {
    fn from(value: diesel::result::Error) -> Self {
        RepoError::Unknown(value.to_string())
    }
}

impl PostgresRepo {
    pub async fn new(url: &str) -> Result<Self, RepoError> {
        Self::with_max_pool_size(url, 10).await
    }

    pub async fn with_max_pool_size(url: &str, max_size: u32) -> Result<Self, RepoError> {
        let manager = AsyncDieselConnectionManager::<AsyncPgConnection>::new(url);
        let pool = bb8::Pool::builder()
            .max_size(max_size)
            .build(manager)
            .await
            .map_err(|error| RepoError::Unknown(error.to_string()))?;

        Ok(Self {
            url: url.to_string(),
            pool,
        })
    }

    pub fn get_pool(&self) -> &Pool {
        &self.pool
    }

    pub async fn get_conn(&self) -> Result<Conn<'_>, RepoError> {
        self.pool.get().await.map_err(|_| RepoError::NotConnected)
    }

    async fn find_checkpoint(&self, address: &str) -> Result<Option<i64>, RepoError> {
        use crate::diesel::schema::contractwatch_contracts::dsl;

        let mut conn = self.get_conn().await?;

        let checkpoint = dsl::contractwatch_contracts
            .filter(dsl::address.eq(address.to_lowercase()))
            .select(dsl::last_queried_block)
            .first::<i64>(&mut conn)
            .await
            .optional()?;

        Ok(checkpoint)
    }
}

#[async_trait::async_trait]
impl CheckpointStore for PostgresRepo {
    async fn get_checkpoint(&self, address: &str) -> Result<i64, CheckpointError> {
        self.find_checkpoint(address)
            .await?
            .ok_or_else(|| CheckpointError::NotTracked(address.to_lowercase()))
    }

    async fn set_checkpoint(&self, address: &str, block: i64) -> Result<(), CheckpointError> {
        use crate::diesel::schema::contractwatch_contracts::dsl;

        let address = address.to_lowercase();
        let mut conn = self.get_conn().await?;

        let updated = diesel::update(dsl::contractwatch_contracts)
            .filter(dsl::address.eq(&address))
            .filter(dsl::last_queried_block.le(block))
            .set((dsl::last_queried_block.eq(block), dsl::updated_at.eq(Utc::now())))
            .execute(&mut conn)
            .await
            .map_err(RepoError::from)?;

        if updated > 0 {
            return Ok(());
        }

        match self.find_checkpoint(&address).await? {
            None => Err(CheckpointError::NotTracked(address)),
            Some(current) if current > block => Err(CheckpointError::Regression {
                address,
                current,
                attempted: block,
            }),
            Some(_) => Ok(()),
        }
    }
}

#[async_trait::async_trait]
impl Repo for PostgresRepo {
    async fn create_contract(
        &self,
        contract: &UnsavedTrackedContract,
    ) -> Result<TrackedContract, RepoError> {
        use crate::diesel::schema::contractwatch_contracts::dsl;

        let mut conn = self.get_conn().await?;

        diesel::insert_into(dsl::contractwatch_contracts)
            .values(contract)
            .on_conflict(dsl::address)
            .do_nothing()
            .execute(&mut conn)
            .await?;

        let tracked_contract = dsl::contractwatch_contracts
            .filter(dsl::address.eq(&contract.address))
            .first::<TrackedContract>(&mut conn)
            .await?;

        Ok(tracked_contract)
    }

    async fn get_contract(&self, address: &str) -> Result<Option<TrackedContract>, RepoError> {
        use crate::diesel::schema::contractwatch_contracts::dsl;

        let mut conn = self.get_conn().await?;

        let contract = dsl::contractwatch_contracts
            .filter(dsl::address.eq(address.to_lowercase()))
            .first::<TrackedContract>(&mut conn)
            .await
            .optional()?;

        Ok(contract)
    }

    async fn get_all_contracts(&self) -> Result<Vec<TrackedContract>, RepoError> {
        use crate::diesel::schema::contractwatch_contracts::dsl;

        let mut conn = self.get_conn().await?;

        let contracts = dsl::contractwatch_contracts
            .order_by(dsl::id.asc())
            .load::<TrackedContract>(&mut conn)
            .await?;

        Ok(contracts)
    }

    async fn delete_contract(&self, address: &str) -> Result<(), RepoError> {
        use crate::diesel::schema::contractwatch_contracts::dsl;

        let mut conn = self.get_conn().await?;

        diesel::delete(dsl::contractwatch_contracts)
            .filter(dsl::address.eq(address.to_lowercase()))
            .execute(&mut conn)
            .await?;

        Ok(())
    }

    async fn update_contract_abi(
        &self,
        address: &str,
        abi: &ContractAbi,
    ) -> Result<(), RepoError> {
        use crate::diesel::schema::contractwatch_contracts::dsl;

        let mut conn = self.get_conn().await?;

        diesel::update(dsl::contractwatch_contracts)
            .filter(dsl::address.eq(address.to_lowercase()))
            .set((
                dsl::abi.eq(abi.as_json().clone()),
                dsl::indexing_status.eq(IndexingStatus::Active.to_string()),
                dsl::indexing_error.eq(None::<String>),
                dsl::updated_at.eq(Utc::now()),
            ))
            .execute(&mut conn)
            .await?;

        Ok(())
    }

    async fn block_contract(&self, address: &str, error: &str) -> Result<(), RepoError> {
        use crate::diesel::schema::contractwatch_contracts::dsl;

        let mut conn = self.get_conn().await?;

        diesel::update(dsl::contractwatch_contracts)
            .filter(dsl::address.eq(address.to_lowercase()))
            .set((
                dsl::indexing_status.eq(IndexingStatus::Blocked.to_string()),
                dsl::indexing_error.eq(Some(error)),
                dsl::updated_at.eq(Utc::now()),
            ))
            .execute(&mut conn)
            .await?;

        Ok(())
    }

    async fn advance_dispatched_block(&self, address: &str, block: i64) -> Result<(), RepoError> {
        use crate::diesel::schema::contractwatch_contracts::dsl;

        let mut conn = self.get_conn().await?;

        diesel::update(dsl::contractwatch_contracts)
            .filter(dsl::address.eq(address.to_lowercase()))
            .filter(dsl::last_dispatched_block.lt(block))
            .set((dsl::last_dispatched_block.eq(block), dsl::updated_at.eq(Utc::now())))
            .execute(&mut conn)
            .await?;

        Ok(())
    }

    async fn upsert_events(&self, events: &[IndexedEvent]) -> Result<u64, RepoError> {
        use crate::diesel::schema::contractwatch_events::dsl;

        if events.is_empty() {
            return Ok(0);
        }

        let mut conn = self.get_conn().await?;
        let conn: &mut AsyncPgConnection = &mut conn;

        let inserted = conn
            .transaction::<usize, diesel::result::Error, _>(|txn_conn| {
                async move {
                    let mut inserted = 0;

                    for batch in events.chunks(EVENTS_INSERT_BATCH_SIZE) {
                        inserted += diesel::insert_into(dsl::contractwatch_events)
                            .values(batch)
                            .on_conflict_do_nothing()
                            .execute(txn_conn)
                            .await?;
                    }

                    Ok(inserted)
                }
                .scope_boxed()
            })
            .await?;

        Ok(inserted as u64)
    }

    async fn get_events(&self, query: &EventsQuery) -> Result<Vec<IndexedEvent>, RepoError> {
        use crate::diesel::schema::contractwatch_events::dsl;

        let mut conn = self.get_conn().await?;

        let mut events_query = dsl::contractwatch_events
            .filter(dsl::contract_address.eq(query.contract_address.to_lowercase()))
            .into_boxed();

        if let Some(name) = &query.name {
            events_query = events_query.filter(dsl::name.eq(name.clone()));
        }
        if let Some(from_block) = query.from_block {
            events_query = events_query.filter(dsl::block_number.ge(from_block as i64));
        }
        if let Some(to_block) = query.to_block {
            events_query = events_query.filter(dsl::block_number.le(to_block as i64));
        }

        let events = events_query
            .order_by((dsl::block_number.asc(), dsl::log_index.asc()))
            .limit(query.limit)
            .offset(query.offset)
            .load::<IndexedEvent>(&mut conn)
            .await?;

        Ok(events)
    }

    async fn create_application(&self, application: &Application) -> Result<(), RepoError> {
        use crate::diesel::schema::contractwatch_applications::dsl;

        let mut conn = self.get_conn().await?;

        diesel::insert_into(dsl::contractwatch_applications)
            .values(application)
            .on_conflict(dsl::id)
            .do_nothing()
            .execute(&mut conn)
            .await?;

        Ok(())
    }

    async fn get_application(
        &self,
        account_id: &str,
        id: &str,
    ) -> Result<Option<Application>, RepoError> {
        use crate::diesel::schema::contractwatch_applications::dsl;

        let mut conn = self.get_conn().await?;

        let application = dsl::contractwatch_applications
            .filter(dsl::id.eq(id).and(dsl::account_id.eq(account_id)))
            .first::<Application>(&mut conn)
            .await
            .optional()?;

        Ok(application)
    }

    async fn get_applications(&self, account_id: &str) -> Result<Vec<Application>, RepoError> {
        use crate::diesel::schema::contractwatch_applications::dsl;

        let mut conn = self.get_conn().await?;

        let applications = dsl::contractwatch_applications
            .filter(dsl::account_id.eq(account_id))
            .order_by(dsl::inserted_at.asc())
            .load::<Application>(&mut conn)
            .await?;

        Ok(applications)
    }

    async fn get_applications_by_contract(
        &self,
        address: &str,
    ) -> Result<Vec<Application>, RepoError> {
        use crate::diesel::schema::contractwatch_applications::dsl;

        let mut conn = self.get_conn().await?;

        let applications = dsl::contractwatch_applications
            .filter(dsl::contract_address.eq(address.to_lowercase()))
            .order_by(dsl::inserted_at.asc())
            .load::<Application>(&mut conn)
            .await?;

        Ok(applications)
    }

    async fn delete_application(&self, id: &str) -> Result<(), RepoError> {
        use crate::diesel::schema::contractwatch_applications::dsl;

        let mut conn = self.get_conn().await?;

        diesel::delete(dsl::contractwatch_applications)
            .filter(dsl::id.eq(id))
            .execute(&mut conn)
            .await?;

        Ok(())
    }

    async fn upsert_pending_chunks(
        &self,
        address: &str,
        ranges: &[BlockRange],
    ) -> Result<(), RepoError> {
        use crate::diesel::schema::contractwatch_chunks::dsl;

        if ranges.is_empty() {
            return Ok(());
        }

        let chunks: Vec<_> = ranges.iter().map(|range| Chunk::pending(address, range)).collect();
        let mut conn = self.get_conn().await?;

        diesel::insert_into(dsl::contractwatch_chunks)
            .values(&chunks)
            .on_conflict((dsl::contract_address, dsl::from_block, dsl::to_block))
            .do_update()
            .set((
                dsl::status.eq(excluded(dsl::status)),
                dsl::attempts.eq(dsl::attempts + 1),
                dsl::dispatched_at.eq(excluded(dsl::dispatched_at)),
            ))
            .execute(&mut conn)
            .await?;

        Ok(())
    }

    async fn complete_chunk(&self, address: &str, range: &BlockRange) -> Result<(), RepoError> {
        use crate::diesel::schema::contractwatch_chunks::dsl;

        let mut conn = self.get_conn().await?;

        diesel::update(dsl::contractwatch_chunks)
            .filter(dsl::contract_address.eq(address.to_lowercase()))
            .filter(dsl::from_block.eq(range.from as i64))
            .filter(dsl::to_block.eq(range.to as i64))
            .set((
                dsl::status.eq(ChunkStatus::Completed.to_string()),
                dsl::last_error.eq(None::<String>),
                dsl::completed_at.eq(Some(Utc::now())),
            ))
            .execute(&mut conn)
            .await?;

        Ok(())
    }

    async fn fail_chunk(
        &self,
        address: &str,
        range: &BlockRange,
        error: &str,
    ) -> Result<(), RepoError> {
        use crate::diesel::schema::contractwatch_chunks::dsl;

        let mut conn = self.get_conn().await?;

        diesel::update(dsl::contractwatch_chunks)
            .filter(dsl::contract_address.eq(address.to_lowercase()))
            .filter(dsl::from_block.eq(range.from as i64))
            .filter(dsl::to_block.eq(range.to as i64))
            .filter(dsl::status.ne(ChunkStatus::Completed.to_string()))
            .set((
                dsl::status.eq(ChunkStatus::Failed.to_string()),
                dsl::last_error.eq(Some(error)),
            ))
            .execute(&mut conn)
            .await?;

        Ok(())
    }

    async fn get_chunks(&self, address: &str) -> Result<Vec<Chunk>, RepoError> {
        use crate::diesel::schema::contractwatch_chunks::dsl;

        let mut conn = self.get_conn().await?;

        let chunks = dsl::contractwatch_chunks
            .filter(dsl::contract_address.eq(address.to_lowercase()))
            .order_by((dsl::from_block.asc(), dsl::to_block.asc()))
            .load::<Chunk>(&mut conn)
            .await?;

        Ok(chunks)
    }

    async fn prune_chunks(&self, address: &str, up_to: i64) -> Result<(), RepoError> {
        use crate::diesel::schema::contractwatch_chunks::dsl;

        let mut conn = self.get_conn().await?;

        diesel::delete(dsl::contractwatch_chunks)
            .filter(dsl::contract_address.eq(address.to_lowercase()))
            .filter(dsl::to_block.le(up_to))
            .execute(&mut conn)
            .await?;

        Ok(())
    }

    async fn create_backfill(&self, backfill: &Backfill) -> Result<(), RepoError> {
        use crate::diesel::schema::contractwatch_backfills::dsl;

        let mut conn = self.get_conn().await?;

        diesel::insert_into(dsl::contractwatch_backfills)
            .values(backfill)
            .on_conflict(dsl::application_id)
            .do_nothing()
            .execute(&mut conn)
            .await?;

        Ok(())
    }

    async fn get_pending_backfills(&self) -> Result<Vec<Backfill>, RepoError> {
        use crate::diesel::schema::contractwatch_backfills::dsl;

        let mut conn = self.get_conn().await?;

        let backfills = dsl::contractwatch_backfills
            .filter(dsl::status.eq(BackfillStatus::Pending.to_string()))
            .order_by(dsl::inserted_at.asc())
            .load::<Backfill>(&mut conn)
            .await?;

        Ok(backfills)
    }

    async fn update_backfill_status(
        &self,
        application_id: &str,
        status: BackfillStatus,
        error: Option<&str>,
    ) -> Result<(), RepoError> {
        use crate::diesel::schema::contractwatch_backfills::dsl;

        let mut conn = self.get_conn().await?;

        diesel::update(dsl::contractwatch_backfills)
            .filter(dsl::application_id.eq(application_id))
            .set((
                dsl::status.eq(status.to_string()),
                dsl::last_error.eq(error),
                dsl::updated_at.eq(Utc::now()),
            ))
            .execute(&mut conn)
            .await?;

        Ok(())
    }

    async fn load_contract_statuses(&self) -> Result<Vec<ContractStatus>, RepoError> {
        let client = self.get_raw_query_client().await?;

        Self::load_data_list_from_raw_query(&client, raw_queries::CONTRACT_STATUSES_QUERY).await
    }
}
