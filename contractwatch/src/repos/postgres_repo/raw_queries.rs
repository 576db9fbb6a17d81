use tokio_postgres::{types::ToSql, Client, NoTls};

use crate::repos::repo::{
    ExecutesWithRawQuery, HasRawQueryClient, LoadsDataWithRawQuery, RepoError,
};
use crate::PostgresRepo;
use serde::de::DeserializeOwned;

pub type PostgresRepoRawQueryClient = Client;

pub const CONTRACT_STATUSES_QUERY: &str = "SELECT
        contracts.address,
        contracts.creation_block,
        contracts.last_queried_block,
        contracts.last_dispatched_block,
        contracts.indexing_status,
        contracts.indexing_error,
        COUNT(chunks.from_block) FILTER (WHERE chunks.status = 'pending') AS pending_chunks,
        COUNT(chunks.from_block) FILTER (WHERE chunks.status = 'failed') AS failed_chunks,
        (SELECT COUNT(*) FROM contractwatch_backfills backfills
            WHERE backfills.contract_address = contracts.address
            AND backfills.status = 'pending') AS pending_backfills,
        (SELECT COUNT(*) FROM contractwatch_backfills backfills
            WHERE backfills.contract_address = contracts.address
            AND backfills.status = 'failed') AS failed_backfills,
        (SELECT backfills.last_error FROM contractwatch_backfills backfills
            WHERE backfills.contract_address = contracts.address
            AND backfills.last_error IS NOT NULL
            ORDER BY backfills.updated_at DESC
            LIMIT 1) AS backfill_error
    FROM contractwatch_contracts contracts
    LEFT JOIN contractwatch_chunks chunks ON chunks.contract_address = contracts.address
    GROUP BY contracts.id
    ORDER BY contracts.id";

impl From<tokio_postgres::Error> for RepoError {
    fn from(value: tokio_postgres::Error) -> Self {
        RepoError::Unknown(value.to_string())
    }
}

#[async_trait::async_trait]
impl HasRawQueryClient for PostgresRepo {
    type RawQueryClient = Client;

    async fn get_raw_query_client(&self) -> Result<Self::RawQueryClient, RepoError> {
        let (client, conn) =
            tokio_postgres::connect(&self.url, NoTls).await.map_err(|_| RepoError::NotConnected)?;

        tokio::spawn(async move {
            if let Err(error) = conn.await {
                tracing::error!(%error, "raw query connection closed");
            }
        });

        Ok(client)
    }
}

#[async_trait::async_trait]
impl ExecutesWithRawQuery for PostgresRepo {
    async fn execute_raw_query(
        client: &Self::RawQueryClient,
        query: &str,
    ) -> Result<(), RepoError> {
        client.execute(query, &[] as &[&(dyn ToSql + Sync)]).await?;

        Ok(())
    }
}

#[async_trait::async_trait]
impl LoadsDataWithRawQuery for PostgresRepo {
    async fn load_data_list_from_raw_query<Data: Send + DeserializeOwned>(
        client: &Self::RawQueryClient,
        query: &str,
    ) -> Result<Vec<Data>, RepoError> {
        let json_aggregate = get_json_aggregate(client, query).await?;

        if json_aggregate.is_object() || json_aggregate.is_array() {
            serde_json::from_value(json_aggregate)
                .map_err(|error| RepoError::Unknown(error.to_string()))
        } else {
            Ok(vec![])
        }
    }
}

async fn get_json_aggregate(
    client: &PostgresRepoRawQueryClient,
    query: &str,
) -> Result<serde_json::Value, RepoError> {
    let rows = client.query(json_aggregate_query(query).as_str(), &[]).await?;

    match rows.first() {
        Some(row) => Ok(row.try_get(0)?),
        None => Ok(serde_json::Value::Null),
    }
}

fn json_aggregate_query(query: &str) -> String {
    format!("WITH result AS ({query}) SELECT COALESCE(json_agg(result), '[]'::json) FROM result",)
}
