//! One-time indexing of the blocks an application joined too late for.
//!
//! A backfill indexes its range with the application's own topics, apart from
//! the recurring scheduler, and never touches the contract's checkpoint.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use derive_more::Display;
use diesel::{Insertable, Queryable};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{error, info, warn};

use crate::applications::Application;
use crate::config::Config;
use crate::diesel::schema::contractwatch_backfills;
use crate::ingester::{IngesterError, Provider};
use crate::planner::{self, BlockRange};
use crate::scheduler::{self, RetryPolicy};
use crate::Repo;

#[derive(Clone, Debug, PartialEq, Eq, Display)]
pub enum BackfillStatus {
    #[display("pending")]
    Pending,
    #[display("completed")]
    Completed,
    #[display("failed")]
    Failed,
}

impl BackfillStatus {
    pub fn parse(status: &str) -> Self {
        match status {
            "completed" => BackfillStatus::Completed,
            "failed" => BackfillStatus::Failed,
            _ => BackfillStatus::Pending,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Queryable, Insertable, Serialize, Deserialize)]
#[diesel(table_name = contractwatch_backfills)]
pub struct Backfill {
    pub application_id: String,
    pub contract_address: String,
    pub from_block: i64,
    pub to_block: i64,
    pub event_names: serde_json::Value,
    pub status: String,
    pub last_error: Option<String>,
    pub inserted_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Backfill {
    pub fn new(application: &Application, range: BlockRange) -> Self {
        let now = Utc::now();

        Self {
            application_id: application.id.clone(),
            contract_address: application.contract_address.clone(),
            from_block: range.from as i64,
            to_block: range.to as i64,
            event_names: application.event_names.clone(),
            status: BackfillStatus::Pending.to_string(),
            last_error: None,
            inserted_at: now,
            updated_at: now,
        }
    }

    pub fn get_range(&self) -> BlockRange {
        BlockRange::new(self.from_block as u64, self.to_block as u64)
    }

    pub fn get_event_names(&self) -> Vec<String> {
        serde_json::from_value(self.event_names.clone()).unwrap_or_default()
    }

    pub fn get_status(&self) -> BackfillStatus {
        BackfillStatus::parse(&self.status)
    }
}

/// Indexes the whole backfill chunk by chunk and records how it went.
/// Returns the number of events decoded.
///
/// A backfill that hits a terminal error is marked failed. Any other error
/// leaves it pending with the error recorded, so a later run retries it.
pub async fn run<P: Provider + ?Sized, R: Repo>(
    provider: &P,
    repo: &R,
    backfill: &Backfill,
    chunk_size: u64,
    retry_policy: &RetryPolicy,
) -> Result<u64, IngesterError> {
    if chunk_size == 0 {
        return Err(IngesterError::GenericError("chunk size must be positive".to_string()));
    }

    let result = index_backfill(provider, repo, backfill, chunk_size, retry_policy).await;

    match &result {
        Ok(indexed) => {
            info!(application = %backfill.application_id, indexed, "backfill completed");

            repo.update_backfill_status(&backfill.application_id, BackfillStatus::Completed, None)
                .await?;
        }
        Err(error) if error.is_terminal() => {
            error!(application = %backfill.application_id, %error, "backfill failed");

            repo.update_backfill_status(
                &backfill.application_id,
                BackfillStatus::Failed,
                Some(&error.to_string()),
            )
            .await?;
        }
        Err(error) => {
            warn!(application = %backfill.application_id, %error, "backfill will be retried");

            repo.update_backfill_status(
                &backfill.application_id,
                BackfillStatus::Pending,
                Some(&error.to_string()),
            )
            .await?;
        }
    }

    result
}

async fn index_backfill<P: Provider + ?Sized, R: Repo>(
    provider: &P,
    repo: &R,
    backfill: &Backfill,
    chunk_size: u64,
    retry_policy: &RetryPolicy,
) -> Result<u64, IngesterError> {
    let contract = repo.get_contract(&backfill.contract_address).await?.ok_or_else(|| {
        IngesterError::GenericError(format!("contract {} is not tracked", backfill.contract_address))
    })?;
    let abi = contract.get_abi().map_err(|error| IngesterError::InvalidAbi(error.to_string()))?;
    let event_topics = abi.event_topics(&backfill.get_event_names());

    let range = backfill.get_range();
    let mut indexed = 0;

    for chunk in planner::plan(range.from, range.to, chunk_size) {
        indexed += scheduler::index_with_retries(
            provider,
            repo,
            &contract,
            &event_topics,
            chunk,
            retry_policy,
        )
        .await?;
    }

    Ok(indexed)
}

/// Runs every pending backfill, one after the other, including those whose
/// last run hit a transient error. Returns how many of them completed.
pub async fn run_pending<P: Provider + ?Sized, R: Repo>(
    provider: &P,
    config: &Config<R>,
) -> Result<usize, IngesterError> {
    let retry_policy = RetryPolicy::from_config(config);
    let mut completed = 0;

    for backfill in config.repo.get_pending_backfills().await? {
        if run(provider, &config.repo, &backfill, config.chunk_size, &retry_policy).await.is_ok() {
            completed += 1;
        }
    }

    Ok(completed)
}

/// Resumes pending backfills right away, then picks up new ones every
/// ingestion interval.
pub fn start<P: Provider + 'static, R: Repo>(provider: Arc<P>, config: &Config<R>) -> JoinHandle<()> {
    let config = config.clone();

    tokio::spawn(async move {
        let mut interval = interval(Duration::from_millis(config.ingestion_rate_ms));

        loop {
            interval.tick().await;

            if let Err(error) = run_pending(provider.as_ref(), &config).await {
                error!(%error, "could not run pending backfills");
            }
        }
    })
}
