pub mod abi_sources;
pub mod applications;
pub mod backfills;
mod chains;
pub mod checkpoints;
mod config;
pub mod contracts;
pub mod decoder;
mod diesel;
pub mod events;
mod hashes;
pub mod ingester;
mod node_task;
pub mod planner;
mod repos;
pub mod scheduler;

#[cfg(test)]
mod factory;

pub use abi_sources::{AbiSource, AbiSourceError, EtherscanAbiSource};
pub use applications::{Application, ApplicationError, NewApplication};
pub use chains::{Chain, ChainId};
pub use checkpoints::{CheckpointError, CheckpointStore};
pub use config::{CheckpointPolicy, Config, ConfigError};
pub use contracts::{ContractAbi, ContractStatus, CreationInfo, TrackedContract};
pub use events::{EventsQuery, IndexedEvent};
pub use ingester::{IngesterError, Provider};
pub use node_task::NodeTask;
pub use planner::BlockRange;
pub use repos::*;
pub use scheduler::{ChunkDispatcher, ChunkJob, TickSummary, TokioDispatcher};

use std::sync::Arc;
use std::time::Duration;

use derive_more::Display;
use tokio::time::interval;
use tracing::{error, info};

#[derive(Debug, Display, Clone, PartialEq)]
pub enum ContractwatchError {
    #[display("config error: {_0}")]
    Config(ConfigError),
    #[display("{_0}")]
    Repo(RepoError),
    #[display("{_0}")]
    Ingester(IngesterError),
    #[display("{_0}")]
    Application(ApplicationError),
}

impl std::error::Error for ContractwatchError {}

impl From<ConfigError> for ContractwatchError {
    fn from(value: ConfigError) -> Self {
        ContractwatchError::Config(value)
    }
}

impl From<RepoError> for ContractwatchError {
    fn from(value: RepoError) -> Self {
        ContractwatchError::Repo(value)
    }
}

impl From<IngesterError> for ContractwatchError {
    fn from(value: IngesterError) -> Self {
        ContractwatchError::Ingester(value)
    }
}

impl From<ApplicationError> for ContractwatchError {
    fn from(value: ApplicationError) -> Self {
        ContractwatchError::Application(value)
    }
}

/// Starts indexing every tracked contract of the configured chain.
///
/// Migrates the repo, then ticks every `ingestion_rate_ms` and runs pending
/// backfills alongside. The returned handle stops all of it.
pub async fn index_contracts<R: Repo>(config: &Config<R>) -> Result<NodeTask, ContractwatchError> {
    config.validate()?;

    let provider = ingester::get_provider(&config.chain.json_rpc_url)?;

    index_contracts_with_provider(config, provider).await
}

/// Same as [`index_contracts`] over a given provider.
pub async fn index_contracts_with_provider<R: Repo, P: Provider + 'static>(
    config: &Config<R>,
    provider: Arc<P>,
) -> Result<NodeTask, ContractwatchError> {
    config.validate()?;
    config.repo.migrate().await?;

    let dispatcher = Arc::new(TokioDispatcher::new(provider.clone(), config));
    let mut node_task = NodeTask::new();

    node_task.add_subtask(tokio::spawn({
        let config = config.clone();
        let provider = provider.clone();
        let dispatcher = dispatcher.clone();

        async move {
            let mut interval = interval(Duration::from_millis(config.ingestion_rate_ms));

            loop {
                interval.tick().await;

                if let Err(error) =
                    scheduler::tick(&config, provider.as_ref(), dispatcher.as_ref()).await
                {
                    error!(%error, "tick aborted");
                }
            }
        }
    }));
    node_task.add_subtask(backfills::start(provider, config));
    node_task.on_stop(move || dispatcher.abort_all());

    info!(chain = %config.chain.id, "indexing contracts");

    Ok(node_task)
}

/// Registers an application against the configured repo and ABI source.
pub async fn register_application<R: Repo>(
    config: &Config<R>,
    new_application: &NewApplication,
) -> Result<Application, ContractwatchError> {
    Ok(applications::register(&config.repo, config.abi_source.as_deref(), new_application).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::{
        test_config, tracked_bayc_contract, transfer_logs, MockProvider, BAYC_CONTRACT_ADDRESS,
    };

    #[tokio::test]
    async fn rejects_invalid_configs() {
        let config = test_config(MemoryRepo::new()).with_chunk_size(0);

        assert!(matches!(
            index_contracts(&config).await,
            Err(ContractwatchError::Config(ConfigError::ZeroChunkSize))
        ));
    }

    #[tokio::test]
    async fn indexes_until_stopped() {
        let repo = MemoryRepo::new();
        tracked_bayc_contract(&repo, 100).await;
        let config = test_config(repo.clone()).with_ingestion_rate_ms(10);
        let provider = Arc::new(MockProvider::with_logs(10_000, transfer_logs(100, 5)));

        let node_task = index_contracts_with_provider(&config, provider).await.unwrap();

        for _ in 0..200 {
            if repo.get_checkpoint(BAYC_CONTRACT_ADDRESS).await == Ok(10_000) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        node_task.stop();

        assert_eq!(repo.event_count(), 5);
        assert_eq!(repo.get_checkpoint(BAYC_CONTRACT_ADDRESS).await, Ok(10_000));
    }
}
