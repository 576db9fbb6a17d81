use std::sync::Arc;

use ethers::prelude::Middleware;
use ethers::providers::{Http, Provider as EthersProvider, ProviderError as EthersProviderError};
use ethers::types::{Filter, Log, U64};

use super::IngesterError;

pub type ProviderError = EthersProviderError;

/// The slice of the chain's JSON-RPC surface the ingester needs.
#[async_trait::async_trait]
pub trait Provider: Sync + Send {
    async fn get_block_number(&self) -> Result<U64, ProviderError>;
    async fn get_logs(&self, filter: &Filter) -> Result<Vec<Log>, ProviderError>;
}

#[async_trait::async_trait]
impl Provider for EthersProvider<Http> {
    async fn get_block_number(&self) -> Result<U64, ProviderError> {
        Middleware::get_block_number(self).await
    }

    async fn get_logs(&self, filter: &Filter) -> Result<Vec<Log>, ProviderError> {
        Middleware::get_logs(self, filter).await
    }
}

pub fn get(json_rpc_url: &str) -> Result<Arc<EthersProvider<Http>>, IngesterError> {
    EthersProvider::<Http>::try_from(json_rpc_url)
        .map(Arc::new)
        .map_err(|error| IngesterError::GenericError(format!("invalid JSON-RPC url: {error}")))
}

/// Current head. Not retried here: callers decide what a failure means.
pub async fn fetch_current_block_number<P: Provider + ?Sized>(
    provider: &P,
) -> Result<u64, IngesterError> {
    provider
        .get_block_number()
        .await
        .map(|block_number| block_number.as_u64())
        .map_err(|error| IngesterError::UpstreamUnavailable(error.to_string()))
}
