use contractwatch::Provider;
use ethers::providers::ProviderError;
use ethers::types::{Filter, Log, U64};

/// Serves a fixed set of logs, restricted to the requested block range.
#[derive(Clone, Debug)]
pub struct ProviderWithLogs {
    pub head: u64,
    pub logs: Vec<Log>,
}

#[async_trait::async_trait]
impl Provider for ProviderWithLogs {
    async fn get_block_number(&self) -> Result<U64, ProviderError> {
        Ok(U64::from(self.head))
    }

    async fn get_logs(&self, filter: &Filter) -> Result<Vec<Log>, ProviderError> {
        let from = filter.get_from_block().map(|block| block.as_u64()).unwrap_or_default();
        let to = filter.get_to_block().map(|block| block.as_u64()).unwrap_or(self.head);

        Ok(self
            .logs
            .iter()
            .filter(|log| {
                log.block_number.is_some_and(|block| (from..=to).contains(&block.as_u64()))
            })
            .cloned()
            .collect())
    }
}
