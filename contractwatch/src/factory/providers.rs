use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use ethers::providers::ProviderError;
use ethers::types::{Filter, Log, ValueOrArray, U64};

use crate::ingester::Provider;
use crate::planner::BlockRange;

#[derive(Debug, Default)]
struct MockProviderState {
    head: u64,
    logs: Vec<Log>,
    queued_failures: VecDeque<String>,
    max_range: Option<u64>,
    failing_range: Option<BlockRange>,
    head_failure: Option<String>,
    filters: Vec<Filter>,
}

/// In-memory chain: answers `eth_getLogs` from a fixed set of logs and
/// records every filter it was asked for.
#[derive(Clone, Debug, Default)]
pub struct MockProvider {
    state: Arc<Mutex<MockProviderState>>,
}

impl MockProvider {
    pub fn with_logs(head: u64, logs: Vec<Log>) -> Self {
        let provider = Self::default();
        {
            let mut state = provider.state.lock().unwrap();
            state.head = head;
            state.logs = logs;
        }

        provider
    }

    /// Fails the next `get_logs` calls, one message each.
    pub fn failing_with(self, messages: Vec<&str>) -> Self {
        self.state
            .lock()
            .unwrap()
            .queued_failures
            .extend(messages.into_iter().map(|message| message.to_string()));

        self
    }

    /// Refuses queries spanning more than `max_range` blocks.
    pub fn with_max_range(self, max_range: u64) -> Self {
        self.state.lock().unwrap().max_range = Some(max_range);

        self
    }

    /// Fails every query touching `range` until `recover` is called.
    pub fn failing_in_range(self, range: BlockRange) -> Self {
        self.state.lock().unwrap().failing_range = Some(range);

        self
    }

    pub fn failing_head(self, message: &str) -> Self {
        self.state.lock().unwrap().head_failure = Some(message.to_string());

        self
    }

    pub fn recover(&self) {
        let mut state = self.state.lock().unwrap();
        state.queued_failures.clear();
        state.failing_range = None;
        state.head_failure = None;
    }

    pub fn set_head(&self, head: u64) {
        self.state.lock().unwrap().head = head;
    }

    pub fn filters(&self) -> Vec<Filter> {
        self.state.lock().unwrap().filters.clone()
    }
}

#[async_trait::async_trait]
impl Provider for MockProvider {
    async fn get_block_number(&self) -> Result<U64, ProviderError> {
        let state = self.state.lock().unwrap();

        match &state.head_failure {
            Some(message) => Err(ProviderError::CustomError(message.clone())),
            None => Ok(U64::from(state.head)),
        }
    }

    async fn get_logs(&self, filter: &Filter) -> Result<Vec<Log>, ProviderError> {
        let mut state = self.state.lock().unwrap();
        state.filters.push(filter.clone());

        if let Some(message) = state.queued_failures.pop_front() {
            return Err(ProviderError::CustomError(message));
        }

        let from = filter.get_from_block().map(|block| block.as_u64()).unwrap_or_default();
        let to = filter.get_to_block().map(|block| block.as_u64()).unwrap_or(state.head);

        if let Some(range) = state.failing_range {
            if from <= range.to && range.from <= to {
                return Err(ProviderError::CustomError("503 Service Unavailable".to_string()));
            }
        }

        if let Some(max_range) = state.max_range {
            if to - from + 1 > max_range {
                return Err(ProviderError::CustomError(
                    "query returned more than 10000 results".to_string(),
                ));
            }
        }

        Ok(state
            .logs
            .iter()
            .filter(|log| {
                let block_number = log.block_number.map(|block| block.as_u64()).unwrap_or_default();

                (from..=to).contains(&block_number) && matches_filter(filter, log)
            })
            .cloned()
            .collect())
    }
}

fn matches_filter(filter: &Filter, log: &Log) -> bool {
    let address_matches = match &filter.address {
        Some(ValueOrArray::Value(address)) => *address == log.address,
        Some(ValueOrArray::Array(addresses)) => addresses.contains(&log.address),
        None => true,
    };

    let topic0 = log.topics.first().copied();
    let topic0_matches = match &filter.topics[0] {
        Some(ValueOrArray::Value(Some(topic))) => Some(*topic) == topic0,
        Some(ValueOrArray::Array(topics)) => topics.iter().any(|topic| *topic == topic0),
        _ => true,
    };

    address_matches && topic0_matches
}
