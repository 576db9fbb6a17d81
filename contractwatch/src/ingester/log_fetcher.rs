use ethers::providers::RpcError;
use ethers::types::{Address, Filter, H256};

use crate::contracts;
use crate::events::RawLog;
use crate::planner::BlockRange;

use super::provider::{Provider, ProviderError};
use super::IngesterError;

/// JSON-RPC "limit exceeded" code. Providers use it for oversized queries and
/// for throttling alike, so the message decides.
const LIMIT_EXCEEDED_CODE: i64 = -32005;

const RANGE_LIMIT_MESSAGES: &[&str] = &[
    "block range",
    "range too large",
    "range is too large",
    "too many results",
    "query returned more than",
    "response size",
    "exceed maximum block range",
];

const RATE_LIMIT_MESSAGES: &[&str] =
    &["rate limit", "too many requests", "requests per second", "compute units"];

/// Fetches the logs of one contract in one block range.
///
/// Only logs whose topic0 is one of `event_topics` are requested; an empty
/// set requests every log of the contract. Pending logs are dropped.
/// Nothing is retried here.
pub async fn fetch<P: Provider + ?Sized>(
    provider: &P,
    contract_address: &str,
    event_topics: &[H256],
    range: BlockRange,
) -> Result<Vec<RawLog>, IngesterError> {
    let address = contracts::normalize_address(contract_address)
        .ok()
        .and_then(|address| address.parse::<Address>().ok())
        .ok_or_else(|| IngesterError::InvalidAddress(contract_address.to_string()))?;

    let mut filter = Filter::new().address(address).from_block(range.from).to_block(range.to);
    if !event_topics.is_empty() {
        filter = filter.topic0(event_topics.to_vec());
    }

    let logs = provider
        .get_logs(&filter)
        .await
        .map_err(|error| classify_provider_error(&error, range))?;

    Ok(logs.into_iter().filter_map(RawLog::from_log).collect())
}

/// Sorts a provider failure into a range the provider refuses or a transient
/// outage. Throttling is always transient, even under the limit-exceeded code.
pub fn classify_provider_error(error: &ProviderError, range: BlockRange) -> IngesterError {
    let message = match error {
        ProviderError::JsonRpcClientError(rpc_error) => match rpc_error.as_error_response() {
            Some(response) if response.code == LIMIT_EXCEEDED_CODE => response.message.clone(),
            Some(response) => format!("{} (code {})", response.message, response.code),
            None => error.to_string(),
        },
        _ => error.to_string(),
    };

    if !mentions_rate_limit(&message) && mentions_range_limit(&message) {
        IngesterError::RangeTooLarge { range, reason: message }
    } else {
        IngesterError::UpstreamUnavailable(message)
    }
}

fn mentions_rate_limit(message: &str) -> bool {
    let message = message.to_lowercase();

    RATE_LIMIT_MESSAGES.iter().any(|pattern| message.contains(pattern))
}

fn mentions_range_limit(message: &str) -> bool {
    let message = message.to_lowercase();

    RANGE_LIMIT_MESSAGES.iter().any(|pattern| message.contains(pattern))
        || (message.contains("limited to") && message.contains("range"))
}
