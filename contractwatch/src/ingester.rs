mod chunk_indexer;
mod error;
pub mod log_fetcher;
mod provider;

pub use chunk_indexer::index_chunk;
pub use error::IngesterError;
pub use provider::{fetch_current_block_number, get as get_provider, Provider, ProviderError};
