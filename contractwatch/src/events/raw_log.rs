use ethers::types::{Address, Bytes, Log, H256};

/// A mined log with every coordinate the indexer keys on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawLog {
    pub address: Address,
    pub topics: Vec<H256>,
    pub data: Bytes,
    pub block_number: u64,
    pub block_hash: H256,
    pub transaction_hash: H256,
    pub transaction_index: u64,
    pub log_index: u64,
}

impl RawLog {
    /// `None` for pending logs, which have no block or transaction yet.
    pub fn from_log(log: Log) -> Option<RawLog> {
        Some(RawLog {
            block_number: log.block_number?.as_u64(),
            block_hash: log.block_hash?,
            transaction_hash: log.transaction_hash?,
            transaction_index: log.transaction_index?.as_u64(),
            log_index: log.log_index?.as_u64(),
            address: log.address,
            topics: log.topics,
            data: log.data,
        })
    }

    pub fn topic0(&self) -> Option<&H256> {
        self.topics.first()
    }
}
