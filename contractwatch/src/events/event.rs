use chrono::{DateTime, Utc};
use diesel::{Insertable, Queryable};
use ethers::types::H256;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::decoder::DecodedEvent;
use crate::diesel::schema::contractwatch_events;
use crate::hashes::Hashes;

use super::RawLog;

/// Stable identity of a real-world log.
/// Re-indexing the same log always yields the same id.
pub fn event_id(transaction_hash: &H256, log_index: u64) -> Uuid {
    let key = format!("{}:{}", Hashes::h256_to_string(transaction_hash), log_index);

    Uuid::new_v5(&Uuid::NAMESPACE_OID, key.as_bytes())
}

#[derive(Debug, Clone, PartialEq, Queryable, Insertable, Serialize, Deserialize)]
#[diesel(table_name = contractwatch_events)]
pub struct IndexedEvent {
    pub id: Uuid,
    pub contract_address: String,
    pub name: String,
    pub block_number: i64,
    pub block_hash: String,
    pub transaction_hash: String,
    pub transaction_index: i64,
    pub log_index: i64,
    pub topics: serde_json::Value,
    pub data: String,
    pub args: serde_json::Value,
    pub inserted_at: DateTime<Utc>,
}

impl IndexedEvent {
    pub fn new(contract_address: &str, log: &RawLog, decoded_event: &DecodedEvent) -> Self {
        let topics: Vec<_> = log.topics.iter().map(Hashes::h256_to_string).collect();

        Self {
            id: event_id(&log.transaction_hash, log.log_index),
            contract_address: contract_address.to_lowercase(),
            name: decoded_event.name.clone(),
            block_number: log.block_number as i64,
            block_hash: Hashes::h256_to_string(&log.block_hash),
            transaction_hash: Hashes::h256_to_string(&log.transaction_hash),
            transaction_index: log.transaction_index as i64,
            log_index: log.log_index as i64,
            topics: serde_json::Value::from(topics),
            data: Hashes::bytes_to_string(&log.data),
            args: decoded_event.args_json(),
            inserted_at: Utc::now(),
        }
    }

    pub fn get_block_number(&self) -> u64 {
        self.block_number as u64
    }

    pub fn get_log_index(&self) -> u64 {
        self.log_index as u64
    }

    pub fn get_arg(&self, name: &str) -> Option<&serde_json::Value> {
        self.args.get(name)
    }
}
