use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use derive_more::Display;
use diesel::{Insertable, Queryable};
use ethers::abi::{Abi, Event};
use ethers::types::H256;
use serde::{Deserialize, Serialize};

use crate::diesel::schema::contractwatch_contracts;

pub type ContractAddress = String;
pub type ContractEventTopic = H256;

/// Sentinel for a block mark that was never set.
pub const NEVER_QUERIED: i64 = -1;

#[derive(Debug, Display, Clone, PartialEq, Eq)]
pub enum ContractError {
    #[display("invalid contract address: {_0}")]
    InvalidAddress(String),
    #[display("invalid contract ABI: {_0}")]
    InvalidAbi(String),
}

impl std::error::Error for ContractError {}

/// Validates a 20-byte hex address and returns it as lowercase `0x`-hex.
pub fn normalize_address(address: &str) -> Result<ContractAddress, ContractError> {
    let address = address.trim();
    let hex = address
        .strip_prefix("0x")
        .or_else(|| address.strip_prefix("0X"))
        .ok_or_else(|| ContractError::InvalidAddress(address.to_string()))?;

    if hex.len() == 40 && hex.chars().all(|c| c.is_ascii_hexdigit()) {
        Ok(format!("0x{}", hex.to_ascii_lowercase()))
    } else {
        Err(ContractError::InvalidAddress(address.to_string()))
    }
}

/// A parsed JSON ABI together with the JSON it was parsed from.
#[derive(Clone, Debug)]
pub struct ContractAbi {
    abi: Abi,
    json: serde_json::Value,
}

impl ContractAbi {
    /// Accepts the ABI as a JSON array or as a string holding one,
    /// the shape explorer APIs return it in.
    pub fn from_json(json: serde_json::Value) -> Result<Self, ContractError> {
        let json = match json {
            serde_json::Value::String(raw) => serde_json::from_str(&raw)
                .map_err(|error| ContractError::InvalidAbi(error.to_string()))?,
            json => json,
        };

        let abi: Abi = serde_json::from_value(json.clone())
            .map_err(|error| ContractError::InvalidAbi(error.to_string()))?;

        Ok(Self { abi, json })
    }

    pub fn from_json_str(raw: &str) -> Result<Self, ContractError> {
        let json = serde_json::from_str(raw)
            .map_err(|error| ContractError::InvalidAbi(error.to_string()))?;

        Self::from_json(json)
    }

    pub fn as_json(&self) -> &serde_json::Value {
        &self.json
    }

    pub fn event_names(&self) -> Vec<&str> {
        self.abi.events.keys().map(|name| name.as_str()).collect()
    }

    pub fn has_event(&self, name: &str) -> bool {
        self.abi.events.contains_key(name)
    }

    /// Signature hashes of the named events, overloads included.
    /// Anonymous events have no topic0 and are left out.
    pub fn event_topics<S: AsRef<str>>(&self, names: &[S]) -> Vec<ContractEventTopic> {
        let topics: BTreeSet<_> = names
            .iter()
            .filter_map(|name| self.abi.events.get(name.as_ref()))
            .flatten()
            .filter(|event| !event.anonymous)
            .map(|event| event.signature())
            .collect();

        topics.into_iter().collect()
    }

    pub fn find_event(&self, topic0: &ContractEventTopic) -> Option<&Event> {
        self.abi.events().find(|event| !event.anonymous && event.signature() == *topic0)
    }
}

impl PartialEq for ContractAbi {
    fn eq(&self, other: &Self) -> bool {
        self.json == other.json
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Display)]
pub enum IndexingStatus {
    #[display("active")]
    Active,
    #[display("blocked")]
    Blocked,
}

impl IndexingStatus {
    pub fn parse(status: &str) -> Self {
        match status {
            "blocked" => IndexingStatus::Blocked,
            _ => IndexingStatus::Active,
        }
    }
}

/// Where and when a contract was deployed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreationInfo {
    pub block_number: u64,
    pub tx_hash: String,
}

impl CreationInfo {
    pub fn new(block_number: u64, tx_hash: &str) -> Self {
        Self {
            block_number,
            tx_hash: tx_hash.to_lowercase(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Insertable)]
#[diesel(table_name = contractwatch_contracts)]
pub struct UnsavedTrackedContract {
    pub address: String,
    pub abi: serde_json::Value,
    pub creation_block: i64,
    pub creation_tx_hash: String,
    pub last_queried_block: i64,
    pub last_dispatched_block: i64,
    pub indexing_status: String,
}

impl UnsavedTrackedContract {
    pub fn new(address: &str, abi: &ContractAbi, creation_info: &CreationInfo) -> Self {
        Self {
            address: address.to_lowercase(),
            abi: abi.as_json().clone(),
            creation_block: creation_info.block_number as i64,
            creation_tx_hash: creation_info.tx_hash.clone(),
            last_queried_block: NEVER_QUERIED,
            last_dispatched_block: NEVER_QUERIED,
            indexing_status: IndexingStatus::Active.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Queryable, Serialize, Deserialize)]
#[diesel(table_name = contractwatch_contracts)]
pub struct TrackedContract {
    pub id: i32,
    pub address: String,
    pub abi: serde_json::Value,
    pub creation_block: i64,
    pub creation_tx_hash: String,
    /// Checkpoint. `-1` until the first chunk lands.
    pub last_queried_block: i64,
    /// Planning high-water mark.
    pub last_dispatched_block: i64,
    pub indexing_status: String,
    pub indexing_error: Option<String>,
    pub inserted_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TrackedContract {
    pub fn get_abi(&self) -> Result<ContractAbi, ContractError> {
        ContractAbi::from_json(self.abi.clone())
    }

    pub fn get_creation_block(&self) -> u64 {
        self.creation_block as u64
    }

    pub fn get_status(&self) -> IndexingStatus {
        IndexingStatus::parse(&self.indexing_status)
    }

    pub fn is_blocked(&self) -> bool {
        self.get_status() == IndexingStatus::Blocked
    }
}

/// Read model of a contract's indexing progress.
/// A blocked contract carries the diagnostic that blocked it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractStatus {
    pub address: String,
    pub creation_block: i64,
    pub last_queried_block: i64,
    pub last_dispatched_block: i64,
    pub indexing_status: String,
    pub indexing_error: Option<String>,
    pub pending_chunks: i64,
    pub failed_chunks: i64,
    pub pending_backfills: i64,
    pub failed_backfills: i64,
    /// Latest error of a backfill still pending a retry or given up on.
    pub backfill_error: Option<String>,
}

impl ContractStatus {
    pub fn is_blocked(&self) -> bool {
        IndexingStatus::parse(&self.indexing_status) == IndexingStatus::Blocked
    }
}
