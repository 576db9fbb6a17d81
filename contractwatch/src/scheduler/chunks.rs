use chrono::{DateTime, Utc};
use derive_more::Display;
use diesel::{Insertable, Queryable};
use serde::{Deserialize, Serialize};

use crate::diesel::schema::contractwatch_chunks;
use crate::planner::BlockRange;

#[derive(Clone, Debug, PartialEq, Eq, Display)]
pub enum ChunkStatus {
    #[display("pending")]
    Pending,
    #[display("completed")]
    Completed,
    #[display("failed")]
    Failed,
}

impl ChunkStatus {
    pub fn parse(status: &str) -> Self {
        match status {
            "completed" => ChunkStatus::Completed,
            "failed" => ChunkStatus::Failed,
            _ => ChunkStatus::Pending,
        }
    }
}

/// Ledger entry for one dispatched block range of a contract.
#[derive(Debug, Clone, PartialEq, Queryable, Insertable, Serialize, Deserialize)]
#[diesel(table_name = contractwatch_chunks)]
pub struct Chunk {
    pub contract_address: String,
    pub from_block: i64,
    pub to_block: i64,
    pub status: String,
    pub attempts: i32,
    pub last_error: Option<String>,
    pub dispatched_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Chunk {
    pub fn pending(contract_address: &str, range: &BlockRange) -> Self {
        Self {
            contract_address: contract_address.to_lowercase(),
            from_block: range.from as i64,
            to_block: range.to as i64,
            status: ChunkStatus::Pending.to_string(),
            attempts: 1,
            last_error: None,
            dispatched_at: Utc::now(),
            completed_at: None,
        }
    }

    pub fn get_range(&self) -> BlockRange {
        BlockRange::new(self.from_block as u64, self.to_block as u64)
    }

    pub fn get_status(&self) -> ChunkStatus {
        ChunkStatus::parse(&self.status)
    }

    pub fn is_lease_expired(&self, now: DateTime<Utc>, lease_ms: u64) -> bool {
        let elapsed_ms = (now - self.dispatched_at).num_milliseconds();

        u64::try_from(elapsed_ms).map_or(false, |elapsed_ms| elapsed_ms > lease_ms)
    }
}
