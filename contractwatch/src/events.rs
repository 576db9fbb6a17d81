mod event;
mod raw_log;

pub use event::{event_id, IndexedEvent};
pub use raw_log::RawLog;

pub const DEFAULT_EVENTS_LIMIT: i64 = 100;

/// Read-side filter over indexed events.
/// Results come back ordered by `(block_number, log_index)`.
#[derive(Clone, Debug, PartialEq)]
pub struct EventsQuery {
    pub contract_address: String,
    pub name: Option<String>,
    pub from_block: Option<u64>,
    pub to_block: Option<u64>,
    pub limit: i64,
    pub offset: i64,
}

impl EventsQuery {
    pub fn new(contract_address: &str) -> Self {
        Self {
            contract_address: contract_address.to_lowercase(),
            name: None,
            from_block: None,
            to_block: None,
            limit: DEFAULT_EVENTS_LIMIT,
            offset: 0,
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());

        self
    }

    pub fn with_block_range(mut self, from_block: u64, to_block: u64) -> Self {
        self.from_block = Some(from_block);
        self.to_block = Some(to_block);

        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit;

        self
    }

    pub fn with_offset(mut self, offset: i64) -> Self {
        self.offset = offset;

        self
    }

    pub fn matches(&self, event: &IndexedEvent) -> bool {
        event.contract_address == self.contract_address
            && self.name.as_ref().map_or(true, |name| *name == event.name)
            && self.from_block.map_or(true, |from| event.get_block_number() >= from)
            && self.to_block.map_or(true, |to| event.get_block_number() <= to)
    }
}
