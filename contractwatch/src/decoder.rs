//! Turns raw logs into named events with typed arguments.
//!
//! Matching is by topic0 against the non-anonymous events of the contract's
//! ABI. Indexed arguments come from the remaining topics and the rest from
//! the data payload; indexed dynamic values are kept as their hash.

mod abi_value;

pub use abi_value::AbiValue;

use derive_more::Display;
use ethers::abi::RawLog as AbiRawLog;
use ethers::types::H256;
use serde_json::{Map, Value};

use crate::contracts::ContractAbi;
use crate::events::RawLog;

#[derive(Debug, Display, Clone, PartialEq)]
pub enum DecodeError {
    #[display("no event in the ABI matches topic0 {_0:?}")]
    UnknownEvent(Option<H256>),
    #[display("log does not fit event {event}: {reason}")]
    AbiMismatch { event: String, reason: String },
}

impl std::error::Error for DecodeError {}

#[derive(Clone, Debug, PartialEq)]
pub struct DecodedEvent {
    pub name: String,
    pub topic0: H256,
    /// Arguments in ABI order.
    pub args: Vec<(String, AbiValue)>,
}

impl DecodedEvent {
    pub fn get(&self, name: &str) -> Option<&AbiValue> {
        self.args.iter().find(|(arg_name, _)| arg_name == name).map(|(_, value)| value)
    }

    pub fn args_json(&self) -> Value {
        let args: Map<_, _> =
            self.args.iter().map(|(name, value)| (name.clone(), value.to_json())).collect();

        Value::Object(args)
    }
}

pub fn decode(log: &RawLog, abi: &ContractAbi) -> Result<DecodedEvent, DecodeError> {
    let topic0 = log.topic0().ok_or(DecodeError::UnknownEvent(None))?;
    let event = abi.find_event(topic0).ok_or(DecodeError::UnknownEvent(Some(*topic0)))?;

    let mismatch = |reason: String| DecodeError::AbiMismatch {
        event: event.name.clone(),
        reason,
    };

    let parsed_log = event
        .parse_log(AbiRawLog {
            topics: log.topics.clone(),
            data: log.data.to_vec(),
        })
        .map_err(|error| mismatch(error.to_string()))?;

    let args = event
        .inputs
        .iter()
        .zip(parsed_log.params)
        .enumerate()
        .map(|(position, (input, param))| {
            let value = if input.indexed {
                AbiValue::from_indexed_token(&input.kind, param.value)
            } else {
                AbiValue::from_token(&input.kind, param.value)
            }
            .ok_or_else(|| mismatch(format!("argument {} is not a {}", input.name, input.kind)))?;

            let name = if input.name.is_empty() {
                format!("arg{position}")
            } else {
                input.name.clone()
            };

            Ok((name, value))
        })
        .collect::<Result<Vec<_>, DecodeError>>()?;

    Ok(DecodedEvent {
        name: event.name.clone(),
        topic0: *topic0,
        args,
    })
}
