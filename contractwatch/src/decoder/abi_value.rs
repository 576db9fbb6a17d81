use ethers::abi::{ParamType, Token};
use ethers::types::{Address, H256, I256, U256};
use serde_json::{json, Value};

use crate::hashes::Hashes;

/// Widest integers that stay JSON numbers. Anything wider is rendered
/// as a decimal string so no consumer rounds it.
const MAX_JSON_NUMBER_BITS: usize = 32;

/// A decoded ABI value, tagged with its type category.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AbiValue {
    Uint { bits: usize, value: U256 },
    Int { bits: usize, value: I256 },
    Address(Address),
    Bool(bool),
    Bytes(Vec<u8>),
    FixedBytes(Vec<u8>),
    String(String),
    Array(Vec<AbiValue>),
    FixedArray(Vec<AbiValue>),
    Tuple(Vec<AbiValue>),
    /// Keccak hash standing in for an indexed dynamic value.
    Hash(H256),
}

impl AbiValue {
    /// Pairs a decoded token with the declared type.
    /// `None` when the token does not have the declared shape.
    pub fn from_token(kind: &ParamType, token: Token) -> Option<AbiValue> {
        let value = match (kind, token) {
            (ParamType::Uint(bits), Token::Uint(value)) => AbiValue::Uint { bits: *bits, value },
            (ParamType::Int(bits), Token::Int(value)) => AbiValue::Int {
                bits: *bits,
                value: I256::from_raw(value),
            },
            (ParamType::Address, Token::Address(address)) => AbiValue::Address(address),
            (ParamType::Bool, Token::Bool(value)) => AbiValue::Bool(value),
            (ParamType::Bytes, Token::Bytes(bytes)) => AbiValue::Bytes(bytes),
            (ParamType::FixedBytes(_), Token::FixedBytes(bytes)) => AbiValue::FixedBytes(bytes),
            (ParamType::String, Token::String(value)) => AbiValue::String(value),
            (ParamType::Array(inner), Token::Array(tokens)) => {
                AbiValue::Array(Self::from_tokens(inner, tokens)?)
            }
            (ParamType::FixedArray(inner, _), Token::FixedArray(tokens)) => {
                AbiValue::FixedArray(Self::from_tokens(inner, tokens)?)
            }
            (ParamType::Tuple(kinds), Token::Tuple(tokens)) if kinds.len() == tokens.len() => {
                let values = kinds
                    .iter()
                    .zip(tokens)
                    .map(|(kind, token)| Self::from_token(kind, token))
                    .collect::<Option<Vec<_>>>()?;

                AbiValue::Tuple(values)
            }
            _ => return None,
        };

        Some(value)
    }

    /// Indexed params of dynamic types only carry their hash in the topic.
    pub fn from_indexed_token(kind: &ParamType, token: Token) -> Option<AbiValue> {
        if is_dynamic(kind) {
            match token {
                Token::FixedBytes(bytes) if bytes.len() == 32 => {
                    Some(AbiValue::Hash(H256::from_slice(&bytes)))
                }
                _ => None,
            }
        } else {
            Self::from_token(kind, token)
        }
    }

    fn from_tokens(kind: &ParamType, tokens: Vec<Token>) -> Option<Vec<AbiValue>> {
        tokens.into_iter().map(|token| Self::from_token(kind, token)).collect()
    }

    pub fn to_json(&self) -> Value {
        match self {
            AbiValue::Uint { bits, value } => {
                if *bits <= MAX_JSON_NUMBER_BITS && *value <= U256::from(u32::MAX) {
                    json!(value.as_u64())
                } else {
                    Value::String(value.to_string())
                }
            }
            AbiValue::Int { bits, value } => {
                let decimal = value.to_string();

                match decimal.parse::<i64>() {
                    Ok(number) if *bits <= MAX_JSON_NUMBER_BITS => json!(number),
                    _ => Value::String(decimal),
                }
            }
            AbiValue::Address(address) => Value::String(Hashes::h160_to_string(address)),
            AbiValue::Bool(value) => Value::Bool(*value),
            AbiValue::Bytes(bytes) | AbiValue::FixedBytes(bytes) => {
                Value::String(Hashes::bytes_to_string(bytes))
            }
            AbiValue::String(value) => Value::String(value.clone()),
            AbiValue::Array(values) | AbiValue::FixedArray(values) | AbiValue::Tuple(values) => {
                Value::Array(values.iter().map(AbiValue::to_json).collect())
            }
            AbiValue::Hash(hash) => Value::String(Hashes::h256_to_string(hash)),
        }
    }

    pub fn as_uint(&self) -> Option<U256> {
        match self {
            AbiValue::Uint { value, .. } => Some(*value),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<I256> {
        match self {
            AbiValue::Int { value, .. } => Some(*value),
            _ => None,
        }
    }

    pub fn as_address(&self) -> Option<Address> {
        match self {
            AbiValue::Address(address) => Some(*address),
            _ => None,
        }
    }
}

fn is_dynamic(kind: &ParamType) -> bool {
    matches!(
        kind,
        ParamType::String
            | ParamType::Bytes
            | ParamType::Array(_)
            | ParamType::FixedArray(_, _)
            | ParamType::Tuple(_)
    )
}
