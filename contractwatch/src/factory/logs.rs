use std::str::FromStr;

use ethers::abi::{self, Token};
use ethers::types::{Address, Bytes, Log, H160, H256, I256, U256};

use crate::decoder;
use crate::events::{IndexedEvent, RawLog};

use super::{bayc_abi, marketplace_abi, BAYC_CONTRACT_ADDRESS, TRANSFER_EVENT_TOPIC};

const FROM_TOPIC: &str = "0x000000000000000000000000b518b3136e491101f22b77f385fe22269c515188";
const TO_TOPIC: &str = "0x0000000000000000000000007dfd6013cf8d92b751e63d481b51fe0e4c5abf5e";
const TOKEN_ID_TOPIC: &str = "0x000000000000000000000000000000000000000000000000000000000000067d";

pub fn transfer_log(contract_address: &str, block_number: u64, log_index: u64) -> Log {
    Log {
        address: H160::from_str(contract_address).unwrap(),
        topics: vec![
            h256(TRANSFER_EVENT_TOPIC),
            h256(FROM_TOPIC),
            h256(TO_TOPIC),
            h256(TOKEN_ID_TOPIC),
        ],
        data: Bytes::default(),
        block_hash: Some(h256(
            "0x8fd4ca304a2e81854059bc3e42f32064cca8b6b453f6286f95060edc6382c6f8",
        )),
        block_number: Some(block_number.into()),
        transaction_hash: Some(h256(
            "0x83d751998ff98cd609bc9b18bb36bdef8659cde2f74d6d7a1b0fef2c2bf8f839",
        )),
        transaction_index: Some(89.into()),
        log_index: Some(log_index.into()),
        transaction_log_index: None,
        log_type: None,
        removed: Some(false),
    }
}

/// One BAYC transfer per block from `start_block` on.
pub fn transfer_logs(start_block: u64, count: u64) -> Vec<Log> {
    (0..count)
        .map(|i| transfer_log(BAYC_CONTRACT_ADDRESS, start_block + i, i))
        .collect()
}

/// ERC-20 shaped transfer: two indexed topics, amount in data.
pub fn erc20_transfer_log(value: U256, log_index: u64) -> Log {
    Log {
        address: H160::from_str("0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48").unwrap(),
        topics: vec![h256(TRANSFER_EVENT_TOPIC), h256(FROM_TOPIC), h256(TO_TOPIC)],
        data: Bytes::from(abi::encode(&[Token::Uint(value)])),
        ..transfer_log(BAYC_CONTRACT_ADDRESS, 150, log_index)
    }
}

pub struct Listing {
    pub seller: Address,
    pub tag_hash: H256,
    pub delta: I256,
    pub note: String,
    pub payload: Vec<u8>,
    pub items: Vec<(u64, bool)>,
}

/// A `Listed` log of `marketplace_abi`, ABI-encoded from `listing`.
pub fn listing_log(listing: &Listing) -> Log {
    let items = listing
        .items
        .iter()
        .map(|(id, active)| Token::Tuple(vec![Token::Uint(U256::from(*id)), Token::Bool(*active)]))
        .collect();

    Log {
        topics: vec![
            marketplace_abi().event_topics(&["Listed"])[0],
            H256::from(listing.seller),
            listing.tag_hash,
        ],
        data: Bytes::from(abi::encode(&[
            Token::Int(listing.delta.into_raw()),
            Token::String(listing.note.clone()),
            Token::Bytes(listing.payload.clone()),
            Token::Array(items),
        ])),
        ..transfer_log(BAYC_CONTRACT_ADDRESS, 150, 0)
    }
}

pub fn unknown_log(contract_address: &str, block_number: u64) -> Log {
    Log {
        topics: vec![H256::repeat_byte(0xab), h256(FROM_TOPIC)],
        transaction_hash: Some(H256::repeat_byte(0x11)),
        ..transfer_log(contract_address, block_number, 0)
    }
}

/// Decoded BAYC transfers sharing a block, with log indexes `0..count`.
pub fn indexed_transfers(count: u64) -> Vec<IndexedEvent> {
    let abi = bayc_abi();

    (0..count)
        .map(|log_index| {
            let log = RawLog::from_log(transfer_log(BAYC_CONTRACT_ADDRESS, 18_115_958, log_index))
                .unwrap();
            let decoded_event = decoder::decode(&log, &abi).unwrap();

            IndexedEvent::new(BAYC_CONTRACT_ADDRESS, &log, &decoded_event)
        })
        .collect()
}

fn h256(str: &str) -> H256 {
    H256::from_str(str).unwrap()
}
