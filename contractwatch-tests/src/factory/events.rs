use std::str::FromStr;

use contractwatch::decoder;
use contractwatch::events::RawLog;
use contractwatch::IndexedEvent;
use ethers::types::{Bytes, Log, H160, H256};
use rand::Rng;

use super::bayc_abi;

pub fn transfer_log(contract_address: &str, block_number: u64, log_index: u64) -> Log {
    transfer_log_in(contract_address, block_number, log_index, H256::zero())
}

fn transfer_log_in(
    contract_address: &str,
    block_number: u64,
    log_index: u64,
    transaction_hash: H256,
) -> Log {
    Log {
        address: H160::from_str(contract_address).unwrap(),
        topics: vec![
            h256("0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef"),
            h256("0x000000000000000000000000b518b3136e491101f22b77f385fe22269c515188"),
            h256("0x0000000000000000000000007dfd6013cf8d92b751e63d481b51fe0e4c5abf5e"),
            h256("0x000000000000000000000000000000000000000000000000000000000000067d"),
        ],
        data: Bytes::default(),
        block_hash: Some(h256(
            "0x8fd4ca304a2e81854059bc3e42f32064cca8b6b453f6286f95060edc6382c6f8",
        )),
        block_number: Some(block_number.into()),
        transaction_hash: Some(transaction_hash),
        transaction_index: Some(89.into()),
        log_index: Some(log_index.into()),
        transaction_log_index: None,
        log_type: None,
        removed: Some(false),
    }
}

/// One transfer per block from `start_block` on, all in a fresh transaction.
pub fn transfer_logs(contract_address: &str, start_block: u64, count: u64) -> Vec<Log> {
    let transaction_hash = H256::from(rand::thread_rng().gen::<[u8; 32]>());

    (0..count)
        .map(|i| transfer_log_in(contract_address, start_block + i, i, transaction_hash))
        .collect()
}

pub fn indexed_transfers(contract_address: &str, count: u64) -> Vec<IndexedEvent> {
    let abi = bayc_abi();

    transfer_logs(contract_address, 18_115_958, count)
        .into_iter()
        .map(|log| {
            let log = RawLog::from_log(log).unwrap();
            let decoded_event = decoder::decode(&log, &abi).unwrap();

            IndexedEvent::new(contract_address, &log, &decoded_event)
        })
        .collect()
}

fn h256(str: &str) -> H256 {
    H256::from_str(str).unwrap()
}
