use contractwatch::contracts::UnsavedTrackedContract;
use contractwatch::{ContractAbi, CreationInfo};
use rand::Rng;
use serde_json::json;

pub fn bayc_abi() -> ContractAbi {
    ContractAbi::from_json(json!([
        {
            "anonymous": false,
            "inputs": [
                { "indexed": true, "internalType": "address", "name": "from", "type": "address" },
                { "indexed": true, "internalType": "address", "name": "to", "type": "address" },
                { "indexed": true, "internalType": "uint256", "name": "tokenId", "type": "uint256" }
            ],
            "name": "Transfer",
            "type": "event"
        },
        {
            "anonymous": false,
            "inputs": [
                { "indexed": true, "internalType": "address", "name": "owner", "type": "address" },
                { "indexed": true, "internalType": "address", "name": "operator", "type": "address" },
                { "indexed": false, "internalType": "bool", "name": "approved", "type": "bool" }
            ],
            "name": "ApprovalForAll",
            "type": "event"
        }
    ]))
    .unwrap()
}

/// Tests share one database, so each one tracks its own contract.
pub fn random_address() -> String {
    let bytes: [u8; 20] = rand::thread_rng().gen();

    format!("0x{}", bytes.iter().map(|byte| format!("{byte:02x}")).collect::<String>())
}

pub const CREATION_TX_HASH: &str =
    "0x22199329b0aa1aa68902a78e3b32ca327c872fab166c7a2838273de6ad383eba";

pub fn unsaved_contract(address: &str, creation_block: u64) -> UnsavedTrackedContract {
    UnsavedTrackedContract::new(
        address,
        &bayc_abi(),
        &CreationInfo::new(creation_block, CREATION_TX_HASH),
    )
}
