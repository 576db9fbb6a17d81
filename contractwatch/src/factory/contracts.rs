use serde_json::json;

use crate::applications::Application;
use crate::contracts::{ContractAbi, CreationInfo, TrackedContract, UnsavedTrackedContract};
use crate::{Chain, ChainId, Config, MemoryRepo, Repo};

pub const BAYC_CONTRACT_ADDRESS: &str = "0xBC4CA0EdA7647A8aB7C2061c2E118A18a936f13D";
pub const BAYC_CREATION_TX_HASH: &str =
    "0x22199329b0aa1aa68902a78e3b32ca327c872fab166c7a2838273de6ad383eba";

pub const TRANSFER_EVENT_TOPIC: &str =
    "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef";

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
        },
        {
            "inputs": [{ "internalType": "address", "name": "owner", "type": "address" }],
            "name": "balanceOf",
            "outputs": [{ "internalType": "uint256", "name": "", "type": "uint256" }],
            "stateMutability": "view",
            "type": "function"
        }
    ]))
    .unwrap()
}

pub fn erc20_abi() -> ContractAbi {
    ContractAbi::from_json(json!([
        {
            "anonymous": false,
            "inputs": [
                { "indexed": true, "internalType": "address", "name": "from", "type": "address" },
                { "indexed": true, "internalType": "address", "name": "to", "type": "address" },
                { "indexed": false, "internalType": "uint256", "name": "value", "type": "uint256" }
            ],
            "name": "Transfer",
            "type": "event"
        }
    ]))
    .unwrap()
}

/// One event touching every ABI type category: an indexed dynamic value, a
/// signed integer, dynamic data and an array of tuples.
pub fn marketplace_abi() -> ContractAbi {
    ContractAbi::from_json(json!([
        {
            "anonymous": false,
            "inputs": [
                { "indexed": true, "name": "seller", "type": "address" },
                { "indexed": true, "name": "tag", "type": "string" },
                { "indexed": false, "name": "delta", "type": "int256" },
                { "indexed": false, "name": "note", "type": "string" },
                { "indexed": false, "name": "payload", "type": "bytes" },
                {
                    "indexed": false,
                    "name": "items",
                    "type": "tuple[]",
                    "components": [
                        { "name": "id", "type": "uint64" },
                        { "name": "active", "type": "bool" }
                    ]
                }
            ],
            "name": "Listed",
            "type": "event"
        }
    ]))
    .unwrap()
}

pub fn bayc_contract(creation_block: u64) -> UnsavedTrackedContract {
    UnsavedTrackedContract::new(
        BAYC_CONTRACT_ADDRESS,
        &bayc_abi(),
        &CreationInfo::new(creation_block, BAYC_CREATION_TX_HASH),
    )
}

pub async fn tracked_bayc_contract(repo: &MemoryRepo, creation_block: u64) -> TrackedContract {
    repo.create_contract(&bayc_contract(creation_block)).await.unwrap()
}

pub fn bayc_application(account_id: &str, event_names: &[&str]) -> Application {
    let event_names: Vec<_> = event_names.iter().map(|name| name.to_string()).collect();

    Application::new(account_id, BAYC_CONTRACT_ADDRESS, "Apes", 0, &event_names)
}

pub fn test_config(repo: MemoryRepo) -> Config<MemoryRepo> {
    Config::new(repo, Chain::new(ChainId::Mainnet, "http://localhost:8545"))
        .with_chunk_size(3_000)
        .with_max_chunk_attempts(3)
        .with_retry_backoff_ms(1)
}
