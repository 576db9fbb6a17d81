//! Where ABIs and deployment info come from when a registration does not
//! supply them.

use std::time::Duration;

use derive_more::Display;
use reqwest::Client;
use serde::Deserialize;

use crate::contracts::{ContractAbi, CreationInfo};
use crate::Chain;

#[derive(Debug, Display, Clone, PartialEq)]
pub enum AbiSourceError {
    #[display("not found: {_0}")]
    NotFound(String),
    #[display("ABI source unavailable: {_0}")]
    Unavailable(String),
    #[display("unexpected ABI source response: {_0}")]
    InvalidResponse(String),
    #[display("no ABI source configured")]
    NotConfigured,
}

impl std::error::Error for AbiSourceError {}

impl From<reqwest::Error> for AbiSourceError {
    fn from(value: reqwest::Error) -> Self {
        AbiSourceError::Unavailable(value.to_string())
    }
}

#[async_trait::async_trait]
pub trait AbiSource: Send + Sync {
    async fn fetch_abi(&self, address: &str) -> Result<ContractAbi, AbiSourceError>;
    async fn fetch_creation_info(&self, address: &str) -> Result<CreationInfo, AbiSourceError>;
}

#[derive(Debug, Deserialize)]
struct ExplorerResponse<T> {
    status: String,
    message: String,
    result: T,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContractCreation {
    tx_hash: String,
}

#[derive(Debug, Deserialize)]
struct ProxyResponse {
    result: Option<ProxyTransaction>,
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProxyTransaction {
    block_number: Option<String>,
}

/// Etherscan-compatible explorer API.
#[derive(Clone, Debug)]
pub struct EtherscanAbiSource {
    client: Client,
    api_url: String,
    api_key: Option<String>,
}

impl EtherscanAbiSource {
    pub fn new(api_url: &str) -> Result<Self, AbiSourceError> {
        let client = Client::builder().timeout(Duration::from_secs(15)).build()?;

        Ok(Self {
            client,
            api_url: api_url.to_string(),
            api_key: None,
        })
    }

    /// Uses the explorer known for the chain.
    pub fn for_chain(chain: &Chain) -> Result<Self, AbiSourceError> {
        let api_url = chain.explorer_api_url().ok_or_else(|| {
            AbiSourceError::NotFound(format!("no known explorer for chain {}", chain.id))
        })?;

        Self::new(api_url)
    }

    pub fn with_api_key(mut self, api_key: &str) -> Self {
        self.api_key = Some(api_key.to_string());

        self
    }

    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        params: &[(&str, &str)],
    ) -> Result<T, AbiSourceError> {
        let mut request = self.client.get(&self.api_url).query(params);
        if let Some(api_key) = self.api_key.as_deref() {
            request = request.query(&[("apikey", api_key)]);
        }

        let response = request.send().await?.error_for_status()?;

        Ok(response.json().await?)
    }
}

#[async_trait::async_trait]
impl AbiSource for EtherscanAbiSource {
    async fn fetch_abi(&self, address: &str) -> Result<ContractAbi, AbiSourceError> {
        let response: ExplorerResponse<String> = self
            .get(&[("module", "contract"), ("action", "getabi"), ("address", address)])
            .await?;

        parse_abi_response(address, response)
    }

    async fn fetch_creation_info(&self, address: &str) -> Result<CreationInfo, AbiSourceError> {
        let response: ExplorerResponse<serde_json::Value> = self
            .get(&[
                ("module", "contract"),
                ("action", "getcontractcreation"),
                ("contractaddresses", address),
            ])
            .await?;
        let tx_hash = parse_creation_response(address, response)?;

        let response: ProxyResponse = self
            .get(&[
                ("module", "proxy"),
                ("action", "eth_getTransactionByHash"),
                ("txhash", tx_hash.as_str()),
            ])
            .await?;
        let block_number = parse_transaction_block(&tx_hash, response)?;

        Ok(CreationInfo::new(block_number, &tx_hash))
    }
}

fn parse_abi_response(
    address: &str,
    response: ExplorerResponse<String>,
) -> Result<ContractAbi, AbiSourceError> {
    if response.status != "1" {
        return Err(AbiSourceError::NotFound(format!(
            "ABI of {address}: {} ({})",
            response.message, response.result
        )));
    }

    ContractAbi::from_json_str(&response.result)
        .map_err(|error| AbiSourceError::InvalidResponse(error.to_string()))
}

fn parse_creation_response(
    address: &str,
    response: ExplorerResponse<serde_json::Value>,
) -> Result<String, AbiSourceError> {
    if response.status != "1" {
        return Err(AbiSourceError::NotFound(format!(
            "creation of {address}: {}",
            response.message
        )));
    }

    let creations: Vec<ContractCreation> = serde_json::from_value(response.result)
        .map_err(|error| AbiSourceError::InvalidResponse(error.to_string()))?;

    creations
        .into_iter()
        .next()
        .map(|creation| creation.tx_hash)
        .ok_or_else(|| AbiSourceError::NotFound(format!("creation of {address}")))
}

fn parse_transaction_block(tx_hash: &str, response: ProxyResponse) -> Result<u64, AbiSourceError> {
    if let Some(error) = response.error {
        return Err(AbiSourceError::InvalidResponse(error.to_string()));
    }

    let block_number = response
        .result
        .and_then(|transaction| transaction.block_number)
        .ok_or_else(|| AbiSourceError::NotFound(format!("transaction {tx_hash}")))?;

    u64::from_str_radix(block_number.trim_start_matches("0x"), 16)
        .map_err(|error| AbiSourceError::InvalidResponse(error.to_string()))
}
