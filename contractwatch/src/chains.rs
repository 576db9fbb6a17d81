/// Represents the network ID for an EVM Chain
/// For example, `ChainId::Mainnet`, `ChainId::Sepolia`, etc.
pub type ChainId = ethers::types::Chain;

/// The EVM chain network a ContractWatch process indexes.
/// One process watches exactly one chain.
#[derive(Clone, Debug)]
pub struct Chain {
    pub id: ChainId,
    pub json_rpc_url: String,
}

impl Chain {
    /// Builds the chain network
    ///
    ///
    /// # Example
    /// ```
    /// use contractwatch::{Chain, ChainId};
    ///
    /// Chain::new(ChainId::Sepolia, "https://sepolia.infura.io/v3/...");
    /// ```
    pub fn new(id: ChainId, json_rpc_url: &str) -> Self {
        Self {
            id,
            json_rpc_url: json_rpc_url.to_string(),
        }
    }

    /// Etherscan-compatible API endpoint for this chain, when one is known.
    pub fn explorer_api_url(&self) -> Option<&'static str> {
        self.id.etherscan_urls().map(|(api_url, _)| api_url)
    }
}
