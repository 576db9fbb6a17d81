use crate::abi_sources::{AbiSource, AbiSourceError};
use crate::contracts::{ContractAbi, CreationInfo};

#[derive(Clone, Debug)]
pub struct MockAbiSource {
    abi: ContractAbi,
    creation_info: CreationInfo,
}

impl MockAbiSource {
    pub fn new(abi: ContractAbi, creation_info: CreationInfo) -> Self {
        Self { abi, creation_info }
    }
}

#[async_trait::async_trait]
impl AbiSource for MockAbiSource {
    async fn fetch_abi(&self, _address: &str) -> Result<ContractAbi, AbiSourceError> {
        Ok(self.abi.clone())
    }

    async fn fetch_creation_info(&self, _address: &str) -> Result<CreationInfo, AbiSourceError> {
        Ok(self.creation_info.clone())
    }
}
