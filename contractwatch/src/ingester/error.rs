use derive_more::Display;

use crate::checkpoints::CheckpointError;
use crate::planner::BlockRange;
use crate::RepoError;

#[derive(Debug, Display, Clone, PartialEq)]
pub enum IngesterError {
    /// Transport failures, 5xx and other provider errors. Retryable.
    #[display("upstream unavailable: {_0}")]
    UpstreamUnavailable(String),
    /// The provider refused the span or the size of its result.
    #[display("provider rejected block range {range}: {reason}")]
    RangeTooLarge { range: BlockRange, reason: String },
    #[display("invalid contract address: {_0}")]
    InvalidAddress(String),
    #[display("invalid contract ABI: {_0}")]
    InvalidAbi(String),
    #[display("repo connection error")]
    RepoConnectionError,
    #[display("{_0}")]
    GenericError(String),
}

impl std::error::Error for IngesterError {}

impl IngesterError {
    /// Errors that retrying the same range cannot fix.
    pub fn is_terminal(&self) -> bool {
        matches!(self, IngesterError::InvalidAddress(_) | IngesterError::InvalidAbi(_))
    }
}

impl From<RepoError> for IngesterError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotConnected => IngesterError::RepoConnectionError,
            RepoError::Unknown(error) => IngesterError::GenericError(error),
        }
    }
}

impl From<CheckpointError> for IngesterError {
    fn from(value: CheckpointError) -> Self {
        match value {
            CheckpointError::Repo(error) => error.into(),
            other_error => IngesterError::GenericError(other_error.to_string()),
        }
    }
}
