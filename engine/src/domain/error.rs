use thiserror::Error;

use crate::error::{Classify, ErrorKind};
use crate::state::StateStoreError;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("domain not configured: {0}")]
    NotInitialized(String),

    #[error("unknown contract: {0}")]
    UnknownContract(String),

    #[error("plugin configuration failed: {0}")]
    ConfigFailed(String),

    #[error("plugin rejected input: {0}")]
    InputRejection(String),

    #[error("plugin crashed: {0}")]
    PluginCrash(String),

    #[error(transparent)]
    State(#[from] StateStoreError),
}

impl Classify for DomainError {
    fn kind(&self) -> ErrorKind {
        match self {
            DomainError::NotInitialized(_) => ErrorKind::TransientPeer,
            DomainError::UnknownContract(_) | DomainError::InputRejection(_) => {
                ErrorKind::InputRejection
            }
            DomainError::ConfigFailed(_) => ErrorKind::TransientPeer,
            DomainError::PluginCrash(_) => ErrorKind::Fatal,
            DomainError::State(e) => e.kind(),
        }
    }
}
