use thiserror::Error;

use crate::error::{Classify, ErrorKind};

#[derive(Debug, Error)]
pub enum PtxError {
    #[error("nonce assignment failed for {signer}: {reason}")]
    NonceAssignment { signer: String, reason: String },

    #[error("gas pricing failed: {0}")]
    GasPricing(String),

    #[error("signing failed: {0}")]
    Signing(String),

    #[error("submission to the base ledger failed: {0}")]
    Submission(String),

    #[error("transaction reverted: {0}")]
    Reverted(String),

    #[error("transaction not found: {0}")]
    NotFound(uuid::Uuid),

    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

impl Classify for PtxError {
    fn kind(&self) -> ErrorKind {
        match self {
            PtxError::NonceAssignment { .. } => ErrorKind::TransientLedger,
            PtxError::GasPricing(_) => ErrorKind::TransientLedger,
            PtxError::Signing(_) => ErrorKind::Fatal,
            PtxError::Submission(_) => ErrorKind::TransientLedger,
            PtxError::Reverted(_) => ErrorKind::LedgerRevert,
            PtxError::NotFound(_) => ErrorKind::InputRejection,
            PtxError::Db(_) => ErrorKind::Fatal,
        }
    }
}
