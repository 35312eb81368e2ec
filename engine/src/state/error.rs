use thiserror::Error;

use crate::error::{Classify, ErrorKind};

#[derive(Debug, Error)]
pub enum StateStoreError {
    #[error("invalid state data: {0}")]
    InvalidStateData(String),

    #[error("schema not found: domain={domain} id={id}")]
    SchemaNotFound { domain: String, id: String },

    #[error("label value mismatch: {0}")]
    LabelValueMismatch(String),

    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),

    #[error("types error: {0}")]
    Types(#[from] paladin_types::TypesError),
}

impl Classify for StateStoreError {
    fn kind(&self) -> ErrorKind {
        match self {
            StateStoreError::InvalidStateData(_)
            | StateStoreError::SchemaNotFound { .. }
            | StateStoreError::LabelValueMismatch(_) => ErrorKind::InputRejection,
            StateStoreError::Db(_) => ErrorKind::Fatal,
            StateStoreError::Types(_) => ErrorKind::InputRejection,
        }
    }
}
