use thiserror::Error;

/// Errors raised while parsing or encoding the shared value types.
#[derive(Debug, Error)]
pub enum TypesError {
    #[error("invalid hex: {0}")]
    InvalidHex(String),

    #[error("{what} must be {expected} bytes, got {got}")]
    WrongLength {
        what: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("unsupported ABI type: {0}")]
    UnsupportedAbiType(String),

    #[error("label value mismatched declared type {field} ({ty}): {reason}")]
    LabelValueMismatch {
        field: String,
        ty: String,
        reason: String,
    },
}
