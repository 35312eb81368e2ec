use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("connect failed: {0}")]
    Connect(String),

    #[error("rpc failed: {0}")]
    Rpc(String),

    #[error("delivery cancelled")]
    Cancelled,
}
