//! The Public Transaction Manager (spec section 4.2).

pub mod confirm;
pub mod db;
pub mod error;
pub mod gas;
pub mod manager;
pub mod models;
pub mod nonce;
pub mod submit;

pub use error::PtxError;
pub use manager::{AutoFuelingConfig, PublicTxManager, PublicTxManagerConfig};
pub use models::{NewPublicTransaction, PublicTransactionRow, PublicTxStatus};
