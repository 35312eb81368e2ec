use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PublicTxStatus {
    Pending,
    Succeeded,
    Failed,
    Conflict,
    Suspended,
}

impl PublicTxStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PublicTxStatus::Pending => "pending",
            PublicTxStatus::Succeeded => "succeeded",
            PublicTxStatus::Failed => "failed",
            PublicTxStatus::Conflict => "conflict",
            PublicTxStatus::Suspended => "suspended",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "succeeded" => Some(Self::Succeeded),
            "failed" => Some(Self::Failed),
            "conflict" => Some(Self::Conflict),
            "suspended" => Some(Self::Suspended),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, PublicTxStatus::Pending)
    }
}

/// A sub-status recorded at each stage of a public transaction's lifecycle,
/// kept purely for audit (spec section 4.2, "Lifecycle states").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubStatusAction {
    Received,
    AssignNonce,
    RetrieveGasPrice,
    Sign,
    SubmitTransaction,
    Confirm,
    StateTransition,
}

impl SubStatusAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubStatusAction::Received => "Received",
            SubStatusAction::AssignNonce => "AssignNonce",
            SubStatusAction::RetrieveGasPrice => "RetrieveGasPrice",
            SubStatusAction::Sign => "Sign",
            SubStatusAction::SubmitTransaction => "SubmitTransaction",
            SubStatusAction::Confirm => "Confirm",
            SubStatusAction::StateTransition => "StateTransition",
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PublicTransactionRow {
    pub id: Uuid,
    pub signer: String,
    pub nonce: i64,
    pub from_address: String,
    pub to_address: String,
    pub data: Vec<u8>,
    pub max_fee_per_gas: Option<BigDecimal>,
    pub max_priority_fee_per_gas: Option<BigDecimal>,
    pub gas_price: Option<BigDecimal>,
    pub gas_limit: i64,
    pub status: String,
    pub submitted_hashes: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PublicTransactionRow {
    pub fn hashes(&self) -> Vec<String> {
        serde_json::from_value(self.submitted_hashes.clone()).unwrap_or_default()
    }
}

#[derive(Debug, Clone)]
pub struct NewPublicTransaction {
    pub id: Uuid,
    pub signer: String,
    pub from_address: String,
    pub to_address: String,
    pub data: Vec<u8>,
    pub gas_limit: i64,
}
