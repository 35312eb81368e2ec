//! Row types for the state store tables, mirrored on the `sqlx::FromRow`
//! convention used throughout the teacher's `db::models` module.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct SchemaRow {
    pub domain: String,
    pub id: String,
    pub struct_name: String,
    pub definition: Value,
    pub canonical_sig: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct StateRow {
    pub domain: String,
    pub contract: String,
    pub id: String,
    pub schema_id: String,
    pub data: Value,
    pub created_at: DateTime<Utc>,
}

/// Availability status filter for `FindStates`, per spec section 4.1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateStatus {
    Available,
    Confirmed,
    Unconfirmed,
    Spent,
    Locked,
    All,
}

impl StateStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "available" => Some(Self::Available),
            "confirmed" => Some(Self::Confirmed),
            "unconfirmed" => Some(Self::Unconfirmed),
            "spent" => Some(Self::Spent),
            "locked" => Some(Self::Locked),
            "all" => Some(Self::All),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct StateConfirmRow {
    pub domain: String,
    pub state_id: String,
    pub transaction_id: Uuid,
}

#[derive(Debug, Clone, FromRow)]
pub struct StateSpendRow {
    pub domain: String,
    pub state_id: String,
    pub transaction_id: Uuid,
}

#[derive(Debug, Clone, FromRow)]
pub struct StateLockRow {
    pub domain: String,
    pub state_id: String,
    pub transaction_id: Uuid,
    pub creating: bool,
    pub spending: bool,
}

#[derive(Debug, Clone, FromRow)]
pub struct NullifierRow {
    pub domain: String,
    pub state_id: String,
    pub nullifier_id: String,
    pub opaque_bytes: Vec<u8>,
}
