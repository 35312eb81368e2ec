use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum StageName {
    Assemble,
    Attestation,
    Dispatch,
}

impl StageName {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageName::Assemble => "assemble",
            StageName::Attestation => "attestation",
            StageName::Dispatch => "dispatch",
        }
    }

    pub fn next(&self) -> Option<StageName> {
        match self {
            StageName::Assemble => Some(StageName::Attestation),
            StageName::Attestation => Some(StageName::Dispatch),
            StageName::Dispatch => None,
        }
    }
}

/// A unit of work delivered to a transaction's processor (spec section
/// 4.4, "Event loop per transaction").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageEvent {
    pub contract_address: String,
    pub tx_id: Uuid,
    pub stage: StageName,
    pub data: serde_json::Value,
}
