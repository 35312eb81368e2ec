//! Reconciles confirmations against the `IndexedTransaction` records pushed
//! by the block indexer (spec section 4.2, "Confirmation"). Grounded in
//! the teacher's `confirmation/evm.rs` receipt-polling pattern, adapted to
//! push (the indexer calls us) rather than pull.

use serde::{Deserialize, Serialize};

use crate::ptx::models::PublicTransactionRow;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedTransaction {
    pub from: String,
    pub nonce: u64,
    pub tx_hash: String,
    pub success: bool,
    pub revert_reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconciliationOutcome {
    /// One of `submittedHashes` matched and the receipt succeeded.
    Succeeded,
    /// Receipt for one of `submittedHashes` reverted.
    Failed(String),
    /// Same (from, nonce) confirmed under a hash we never submitted.
    Conflict,
    /// Not our transaction or nonce doesn't match yet; ignore.
    Irrelevant,
}

/// Matches an indexed transaction against a pending `PublicTransactionRow`
/// per the spec's matching rules.
pub fn reconcile(row: &PublicTransactionRow, indexed: &IndexedTransaction) -> ReconciliationOutcome {
    if row.from_address.to_lowercase() != indexed.from.to_lowercase()
        || row.nonce as u64 != indexed.nonce
    {
        return ReconciliationOutcome::Irrelevant;
    }

    let hashes = row.hashes();
    let matched_ours = hashes.iter().any(|h| h.eq_ignore_ascii_case(&indexed.tx_hash));

    if matched_ours {
        if indexed.success {
            ReconciliationOutcome::Succeeded
        } else {
            ReconciliationOutcome::Failed(
                indexed.revert_reason.clone().unwrap_or_else(|| "reverted".to_string()),
            )
        }
    } else {
        ReconciliationOutcome::Conflict
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn row(hashes: &[&str]) -> PublicTransactionRow {
        PublicTransactionRow {
            id: Uuid::nil(),
            signer: "0xabc".into(),
            nonce: 5,
            from_address: "0xABC".into(),
            to_address: "0xdef".into(),
            data: vec![],
            max_fee_per_gas: None,
            max_priority_fee_per_gas: None,
            gas_price: None,
            gas_limit: 21000,
            status: "pending".into(),
            submitted_hashes: serde_json::to_value(hashes).unwrap(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn matching_hash_succeeds() {
        let row = row(&["0x111"]);
        let indexed = IndexedTransaction {
            from: "0xabc".into(),
            nonce: 5,
            tx_hash: "0x111".into(),
            success: true,
            revert_reason: None,
        };
        assert_eq!(reconcile(&row, &indexed), ReconciliationOutcome::Succeeded);
    }

    #[test]
    fn matching_hash_with_revert_fails() {
        let row = row(&["0x111"]);
        let indexed = IndexedTransaction {
            from: "0xabc".into(),
            nonce: 5,
            tx_hash: "0x111".into(),
            success: false,
            revert_reason: Some("insufficient balance".into()),
        };
        assert_eq!(
            reconcile(&row, &indexed),
            ReconciliationOutcome::Failed("insufficient balance".into())
        );
    }

    #[test]
    fn unmatched_hash_same_nonce_is_conflict() {
        let row = row(&["0x111"]);
        let indexed = IndexedTransaction {
            from: "0xabc".into(),
            nonce: 5,
            tx_hash: "0x222".into(),
            success: true,
            revert_reason: None,
        };
        assert_eq!(reconcile(&row, &indexed), ReconciliationOutcome::Conflict);
    }

    #[test]
    fn different_nonce_is_irrelevant() {
        let row = row(&["0x111"]);
        let indexed = IndexedTransaction {
            from: "0xabc".into(),
            nonce: 6,
            tx_hash: "0x111".into(),
            success: true,
            revert_reason: None,
        };
        assert_eq!(reconcile(&row, &indexed), ReconciliationOutcome::Irrelevant);
    }
}
