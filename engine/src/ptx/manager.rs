//! The Public Transaction Manager (spec section 4.2): queues, signs,
//! submits, tracks and reprices EVM transactions per signing address.
//! Structurally mirrors the teacher's `WriterManager` — a poll loop with a
//! circuit breaker around a fallible per-cycle operation — generalised
//! from a fixed set of chain writers to an arbitrary set of signers.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use alloy::signers::local::PrivateKeySigner;
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::ptx::confirm::{self, IndexedTransaction, ReconciliationOutcome};
use crate::ptx::db;
use crate::ptx::error::PtxError;
use crate::ptx::gas::{GasPrice, GasPricer};
use crate::ptx::models::{NewPublicTransaction, PublicTxStatus, SubStatusAction};
use crate::ptx::nonce::{NextNonceCallback, NonceTracker};
use crate::ptx::submit;

pub struct PublicTxManagerConfig {
    pub rpc_url: String,
    pub resubmit_after: Duration,
    pub fueling: Option<AutoFuelingConfig>,
}

#[derive(Clone)]
pub struct AutoFuelingConfig {
    pub fuel_signer: String,
    pub min_balance_wei: u128,
    pub top_up_wei: u128,
}

pub struct PublicTxManager {
    pool: PgPool,
    config: PublicTxManagerConfig,
    signers: HashMap<String, PrivateKeySigner>,
    nonces: NonceTracker,
    nonce_callback: Arc<dyn NextNonceCallback>,
    gas_pricer: Arc<dyn GasPricer>,
    parked_for_fueling: tokio::sync::Mutex<HashMap<Uuid, Uuid>>,
}

impl PublicTxManager {
    pub fn new(
        pool: PgPool,
        config: PublicTxManagerConfig,
        signers: HashMap<String, PrivateKeySigner>,
        nonce_callback: Arc<dyn NextNonceCallback>,
        gas_pricer: Arc<dyn GasPricer>,
    ) -> Self {
        Self {
            pool,
            config,
            signers,
            nonces: NonceTracker::new(),
            nonce_callback,
            gas_pricer,
            parked_for_fueling: tokio::sync::Mutex::new(HashMap::new()),
        }
    }

    /// Enqueues a new public transaction, assigns its nonce and prices its
    /// gas in one critical section per signer, per spec's "Nonce
    /// assignment" algorithm; the whole call fails if either step fails,
    /// leaving nothing half-submitted.
    pub async fn enqueue(&self, new_tx: NewPublicTransaction) -> Result<Uuid, PtxError> {
        db::append_substatus(&self.pool, new_tx.id, SubStatusAction::Received, None).await?;

        let nonce = self
            .nonces
            .assign(&new_tx.signer, self.nonce_callback.as_ref())
            .await
            .map_err(|e| PtxError::NonceAssignment {
                signer: new_tx.signer.clone(),
                reason: e.to_string(),
            })?;
        db::append_substatus(&self.pool, new_tx.id, SubStatusAction::AssignNonce, None).await?;

        let gas = self.gas_pricer.price().await?;
        db::append_substatus(&self.pool, new_tx.id, SubStatusAction::RetrieveGasPrice, None).await?;

        let (max_fee, max_priority, legacy_price) = match &gas {
            GasPrice::Eip1559 { max_fee_per_gas, max_priority_fee_per_gas } => {
                (Some(max_fee_per_gas), Some(max_priority_fee_per_gas), None)
            }
            GasPrice::Legacy { gas_price } => (None, None, Some(gas_price)),
        };
        db::insert(&self.pool, &new_tx, nonce as i64, max_fee, max_priority, legacy_price).await?;

        self.submit_once(new_tx.id, nonce, &gas).await?;
        Ok(new_tx.id)
    }

    async fn submit_once(&self, id: Uuid, nonce: u64, gas: &GasPrice) -> Result<(), PtxError> {
        let row = db::get(&self.pool, id).await?.ok_or(PtxError::NotFound(id))?;
        let signer = self
            .signers
            .get(&row.signer)
            .ok_or_else(|| PtxError::Signing(format!("no key loaded for signer {}", row.signer)))?;

        db::append_substatus(&self.pool, id, SubStatusAction::Sign, None).await?;
        let hash = submit::submit(&self.config.rpc_url, signer, &row, nonce, gas).await?;
        db::append_substatus(&self.pool, id, SubStatusAction::SubmitTransaction, None).await?;

        let (max_fee, legacy) = match gas {
            GasPrice::Eip1559 { max_fee_per_gas, .. } => (Some(max_fee_per_gas), None),
            GasPrice::Legacy { gas_price } => (None, Some(gas_price)),
        };
        db::append_submitted_hash(&self.pool, id, &hash, legacy, max_fee).await?;
        Ok(())
    }

    /// Re-signs and resubmits every pending transaction that has sat past
    /// `resubmit_after`, bumping gas by at least 12.5%.
    pub async fn resubmit_stale(&self) -> Result<usize, PtxError> {
        let mut resubmitted = 0;
        for signer in self.signers.keys() {
            for row in db::pending_for_signer(&self.pool, signer).await? {
                let age = Utc::now().signed_duration_since(row.updated_at);
                if age.num_seconds() < self.config.resubmit_after.as_secs() as i64 {
                    continue;
                }
                let previous = current_gas(&row);
                let bumped = self.gas_pricer.bump(&previous);
                if let Err(e) = self.submit_once(row.id, row.nonce as u64, &bumped).await {
                    tracing::warn!(tx_id = %row.id, error = %e, "resubmission failed, will retry next cycle");
                    continue;
                }
                resubmitted += 1;
            }
        }
        Ok(resubmitted)
    }

    /// Applies an `IndexedTransaction` from the block indexer to whichever
    /// pending row matches, per spec's confirmation-matching rules.
    pub async fn apply_indexed(&self, indexed: &IndexedTransaction) -> Result<(), PtxError> {
        for row in db::pending_for_signer(&self.pool, &indexed.from).await? {
            match confirm::reconcile(&row, indexed) {
                ReconciliationOutcome::Succeeded => {
                    db::append_substatus(&self.pool, row.id, SubStatusAction::Confirm, None).await?;
                    db::set_status(&self.pool, row.id, PublicTxStatus::Succeeded.as_str()).await?;
                    self.nonces.fast_forward(&indexed.from, indexed.nonce).await;
                    crate::metrics::record_public_tx_outcome("succeeded");
                }
                ReconciliationOutcome::Failed(reason) => {
                    db::append_substatus(
                        &self.pool,
                        row.id,
                        SubStatusAction::Confirm,
                        Some(serde_json::json!({ "reason": reason })),
                    )
                    .await?;
                    db::set_status(&self.pool, row.id, PublicTxStatus::Failed.as_str()).await?;
                    self.nonces.fast_forward(&indexed.from, indexed.nonce).await;
                    crate::metrics::record_public_tx_outcome("failed");
                }
                ReconciliationOutcome::Conflict => {
                    db::set_status(&self.pool, row.id, PublicTxStatus::Conflict.as_str()).await?;
                    self.nonces.fast_forward(&indexed.from, indexed.nonce).await;
                    crate::metrics::record_public_tx_outcome("conflict");
                }
                ReconciliationOutcome::Irrelevant => {}
            }
        }
        Ok(())
    }

    pub async fn get_status(&self, id: Uuid) -> Result<Option<PublicTxStatus>, PtxError> {
        let row = db::get(&self.pool, id).await?;
        Ok(row.and_then(|r| PublicTxStatus::parse(&r.status)))
    }

    pub fn fueling_enabled(&self) -> bool {
        self.config.fueling.is_some()
    }

    /// Parks `tx_id` awaiting a funding transaction on `fueling_tx_id`;
    /// per spec's optional auto-fueling algorithm.
    pub async fn park_for_fueling(&self, tx_id: Uuid, fueling_tx_id: Uuid) {
        self.parked_for_fueling.lock().await.insert(tx_id, fueling_tx_id);
    }

    pub async fn get_pending_fueling_transaction(&self, tx_id: Uuid) -> Option<Uuid> {
        self.parked_for_fueling.lock().await.get(&tx_id).copied()
    }
}

fn current_gas(row: &crate::ptx::models::PublicTransactionRow) -> GasPrice {
    match (&row.max_fee_per_gas, &row.max_priority_fee_per_gas) {
        (Some(max_fee), Some(tip)) => {
            GasPrice::Eip1559 { max_fee_per_gas: max_fee.clone(), max_priority_fee_per_gas: tip.clone() }
        }
        _ => GasPrice::Legacy { gas_price: row.gas_price.clone().unwrap_or_default() },
    }
}
