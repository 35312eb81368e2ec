//! The Dispatch stage (spec section 4.4): turns the assembled, endorsed
//! transaction into one or more public transactions. On confirmation,
//! marks creating states `Confirmed` and spending states `Spent`; on
//! failure, resets locks so the Assemble stage can re-queue.

use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

use crate::ptx::{NewPublicTransaction, PublicTxStatus};
use crate::stage::decision::StageDecision;
use crate::stage::event::StageName;
use crate::stage::processor::StageContext;
use crate::stage::services::StageServices;
use crate::stage::stages::StageProcessor;

pub struct DispatchStage {
    dispatched: DashMap<Uuid, DispatchedState>,
}

impl Default for DispatchStage {
    fn default() -> Self {
        Self { dispatched: DashMap::new() }
    }
}

struct DispatchedState {
    public_tx_id: Uuid,
    domain: String,
    input_state_ids: Vec<String>,
    output_state_ids: Vec<String>,
    /// The original Assemble input, kept so a dispatch failure can re-queue
    /// through Assemble with a payload it can actually parse instead of an
    /// empty one.
    assemble_input: serde_json::Value,
}

#[derive(serde::Deserialize)]
struct DispatchHandoff {
    domain: String,
    contract: String,
    function: String,
    inputs: serde_json::Value,
    input_state_ids: Vec<String>,
    output_states: Vec<serde_json::Value>,
    info: DispatchInfo,
}

#[derive(serde::Deserialize)]
struct DispatchInfo {
    signer: String,
    to: String,
    data_hex: String,
    gas_limit: u64,
}

#[async_trait]
impl StageProcessor for DispatchStage {
    async fn process_events(
        &self,
        services: &StageServices,
        tx_id: Uuid,
        context: &StageContext,
    ) -> StageDecision {
        if !self.dispatched.contains_key(&tx_id) {
            let Ok(handoff) = serde_json::from_value::<DispatchHandoff>(context.data.clone()) else {
                return StageDecision::Fail("malformed dispatch input".to_string());
            };

            let data = match hex::decode(handoff.info.data_hex.trim_start_matches("0x")) {
                Ok(d) => d,
                Err(e) => return StageDecision::Fail(format!("invalid tx data: {e}")),
            };

            let new_tx = NewPublicTransaction {
                id: Uuid::new_v4(),
                signer: handoff.info.signer.clone(),
                from_address: handoff.info.signer.clone(),
                to_address: handoff.info.to.clone(),
                data,
                gas_limit: handoff.info.gas_limit as i64,
            };

            let public_tx_id = match services.ptx_manager.enqueue(new_tx).await {
                Ok(id) => id,
                Err(e) => {
                    tracing::warn!(tx_id = %tx_id, error = %e, "dispatch submission failed, retrying");
                    return StageDecision::Retry(std::time::Duration::from_secs(5));
                }
            };
            crate::metrics::record_public_tx_submitted(&handoff.info.signer);

            let output_state_ids: Vec<String> = handoff
                .output_states
                .iter()
                .filter_map(|v| v.get("id").and_then(|id| id.as_str()).map(|s| s.to_string()))
                .collect();

            let assemble_input = serde_json::json!({
                "domain": handoff.domain,
                "contract": handoff.contract,
                "function": handoff.function,
                "inputs": handoff.inputs,
            });

            self.dispatched.insert(
                tx_id,
                DispatchedState {
                    public_tx_id,
                    domain: handoff.domain,
                    input_state_ids: handoff.input_state_ids,
                    output_state_ids,
                    assemble_input,
                },
            );
            return StageDecision::StayInStage;
        }

        let entry = self.dispatched.get(&tx_id).unwrap();
        let status = match services.ptx_manager.get_status(entry.public_tx_id).await {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(tx_id = %tx_id, error = %e, "failed to check public transaction status");
                return StageDecision::Retry(std::time::Duration::from_secs(5));
            }
        };

        match status {
            Some(PublicTxStatus::Succeeded) => {
                for state_id in &entry.input_state_ids {
                    let _ = services.state_store.mark_spent(&entry.domain, state_id, tx_id).await;
                }
                for state_id in &entry.output_state_ids {
                    let _ = services.state_store.mark_confirmed(&entry.domain, state_id, tx_id).await;
                }
                drop(entry);
                self.dispatched.remove(&tx_id);
                StageDecision::Remove
            }
            Some(PublicTxStatus::Failed) | Some(PublicTxStatus::Conflict) => {
                let _ = services.state_store.reset_transaction(tx_id).await;
                let assemble_input = entry.assemble_input.clone();
                drop(entry);
                self.dispatched.remove(&tx_id);
                StageDecision::AdvanceTo(StageName::Assemble, assemble_input)
            }
            _ => StageDecision::StayInStage,
        }
    }
}
