//! The Assemble stage (spec section 4.4): asks the domain plugin to
//! assemble the transaction against currently-available states, then locks
//! inputs as `spending` and outputs as `creating`. A lock conflict resets
//! and re-queues through Assemble rather than failing outright.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::plugin::{AssembleTransactionRequest, AssembledTransaction};
use crate::stage::decision::StageDecision;
use crate::stage::event::StageName;
use crate::stage::processor::StageContext;
use crate::stage::services::StageServices;
use crate::stage::stages::StageProcessor;

pub struct AssembleStage;

#[derive(serde::Deserialize)]
struct AssembleInput {
    domain: String,
    contract: String,
    function: String,
    inputs: serde_json::Value,
}

#[async_trait]
impl StageProcessor for AssembleStage {
    async fn process_events(
        &self,
        services: &StageServices,
        tx_id: Uuid,
        context: &StageContext,
    ) -> StageDecision {
        let Ok(input) = serde_json::from_value::<AssembleInput>(context.data.clone()) else {
            return StageDecision::Fail("malformed assemble input".to_string());
        };

        let contract = match paladin_types::EvmAddress::from_hex(&input.contract) {
            Ok(c) => c,
            Err(e) => return StageDecision::Fail(e.to_string()),
        };

        let assembled = services
            .domain_manager
            .assemble_transaction(
                &input.domain,
                contract,
                AssembleTransactionRequest {
                    transaction_id: tx_id,
                    function: input.function.clone(),
                    inputs: input.inputs.clone(),
                },
            )
            .await;

        let assembled: AssembledTransaction = match assembled {
            Ok(a) => a,
            Err(e) if !e_is_retryable(&e) => return StageDecision::Fail(e.to_string()),
            Err(e) => {
                tracing::warn!(tx_id = %tx_id, error = %e, "assemble failed, retrying");
                return StageDecision::Retry(std::time::Duration::from_secs(5));
            }
        };

        for state_id in &assembled.input_state_ids {
            if let Ok(locked_by_other) =
                services.state_store.is_locked_spending_by_other(&input.domain, state_id, tx_id).await
            {
                if locked_by_other {
                    tracing::warn!(tx_id = %tx_id, state_id, "input already locked by another transaction, resetting");
                    let _ = services.state_store.reset_transaction(tx_id).await;
                    return StageDecision::Retry(std::time::Duration::from_millis(500));
                }
            }
            if let Err(e) = services.state_store.mark_locked(&input.domain, state_id, tx_id, false, true).await {
                return StageDecision::Fail(e.to_string());
            }
        }
        for output in &assembled.output_states {
            if let Some(id) = output.get("id").and_then(|v| v.as_str()) {
                if let Err(e) = services.state_store.mark_locked(&input.domain, id, tx_id, true, false).await {
                    return StageDecision::Fail(e.to_string());
                }
            }
        }

        let handoff = serde_json::json!({
            "domain": input.domain,
            "contract": input.contract,
            "function": input.function,
            "inputs": input.inputs,
            "input_state_ids": assembled.input_state_ids,
            "output_states": assembled.output_states,
            "info": assembled.info,
            "attestation_plan": assembled.attestation_plan,
        });
        StageDecision::AdvanceTo(StageName::Attestation, handoff)
    }
}

fn e_is_retryable(e: &crate::domain::DomainError) -> bool {
    use crate::error::Classify;
    e.is_retryable()
}
