//! The Attestation stage (spec section 4.4): broadcasts `EndorsementRequest`
//! to each non-local party in the assembled plan, collects responses, and
//! aggregates. Timeout retries with exponential backoff up to a cap;
//! persistent negative endorsement fails the transaction.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

use crate::domain::plugin::AttestationRequestSpec;
use crate::stage::decision::StageDecision;
use crate::stage::event::StageName;
use crate::stage::processor::StageContext;
use crate::stage::services::StageServices;
use crate::stage::stages::StageProcessor;

const MAX_BACKOFF: Duration = Duration::from_secs(30);

#[derive(Default, Clone, serde::Serialize, serde::Deserialize)]
struct EndorsementResult {
    party: String,
    signature: Option<String>,
    revert_reason: Option<String>,
}

struct InFlight {
    plan: Vec<AttestationRequestSpec>,
    responses: Vec<EndorsementResult>,
    last_broadcast: Option<Instant>,
    attempt: u32,
    /// The handoff to carry to Dispatch once every party has responded.
    /// Captured once from the Assemble handoff rather than re-derived from
    /// `context.data` on each call, since later calls see per-party
    /// `EndorsementResult` payloads instead.
    handoff: serde_json::Value,
}

pub struct AttestationStage {
    in_flight: DashMap<Uuid, InFlight>,
}

impl Default for AttestationStage {
    fn default() -> Self {
        Self { in_flight: DashMap::new() }
    }
}

#[derive(serde::Deserialize)]
struct AttestationHandoff {
    domain: String,
    contract: String,
    function: String,
    inputs: serde_json::Value,
    input_state_ids: Vec<String>,
    output_states: serde_json::Value,
    info: serde_json::Value,
    attestation_plan: Vec<AttestationRequestSpec>,
}

#[async_trait]
impl StageProcessor for AttestationStage {
    async fn process_events(
        &self,
        services: &StageServices,
        tx_id: Uuid,
        context: &StageContext,
    ) -> StageDecision {
        // A matching event either carries the handoff from Assemble (first
        // entry) or an EndorsementResponse payload with a `party` field.
        if let Ok(handoff) = serde_json::from_value::<AttestationHandoff>(context.data.clone()) {
            let handoff_json = serde_json::json!({
                "domain": handoff.domain,
                "contract": handoff.contract,
                "function": handoff.function,
                "inputs": handoff.inputs,
                "input_state_ids": handoff.input_state_ids,
                "output_states": handoff.output_states,
                "info": handoff.info,
            });
            self.in_flight.insert(
                tx_id,
                InFlight {
                    plan: handoff.attestation_plan.clone(),
                    responses: Vec::new(),
                    last_broadcast: None,
                    attempt: 0,
                    handoff: handoff_json,
                },
            );
            return self.evaluate(services, tx_id).await;
        }

        if let Ok(response) = serde_json::from_value::<EndorsementResult>(context.data.clone()) {
            if !response.party.is_empty() {
                if let Some(mut entry) = self.in_flight.get_mut(&tx_id) {
                    entry.responses.retain(|r| r.party != response.party);
                    entry.responses.push(response);
                }
            }
        }

        self.evaluate(services, tx_id).await
    }
}

impl AttestationStage {
    async fn evaluate(
        &self,
        services: &StageServices,
        tx_id: Uuid,
    ) -> StageDecision {
        let Some(mut entry) = self.in_flight.get_mut(&tx_id) else {
            return StageDecision::StayInStage;
        };

        if entry.responses.iter().any(|r| r.revert_reason.is_some()) {
            let reason = entry
                .responses
                .iter()
                .find_map(|r| r.revert_reason.clone())
                .unwrap_or_else(|| "endorsement rejected".to_string());
            drop(entry);
            self.in_flight.remove(&tx_id);
            return StageDecision::Fail(reason);
        }

        let all_responded = entry.plan.iter().all(|p| entry.responses.iter().any(|r| r.party == p.party));
        if all_responded {
            let handoff = entry.handoff.clone();
            drop(entry);
            self.in_flight.remove(&tx_id);
            return StageDecision::AdvanceTo(StageName::Dispatch, handoff);
        }

        let should_broadcast = match entry.last_broadcast {
            None => true,
            Some(last) => last.elapsed() >= backoff_for_attempt(entry.attempt),
        };

        if should_broadcast {
            entry.attempt += 1;
            entry.last_broadcast = Some(Instant::now());
            for party in entry.plan.iter().filter(|p| !entry.responses.iter().any(|r| r.party == p.party)) {
                let envelope = paladin_transport::proto::Envelope {
                    message_id: format!("{tx_id}:{}:{}", party.party, entry.attempt),
                    correlation_id: tx_id.to_string(),
                    destination_node: party.node.clone(),
                    payload_type: "EndorsementRequest".to_string(),
                    payload: Vec::new(),
                };
                if let Err(e) = services.peer.send(&party.node, "EndorsementRequest", envelope).await {
                    tracing::warn!(tx_id = %tx_id, node = %party.node, error = %e, "failed to send endorsement request");
                }
            }
        }

        StageDecision::Retry(backoff_for_attempt(entry.attempt))
    }
}

fn backoff_for_attempt(attempt: u32) -> Duration {
    let base = Duration::from_secs(1);
    let exp = base.saturating_mul(1u32 << attempt.min(5));
    exp.min(MAX_BACKOFF)
}
