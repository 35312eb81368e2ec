//! Dispatches envelopes arriving over the peer transport to the right
//! in-process handler, by `payload_type` (spec section 4.7). Only the
//! message types this engine originates and needs an answer to are
//! handled here; requests this node would need to *service* on behalf of
//! a peer (acting as an endorser, receiving a delegated transaction) are
//! logged and dropped — they require a live plugin/endorsement service
//! this implementation does not provide (see DESIGN.md).

use std::sync::Arc;

use serde::Deserialize;
use uuid::Uuid;

use paladin_transport::proto::Envelope;
use paladin_transport::server::EnvelopeHandler;

use crate::orchestrator::engine::Engine;
use crate::sequencer::Delegator;
use crate::stage::{StageEvent, StageName};

#[derive(Deserialize)]
struct EndorsementResultPayload {
    contract_address: String,
    party: String,
    signature: Option<String>,
    revert_reason: Option<String>,
}

#[derive(Deserialize)]
struct DelegationAckPayload {
    delegation_id: Uuid,
}

pub struct InboundHandler {
    pub engine: Arc<Engine>,
    pub delegator: Arc<Delegator>,
}

#[async_trait::async_trait]
impl EnvelopeHandler for InboundHandler {
    async fn handle(&self, envelope: Envelope) {
        match envelope.payload_type.as_str() {
            "EndorsementResponse" => {
                let Ok(tx_id) = envelope.correlation_id.parse::<Uuid>() else {
                    tracing::warn!(correlation_id = %envelope.correlation_id, "endorsement response with invalid transaction id");
                    return;
                };
                let Ok(payload) = serde_json::from_slice::<EndorsementResultPayload>(&envelope.payload) else {
                    tracing::warn!(tx_id = %tx_id, "endorsement response with malformed payload");
                    return;
                };
                let data = serde_json::json!({
                    "party": payload.party,
                    "signature": payload.signature,
                    "revert_reason": payload.revert_reason,
                });
                self.engine.deliver(
                    &payload.contract_address,
                    StageEvent {
                        contract_address: payload.contract_address.clone(),
                        tx_id,
                        stage: StageName::Attestation,
                        data,
                    },
                );
            }
            "DelegationRequestAcknowledgment" => {
                if let Ok(payload) = serde_json::from_slice::<DelegationAckPayload>(&envelope.payload) {
                    self.delegator.acknowledge(payload.delegation_id).await;
                } else {
                    tracing::warn!(message_id = %envelope.message_id, "delegation ack with malformed payload");
                }
            }
            other => {
                tracing::debug!(payload_type = other, message_id = %envelope.message_id, "unhandled inbound envelope type, dropping");
            }
        }
    }
}
