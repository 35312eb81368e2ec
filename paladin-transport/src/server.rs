//! Server-side handling of inbound envelopes. The actual per-message-type
//! dispatch (EndorsementRequest, DelegationRequest, ...) lives in the
//! engine; this module only owns envelope-level idempotency and framing so
//! every handler downstream of it sees at-most-one effective delivery per
//! `message_id`.

use std::sync::Mutex;

use async_trait::async_trait;
use tonic::{Request, Response, Status};
use tracing::{debug, info};

use crate::idempotency::IdempotencyCache;
use crate::proto::paladin_transport_server::PaladinTransport;
use crate::proto::{DeliveryAck, Envelope};

/// Implementors receive envelopes that have already been de-duplicated at
/// the transport layer; they still must honour the engine-level
/// idempotency keys carried inside the payload for cross-restart safety.
#[async_trait]
pub trait EnvelopeHandler: Send + Sync + 'static {
    async fn handle(&self, envelope: Envelope);
}

pub struct TransportServer<H: EnvelopeHandler> {
    handler: H,
    seen: Mutex<IdempotencyCache>,
}

impl<H: EnvelopeHandler> TransportServer<H> {
    pub fn new(handler: H) -> Self {
        Self {
            handler,
            seen: Mutex::new(IdempotencyCache::new(100_000, 86_400)),
        }
    }
}

#[tonic::async_trait]
impl<H: EnvelopeHandler> PaladinTransport for TransportServer<H> {
    async fn deliver(
        &self,
        request: Request<Envelope>,
    ) -> Result<Response<DeliveryAck>, Status> {
        let envelope = request.into_inner();
        let duplicate = {
            let mut seen = self.seen.lock().unwrap();
            seen.check_and_record(&envelope.message_id)
        };

        if duplicate {
            debug!(message_id = %envelope.message_id, "duplicate envelope, acking without re-dispatch");
        } else {
            info!(message_id = %envelope.message_id, payload_type = %envelope.payload_type, "envelope received");
            self.handler.handle(envelope.clone()).await;
        }

        Ok(Response::new(DeliveryAck {
            message_id: envelope.message_id,
        }))
    }
}
