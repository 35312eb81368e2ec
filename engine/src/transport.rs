//! Thin peer-messaging facade over `paladin_transport`, used by the
//! Attestation stage and the Delegator to send typed engine messages
//! without depending on the generated protobuf types directly.

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::watch;

use paladin_transport::proto::Envelope;
use paladin_transport::{Publisher, TransportError};

#[async_trait]
pub trait PeerSender: Send + Sync {
    async fn send(&self, destination_node: &str, payload_type: &str, envelope: Envelope) -> Result<(), TransportError>;
}

/// Wraps the retrying `Publisher`, serialising engine message bodies as
/// the envelope's opaque payload bytes.
pub struct PublisherPeerSender {
    pub publisher: Publisher,
    pub shutdown: watch::Receiver<bool>,
}

#[async_trait]
impl PeerSender for PublisherPeerSender {
    async fn send(
        &self,
        _destination_node: &str,
        _payload_type: &str,
        envelope: Envelope,
    ) -> Result<(), TransportError> {
        self.publisher
            .publish_until_acked(envelope, self.shutdown.clone())
            .await
    }
}

pub fn json_payload<T: Serialize>(value: &T) -> Vec<u8> {
    serde_json::to_vec(value).unwrap_or_default()
}
