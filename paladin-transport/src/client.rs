//! Thin client wrapper over the generated tonic stub.

use tonic::transport::Channel;

use crate::proto::paladin_transport_client::PaladinTransportClient;
use crate::proto::{DeliveryAck, Envelope};
use crate::TransportError;

#[derive(Clone)]
pub struct TransportClient {
    inner: PaladinTransportClient<Channel>,
}

impl TransportClient {
    pub async fn connect(endpoint: String) -> Result<Self, TransportError> {
        let channel = Channel::from_shared(endpoint)
            .map_err(|e| TransportError::InvalidEndpoint(e.to_string()))?
            .connect()
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        Ok(Self {
            inner: PaladinTransportClient::new(channel),
        })
    }

    pub async fn deliver(&self, envelope: Envelope) -> Result<DeliveryAck, TransportError> {
        let mut client = self.inner.clone();
        let response = client
            .deliver(envelope)
            .await
            .map_err(|status| TransportError::Rpc(status.to_string()))?;
        Ok(response.into_inner())
    }
}
