//! Delegation handshake (spec section 4.5): issues a `DelegationRequest`
//! keyed by a delegation id distinct from the transport message id (so
//! retries of the same delegation share correlation even though each
//! retry gets a fresh transport idempotency key), and resends with
//! jittered backoff until acked or the stage times out.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use rand::Rng;
use tokio::sync::Mutex;
use uuid::Uuid;

use paladin_transport::proto::Envelope;

use crate::transport::PeerSender;

pub struct PendingDelegation {
    pub delegation_id: Uuid,
    pub transaction_id: Uuid,
    pub contract_address: String,
    pub destination_node: String,
    pub block_height: u64,
    pub payload: Vec<u8>,
    attempt: u32,
    last_sent: Option<Instant>,
}

pub struct Delegator {
    peer: std::sync::Arc<dyn PeerSender>,
    pending: Mutex<HashMap<Uuid, PendingDelegation>>,
}

impl Delegator {
    pub fn new(peer: std::sync::Arc<dyn PeerSender>) -> Self {
        Self { peer, pending: Mutex::new(HashMap::new()) }
    }

    pub async fn delegate(
        &self,
        transaction_id: Uuid,
        contract_address: String,
        destination_node: String,
        block_height: u64,
        payload: Vec<u8>,
    ) -> Uuid {
        let delegation_id = Uuid::new_v4();
        let mut pending = self.pending.lock().await;
        pending.insert(
            delegation_id,
            PendingDelegation {
                delegation_id,
                transaction_id,
                contract_address,
                destination_node,
                block_height,
                payload,
                attempt: 0,
                last_sent: None,
            },
        );
        drop(pending);
        self.send_if_due(delegation_id).await;
        delegation_id
    }

    pub async fn acknowledge(&self, delegation_id: Uuid) {
        self.pending.lock().await.remove(&delegation_id);
    }

    pub async fn is_pending(&self, delegation_id: Uuid) -> bool {
        self.pending.lock().await.contains_key(&delegation_id)
    }

    /// Resends any delegation whose backoff has elapsed. Call from a
    /// periodic ticker; no-op for delegations not yet due.
    pub async fn retry_due(&self) {
        let ids: Vec<Uuid> = {
            let pending = self.pending.lock().await;
            pending
                .iter()
                .filter(|(_, p)| p.last_sent.map(|t| t.elapsed() >= backoff(p.attempt)).unwrap_or(true))
                .map(|(id, _)| *id)
                .collect()
        };
        for id in ids {
            self.send_if_due(id).await;
        }
    }

    async fn send_if_due(&self, delegation_id: Uuid) {
        let mut pending = self.pending.lock().await;
        let Some(entry) = pending.get_mut(&delegation_id) else { return };
        entry.attempt += 1;
        entry.last_sent = Some(Instant::now());

        let envelope = Envelope {
            message_id: format!("{}:{}", delegation_id, entry.attempt),
            correlation_id: entry.transaction_id.to_string(),
            destination_node: entry.destination_node.clone(),
            payload_type: "DelegationRequest".to_string(),
            payload: entry.payload.clone(),
        };
        let destination = entry.destination_node.clone();
        drop(pending);

        if let Err(e) = self.peer.send(&destination, "DelegationRequest", envelope).await {
            tracing::warn!(delegation_id = %delegation_id, error = %e, "delegation send failed");
        }
    }
}

fn backoff(attempt: u32) -> Duration {
    let base_ms = 200u64;
    let exp = base_ms.saturating_mul(1u64 << attempt.min(8));
    let capped = exp.min(20_000);
    let jitter = rand::thread_rng().gen_range(0..=capped / 4 + 1);
    Duration::from_millis(capped + jitter)
}
