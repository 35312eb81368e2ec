//! Owns the mapping from transaction id to its processor's event channel.
//! Per spec section 4.4, the controller's job is routing; all stage logic
//! lives in `StageProcessorRegistry` via `TransactionProcessor`.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::stage::event::StageEvent;
use crate::stage::processor::{ProcessorOutcome, TransactionProcessor};
use crate::stage::services::StageServices;

pub struct StageController {
    senders: DashMap<Uuid, mpsc::UnboundedSender<StageEvent>>,
    services: StageServices,
    stage_retry_cap: u32,
}

impl StageController {
    pub fn new(services: StageServices, stage_retry_cap: u32) -> Self {
        Self { senders: DashMap::new(), services, stage_retry_cap }
    }

    /// Spawns a processor for a newly admitted transaction; returns once
    /// the processor's channel exists so the caller can immediately
    /// deliver the first event.
    pub fn admit(self: &Arc<Self>, tx_id: Uuid, contract_address: String) {
        if self.senders.contains_key(&tx_id) {
            return;
        }
        let (tx, rx) = mpsc::unbounded_channel();
        self.senders.insert(tx_id, tx);

        let services = self.services.clone();
        let stage_retry_cap = self.stage_retry_cap;
        let controller = self.clone();
        tokio::spawn(async move {
            let mut processor = TransactionProcessor::new(tx_id, contract_address, rx, services, stage_retry_cap);
            let outcome = processor.run().await;
            controller.senders.remove(&tx_id);
            match outcome {
                ProcessorOutcome::Failed(reason) => {
                    tracing::warn!(tx_id = %tx_id, reason, "transaction processor failed");
                }
                ProcessorOutcome::Removed | ProcessorOutcome::Completed => {}
            }
        });
    }

    pub fn is_in_flight(&self, tx_id: &Uuid) -> bool {
        self.senders.contains_key(tx_id)
    }

    pub fn in_flight_count(&self) -> usize {
        self.senders.len()
    }

    /// Delivers a stage event to its processor; silently dropped if the
    /// transaction isn't (or is no longer) in flight.
    pub fn deliver(&self, event: StageEvent) {
        if let Some(sender) = self.senders.get(&event.tx_id) {
            let _ = sender.send(event);
        } else {
            tracing::warn!(tx_id = %event.tx_id, "dropping event for unknown transaction");
        }
    }
}
