//! The local sink (spec section 4.5): hands assembled/endorsed
//! transactions to the Public Tx Engine and emits `TransactionDispatched`
//! to interested subscribers. The Dispatch stage (`stage::stages::dispatch`)
//! is the primary caller; this exists as a separate narrow surface so
//! other subsystems (metrics, audit) can subscribe without coupling to the
//! stage machinery.

use tokio::sync::broadcast;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct TransactionDispatched {
    pub transaction_id: Uuid,
    pub contract_address: String,
    pub public_transaction_ids: Vec<Uuid>,
}

pub struct Dispatcher {
    notify: broadcast::Sender<TransactionDispatched>,
}

impl Dispatcher {
    pub fn new() -> Self {
        let (notify, _rx) = broadcast::channel(1024);
        Self { notify }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TransactionDispatched> {
        self.notify.subscribe()
    }

    pub fn notify_dispatched(&self, event: TransactionDispatched) {
        // Subscribers are optional; a full channel or none present is not
        // an error.
        let _ = self.notify.send(event);
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}
