//! The capability object handed to every stage processor. Stages call out
//! to the state store, domain manager, transport and public tx manager
//! only through this, never back into the orchestrator (design note,
//! "Cyclic references between orchestrator and stage processors").

use std::sync::Arc;

use uuid::Uuid;

use crate::domain::DomainManager;
use crate::ptx::{NewPublicTransaction, PtxError, PublicTxManager};
use crate::state::StateStore;
use crate::transport::PeerSender;

#[derive(Clone)]
pub struct StageServices {
    pub state_store: Arc<StateStore>,
    pub domain_manager: Arc<DomainManager>,
    pub ptx_manager: Arc<PublicTxManager>,
    pub peer: Arc<dyn PeerSender>,
}

impl StageServices {
    pub fn new(
        state_store: Arc<StateStore>,
        domain_manager: Arc<DomainManager>,
        ptx_manager: Arc<PublicTxManager>,
        peer: Arc<dyn PeerSender>,
    ) -> Self {
        Self { state_store, domain_manager, ptx_manager, peer }
    }

    pub async fn dispatch_public_transaction(
        &self,
        new_tx: NewPublicTransaction,
    ) -> Result<Uuid, PtxError> {
        self.ptx_manager.enqueue(new_tx).await
    }
}
