pub mod assemble;
pub mod attestation;
pub mod dispatch;

use async_trait::async_trait;
use uuid::Uuid;

use crate::stage::decision::StageDecision;
use crate::stage::event::StageName;
use crate::stage::processor::StageContext;
use crate::stage::services::StageServices;

#[async_trait]
pub trait StageProcessor: Send + Sync {
    async fn process_events(
        &self,
        services: &StageServices,
        tx_id: Uuid,
        context: &StageContext,
    ) -> StageDecision;
}

pub struct StageProcessorRegistry {
    assemble: assemble::AssembleStage,
    attestation: attestation::AttestationStage,
    dispatch: dispatch::DispatchStage,
}

impl Default for StageProcessorRegistry {
    fn default() -> Self {
        Self {
            assemble: assemble::AssembleStage,
            attestation: attestation::AttestationStage::default(),
            dispatch: dispatch::DispatchStage,
        }
    }
}

impl StageProcessorRegistry {
    pub fn get(&self, stage: StageName) -> &dyn StageProcessor {
        match stage {
            StageName::Assemble => &self.assemble,
            StageName::Attestation => &self.attestation,
            StageName::Dispatch => &self.dispatch,
        }
    }
}
