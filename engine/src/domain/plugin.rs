//! The domain plugin contract (spec section 4.3). Plugin *implementations*
//! (Zeto, Noto, Pente, ...) are external collaborators; only this surface
//! is specified.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use paladin_types::EvmAddress;

use crate::domain::error::DomainError;
use crate::state::{StateQuery, StateRow, StateStatus, StateStore};

/// Callback surface a plugin uses while assembling a transaction: look up
/// available states and decode a schema by id. Handed to the plugin for
/// the lifetime of a single call so it never holds a reference to the
/// domain manager itself.
pub struct PluginContext {
    pub domain: String,
    pub contract: EvmAddress,
    /// The transaction this lookup is being performed on behalf of. A state
    /// locked-as-spending by this transaction itself is still available to
    /// it; the exclusion only applies to locks held by other transactions.
    pub transaction_id: uuid::Uuid,
    state_store: Arc<StateStore>,
}

impl PluginContext {
    pub fn new(
        domain: String,
        contract: EvmAddress,
        transaction_id: uuid::Uuid,
        state_store: Arc<StateStore>,
    ) -> Self {
        Self {
            domain,
            contract,
            transaction_id,
            state_store,
        }
    }

    pub async fn find_available_states(
        &self,
        schema_id: &str,
        query: &StateQuery,
    ) -> Result<Vec<StateRow>, DomainError> {
        let rows = self
            .state_store
            .find_states(
                &self.domain,
                &self.contract.as_hex(),
                schema_id,
                query,
                StateStatus::Available,
                self.transaction_id,
            )
            .await?;
        Ok(rows)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainSchemas {
    /// ABI tuple definitions the domain indexes states by, in the same
    /// declarative shape `paladin_types::Schema` parses.
    pub schemas: Vec<Value>,
    pub factory_abi: Value,
    pub constructor_abi: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmartContractInfo {
    pub factory_address: EvmAddress,
    pub notary: Option<EvmAddress>,
    pub custom_config: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitTransactionRequest {
    pub function: String,
    pub inputs: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitTransactionResult {
    pub required_verifiers: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssembleTransactionRequest {
    pub transaction_id: uuid::Uuid,
    pub function: String,
    pub inputs: Value,
}

/// What a plugin returns from `AssembleTransaction`: the states to lock as
/// `creating`/`spending`, any read-only states, and the attestation plan
/// for the Attestation stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssembledTransaction {
    pub input_state_ids: Vec<String>,
    pub output_states: Vec<Value>,
    pub read_state_ids: Vec<String>,
    pub info: Value,
    pub attestation_plan: Vec<AttestationRequestSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttestationRequestSpec {
    pub party: String,
    pub node: String,
    pub algorithm: String,
}

#[async_trait]
pub trait DomainPlugin: Send + Sync {
    async fn configure(&self, config: Value, chain_id: u64) -> Result<DomainSchemas, DomainError>;

    async fn get_smart_contract(
        &self,
        ctx: &PluginContext,
    ) -> Result<SmartContractInfo, DomainError>;

    async fn init_transaction(
        &self,
        ctx: &PluginContext,
        req: InitTransactionRequest,
    ) -> Result<InitTransactionResult, DomainError>;

    async fn assemble_transaction(
        &self,
        ctx: &PluginContext,
        req: AssembleTransactionRequest,
    ) -> Result<AssembledTransaction, DomainError>;
}
