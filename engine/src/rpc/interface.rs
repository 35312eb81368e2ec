//! Request/response shapes for the representative JSON-RPC methods named
//! in the external interfaces section of the specification. No HTTP/WS
//! transport is implemented; this is the seam an external router would
//! call through.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendTransactionRequest {
    pub domain: String,
    pub contract_address: String,
    pub function: String,
    pub data: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendTransactionResponse {
    pub transaction_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetTransactionReceiptRequest {
    pub transaction_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionReceipt {
    pub transaction_id: String,
    pub status: String,
    pub public_transaction_hash: Option<String>,
    pub failure_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryStatesRequest {
    pub domain: String,
    pub contract_address: String,
    pub schema: String,
    pub query: Value,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryStatesResponse {
    pub states: Vec<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreStateRequest {
    pub domain: String,
    pub contract_address: String,
    pub schema_id: String,
    pub data: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreStateResponse {
    pub state_id: String,
}

/// Methods named in the external interfaces section, grouped by the
/// namespace prefix the original wire protocol uses (`ptx_*`, `pstate_*`).
/// A caller outside this engine is expected to adapt this trait onto
/// whatever JSON-RPC/WebSocket transport it owns.
#[async_trait]
pub trait PaladinRpc: Send + Sync {
    async fn ptx_send_transaction(
        &self,
        req: SendTransactionRequest,
    ) -> Result<SendTransactionResponse, RpcError>;

    async fn ptx_get_transaction_receipt(
        &self,
        req: GetTransactionReceiptRequest,
    ) -> Result<TransactionReceipt, RpcError>;

    async fn ptx_get_transaction_receipt_full(
        &self,
        req: GetTransactionReceiptRequest,
    ) -> Result<Value, RpcError>;

    async fn pstate_store_state(
        &self,
        req: StoreStateRequest,
    ) -> Result<StoreStateResponse, RpcError>;

    async fn pstate_query_states(
        &self,
        req: QueryStatesRequest,
    ) -> Result<QueryStatesResponse, RpcError>;
}

/// JSON-RPC error carrying the Paladin error code (`PDxxxxxx`) in its
/// message, per the external interfaces section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}
