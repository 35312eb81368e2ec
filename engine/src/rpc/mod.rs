//! The user-facing JSON-RPC/WebSocket API is an external collaborator per
//! the governing specification: only its method names and request/response
//! shapes are modelled here, as a stable seam the engine's internals can be
//! driven from. No transport or router is implemented.

pub mod interface;
