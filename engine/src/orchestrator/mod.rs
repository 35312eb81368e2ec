//! The Orchestrator and the top-level Engine (spec section 4.6): one
//! `Orchestrator` per deployed contract, routed to by `EngineHandle`.

pub mod engine;
pub mod orchestrator;

pub use engine::{Engine, EngineHandle};
pub use orchestrator::{Orchestrator, OrchestratorState};
