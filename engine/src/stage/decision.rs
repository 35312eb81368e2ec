use std::time::Duration;

use crate::stage::event::StageName;

/// What a stage processor returns from `process_events` (spec section
/// 4.4, step 2).
#[derive(Debug, Clone)]
pub enum StageDecision {
    StayInStage,
    /// Advances to the next stage, carrying the data that stage will see
    /// as its initial `context.data` (stages don't share mutable state
    /// directly; this is the handoff).
    AdvanceTo(StageName, serde_json::Value),
    Retry(Duration),
    Suspend,
    Fail(String),
    Remove,
}
