//! Sequencer, Delegator, Dispatcher (spec section 4.5).

pub mod delegator;
pub mod dispatcher;
pub mod sequencer;

pub use delegator::Delegator;
pub use dispatcher::{Dispatcher, TransactionDispatched};
pub use sequencer::resolve_responsible_node;
