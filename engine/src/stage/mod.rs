//! The Stage Controller & Transaction Processor (spec section 4.4).

pub mod controller;
pub mod decision;
pub mod event;
pub mod processor;
pub mod services;
pub mod stages;

pub use controller::StageController;
pub use decision::StageDecision;
pub use event::{StageEvent, StageName};
pub use services::StageServices;
