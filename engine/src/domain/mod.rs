//! The Domain Manager (spec section 4.3): per-domain plugin configuration,
//! contract metadata caching, and the plugin callback surface used while
//! assembling transactions.

pub mod contract_cache;
pub mod error;
pub mod manager;
pub mod plugin;

pub use error::DomainError;
pub use manager::DomainManager;
pub use plugin::{DomainPlugin, PluginContext};
