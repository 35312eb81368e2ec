//! Content-addressed private state storage (spec section 4.1).

pub mod db;
pub mod error;
pub mod models;
pub mod query;
pub mod store;

pub use error::StateStoreError;
pub use models::{StateRow, StateStatus};
pub use query::StateQuery;
pub use store::StateStore;
