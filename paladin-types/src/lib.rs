//! Shared value types for the Paladin private transaction engine: content
//! hashes, EVM addresses, and ABI schema/label derivation used by the state
//! store and the public transaction manager.

pub mod abi;
pub mod address;
pub mod error;
pub mod hash;

pub use abi::{derive_label, derive_state_id, AbiType, LabelValue, Schema, SchemaField};
pub use address::{EvmAddress, Hash256};
pub use error::TypesError;
