//! 20-byte EVM addresses and 32-byte content hashes used as entity keys
//! throughout the state store and public transaction manager.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypesError;

/// An EVM address (20 bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EvmAddress(pub [u8; 20]);

impl EvmAddress {
    pub fn from_hex(hex: &str) -> Result<Self, TypesError> {
        let hex = hex.strip_prefix("0x").unwrap_or(hex);
        let bytes = hex::decode(hex).map_err(|e| TypesError::InvalidHex(e.to_string()))?;
        if bytes.len() != 20 {
            return Err(TypesError::WrongLength {
                what: "EvmAddress",
                expected: 20,
                got: bytes.len(),
            });
        }
        let mut result = [0u8; 20];
        result.copy_from_slice(&bytes);
        Ok(EvmAddress(result))
    }

    pub fn as_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// Left-pad to 32 bytes, the uint160 form used in ABI labels.
    pub fn as_bytes32(&self) -> [u8; 32] {
        let mut result = [0u8; 32];
        result[12..].copy_from_slice(&self.0);
        result
    }

    pub fn from_bytes32(bytes: &[u8; 32]) -> Self {
        let mut result = [0u8; 20];
        result.copy_from_slice(&bytes[12..]);
        EvmAddress(result)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl fmt::Display for EvmAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_hex())
    }
}

/// A 32-byte content hash: used for schema ids, state ids, and nullifier ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Hash256(pub [u8; 32]);

impl Hash256 {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Hash256(bytes)
    }

    pub fn from_hex(hex: &str) -> Result<Self, TypesError> {
        let hex = hex.strip_prefix("0x").unwrap_or(hex);
        let bytes = hex::decode(hex).map_err(|e| TypesError::InvalidHex(e.to_string()))?;
        if bytes.len() != 32 {
            return Err(TypesError::WrongLength {
                what: "Hash256",
                expected: 32,
                got: bytes.len(),
            });
        }
        let mut result = [0u8; 32];
        result.copy_from_slice(&bytes);
        Ok(Hash256(result))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evm_address_roundtrips_through_bytes32() {
        let addr = EvmAddress::from_hex("0x687414C0B8B4182B823Aec5436965cf19b197386").unwrap();
        let padded = addr.as_bytes32();
        assert_eq!(EvmAddress::from_bytes32(&padded), addr);
    }

    #[test]
    fn evm_address_rejects_wrong_length() {
        assert!(EvmAddress::from_hex("0xdead").is_err());
    }

    #[test]
    fn hash256_hex_roundtrip() {
        let h = Hash256::from_bytes([7u8; 32]);
        let parsed = Hash256::from_hex(&h.to_hex()).unwrap();
        assert_eq!(h, parsed);
    }
}
