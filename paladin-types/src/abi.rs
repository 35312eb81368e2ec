//! ABI tuple schema parsing, canonical signatures, label derivation, and
//! EIP-712 `hashStruct` encoding for the content-addressed state store.

use alloy::primitives::{keccak256, I256, U256};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::TypesError;

/// The handful of ABI atomic types the state store indexes on. Tuples,
/// arrays, `function`, and `fixed`/`ufixed` are rejected at schema
/// registration time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AbiType {
    Uint(u16),
    Int(u16),
    Address,
    Bool,
    Bytes,
    String,
}

impl AbiType {
    pub fn parse(raw: &str) -> Result<Self, TypesError> {
        match raw {
            "address" => Ok(AbiType::Address),
            "bool" => Ok(AbiType::Bool),
            "bytes" => Ok(AbiType::Bytes),
            "string" => Ok(AbiType::String),
            s if s.starts_with("uint") => {
                let width: u16 = s[4..]
                    .parse()
                    .map_err(|_| TypesError::UnsupportedAbiType(raw.to_string()))?;
                Ok(AbiType::Uint(width))
            }
            s if s.starts_with("int") => {
                let width: u16 = s[3..]
                    .parse()
                    .map_err(|_| TypesError::UnsupportedAbiType(raw.to_string()))?;
                Ok(AbiType::Int(width))
            }
            _ => Err(TypesError::UnsupportedAbiType(raw.to_string())),
        }
    }

    pub fn type_str(&self) -> String {
        match self {
            AbiType::Uint(n) => format!("uint{n}"),
            AbiType::Int(n) => format!("int{n}"),
            AbiType::Address => "address".to_string(),
            AbiType::Bool => "bool".to_string(),
            AbiType::Bytes => "bytes".to_string(),
            AbiType::String => "string".to_string(),
        }
    }

    /// True if this field is emitted as an `int64` numeric label rather than
    /// a string label: bools, and any int/uint narrower than 64 bits.
    fn is_int64_label(&self) -> bool {
        match self {
            AbiType::Bool => true,
            AbiType::Uint(n) => *n < 64,
            AbiType::Int(n) => *n <= 64,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaField {
    pub name: String,
    pub ty: AbiType,
    pub indexed: bool,
}

/// A registered ABI tuple schema within a domain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schema {
    pub struct_name: String,
    pub fields: Vec<SchemaField>,
}

impl Schema {
    pub fn new(struct_name: impl Into<String>, fields: Vec<SchemaField>) -> Result<Self, TypesError> {
        for f in &fields {
            if matches!(f.ty, AbiType::Address) && f.name.is_empty() {
                return Err(TypesError::UnsupportedAbiType("empty field name".into()));
            }
        }
        Ok(Schema {
            struct_name: struct_name.into(),
            fields,
        })
    }

    /// `type=NAME(type field,...),labels=[indexed field names...]`
    pub fn canonical_signature(&self) -> String {
        let type_part = self
            .fields
            .iter()
            .map(|f| format!("{} {}", f.ty.type_str(), f.name))
            .collect::<Vec<_>>()
            .join(",");
        let labels = self
            .fields
            .iter()
            .filter(|f| f.indexed)
            .map(|f| f.name.clone())
            .collect::<Vec<_>>()
            .join(",");
        format!("type={}({}),labels=[{}]", self.struct_name, type_part, labels)
    }

    /// `keccak256` over the canonical signature bytes. Immutable once
    /// registered; re-registering the same definition yields the same id.
    pub fn id(&self) -> [u8; 32] {
        keccak256(self.canonical_signature().as_bytes()).0
    }
}

/// A derived index label: either a lexically-sortable string label or a
/// native int64 label, per field type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LabelValue {
    Str(String),
    Int64(i64),
}

fn value_as_number_str(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn parse_u256(raw: &str) -> Result<U256, TypesError> {
    if let Some(hex) = raw.strip_prefix("0x") {
        U256::from_str_radix(hex, 16).map_err(|e| TypesError::InvalidHex(e.to_string()))
    } else {
        raw.parse::<U256>()
            .map_err(|e| TypesError::InvalidHex(e.to_string()))
    }
}

fn parse_i256(raw: &str) -> Result<I256, TypesError> {
    raw.parse::<I256>()
        .map_err(|e| TypesError::InvalidHex(e.to_string()))
}

/// Derive the label for one indexed field, or `None` if the field is not
/// indexed (it still appears in canonical data, just not in any label
/// table).
pub fn derive_label(field: &SchemaField, value: &Value) -> Result<Option<LabelValue>, TypesError> {
    if !field.indexed {
        return Ok(None);
    }

    let mismatch = |reason: &str| TypesError::LabelValueMismatch {
        field: field.name.clone(),
        ty: field.ty.type_str(),
        reason: reason.to_string(),
    };

    let label = match field.ty {
        AbiType::Bool => {
            let b = value.as_bool().ok_or_else(|| mismatch("expected bool"))?;
            LabelValue::Int64(if b { 1 } else { 0 })
        }
        AbiType::Uint(n) if n < 64 => {
            let raw = value_as_number_str(value).ok_or_else(|| mismatch("expected number"))?;
            let u = parse_u256(&raw)?;
            let as_u64: u64 = u.try_into().map_err(|_| mismatch("value too wide for declared width"))?;
            LabelValue::Int64(as_u64 as i64)
        }
        AbiType::Uint(_) => {
            let raw = value_as_number_str(value).ok_or_else(|| mismatch("expected number"))?;
            let u = parse_u256(&raw)?;
            LabelValue::Str(format!("{:064x}", u))
        }
        AbiType::Int(n) if n <= 64 => {
            let raw = value_as_number_str(value).ok_or_else(|| mismatch("expected number"))?;
            let i: i64 = raw.parse().map_err(|_| mismatch("expected integer"))?;
            LabelValue::Int64(i)
        }
        AbiType::Int(_) => {
            let raw = value_as_number_str(value).ok_or_else(|| mismatch("expected number"))?;
            let i = parse_i256(&raw)?;
            let bytes = i.to_be_bytes::<32>();
            let prefix = if i.is_negative() { '0' } else { '1' };
            LabelValue::Str(format!("{prefix}{}", hex::encode(bytes)))
        }
        AbiType::Address => {
            let raw = value
                .as_str()
                .ok_or_else(|| mismatch("expected 0x-address string"))?;
            let raw = raw.strip_prefix("0x").unwrap_or(raw);
            let bytes = hex::decode(raw).map_err(|e| mismatch(&e.to_string()))?;
            if bytes.len() != 20 {
                return Err(mismatch("address must be 20 bytes"));
            }
            LabelValue::Str(hex::encode(bytes))
        }
        AbiType::Bytes => {
            let raw = value.as_str().ok_or_else(|| mismatch("expected 0x-bytes string"))?;
            let raw = raw.strip_prefix("0x").unwrap_or(raw);
            hex::decode(raw).map_err(|e| mismatch(&e.to_string()))?;
            LabelValue::Str(raw.to_lowercase())
        }
        AbiType::String => {
            let s = value.as_str().ok_or_else(|| mismatch("expected string"))?;
            LabelValue::Str(s.to_string())
        }
    };

    Ok(Some(label))
}

/// Strip any field not present in the schema (e.g. `cruft`) and normalise
/// every integer field to a decimal string, producing the canonical data
/// blob that is both stored and EIP-712 hashed.
pub fn canonicalise(schema: &Schema, data: &Value) -> Result<Value, TypesError> {
    let obj = data
        .as_object()
        .ok_or_else(|| TypesError::UnsupportedAbiType("state data must be a JSON object".into()))?;

    let mut out = serde_json::Map::new();
    for field in &schema.fields {
        let raw = obj
            .get(&field.name)
            .ok_or_else(|| TypesError::LabelValueMismatch {
                field: field.name.clone(),
                ty: field.ty.type_str(),
                reason: "missing field".to_string(),
            })?;
        let normalised = match field.ty {
            AbiType::Uint(_) | AbiType::Int(_) => {
                let raw_str =
                    value_as_number_str(raw).ok_or_else(|| TypesError::LabelValueMismatch {
                        field: field.name.clone(),
                        ty: field.ty.type_str(),
                        reason: "expected integer".to_string(),
                    })?;
                Value::String(raw_str)
            }
            _ => raw.clone(),
        };
        out.insert(field.name.clone(), normalised);
    }
    Ok(Value::Object(out))
}

/// EIP-712 atomic encoding of one field's 32-byte word. Dynamic types
/// (`bytes`, `string`) are hashed per the standard's "encode the hash of
/// the dynamic value" rule.
fn eip712_encode_field(field: &SchemaField, value: &Value) -> Result<[u8; 32], TypesError> {
    let mismatch = |reason: &str| TypesError::LabelValueMismatch {
        field: field.name.clone(),
        ty: field.ty.type_str(),
        reason: reason.to_string(),
    };

    let word = match field.ty {
        AbiType::Bool => {
            let b = value.as_bool().ok_or_else(|| mismatch("expected bool"))?;
            U256::from(if b { 1u8 } else { 0u8 }).to_be_bytes()
        }
        AbiType::Uint(_) => {
            let raw = value_as_number_str(value).ok_or_else(|| mismatch("expected number"))?;
            parse_u256(&raw)?.to_be_bytes()
        }
        AbiType::Int(_) => {
            let raw = value_as_number_str(value).ok_or_else(|| mismatch("expected number"))?;
            parse_i256(&raw)?.to_be_bytes::<32>()
        }
        AbiType::Address => {
            let raw = value
                .as_str()
                .ok_or_else(|| mismatch("expected 0x-address string"))?;
            let raw = raw.strip_prefix("0x").unwrap_or(raw);
            let bytes = hex::decode(raw).map_err(|e| mismatch(&e.to_string()))?;
            let mut word = [0u8; 32];
            word[32 - bytes.len()..].copy_from_slice(&bytes);
            word
        }
        AbiType::Bytes => {
            let raw = value.as_str().ok_or_else(|| mismatch("expected 0x-bytes string"))?;
            let raw = raw.strip_prefix("0x").unwrap_or(raw);
            let bytes = hex::decode(raw).map_err(|e| mismatch(&e.to_string()))?;
            keccak256(bytes).0
        }
        AbiType::String => {
            let s = value.as_str().ok_or_else(|| mismatch("expected string"))?;
            keccak256(s.as_bytes()).0
        }
    };

    Ok(word)
}

/// `keccak256(typeHash || encodeData)`, the EIP-712 `hashStruct`. The type
/// hash is exactly the schema id, since both are `keccak256` of the same
/// canonical signature string.
pub fn eip712_hash_struct(schema: &Schema, canonical: &Value) -> Result<[u8; 32], TypesError> {
    let obj = canonical
        .as_object()
        .ok_or_else(|| TypesError::UnsupportedAbiType("canonical data must be an object".into()))?;

    let mut buf = Vec::with_capacity(32 * (schema.fields.len() + 1));
    buf.extend_from_slice(&schema.id());
    for field in &schema.fields {
        let value = obj.get(&field.name).ok_or_else(|| TypesError::LabelValueMismatch {
            field: field.name.clone(),
            ty: field.ty.type_str(),
            reason: "missing field in canonical data".to_string(),
        })?;
        buf.extend_from_slice(&eip712_encode_field(field, value)?);
    }
    Ok(keccak256(&buf).0)
}

/// `keccak256(EIP-712 hashStruct(schema, canonicalise(data)))` — the
/// content-addressed state id.
pub fn derive_state_id(schema: &Schema, data: &Value) -> Result<[u8; 32], TypesError> {
    let canonical = canonicalise(schema, data)?;
    let struct_hash = eip712_hash_struct(schema, &canonical)?;
    Ok(keccak256(struct_hash).0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn my_struct_schema() -> Schema {
        Schema::new(
            "MyStruct",
            vec![
                SchemaField { name: "field1".into(), ty: AbiType::Uint(256), indexed: true },
                SchemaField { name: "field2".into(), ty: AbiType::String, indexed: true },
                SchemaField { name: "field3".into(), ty: AbiType::Int(64), indexed: true },
                SchemaField { name: "field4".into(), ty: AbiType::Bool, indexed: true },
                SchemaField { name: "field5".into(), ty: AbiType::Address, indexed: true },
                SchemaField { name: "field6".into(), ty: AbiType::Int(256), indexed: true },
                SchemaField { name: "field7".into(), ty: AbiType::Bytes, indexed: true },
                SchemaField { name: "field8".into(), ty: AbiType::Uint(32), indexed: true },
                SchemaField { name: "field9".into(), ty: AbiType::String, indexed: false },
            ],
        )
        .unwrap()
    }

    #[test]
    fn a1_canonical_signature_matches_worked_example() {
        let schema = my_struct_schema();
        assert_eq!(
            schema.canonical_signature(),
            "type=MyStruct(uint256 field1,string field2,int64 field3,bool field4,address field5,int256 field6,bytes field7,uint32 field8,string field9),labels=[field1,field2,field3,field4,field5,field6,field7,field8]"
        );
    }

    #[test]
    fn a2_label_encoding_matches_worked_example() {
        let schema = my_struct_schema();
        let data = json!({
            "field1": "0x0123456789012345678901234567890123456789",
            "field2": "hello world",
            "field3": 42,
            "field4": true,
            "field5": "0x687414C0B8B4182B823Aec5436965cf19b197386",
            "field6": "-10203040506070809",
            "field7": "0xfeedbeef",
            "field8": 12345,
            "field9": "things and stuff",
            "cruft": "to remove",
        });

        let mut int64_labels = std::collections::HashMap::new();
        let mut str_labels = std::collections::HashMap::new();
        for field in &schema.fields {
            if let Some(label) = derive_label(field, &data[&field.name]).unwrap() {
                match label {
                    LabelValue::Int64(v) => {
                        int64_labels.insert(field.name.clone(), v);
                    }
                    LabelValue::Str(v) => {
                        str_labels.insert(field.name.clone(), v);
                    }
                }
            }
        }

        assert_eq!(int64_labels["field3"], 42);
        assert_eq!(int64_labels["field4"], 1);
        assert_eq!(int64_labels["field8"], 12345);
        assert_eq!(
            str_labels["field1"],
            "000000000000000000000000".to_string() + "0123456789012345678901234567890123456789"
        );
        assert_eq!(
            str_labels["field6"],
            "0ffffffffffffffffffffffffffffffffffffffffffffffffffdbc0638301b8e7"
        );

        let canonical = canonicalise(&schema, &data).unwrap();
        assert!(canonical.get("cruft").is_none());
        assert_eq!(canonical["field3"], json!("42"));
    }

    #[test]
    fn persisting_same_data_twice_is_deterministic() {
        let schema = my_struct_schema();
        let data = json!({
            "field1": "1", "field2": "x", "field3": 1, "field4": false,
            "field5": "0x0000000000000000000000000000000000000001",
            "field6": "1", "field7": "0x01", "field8": 1, "field9": "y",
        });
        let id1 = derive_state_id(&schema, &data).unwrap();
        let id2 = derive_state_id(&schema, &data).unwrap();
        assert_eq!(id1, id2);
    }

    #[test]
    fn rejects_array_and_tuple_types() {
        assert!(AbiType::parse("uint256[]").is_err());
        assert!(AbiType::parse("tuple").is_err());
        assert!(AbiType::parse("function").is_err());
        assert!(AbiType::parse("fixed128x18").is_err());
    }
}
