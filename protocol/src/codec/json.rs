//! # JSON Representation
//!
//! Converts field maps to and from the JSON shape the network's RPC
//! interface speaks:
//!
//! | Wire type          | JSON                                             |
//! |--------------------|--------------------------------------------------|
//! | UInt8/16/32        | number (`TransactionType`/`LedgerEntryType` by name) |
//! | UInt64             | 16 hex digits (a number is also accepted)        |
//! | Hash128/160/256    | uppercase hex                                    |
//! | Blob               | uppercase hex                                    |
//! | AccountID          | base58 address                                   |
//! | Amount             | drops as a string, or `{value, currency, issuer}`|
//! | Object / Array     | object / array of single-key objects             |
//! | PathSet            | array of arrays of `{account, currency, issuer}` |
//! | Vector256          | array of hex                                     |
//!
//! Lowercase keys pass through untouched as annotations.

use serde_json::{Map, Value};

use super::amount::{Amount, IssuedAmount};
use super::binary::{uint64_from_decimal, uint64_from_hex};
use super::error::CodecError;
use super::fields::{enum_code, enum_name, field_by_name, is_annotation, FieldSpec, TypeCode};
use super::pathset::PathSet;
use super::types::{AccountId, FieldValue, Hash128, Hash160, Hash256, StObject};

// ---------------------------------------------------------------------------
// StObject -> JSON
// ---------------------------------------------------------------------------

/// Render a field map as a JSON object.
pub fn to_json(object: &StObject) -> Value {
    let mut map = Map::new();
    for (name, value) in object.iter() {
        map.insert(name.to_string(), value_to_json(name, value));
    }
    Value::Object(map)
}

fn value_to_json(name: &str, value: &FieldValue) -> Value {
    match value {
        FieldValue::UInt8(v) => Value::from(*v),
        FieldValue::UInt16(v) => match enum_name(name, *v) {
            Some(symbol) => Value::from(symbol),
            None => Value::from(*v),
        },
        FieldValue::UInt32(v) => Value::from(*v),
        FieldValue::UInt64(v) => Value::from(format!("{v:016X}")),
        FieldValue::Hash128(v) => Value::from(v.to_hex()),
        FieldValue::Hash160(v) => Value::from(v.to_hex()),
        FieldValue::Hash256(v) => Value::from(v.to_hex()),
        FieldValue::Amount(Amount::Native(drops)) => Value::from(drops.to_string()),
        FieldValue::Amount(Amount::Issued(issued)) => {
            serde_json::to_value(issued).unwrap_or(Value::Null)
        }
        FieldValue::Blob(v) => Value::from(hex::encode_upper(v)),
        FieldValue::Account(v) => Value::from(v.to_address()),
        FieldValue::Object(inner) => to_json(inner),
        FieldValue::Array(items) => Value::Array(items.iter().map(to_json).collect()),
        FieldValue::PathSet(set) => serde_json::to_value(set).unwrap_or(Value::Null),
        FieldValue::Vector256(hashes) => {
            Value::Array(hashes.iter().map(|h| Value::from(h.to_hex())).collect())
        }
        FieldValue::Annotation(v) => v.clone(),
    }
}

// ---------------------------------------------------------------------------
// JSON -> StObject
// ---------------------------------------------------------------------------

/// Parse a JSON object into a field map.
///
/// # Errors
///
/// [`CodecError::UnknownField`] for unrecognized uppercase keys and
/// [`CodecError::InvalidJson`] for values of the wrong shape.
pub fn from_json(value: &Value) -> Result<StObject, CodecError> {
    let map = value.as_object().ok_or_else(|| CodecError::InvalidJson {
        field: "<root>".into(),
        reason: "expected a JSON object".into(),
    })?;

    let mut object = StObject::new();
    for (name, raw) in map {
        if is_annotation(name) {
            object.insert(name.clone(), FieldValue::Annotation(raw.clone()));
            continue;
        }
        let spec = field_by_name(name)?;
        object.insert(name.clone(), value_from_json(spec, raw)?);
    }
    Ok(object)
}

fn invalid(spec: &FieldSpec, reason: impl Into<String>) -> CodecError {
    CodecError::InvalidJson {
        field: spec.name.to_string(),
        reason: reason.into(),
    }
}

fn small_uint(spec: &FieldSpec, raw: &Value, max: u64) -> Result<u64, CodecError> {
    if let Some(symbol) = raw.as_str() {
        return enum_code(spec.name, symbol)
            .map(u64::from)
            .ok_or_else(|| invalid(spec, format!("unknown symbol {symbol:?}")));
    }
    let number = raw
        .as_u64()
        .ok_or_else(|| invalid(spec, "expected a non-negative integer"))?;
    if number > max {
        return Err(CodecError::Overflow(format!(
            "{} value {number} exceeds {max}",
            spec.name
        )));
    }
    Ok(number)
}

fn hex_string<'a>(spec: &FieldSpec, raw: &'a Value) -> Result<&'a str, CodecError> {
    raw.as_str()
        .ok_or_else(|| invalid(spec, "expected a hex string"))
}

fn value_from_json(spec: &FieldSpec, raw: &Value) -> Result<FieldValue, CodecError> {
    Ok(match spec.type_code {
        TypeCode::UInt8 => FieldValue::UInt8(small_uint(spec, raw, u64::from(u8::MAX))? as u8),
        TypeCode::UInt16 => FieldValue::UInt16(small_uint(spec, raw, u64::from(u16::MAX))? as u16),
        TypeCode::UInt32 => FieldValue::UInt32(small_uint(spec, raw, u64::from(u32::MAX))? as u32),
        TypeCode::UInt64 => FieldValue::UInt64(match raw {
            Value::String(s) => uint64_from_hex(s)?,
            Value::Number(n) => match (n.as_u64(), n.as_i64()) {
                (Some(v), _) => v,
                (None, Some(v)) => uint64_from_decimal(i128::from(v))?,
                _ => return Err(invalid(spec, "expected an integer")),
            },
            _ => return Err(invalid(spec, "expected hex string or integer")),
        }),
        TypeCode::Hash128 => FieldValue::Hash128(Hash128::from_hex(hex_string(spec, raw)?)?),
        TypeCode::Hash160 => FieldValue::Hash160(Hash160::from_hex(hex_string(spec, raw)?)?),
        TypeCode::Hash256 => FieldValue::Hash256(Hash256::from_hex(hex_string(spec, raw)?)?),
        TypeCode::Amount => FieldValue::Amount(amount_from_json(spec, raw)?),
        TypeCode::Blob => FieldValue::Blob(
            hex::decode(hex_string(spec, raw)?).map_err(|e| invalid(spec, e.to_string()))?,
        ),
        TypeCode::AccountId => {
            let address = raw
                .as_str()
                .ok_or_else(|| invalid(spec, "expected an address"))?;
            FieldValue::Account(address.parse::<AccountId>()?)
        }
        TypeCode::Object => FieldValue::Object(from_json(raw)?),
        TypeCode::Array => {
            let items = raw
                .as_array()
                .ok_or_else(|| invalid(spec, "expected an array"))?;
            FieldValue::Array(items.iter().map(from_json).collect::<Result<_, _>>()?)
        }
        TypeCode::PathSet => FieldValue::PathSet(
            serde_json::from_value::<PathSet>(raw.clone())
                .map_err(|e| invalid(spec, e.to_string()))?,
        ),
        TypeCode::Vector256 => {
            let items = raw
                .as_array()
                .ok_or_else(|| invalid(spec, "expected an array of hashes"))?;
            FieldValue::Vector256(
                items
                    .iter()
                    .map(|item| Hash256::from_hex(hex_string(spec, item)?))
                    .collect::<Result<_, _>>()?,
            )
        }
    })
}

fn amount_from_json(spec: &FieldSpec, raw: &Value) -> Result<Amount, CodecError> {
    match raw {
        Value::String(s) => s.parse(),
        Value::Number(n) => n
            .as_i64()
            .map(Amount::Native)
            .ok_or_else(|| invalid(spec, "native amounts are integer drops")),
        Value::Object(_) => serde_json::from_value::<IssuedAmount>(raw.clone())
            .map(Amount::Issued)
            .map_err(|e| invalid(spec, e.to_string())),
        _ => Err(invalid(spec, "expected drops or {value, currency, issuer}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const ROOT: &str = "rHb9CJAWyB4rj91VRWn96DkukG4bwdtyTh";

    fn sample() -> Value {
        json!({
            "TransactionType": "TrustSet",
            "Account": ROOT,
            "Flags": 131072,
            "Sequence": 12,
            "Fee": "12",
            "LimitAmount": { "value": "100", "currency": "USD", "issuer": ROOT },
            "OwnerNode": "000000000000000A",
            "InvoiceID": "00".repeat(32),
            "SigningPubKey": "0330E7FC9D56BB25D6893BA3F317AE5BCF33B3291BD63DB32654A313222F7FD020",
            "Paths": [[{ "currency": "USD", "issuer": ROOT }]],
            "Memos": [{ "Memo": { "MemoData": "7465737421" } }],
            "hash": "local only",
        })
    }

    #[test]
    fn json_roundtrips_through_field_map() {
        let object = from_json(&sample()).unwrap();
        assert_eq!(object.get("TransactionType"), Some(&FieldValue::UInt16(20)));
        assert_eq!(object.get_u32("Sequence"), Some(12));
        assert_eq!(object.get_amount("Fee"), Some(&Amount::Native(12)));
        assert_eq!(object.get("OwnerNode"), Some(&FieldValue::UInt64(10)));
        assert_eq!(to_json(&object), sample());
    }

    #[test]
    fn unknown_uppercase_key_is_rejected() {
        let err = from_json(&json!({ "Nonsense": 1 })).unwrap_err();
        assert_eq!(err, CodecError::UnknownField("Nonsense".into()));
    }

    #[test]
    fn out_of_range_small_integers_overflow() {
        assert!(matches!(
            from_json(&json!({ "TransactionResult": 300 })),
            Err(CodecError::Overflow(_))
        ));
    }

    #[test]
    fn negative_uint64_is_invalid() {
        assert!(matches!(
            from_json(&json!({ "IndexNext": -5 })),
            Err(CodecError::InvalidValue(_))
        ));
    }

    #[test]
    fn unknown_transaction_type_name_is_invalid() {
        assert!(matches!(
            from_json(&json!({ "TransactionType": "Teleport" })),
            Err(CodecError::InvalidJson { .. })
        ));
    }
}
