//! # Canonical Object Serializer
//!
//! Turns a [`StObject`] into the one byte sequence the network accepts and
//! hashes, and back.
//!
//! ## Canonical form
//!
//! 1. Drop annotation fields (lowercase names).
//! 2. Resolve every remaining name in the coordinate table; unknown names
//!    are an error, never silently dropped.
//! 3. Sort by `(type code, field id)`. Never by name, never by insertion
//!    order: the hash depends on this ordering.
//! 4. Write each field as `header || value`.
//! 5. Nested objects end with `0xE1`, arrays with `0xF1`. The outermost
//!    object has no terminator; it simply ends with the input.
//!
//! ## Hashes
//!
//! A transaction's ID and its signing hash are both SHA-512-half over a
//! four-byte prefix plus a serialization. The signing form omits
//! `TxnSignature`, which is why a transaction's ID changes when it is
//! signed but its signing hash does not.

use tracing::trace;

use super::amount;
use super::binary::{decode_varint, BinaryReader, BinaryWriter};
use super::error::CodecError;
use super::fields::{field_by_coordinates, field_by_name, is_annotation, FieldSpec, TypeCode};
use super::pathset;
use super::types::{AccountId, FieldValue, Hash128, Hash160, Hash256, StObject};
use crate::config::{
    ARRAY_END_MARKER, HASH_PREFIX_TRANSACTION_ID, HASH_PREFIX_TRANSACTION_SIGN, OBJECT_END_MARKER,
};
use crate::crypto::hash::sha512_half;

const ACCOUNT_ID_LENGTH: usize = 20;

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Serialize a field map to its canonical bytes.
///
/// # Errors
///
/// Any [`CodecError`]: unknown field names, values of the wrong type, and
/// values that do not fit their wire encoding.
pub fn serialize(object: &StObject) -> Result<Vec<u8>, CodecError> {
    let mut writer = BinaryWriter::with_capacity(256);
    write_fields(&mut writer, object, false)?;
    Ok(writer.into_bytes())
}

/// Serialize without non-signing fields (`TxnSignature`).
pub fn serialize_for_signing(object: &StObject) -> Result<Vec<u8>, CodecError> {
    let mut writer = BinaryWriter::with_capacity(256);
    write_fields(&mut writer, object, true)?;
    Ok(writer.into_bytes())
}

/// Parse canonical bytes back into a field map.
///
/// Fields come back in canonical order. Deserialized `Memo` objects gain
/// `parsed_memo_*` annotations when their blobs hold UTF-8.
pub fn deserialize(bytes: &[u8]) -> Result<StObject, CodecError> {
    let mut reader = BinaryReader::new(bytes);
    let mut object = StObject::new();
    while !reader.is_empty() {
        let (spec, value) = read_field(&mut reader)?;
        object.insert(spec.name, value);
    }
    Ok(object)
}

/// The transaction ID: `SHA-512-half("TXN\0" || serialize(fields))`.
pub fn transaction_hash(object: &StObject) -> Result<Hash256, CodecError> {
    Ok(prefixed_hash(HASH_PREFIX_TRANSACTION_ID, &serialize(object)?))
}

/// The hash a single signer signs:
/// `SHA-512-half("STX\0" || serialize_for_signing(fields))`.
pub fn signing_hash(object: &StObject) -> Result<Hash256, CodecError> {
    Ok(prefixed_hash(
        HASH_PREFIX_TRANSACTION_SIGN,
        &serialize_for_signing(object)?,
    ))
}

fn prefixed_hash(prefix: u32, body: &[u8]) -> Hash256 {
    let mut data = Vec::with_capacity(4 + body.len());
    data.extend_from_slice(&prefix.to_be_bytes());
    data.extend_from_slice(body);
    Hash256(sha512_half(&data))
}

// ---------------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------------

fn write_fields(
    writer: &mut BinaryWriter,
    object: &StObject,
    signing_only: bool,
) -> Result<(), CodecError> {
    let mut fields: Vec<(&'static FieldSpec, &FieldValue)> = Vec::with_capacity(object.len());
    for (name, value) in object.iter() {
        if is_annotation(name) {
            continue;
        }
        let spec = field_by_name(name)?;
        if signing_only && !spec.is_signing_field() {
            continue;
        }
        fields.push((spec, value));
    }
    fields.sort_by_key(|(spec, _)| spec.coordinates());

    for (spec, value) in fields {
        write_field(writer, spec, value)?;
    }
    Ok(())
}

/// Write one field: header then value.
pub fn write_field(
    writer: &mut BinaryWriter,
    spec: &FieldSpec,
    value: &FieldValue,
) -> Result<(), CodecError> {
    let mismatch = || CodecError::TypeMismatch {
        field: spec.name.to_string(),
        expected: spec.type_code.label(),
    };
    if value.type_code() != Some(spec.type_code) {
        return Err(mismatch());
    }
    writer.write_bytes(&spec.header());

    match value {
        FieldValue::UInt8(v) => writer.write_u8(*v),
        FieldValue::UInt16(v) => writer.write_u16(*v),
        FieldValue::UInt32(v) => writer.write_u32(*v),
        FieldValue::UInt64(v) => writer.write_u64(*v),
        FieldValue::Hash128(v) => writer.write_bytes(v.as_bytes()),
        FieldValue::Hash160(v) => writer.write_bytes(v.as_bytes()),
        FieldValue::Hash256(v) => writer.write_bytes(v.as_bytes()),
        FieldValue::Amount(v) => amount::write(writer, v)?,
        FieldValue::Blob(v) => writer.write_variable_length(v)?,
        FieldValue::Account(v) => writer.write_variable_length(v.as_bytes())?,
        FieldValue::Object(inner) => {
            write_fields(writer, inner, false)?;
            writer.write_u8(OBJECT_END_MARKER);
        }
        FieldValue::Array(items) => {
            for item in items {
                let mut entries = item.iter();
                let (name, inner) = match (entries.next(), entries.next()) {
                    (Some(entry), None) => entry,
                    _ => return Err(CodecError::ArrayElement(item.len())),
                };
                write_field(writer, field_by_name(name)?, inner)?;
            }
            writer.write_u8(ARRAY_END_MARKER);
        }
        FieldValue::PathSet(v) => pathset::write(writer, v)?,
        FieldValue::Vector256(hashes) => {
            let mut body = Vec::with_capacity(hashes.len() * Hash256::LEN);
            for hash in hashes {
                body.extend_from_slice(hash.as_bytes());
            }
            writer.write_variable_length(&body)?;
        }
        FieldValue::Annotation(_) => return Err(mismatch()),
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

/// Read a field header and resolve it.
fn read_header(reader: &mut BinaryReader<'_>) -> Result<&'static FieldSpec, CodecError> {
    let tag = reader.read_u8()?;
    let mut type_id = tag >> 4;
    if type_id == 0 {
        type_id = reader.read_u8()?;
    }
    let mut field_id = tag & 0x0F;
    if field_id == 0 {
        field_id = reader.read_u8()?;
    }
    field_by_coordinates(type_id, field_id)
}

/// Read one field: header then value.
pub fn read_field(
    reader: &mut BinaryReader<'_>,
) -> Result<(&'static FieldSpec, FieldValue), CodecError> {
    let spec = read_header(reader)?;
    trace!(field = spec.name, remaining = reader.remaining(), "parsing field");

    let value = match spec.type_code {
        TypeCode::UInt8 => FieldValue::UInt8(reader.read_u8()?),
        TypeCode::UInt16 => FieldValue::UInt16(reader.read_u16()?),
        TypeCode::UInt32 => FieldValue::UInt32(reader.read_u32()?),
        TypeCode::UInt64 => FieldValue::UInt64(reader.read_u64()?),
        TypeCode::Hash128 => FieldValue::Hash128(Hash128(reader.read_array()?)),
        TypeCode::Hash160 => FieldValue::Hash160(Hash160(reader.read_array()?)),
        TypeCode::Hash256 => FieldValue::Hash256(Hash256(reader.read_array()?)),
        TypeCode::Amount => FieldValue::Amount(amount::read(reader)?),
        TypeCode::Blob => FieldValue::Blob(reader.read_variable_length()?.to_vec()),
        TypeCode::AccountId => {
            let len = decode_varint(reader)?;
            if len != ACCOUNT_ID_LENGTH {
                return Err(CodecError::NonStandardLength(len));
            }
            FieldValue::Account(AccountId(reader.read_array()?))
        }
        TypeCode::Object => {
            let mut inner = read_nested_object(reader)?;
            if spec.name == "Memo" {
                annotate_memo(&mut inner);
            }
            FieldValue::Object(inner)
        }
        TypeCode::Array => FieldValue::Array(read_array(reader)?),
        TypeCode::PathSet => FieldValue::PathSet(pathset::read(reader)?),
        TypeCode::Vector256 => {
            let len = decode_varint(reader)?;
            if len % Hash256::LEN != 0 {
                return Err(CodecError::InvalidValue(format!(
                    "Vector256 length {len} is not a multiple of 32"
                )));
            }
            let mut hashes = Vec::with_capacity(len / Hash256::LEN);
            for _ in 0..len / Hash256::LEN {
                hashes.push(Hash256(reader.read_array()?));
            }
            FieldValue::Vector256(hashes)
        }
    };
    Ok((spec, value))
}

fn read_nested_object(reader: &mut BinaryReader<'_>) -> Result<StObject, CodecError> {
    let mut object = StObject::new();
    loop {
        match reader.peek() {
            None => return Err(CodecError::UnexpectedEof { needed: 1 }),
            Some(OBJECT_END_MARKER) => {
                reader.read_u8()?;
                return Ok(object);
            }
            Some(_) => {
                let (spec, value) = read_field(reader)?;
                object.insert(spec.name, value);
            }
        }
    }
}

fn read_array(reader: &mut BinaryReader<'_>) -> Result<Vec<StObject>, CodecError> {
    let mut items = Vec::new();
    loop {
        match reader.peek() {
            None => return Err(CodecError::UnexpectedEof { needed: 1 }),
            Some(ARRAY_END_MARKER) => {
                reader.read_u8()?;
                return Ok(items);
            }
            Some(_) => {
                let (spec, value) = read_field(reader)?;
                items.push(StObject::new().with(spec.name, value));
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Memo annotations
// ---------------------------------------------------------------------------

const UNFORMATTED_MEMO: &str = "unformatted_memo";

fn blob_text(memo: &StObject, name: &str) -> Option<String> {
    memo.get_blob(name)
        .and_then(|bytes| String::from_utf8(bytes.to_vec()).ok())
}

/// Decode the memo blobs that hold text so callers don't have to.
fn annotate_memo(memo: &mut StObject) {
    if let Some(memo_type) = blob_text(memo, "MemoType") {
        if memo_type != UNFORMATTED_MEMO {
            memo.insert("parsed_memo_type", FieldValue::Annotation(memo_type.into()));
        }
    }

    let format = blob_text(memo, "MemoFormat");
    if let Some(format) = &format {
        memo.insert(
            "parsed_memo_format",
            FieldValue::Annotation(format.clone().into()),
        );
    }

    let Some(data) = blob_text(memo, "MemoData") else {
        return;
    };
    let parsed = match format.as_deref() {
        Some("json") => serde_json::from_str::<serde_json::Value>(&data).ok(),
        Some("text") => Some(serde_json::Value::String(data)),
        _ => None,
    };
    if let Some(parsed) = parsed {
        memo.insert("parsed_memo_data", FieldValue::Annotation(parsed));
    }
}
