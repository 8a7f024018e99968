//! Error type for the codec layer.
//!
//! Every variant is a local failure: the input was malformed or the value
//! does not fit the wire format. Nothing here is ever retried.

use thiserror::Error;

/// Errors raised while serializing or deserializing canonical objects.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("overflow: {0}")]
    Overflow(String),

    #[error("invalid length prefix byte {0:#04x}")]
    InvalidLength(u8),

    #[error("invalid value: {0}")]
    InvalidValue(String),

    #[error("invalid hash: {0}")]
    InvalidHash(String),

    #[error("unknown field: {0}")]
    UnknownField(String),

    #[error("unknown field coordinates: type {type_id}, field {field_id}")]
    UnknownFieldId { type_id: u8, field_id: u8 },

    #[error("non-standard length {0} for a 160-bit account id")]
    NonStandardLength(usize),

    #[error("field {field} expects a {expected} value")]
    TypeMismatch {
        field: String,
        expected: &'static str,
    },

    #[error("unexpected end of input: needed {needed} more byte(s)")]
    UnexpectedEof { needed: usize },

    #[error("invalid path entry: a step must carry an account, currency or issuer")]
    InvalidPathEntry,

    #[error("array elements must be single-field objects, found {0} fields")]
    ArrayElement(usize),

    #[error("{0} trailing byte(s) after the last field")]
    TrailingBytes(usize),

    #[error("invalid JSON for {field}: {reason}")]
    InvalidJson { field: String, reason: String },
}
