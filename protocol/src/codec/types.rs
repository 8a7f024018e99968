//! # Field Values
//!
//! The closed set of values a canonical object can hold, plus the object
//! itself.
//!
//! [`FieldValue`] has one variant per wire type. Nothing is dynamically
//! typed: a field map that claims `Sequence` is a `Hash256` is caught at
//! serialization time with [`CodecError::TypeMismatch`], not silently
//! encoded as garbage. The one escape hatch is [`FieldValue::Annotation`],
//! which carries arbitrary JSON under a lowercase key and is never written
//! to the wire.

use std::fmt;
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use super::amount::Amount;
use super::error::CodecError;
use super::fields::TypeCode;
use super::pathset::PathSet;
use crate::config::{NATIVE_CURRENCY, VER_ACCOUNT_ID};
use crate::crypto::base58;

// ---------------------------------------------------------------------------
// Fixed-width hashes
// ---------------------------------------------------------------------------

macro_rules! fixed_hash {
    ($(#[$meta:meta])* $name:ident, $len:expr) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
        pub struct $name(pub [u8; $len]);

        impl $name {
            pub const LEN: usize = $len;
            pub const ZERO: Self = Self([0u8; $len]);

            /// Copy from a slice of exactly the right length.
            pub fn from_slice(bytes: &[u8]) -> Result<Self, CodecError> {
                let array: [u8; $len] = bytes.try_into().map_err(|_| {
                    CodecError::InvalidHash(format!(
                        "{} expects {} bytes, got {}",
                        stringify!($name),
                        $len,
                        bytes.len()
                    ))
                })?;
                Ok(Self(array))
            }

            /// Parse from hex, either case.
            pub fn from_hex(s: &str) -> Result<Self, CodecError> {
                let bytes = hex::decode(s).map_err(|e| {
                    CodecError::InvalidHash(format!("{}: {e}", stringify!($name)))
                })?;
                Self::from_slice(&bytes)
            }

            /// Uppercase hex, the form the network prints.
            pub fn to_hex(&self) -> String {
                hex::encode_upper(self.0)
            }

            pub fn as_bytes(&self) -> &[u8] {
                &self.0
            }

            pub fn is_zero(&self) -> bool {
                self.0.iter().all(|b| *b == 0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.to_hex())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.to_hex())
            }
        }

        impl FromStr for $name {
            type Err = CodecError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::from_hex(s)
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }

        impl From<[u8; $len]> for $name {
            fn from(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_hex())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                Self::from_hex(&s).map_err(de::Error::custom)
            }
        }
    };
}

fixed_hash!(
    /// 128-bit hash (`EmailHash`).
    Hash128,
    16
);
fixed_hash!(
    /// 160-bit hash (order-book currency and issuer fields).
    Hash160,
    20
);
fixed_hash!(
    /// 256-bit hash: transaction IDs, ledger hashes, object indices.
    Hash256,
    32
);

// ---------------------------------------------------------------------------
// AccountId
// ---------------------------------------------------------------------------

/// A 160-bit account identifier, rendered as a base58 `r...` address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct AccountId(pub [u8; 20]);

impl AccountId {
    /// Parse a base58 address.
    pub fn from_address(address: &str) -> Result<Self, CodecError> {
        let payload = base58::decode_check(VER_ACCOUNT_ID, address)
            .map_err(|e| CodecError::InvalidHash(format!("address {address:?}: {e}")))?;
        let array: [u8; 20] = payload
            .as_slice()
            .try_into()
            .map_err(|_| CodecError::NonStandardLength(payload.len()))?;
        Ok(Self(array))
    }

    pub fn to_address(&self) -> String {
        base58::encode_check(VER_ACCOUNT_ID, &self.0)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_address())
    }
}

impl fmt::Debug for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccountId({})", self.to_address())
    }
}

impl FromStr for AccountId {
    type Err = CodecError;

    /// Accepts an address or forty hex digits.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() == 40 && s.chars().all(|c| c.is_ascii_hexdigit()) {
            return Hash160::from_hex(s).map(|h| Self(h.0));
        }
        Self::from_address(s)
    }
}

impl From<[u8; 20]> for AccountId {
    fn from(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }
}

impl Serialize for AccountId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_address())
    }
}

impl<'de> Deserialize<'de> for AccountId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Currency
// ---------------------------------------------------------------------------

/// A 160-bit currency code.
///
/// Standard three-character codes sit in bytes 12..15 with everything else
/// zero. The native currency is all zeros. Anything else is an opaque
/// 160-bit value shown as hex.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Currency(pub [u8; 20]);

impl Currency {
    pub const NATIVE: Self = Self([0u8; 20]);

    /// Build from a three-character code, the native code, or forty hex
    /// digits.
    pub fn from_code(code: &str) -> Result<Self, CodecError> {
        if code == NATIVE_CURRENCY {
            return Ok(Self::NATIVE);
        }
        if code.len() == 40 {
            return Hash160::from_hex(code).map(|h| Self(h.0));
        }
        let bytes = code.as_bytes();
        if bytes.len() != 3 || !bytes.iter().all(|b| b.is_ascii_graphic()) {
            return Err(CodecError::InvalidValue(format!(
                "currency code {code:?} is neither three characters nor 40 hex digits"
            )));
        }
        let mut out = [0u8; 20];
        out[12..15].copy_from_slice(bytes);
        Ok(Self(out))
    }

    pub fn is_native(&self) -> bool {
        self.0 == [0u8; 20]
    }

    /// The three-character code when the currency uses the standard layout.
    pub fn standard_code(&self) -> Option<&str> {
        let standard = self.0[..12].iter().all(|b| *b == 0)
            && self.0[15..].iter().all(|b| *b == 0)
            && self.0[12..15].iter().all(|b| b.is_ascii_graphic());
        if standard {
            std::str::from_utf8(&self.0[12..15]).ok()
        } else {
            None
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_native() {
            return f.write_str(NATIVE_CURRENCY);
        }
        match self.standard_code() {
            Some(code) => f.write_str(code),
            None => f.write_str(&hex::encode_upper(self.0)),
        }
    }
}

impl fmt::Debug for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Currency({self})")
    }
}

impl FromStr for Currency {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_code(s)
    }
}

impl Serialize for Currency {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Currency {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_code(&s).map_err(de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// FieldValue
// ---------------------------------------------------------------------------

/// The value of one field in a canonical object.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    UInt8(u8),
    UInt16(u16),
    UInt32(u32),
    UInt64(u64),
    Hash128(Hash128),
    Hash160(Hash160),
    Hash256(Hash256),
    Amount(Amount),
    Blob(Vec<u8>),
    Account(AccountId),
    Object(StObject),
    /// Every element is a single-field object.
    Array(Vec<StObject>),
    PathSet(PathSet),
    Vector256(Vec<Hash256>),
    /// Local, non-serialized data under a lowercase key.
    Annotation(serde_json::Value),
}

impl FieldValue {
    /// The wire type this value encodes as. `None` for annotations.
    pub fn type_code(&self) -> Option<TypeCode> {
        Some(match self {
            Self::UInt8(_) => TypeCode::UInt8,
            Self::UInt16(_) => TypeCode::UInt16,
            Self::UInt32(_) => TypeCode::UInt32,
            Self::UInt64(_) => TypeCode::UInt64,
            Self::Hash128(_) => TypeCode::Hash128,
            Self::Hash160(_) => TypeCode::Hash160,
            Self::Hash256(_) => TypeCode::Hash256,
            Self::Amount(_) => TypeCode::Amount,
            Self::Blob(_) => TypeCode::Blob,
            Self::Account(_) => TypeCode::AccountId,
            Self::Object(_) => TypeCode::Object,
            Self::Array(_) => TypeCode::Array,
            Self::PathSet(_) => TypeCode::PathSet,
            Self::Vector256(_) => TypeCode::Vector256,
            Self::Annotation(_) => return None,
        })
    }
}

macro_rules! impl_from_value {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(impl From<$ty> for FieldValue {
            fn from(value: $ty) -> Self {
                Self::$variant(value)
            }
        })*
    };
}

impl_from_value! {
    u8 => UInt8,
    u16 => UInt16,
    u32 => UInt32,
    u64 => UInt64,
    Hash128 => Hash128,
    Hash160 => Hash160,
    Hash256 => Hash256,
    Amount => Amount,
    Vec<u8> => Blob,
    AccountId => Account,
    StObject => Object,
    Vec<StObject> => Array,
    PathSet => PathSet,
}

// ---------------------------------------------------------------------------
// StObject
// ---------------------------------------------------------------------------

/// A field map.
///
/// Fields keep the order they were inserted in. That order is irrelevant to
/// the wire form (the serializer sorts by coordinates) and is ignored by
/// equality.
#[derive(Debug, Clone, Default)]
pub struct StObject {
    fields: Vec<(String, FieldValue)>,
}

impl StObject {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.insert(name, value);
        self
    }

    /// Insert or replace a field, returning the previous value.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        value: impl Into<FieldValue>,
    ) -> Option<FieldValue> {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                self.fields.push((name, value));
                None
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut FieldValue> {
        self.fields
            .iter_mut()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    pub fn remove(&mut self, name: &str) -> Option<FieldValue> {
        let index = self.fields.iter().position(|(n, _)| n == name)?;
        Some(self.fields.remove(index).1)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// A copy with every lowercase annotation removed, recursively.
    pub fn without_annotations(&self) -> Self {
        let fields = self
            .fields
            .iter()
            .filter(|(name, _)| !super::fields::is_annotation(name))
            .map(|(name, value)| {
                let value = match value {
                    FieldValue::Object(inner) => FieldValue::Object(inner.without_annotations()),
                    FieldValue::Array(items) => FieldValue::Array(
                        items.iter().map(StObject::without_annotations).collect(),
                    ),
                    other => other.clone(),
                };
                (name.clone(), value)
            })
            .collect();
        Self { fields }
    }

    // -- Typed accessors ----------------------------------------------------

    pub fn get_u32(&self, name: &str) -> Option<u32> {
        match self.get(name)? {
            FieldValue::UInt32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn get_account(&self, name: &str) -> Option<AccountId> {
        match self.get(name)? {
            FieldValue::Account(v) => Some(*v),
            _ => None,
        }
    }

    pub fn get_amount(&self, name: &str) -> Option<&Amount> {
        match self.get(name)? {
            FieldValue::Amount(v) => Some(v),
            _ => None,
        }
    }

    pub fn get_blob(&self, name: &str) -> Option<&[u8]> {
        match self.get(name)? {
            FieldValue::Blob(v) => Some(v),
            _ => None,
        }
    }

    pub fn get_hash256(&self, name: &str) -> Option<Hash256> {
        match self.get(name)? {
            FieldValue::Hash256(v) => Some(*v),
            _ => None,
        }
    }
}

impl PartialEq for StObject {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .iter()
                .all(|(name, value)| other.get(name) == Some(value))
    }
}

impl FromIterator<(String, FieldValue)> for StObject {
    fn from_iter<I: IntoIterator<Item = (String, FieldValue)>>(iter: I) -> Self {
        let mut object = Self::new();
        for (name, value) in iter {
            object.insert(name, value);
        }
        object
    }
}
