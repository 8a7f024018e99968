//! # Canonical Binary Codec
//!
//! Everything that turns field maps into bytes and bytes into field maps.
//! The layering is strict and leaf-first:
//!
//! - **binary**: varint length prefixes and big-endian integers.
//! - **fields**: the static `(type code, field id)` table.
//! - **types**, **amount**, **pathset**: per-type values and encoders.
//! - **serializer**: canonical ordering, nesting, terminators, hashes.
//! - **json**: the RPC-facing JSON shape of a field map.
//!
//! The byte sequence produced here is what the network hashes to identify a
//! transaction. Any deviation in ordering, padding or packing doesn't give
//! you a "slightly different" transaction, it gives you a different
//! transaction.

pub mod amount;
pub mod binary;
pub mod error;
pub mod fields;
pub mod json;
pub mod pathset;
pub mod serializer;
pub mod types;

pub use amount::{Amount, IssuedAmount, IssuedValue};
pub use binary::{decode_varint, encode_varint, BinaryReader, BinaryWriter};
pub use error::CodecError;
pub use fields::{field_by_coordinates, field_by_name, FieldSpec, TypeCode};
pub use pathset::{PathSet, PathStep};
pub use serializer::{deserialize, serialize, signing_hash, transaction_hash};
pub use types::{AccountId, Currency, FieldValue, Hash128, Hash160, Hash256, StObject};
