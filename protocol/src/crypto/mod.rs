//! # Cryptographic Primitives
//!
//! Everything that touches key material or digests lives here:
//!
//! - **Hashes**: SHA-256, SHA-512-half, RIPEMD-160 and their compositions.
//! - **Base58Check** with the ledger's alphabet and version bytes.
//! - **RFC 1751** word encodings for seeds and secrets.
//! - **Seeds** and the family generator that turns them into accounts.
//! - **Key pairs** on secp256k1 with BIP32-style child derivation.
//! - **ECDSA** signing and verification over 256-bit hashes.
//! - **Crypto-conditions**: DER conditions and fulfillments for escrows.
//!
//! All of it is a thin layer over `k256`, `sha2`, `ripemd` and `bs58`.
//! Nothing in here is async and nothing here does I/O.

pub mod base58;
pub mod condition;
pub mod error;
pub mod hash;
pub mod keys;
pub mod rfc1751;
pub mod seed;
pub mod signatures;

pub use condition::{Condition, ConditionType, Fulfillment, SubtypeSet};
pub use error::{ConditionError, DerivationError};
pub use hash::{double_sha256, hash160, ripemd160, sha256, sha512, sha512_half};
pub use keys::KeyPair;
pub use seed::{KeySelector, Seed};
pub use signatures::{sign, verify};
