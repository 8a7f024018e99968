// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Rivet Protocol: Client-Side Ledger Engine
//!
//! Rivet is the part of a ledger client that has to be exactly right and
//! has no business being clever: turning transactions into the bytes the
//! network hashes and signs, turning secrets into accounts, and shepherding
//! a signed transaction until the network has made up its mind about it.
//!
//! ## Architecture
//!
//! - **codec**: Canonical binary format. Varints, typed fields, amounts,
//!   path sets, whole objects, and the JSON shape the RPC layer speaks.
//! - **crypto**: secp256k1 keys, seed-to-account derivation, Base58Check,
//!   RFC 1751 words, ECDSA over SHA-512-half digests.
//! - **transaction**: The per-account lifecycle manager. Sequences, fees,
//!   signing, resubmission, expiry, reconciliation.
//! - **config**: Wire constants, version bytes, lifecycle defaults.
//!
//! ## Ground Rules
//!
//! 1. Byte-exact or bust. Anything that feeds a hash has tests against
//!    known vectors.
//! 2. No I/O below `transaction`. The network lives behind a trait the
//!    caller implements.
//! 3. Errors are values. Library code does not panic on bad input.

/// Crate version, as built.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod codec;
pub mod config;
pub mod crypto;
pub mod transaction;

pub use codec::{AccountId, Amount, CodecError, FieldValue, Hash256, StObject};
pub use crypto::{DerivationError, KeyPair, KeySelector, Seed};
pub use transaction::{
    LifecycleError, ManagerConfig, ManagerHandle, NetworkEvent, TransactionEvent,
    TransactionHandle, TransactionManager, Transport,
};
