//! # Protocol Configuration & Constants
//!
//! Every magic number the client needs to talk to the ledger lives here:
//! base58 version bytes, hash prefixes, wire markers, and the defaults the
//! transaction lifecycle starts from.
//!
//! Most of these values are fixed by the network. Changing a version byte
//! or a hash prefix does not make the client "configurable", it makes it
//! incompatible, so treat this file as read-only unless the network itself
//! changes.

// ---------------------------------------------------------------------------
// Base58 Version Bytes
// ---------------------------------------------------------------------------

/// Account addresses (`r...`).
pub const VER_ACCOUNT_ID: u8 = 0;

/// Node public keys (`n...`). Also used to render a seed's generator.
pub const VER_NODE_PUBLIC: u8 = 28;

/// Node private keys (`p...`).
pub const VER_NODE_PRIVATE: u8 = 32;

/// Family seeds (`s...`).
pub const VER_FAMILY_SEED: u8 = 33;

/// Account private keys (`p...`).
pub const VER_ACCOUNT_PRIVATE: u8 = 34;

/// Account public keys (`a...`).
pub const VER_ACCOUNT_PUBLIC: u8 = 35;

/// Family generators.
pub const VER_FAMILY_GENERATOR: u8 = 41;

/// Bitcoin wallet-import-format, rendered with the Bitcoin alphabet.
pub const VER_BITCOIN_WIF: u8 = 128;

/// The ledger's base58 alphabet. Same 58 characters as Bitcoin's, shuffled
/// so that account addresses start with `r`.
pub const LEDGER_ALPHABET: &[u8; 58] =
    b"rpshnaf39wBUDNEGHJKLM4PQRST7VWXYZ2bcdeCg65jkm8oFqi1tuvAxyz";

// ---------------------------------------------------------------------------
// Hash Prefixes
// ---------------------------------------------------------------------------

/// Prefix for the transaction ID hash: `"TXN\0"`.
pub const HASH_PREFIX_TRANSACTION_ID: u32 = 0x5458_4E00;

/// Prefix for the single-signer signing hash: `"STX\0"`.
pub const HASH_PREFIX_TRANSACTION_SIGN: u32 = 0x5354_5800;

/// Prefix for transaction + metadata ledger nodes: `"SND\0"`.
pub const HASH_PREFIX_TRANSACTION_NODE: u32 = 0x534E_4400;

// ---------------------------------------------------------------------------
// Wire Markers
// ---------------------------------------------------------------------------

/// Terminates a nested object.
pub const OBJECT_END_MARKER: u8 = 0xE1;

/// Terminates an array of single-field objects.
pub const ARRAY_END_MARKER: u8 = 0xF1;

/// Separates path alternatives inside a PathSet.
pub const PATH_SEPARATOR: u8 = 0xFF;

/// Terminates a PathSet.
pub const PATHSET_END: u8 = 0x00;

/// Largest length the three-tier varint encoder accepts.
pub const VARINT_MAX: usize = 918_744;

// ---------------------------------------------------------------------------
// Native Currency
// ---------------------------------------------------------------------------

/// Display code of the native currency. On the wire it is twenty zero bytes.
pub const NATIVE_CURRENCY: &str = "XRP";

/// Hard ceiling on native drops in existence (10^17).
pub const MAX_NATIVE_DROPS: u64 = 100_000_000_000_000_000;

// ---------------------------------------------------------------------------
// Key Derivation
// ---------------------------------------------------------------------------

/// Seeds carry 128 bits of entropy.
pub const SEED_LENGTH: usize = 16;

/// Child indices at or above this value derive hardened children.
pub const HARDENED_OFFSET: u32 = 0x8000_0000;

/// Upper bound on the "retry until the scalar is in range" loops. A candidate
/// lands outside `[1, n)` with probability around 2^-128, so hitting this cap
/// means something is broken, not unlucky.
pub const MAX_SCALAR_ATTEMPTS: u32 = 256;

/// Default number of account indices scanned when looking for an address.
pub const DEFAULT_MAX_LOOPS: u32 = 1;

// ---------------------------------------------------------------------------
// Crypto-Conditions
// ---------------------------------------------------------------------------

/// Cost added per subcondition of a prefix or threshold condition.
pub const COMPOUND_CONDITION_COST: u64 = 1024;

/// Fixed cost of an Ed25519 condition.
pub const ED25519_CONDITION_COST: u64 = 131_072;

/// Nesting limit when decoding prefix and threshold fulfillments.
pub const CONDITION_MAX_DEPTH: usize = 32;

// ---------------------------------------------------------------------------
// Transaction Lifecycle Defaults
// ---------------------------------------------------------------------------

/// Ledgers a submission stays valid for before `LastLedgerSequence` expires it.
pub const DEFAULT_LAST_LEDGER_OFFSET: u32 = 3;

/// Submission attempts before a transaction fails with `tejAttemptsExceeded`.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

/// Fee ceiling in drops.
pub const DEFAULT_MAX_FEE: u64 = 1_000_000;

/// Fee units charged for a plain transaction.
pub const DEFAULT_FEE_UNITS: u64 = 10;

/// Multiplier applied on top of the server-reported load fee.
pub const DEFAULT_FEE_CUSHION: f64 = 1.2;

/// Ledgers that must close after a submission before it is retried.
pub const DEFAULT_RESUBMIT_WAIT_LEDGERS: u32 = 1;

/// Validated transactions remembered while no matching submission exists.
pub const DEFAULT_RECEIVED_CACHE_SIZE: usize = 100;

/// Page size used when replaying account history after a reconnect.
pub const DEFAULT_HISTORY_PAGE_LIMIT: u32 = 20;

/// Sequence number of an account that has never been funded.
pub const UNFUNDED_ACCOUNT_SEQUENCE: u32 = 1;

// ---------------------------------------------------------------------------
// Engine Result Codes (client side)
// ---------------------------------------------------------------------------

/// Raised locally when a transaction runs out of submission attempts.
pub const TEJ_ATTEMPTS_EXCEEDED: &str = "tejAttemptsExceeded";

/// Raised locally when a closed ledger passes `LastLedgerSequence`.
pub const TEJ_MAX_LEDGER: &str = "tejMaxLedger";

/// The validated-success code.
pub const TES_SUCCESS: &str = "tesSUCCESS";
