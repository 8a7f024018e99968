//! Error types for key derivation, encodings, signing and crypto-conditions.
//!
//! Messages never include secret material. The one exception is
//! [`DerivationError::TooManyAttempts`], which names the seed the caller
//! handed in, and only in its public base58 form.

use thiserror::Error;

/// Errors raised while parsing seeds and keys or deriving key pairs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DerivationError {
    #[error("invalid seed: {0}")]
    InvalidSeed(String),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("invalid encoding: {0}")]
    InvalidEncoding(String),

    #[error("checksum mismatch in base58 payload")]
    Checksum,

    #[error("mnemonic parity check failed for word group {0}")]
    MnemonicParity(usize),

    #[error("unknown mnemonic word {0:?}")]
    UnknownWord(String),

    #[error("too many loops looking for a key pair yielding {address} from {seed}")]
    TooManyAttempts { address: String, seed: String },

    #[error("no scalar below the curve order after {0} attempts")]
    ScalarSearchExhausted(u32),

    #[error("signing failed: {0}")]
    Signing(String),
}

/// Errors raised while decoding crypto-condition DER.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConditionError {
    #[error("unexpected end of DER input")]
    UnexpectedEof,

    #[error("expected tag {expected:#04x}, found {found:#04x}")]
    UnexpectedTag { expected: u8, found: u8 },

    #[error("unknown condition type {0}")]
    UnknownType(u8),

    #[error("length is not in minimal DER form")]
    InvalidLength,

    #[error("integer is negative, too large or not minimally encoded")]
    InvalidInteger,

    #[error("malformed subtypes bit string")]
    InvalidBitString,

    #[error("{0}")]
    InvalidField(String),

    #[error("{0} trailing bytes after DER value")]
    TrailingBytes(usize),

    #[error("fulfillment nested deeper than {0} levels")]
    TooDeep(usize),
}
