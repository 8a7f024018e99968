//! # Base58Check
//!
//! Versioned base58check with the ledger alphabet: one version byte, the
//! payload, and the first four bytes of the double SHA-256 of both. The
//! version byte determines the leading character, so addresses start with
//! `r`, seeds with `s`, node keys with `n`.
//!
//! Bitcoin's alphabet is kept around for exporting WIF keys.

use bs58::Alphabet;

use super::error::DerivationError;

/// Encode `version || payload || checksum` with the ledger alphabet.
pub fn encode_check(version: u8, payload: &[u8]) -> String {
    bs58::encode(payload)
        .with_alphabet(Alphabet::RIPPLE)
        .with_check_version(version)
        .into_string()
}

/// Encode `version || payload || checksum` with Bitcoin's alphabet.
pub fn encode_check_bitcoin(version: u8, payload: &[u8]) -> String {
    bs58::encode(payload)
        .with_alphabet(Alphabet::BITCOIN)
        .with_check_version(version)
        .into_string()
}

/// Decode and verify a ledger-alphabet string, returning the payload
/// without its version byte.
///
/// # Errors
///
/// [`DerivationError::Checksum`] on a checksum mismatch and
/// [`DerivationError::InvalidEncoding`] for bad characters or a version
/// byte other than `version`.
pub fn decode_check(version: u8, encoded: &str) -> Result<Vec<u8>, DerivationError> {
    let decoded = bs58::decode(encoded)
        .with_alphabet(Alphabet::RIPPLE)
        .with_check(Some(version))
        .into_vec()
        .map_err(|e| match e {
            bs58::decode::Error::InvalidChecksum { .. } => DerivationError::Checksum,
            other => DerivationError::InvalidEncoding(other.to_string()),
        })?;
    match decoded.split_first() {
        Some((_, payload)) => Ok(payload.to_vec()),
        None => Err(DerivationError::InvalidEncoding("empty payload".into())),
    }
}
