//! # Hashing Utilities
//!
//! The handful of digests the ledger is built on:
//!
//! - **SHA-512-half**: the first 32 bytes of SHA-512. Transaction IDs,
//!   signing hashes, and every step of key derivation.
//! - **SHA-256**: base58 checksums (doubled) and the first half of
//!   account-ID hashing.
//! - **RIPEMD-160**: the second half of account-ID hashing.
//!
//! Everything returns fixed-size arrays so the length travels in the type.

use ripemd::Ripemd160;
use sha2::{Digest, Sha256, Sha512};

/// SHA-256 of the input.
///
/// # Example
///
/// ```
/// use rivet_protocol::crypto::sha256;
///
/// let hash = sha256(b"ledger");
/// assert_eq!(hash.len(), 32);
/// ```
pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// `SHA-256(SHA-256(data))`, the base58check checksum hash.
pub fn double_sha256(data: &[u8]) -> [u8; 32] {
    sha256(&sha256(data))
}

/// Full 64-byte SHA-512.
pub fn sha512(data: &[u8]) -> [u8; 64] {
    Sha512::digest(data).into()
}

/// First 32 bytes of SHA-512.
pub fn sha512_half(data: &[u8]) -> [u8; 32] {
    sha512_half_parts(&[data])
}

/// SHA-512-half over the concatenation of `parts`, without building the
/// concatenation.
pub fn sha512_half_parts(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Sha512::new();
    for part in parts {
        hasher.update(part);
    }
    let digest = hasher.finalize();
    let mut half = [0u8; 32];
    half.copy_from_slice(&digest[..32]);
    half
}

/// RIPEMD-160 of the input.
pub fn ripemd160(data: &[u8]) -> [u8; 20] {
    Ripemd160::digest(data).into()
}

/// `RIPEMD-160(SHA-256(data))`: public key to account ID.
pub fn hash160(data: &[u8]) -> [u8; 20] {
    ripemd160(&sha256(data))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_known_vector() {
        assert_eq!(
            hex::encode(sha256(b"abc")),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn sha512_half_is_prefix_of_sha512() {
        let full = sha512(b"abc");
        assert_eq!(sha512_half(b"abc"), full[..32]);
        assert_eq!(
            hex::encode(sha512_half(b"abc")),
            "ddaf35a193617abacc417349ae20413112e6fa4e89a97ea20a9eeee64b55d39a"
        );
    }

    #[test]
    fn parts_hash_matches_concatenation() {
        assert_eq!(
            sha512_half_parts(&[b"ab", b"", b"c"]),
            sha512_half(b"abc")
        );
    }

    #[test]
    fn ripemd160_known_vector() {
        assert_eq!(
            hex::encode(ripemd160(b"abc")),
            "8eb208f7e05d987a9b044a8e98c6b087f15a0bfc"
        );
    }

    #[test]
    fn double_sha256_differs_from_single() {
        assert_ne!(double_sha256(b"abc"), sha256(b"abc"));
        assert_eq!(double_sha256(b"abc"), sha256(&sha256(b"abc")));
    }
}
