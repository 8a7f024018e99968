//! # ECDSA Signatures
//!
//! Signing and verification of 256-bit hashes with secp256k1.
//!
//! Nonces are deterministic (RFC 6979) and every signature is put in
//! low-S form before DER encoding. The network rejects high-S signatures
//! as malleable, so [`verify`] rejects them too.
//!
//! Signing is synchronous and never touches the network.

use k256::ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use k256::ecdsa::{Signature, VerifyingKey};

use super::error::DerivationError;
use super::keys::KeyPair;

/// Sign a 256-bit hash and return the DER-encoded low-S signature.
///
/// # Example
///
/// ```
/// use rivet_protocol::crypto::{sign, verify, KeyPair};
///
/// let key = KeyPair::random();
/// let hash = [7u8; 32];
/// let der = sign(&key, &hash).unwrap();
/// assert!(verify(key.public_key(), &hash, &der));
/// ```
pub fn sign(key: &KeyPair, hash: &[u8; 32]) -> Result<Vec<u8>, DerivationError> {
    let signature: Signature = key
        .signing_key()
        .sign_prehash(hash)
        .map_err(|e| DerivationError::Signing(e.to_string()))?;
    let signature = signature.normalize_s().unwrap_or(signature);
    Ok(signature.to_der().as_bytes().to_vec())
}

/// Check a DER signature over `hash` against a compressed or uncompressed
/// SEC1 public key. Any malformed input is simply `false`.
pub fn verify(public_key: &[u8], hash: &[u8], der: &[u8]) -> bool {
    let Ok(verifying_key) = VerifyingKey::from_sec1_bytes(public_key) else {
        return false;
    };
    let Ok(signature) = Signature::from_der(der) else {
        return false;
    };
    if signature.normalize_s().is_some() {
        return false;
    }
    verifying_key.verify_prehash(hash, &signature).is_ok()
}

impl KeyPair {
    /// Shorthand for [`sign`].
    pub fn sign(&self, hash: &[u8; 32]) -> Result<Vec<u8>, DerivationError> {
        sign(self, hash)
    }
}
