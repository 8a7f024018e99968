//! # Key Pairs
//!
//! secp256k1 key pairs for ledger accounts and nodes.
//!
//! A [`KeyPair`] owns a secret scalar and lazily computes its compressed
//! public point on first use. Key pairs come out of a seed's generator
//! (see [`Seed`](super::seed::Seed)) or out of another key pair through
//! [`KeyPair::child`], a BIP32-flavoured derivation:
//!
//! ```text
//! seed ──sha512half(seed ‖ n)──▶ generator ──child(i)──▶ account key i
//!                                             │
//!                             index ≥ 2^31 ──▶ hardened (mixes in the secret)
//! ```
//!
//! Every "hash until the candidate is below the curve order" loop runs
//! with an explicit counter in the hash input and gives up after
//! [`MAX_SCALAR_ATTEMPTS`] tries. In practice the first candidate wins
//! with probability `1 - 2^-128`.
//!
//! ## Secrets
//!
//! `KeyPair` does not implement `Serialize`. Exporting a secret goes
//! through an explicit `to_*` call, and `Debug` prints the address only.

use std::fmt;
use std::sync::OnceLock;

use k256::ecdsa::SigningKey;
use k256::elliptic_curve::PrimeField;
use k256::{FieldBytes, NonZeroScalar, Scalar};
use rand::rngs::OsRng;

use super::base58;
use super::error::DerivationError;
use super::hash::{hash160, sha512_half_parts};
use super::rfc1751;
use crate::codec::AccountId;
use crate::config::{
    HARDENED_OFFSET, MAX_SCALAR_ATTEMPTS, VER_ACCOUNT_PRIVATE, VER_ACCOUNT_PUBLIC,
    VER_BITCOIN_WIF, VER_FAMILY_GENERATOR, VER_NODE_PRIVATE, VER_NODE_PUBLIC,
};

/// Length of a compressed SEC1 public key.
pub const PUBLIC_KEY_LEN: usize = 33;

/// A secp256k1 secret scalar with a lazily cached compressed public key.
pub struct KeyPair {
    secret: SigningKey,
    public: OnceLock<[u8; PUBLIC_KEY_LEN]>,
}

impl KeyPair {
    fn from_signing_key(secret: SigningKey) -> Self {
        Self {
            secret,
            public: OnceLock::new(),
        }
    }

    pub(crate) fn from_scalar(scalar: NonZeroScalar) -> Self {
        Self::from_signing_key(SigningKey::from(scalar))
    }

    /// Fresh key pair from the OS RNG.
    pub fn random() -> Self {
        Self::from_signing_key(SigningKey::random(&mut OsRng))
    }

    /// Key pair from a 32-byte big-endian secret scalar.
    ///
    /// # Errors
    ///
    /// [`DerivationError::InvalidKey`] if the scalar is zero or not below
    /// the curve order.
    pub fn from_secret_bytes(bytes: &[u8; 32]) -> Result<Self, DerivationError> {
        let scalar = scalar_candidate(bytes)
            .ok_or_else(|| DerivationError::InvalidKey("secret outside the curve order".into()))?;
        Ok(Self::from_scalar(scalar))
    }

    /// Key pair from 64 hex characters.
    pub fn from_hex(hex_str: &str) -> Result<Self, DerivationError> {
        let bytes = hex::decode(hex_str)
            .map_err(|e| DerivationError::InvalidKey(format!("bad hex: {e}")))?;
        Self::from_secret_slice(&bytes)
    }

    /// Key pair from its 24-word RFC 1751 rendering.
    pub fn from_words(phrase: &str) -> Result<Self, DerivationError> {
        Self::from_secret_slice(&rfc1751::decode(phrase)?)
    }

    /// Parse any of the accepted secret encodings: 64 hex characters,
    /// base58 node-private, account-private or family-generator keys, a
    /// Bitcoin WIF key, or 24 RFC 1751 words.
    pub fn parse(input: &str) -> Result<Self, DerivationError> {
        let input = input.trim();
        if input.len() == 64 && input.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Self::from_hex(input);
        }
        for version in [VER_NODE_PRIVATE, VER_ACCOUNT_PRIVATE, VER_FAMILY_GENERATOR] {
            if let Ok(bytes) = base58::decode_check(version, input) {
                return Self::from_secret_slice(&bytes);
            }
        }
        if let Ok(bytes) = bs58::decode(input)
            .with_check(Some(VER_BITCOIN_WIF))
            .into_vec()
        {
            return Self::from_secret_slice(bytes.get(1..).unwrap_or_default());
        }
        if rfc1751::is_mnemonic(input) {
            return Self::from_words(input);
        }
        Err(DerivationError::InvalidKey(
            "not a recognized secret key encoding".into(),
        ))
    }

    fn from_secret_slice(bytes: &[u8]) -> Result<Self, DerivationError> {
        let array: [u8; 32] = bytes.try_into().map_err(|_| {
            DerivationError::InvalidKey(format!("secret must be 32 bytes, got {}", bytes.len()))
        })?;
        Self::from_secret_bytes(&array)
    }

    // -- Accessors ----------------------------------------------------------

    pub(crate) fn signing_key(&self) -> &SigningKey {
        &self.secret
    }

    fn scalar(&self) -> Scalar {
        *self.secret.as_nonzero_scalar().as_ref()
    }

    /// The 32-byte big-endian secret scalar. Handle with care.
    pub fn secret_bytes(&self) -> [u8; 32] {
        let mut out = [0u8; 32];
        out.copy_from_slice(&self.secret.to_bytes());
        out
    }

    /// Compressed SEC1 public key, computed once.
    pub fn public_key(&self) -> &[u8; PUBLIC_KEY_LEN] {
        self.public.get_or_init(|| {
            let point = self.secret.verifying_key().to_encoded_point(true);
            let mut out = [0u8; PUBLIC_KEY_LEN];
            out.copy_from_slice(point.as_bytes());
            out
        })
    }

    /// Uppercase hex of the compressed public key.
    pub fn public_key_hex(&self) -> String {
        hex::encode_upper(self.public_key())
    }

    /// Uppercase hex of the secret scalar.
    pub fn secret_hex(&self) -> String {
        hex::encode_upper(self.secret_bytes())
    }

    /// `RIPEMD-160(SHA-256(compressed public key))`.
    pub fn account_id(&self) -> AccountId {
        AccountId::from(hash160(self.public_key()))
    }

    /// The base58 account address, `r…`.
    pub fn address(&self) -> String {
        self.account_id().to_address()
    }

    // -- Encodings ----------------------------------------------------------

    /// Secret as an account-private base58 key (`p…`).
    pub fn to_account_private(&self) -> String {
        base58::encode_check(VER_ACCOUNT_PRIVATE, &self.secret_bytes())
    }

    /// Public key as an account-public base58 key (`a…`).
    pub fn to_account_public(&self) -> String {
        base58::encode_check(VER_ACCOUNT_PUBLIC, self.public_key())
    }

    /// Secret as a node-private base58 key (`p…`).
    pub fn to_node_private(&self) -> String {
        base58::encode_check(VER_NODE_PRIVATE, &self.secret_bytes())
    }

    /// Public key as a node-public base58 key (`n…`).
    pub fn to_node_public(&self) -> String {
        base58::encode_check(VER_NODE_PUBLIC, self.public_key())
    }

    /// Public key with the family-generator version byte (`f…`).
    pub fn to_generator_public(&self) -> String {
        base58::encode_check(VER_FAMILY_GENERATOR, self.public_key())
    }

    /// Bitcoin wallet import format. No compression flag is appended.
    pub fn to_bitcoin_wif(&self) -> String {
        base58::encode_check_bitcoin(VER_BITCOIN_WIF, &self.secret_bytes())
    }

    /// Secret as 24 RFC 1751 words.
    pub fn to_words(&self) -> String {
        // 32 bytes is always a multiple of 8.
        rfc1751::encode(&self.secret_bytes()).unwrap_or_default()
    }

    // -- Derivation ---------------------------------------------------------

    /// Derive the child at `index`.
    ///
    /// Indices at or above 2^31 are hardened: the hash input is the
    /// parent's secret rather than its public key, so the child cannot be
    /// derived from public data alone. `force_hardened` lifts a lower index
    /// into the hardened range.
    ///
    /// # Errors
    ///
    /// [`DerivationError::ScalarSearchExhausted`] if no candidate lands
    /// below the curve order, and [`DerivationError::InvalidKey`] if the
    /// resulting secret is zero.
    pub fn child(&self, index: u32, force_hardened: bool) -> Result<KeyPair, DerivationError> {
        let index = if force_hardened && index < HARDENED_OFFSET {
            index + HARDENED_OFFSET
        } else {
            index
        };
        let secret = self.secret_bytes();
        let chain_seed: &[u8] = if index >= HARDENED_OFFSET {
            &secret
        } else {
            self.public_key()
        };

        let offset = find_scalar(|counter| {
            sha512_half_parts(&[chain_seed, &index.to_be_bytes(), &counter.to_be_bytes()])
        })?;
        let sum = *offset + self.scalar();
        let sum = Option::<NonZeroScalar>::from(NonZeroScalar::new(sum))
            .ok_or_else(|| DerivationError::InvalidKey("child secret is zero".into()))?;
        Ok(Self::from_scalar(sum))
    }
}

/// Run `candidate(counter)` for counter = 0, 1, 2, … until it yields a
/// non-zero scalar below the curve order.
pub(crate) fn find_scalar<F>(mut candidate: F) -> Result<NonZeroScalar, DerivationError>
where
    F: FnMut(u32) -> [u8; 32],
{
    (0..MAX_SCALAR_ATTEMPTS)
        .find_map(|counter| scalar_candidate(&candidate(counter)))
        .ok_or(DerivationError::ScalarSearchExhausted(MAX_SCALAR_ATTEMPTS))
}

fn scalar_candidate(bytes: &[u8; 32]) -> Option<NonZeroScalar> {
    let scalar = Option::<Scalar>::from(Scalar::from_repr(FieldBytes::from(*bytes)))?;
    Option::from(NonZeroScalar::new(scalar))
}

impl Clone for KeyPair {
    fn clone(&self) -> Self {
        Self {
            secret: self.secret.clone(),
            public: self.public.clone(),
        }
    }
}

impl PartialEq for KeyPair {
    fn eq(&self, other: &Self) -> bool {
        self.public_key() == other.public_key()
    }
}

impl Eq for KeyPair {}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyPair({})", self.address())
    }
}
