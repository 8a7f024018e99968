//! # Seeds
//!
//! A [`Seed`] is 16 bytes of entropy and the root of an account family.
//! It owns no keys. Keys come out of it through the generator:
//!
//! 1. `generator = first scalar < n of sha512half(seed ‖ counter)`
//! 2. `account key i = generator.child(i)`
//!
//! Seeds are accepted in four textual shapes, tried in this order:
//!
//! | Shape                        | Example                              |
//! |------------------------------|--------------------------------------|
//! | base58 family seed           | `snoPBrXtMeMyMHUVTgbuqAfg1SUTb`      |
//! | 32 hex characters            | `DEDCE9CE67B451D852FD4E846FCDE31C`   |
//! | RFC 1751 words (uppercase)   | `SLEW TALK DINT RIDE WET TINE …`     |
//! | anything else: a passphrase  | `masterpassphrase`                   |
//!
//! A passphrase seed is the first 16 bytes of SHA-512 of its UTF-8.

use std::fmt;
use std::str::FromStr;

use rand::rngs::OsRng;
use rand::RngCore;

use super::base58;
use super::error::DerivationError;
use super::hash::{sha512, sha512_half_parts};
use super::keys::{find_scalar, KeyPair};
use super::rfc1751;
use crate::codec::AccountId;
use crate::config::{DEFAULT_MAX_LOOPS, SEED_LENGTH, VER_FAMILY_SEED};

/// Which account key [`Seed::get_key`] should return.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySelector {
    /// Account number `n`, counted from zero.
    Account(u32),
    /// The first account whose address matches.
    Address(AccountId),
}

impl Default for KeySelector {
    fn default() -> Self {
        KeySelector::Account(0)
    }
}

/// 16 bytes of seed entropy.
#[derive(Clone, PartialEq, Eq)]
pub struct Seed([u8; SEED_LENGTH]);

impl Seed {
    pub fn from_bytes(bytes: [u8; SEED_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Fresh seed from the OS RNG.
    pub fn random() -> Self {
        let mut bytes = [0u8; SEED_LENGTH];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// First 16 bytes of SHA-512 over the passphrase.
    pub fn from_passphrase(passphrase: &str) -> Self {
        let digest = sha512(passphrase.as_bytes());
        let mut bytes = [0u8; SEED_LENGTH];
        bytes.copy_from_slice(&digest[..SEED_LENGTH]);
        Self(bytes)
    }

    pub fn from_base58(encoded: &str) -> Result<Self, DerivationError> {
        let payload = base58::decode_check(VER_FAMILY_SEED, encoded)?;
        Self::from_slice(&payload)
    }

    pub fn from_hex(hex_str: &str) -> Result<Self, DerivationError> {
        let bytes = hex::decode(hex_str)
            .map_err(|e| DerivationError::InvalidSeed(format!("bad hex: {e}")))?;
        Self::from_slice(&bytes)
    }

    /// Seed from twelve RFC 1751 words.
    pub fn from_words(phrase: &str) -> Result<Self, DerivationError> {
        Self::from_slice(&rfc1751::decode(phrase)?)
    }

    fn from_slice(bytes: &[u8]) -> Result<Self, DerivationError> {
        bytes.try_into().map(Self).map_err(|_| {
            DerivationError::InvalidSeed(format!(
                "seed must be {SEED_LENGTH} bytes, got {}",
                bytes.len()
            ))
        })
    }

    /// Parse any accepted seed shape; see the module docs for the order.
    ///
    /// # Errors
    ///
    /// Input starting with `s` must be a valid base58 family seed, and
    /// input shaped like uppercase words must be a valid mnemonic. Empty
    /// input is rejected. Everything else is taken as a passphrase.
    pub fn parse(input: &str) -> Result<Self, DerivationError> {
        if input.is_empty() {
            return Err(DerivationError::InvalidSeed("empty input".into()));
        }
        if input.starts_with('s') {
            return Self::from_base58(input);
        }
        if input.len() == 32 && input.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Self::from_hex(input);
        }
        if looks_like_words(input) {
            return Self::from_words(input);
        }
        Ok(Self::from_passphrase(input))
    }

    pub fn as_bytes(&self) -> &[u8; SEED_LENGTH] {
        &self.0
    }

    /// Base58 family seed, `s…`.
    pub fn to_base58(&self) -> String {
        base58::encode_check(VER_FAMILY_SEED, &self.0)
    }

    pub fn to_hex(&self) -> String {
        hex::encode_upper(self.0)
    }

    /// Twelve RFC 1751 words.
    pub fn to_words(&self) -> String {
        // 16 bytes is always a multiple of 8.
        rfc1751::encode(&self.0).unwrap_or_default()
    }

    // -- Derivation ---------------------------------------------------------

    /// The family generator key pair.
    pub fn generator(&self) -> Result<KeyPair, DerivationError> {
        let scalar = find_scalar(|counter| sha512_half_parts(&[&self.0, &counter.to_be_bytes()]))?;
        Ok(KeyPair::from_scalar(scalar))
    }

    /// Account zero's key pair.
    pub fn key(&self) -> Result<KeyPair, DerivationError> {
        self.get_key(&KeySelector::default(), DEFAULT_MAX_LOOPS)
    }

    /// Select an account key.
    ///
    /// For [`KeySelector::Address`] accounts `0..max_loops` are tried in
    /// turn; a `max_loops` of zero is treated as one.
    ///
    /// # Errors
    ///
    /// [`DerivationError::TooManyAttempts`] when no account in range
    /// matches the address.
    pub fn get_key(
        &self,
        selector: &KeySelector,
        max_loops: u32,
    ) -> Result<KeyPair, DerivationError> {
        let generator = self.generator()?;
        match selector {
            KeySelector::Account(index) => generator.child(*index, false),
            KeySelector::Address(address) => {
                for index in 0..max_loops.max(1) {
                    let key = generator.child(index, false)?;
                    if key.account_id() == *address {
                        return Ok(key);
                    }
                }
                Err(DerivationError::TooManyAttempts {
                    address: address.to_address(),
                    seed: self.to_base58(),
                })
            }
        }
    }
}

/// Uppercase words of one to four letters separated by spaces.
fn looks_like_words(input: &str) -> bool {
    let mut words = 0usize;
    for word in input.split(' ') {
        if word.is_empty() {
            // Runs of spaces between words are fine, edges are not.
            if words == 0 {
                return false;
            }
            continue;
        }
        if word.len() > 4 || !word.bytes().all(|b| b.is_ascii_uppercase()) {
            return false;
        }
        words += 1;
    }
    words >= 2 && !input.ends_with(' ')
}

impl FromStr for Seed {
    type Err = DerivationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Seed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base58())
    }
}

impl fmt::Debug for Seed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Seed(..)")
    }
}
