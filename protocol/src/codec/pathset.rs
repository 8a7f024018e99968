//! # Payment Paths
//!
//! A path set is a list of alternative paths; each path is a list of steps
//! through intermediate accounts or order books. On the wire:
//!
//! ```text
//! step   := type-byte [account:20] [currency:20] [issuer:20]
//! set    := step* (0xFF step*)* 0x00
//! ```
//!
//! The type byte says which of the three optional parts follow. A step
//! with none of them is meaningless and rejected in both directions.

use serde::{Deserialize, Serialize};

use super::binary::{BinaryReader, BinaryWriter};
use super::error::CodecError;
use super::types::{AccountId, Currency};
use crate::config::{PATHSET_END, PATH_SEPARATOR};

const STEP_ACCOUNT: u8 = 0x01;
const STEP_CURRENCY: u8 = 0x10;
const STEP_ISSUER: u8 = 0x20;

/// One hop of a payment path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct PathStep {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<AccountId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<Currency>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<AccountId>,
}

impl PathStep {
    pub fn account(account: AccountId) -> Self {
        Self {
            account: Some(account),
            ..Self::default()
        }
    }

    pub fn book(currency: Currency, issuer: Option<AccountId>) -> Self {
        Self {
            currency: Some(currency),
            issuer,
            ..Self::default()
        }
    }

    fn type_byte(&self) -> u8 {
        let mut tag = 0;
        if self.account.is_some() {
            tag |= STEP_ACCOUNT;
        }
        if self.currency.is_some() {
            tag |= STEP_CURRENCY;
        }
        if self.issuer.is_some() {
            tag |= STEP_ISSUER;
        }
        tag
    }
}

/// A list of alternative paths.
///
/// The encoding cannot tell "no paths" from "one empty path": both are a
/// lone terminator, and both decode as a single empty path.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PathSet(pub Vec<Vec<PathStep>>);

impl PathSet {
    pub fn new(paths: Vec<Vec<PathStep>>) -> Self {
        Self(paths)
    }

    pub fn paths(&self) -> &[Vec<PathStep>] {
        &self.0
    }
}

/// Write a path set.
pub fn write(writer: &mut BinaryWriter, set: &PathSet) -> Result<(), CodecError> {
    for (i, path) in set.0.iter().enumerate() {
        if i > 0 {
            writer.write_u8(PATH_SEPARATOR);
        }
        for step in path {
            let tag = step.type_byte();
            if tag == 0 {
                return Err(CodecError::InvalidPathEntry);
            }
            writer.write_u8(tag);
            if let Some(account) = &step.account {
                writer.write_bytes(account.as_bytes());
            }
            if let Some(currency) = &step.currency {
                writer.write_bytes(currency.as_bytes());
            }
            if let Some(issuer) = &step.issuer {
                writer.write_bytes(issuer.as_bytes());
            }
        }
    }
    writer.write_u8(PATHSET_END);
    Ok(())
}

/// Read a path set.
pub fn read(reader: &mut BinaryReader<'_>) -> Result<PathSet, CodecError> {
    let mut paths = Vec::new();
    let mut current = Vec::new();

    loop {
        let tag = reader.read_u8()?;
        if tag == PATHSET_END {
            break;
        }
        if tag == PATH_SEPARATOR {
            paths.push(std::mem::take(&mut current));
            continue;
        }

        let mut step = PathStep::default();
        if tag & STEP_ACCOUNT != 0 {
            step.account = Some(AccountId(reader.read_array()?));
        }
        if tag & STEP_CURRENCY != 0 {
            step.currency = Some(Currency(reader.read_array()?));
        }
        if tag & STEP_ISSUER != 0 {
            step.issuer = Some(AccountId(reader.read_array()?));
        }
        if step.type_byte() == 0 {
            return Err(CodecError::InvalidPathEntry);
        }
        current.push(step);
    }

    paths.push(current);
    Ok(PathSet(paths))
}
