//! # Crypto-Conditions
//!
//! DER codec for the SHA-256 crypto-condition suite that escrow
//! `Condition` and `Fulfillment` fields carry:
//!
//! | Type id | Name               | Condition tag | Compound |
//! |---------|--------------------|---------------|----------|
//! | 0       | `preimage-sha-256` | `A0`          | no       |
//! | 1       | `prefix-sha-256`   | `A1`          | yes      |
//! | 2       | `threshold-sha-256`| `A2`          | yes      |
//! | 3       | `rsa-sha-256`      | `A3`          | no       |
//! | 4       | `ed25519-sha-256`  | `A4`          | no       |
//!
//! A [`Fulfillment`] holds whatever satisfies a condition. Its
//! [`Fulfillment::condition`] is the fingerprint, cost and subtype set a
//! ledger object commits to, and [`Condition::is_fulfilled_by`] compares
//! the two.
//!
//! Signature fulfillments are encoded and fingerprinted here. Their
//! signatures are not checked.

use super::error::ConditionError;
use super::hash::sha256;
use crate::config::{COMPOUND_CONDITION_COST, CONDITION_MAX_DEPTH, ED25519_CONDITION_COST};

const TAG_SEQUENCE: u8 = 0x30;
const TAG_CHOICE: u8 = 0xA0;
const TAG_FIELD_0: u8 = 0x80;
const TAG_FIELD_1: u8 = 0x81;
const TAG_FIELD_2: u8 = 0x82;
const TAG_SET_0: u8 = 0xA0;
const TAG_SET_1: u8 = 0xA1;
const TAG_EXPLICIT_2: u8 = 0xA2;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ConditionType {
    PreimageSha256,
    PrefixSha256,
    ThresholdSha256,
    RsaSha256,
    Ed25519Sha256,
}

impl ConditionType {
    pub const ALL: [Self; 5] = [
        Self::PreimageSha256,
        Self::PrefixSha256,
        Self::ThresholdSha256,
        Self::RsaSha256,
        Self::Ed25519Sha256,
    ];

    pub fn id(self) -> u8 {
        match self {
            Self::PreimageSha256 => 0,
            Self::PrefixSha256 => 1,
            Self::ThresholdSha256 => 2,
            Self::RsaSha256 => 3,
            Self::Ed25519Sha256 => 4,
        }
    }

    pub fn from_id(id: u8) -> Result<Self, ConditionError> {
        Self::ALL
            .get(usize::from(id))
            .copied()
            .ok_or(ConditionError::UnknownType(id))
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::PreimageSha256 => "preimage-sha-256",
            Self::PrefixSha256 => "prefix-sha-256",
            Self::ThresholdSha256 => "threshold-sha-256",
            Self::RsaSha256 => "rsa-sha-256",
            Self::Ed25519Sha256 => "ed25519-sha-256",
        }
    }

    /// Prefix and threshold conditions wrap others and list their types.
    pub fn is_compound(self) -> bool {
        matches!(self, Self::PrefixSha256 | Self::ThresholdSha256)
    }

    fn tag(self) -> u8 {
        TAG_CHOICE | self.id()
    }

    fn from_tag(tag: u8) -> Result<Self, ConditionError> {
        if tag & 0xE0 != TAG_CHOICE {
            return Err(ConditionError::UnexpectedTag {
                expected: TAG_CHOICE,
                found: tag,
            });
        }
        Self::from_id(tag & 0x1F)
    }
}

impl std::fmt::Display for ConditionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Set of condition types, bit `n` standing for type id `n`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct SubtypeSet(u8);

impl SubtypeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn contains(self, kind: ConditionType) -> bool {
        self.0 & (1 << kind.id()) != 0
    }

    pub fn insert(&mut self, kind: ConditionType) {
        self.0 |= 1 << kind.id();
    }

    pub fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub fn iter(self) -> impl Iterator<Item = ConditionType> {
        ConditionType::ALL
            .into_iter()
            .filter(move |kind| self.contains(*kind))
    }

    /// DER BIT STRING contents: unused-bit count, then bits MSB first.
    fn to_bit_string(self) -> Vec<u8> {
        let Some(highest) = self.iter().last() else {
            return vec![0];
        };
        let bits = self
            .iter()
            .fold(0u8, |acc, kind| acc | (0x80 >> kind.id()));
        vec![7 - highest.id(), bits]
    }

    fn from_bit_string(contents: &[u8]) -> Result<Self, ConditionError> {
        let (&unused, bits) = contents
            .split_first()
            .ok_or(ConditionError::InvalidBitString)?;
        if unused > 7 || (bits.is_empty() && unused != 0) {
            return Err(ConditionError::InvalidBitString);
        }
        if let Some(&last) = bits.last() {
            if last & ((1u8 << unused) - 1) != 0 {
                return Err(ConditionError::InvalidBitString);
            }
        }

        let mut set = Self::new();
        for (i, byte) in bits.iter().enumerate() {
            for bit in 0..8 {
                if byte & (0x80 >> bit) == 0 {
                    continue;
                }
                let id = u8::try_from(i * 8 + bit).map_err(|_| ConditionError::InvalidBitString)?;
                set.insert(ConditionType::from_id(id)?);
            }
        }
        Ok(set)
    }
}

impl FromIterator<ConditionType> for SubtypeSet {
    fn from_iter<I: IntoIterator<Item = ConditionType>>(iter: I) -> Self {
        let mut set = Self::new();
        for kind in iter {
            set.insert(kind);
        }
        set
    }
}

// ---------------------------------------------------------------------------
// Condition
// ---------------------------------------------------------------------------

/// Commitment to a fulfillment: type, SHA-256 fingerprint and cost.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Condition {
    kind: ConditionType,
    fingerprint: [u8; 32],
    cost: u64,
    subtypes: SubtypeSet,
}

impl Condition {
    /// `subtypes` is dropped for simple types, which carry none on the wire.
    pub fn new(kind: ConditionType, fingerprint: [u8; 32], cost: u64, subtypes: SubtypeSet) -> Self {
        let subtypes = if kind.is_compound() {
            subtypes
        } else {
            SubtypeSet::new()
        };
        Self {
            kind,
            fingerprint,
            cost,
            subtypes,
        }
    }

    pub fn kind(&self) -> ConditionType {
        self.kind
    }

    pub fn fingerprint(&self) -> &[u8; 32] {
        &self.fingerprint
    }

    pub fn cost(&self) -> u64 {
        self.cost
    }

    pub fn subtypes(&self) -> SubtypeSet {
        self.subtypes
    }

    /// Whether `fulfillment` hashes to this condition.
    pub fn is_fulfilled_by(&self, fulfillment: &Fulfillment) -> bool {
        fulfillment.condition() == *self
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut writer = DerWriter::default();
        self.write(&mut writer);
        writer.into_bytes()
    }

    /// Decode one DER condition spanning all of `bytes`.
    ///
    /// # Errors
    ///
    /// Malformed DER, an unknown type, or trailing bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self, ConditionError> {
        let mut reader = DerReader::new(bytes);
        let condition = Self::read(&mut reader)?;
        reader.finish()?;
        Ok(condition)
    }

    fn write(&self, writer: &mut DerWriter) {
        writer.write_nested(self.kind.tag(), |body| {
            body.write(TAG_FIELD_0, &self.fingerprint);
            body.write_integer(TAG_FIELD_1, self.cost);
            if self.kind.is_compound() {
                body.write(TAG_FIELD_2, &self.subtypes.to_bit_string());
            }
        });
    }

    fn read(reader: &mut DerReader<'_>) -> Result<Self, ConditionError> {
        let (tag, contents) = reader.read_any()?;
        let kind = ConditionType::from_tag(tag)?;
        let mut body = DerReader::new(contents);
        let fingerprint = fixed::<32>(body.read(TAG_FIELD_0)?, "fingerprint")?;
        let cost = body.read_integer(TAG_FIELD_1)?;
        let subtypes = if kind.is_compound() {
            SubtypeSet::from_bit_string(body.read(TAG_FIELD_2)?)?
        } else {
            SubtypeSet::new()
        };
        body.finish()?;
        Ok(Self {
            kind,
            fingerprint,
            cost,
            subtypes,
        })
    }
}

// ---------------------------------------------------------------------------
// Fulfillment
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fulfillment {
    PreimageSha256 {
        preimage: Vec<u8>,
    },
    PrefixSha256 {
        prefix: Vec<u8>,
        max_message_length: u32,
        subfulfillment: Box<Fulfillment>,
    },
    /// Satisfied by every listed subfulfillment. `subconditions` are the
    /// other branches, committed to but left unfulfilled.
    ThresholdSha256 {
        subfulfillments: Vec<Fulfillment>,
        subconditions: Vec<Condition>,
    },
    RsaSha256 {
        modulus: Vec<u8>,
        signature: Vec<u8>,
    },
    Ed25519Sha256 {
        public_key: [u8; 32],
        signature: [u8; 64],
    },
}

impl Fulfillment {
    pub fn preimage(preimage: impl Into<Vec<u8>>) -> Self {
        Self::PreimageSha256 {
            preimage: preimage.into(),
        }
    }

    pub fn kind(&self) -> ConditionType {
        match self {
            Self::PreimageSha256 { .. } => ConditionType::PreimageSha256,
            Self::PrefixSha256 { .. } => ConditionType::PrefixSha256,
            Self::ThresholdSha256 { .. } => ConditionType::ThresholdSha256,
            Self::RsaSha256 { .. } => ConditionType::RsaSha256,
            Self::Ed25519Sha256 { .. } => ConditionType::Ed25519Sha256,
        }
    }

    /// The condition this fulfillment satisfies.
    pub fn condition(&self) -> Condition {
        let kind = self.kind();
        match self {
            Self::PreimageSha256 { preimage } => Condition::new(
                kind,
                sha256(preimage),
                len_u64(preimage.len()),
                SubtypeSet::new(),
            ),
            Self::PrefixSha256 {
                prefix,
                max_message_length,
                subfulfillment,
            } => {
                let sub = subfulfillment.condition();
                let contents = sequence(|body| {
                    body.write(TAG_FIELD_0, prefix);
                    body.write_integer(TAG_FIELD_1, u64::from(*max_message_length));
                    body.write_nested(TAG_EXPLICIT_2, |inner| sub.write(inner));
                });
                let cost = len_u64(prefix.len())
                    .saturating_add(u64::from(*max_message_length))
                    .saturating_add(sub.cost)
                    .saturating_add(COMPOUND_CONDITION_COST);
                let mut subtypes = sub.subtypes;
                subtypes.insert(sub.kind);
                Condition::new(kind, sha256(&contents), cost, subtypes)
            }
            Self::ThresholdSha256 {
                subfulfillments,
                subconditions,
            } => {
                let threshold = subfulfillments.len();
                let all: Vec<Condition> = subfulfillments
                    .iter()
                    .map(Fulfillment::condition)
                    .chain(subconditions.iter().cloned())
                    .collect();

                let mut costs: Vec<u64> = all.iter().map(|c| c.cost).collect();
                costs.sort_unstable_by(|a, b| b.cmp(a));
                let cost = costs
                    .iter()
                    .take(threshold)
                    .fold(0u64, |acc, c| acc.saturating_add(*c))
                    .saturating_add(COMPOUND_CONDITION_COST.saturating_mul(len_u64(all.len())));
                let subtypes = all.iter().fold(SubtypeSet::new(), |acc, c| {
                    let mut acc = acc.union(c.subtypes);
                    acc.insert(c.kind);
                    acc
                });

                let contents = sequence(|body| {
                    body.write_integer(TAG_FIELD_0, len_u64(subfulfillments.len()));
                    body.write_set(TAG_SET_1, all.iter().map(Condition::encode));
                });
                Condition::new(kind, sha256(&contents), cost, subtypes)
            }
            Self::RsaSha256 { modulus, .. } => {
                let contents = sequence(|body| body.write(TAG_FIELD_0, modulus));
                let cost = len_u64(modulus.len()).saturating_mul(len_u64(modulus.len()));
                Condition::new(kind, sha256(&contents), cost, SubtypeSet::new())
            }
            Self::Ed25519Sha256 { public_key, .. } => {
                let contents = sequence(|body| body.write(TAG_FIELD_0, public_key));
                Condition::new(kind, sha256(&contents), ED25519_CONDITION_COST, SubtypeSet::new())
            }
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut writer = DerWriter::default();
        self.write(&mut writer);
        writer.into_bytes()
    }

    /// Decode one DER fulfillment spanning all of `bytes`.
    ///
    /// # Errors
    ///
    /// Malformed DER, an unknown type, fixed-size fields of the wrong
    /// length, nesting beyond the depth limit, or trailing bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self, ConditionError> {
        let mut reader = DerReader::new(bytes);
        let fulfillment = Self::read(&mut reader, 0)?;
        reader.finish()?;
        Ok(fulfillment)
    }

    fn write(&self, writer: &mut DerWriter) {
        writer.write_nested(self.kind().tag(), |body| match self {
            Self::PreimageSha256 { preimage } => body.write(TAG_FIELD_0, preimage),
            Self::PrefixSha256 {
                prefix,
                max_message_length,
                subfulfillment,
            } => {
                body.write(TAG_FIELD_0, prefix);
                body.write_integer(TAG_FIELD_1, u64::from(*max_message_length));
                body.write_nested(TAG_EXPLICIT_2, |inner| subfulfillment.write(inner));
            }
            Self::ThresholdSha256 {
                subfulfillments,
                subconditions,
            } => {
                body.write_set(TAG_SET_0, subfulfillments.iter().map(Fulfillment::encode));
                body.write_set(TAG_SET_1, subconditions.iter().map(Condition::encode));
            }
            Self::RsaSha256 { modulus, signature } => {
                body.write(TAG_FIELD_0, modulus);
                body.write(TAG_FIELD_1, signature);
            }
            Self::Ed25519Sha256 {
                public_key,
                signature,
            } => {
                body.write(TAG_FIELD_0, public_key);
                body.write(TAG_FIELD_1, signature);
            }
        });
    }

    fn read(reader: &mut DerReader<'_>, depth: usize) -> Result<Self, ConditionError> {
        if depth > CONDITION_MAX_DEPTH {
            return Err(ConditionError::TooDeep(CONDITION_MAX_DEPTH));
        }
        let (tag, contents) = reader.read_any()?;
        let mut body = DerReader::new(contents);
        let fulfillment = match ConditionType::from_tag(tag)? {
            ConditionType::PreimageSha256 => Self::PreimageSha256 {
                preimage: body.read(TAG_FIELD_0)?.to_vec(),
            },
            ConditionType::PrefixSha256 => {
                let prefix = body.read(TAG_FIELD_0)?.to_vec();
                let max_message_length = u32::try_from(body.read_integer(TAG_FIELD_1)?)
                    .map_err(|_| ConditionError::InvalidField("maxMessageLength exceeds 32 bits".into()))?;
                let mut inner = DerReader::new(body.read(TAG_EXPLICIT_2)?);
                let subfulfillment = Self::read(&mut inner, depth + 1)?;
                inner.finish()?;
                Self::PrefixSha256 {
                    prefix,
                    max_message_length,
                    subfulfillment: Box::new(subfulfillment),
                }
            }
            ConditionType::ThresholdSha256 => {
                let mut fulfilled = DerReader::new(body.read(TAG_SET_0)?);
                let mut subfulfillments = Vec::new();
                while !fulfilled.is_empty() {
                    subfulfillments.push(Self::read(&mut fulfilled, depth + 1)?);
                }
                let mut committed = DerReader::new(body.read(TAG_SET_1)?);
                let mut subconditions = Vec::new();
                while !committed.is_empty() {
                    subconditions.push(Condition::read(&mut committed)?);
                }
                Self::ThresholdSha256 {
                    subfulfillments,
                    subconditions,
                }
            }
            ConditionType::RsaSha256 => Self::RsaSha256 {
                modulus: body.read(TAG_FIELD_0)?.to_vec(),
                signature: body.read(TAG_FIELD_1)?.to_vec(),
            },
            ConditionType::Ed25519Sha256 => Self::Ed25519Sha256 {
                public_key: fixed::<32>(body.read(TAG_FIELD_0)?, "ed25519 public key")?,
                signature: fixed::<64>(body.read(TAG_FIELD_1)?, "ed25519 signature")?,
            },
        };
        body.finish()?;
        Ok(fulfillment)
    }
}

fn len_u64(len: usize) -> u64 {
    u64::try_from(len).unwrap_or(u64::MAX)
}

fn fixed<const N: usize>(bytes: &[u8], what: &str) -> Result<[u8; N], ConditionError> {
    <[u8; N]>::try_from(bytes).map_err(|_| {
        ConditionError::InvalidField(format!("{what} must be {N} bytes, got {}", bytes.len()))
    })
}

fn sequence(build: impl FnOnce(&mut DerWriter)) -> Vec<u8> {
    let mut writer = DerWriter::default();
    writer.write_nested(TAG_SEQUENCE, build);
    writer.into_bytes()
}

// ---------------------------------------------------------------------------
// DER plumbing
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct DerWriter {
    buf: Vec<u8>,
}

impl DerWriter {
    fn write(&mut self, tag: u8, contents: &[u8]) {
        self.buf.push(tag);
        write_length(&mut self.buf, contents.len());
        self.buf.extend_from_slice(contents);
    }

    fn write_integer(&mut self, tag: u8, value: u64) {
        let bytes = value.to_be_bytes();
        let skip = bytes.iter().take_while(|b| **b == 0).count().min(7);
        let mut contents = bytes[skip..].to_vec();
        if contents[0] & 0x80 != 0 {
            contents.insert(0, 0);
        }
        self.write(tag, &contents);
    }

    fn write_nested(&mut self, tag: u8, build: impl FnOnce(&mut DerWriter)) {
        let mut inner = DerWriter::default();
        build(&mut inner);
        self.write(tag, &inner.buf);
    }

    /// SET OF: members in ascending order of their encodings.
    fn write_set(&mut self, tag: u8, members: impl Iterator<Item = Vec<u8>>) {
        let mut members: Vec<Vec<u8>> = members.collect();
        members.sort();
        self.write(tag, &members.concat());
    }

    fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

fn write_length(buf: &mut Vec<u8>, len: usize) {
    if len < 0x80 {
        buf.push(len as u8);
        return;
    }
    let bytes = len.to_be_bytes();
    let skip = bytes.iter().take_while(|b| **b == 0).count();
    let significant = &bytes[skip..];
    buf.push(0x80 | significant.len() as u8);
    buf.extend_from_slice(significant);
}

#[derive(Debug, Clone)]
struct DerReader<'a> {
    buf: &'a [u8],
}

impl<'a> DerReader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    fn read_any(&mut self) -> Result<(u8, &'a [u8]), ConditionError> {
        let (&tag, rest) = self.buf.split_first().ok_or(ConditionError::UnexpectedEof)?;
        let (len, rest) = read_length(rest)?;
        if rest.len() < len {
            return Err(ConditionError::UnexpectedEof);
        }
        let (contents, rest) = rest.split_at(len);
        self.buf = rest;
        Ok((tag, contents))
    }

    fn read(&mut self, expected: u8) -> Result<&'a [u8], ConditionError> {
        let (found, contents) = self.read_any()?;
        if found != expected {
            return Err(ConditionError::UnexpectedTag { expected, found });
        }
        Ok(contents)
    }

    /// Non-negative, minimally encoded INTEGER that fits in 64 bits.
    fn read_integer(&mut self, expected: u8) -> Result<u64, ConditionError> {
        let contents = self.read(expected)?;
        let (&first, rest) = contents.split_first().ok_or(ConditionError::InvalidInteger)?;
        if first & 0x80 != 0 {
            return Err(ConditionError::InvalidInteger);
        }
        let magnitude = if first == 0 {
            match rest.first() {
                Some(next) if next & 0x80 == 0 => return Err(ConditionError::InvalidInteger),
                _ => rest,
            }
        } else {
            contents
        };
        if magnitude.len() > 8 {
            return Err(ConditionError::InvalidInteger);
        }
        Ok(magnitude.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b)))
    }

    fn finish(&self) -> Result<(), ConditionError> {
        if self.buf.is_empty() {
            Ok(())
        } else {
            Err(ConditionError::TrailingBytes(self.buf.len()))
        }
    }
}

fn read_length(buf: &[u8]) -> Result<(usize, &[u8]), ConditionError> {
    let (&first, rest) = buf.split_first().ok_or(ConditionError::UnexpectedEof)?;
    if first < 0x80 {
        return Ok((usize::from(first), rest));
    }
    let count = usize::from(first & 0x7F);
    if count == 0 || count > std::mem::size_of::<usize>() {
        return Err(ConditionError::InvalidLength);
    }
    if rest.len() < count {
        return Err(ConditionError::UnexpectedEof);
    }
    let (bytes, rest) = rest.split_at(count);
    if bytes[0] == 0 {
        return Err(ConditionError::InvalidLength);
    }
    let len = bytes.iter().fold(0usize, |acc, b| (acc << 8) | usize::from(*b));
    if len < 0x80 {
        return Err(ConditionError::InvalidLength);
    }
    Ok((len, rest))
}
