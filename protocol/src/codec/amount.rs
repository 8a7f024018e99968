//! # Amounts
//!
//! An amount is either native drops or an issued-currency value with a
//! currency code and an issuer. Both start with the same 64-bit word:
//!
//! ```text
//! native:  0 | sign | 62-bit magnitude
//! issued:  1 | sign | 8-bit exponent (+97) | 54-bit mantissa
//!          followed by 20-byte currency, 20-byte issuer
//! ```
//!
//! The sign bit is set for non-negative values. Issued values are kept
//! normalized (mantissa in `[10^15, 10^16)`), which makes the wire form
//! and the in-memory form one-to-one: two equal values always hash the
//! same.
//!
//! Quality values (exchange rates baked into order-book directory keys)
//! reuse the mantissa/exponent pair with a +100 bias and a 56-bit mantissa.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::binary::{BinaryReader, BinaryWriter};
use super::error::CodecError;
use super::types::{AccountId, Currency, Hash256};

const NOT_NATIVE_BIT: u64 = 0x8000_0000_0000_0000;
const POSITIVE_BIT: u64 = 0x4000_0000_0000_0000;
const NATIVE_MAGNITUDE_MASK: u64 = 0x3FFF_FFFF_FFFF_FFFF;
const MANTISSA_MASK: u64 = 0x003F_FFFF_FFFF_FFFF;

const MIN_MANTISSA: u64 = 1_000_000_000_000_000;
const MAX_MANTISSA: u64 = 9_999_999_999_999_999;
const MIN_EXPONENT: i32 = -96;
const MAX_EXPONENT: i32 = 80;
const AMOUNT_EXPONENT_BIAS: i32 = 97;
const QUALITY_EXPONENT_BIAS: i32 = 100;
const SIGNIFICANT_DIGITS: usize = 16;

// ---------------------------------------------------------------------------
// IssuedValue
// ---------------------------------------------------------------------------

/// A normalized decimal: `(-1)^negative × mantissa × 10^exponent`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct IssuedValue {
    mantissa: u64,
    exponent: i32,
    negative: bool,
}

impl IssuedValue {
    pub const ZERO: Self = Self {
        mantissa: 0,
        exponent: 0,
        negative: false,
    };

    /// Build and normalize.
    ///
    /// Mantissas with more than sixteen significant digits are rounded half
    /// up. Values too small to represent collapse to zero; values too large
    /// fail with [`CodecError::Overflow`].
    pub fn new(mantissa: u64, exponent: i32, negative: bool) -> Result<Self, CodecError> {
        if mantissa == 0 {
            return Ok(Self::ZERO);
        }
        let digits = mantissa.to_string();
        Self::from_digits(digits.as_bytes(), exponent, negative)
    }

    /// Normalize a run of ASCII digits scaled by `10^exponent`.
    fn from_digits(digits: &[u8], exponent: i32, negative: bool) -> Result<Self, CodecError> {
        let start = digits.iter().position(|d| *d != b'0');
        let digits = match start {
            Some(start) => &digits[start..],
            None => return Ok(Self::ZERO),
        };

        let mut exponent = i64::from(exponent);
        let mut mantissa: u64;
        if digits.len() > SIGNIFICANT_DIGITS {
            mantissa = parse_digits(&digits[..SIGNIFICANT_DIGITS]);
            exponent += (digits.len() - SIGNIFICANT_DIGITS) as i64;
            if digits[SIGNIFICANT_DIGITS] >= b'5' {
                mantissa += 1;
                if mantissa > MAX_MANTISSA {
                    mantissa /= 10;
                    exponent += 1;
                }
            }
        } else {
            let pad = SIGNIFICANT_DIGITS - digits.len();
            mantissa = parse_digits(digits) * 10u64.pow(pad as u32);
            exponent -= pad as i64;
        }

        if exponent > i64::from(MAX_EXPONENT) {
            return Err(CodecError::Overflow(format!(
                "issued amount exponent {exponent} exceeds {MAX_EXPONENT}"
            )));
        }
        if exponent < i64::from(MIN_EXPONENT) {
            return Ok(Self::ZERO);
        }
        debug_assert!((MIN_MANTISSA..=MAX_MANTISSA).contains(&mantissa));
        Ok(Self {
            mantissa,
            exponent: exponent as i32,
            negative,
        })
    }

    pub fn mantissa(&self) -> u64 {
        self.mantissa
    }

    pub fn exponent(&self) -> i32 {
        self.exponent
    }

    pub fn is_negative(&self) -> bool {
        self.negative
    }

    pub fn is_zero(&self) -> bool {
        self.mantissa == 0
    }

    pub fn negate(self) -> Self {
        if self.is_zero() {
            return self;
        }
        Self {
            negative: !self.negative,
            ..self
        }
    }

    /// The 64-bit amount word for an issued value.
    fn to_amount_bits(self) -> u64 {
        if self.is_zero() {
            return NOT_NATIVE_BIT;
        }
        let mut hi = NOT_NATIVE_BIT | self.mantissa;
        if !self.negative {
            hi |= POSITIVE_BIT;
        }
        let biased = (self.exponent + AMOUNT_EXPONENT_BIAS) as u64 & 0xFF;
        hi | (biased << 54)
    }

    fn from_amount_bits(hi: u64) -> Result<Self, CodecError> {
        if hi & !NOT_NATIVE_BIT == 0 {
            return Ok(Self::ZERO);
        }
        let negative = hi & POSITIVE_BIT == 0;
        let exponent = ((hi >> 54) & 0xFF) as i32 - AMOUNT_EXPONENT_BIAS;
        Self::new(hi & MANTISSA_MASK, exponent, negative)
    }
}

fn parse_digits(digits: &[u8]) -> u64 {
    digits
        .iter()
        .fold(0u64, |acc, d| acc * 10 + u64::from(d - b'0'))
}

impl FromStr for IssuedValue {
    type Err = CodecError;

    /// Parse `[-+]digits[.digits][e[-+]digits]`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CodecError::InvalidValue(format!("{s:?} is not a decimal amount"));

        let (negative, body) = match s.as_bytes().first() {
            Some(b'-') => (true, &s[1..]),
            Some(b'+') => (false, &s[1..]),
            _ => (false, s),
        };
        let (number, exp_part) = match body.find(|c| c == 'e' || c == 'E') {
            Some(i) => (&body[..i], Some(&body[i + 1..])),
            None => (body, None),
        };
        let (int_part, frac_part) = match number.find('.') {
            Some(i) => (&number[..i], &number[i + 1..]),
            None => (number, ""),
        };
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(invalid());
        }
        if !int_part.bytes().chain(frac_part.bytes()).all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }

        let exponent: i64 = match exp_part {
            Some(e) => e.parse::<i64>().map_err(|_| invalid())?,
            None => 0,
        };
        let exponent = i64::try_from(frac_part.len())
            .ok()
            .and_then(|shift| exponent.checked_sub(shift))
            .ok_or_else(invalid)?;
        let exponent = i32::try_from(exponent).map_err(|_| invalid())?;

        let digits: Vec<u8> = int_part.bytes().chain(frac_part.bytes()).collect();
        Self::from_digits(&digits, exponent, negative)
    }
}

impl fmt::Display for IssuedValue {
    /// Plain decimal notation without trailing zeros.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_zero() {
            return f.write_str("0");
        }
        let mut digits = self.mantissa.to_string();
        let mut exponent = self.exponent;
        while digits.ends_with('0') {
            digits.pop();
            exponent += 1;
        }

        if self.negative {
            f.write_str("-")?;
        }
        match exponent.cmp(&0) {
            Ordering::Greater | Ordering::Equal => {
                f.write_str(&digits)?;
                f.write_str(&"0".repeat(exponent as usize))
            }
            Ordering::Less => {
                let frac_len = (-exponent) as usize;
                if frac_len < digits.len() {
                    let (int_part, frac_part) = digits.split_at(digits.len() - frac_len);
                    write!(f, "{int_part}.{frac_part}")
                } else {
                    write!(f, "0.{}{digits}", "0".repeat(frac_len - digits.len()))
                }
            }
        }
    }
}

impl fmt::Debug for IssuedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IssuedValue({self})")
    }
}

// ---------------------------------------------------------------------------
// Amount
// ---------------------------------------------------------------------------

/// An issued-currency amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IssuedAmount {
    #[serde(with = "display_fromstr")]
    pub value: IssuedValue,
    pub currency: Currency,
    pub issuer: AccountId,
}

/// A currency amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Amount {
    /// Signed drops of the native currency.
    Native(i64),
    Issued(IssuedAmount),
}

impl Amount {
    /// Native drops.
    pub fn drops(drops: i64) -> Self {
        Self::Native(drops)
    }

    /// Issued amount from a decimal string.
    pub fn issued(value: &str, currency: Currency, issuer: AccountId) -> Result<Self, CodecError> {
        Ok(Self::Issued(IssuedAmount {
            value: value.parse()?,
            currency,
            issuer,
        }))
    }

    pub fn is_native(&self) -> bool {
        matches!(self, Self::Native(_))
    }

    pub fn is_negative(&self) -> bool {
        match self {
            Self::Native(drops) => *drops < 0,
            Self::Issued(issued) => issued.value.is_negative(),
        }
    }

    pub fn is_zero(&self) -> bool {
        match self {
            Self::Native(drops) => *drops == 0,
            Self::Issued(issued) => issued.value.is_zero(),
        }
    }

    /// The value without currency or issuer, as a decimal string.
    pub fn value_string(&self) -> String {
        match self {
            Self::Native(drops) => drops.to_string(),
            Self::Issued(issued) => issued.value.to_string(),
        }
    }
}

impl fmt::Display for Amount {
    /// Drops for native amounts, `value/currency/issuer` otherwise.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Native(drops) => write!(f, "{drops}"),
            Self::Issued(issued) => {
                write!(f, "{}/{}/{}", issued.value, issued.currency, issued.issuer)
            }
        }
    }
}

impl FromStr for Amount {
    type Err = CodecError;

    /// Accepts integer drops or `value/currency/issuer`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('/').collect();
        match parts.as_slice() {
            [drops] => drops
                .parse::<i64>()
                .map(Self::Native)
                .map_err(|_| CodecError::InvalidValue(format!("{s:?} is not a drop amount"))),
            [value, currency, issuer] => {
                Self::issued(value, currency.parse()?, issuer.parse()?)
            }
            _ => Err(CodecError::InvalidValue(format!(
                "{s:?} is neither drops nor value/currency/issuer"
            ))),
        }
    }
}

/// Write an amount.
pub fn write(writer: &mut BinaryWriter, amount: &Amount) -> Result<(), CodecError> {
    match amount {
        Amount::Native(drops) => {
            let magnitude = drops.unsigned_abs();
            if magnitude > NATIVE_MAGNITUDE_MASK {
                return Err(CodecError::Overflow(format!(
                    "native amount {drops} does not fit in 62 bits"
                )));
            }
            let mut hi = magnitude;
            if *drops >= 0 {
                hi |= POSITIVE_BIT;
            }
            writer.write_u64(hi);
        }
        Amount::Issued(issued) => {
            writer.write_u64(issued.value.to_amount_bits());
            writer.write_bytes(issued.currency.as_bytes());
            writer.write_bytes(issued.issuer.as_bytes());
        }
    }
    Ok(())
}

/// Read an amount.
pub fn read(reader: &mut BinaryReader<'_>) -> Result<Amount, CodecError> {
    let hi = reader.read_u64()?;
    if hi & NOT_NATIVE_BIT == 0 {
        let magnitude = (hi & NATIVE_MAGNITUDE_MASK) as i64;
        let drops = if hi & POSITIVE_BIT == 0 {
            -magnitude
        } else {
            magnitude
        };
        return Ok(Amount::Native(drops));
    }

    let value = IssuedValue::from_amount_bits(hi)?;
    let currency = Currency(reader.read_array()?);
    let issuer = AccountId(reader.read_array()?);
    Ok(Amount::Issued(IssuedAmount {
        value,
        currency,
        issuer,
    }))
}

// ---------------------------------------------------------------------------
// Quality
// ---------------------------------------------------------------------------

/// Pack a positive decimal as a quality: 8-bit exponent (+100), 56-bit mantissa.
pub fn encode_quality(value: &IssuedValue) -> [u8; 8] {
    if value.is_zero() {
        return [0u8; 8];
    }
    let biased = (value.exponent + QUALITY_EXPONENT_BIAS) as u64 & 0xFF;
    ((biased << 56) | value.mantissa).to_be_bytes()
}

/// Unpack a quality word.
pub fn decode_quality(bytes: [u8; 8]) -> Result<IssuedValue, CodecError> {
    let word = u64::from_be_bytes(bytes);
    let exponent = (word >> 56) as i32 - QUALITY_EXPONENT_BIAS;
    IssuedValue::new(word & 0x00FF_FFFF_FFFF_FFFF, exponent, false)
}

/// The quality stored in the last eight bytes of an order-book directory key.
pub fn quality_from_book_directory(directory: &Hash256) -> Result<IssuedValue, CodecError> {
    let mut tail = [0u8; 8];
    tail.copy_from_slice(&directory.0[24..]);
    decode_quality(tail)
}

mod display_fromstr {
    use super::IssuedValue;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &IssuedValue, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<IssuedValue, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}
