//! # Variable-Length Integers & Fixed-Width Primitives
//!
//! The bottom of the codec stack. Everything above reads and writes through
//! [`BinaryReader`] and [`BinaryWriter`], which are thin wrappers over
//! `bytes::Buf` / `bytes::BufMut` that turn "ran out of input" into a
//! [`CodecError`] instead of a panic.
//!
//! ## Varint layout
//!
//! Length prefixes use a three-tier encoding:
//!
//! | Value range        | Bytes | First byte  |
//! |--------------------|-------|-------------|
//! | `0..=192`          | 1     | the value   |
//! | `193..=12_480`     | 2     | `193..=240` |
//! | `12_481..=918_744` | 3     | `241..=254` |
//!
//! All fixed-width integers are big-endian.

use bytes::{Buf, BufMut};

use super::error::CodecError;
use crate::config::VARINT_MAX;

// ---------------------------------------------------------------------------
// BinaryReader
// ---------------------------------------------------------------------------

/// Cursor over a borrowed byte slice.
#[derive(Debug, Clone)]
pub struct BinaryReader<'a> {
    buf: &'a [u8],
}

impl<'a> BinaryReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    pub fn is_empty(&self) -> bool {
        !self.buf.has_remaining()
    }

    /// Next byte without consuming it.
    pub fn peek(&self) -> Option<u8> {
        self.buf.first().copied()
    }

    fn ensure(&self, needed: usize) -> Result<(), CodecError> {
        if self.buf.remaining() < needed {
            return Err(CodecError::UnexpectedEof {
                needed: needed - self.buf.remaining(),
            });
        }
        Ok(())
    }

    pub fn read_u8(&mut self) -> Result<u8, CodecError> {
        self.ensure(1)?;
        Ok(self.buf.get_u8())
    }

    pub fn read_u16(&mut self) -> Result<u16, CodecError> {
        self.ensure(2)?;
        Ok(self.buf.get_u16())
    }

    pub fn read_u32(&mut self) -> Result<u32, CodecError> {
        self.ensure(4)?;
        Ok(self.buf.get_u32())
    }

    pub fn read_u64(&mut self) -> Result<u64, CodecError> {
        self.ensure(8)?;
        Ok(self.buf.get_u64())
    }

    /// Borrow the next `len` bytes and advance past them.
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], CodecError> {
        self.ensure(len)?;
        let (head, tail) = self.buf.split_at(len);
        self.buf = tail;
        Ok(head)
    }

    /// Read exactly `N` bytes into an array.
    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], CodecError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    /// Read a varint length prefix followed by that many bytes.
    pub fn read_variable_length(&mut self) -> Result<&'a [u8], CodecError> {
        let len = decode_varint(self)?;
        self.read_bytes(len)
    }
}

// ---------------------------------------------------------------------------
// BinaryWriter
// ---------------------------------------------------------------------------

/// Growable output buffer.
#[derive(Debug, Clone, Default)]
pub struct BinaryWriter {
    buf: Vec<u8>,
}

impl BinaryWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buf.put_u8(value);
    }

    pub fn write_u16(&mut self, value: u16) {
        self.buf.put_u16(value);
    }

    pub fn write_u32(&mut self, value: u32) {
        self.buf.put_u32(value);
    }

    pub fn write_u64(&mut self, value: u64) {
        self.buf.put_u64(value);
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.put_slice(bytes);
    }

    /// Write a varint length prefix and then the bytes themselves.
    pub fn write_variable_length(&mut self, bytes: &[u8]) -> Result<(), CodecError> {
        let prefix = encode_varint(bytes.len())?;
        self.buf.put_slice(&prefix);
        self.buf.put_slice(bytes);
        Ok(())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

// ---------------------------------------------------------------------------
// Varint
// ---------------------------------------------------------------------------

/// Encode a length prefix.
///
/// # Errors
///
/// [`CodecError::Overflow`] for values above 918 744.
pub fn encode_varint(value: usize) -> Result<Vec<u8>, CodecError> {
    if value <= 192 {
        Ok(vec![value as u8])
    } else if value <= 12_480 {
        let v = value - 193;
        Ok(vec![193 + (v >> 8) as u8, (v & 0xff) as u8])
    } else if value <= VARINT_MAX {
        let v = value - 12_481;
        Ok(vec![
            241 + (v >> 16) as u8,
            ((v >> 8) & 0xff) as u8,
            (v & 0xff) as u8,
        ])
    } else {
        Err(CodecError::Overflow(format!(
            "variable length {value} exceeds {VARINT_MAX}"
        )))
    }
}

/// Decode a length prefix, consuming one to three bytes.
///
/// # Errors
///
/// [`CodecError::InvalidLength`] when the first byte is 255, and
/// [`CodecError::UnexpectedEof`] when the prefix is truncated.
pub fn decode_varint(reader: &mut BinaryReader<'_>) -> Result<usize, CodecError> {
    let b1 = reader.read_u8()? as usize;
    match b1 {
        0..=192 => Ok(b1),
        193..=240 => {
            let b2 = reader.read_u8()? as usize;
            Ok(193 + (b1 - 193) * 256 + b2)
        }
        241..=254 => {
            let b2 = reader.read_u8()? as usize;
            let b3 = reader.read_u8()? as usize;
            Ok(12_481 + (b1 - 241) * 65_536 + b2 * 256 + b3)
        }
        _ => Err(CodecError::InvalidLength(b1 as u8)),
    }
}

// ---------------------------------------------------------------------------
// 64-bit inputs
// ---------------------------------------------------------------------------

/// Accept a decimal magnitude for a 64-bit field.
pub fn uint64_from_decimal(value: i128) -> Result<u64, CodecError> {
    if value < 0 {
        return Err(CodecError::InvalidValue(format!(
            "negative value {value} for an unsigned 64-bit field"
        )));
    }
    u64::try_from(value)
        .map_err(|_| CodecError::Overflow(format!("{value} does not fit in 64 bits")))
}

/// Accept a hex string of up to sixteen digits for a 64-bit field.
pub fn uint64_from_hex(value: &str) -> Result<u64, CodecError> {
    if value.len() > 16 || !value.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(CodecError::InvalidValue(format!(
            "{value:?} is not a hex string of at most 16 digits"
        )));
    }
    if value.is_empty() {
        return Ok(0);
    }
    u64::from_str_radix(value, 16).map_err(|e| CodecError::InvalidValue(e.to_string()))
}

/// Accept a big-endian big-integer magnitude for a 64-bit field. Leading
/// zero bytes are ignored.
pub fn uint64_from_be_bytes(bytes: &[u8]) -> Result<u64, CodecError> {
    let significant: &[u8] = match bytes.iter().position(|b| *b != 0) {
        Some(start) => &bytes[start..],
        None => return Ok(0),
    };
    if significant.len() > 8 {
        return Err(CodecError::Overflow(format!(
            "{}-byte integer does not fit in 64 bits",
            significant.len()
        )));
    }
    Ok(significant
        .iter()
        .fold(0u64, |acc, b| (acc << 8) | u64::from(*b)))
}
