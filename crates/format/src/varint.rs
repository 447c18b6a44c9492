//! LEB128 variable-width integer encoding
//!
//! Unsigned values are standard base-128 little-endian groups with the high
//! bit as continuation; a 64-bit value takes at most 10 bytes. Signed values
//! (including timestamps) are ZigZag-mapped onto the unsigned encoding.

use crate::source::ByteSource;
use crate::{AuError, Result};

/// Maximum encoded length of a 64-bit varint
pub const MAX_VARINT_LEN: usize = 10;

/// Encode an unsigned integer, returning the number of bytes written
#[inline]
pub fn encode_u64(mut value: u64, buf: &mut Vec<u8>) -> usize {
    let start = buf.len();
    loop {
        let mut byte = (value & 0x7f) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        buf.push(byte);
        if value == 0 {
            break;
        }
    }
    buf.len() - start
}

/// Encode a signed integer via ZigZag, returning the number of bytes written
#[inline]
pub fn encode_i64(value: i64, buf: &mut Vec<u8>) -> usize {
    encode_u64(zigzag(value), buf)
}

/// Decode an unsigned integer from a slice, returning `(value, bytes_consumed)`
///
/// `pos` is only used to report error positions and should be the absolute
/// stream offset of `buf[0]`.
pub fn decode_u64(buf: &[u8], pos: u64) -> Result<(u64, usize)> {
    let mut result: u64 = 0;
    let mut shift: u32 = 0;
    for (i, &byte) in buf.iter().enumerate() {
        if i >= MAX_VARINT_LEN {
            return Err(AuError::Overflow { pos });
        }
        let payload = (byte & 0x7f) as u64;
        if shift == 63 && payload > 1 {
            return Err(AuError::Overflow { pos });
        }
        result |= payload << shift;
        if byte & 0x80 == 0 {
            return Ok((result, i + 1));
        }
        shift += 7;
    }
    Err(AuError::eof(pos, "truncated varint"))
}

/// Decode a signed integer from a slice, returning `(value, bytes_consumed)`
#[inline]
pub fn decode_i64(buf: &[u8], pos: u64) -> Result<(i64, usize)> {
    let (raw, len) = decode_u64(buf, pos)?;
    Ok((unzigzag(raw), len))
}

/// Read an unsigned varint off a byte source
pub fn read_u64<S: ByteSource>(source: &mut S) -> Result<u64> {
    let start = source.pos();
    let mut result: u64 = 0;
    let mut shift: u32 = 0;
    loop {
        let byte = match source.next()? {
            Some(b) => b,
            None => return Err(AuError::eof(source.pos(), "truncated varint")),
        };
        if source.pos() - start > MAX_VARINT_LEN as u64 {
            return Err(AuError::Overflow { pos: start });
        }
        let payload = (byte & 0x7f) as u64;
        if shift == 63 && payload > 1 {
            return Err(AuError::Overflow { pos: start });
        }
        result |= payload << shift;
        if byte & 0x80 == 0 {
            return Ok(result);
        }
        shift += 7;
    }
}

/// Read a ZigZag-encoded signed varint off a byte source
#[inline]
pub fn read_i64<S: ByteSource>(source: &mut S) -> Result<i64> {
    Ok(unzigzag(read_u64(source)?))
}

/// ZigZag-map a signed integer onto the unsigned space
#[inline]
pub const fn zigzag(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

/// Invert the ZigZag mapping
#[inline]
pub const fn unzigzag(value: u64) -> i64 {
    ((value >> 1) as i64) ^ -((value & 1) as i64)
}
