//! Wire-level type byte encoding shared by the cursor and the builder.
//!
//! Type byte layout: `(major << 5) | info`. `major` selects unsigned
//! integer / byte string / text string / array / map / simple (bool, null).
//! `info` is either an immediate value (0..=23) or a byte-count selector
//! (24/25/26/27 meaning 1/2/4/8 big-endian bytes follow).

use crate::error::{CodecError, CodecResult};

pub const MAJOR_UNSIGNED: u8 = 0;
pub const MAJOR_BYTES: u8 = 2;
pub const MAJOR_TEXT: u8 = 3;
pub const MAJOR_ARRAY: u8 = 4;
pub const MAJOR_MAP: u8 = 5;
pub const MAJOR_SIMPLE: u8 = 7;

pub const SIMPLE_FALSE: u8 = 20;
pub const SIMPLE_TRUE: u8 = 21;
pub const SIMPLE_NULL: u8 = 22;

pub struct Header {
    pub major: u8,
    /// Decoded immediate/length/count value.
    pub value: u64,
    /// Total bytes occupied by the header itself (type byte + follow bytes).
    pub len: usize,
}

/// Number of trailing big-endian bytes a given `info` nibble selects, or
/// `None` if `info` is an immediate value or an indefinite/reserved form.
fn follow_bytes(info: u8) -> CodecResult<Option<usize>> {
    match info {
        0..=23 => Ok(None),
        24 => Ok(Some(1)),
        25 => Ok(Some(2)),
        26 => Ok(Some(4)),
        27 => Ok(Some(8)),
        _ => Err(CodecError::UnsupportedType),
    }
}

pub fn decode_header(data: &[u8], offset: usize) -> CodecResult<Header> {
    let byte = *data.get(offset).ok_or(CodecError::BufferOverrun)?;
    let major = byte >> 5;
    let info = byte & 0x1f;

    if major > MAJOR_SIMPLE {
        return Err(CodecError::UnsupportedType);
    }

    match follow_bytes(info)? {
        None => Ok(Header {
            major,
            value: info as u64,
            len: 1,
        }),
        Some(count) => {
            let start = offset + 1;
            let end = start + count;
            let bytes = data.get(start..end).ok_or(CodecError::BufferOverrun)?;
            let mut value: u64 = 0;
            for b in bytes {
                value = (value << 8) | (*b as u64);
            }
            // A byte/text length or an array/map count must fit a 32-bit
            // length on this target; a plain unsigned scalar has no such
            // ceiling short of u64's own range.
            if major != MAJOR_UNSIGNED && value > u32::MAX as u64 {
                return Err(CodecError::Overflow);
            }
            Ok(Header {
                major,
                value,
                len: 1 + count,
            })
        }
    }
}

/// Minimal byte count needed to hold `value` in a follow-byte form, or
/// `None` if it fits as an immediate (`value <= 23`).
fn minimal_follow_len(value: u64) -> Option<usize> {
    if value <= 23 {
        None
    } else if value <= 0xff {
        Some(1)
    } else if value <= 0xffff {
        Some(2)
    } else if value <= 0xffff_ffff {
        Some(4)
    } else {
        Some(8)
    }
}

fn info_for_len(len: usize) -> u8 {
    match len {
        1 => 24,
        2 => 25,
        4 => 26,
        8 => 27,
        _ => unreachable!("minimal_follow_len only returns 1/2/4/8"),
    }
}

/// Encodes `major` + `value` (an immediate, a length, or a count) into
/// `out[offset..]`, returning the number of bytes written.
pub fn encode_header(out: &mut [u8], offset: usize, major: u8, value: u64) -> CodecResult<usize> {
    match minimal_follow_len(value) {
        None => {
            let byte = out.get_mut(offset).ok_or(CodecError::BufferOverrun)?;
            *byte = (major << 5) | (value as u8);
            Ok(1)
        }
        Some(count) => {
            if offset + 1 + count > out.len() {
                return Err(CodecError::BufferOverrun);
            }
            out[offset] = (major << 5) | info_for_len(count);
            for i in 0..count {
                let shift = 8 * (count - 1 - i);
                out[offset + 1 + i] = (value >> shift) as u8;
            }
            Ok(1 + count)
        }
    }
}

/// Size a header for `value` would occupy, without writing anything.
pub fn header_len(value: u64) -> usize {
    match minimal_follow_len(value) {
        None => 1,
        Some(count) => 1 + count,
    }
}
