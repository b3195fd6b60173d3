//! Recursive-length-prefix encoder for EIP-1559-shaped transactions.
//!
//! Every item is either Data (a byte string) or an Array of items. A header
//! byte's top two bits select the kind; the bottom six bits give either an
//! inline length (0..=55) or how many trailing big-endian bytes carry a
//! longer length, and that trailing length is always minimally encoded. A
//! single byte in `0x00..=0x7f` needs no header at all.
//!
//! Arrays are built two-phase: `begin_array` doesn't yet know the byte
//! length of its children, only their count, so it reserves a fixed-width
//! placeholder header carrying that count. `Builder::finish` walks the
//! buffer depth-first, replacing each placeholder with its true compact
//! header once the children beneath it are known, compacting the buffer in
//! place as it goes.

mod error;

pub use error::{RlpError, RlpResult};

const TAG_ARRAY: u8 = 0xc0;
const TAG_DATA: u8 = 0x80;
const TAG_MASK: u8 = 0xc0;
/// Internal hint to `append_header`: always use the reserved 4-byte form
/// regardless of the item count, since the true byte length isn't known yet.
const TAG_RESERVE: u8 = 0x00;

fn byte_count_for(value: usize) -> usize {
    if value < 0x100 {
        1
    } else if value < 0x1_0000 {
        2
    } else if value < 0x100_0000 {
        3
    } else {
        4
    }
}

/// Handle returned by `Builder::begin_array`, consumed by `Builder::end_array`.
pub struct ArrayHandle {
    offset: usize,
    expected: usize,
    appended: usize,
}

pub struct Builder<'a> {
    data: &'a mut [u8],
    offset: usize,
    length: usize,
}

impl<'a> Builder<'a> {
    pub fn new(data: &'a mut [u8]) -> Self {
        Self {
            data,
            offset: 0,
            length: 0,
        }
    }

    fn append_byte(&mut self, byte: u8) -> RlpResult<()> {
        if self.offset >= self.data.len() {
            return Err(RlpError::BufferOverrun);
        }
        self.data[self.offset] = byte;
        self.offset += 1;
        Ok(())
    }

    fn append_bytes(&mut self, bytes: &[u8]) -> RlpResult<()> {
        let end = self.offset + bytes.len();
        if end > self.data.len() {
            tracing::trace!(capacity = self.data.len(), needed = end, "rlp buffer overrun");
            return Err(RlpError::BufferOverrun);
        }
        self.data[self.offset..end].copy_from_slice(bytes);
        self.offset = end;
        Ok(())
    }

    fn append_header(&mut self, tag: u8, length: usize) -> RlpResult<()> {
        if tag != TAG_RESERVE && length <= 55 {
            return self.append_byte(tag + length as u8);
        }

        let (tag, byte_count) = if tag == TAG_RESERVE {
            (TAG_ARRAY, 4)
        } else {
            (tag, byte_count_for(length))
        };

        self.append_byte(tag + 55 + byte_count as u8)?;
        for i in (0..byte_count).rev() {
            self.append_byte((length >> (8 * i)) as u8)?;
        }
        Ok(())
    }

    /// Appends a Data item. A single byte `<= 0x7f` is written verbatim with
    /// no header.
    pub fn append_data(&mut self, bytes: &[u8]) -> RlpResult<()> {
        if bytes.len() == 1 && bytes[0] <= 0x7f {
            return self.append_byte(bytes[0]);
        }
        self.append_header(TAG_DATA, bytes.len())?;
        self.append_bytes(bytes)
    }

    pub fn append_string(&mut self, text: &str) -> RlpResult<()> {
        self.append_data(text.as_bytes())
    }

    /// Begins an array of `count` items. A zero-length array is written in
    /// its final compact form immediately; a non-empty array reserves a
    /// fixed-width placeholder header to be compacted on `Builder::finish`.
    pub fn begin_array(&mut self, count: usize) -> RlpResult<ArrayHandle> {
        let offset = self.offset;
        self.append_header(if count == 0 { TAG_ARRAY } else { TAG_RESERVE }, count)?;
        Ok(ArrayHandle {
            offset,
            expected: count,
            appended: 0,
        })
    }

    /// Appends one child of an open array via `write`, which must append
    /// exactly one item (a scalar, or a nested array closed with `end_array`).
    pub fn array_item(
        &mut self,
        handle: &mut ArrayHandle,
        write: impl FnOnce(&mut Self) -> RlpResult<()>,
    ) -> RlpResult<()> {
        write(self)?;
        handle.appended += 1;
        Ok(())
    }

    pub fn end_array(&mut self, handle: ArrayHandle) -> RlpResult<()> {
        if handle.appended != handle.expected {
            return Err(RlpError::CountMismatch {
                expected: handle.expected,
                actual: handle.appended,
            });
        }
        let _ = handle.offset; // retained for symmetry with begin_array; compaction is deferred to finish()
        Ok(())
    }

    fn read_value(bytes: &[u8]) -> usize {
        bytes.iter().fold(0usize, |v, b| (v << 8) | *b as usize)
    }

    /// Recursively compacts the item at the current `offset`, returning its
    /// final encoded length and leaving `offset` unchanged (the caller
    /// advances it).
    fn finalize_item(&mut self) -> RlpResult<usize> {
        let start = self.offset;
        let v = self.data[start];

        if v <= 0x7f {
            return Ok(1);
        }

        if (v & TAG_MASK) == TAG_DATA || v != (TAG_ARRAY + 55 + 4) {
            let mut len = (v & 0x3f) as usize;
            if len <= 55 {
                return Ok(1 + len);
            }
            len -= 55;
            if len > 4 {
                return Err(RlpError::Overflow);
            }
            let value = Self::read_value(&self.data[start + 1..start + 1 + len]);
            return Ok(1 + len + value);
        }

        // Reserved (non-compact) array: header is tag byte + 4-byte count.
        let base_offset = start;
        let data_offset = base_offset + 5;
        let count = Self::read_value(&self.data[base_offset + 1..base_offset + 5]);

        self.offset = data_offset;
        let mut length = 0usize;
        for _ in 0..count {
            let item_len = self.finalize_item()?;
            self.offset += item_len;
            length += item_len;
        }

        self.offset = base_offset;
        self.append_header(TAG_ARRAY, length)?;
        let header_end = self.offset;

        if header_end != data_offset {
            let tail_len = self.length - data_offset;
            self.data.copy_within(data_offset..data_offset + tail_len, header_end);
        }

        let total = header_end - base_offset + length;
        self.offset = base_offset;
        Ok(total)
    }

    /// Compacts every reserved array header in the buffer and returns the
    /// finalized encoding. The builder must hold exactly one top-level item.
    pub fn finish(mut self) -> RlpResult<&'a [u8]> {
        self.length = self.offset;
        self.offset = 0;
        let total = self.finalize_item()?;
        Ok(&self.data[..total])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_byte_has_no_header() {
        let mut buf = [0u8; 8];
        let mut b = Builder::new(&mut buf);
        b.append_data(&[0x00]).unwrap();
        assert_eq!(b.finish().unwrap(), &[0x00]);
    }

    #[test]
    fn short_string_header() {
        let mut buf = [0u8; 8];
        let mut b = Builder::new(&mut buf);
        b.append_string("dog").unwrap();
        assert_eq!(b.finish().unwrap(), &[0x83, b'd', b'o', b'g']);
    }

    #[test]
    fn empty_data_is_single_byte() {
        let mut buf = [0u8; 8];
        let mut b = Builder::new(&mut buf);
        b.append_data(&[]).unwrap();
        assert_eq!(b.finish().unwrap(), &[0x80]);
    }

    #[test]
    fn empty_array_is_single_byte() {
        let mut buf = [0u8; 8];
        let mut b = Builder::new(&mut buf);
        let arr = b.begin_array(0).unwrap();
        b.end_array(arr).unwrap();
        assert_eq!(b.finish().unwrap(), &[0xc0]);
    }

    #[test]
    fn two_item_list_matches_reference_encoding() {
        let mut buf = [0u8; 16];
        let mut b = Builder::new(&mut buf);
        let mut arr = b.begin_array(2).unwrap();
        b.array_item(&mut arr, |b| b.append_string("cat")).unwrap();
        b.array_item(&mut arr, |b| b.append_string("dog")).unwrap();
        b.end_array(arr).unwrap();
        assert_eq!(
            b.finish().unwrap(),
            &[0xc8, 0x83, b'c', b'a', b't', 0x83, b'd', b'o', b'g']
        );
    }

    #[test]
    fn nested_arrays_compact_bottom_up() {
        let mut buf = [0u8; 32];
        let mut b = Builder::new(&mut buf);
        let mut outer = b.begin_array(2).unwrap();
        b.array_item(&mut outer, |b| b.append_data(&[0x01])).unwrap();
        b.array_item(&mut outer, |b| {
            let mut inner = b.begin_array(2).unwrap();
            b.array_item(&mut inner, |b| b.append_string("a")).unwrap();
            b.array_item(&mut inner, |b| b.append_string("b")).unwrap();
            b.end_array(inner)
        })
        .unwrap();
        b.end_array(outer).unwrap();

        let encoded = b.finish().unwrap();
        assert_eq!(encoded, &[0xc4, 0x01, 0xc2, 0x61, 0x62]);
    }

    #[test]
    fn nested_array_followed_by_a_sibling_does_not_drift() {
        let mut buf = [0u8; 32];
        let mut b = Builder::new(&mut buf);
        let mut outer = b.begin_array(2).unwrap();
        b.array_item(&mut outer, |b| {
            let mut inner = b.begin_array(2).unwrap();
            b.array_item(&mut inner, |b| b.append_string("a")).unwrap();
            b.array_item(&mut inner, |b| b.append_string("b")).unwrap();
            b.end_array(inner)
        })
        .unwrap();
        b.array_item(&mut outer, |b| b.append_string("dog")).unwrap();
        b.end_array(outer).unwrap();

        let encoded = b.finish().unwrap();
        assert_eq!(encoded, &[0xc7, 0xc2, 0x61, 0x62, 0x83, 0x64, 0x6f, 0x67]);
    }

    #[test]
    fn miscounted_array_is_rejected() {
        let mut buf = [0u8; 16];
        let mut b = Builder::new(&mut buf);
        let mut arr = b.begin_array(2).unwrap();
        b.array_item(&mut arr, |b| b.append_string("cat")).unwrap();
        assert_eq!(
            b.end_array(arr),
            Err(RlpError::CountMismatch { expected: 2, actual: 1 })
        );
    }
}
