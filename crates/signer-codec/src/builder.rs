//! Write side of the structured codec.
//!
//! Two ways to write an array or map, matching the two shapes callers
//! actually have the count in: `append_array`/`append_map` write the
//! canonical minimal header immediately when the count is known up front
//! (the common case — a reply's field list, a fixed-size tuple). When the
//! count isn't known until every element has been written, `begin_array`/
//! `begin_map` reserve a placeholder header, track a running count as
//! children are appended through the same builder, and `end_array`/
//! `end_map` patch the true count in — shrinking the placeholder down to
//! its minimal canonical form and shifting the already-written children
//! left, the same compaction shape the RLP builder uses for its own
//! headers.

use crate::error::{CodecError, CodecResult};
use crate::header::{self, MAJOR_ARRAY, MAJOR_BYTES, MAJOR_MAP, MAJOR_SIMPLE, MAJOR_TEXT, MAJOR_UNSIGNED};

/// Reserved header width: always written as an 8-byte-value (27) form so the
/// count can grow without moving already-written children.
const RESERVED_HEADER_LEN: usize = 9;

pub struct Builder<'a> {
    out: &'a mut [u8],
    pos: usize,
}

/// Handle returned by `begin_array`, consumed by `end_array`. Carries the
/// header offset to patch and the running element count.
pub struct ArrayHandle {
    header_offset: usize,
    count: u64,
}

/// Handle returned by `begin_map`, consumed by `end_map`. Carries the header
/// offset to patch and the running pair count.
pub struct MapHandle {
    header_offset: usize,
    pairs: u64,
}

impl<'a> Builder<'a> {
    pub fn new(out: &'a mut [u8]) -> Self {
        Self { out, pos: 0 }
    }

    pub fn len(&self) -> usize {
        self.pos
    }

    pub fn finished(&self) -> &[u8] {
        &self.out[..self.pos]
    }

    fn remaining(&self) -> usize {
        self.out.len() - self.pos
    }

    pub fn append_null(&mut self) -> CodecResult<()> {
        self.write_header(MAJOR_SIMPLE, header::SIMPLE_NULL as u64)
    }

    pub fn append_boolean(&mut self, value: bool) -> CodecResult<()> {
        let simple = if value { header::SIMPLE_TRUE } else { header::SIMPLE_FALSE };
        self.write_header(MAJOR_SIMPLE, simple as u64)
    }

    pub fn append_number(&mut self, value: u64) -> CodecResult<()> {
        self.write_header(MAJOR_UNSIGNED, value)
    }

    pub fn append_data(&mut self, bytes: &[u8]) -> CodecResult<()> {
        self.write_header(MAJOR_BYTES, bytes.len() as u64)?;
        self.write_raw(bytes)
    }

    pub fn append_string(&mut self, text: &str) -> CodecResult<()> {
        self.write_header(MAJOR_TEXT, text.len() as u64)?;
        self.write_raw(text.as_bytes())
    }

    /// Appends the already-encoded bytes of a value verbatim, e.g. to splice
    /// in a cursor's span without re-decoding it.
    pub fn append_raw(&mut self, encoded: &[u8]) -> CodecResult<()> {
        self.write_raw(encoded)
    }

    /// Writes a `count`-element array header immediately in its minimal
    /// canonical form. The caller appends exactly `count` elements next;
    /// there's no handle to close since the count never needs patching.
    pub fn append_array(&mut self, count: usize) -> CodecResult<()> {
        self.write_header(MAJOR_ARRAY, count as u64)
    }

    /// Writes a `count`-pair map header immediately in its minimal canonical
    /// form. The caller appends exactly `count` key/value pairs next.
    pub fn append_map(&mut self, count: usize) -> CodecResult<()> {
        self.write_header(MAJOR_MAP, count as u64)
    }

    pub fn begin_array(&mut self) -> CodecResult<ArrayHandle> {
        let header_offset = self.pos;
        self.reserve_header()?;
        Ok(ArrayHandle { header_offset, count: 0 })
    }

    /// Appends a child to an open array. Call once per element between
    /// `begin_array` and `end_array`.
    pub fn array_element(&mut self, handle: &mut ArrayHandle, write: impl FnOnce(&mut Self) -> CodecResult<()>) -> CodecResult<()> {
        write(self)?;
        handle.count += 1;
        Ok(())
    }

    pub fn end_array(&mut self, handle: ArrayHandle) -> CodecResult<()> {
        self.patch_header(handle.header_offset, MAJOR_ARRAY, handle.count)
    }

    pub fn begin_map(&mut self) -> CodecResult<MapHandle> {
        let header_offset = self.pos;
        self.reserve_header()?;
        Ok(MapHandle { header_offset, pairs: 0 })
    }

    /// Appends a key/value pair to an open map. `write_key` and `write_value`
    /// each append exactly one value.
    pub fn map_entry(
        &mut self,
        handle: &mut MapHandle,
        write_key: impl FnOnce(&mut Self) -> CodecResult<()>,
        write_value: impl FnOnce(&mut Self) -> CodecResult<()>,
    ) -> CodecResult<()> {
        write_key(self)?;
        write_value(self)?;
        handle.pairs += 1;
        Ok(())
    }

    pub fn end_map(&mut self, handle: MapHandle) -> CodecResult<()> {
        self.patch_header(handle.header_offset, MAJOR_MAP, handle.pairs)
    }

    fn write_header(&mut self, major: u8, value: u64) -> CodecResult<()> {
        let written = header::encode_header(self.out, self.pos, major, value)?;
        self.pos += written;
        Ok(())
    }

    fn write_raw(&mut self, bytes: &[u8]) -> CodecResult<()> {
        if self.remaining() < bytes.len() {
            tracing::trace!(remaining = self.remaining(), needed = bytes.len(), "codec buffer overrun");
            return Err(CodecError::BufferOverrun);
        }
        self.out[self.pos..self.pos + bytes.len()].copy_from_slice(bytes);
        self.pos += bytes.len();
        Ok(())
    }

    /// Reserves a fixed-width placeholder header (major/count unknown yet)
    /// and advances past it so children can be written immediately.
    fn reserve_header(&mut self) -> CodecResult<()> {
        if self.remaining() < RESERVED_HEADER_LEN {
            return Err(CodecError::BufferOverrun);
        }
        self.pos += RESERVED_HEADER_LEN;
        Ok(())
    }

    /// Shrinks a previously reserved placeholder header down to the minimal
    /// canonical form for the now-known `value`, shifting the children
    /// already written after it left by the size difference.
    fn patch_header(&mut self, header_offset: usize, major: u8, value: u64) -> CodecResult<()> {
        let minimal_len = header::header_len(value);
        let body_start = header_offset + RESERVED_HEADER_LEN;
        let body_len = self.pos - body_start;
        let new_body_start = header_offset + minimal_len;

        if minimal_len != RESERVED_HEADER_LEN {
            self.out.copy_within(body_start..body_start + body_len, new_body_start);
        }
        header::encode_header(self.out, header_offset, major, value)?;
        self.pos = new_body_start + body_len;
        Ok(())
    }
}
