//! Read side of the structured codec: a cheaply-cloneable cursor over an
//! `Arc<[u8]>`-backed buffer. Cloning a cursor is an `Arc` bump plus a
//! `usize` copy, matching the firmware's "cursors are cheap to clone and
//! passed by value" convention.

use std::sync::Arc;

use crate::error::{CodecError, CodecResult};
use crate::header::{self, MAJOR_ARRAY, MAJOR_BYTES, MAJOR_MAP, MAJOR_SIMPLE, MAJOR_TEXT, MAJOR_UNSIGNED};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Unsigned,
    Bytes,
    Text,
    Array,
    Map,
    Bool,
    Null,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cursor {
    data: Arc<[u8]>,
    offset: usize,
}

impl Cursor {
    pub fn new(data: impl Into<Arc<[u8]>>) -> Self {
        Self {
            data: data.into(),
            offset: 0,
        }
    }

    fn at(&self, offset: usize) -> Self {
        Self {
            data: self.data.clone(),
            offset,
        }
    }

    fn header(&self) -> CodecResult<header::Header> {
        header::decode_header(&self.data, self.offset)
    }

    pub fn kind(&self) -> CodecResult<ValueKind> {
        let h = self.header()?;
        match h.major {
            MAJOR_UNSIGNED => Ok(ValueKind::Unsigned),
            MAJOR_BYTES => Ok(ValueKind::Bytes),
            MAJOR_TEXT => Ok(ValueKind::Text),
            MAJOR_ARRAY => Ok(ValueKind::Array),
            MAJOR_MAP => Ok(ValueKind::Map),
            MAJOR_SIMPLE => {
                if h.value == header::SIMPLE_FALSE as u64 || h.value == header::SIMPLE_TRUE as u64 {
                    Ok(ValueKind::Bool)
                } else if h.value == header::SIMPLE_NULL as u64 {
                    Ok(ValueKind::Null)
                } else {
                    Err(CodecError::UnsupportedType)
                }
            }
            _ => Err(CodecError::UnsupportedType),
        }
    }

    /// Scalar value for `Unsigned` or `Bool` (0/1).
    pub fn value(&self) -> CodecResult<u64> {
        let h = self.header()?;
        match h.major {
            MAJOR_UNSIGNED => Ok(h.value),
            MAJOR_SIMPLE if h.value == header::SIMPLE_TRUE as u64 => Ok(1),
            MAJOR_SIMPLE if h.value == header::SIMPLE_FALSE as u64 => Ok(0),
            _ => Err(CodecError::InvalidOperation),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self.kind(), Ok(ValueKind::Null))
    }

    /// Borrow the raw payload bytes of a `Bytes` or `Text` value.
    pub fn data(&self) -> CodecResult<&[u8]> {
        let h = self.header()?;
        match h.major {
            MAJOR_BYTES | MAJOR_TEXT => {
                let start = self.offset + h.len;
                let len = h.value as usize;
                self.data
                    .get(start..start + len)
                    .ok_or(CodecError::BufferOverrun)
            }
            _ => Err(CodecError::InvalidOperation),
        }
    }

    pub fn as_str(&self) -> CodecResult<&str> {
        if self.kind()? != ValueKind::Text {
            return Err(CodecError::InvalidOperation);
        }
        std::str::from_utf8(self.data()?).map_err(|_| CodecError::InvalidOperation)
    }

    /// Copies payload bytes into `out`, returning the number of bytes
    /// copied. Errors with `Truncated` if `out` cannot hold the full value.
    pub fn copy_data(&self, out: &mut [u8]) -> CodecResult<usize> {
        let bytes = self.data()?;
        if out.len() < bytes.len() {
            return Err(CodecError::Truncated);
        }
        out[..bytes.len()].copy_from_slice(bytes);
        Ok(bytes.len())
    }

    /// Children count (array elements, map pairs) or byte length (bytes/text).
    pub fn length(&self) -> CodecResult<usize> {
        let h = self.header()?;
        match h.major {
            MAJOR_BYTES | MAJOR_TEXT | MAJOR_ARRAY | MAJOR_MAP => Ok(h.value as usize),
            _ => Err(CodecError::InvalidOperation),
        }
    }

    fn container_body_offset(&self) -> CodecResult<usize> {
        let h = self.header()?;
        match h.major {
            MAJOR_ARRAY | MAJOR_MAP => Ok(self.offset + h.len),
            _ => Err(CodecError::InvalidOperation),
        }
    }

    /// Total encoded byte span of the value at this cursor (header + payload,
    /// recursing into containers). Used to step past a value while iterating.
    fn encoded_len(&self) -> CodecResult<usize> {
        let h = self.header()?;
        match h.major {
            MAJOR_UNSIGNED => Ok(h.len),
            MAJOR_SIMPLE => Ok(h.len),
            MAJOR_BYTES | MAJOR_TEXT => Ok(h.len + h.value as usize),
            MAJOR_ARRAY => {
                let mut pos = self.offset + h.len;
                for _ in 0..h.value {
                    let child = self.at(pos);
                    pos += child.encoded_len()?;
                }
                Ok(pos - self.offset)
            }
            MAJOR_MAP => {
                let mut pos = self.offset + h.len;
                for _ in 0..(h.value * 2) {
                    let child = self.at(pos);
                    pos += child.encoded_len()?;
                }
                Ok(pos - self.offset)
            }
            _ => Err(CodecError::UnsupportedType),
        }
    }

    /// First element of an array, or `None` if empty.
    pub fn first_value(&self) -> CodecResult<Option<Cursor>> {
        if self.kind()? != ValueKind::Array {
            return Err(CodecError::InvalidOperation);
        }
        if self.length()? == 0 {
            return Ok(None);
        }
        Ok(Some(self.at(self.container_body_offset()?)))
    }

    /// Next sibling after `current`, which must have been produced by
    /// `first_value`/`next_value` on `self`.
    pub fn next_value(&self, current: &Cursor) -> CodecResult<Option<Cursor>> {
        if self.kind()? != ValueKind::Array {
            return Err(CodecError::InvalidOperation);
        }
        let next_offset = current.offset + current.encoded_len()?;
        let end = self.container_body_offset()? + {
            let mut pos = self.container_body_offset()?;
            for _ in 0..self.length()? {
                let c = self.at(pos);
                pos += c.encoded_len()?;
            }
            pos - self.container_body_offset()?
        };
        if next_offset >= end {
            return Ok(None);
        }
        Ok(Some(self.at(next_offset)))
    }

    /// Iterate array elements in order.
    pub fn array_iter(&self) -> CodecResult<ArrayIter> {
        if self.kind()? != ValueKind::Array {
            return Err(CodecError::InvalidOperation);
        }
        Ok(ArrayIter {
            cursor: self.at(self.container_body_offset()?),
            remaining: self.length()?,
        })
    }

    /// Iterate map entries as `(key, value)` cursor pairs in order.
    pub fn map_iter(&self) -> CodecResult<MapIter> {
        if self.kind()? != ValueKind::Map {
            return Err(CodecError::InvalidOperation);
        }
        Ok(MapIter {
            cursor: self.at(self.container_body_offset()?),
            remaining: self.length()?,
        })
    }

    /// Locate a map entry by key; error `NotFound` if absent.
    pub fn follow_key(&self, key: &str) -> CodecResult<Cursor> {
        for pair in self.map_iter()? {
            let (k, v) = pair?;
            if k.kind()? == ValueKind::Text && k.as_str()? == key {
                return Ok(v);
            }
        }
        Err(CodecError::NotFound)
    }

    /// Locate an array element by index; error `NotFound` if out of range.
    pub fn follow_index(&self, index: usize) -> CodecResult<Cursor> {
        self.array_iter()?
            .nth(index)
            .ok_or(CodecError::NotFound)?
    }
}

pub struct ArrayIter {
    cursor: Cursor,
    remaining: usize,
}

impl Iterator for ArrayIter {
    type Item = CodecResult<Cursor>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let item = self.cursor.clone();
        let advance = match item.encoded_len() {
            Ok(len) => len,
            Err(e) => {
                self.remaining = 0;
                return Some(Err(e));
            }
        };
        self.cursor.offset += advance;
        self.remaining -= 1;
        Some(Ok(item))
    }
}

pub struct MapIter {
    cursor: Cursor,
    remaining: usize,
}

impl Iterator for MapIter {
    type Item = CodecResult<(Cursor, Cursor)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let key = self.cursor.clone();
        let key_len = match key.encoded_len() {
            Ok(len) => len,
            Err(e) => {
                self.remaining = 0;
                return Some(Err(e));
            }
        };
        let value = self.cursor.at(key.offset + key_len);
        let value_len = match value.encoded_len() {
            Ok(len) => len,
            Err(e) => {
                self.remaining = 0;
                return Some(Err(e));
            }
        };
        self.cursor.offset = value.offset + value_len;
        self.remaining -= 1;
        Some(Ok((key, value)))
    }
}
