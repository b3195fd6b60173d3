//! Self-describing structured binary codec: a CBOR-like wire format with a
//! zero-copy read-side `Cursor` and a bounded-buffer write-side `Builder`.
//!
//! Every value on the wire is a single type byte (`major << 5 | info`)
//! optionally followed by big-endian length/value bytes, then payload bytes
//! for byte strings, text strings, arrays, and maps. This is the format
//! messages, replies, and event payloads are carried in across the rest of
//! the workspace.

mod builder;
mod cursor;
mod error;
mod header;

pub use builder::{ArrayHandle, Builder, MapHandle};
pub use cursor::{ArrayIter, Cursor, MapIter, ValueKind};
pub use error::{CodecError, CodecResult};

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_scalar_message() -> Vec<u8> {
        let mut buf = [0u8; 128];
        let mut b = Builder::new(&mut buf);
        let mut map = b.begin_map().unwrap();
        b.map_entry(
            &mut map,
            |b| b.append_string("v"),
            |b| b.append_number(1),
        )
        .unwrap();
        b.map_entry(
            &mut map,
            |b| b.append_string("id"),
            |b| b.append_number(42),
        )
        .unwrap();
        b.map_entry(
            &mut map,
            |b| b.append_string("method"),
            |b| b.append_string("getAddress"),
        )
        .unwrap();
        b.end_map(map).unwrap();
        b.finished().to_vec()
    }

    #[test]
    fn round_trips_scalar_and_text_fields() {
        let bytes = encode_scalar_message();
        let cursor = Cursor::new(bytes);
        assert_eq!(cursor.kind().unwrap(), ValueKind::Map);
        assert_eq!(cursor.length().unwrap(), 3);

        let v = cursor.follow_key("v").unwrap();
        assert_eq!(v.value().unwrap(), 1);

        let id = cursor.follow_key("id").unwrap();
        assert_eq!(id.value().unwrap(), 42);

        let method = cursor.follow_key("method").unwrap();
        assert_eq!(method.as_str().unwrap(), "getAddress");
    }

    #[test]
    fn missing_key_is_not_found() {
        let bytes = encode_scalar_message();
        let cursor = Cursor::new(bytes);
        assert_eq!(cursor.follow_key("nope"), Err(CodecError::NotFound));
    }

    #[test]
    fn nested_array_iterates_in_order() {
        let mut buf = [0u8; 64];
        let mut b = Builder::new(&mut buf);
        let mut arr = b.begin_array().unwrap();
        for n in [10u64, 20, 30] {
            b.array_element(&mut arr, |b| b.append_number(n)).unwrap();
        }
        b.end_array(arr).unwrap();
        let bytes = b.finished().to_vec();

        let cursor = Cursor::new(bytes);
        let values: Vec<u64> = cursor
            .array_iter()
            .unwrap()
            .map(|c| c.unwrap().value().unwrap())
            .collect();
        assert_eq!(values, vec![10, 20, 30]);
        assert_eq!(cursor.follow_index(1).unwrap().value().unwrap(), 20);
    }

    #[test]
    fn data_payload_copies_out() {
        let mut buf = [0u8; 32];
        let mut b = Builder::new(&mut buf);
        b.append_data(&[1, 2, 3, 4]).unwrap();
        let bytes = b.finished().to_vec();

        let cursor = Cursor::new(bytes);
        let mut out = [0u8; 4];
        let n = cursor.copy_data(&mut out).unwrap();
        assert_eq!(n, 4);
        assert_eq!(out, [1, 2, 3, 4]);

        let mut too_small = [0u8; 2];
        assert_eq!(cursor.copy_data(&mut too_small), Err(CodecError::Truncated));
    }

    #[test]
    fn buffer_overrun_on_truncated_wire_data() {
        let cursor = Cursor::new(vec![0x02, 0xff]); // claims 0xff bytes of data, has none
        assert_eq!(cursor.data(), Err(CodecError::BufferOverrun));
    }

    #[test]
    fn small_array_header_shrinks_to_one_byte() {
        let mut buf = [0u8; 64];
        let mut b = Builder::new(&mut buf);
        let mut arr = b.begin_array().unwrap();
        for n in [1u64, 2, 3] {
            b.array_element(&mut arr, |b| b.append_number(n)).unwrap();
        }
        b.end_array(arr).unwrap();
        let bytes = b.finished().to_vec();

        // 3 numbers under 23 each encode as one byte; a 3-element array
        // header should be one byte too, not the 9-byte reserved form.
        assert_eq!(bytes.len(), 1 + 3);
        assert_eq!(bytes[0] >> 5, 4); // MAJOR_ARRAY
        assert_eq!(bytes[0] & 0x1f, 3);
    }

    #[test]
    fn append_array_writes_a_minimal_header_up_front() {
        let mut buf = [0u8; 16];
        let mut b = Builder::new(&mut buf);
        b.append_array(2).unwrap();
        b.append_number(1).unwrap();
        b.append_number(2).unwrap();
        let bytes = b.finished().to_vec();

        assert_eq!(bytes, vec![0x82, 1, 2]);
        let cursor = Cursor::new(bytes);
        assert_eq!(cursor.kind().unwrap(), ValueKind::Array);
        assert_eq!(cursor.length().unwrap(), 2);
    }

    #[test]
    fn cloning_cursor_is_independent() {
        let bytes = encode_scalar_message();
        let cursor = Cursor::new(bytes);
        let method = cursor.follow_key("method").unwrap();
        let cloned = method.clone();
        assert_eq!(cloned.as_str().unwrap(), method.as_str().unwrap());
    }
}
