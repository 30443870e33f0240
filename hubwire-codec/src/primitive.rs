//! MessagePack primitive reader and writer.
//!
//! The writer delegates to `rmp::encode`, which always picks the smallest
//! encoding for a value. The reader drives `rmp::decode` over a borrowed
//! buffer and accepts every valid width, so peers that encode less tightly
//! still parse.

use std::io;

use hubwire_core::{CodecError, DEFAULT_MAX_NESTING_DEPTH, Value};
use rmp::Marker;
use rmp::decode::{self, NumValueReadError, ValueReadError};
use rmp::encode;

fn write_error(e: impl std::fmt::Display) -> CodecError {
    CodecError::Serialization(e.to_string())
}

fn length_u32(len: usize, what: &str) -> Result<u32, CodecError> {
    u32::try_from(len)
        .map_err(|_| CodecError::Serialization(format!("{what} of {len} elements is too long")))
}

/// Appends MessagePack values to an owned buffer.
#[derive(Debug, Default)]
pub struct MessagePackWriter {
    buf: Vec<u8>,
}

impl MessagePackWriter {
    /// Create an empty writer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a writer with preallocated space.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    /// Write a signed integer.
    pub fn write_int(&mut self, v: i64) -> Result<(), CodecError> {
        encode::write_sint(&mut self.buf, v).map_err(write_error)?;
        Ok(())
    }

    /// Write an unsigned integer.
    pub fn write_uint(&mut self, v: u64) -> Result<(), CodecError> {
        encode::write_uint(&mut self.buf, v).map_err(write_error)?;
        Ok(())
    }

    /// Write a 64-bit float.
    pub fn write_f64(&mut self, v: f64) -> Result<(), CodecError> {
        encode::write_f64(&mut self.buf, v).map_err(write_error)
    }

    /// Write a UTF-8 string.
    pub fn write_str(&mut self, v: &str) -> Result<(), CodecError> {
        encode::write_str(&mut self.buf, v).map_err(write_error)
    }

    /// Write a byte sequence.
    pub fn write_bytes(&mut self, v: &[u8]) -> Result<(), CodecError> {
        encode::write_bin(&mut self.buf, v).map_err(write_error)
    }

    /// Write the header of a map with `len` entries.
    pub fn write_map_header(&mut self, len: usize) -> Result<(), CodecError> {
        encode::write_map_len(&mut self.buf, length_u32(len, "map")?).map_err(write_error)?;
        Ok(())
    }

    /// Write the header of an array with `len` elements.
    pub fn write_array_header(&mut self, len: usize) -> Result<(), CodecError> {
        encode::write_array_len(&mut self.buf, length_u32(len, "array")?).map_err(write_error)?;
        Ok(())
    }

    /// Write `nil`.
    pub fn write_nil(&mut self) -> Result<(), CodecError> {
        encode::write_nil(&mut self.buf).map_err(write_error)
    }

    /// Write a boolean.
    pub fn write_bool(&mut self, v: bool) -> Result<(), CodecError> {
        encode::write_bool(&mut self.buf, v).map_err(write_error)
    }

    /// Write an extension value.
    pub fn write_ext(&mut self, type_id: i8, data: &[u8]) -> Result<(), CodecError> {
        encode::write_ext_meta(&mut self.buf, length_u32(data.len(), "ext")?, type_id)
            .map_err(write_error)?;
        self.buf.extend_from_slice(data);
        Ok(())
    }

    /// Write a string, or `nil` when absent.
    pub fn write_str_or_nil(&mut self, v: Option<&str>) -> Result<(), CodecError> {
        match v {
            Some(s) => self.write_str(s),
            None => self.write_nil(),
        }
    }

    /// Write any value.
    pub fn write_value(&mut self, value: &Value) -> Result<(), CodecError> {
        match value {
            Value::Nil => self.write_nil(),
            Value::Bool(b) => self.write_bool(*b),
            Value::Int(i) => self.write_int(*i),
            Value::UInt(u) => self.write_uint(*u),
            Value::Float(f) => self.write_f64(*f),
            Value::String(s) => self.write_str(s),
            Value::Bytes(b) => self.write_bytes(b),
            Value::Array(items) => {
                self.write_array_header(items.len())?;
                for item in items {
                    self.write_value(item)?;
                }
                Ok(())
            }
            Value::Map(entries) => {
                self.write_map_header(entries.len())?;
                for (k, v) in entries {
                    self.write_value(k)?;
                    self.write_value(v)?;
                }
                Ok(())
            }
            Value::Ext(type_id, data) => self.write_ext(*type_id, data),
        }
    }

    /// Number of bytes written so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Check if nothing has been written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Bytes written so far.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    /// Take the written bytes.
    #[must_use]
    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }
}

/// Cursor reading MessagePack values from a byte slice.
///
/// Every `read_*` call either consumes exactly one value and advances, or
/// fails. `InsufficientData` means the slice ended mid-value; any other error
/// means the bytes are not valid for the requested read.
#[derive(Debug, Clone)]
pub struct MessagePackReader<'a> {
    buf: &'a [u8],
    rest: &'a [u8],
    max_depth: usize,
}

impl<'a> MessagePackReader<'a> {
    /// Create a reader with the default nesting limit.
    #[must_use]
    pub fn new(buf: &'a [u8]) -> Self {
        Self::with_max_depth(buf, DEFAULT_MAX_NESTING_DEPTH)
    }

    /// Create a reader that rejects values nested deeper than `max_depth`.
    #[must_use]
    pub fn with_max_depth(buf: &'a [u8], max_depth: usize) -> Self {
        Self {
            buf,
            rest: buf,
            max_depth,
        }
    }

    /// Bytes consumed so far.
    #[inline]
    #[must_use]
    pub fn position(&self) -> usize {
        self.buf.len() - self.rest.len()
    }

    /// Bytes left to read.
    #[inline]
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.rest.len()
    }

    fn take(&mut self, len: u32) -> Result<&'a [u8], CodecError> {
        let len = usize::try_from(len)
            .map_err(|_| CodecError::malformed("length does not fit in memory"))?;
        if self.rest.len() < len {
            return Err(CodecError::InsufficientData);
        }
        let (head, tail) = self.rest.split_at(len);
        self.rest = tail;
        Ok(head)
    }

    /// Read the next marker byte.
    pub fn read_marker(&mut self) -> Result<Marker, CodecError> {
        decode::read_marker(&mut self.rest).map_err(|e| io_error(e.0))
    }

    /// Look at the next marker without consuming it.
    pub fn peek_marker(&self) -> Result<Marker, CodecError> {
        self.rest
            .first()
            .map(|&b| Marker::from_u8(b))
            .ok_or(CodecError::InsufficientData)
    }

    /// Check whether the next value is `nil`.
    pub fn peek_nil(&self) -> Result<bool, CodecError> {
        Ok(self.peek_marker()? == Marker::Null)
    }

    /// Read `nil`.
    pub fn read_nil(&mut self) -> Result<(), CodecError> {
        decode::read_nil(&mut self.rest).map_err(|e| value_error("nil", e))
    }

    /// Read a boolean.
    pub fn read_bool(&mut self) -> Result<bool, CodecError> {
        decode::read_bool(&mut self.rest).map_err(|e| value_error("bool", e))
    }

    /// Read an integer of any width that fits in `i64`.
    pub fn read_int(&mut self) -> Result<i64, CodecError> {
        decode::read_int(&mut self.rest).map_err(num_error)
    }

    /// Read a UTF-8 string.
    pub fn read_str(&mut self) -> Result<String, CodecError> {
        let len = decode::read_str_len(&mut self.rest).map_err(|e| value_error("string", e))?;
        let bytes = self.take(len)?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|e| CodecError::malformed(format!("invalid UTF-8 in string: {e}")))
    }

    /// Read a string, or `None` for `nil`.
    pub fn read_str_or_nil(&mut self) -> Result<Option<String>, CodecError> {
        if self.peek_nil()? {
            self.read_nil()?;
            return Ok(None);
        }
        self.read_str().map(Some)
    }

    /// Read a byte sequence.
    pub fn read_bytes(&mut self) -> Result<Vec<u8>, CodecError> {
        let len = decode::read_bin_len(&mut self.rest).map_err(|e| value_error("bytes", e))?;
        Ok(self.take(len)?.to_vec())
    }

    /// Read an array header and return the element count.
    pub fn read_array_header(&mut self) -> Result<usize, CodecError> {
        let len =
            decode::read_array_len(&mut self.rest).map_err(|e| value_error("array", e))?;
        count(len)
    }

    /// Read a map header and return the entry count.
    pub fn read_map_header(&mut self) -> Result<usize, CodecError> {
        let len = decode::read_map_len(&mut self.rest).map_err(|e| value_error("map", e))?;
        count(len)
    }

    /// Read any value into its generic form.
    pub fn read_value(&mut self) -> Result<Value, CodecError> {
        self.read_value_at(0)
    }

    /// Consume one value of any kind.
    pub fn skip_value(&mut self) -> Result<(), CodecError> {
        self.read_value().map(drop)
    }

    fn read_value_at(&mut self, depth: usize) -> Result<Value, CodecError> {
        let value = match self.peek_marker()? {
            Marker::Null => {
                self.read_nil()?;
                Value::Nil
            }
            Marker::True | Marker::False => Value::Bool(self.read_bool()?),
            Marker::U64 => {
                let v: u64 = decode::read_int(&mut self.rest).map_err(num_error)?;
                Value::from(v)
            }
            Marker::FixPos(_)
            | Marker::FixNeg(_)
            | Marker::U8
            | Marker::U16
            | Marker::U32
            | Marker::I8
            | Marker::I16
            | Marker::I32
            | Marker::I64 => Value::Int(self.read_int()?),
            Marker::F32 => {
                let v = decode::read_f32(&mut self.rest).map_err(|e| value_error("float", e))?;
                Value::Float(f64::from(v))
            }
            Marker::F64 => {
                Value::Float(decode::read_f64(&mut self.rest).map_err(|e| value_error("float", e))?)
            }
            Marker::FixStr(_) | Marker::Str8 | Marker::Str16 | Marker::Str32 => {
                Value::String(self.read_str()?)
            }
            Marker::Bin8 | Marker::Bin16 | Marker::Bin32 => Value::Bytes(self.read_bytes()?),
            Marker::FixArray(_) | Marker::Array16 | Marker::Array32 => {
                let len = self.read_array_header()?;
                self.check_depth(depth)?;
                // Every element takes at least one byte
                let mut items = Vec::with_capacity(len.min(self.remaining()));
                for _ in 0..len {
                    items.push(self.read_value_at(depth + 1)?);
                }
                Value::Array(items)
            }
            Marker::FixMap(_) | Marker::Map16 | Marker::Map32 => {
                let len = self.read_map_header()?;
                self.check_depth(depth)?;
                let mut entries = Vec::with_capacity(len.min(self.remaining() / 2));
                for _ in 0..len {
                    let key = self.read_value_at(depth + 1)?;
                    let value = self.read_value_at(depth + 1)?;
                    entries.push((key, value));
                }
                Value::Map(entries)
            }
            Marker::FixExt1
            | Marker::FixExt2
            | Marker::FixExt4
            | Marker::FixExt8
            | Marker::FixExt16
            | Marker::Ext8
            | Marker::Ext16
            | Marker::Ext32 => {
                let meta =
                    decode::read_ext_meta(&mut self.rest).map_err(|e| value_error("ext", e))?;
                Value::Ext(meta.typeid, self.take(meta.size)?.to_vec())
            }
            other => return Err(mismatch("value", other)),
        };
        Ok(value)
    }

    fn check_depth(&self, depth: usize) -> Result<(), CodecError> {
        if depth >= self.max_depth {
            return Err(CodecError::malformed(format!(
                "value nested deeper than {} levels",
                self.max_depth
            )));
        }
        Ok(())
    }
}

fn count(len: u32) -> Result<usize, CodecError> {
    usize::try_from(len).map_err(|_| CodecError::malformed("length does not fit in memory"))
}

fn io_error(e: io::Error) -> CodecError {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        CodecError::InsufficientData
    } else {
        CodecError::malformed(e.to_string())
    }
}

fn value_error(expected: &str, e: ValueReadError<io::Error>) -> CodecError {
    match e {
        ValueReadError::InvalidMarkerRead(e) | ValueReadError::InvalidDataRead(e) => io_error(e),
        ValueReadError::TypeMismatch(found) => mismatch(expected, found),
    }
}

fn num_error(e: NumValueReadError<io::Error>) -> CodecError {
    match e {
        NumValueReadError::InvalidMarkerRead(e) | NumValueReadError::InvalidDataRead(e) => {
            io_error(e)
        }
        NumValueReadError::TypeMismatch(found) => mismatch("integer", found),
        NumValueReadError::OutOfRange => CodecError::malformed("integer does not fit in i64"),
    }
}

fn mismatch(expected: &str, found: Marker) -> CodecError {
    CodecError::malformed(format!("expected {expected}, found marker {found:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn written(f: impl FnOnce(&mut MessagePackWriter) -> Result<(), CodecError>) -> Vec<u8> {
        let mut writer = MessagePackWriter::new();
        f(&mut writer).unwrap();
        writer.into_inner()
    }

    #[test]
    fn test_minimal_int_encoding() {
        assert_eq!(written(|w| w.write_int(42)), [0x2a]);
        assert_eq!(written(|w| w.write_int(-1)), [0xff]);
        assert_eq!(written(|w| w.write_int(200)), [0xcc, 0xc8]);
        assert_eq!(written(|w| w.write_int(-200)), [0xd1, 0xff, 0x38]);
        assert_eq!(written(|w| w.write_int(70_000)), [0xce, 0x00, 0x01, 0x11, 0x70]);
    }

    #[test]
    fn test_reads_any_integer_width() {
        // 69 as fixint, uint8, uint16, uint32, uint64, int8, int16, int32, int64
        let encodings: [&[u8]; 9] = [
            &[0x45],
            &[0xcc, 0x45],
            &[0xcd, 0x00, 0x45],
            &[0xce, 0x00, 0x00, 0x00, 0x45],
            &[0xcf, 0, 0, 0, 0, 0, 0, 0, 0x45],
            &[0xd0, 0x45],
            &[0xd1, 0x00, 0x45],
            &[0xd2, 0x00, 0x00, 0x00, 0x45],
            &[0xd3, 0, 0, 0, 0, 0, 0, 0, 0x45],
        ];
        for bytes in encodings {
            let mut reader = MessagePackReader::new(bytes);
            assert_eq!(reader.read_int().unwrap(), 69, "encoding {bytes:02x?}");
            assert_eq!(reader.remaining(), 0);
        }
    }

    #[test]
    fn test_large_unsigned() {
        let bytes = written(|w| w.write_uint(u64::MAX));
        let mut reader = MessagePackReader::new(&bytes);
        assert_eq!(reader.read_value().unwrap(), Value::UInt(u64::MAX));

        let mut reader = MessagePackReader::new(&bytes);
        assert!(matches!(reader.read_int(), Err(CodecError::MalformedValue(_))));
    }

    #[test]
    fn test_string_and_bytes() {
        let bytes = written(|w| {
            w.write_str("abc")?;
            w.write_bytes(&[1, 2, 3])?;
            w.write_nil()
        });
        assert_eq!(bytes[..4], [0xa3, b'a', b'b', b'c']);

        let mut reader = MessagePackReader::new(&bytes);
        assert_eq!(reader.read_str().unwrap(), "abc");
        assert_eq!(reader.read_bytes().unwrap(), [1, 2, 3]);
        assert_eq!(reader.read_str_or_nil().unwrap(), None);
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn test_str8_accepted_for_short_string() {
        // Non-minimal encoding of "hi"
        let bytes = [0xd9, 0x02, b'h', b'i'];
        let mut reader = MessagePackReader::new(&bytes);
        assert_eq!(reader.read_str().unwrap(), "hi");
    }

    #[test]
    fn test_wide_headers_accepted() {
        // ["hi"] as array16 holding a str16
        let bytes = [0xdc, 0x00, 0x01, 0xda, 0x00, 0x02, b'h', b'i'];
        let mut reader = MessagePackReader::new(&bytes);
        assert_eq!(reader.read_array_header().unwrap(), 1);
        assert_eq!(reader.read_str().unwrap(), "hi");

        // {"k": bin16 [7]} as map16 holding a str32 key
        let bytes = [
            0xde, 0x00, 0x01, 0xdb, 0x00, 0x00, 0x00, 0x01, b'k', 0xc5, 0x00, 0x01, 0x07,
        ];
        let mut reader = MessagePackReader::new(&bytes);
        assert_eq!(
            reader.read_value().unwrap(),
            Value::Map(vec![(Value::from("k"), Value::Bytes(vec![7]))])
        );
        assert_eq!(reader.remaining(), 0);

        // array32 and map32
        let bytes = [0xdd, 0, 0, 0, 0x01, 0xdf, 0, 0, 0, 0];
        let mut reader = MessagePackReader::new(&bytes);
        assert_eq!(
            reader.read_value().unwrap(),
            Value::Array(vec![Value::Map(vec![])])
        );
    }

    #[test]
    fn test_truncated_wide_header() {
        let mut reader = MessagePackReader::new(&[0xdc, 0x00]);
        assert_eq!(reader.read_array_header(), Err(CodecError::InsufficientData));

        let mut reader = MessagePackReader::new(&[0xda, 0x00, 0x05, b'a']);
        assert_eq!(reader.read_str(), Err(CodecError::InsufficientData));
    }

    #[test]
    fn test_nested_value() {
        let value = Value::Array(vec![
            Value::Int(42),
            Value::map([("ding", Value::Array(vec![Value::from("abc")]))]),
            Value::Float(1.5),
            Value::Bool(true),
            Value::Nil,
            Value::Ext(-1, vec![0, 0, 0, 1]),
        ]);
        let bytes = written(|w| w.write_value(&value));

        let mut reader = MessagePackReader::new(&bytes);
        assert_eq!(reader.read_value().unwrap(), value);
        assert_eq!(reader.position(), bytes.len());
    }

    #[test]
    fn test_float32_widens() {
        let bytes = [0xca, 0x3f, 0xc0, 0x00, 0x00];
        let mut reader = MessagePackReader::new(&bytes);
        assert_eq!(reader.read_value().unwrap(), Value::Float(1.5));
    }

    #[test]
    fn test_insufficient_data() {
        let bytes = written(|w| w.write_str("hello"));
        for k in 0..bytes.len() {
            let mut reader = MessagePackReader::new(&bytes[..k]);
            assert_eq!(reader.read_value(), Err(CodecError::InsufficientData));
        }

        let mut reader = MessagePackReader::new(&[0x92, 0x01]);
        assert_eq!(reader.read_value(), Err(CodecError::InsufficientData));
    }

    #[test]
    fn test_malformed_values() {
        let mut reader = MessagePackReader::new(&[0xc1]);
        assert!(matches!(reader.read_value(), Err(CodecError::MalformedValue(_))));

        let mut reader = MessagePackReader::new(&[0xa2, 0xff, 0xfe]);
        assert!(matches!(reader.read_str(), Err(CodecError::MalformedValue(_))));

        let mut reader = MessagePackReader::new(&[0xa1, b'x']);
        assert!(matches!(reader.read_int(), Err(CodecError::MalformedValue(_))));
    }

    #[test]
    fn test_depth_limit() {
        let mut value = Value::Int(1);
        for _ in 0..5 {
            value = Value::Array(vec![value]);
        }
        let bytes = written(|w| w.write_value(&value));

        let mut reader = MessagePackReader::with_max_depth(&bytes, 5);
        assert_eq!(reader.read_value().unwrap(), value);

        let mut reader = MessagePackReader::with_max_depth(&bytes, 4);
        assert!(matches!(reader.read_value(), Err(CodecError::MalformedValue(_))));
    }

    #[test]
    fn test_skip_value() {
        let bytes = written(|w| {
            w.write_value(&Value::map([("a", 1), ("b", 2)]))?;
            w.write_int(7)
        });
        let mut reader = MessagePackReader::new(&bytes);
        reader.skip_value().unwrap();
        assert_eq!(reader.read_int().unwrap(), 7);
    }
}
