//! PackStream encoder.

use bytes::{BufMut, BytesMut};
use std::collections::HashMap;

use super::marker::{self, Width};
use super::types::{PackStreamStructure, PackStreamValue};
use super::PackStreamError;

/// Writes PackStream values into a growable byte buffer.
///
/// Every size and integer is written in the narrowest form that holds it,
/// so equal values always produce identical bytes.
pub struct PackStreamEncoder {
    buffer: BytesMut,
}

impl PackStreamEncoder {
    /// Create a new encoder with default buffer capacity.
    pub fn new() -> Self {
        Self::with_capacity(256)
    }

    /// Create a new encoder with specified buffer capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(capacity),
        }
    }

    /// Current number of encoded bytes.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// True if nothing has been encoded yet.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Consume the encoder and return the bytes.
    pub fn into_bytes(self) -> BytesMut {
        self.buffer
    }

    /// Encoded bytes so far.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Encode any value.
    pub fn encode(&mut self, value: &PackStreamValue) -> Result<(), PackStreamError> {
        match value {
            PackStreamValue::Null => self.buffer.put_u8(marker::NULL),
            PackStreamValue::Boolean(true) => self.buffer.put_u8(marker::TRUE),
            PackStreamValue::Boolean(false) => self.buffer.put_u8(marker::FALSE),
            PackStreamValue::Integer(i) => self.encode_int(*i),
            PackStreamValue::Float(f) => {
                self.buffer.put_u8(marker::FLOAT_64);
                self.buffer.put_f64(*f);
            }
            PackStreamValue::Bytes(b) => self.encode_bytes(b)?,
            PackStreamValue::String(s) => self.encode_string(s)?,
            PackStreamValue::List(l) => self.encode_list(l)?,
            PackStreamValue::Map(m) => self.encode_map(m)?,
            PackStreamValue::Structure(s) => self.encode_structure(s)?,
        }
        Ok(())
    }

    /// Encode an integer in the smallest representation.
    pub fn encode_int(&mut self, value: i64) {
        if marker::TINY_INT_RANGE.contains(&value) {
            self.buffer.put_i8(value as i8);
        } else if let Ok(v) = i8::try_from(value) {
            self.buffer.put_u8(marker::INT_8);
            self.buffer.put_i8(v);
        } else if let Ok(v) = i16::try_from(value) {
            self.buffer.put_u8(marker::INT_16);
            self.buffer.put_i16(v);
        } else if let Ok(v) = i32::try_from(value) {
            self.buffer.put_u8(marker::INT_32);
            self.buffer.put_i32(v);
        } else {
            self.buffer.put_u8(marker::INT_64);
            self.buffer.put_i64(value);
        }
    }

    /// Encode a byte array. Bytes have no tiny form.
    pub fn encode_bytes(&mut self, value: &[u8]) -> Result<(), PackStreamError> {
        let width = Width::for_size(value.len())
            .ok_or(PackStreamError::ValueTooLarge("bytes", value.len()))?;
        self.buffer.put_u8(marker::sized_marker(marker::BYTES_8, width));
        self.put_size(width, value.len());
        self.buffer.put_slice(value);
        Ok(())
    }

    /// Encode a UTF-8 string.
    pub fn encode_string(&mut self, value: &str) -> Result<(), PackStreamError> {
        let bytes = value.as_bytes();
        self.put_header(marker::TINY_STRING, marker::STRING_8, bytes.len(), "string")?;
        self.buffer.put_slice(bytes);
        Ok(())
    }

    /// Encode a list, recursively encoding every element.
    pub fn encode_list(&mut self, values: &[PackStreamValue]) -> Result<(), PackStreamError> {
        self.put_header(marker::TINY_LIST, marker::LIST_8, values.len(), "list")?;
        for value in values {
            self.encode(value)?;
        }
        Ok(())
    }

    /// Encode a map with string keys.
    pub fn encode_map(
        &mut self,
        map: &HashMap<String, PackStreamValue>,
    ) -> Result<(), PackStreamError> {
        self.put_header(marker::TINY_MAP, marker::MAP_8, map.len(), "map")?;
        for (key, value) in map {
            self.encode_string(key)?;
            self.encode(value)?;
        }
        Ok(())
    }

    /// Encode a structure. Structures carry at most 15 fields.
    pub fn encode_structure(&mut self, s: &PackStreamStructure) -> Result<(), PackStreamError> {
        if s.fields.len() > marker::TINY_MAX {
            return Err(PackStreamError::ValueTooLarge("structure", s.fields.len()));
        }
        self.buffer.put_u8(marker::TINY_STRUCT | s.fields.len() as u8);
        self.buffer.put_u8(s.tag);
        for field in &s.fields {
            self.encode(field)?;
        }
        Ok(())
    }

    fn put_header(
        &mut self,
        tiny: u8,
        base_8: u8,
        len: usize,
        kind: &'static str,
    ) -> Result<(), PackStreamError> {
        if len <= marker::TINY_MAX {
            self.buffer.put_u8(tiny | len as u8);
            return Ok(());
        }
        let width = Width::for_size(len).ok_or(PackStreamError::ValueTooLarge(kind, len))?;
        self.buffer.put_u8(marker::sized_marker(base_8, width));
        self.put_size(width, len);
        Ok(())
    }

    fn put_size(&mut self, width: Width, len: usize) {
        match width {
            Width::W8 => self.buffer.put_u8(len as u8),
            Width::W16 => self.buffer.put_u16(len as u16),
            _ => self.buffer.put_u32(len as u32),
        }
    }
}

impl Default for PackStreamEncoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Encode a single value into a fresh buffer.
pub fn encode(value: &PackStreamValue) -> Result<BytesMut, PackStreamError> {
    let mut encoder = PackStreamEncoder::new();
    encoder.encode(value)?;
    Ok(encoder.into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bytes_of(value: PackStreamValue) -> Vec<u8> {
        encode(&value).unwrap().to_vec()
    }

    #[test]
    fn test_encode_scalars() {
        assert_eq!(bytes_of(PackStreamValue::Null), vec![0xC0]);
        assert_eq!(bytes_of(PackStreamValue::Boolean(true)), vec![0xC3]);
        assert_eq!(bytes_of(PackStreamValue::Boolean(false)), vec![0xC2]);
    }

    #[test]
    fn test_integer_width_selection() {
        assert_eq!(bytes_of(0i64.into()), vec![0x00]);
        assert_eq!(bytes_of(127i64.into()), vec![0x7F]);
        assert_eq!(bytes_of((-16i64).into()), vec![0xF0]);
        assert_eq!(bytes_of((-17i64).into()), vec![0xC8, 0xEF]);
        assert_eq!(bytes_of(128i64.into()), vec![0xC9, 0x00, 0x80]);
        assert_eq!(bytes_of(1000i64.into()), vec![0xC9, 0x03, 0xE8]);
        assert_eq!(bytes_of(100_000i64.into()), vec![0xCA, 0x00, 0x01, 0x86, 0xA0]);

        let max = bytes_of(i64::MAX.into());
        assert_eq!(max[0], 0xCB);
        assert_eq!(max.len(), 9);
    }

    #[test]
    fn test_encode_float() {
        let bytes = bytes_of(PackStreamValue::Float(1.1));
        assert_eq!(bytes, vec![0xC1, 0x3F, 0xF1, 0x99, 0x99, 0x99, 0x99, 0x99, 0x9A]);
    }

    #[test]
    fn test_encode_strings() {
        assert_eq!(bytes_of("".into()), vec![0x80]);

        let hello = bytes_of("hello".into());
        assert_eq!(hello[0], 0x85);
        assert_eq!(&hello[1..], b"hello");

        let s = "a".repeat(20);
        let bytes = bytes_of(s.as_str().into());
        assert_eq!(&bytes[..2], &[0xD0, 20]);

        let s = "b".repeat(300);
        let bytes = bytes_of(s.as_str().into());
        assert_eq!(&bytes[..3], &[0xD1, 0x01, 0x2C]);
    }

    #[test]
    fn test_encode_bytes_has_no_tiny_form() {
        assert_eq!(bytes_of(PackStreamValue::Bytes(vec![])), vec![0xCC, 0x00]);
        assert_eq!(bytes_of(PackStreamValue::Bytes(vec![1, 2, 3])), vec![0xCC, 0x03, 1, 2, 3]);
    }

    #[test]
    fn test_encode_collections() {
        let list = PackStreamValue::List(vec![1i64.into(), 2i64.into(), 3i64.into()]);
        assert_eq!(bytes_of(list), vec![0x93, 1, 2, 3]);
        assert_eq!(bytes_of(PackStreamValue::List(vec![])), vec![0x90]);
        assert_eq!(bytes_of(PackStreamValue::Map(HashMap::new())), vec![0xA0]);

        let long = PackStreamValue::List(vec![PackStreamValue::Null; 16]);
        let bytes = bytes_of(long);
        assert_eq!(&bytes[..2], &[0xD4, 16]);
    }

    #[test]
    fn test_encode_structure() {
        let s = PackStreamStructure::new(0x4E, vec![PackStreamValue::Integer(1)]);
        assert_eq!(bytes_of(PackStreamValue::Structure(s)), vec![0xB1, 0x4E, 0x01]);
    }

    #[test]
    fn test_structure_field_limit() {
        let s = PackStreamStructure::new(0x01, vec![PackStreamValue::Null; 16]);
        let err = encode(&PackStreamValue::Structure(s)).unwrap_err();
        assert!(matches!(err, PackStreamError::ValueTooLarge("structure", 16)));
    }
}
