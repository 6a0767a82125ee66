//! PackStream decoder.

use std::collections::HashMap;

use super::marker::{Marker, Size, Width};
use super::types::{PackStreamStructure, PackStreamValue};
use super::PackStreamError;

/// Nesting limit for lists, maps and structures.
pub const MAX_DEPTH: usize = 256;

/// Marker-driven decoder over a borrowed byte slice.
///
/// Every read is bounds-checked; a value that claims more bytes than are
/// left fails with [`PackStreamError::UnexpectedEof`] before anything is
/// allocated for it.
pub struct PackStreamDecoder<'a> {
    data: &'a [u8],
    pos: usize,
    depth: usize,
}

impl<'a> PackStreamDecoder<'a> {
    /// Create a new decoder for the given bytes.
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            depth: 0,
        }
    }

    /// Bytes consumed so far.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes left to read.
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    /// Check if all data has been consumed.
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Decode the next value.
    pub fn decode(&mut self) -> Result<PackStreamValue, PackStreamError> {
        let byte = self.read_u8()?;
        match Marker::classify(byte) {
            Marker::Null => Ok(PackStreamValue::Null),
            Marker::Boolean(b) => Ok(PackStreamValue::Boolean(b)),
            Marker::TinyInt(i) => Ok(PackStreamValue::Integer(i as i64)),
            Marker::Int(width) => Ok(PackStreamValue::Integer(self.read_int(width)?)),
            Marker::Float => Ok(PackStreamValue::Float(f64::from_be_bytes(self.take()?))),
            Marker::Bytes(width) => {
                let len = self.read_size(byte, Size::Explicit(width))?;
                Ok(PackStreamValue::Bytes(self.read_slice(len)?.to_vec()))
            }
            Marker::String(size) => {
                let len = self.read_size(byte, size)?;
                self.read_string(len).map(PackStreamValue::String)
            }
            Marker::List(size) => {
                let len = self.read_size(byte, size)?;
                self.nested(|d| d.read_list(len))
            }
            Marker::Map(size) => {
                let len = self.read_size(byte, size)?;
                self.nested(|d| d.read_map(len))
            }
            Marker::Struct(fields) => self.nested(|d| d.read_struct(fields)),
            Marker::Reserved(m) => Err(PackStreamError::UnknownMarker(m)),
        }
    }

    fn nested<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, PackStreamError>,
    ) -> Result<T, PackStreamError> {
        if self.depth >= MAX_DEPTH {
            return Err(PackStreamError::TooDeep(MAX_DEPTH));
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    fn read_list(&mut self, len: usize) -> Result<PackStreamValue, PackStreamError> {
        self.ensure(len)?;
        let mut items = Vec::with_capacity(len);
        for _ in 0..len {
            items.push(self.decode()?);
        }
        Ok(PackStreamValue::List(items))
    }

    fn read_map(&mut self, len: usize) -> Result<PackStreamValue, PackStreamError> {
        self.ensure(len.saturating_mul(2))?;
        let mut map = HashMap::with_capacity(len);
        for _ in 0..len {
            let key = match self.decode()? {
                PackStreamValue::String(s) => s,
                _ => return Err(PackStreamError::InvalidMapKey),
            };
            let value = self.decode()?;
            // Duplicate keys: the later entry wins.
            map.insert(key, value);
        }
        Ok(PackStreamValue::Map(map))
    }

    fn read_struct(&mut self, field_count: usize) -> Result<PackStreamValue, PackStreamError> {
        let tag = self.read_u8()?;
        self.ensure(field_count)?;
        let mut fields = Vec::with_capacity(field_count);
        for _ in 0..field_count {
            fields.push(self.decode()?);
        }
        Ok(PackStreamValue::Structure(PackStreamStructure::new(tag, fields)))
    }

    fn read_size(&mut self, marker: u8, size: Size) -> Result<usize, PackStreamError> {
        match size {
            Size::Tiny(n) => Ok(n),
            Size::Explicit(Width::W8) => Ok(self.read_u8()? as usize),
            Size::Explicit(Width::W16) => Ok(u16::from_be_bytes(self.take()?) as usize),
            Size::Explicit(_) => {
                let size = i32::from_be_bytes(self.take()?);
                usize::try_from(size).map_err(|_| PackStreamError::NegativeSize { marker, size })
            }
        }
    }

    fn read_int(&mut self, width: Width) -> Result<i64, PackStreamError> {
        Ok(match width {
            Width::W8 => self.read_u8()? as i8 as i64,
            Width::W16 => i16::from_be_bytes(self.take()?) as i64,
            Width::W32 => i32::from_be_bytes(self.take()?) as i64,
            Width::W64 => i64::from_be_bytes(self.take()?),
        })
    }

    fn read_string(&mut self, len: usize) -> Result<String, PackStreamError> {
        let bytes = self.read_slice(len)?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|e| PackStreamError::InvalidUtf8(e.to_string()))
    }

    fn read_u8(&mut self) -> Result<u8, PackStreamError> {
        let [byte] = self.take::<1>()?;
        Ok(byte)
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N], PackStreamError> {
        let slice = self.read_slice(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(slice);
        Ok(out)
    }

    fn read_slice(&mut self, len: usize) -> Result<&'a [u8], PackStreamError> {
        self.ensure(len)?;
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn ensure(&self, needed: usize) -> Result<(), PackStreamError> {
        let available = self.remaining();
        if needed > available {
            return Err(PackStreamError::UnexpectedEof { needed, available });
        }
        Ok(())
    }
}

/// Decode exactly one value; trailing bytes are an error.
pub fn decode(data: &[u8]) -> Result<PackStreamValue, PackStreamError> {
    let mut decoder = PackStreamDecoder::new(data);
    let value = decoder.decode()?;
    if !decoder.is_empty() {
        return Err(PackStreamError::TrailingBytes(decoder.remaining()));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_tiny_values() {
        assert_eq!(decode(&[0x00]).unwrap(), PackStreamValue::Integer(0));
        assert_eq!(decode(&[0x7F]).unwrap(), PackStreamValue::Integer(127));
        assert_eq!(decode(&[0xF0]).unwrap(), PackStreamValue::Integer(-16));
        assert_eq!(decode(&[0xC0]).unwrap(), PackStreamValue::Null);
        assert_eq!(decode(&[0xC3]).unwrap(), PackStreamValue::Boolean(true));
        assert_eq!(decode(&[0x83, b'a', b'b', b'c']).unwrap(), PackStreamValue::String("abc".into()));
    }

    #[test]
    fn test_decode_sized_integers() {
        assert_eq!(decode(&[0xC8, 0x80]).unwrap(), PackStreamValue::Integer(-128));
        assert_eq!(decode(&[0xC9, 0x03, 0xE8]).unwrap(), PackStreamValue::Integer(1000));
        assert_eq!(
            decode(&[0xCA, 0x00, 0x01, 0x86, 0xA0]).unwrap(),
            PackStreamValue::Integer(100_000)
        );
        assert_eq!(
            decode(&[0xCB, 0x80, 0, 0, 0, 0, 0, 0, 0]).unwrap(),
            PackStreamValue::Integer(i64::MIN)
        );
    }

    #[test]
    fn test_position_reports_consumed_bytes() {
        let data = [0x92, 0x01, 0x02, 0xC0];
        let mut decoder = PackStreamDecoder::new(&data);
        let value = decoder.decode().unwrap();
        assert_eq!(value, PackStreamValue::List(vec![1i64.into(), 2i64.into()]));
        assert_eq!(decoder.position(), 3);
        assert_eq!(decoder.decode().unwrap(), PackStreamValue::Null);
        assert!(decoder.is_empty());
    }

    #[test]
    fn test_truncated_input() {
        let err = decode(&[0xC9, 0x03]).unwrap_err();
        assert!(matches!(err, PackStreamError::UnexpectedEof { needed: 2, available: 1 }));

        let err = decode(&[0x85, b'a', b'b']).unwrap_err();
        assert!(matches!(err, PackStreamError::UnexpectedEof { needed: 5, available: 2 }));

        // list claiming 10 elements with only 1 byte left
        let err = decode(&[0x9A, 0x01]).unwrap_err();
        assert!(matches!(err, PackStreamError::UnexpectedEof { .. }));

        let err = decode(&[]).unwrap_err();
        assert!(matches!(err, PackStreamError::UnexpectedEof { needed: 1, available: 0 }));
    }

    #[test]
    fn test_negative_size() {
        let err = decode(&[0xD6, 0xFF, 0xFF, 0xFF, 0xFE]).unwrap_err();
        assert!(matches!(err, PackStreamError::NegativeSize { marker: 0xD6, size: -2 }));

        let err = decode(&[0xD2, 0x80, 0x00, 0x00, 0x00]).unwrap_err();
        assert!(matches!(err, PackStreamError::NegativeSize { marker: 0xD2, .. }));
    }

    #[test]
    fn test_unknown_marker() {
        for m in [0xC4, 0xDC, 0xDD, 0xE5] {
            assert!(matches!(decode(&[m]), Err(PackStreamError::UnknownMarker(x)) if x == m));
        }
    }

    #[test]
    fn test_invalid_map_key() {
        let err = decode(&[0xA1, 0x01, 0x01]).unwrap_err();
        assert!(matches!(err, PackStreamError::InvalidMapKey));
    }

    #[test]
    fn test_duplicate_map_keys_last_wins() {
        let data = [0xA2, 0x81, b'k', 0x01, 0x81, b'k', 0x02];
        let map = decode(&data).unwrap().into_map().unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map["k"], PackStreamValue::Integer(2));
    }

    #[test]
    fn test_invalid_utf8() {
        let err = decode(&[0x82, 0xFF, 0xFE]).unwrap_err();
        assert!(matches!(err, PackStreamError::InvalidUtf8(_)));
    }

    #[test]
    fn test_trailing_bytes() {
        let err = decode(&[0x01, 0x02]).unwrap_err();
        assert!(matches!(err, PackStreamError::TrailingBytes(1)));
    }

    #[test]
    fn test_nesting_limit() {
        let mut data = vec![0x91; MAX_DEPTH + 1];
        data.push(0xC0);
        assert!(matches!(decode(&data), Err(PackStreamError::TooDeep(_))));
    }
}
