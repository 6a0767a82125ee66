//! Bolt protocol codec for tokio_util.
//!
//! Implements chunked message framing: every message is split into chunks
//! with a 2-byte big-endian length prefix and terminated by an empty chunk.

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use super::message::{BoltRequest, BoltResponse};
use super::packstream::{decode, encode, PackStreamValue};
use super::BoltError;

/// Largest chunk payload the length prefix can express.
pub const MAX_CHUNK_SIZE: usize = u16::MAX as usize;

/// Default limit for one reassembled message (16MB).
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// End of message marker (0x00 0x00)
pub const END_MARKER: [u8; 2] = [0x00, 0x00];

/// Chunked framing of PackStream values.
#[derive(Debug)]
pub struct BoltCodec {
    /// Maximum reassembled message size
    max_message_size: usize,
    /// Payload bytes per outgoing chunk
    chunk_size: usize,
    /// Chunks of the message being reassembled
    message_buffer: BytesMut,
}

impl BoltCodec {
    /// Create a new codec with default settings.
    pub fn new() -> Self {
        Self {
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            chunk_size: MAX_CHUNK_SIZE,
            message_buffer: BytesMut::with_capacity(4096),
        }
    }

    /// Set the limit for incoming messages.
    pub fn with_max_message_size(mut self, max_message_size: usize) -> Self {
        self.max_message_size = max_message_size;
        self
    }

    /// Set the outgoing chunk size, clamped to `1..=65535`.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.clamp(1, MAX_CHUNK_SIZE);
        self
    }

    fn encode_chunked(&self, data: &[u8], dst: &mut BytesMut) {
        let chunks = data.len().div_ceil(self.chunk_size);
        dst.reserve(data.len() + chunks * 2 + END_MARKER.len());
        for chunk in data.chunks(self.chunk_size) {
            dst.put_u16(chunk.len() as u16);
            dst.put_slice(chunk);
        }
        dst.put_slice(&END_MARKER);
    }
}

impl Default for BoltCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for BoltCodec {
    type Item = PackStreamValue;
    type Error = BoltError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            if src.len() < 2 {
                return Ok(None);
            }

            let chunk_size = u16::from_be_bytes([src[0], src[1]]) as usize;

            if chunk_size == 0 {
                src.advance(2);

                if self.message_buffer.is_empty() {
                    // NOOP keep-alive between messages
                    continue;
                }

                let message_data = self.message_buffer.split();
                return Ok(Some(decode(&message_data)?));
            }

            if src.len() < 2 + chunk_size {
                src.reserve(2 + chunk_size - src.len());
                return Ok(None);
            }

            let size = self.message_buffer.len() + chunk_size;
            if size > self.max_message_size {
                return Err(BoltError::MessageTooLarge {
                    size,
                    max: self.max_message_size,
                });
            }

            src.advance(2);
            self.message_buffer.extend_from_slice(&src[..chunk_size]);
            src.advance(chunk_size);
        }
    }
}

impl Encoder<PackStreamValue> for BoltCodec {
    type Error = BoltError;

    fn encode(&mut self, item: PackStreamValue, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let encoded = encode(&item)?;
        self.encode_chunked(&encoded, dst);
        Ok(())
    }
}

/// Client-side codec: writes requests, reads responses.
#[derive(Debug, Default)]
pub struct BoltClientCodec {
    inner: BoltCodec,
}

impl BoltClientCodec {
    /// Wrap a configured framing codec.
    pub fn new(inner: BoltCodec) -> Self {
        Self { inner }
    }
}

impl Decoder for BoltClientCodec {
    type Item = BoltResponse;
    type Error = BoltError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.inner.decode(src)? {
            Some(PackStreamValue::Structure(structure)) => {
                Ok(Some(BoltResponse::from_structure(structure)?))
            }
            Some(other) => Err(BoltError::Protocol(format!(
                "Expected a response structure, got {}",
                other.type_name()
            ))),
            None => Ok(None),
        }
    }
}

impl Encoder<BoltRequest> for BoltClientCodec {
    type Error = BoltError;

    fn encode(&mut self, item: BoltRequest, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let value = PackStreamValue::Structure(item.to_structure());
        self.inner.encode(value, dst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bolt::message::{tag, SuccessMessage};
    use std::collections::HashMap;

    fn framed(codec: &mut BoltCodec, value: PackStreamValue) -> BytesMut {
        let mut buf = BytesMut::new();
        codec.encode(value, &mut buf).unwrap();
        buf
    }

    #[test]
    fn test_single_chunk_layout() {
        let buf = framed(&mut BoltCodec::new(), PackStreamValue::Integer(1));
        assert_eq!(&buf[..], &[0x00, 0x01, 0x01, 0x00, 0x00]);
    }

    #[test]
    fn test_large_message_spans_max_chunks() {
        let mut codec = BoltCodec::new();
        let large = "x".repeat(MAX_CHUNK_SIZE * 2 + 100);
        let mut buf = framed(&mut codec, PackStreamValue::String(large.clone()));

        assert_eq!(u16::from_be_bytes([buf[0], buf[1]]) as usize, MAX_CHUNK_SIZE);

        let decoded = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded.as_str().unwrap(), large);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_reassembly_is_independent_of_chunk_size() {
        let value = PackStreamValue::Map(HashMap::from([
            ("name".to_string(), PackStreamValue::from("chunked")),
            ("items".to_string(), PackStreamValue::List(vec![1i64.into(); 40])),
        ]));
        for size in [1usize, 2, 3, 7, 64, 65_535] {
            let mut codec = BoltCodec::new().with_chunk_size(size);
            let mut buf = framed(&mut codec, value.clone());
            assert_eq!(codec.decode(&mut buf).unwrap().unwrap(), value, "chunk size {}", size);
        }
    }

    #[test]
    fn test_chunk_size_is_clamped() {
        let mut codec = BoltCodec::new().with_chunk_size(0);
        let buf = framed(&mut codec, PackStreamValue::from("ab"));
        // 3 payload bytes at one byte per chunk
        assert_eq!(buf.len(), 3 * 3 + 2);
    }

    #[test]
    fn test_byte_at_a_time_input() {
        let mut writer = BoltCodec::new().with_chunk_size(4);
        let wire = framed(&mut writer, PackStreamValue::from("partial delivery"));

        let mut reader = BoltCodec::new();
        let mut buf = BytesMut::new();
        let mut decoded = None;
        for byte in wire.iter() {
            buf.put_u8(*byte);
            if let Some(v) = reader.decode(&mut buf).unwrap() {
                decoded = Some(v);
            }
        }
        assert_eq!(decoded, Some(PackStreamValue::from("partial delivery")));
    }

    #[test]
    fn test_message_too_large() {
        let mut codec = BoltCodec::new().with_max_message_size(100);
        let mut buf = BytesMut::new();
        buf.put_u16(200);
        buf.extend_from_slice(&[0u8; 200]);

        let result = codec.decode(&mut buf);
        assert!(matches!(result, Err(BoltError::MessageTooLarge { size: 200, max: 100 })));
    }

    #[test]
    fn test_noop_chunks_skipped() {
        let mut codec = BoltCodec::new();
        let mut buf = BytesMut::new();
        buf.put_slice(&END_MARKER);
        buf.put_slice(&END_MARKER);
        buf.extend_from_slice(&framed(&mut codec, PackStreamValue::Boolean(true)));

        assert_eq!(codec.decode(&mut buf).unwrap(), Some(PackStreamValue::Boolean(true)));
    }

    #[test]
    fn test_multiple_messages() {
        let mut codec = BoltCodec::new();
        let mut buf = BytesMut::new();
        for i in 1..=3i64 {
            codec.encode(i.into(), &mut buf).unwrap();
        }
        for i in 1..=3i64 {
            assert_eq!(codec.decode(&mut buf).unwrap(), Some(PackStreamValue::Integer(i)));
        }
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_client_codec_round() {
        let mut client = BoltClientCodec::default();
        let mut buf = BytesMut::new();
        client.encode(BoltRequest::Reset, &mut buf).unwrap();

        let mut raw = BoltCodec::new();
        let request = raw.decode(&mut buf).unwrap().unwrap();
        assert_eq!(request.as_structure().map(|s| s.tag), Some(tag::RESET));

        let reply = BoltResponse::Success(SuccessMessage::new().with("server", "Neo4j/5.0.0"));
        raw.encode(PackStreamValue::Structure(reply.to_structure()), &mut buf).unwrap();
        assert_eq!(client.decode(&mut buf).unwrap(), Some(reply));
    }

    #[test]
    fn test_client_codec_rejects_bare_values() {
        let mut client = BoltClientCodec::default();
        let mut buf = framed(&mut BoltCodec::new(), PackStreamValue::Integer(5));
        assert!(matches!(client.decode(&mut buf), Err(BoltError::Protocol(_))));
    }
}
