//! PackStream serialization format.
//!
//! PackStream is the binary serialization format used by the Bolt protocol
//! to encode values for transmission between client and server.
//!
//! # Supported Types
//!
//! - **Null**: Single byte marker
//! - **Boolean**: True/False markers
//! - **Integer**: Variable-length encoding (-2^63 to 2^63-1)
//! - **Float**: 64-bit IEEE 754
//! - **String**: UTF-8 encoded, variable length prefix
//! - **Bytes**: Raw bytes, variable length prefix
//! - **List**: Heterogeneous collections
//! - **Map**: String keys to arbitrary values
//! - **Structure**: Tagged structures for graph, temporal and spatial types
//!
//! Typed structures live in [`structures`]; which signatures are legal
//! depends on the negotiated protocol version ([`StructDialect`]).

pub mod decoder;
pub mod encoder;
pub mod marker;
pub mod structures;
pub mod types;

pub use decoder::{decode, PackStreamDecoder};
pub use encoder::{encode, PackStreamEncoder};
pub use structures::{
    signature, PackStreamDateTime, PackStreamNode, PackStreamPath, PackStreamRelationship,
    PackStreamUnboundRelationship, StructDialect, TimeZone, ValueStructure,
};
pub use types::{PackStreamStructure, PackStreamValue};

use std::fmt;

/// PackStream errors.
#[derive(Debug, Clone, PartialEq)]
pub enum PackStreamError {
    /// Input ended before a complete value was read
    UnexpectedEof {
        /// Bytes the value needed
        needed: usize,
        /// Bytes that were left
        available: usize,
    },
    /// Reserved marker byte
    UnknownMarker(u8),
    /// A 32-bit size field decoded as negative
    NegativeSize {
        /// Marker that announced the size
        marker: u8,
        /// Raw signed size
        size: i32,
    },
    /// Structure signature not defined for the running protocol version
    UnknownSignature(u8),
    /// Invalid UTF-8 in string
    InvalidUtf8(String),
    /// Map key was not a string
    InvalidMapKey,
    /// Value too large to encode
    ValueTooLarge(&'static str, usize),
    /// Structure with the wrong field count or field types
    InvalidStructure(String),
    /// Nesting deeper than the decoder allows
    TooDeep(usize),
    /// Bytes left over after a complete value
    TrailingBytes(usize),
}

impl fmt::Display for PackStreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PackStreamError::UnexpectedEof { needed, available } => write!(
                f,
                "Unexpected end of PackStream data: needed {} bytes, {} available",
                needed, available
            ),
            PackStreamError::UnknownMarker(m) => write!(f, "Unknown PackStream marker: 0x{:02X}", m),
            PackStreamError::NegativeSize { marker, size } => {
                write!(f, "Negative size {} after marker 0x{:02X}", size, marker)
            }
            PackStreamError::UnknownSignature(tag) => {
                write!(f, "Unknown structure signature: 0x{:02X}", tag)
            }
            PackStreamError::InvalidUtf8(e) => write!(f, "Invalid UTF-8 in string: {}", e),
            PackStreamError::InvalidMapKey => write!(f, "Map keys must be strings"),
            PackStreamError::ValueTooLarge(t, s) => write!(f, "{} too large: {}", t, s),
            PackStreamError::InvalidStructure(msg) => write!(f, "Invalid structure: {}", msg),
            PackStreamError::TooDeep(max) => write!(f, "Value nested deeper than {} levels", max),
            PackStreamError::TrailingBytes(n) => write!(f, "{} trailing bytes after value", n),
        }
    }
}

impl std::error::Error for PackStreamError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn roundtrip(value: &PackStreamValue) -> PackStreamValue {
        decode(&encode(value).unwrap()).unwrap()
    }

    #[test]
    fn test_roundtrip_scalars() {
        let values = [
            PackStreamValue::Null,
            PackStreamValue::Boolean(true),
            PackStreamValue::Boolean(false),
            PackStreamValue::Float(-0.0),
            PackStreamValue::Float(f64::MAX),
            PackStreamValue::Float(f64::MIN_POSITIVE),
            PackStreamValue::Bytes(vec![]),
            PackStreamValue::Bytes(vec![0xAB; 70_000]),
            PackStreamValue::String(String::new()),
            PackStreamValue::String("한글 and ünïcødé".into()),
        ];
        for v in &values {
            assert_eq!(&roundtrip(v), v);
        }
    }

    #[test]
    fn test_roundtrip_integer_boundaries() {
        let boundaries = [
            i64::MIN,
            i32::MIN as i64 - 1,
            i32::MIN as i64,
            i16::MIN as i64 - 1,
            i16::MIN as i64,
            -129,
            -128,
            -17,
            -16,
            0,
            127,
            128,
            i16::MAX as i64,
            i16::MAX as i64 + 1,
            i32::MAX as i64,
            i32::MAX as i64 + 1,
            i64::MAX,
        ];
        for i in boundaries {
            assert_eq!(roundtrip(&i.into()), PackStreamValue::Integer(i), "{}", i);
        }
    }

    #[test]
    fn test_nan_roundtrips_bit_for_bit() {
        let nan = f64::from_bits(0x7FF8_0000_0000_0001);
        match roundtrip(&PackStreamValue::Float(nan)) {
            PackStreamValue::Float(f) => assert_eq!(f.to_bits(), nan.to_bits()),
            other => panic!("expected float, got {:?}", other),
        }
    }

    #[test]
    fn test_roundtrip_collection_size_boundaries() {
        for len in [0usize, 15, 16, 255, 256, 65_535, 65_536] {
            let list = PackStreamValue::List(vec![PackStreamValue::Null; len]);
            assert_eq!(roundtrip(&list), list, "list of {}", len);

            let s = PackStreamValue::String("x".repeat(len));
            assert_eq!(roundtrip(&s), s, "string of {}", len);
        }

        for len in [0usize, 15, 16, 300] {
            let map: HashMap<String, PackStreamValue> =
                (0..len).map(|i| (format!("k{}", i), (i as i64).into())).collect();
            let map = PackStreamValue::Map(map);
            assert_eq!(roundtrip(&map), map, "map of {}", len);
        }
    }

    #[test]
    fn test_roundtrip_every_struct_signature() {
        for dialect in [StructDialect::V4, StructDialect::V5] {
            let node = PackStreamNode {
                id: 7,
                labels: vec!["A".into(), "B".into()],
                properties: HashMap::from([("n".to_string(), PackStreamValue::Integer(1))]),
                element_id: dialect.element_ids.then(|| "4:x:7".to_string()),
            };
            let unbound = PackStreamUnboundRelationship {
                id: 3,
                rel_type: "R".into(),
                properties: HashMap::new(),
                element_id: dialect.element_ids.then(|| "5:x:3".to_string()),
            };
            let structures = vec![
                ValueStructure::Node(node.clone()),
                ValueStructure::Relationship(PackStreamRelationship {
                    id: 3,
                    start_node_id: 7,
                    end_node_id: 8,
                    rel_type: "R".into(),
                    properties: HashMap::new(),
                    element_id: dialect.element_ids.then(|| "5:x:3".to_string()),
                    start_node_element_id: dialect.element_ids.then(|| "4:x:7".to_string()),
                    end_node_element_id: dialect.element_ids.then(|| "4:x:8".to_string()),
                }),
                ValueStructure::UnboundRelationship(unbound.clone()),
                ValueStructure::Path(PackStreamPath {
                    nodes: vec![node.clone(), node],
                    relationships: vec![unbound],
                    indices: vec![-1, 0],
                }),
                ValueStructure::Date { days: -719_162 },
                ValueStructure::Time {
                    nanoseconds: 86_399_999_999_999,
                    offset_seconds: -18_000,
                },
                ValueStructure::LocalTime { nanoseconds: 1 },
                ValueStructure::DateTime(PackStreamDateTime {
                    seconds: i64::MIN,
                    nanoseconds: 999_999_999,
                    zone: TimeZone::Offset(0),
                }),
                ValueStructure::DateTime(PackStreamDateTime {
                    seconds: 1,
                    nanoseconds: 0,
                    zone: TimeZone::Id("Asia/Seoul".into()),
                }),
                ValueStructure::LocalDateTime {
                    seconds: i64::MAX,
                    nanoseconds: 0,
                },
                ValueStructure::Duration {
                    months: 14,
                    days: -3,
                    seconds: 3600,
                    nanoseconds: 5,
                },
                ValueStructure::Point2D {
                    srid: 7203,
                    x: 1.5,
                    y: -2.5,
                },
                ValueStructure::Point3D {
                    srid: 9157,
                    x: 0.0,
                    y: 1.0,
                    z: 2.0,
                },
            ];

            for original in structures {
                let wire = PackStreamValue::Structure(original.clone().into_structure(dialect));
                let decoded = match roundtrip(&wire) {
                    PackStreamValue::Structure(s) => s,
                    other => panic!("expected structure, got {:?}", other),
                };
                assert_eq!(ValueStructure::from_structure(decoded, dialect).unwrap(), original);
            }
        }
    }

    #[test]
    fn test_deeply_nested() {
        let mut value = PackStreamValue::Integer(1);
        for depth in 0..50 {
            value = if depth % 2 == 0 {
                PackStreamValue::List(vec![value])
            } else {
                PackStreamValue::Map(HashMap::from([("k".to_string(), value)]))
            };
        }
        assert_eq!(roundtrip(&value), value);
    }
}
