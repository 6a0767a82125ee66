//! Typed PackStream structures for graph, temporal and spatial values.
//!
//! The set of signatures a peer may send depends on the negotiated protocol
//! version, captured here as a [`StructDialect`]. Decoding a structure whose
//! signature is not part of the running dialect fails with
//! [`PackStreamError::UnknownSignature`].

use std::collections::HashMap;

use super::types::{PackStreamStructure, PackStreamValue};
use super::PackStreamError;

/// Structure signature bytes.
pub mod signature {
    pub const NODE: u8 = 0x4E;
    pub const RELATIONSHIP: u8 = 0x52;
    pub const UNBOUND_RELATIONSHIP: u8 = 0x72;
    pub const PATH: u8 = 0x50;

    pub const DATE: u8 = 0x44;
    pub const TIME: u8 = 0x54;
    pub const LOCAL_TIME: u8 = 0x74;
    pub const LOCAL_DATE_TIME: u8 = 0x64;
    pub const DURATION: u8 = 0x45;

    /// Local-seconds date-time with offset (before 5.0).
    pub const LEGACY_DATE_TIME: u8 = 0x46;
    /// Local-seconds date-time with zone id (before 5.0).
    pub const LEGACY_DATE_TIME_ZONE_ID: u8 = 0x66;
    /// UTC-seconds date-time with offset (5.0 and later).
    pub const DATE_TIME: u8 = 0x49;
    /// UTC-seconds date-time with zone id (5.0 and later).
    pub const DATE_TIME_ZONE_ID: u8 = 0x69;

    pub const POINT_2D: u8 = 0x58;
    pub const POINT_3D: u8 = 0x59;
}

/// Version-dependent shape of value structures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StructDialect {
    /// Nodes and relationships carry string element ids.
    pub element_ids: bool,
    /// Date-times carry UTC seconds under the `I`/`i` signatures.
    pub utc_date_time: bool,
}

impl StructDialect {
    /// Dialect of the 4.x protocol family.
    pub const V4: StructDialect = StructDialect {
        element_ids: false,
        utc_date_time: false,
    };

    /// Dialect of the 5.x protocol family.
    pub const V5: StructDialect = StructDialect {
        element_ids: true,
        utc_date_time: true,
    };

    fn date_time_signatures(self) -> (u8, u8) {
        if self.utc_date_time {
            (signature::DATE_TIME, signature::DATE_TIME_ZONE_ID)
        } else {
            (signature::LEGACY_DATE_TIME, signature::LEGACY_DATE_TIME_ZONE_ID)
        }
    }
}

/// A node.
#[derive(Debug, Clone, PartialEq)]
pub struct PackStreamNode {
    pub id: i64,
    pub labels: Vec<String>,
    pub properties: HashMap<String, PackStreamValue>,
    pub element_id: Option<String>,
}

/// A relationship bound to its start and end nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct PackStreamRelationship {
    pub id: i64,
    pub start_node_id: i64,
    pub end_node_id: i64,
    pub rel_type: String,
    pub properties: HashMap<String, PackStreamValue>,
    pub element_id: Option<String>,
    pub start_node_element_id: Option<String>,
    pub end_node_element_id: Option<String>,
}

/// A relationship inside a path, without endpoint ids.
#[derive(Debug, Clone, PartialEq)]
pub struct PackStreamUnboundRelationship {
    pub id: i64,
    pub rel_type: String,
    pub properties: HashMap<String, PackStreamValue>,
    pub element_id: Option<String>,
}

/// A path in its compact wire form.
///
/// `indices` alternates relationship index and node index. Relationship
/// indices are 1-based; a negative index walks the relationship backwards.
#[derive(Debug, Clone, PartialEq)]
pub struct PackStreamPath {
    pub nodes: Vec<PackStreamNode>,
    pub relationships: Vec<PackStreamUnboundRelationship>,
    pub indices: Vec<i64>,
}

/// Zone part of a date-time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimeZone {
    /// Fixed offset in seconds east of UTC.
    Offset(i64),
    /// Named zone, e.g. `Europe/Stockholm`.
    Id(String),
}

/// Date-time with zone. `seconds` are UTC-based in the 5.x dialect and
/// local-time-based in the 4.x dialect.
#[derive(Debug, Clone, PartialEq)]
pub struct PackStreamDateTime {
    pub seconds: i64,
    pub nanoseconds: i64,
    pub zone: TimeZone,
}

/// A decoded value structure.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueStructure {
    Node(PackStreamNode),
    Relationship(PackStreamRelationship),
    UnboundRelationship(PackStreamUnboundRelationship),
    Path(PackStreamPath),
    /// Days since the Unix epoch.
    Date { days: i64 },
    /// Nanoseconds since midnight plus an offset in seconds.
    Time { nanoseconds: i64, offset_seconds: i64 },
    /// Nanoseconds since midnight.
    LocalTime { nanoseconds: i64 },
    DateTime(PackStreamDateTime),
    LocalDateTime { seconds: i64, nanoseconds: i64 },
    Duration {
        months: i64,
        days: i64,
        seconds: i64,
        nanoseconds: i64,
    },
    Point2D { srid: i64, x: f64, y: f64 },
    Point3D { srid: i64, x: f64, y: f64, z: f64 },
}

impl ValueStructure {
    /// Decode a structure under the given dialect.
    pub fn from_structure(
        s: PackStreamStructure,
        dialect: StructDialect,
    ) -> Result<Self, PackStreamError> {
        let (date_time, date_time_zone_id) = dialect.date_time_signatures();
        let tag = s.tag;
        match tag {
            signature::NODE => node_from(s, dialect).map(ValueStructure::Node),
            signature::RELATIONSHIP => {
                let mut f = Fields::expect(s, "Relationship", if dialect.element_ids { 8 } else { 5 })?;
                Ok(ValueStructure::Relationship(PackStreamRelationship {
                    id: f.int()?,
                    start_node_id: f.int()?,
                    end_node_id: f.int()?,
                    rel_type: f.string()?,
                    properties: f.map()?,
                    element_id: f.element_id(dialect)?,
                    start_node_element_id: f.element_id(dialect)?,
                    end_node_element_id: f.element_id(dialect)?,
                }))
            }
            signature::UNBOUND_RELATIONSHIP => {
                unbound_from(s, dialect).map(ValueStructure::UnboundRelationship)
            }
            signature::PATH => {
                let mut f = Fields::expect(s, "Path", 3)?;
                let nodes = f
                    .structures("Path nodes")?
                    .into_iter()
                    .map(|n| node_from(n, dialect))
                    .collect::<Result<Vec<_>, _>>()?;
                let relationships = f
                    .structures("Path relationships")?
                    .into_iter()
                    .map(|r| unbound_from(r, dialect))
                    .collect::<Result<Vec<_>, _>>()?;
                let indices = f.int_list()?;
                Ok(ValueStructure::Path(PackStreamPath {
                    nodes,
                    relationships,
                    indices,
                }))
            }
            signature::DATE => {
                let mut f = Fields::expect(s, "Date", 1)?;
                Ok(ValueStructure::Date { days: f.int()? })
            }
            signature::TIME => {
                let mut f = Fields::expect(s, "Time", 2)?;
                Ok(ValueStructure::Time {
                    nanoseconds: f.int()?,
                    offset_seconds: f.int()?,
                })
            }
            signature::LOCAL_TIME => {
                let mut f = Fields::expect(s, "LocalTime", 1)?;
                Ok(ValueStructure::LocalTime { nanoseconds: f.int()? })
            }
            signature::LOCAL_DATE_TIME => {
                let mut f = Fields::expect(s, "LocalDateTime", 2)?;
                Ok(ValueStructure::LocalDateTime {
                    seconds: f.int()?,
                    nanoseconds: f.int()?,
                })
            }
            signature::DURATION => {
                let mut f = Fields::expect(s, "Duration", 4)?;
                Ok(ValueStructure::Duration {
                    months: f.int()?,
                    days: f.int()?,
                    seconds: f.int()?,
                    nanoseconds: f.int()?,
                })
            }
            t if t == date_time => {
                let mut f = Fields::expect(s, "DateTime", 3)?;
                Ok(ValueStructure::DateTime(PackStreamDateTime {
                    seconds: f.int()?,
                    nanoseconds: f.int()?,
                    zone: TimeZone::Offset(f.int()?),
                }))
            }
            t if t == date_time_zone_id => {
                let mut f = Fields::expect(s, "DateTimeZoneId", 3)?;
                Ok(ValueStructure::DateTime(PackStreamDateTime {
                    seconds: f.int()?,
                    nanoseconds: f.int()?,
                    zone: TimeZone::Id(f.string()?),
                }))
            }
            signature::POINT_2D => {
                let mut f = Fields::expect(s, "Point2D", 3)?;
                Ok(ValueStructure::Point2D {
                    srid: f.int()?,
                    x: f.float()?,
                    y: f.float()?,
                })
            }
            signature::POINT_3D => {
                let mut f = Fields::expect(s, "Point3D", 4)?;
                Ok(ValueStructure::Point3D {
                    srid: f.int()?,
                    x: f.float()?,
                    y: f.float()?,
                    z: f.float()?,
                })
            }
            _ => Err(PackStreamError::UnknownSignature(tag)),
        }
    }

    /// Encode under the given dialect.
    ///
    /// Graph entities are only ever sent by the server; they encode here so
    /// test servers can produce them.
    pub fn into_structure(self, dialect: StructDialect) -> PackStreamStructure {
        use PackStreamValue::{Float, Integer};
        let (date_time, date_time_zone_id) = dialect.date_time_signatures();
        match self {
            ValueStructure::Node(n) => node_into(n, dialect),
            ValueStructure::Relationship(r) => {
                let mut fields = vec![
                    Integer(r.id),
                    Integer(r.start_node_id),
                    Integer(r.end_node_id),
                    r.rel_type.into(),
                    r.properties.into(),
                ];
                if dialect.element_ids {
                    fields.push(r.element_id.into());
                    fields.push(r.start_node_element_id.into());
                    fields.push(r.end_node_element_id.into());
                }
                PackStreamStructure::new(signature::RELATIONSHIP, fields)
            }
            ValueStructure::UnboundRelationship(r) => unbound_into(r, dialect),
            ValueStructure::Path(p) => PackStreamStructure::new(
                signature::PATH,
                vec![
                    PackStreamValue::List(
                        p.nodes
                            .into_iter()
                            .map(|n| node_into(n, dialect).into())
                            .collect(),
                    ),
                    PackStreamValue::List(
                        p.relationships
                            .into_iter()
                            .map(|r| unbound_into(r, dialect).into())
                            .collect(),
                    ),
                    PackStreamValue::List(p.indices.into_iter().map(Integer).collect()),
                ],
            ),
            ValueStructure::Date { days } => {
                PackStreamStructure::new(signature::DATE, vec![Integer(days)])
            }
            ValueStructure::Time {
                nanoseconds,
                offset_seconds,
            } => PackStreamStructure::new(
                signature::TIME,
                vec![Integer(nanoseconds), Integer(offset_seconds)],
            ),
            ValueStructure::LocalTime { nanoseconds } => {
                PackStreamStructure::new(signature::LOCAL_TIME, vec![Integer(nanoseconds)])
            }
            ValueStructure::DateTime(dt) => {
                let (tag, zone) = match dt.zone {
                    TimeZone::Offset(o) => (date_time, Integer(o)),
                    TimeZone::Id(id) => (date_time_zone_id, PackStreamValue::String(id)),
                };
                PackStreamStructure::new(tag, vec![Integer(dt.seconds), Integer(dt.nanoseconds), zone])
            }
            ValueStructure::LocalDateTime {
                seconds,
                nanoseconds,
            } => PackStreamStructure::new(
                signature::LOCAL_DATE_TIME,
                vec![Integer(seconds), Integer(nanoseconds)],
            ),
            ValueStructure::Duration {
                months,
                days,
                seconds,
                nanoseconds,
            } => PackStreamStructure::new(
                signature::DURATION,
                vec![
                    Integer(months),
                    Integer(days),
                    Integer(seconds),
                    Integer(nanoseconds),
                ],
            ),
            ValueStructure::Point2D { srid, x, y } => {
                PackStreamStructure::new(signature::POINT_2D, vec![Integer(srid), Float(x), Float(y)])
            }
            ValueStructure::Point3D { srid, x, y, z } => PackStreamStructure::new(
                signature::POINT_3D,
                vec![Integer(srid), Float(x), Float(y), Float(z)],
            ),
        }
    }
}

fn node_from(s: PackStreamStructure, dialect: StructDialect) -> Result<PackStreamNode, PackStreamError> {
    if s.tag != signature::NODE {
        return Err(PackStreamError::InvalidStructure(format!(
            "expected Node, got signature 0x{:02X}",
            s.tag
        )));
    }
    let mut f = Fields::expect(s, "Node", if dialect.element_ids { 4 } else { 3 })?;
    Ok(PackStreamNode {
        id: f.int()?,
        labels: f.string_list()?,
        properties: f.map()?,
        element_id: f.element_id(dialect)?,
    })
}

fn node_into(n: PackStreamNode, dialect: StructDialect) -> PackStreamStructure {
    let mut fields = vec![
        PackStreamValue::Integer(n.id),
        n.labels.into(),
        n.properties.into(),
    ];
    if dialect.element_ids {
        fields.push(n.element_id.into());
    }
    PackStreamStructure::new(signature::NODE, fields)
}

fn unbound_from(
    s: PackStreamStructure,
    dialect: StructDialect,
) -> Result<PackStreamUnboundRelationship, PackStreamError> {
    if s.tag != signature::UNBOUND_RELATIONSHIP {
        return Err(PackStreamError::InvalidStructure(format!(
            "expected UnboundRelationship, got signature 0x{:02X}",
            s.tag
        )));
    }
    let mut f = Fields::expect(s, "UnboundRelationship", if dialect.element_ids { 4 } else { 3 })?;
    Ok(PackStreamUnboundRelationship {
        id: f.int()?,
        rel_type: f.string()?,
        properties: f.map()?,
        element_id: f.element_id(dialect)?,
    })
}

fn unbound_into(r: PackStreamUnboundRelationship, dialect: StructDialect) -> PackStreamStructure {
    let mut fields = vec![
        PackStreamValue::Integer(r.id),
        r.rel_type.into(),
        r.properties.into(),
    ];
    if dialect.element_ids {
        fields.push(r.element_id.into());
    }
    PackStreamStructure::new(signature::UNBOUND_RELATIONSHIP, fields)
}

/// Sequential typed access to structure fields.
struct Fields {
    name: &'static str,
    index: usize,
    iter: std::vec::IntoIter<PackStreamValue>,
}

impl Fields {
    fn expect(s: PackStreamStructure, name: &'static str, count: usize) -> Result<Self, PackStreamError> {
        if s.fields.len() != count {
            return Err(PackStreamError::InvalidStructure(format!(
                "{} expects {} fields, got {}",
                name,
                count,
                s.fields.len()
            )));
        }
        Ok(Self {
            name,
            index: 0,
            iter: s.fields.into_iter(),
        })
    }

    fn next(&mut self) -> PackStreamValue {
        self.index += 1;
        self.iter.next().unwrap_or(PackStreamValue::Null)
    }

    fn mismatch(&self, expected: &str, got: &str) -> PackStreamError {
        PackStreamError::InvalidStructure(format!(
            "{} field {} must be {}, got {}",
            self.name, self.index, expected, got
        ))
    }

    fn int(&mut self) -> Result<i64, PackStreamError> {
        match self.next() {
            PackStreamValue::Integer(i) => Ok(i),
            other => Err(self.mismatch("Integer", other.type_name())),
        }
    }

    fn float(&mut self) -> Result<f64, PackStreamError> {
        match self.next() {
            PackStreamValue::Float(v) => Ok(v),
            other => Err(self.mismatch("Float", other.type_name())),
        }
    }

    fn string(&mut self) -> Result<String, PackStreamError> {
        match self.next() {
            PackStreamValue::String(s) => Ok(s),
            other => Err(self.mismatch("String", other.type_name())),
        }
    }

    fn map(&mut self) -> Result<HashMap<String, PackStreamValue>, PackStreamError> {
        match self.next() {
            PackStreamValue::Map(m) => Ok(m),
            other => Err(self.mismatch("Map", other.type_name())),
        }
    }

    fn string_list(&mut self) -> Result<Vec<String>, PackStreamError> {
        let value = self.next();
        let described = value.type_name();
        value
            .into_string_list()
            .ok_or_else(|| self.mismatch("List<String>", described))
    }

    fn int_list(&mut self) -> Result<Vec<i64>, PackStreamError> {
        match self.next() {
            PackStreamValue::List(items) => items
                .into_iter()
                .map(|v| v.as_int().ok_or_else(|| self.mismatch("Integer", v.type_name())))
                .collect(),
            other => Err(self.mismatch("List<Integer>", other.type_name())),
        }
    }

    fn structures(&mut self, what: &str) -> Result<Vec<PackStreamStructure>, PackStreamError> {
        match self.next() {
            PackStreamValue::List(items) => items
                .into_iter()
                .map(|v| match v {
                    PackStreamValue::Structure(s) => Ok(s),
                    other => Err(PackStreamError::InvalidStructure(format!(
                        "{} must contain structures, got {}",
                        what,
                        other.type_name()
                    ))),
                })
                .collect(),
            other => Err(self.mismatch("List", other.type_name())),
        }
    }

    fn element_id(&mut self, dialect: StructDialect) -> Result<Option<String>, PackStreamError> {
        if !dialect.element_ids {
            return Ok(None);
        }
        match self.next() {
            PackStreamValue::String(s) => Ok(Some(s)),
            PackStreamValue::Null => Ok(None),
            other => Err(self.mismatch("String", other.type_name())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: i64, dialect: StructDialect) -> PackStreamNode {
        PackStreamNode {
            id,
            labels: vec!["Person".into()],
            properties: HashMap::from([("name".to_string(), "Alice".into())]),
            element_id: dialect.element_ids.then(|| format!("4:db:{}", id)),
        }
    }

    #[test]
    fn test_node_field_count_depends_on_dialect() {
        let v4 = ValueStructure::Node(node(1, StructDialect::V4)).into_structure(StructDialect::V4);
        assert_eq!(v4.fields.len(), 3);

        let v5 = ValueStructure::Node(node(1, StructDialect::V5)).into_structure(StructDialect::V5);
        assert_eq!(v5.fields.len(), 4);

        let err = ValueStructure::from_structure(v4, StructDialect::V5).unwrap_err();
        assert!(matches!(err, PackStreamError::InvalidStructure(_)));
    }

    #[test]
    fn test_date_time_signatures_follow_dialect() {
        let dt = ValueStructure::DateTime(PackStreamDateTime {
            seconds: 1_700_000_000,
            nanoseconds: 5,
            zone: TimeZone::Offset(3600),
        });

        let legacy = dt.clone().into_structure(StructDialect::V4);
        assert_eq!(legacy.tag, signature::LEGACY_DATE_TIME);
        let utc = dt.clone().into_structure(StructDialect::V5);
        assert_eq!(utc.tag, signature::DATE_TIME);

        assert_eq!(ValueStructure::from_structure(utc.clone(), StructDialect::V5).unwrap(), dt);
        assert!(matches!(
            ValueStructure::from_structure(utc, StructDialect::V4),
            Err(PackStreamError::UnknownSignature(0x49))
        ));
        assert!(matches!(
            ValueStructure::from_structure(legacy, StructDialect::V5),
            Err(PackStreamError::UnknownSignature(0x46))
        ));
    }

    #[test]
    fn test_zone_id_date_time() {
        let dt = ValueStructure::DateTime(PackStreamDateTime {
            seconds: 0,
            nanoseconds: 0,
            zone: TimeZone::Id("Europe/Stockholm".into()),
        });
        let s = dt.clone().into_structure(StructDialect::V5);
        assert_eq!(s.tag, signature::DATE_TIME_ZONE_ID);
        assert_eq!(ValueStructure::from_structure(s, StructDialect::V5).unwrap(), dt);
    }

    #[test]
    fn test_path_structure() {
        let path = ValueStructure::Path(PackStreamPath {
            nodes: vec![node(1, StructDialect::V5), node(2, StructDialect::V5)],
            relationships: vec![PackStreamUnboundRelationship {
                id: 10,
                rel_type: "KNOWS".into(),
                properties: HashMap::new(),
                element_id: Some("5:db:10".into()),
            }],
            indices: vec![1, 1],
        });
        let s = path.clone().into_structure(StructDialect::V5);
        assert_eq!(s.tag, signature::PATH);
        assert_eq!(ValueStructure::from_structure(s, StructDialect::V5).unwrap(), path);
    }

    #[test]
    fn test_wrong_field_type() {
        let s = PackStreamStructure::new(signature::DATE, vec!["not a number".into()]);
        let err = ValueStructure::from_structure(s, StructDialect::V4).unwrap_err();
        assert!(err.to_string().contains("Date field 1 must be Integer"));
    }

    #[test]
    fn test_unknown_signature() {
        let s = PackStreamStructure::new(0x7A, vec![]);
        assert!(matches!(
            ValueStructure::from_structure(s, StructDialect::V5),
            Err(PackStreamError::UnknownSignature(0x7A))
        ));
    }

    #[test]
    fn test_points() {
        let p = ValueStructure::Point3D {
            srid: 4979,
            x: 12.5,
            y: 56.1,
            z: 100.0,
        };
        let s = p.clone().into_structure(StructDialect::V4);
        assert_eq!(s.tag, signature::POINT_3D);
        assert_eq!(ValueStructure::from_structure(s, StructDialect::V4).unwrap(), p);
    }
}
