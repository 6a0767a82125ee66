//! Driver Types
//!
//! 드라이버에서 사용하는 타입 정의
//!
//! 서버가 보낸 값은 협상된 버전의 구조체 방언([`StructDialect`])으로
//! 해석(`hydrate`)되고, 파라미터는 같은 방언으로 인코딩(`dehydrate`)됩니다.
//! 5.x는 엘리먼트 ID와 UTC 기반 날짜-시간(`0x49`/`0x69`)을, 4.x는 로컬 초
//! 기반 날짜-시간(`0x46`/`0x66`)을 사용합니다.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

use super::error::{DriverError, DriverResult};
use crate::bolt::packstream::{
    PackStreamDateTime, PackStreamNode, PackStreamPath, PackStreamValue, StructDialect, TimeZone,
    ValueStructure,
};

/// 0001-01-01부터 1970-01-01까지의 일 수
const UNIX_EPOCH_DAYS_FROM_CE: i64 = 719_163;
const NANOS_PER_SECOND: i64 = 1_000_000_000;

// ============================================================================
// Value - 그래프 값
// ============================================================================

/// 그래프 값 타입
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Null
    Null,
    /// Boolean
    Boolean(bool),
    /// Integer (i64)
    Integer(i64),
    /// Float (f64)
    Float(f64),
    /// String
    String(String),
    /// Bytes
    Bytes(Vec<u8>),
    /// List
    List(Vec<Value>),
    /// Map
    Map(HashMap<String, Value>),
    /// Node
    Node(Node),
    /// Relationship
    Relationship(Relationship),
    /// Path
    Path(Path),
    /// Point (2D/3D)
    Point(Point),
    /// Date
    Date(NaiveDate),
    /// Time (오프셋 포함)
    Time(OffsetTime),
    /// LocalTime
    LocalTime(NaiveTime),
    /// DateTime (고정 오프셋)
    DateTime(DateTime<FixedOffset>),
    /// DateTime (이름 있는 시간대)
    DateTimeZoneId(ZonedDateTime),
    /// LocalDateTime
    LocalDateTime(NaiveDateTime),
    /// Duration
    Duration(Duration),
}

impl Value {
    /// Null 여부
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Boolean으로 변환
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Integer로 변환
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Float로 변환
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// String으로 변환
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// List로 변환
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    /// Map으로 변환
    pub fn as_map(&self) -> Option<&HashMap<String, Value>> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Node로 변환
    pub fn as_node(&self) -> Option<&Node> {
        match self {
            Value::Node(n) => Some(n),
            _ => None,
        }
    }

    /// Relationship으로 변환
    pub fn as_relationship(&self) -> Option<&Relationship> {
        match self {
            Value::Relationship(r) => Some(r),
            _ => None,
        }
    }

    /// Path로 변환
    pub fn as_path(&self) -> Option<&Path> {
        match self {
            Value::Path(p) => Some(p),
            _ => None,
        }
    }

    /// 타입 이름
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "Null",
            Value::Boolean(_) => "Boolean",
            Value::Integer(_) => "Integer",
            Value::Float(_) => "Float",
            Value::String(_) => "String",
            Value::Bytes(_) => "Bytes",
            Value::List(_) => "List",
            Value::Map(_) => "Map",
            Value::Node(_) => "Node",
            Value::Relationship(_) => "Relationship",
            Value::Path(_) => "Path",
            Value::Point(_) => "Point",
            Value::Date(_) => "Date",
            Value::Time(_) => "Time",
            Value::LocalTime(_) => "LocalTime",
            Value::DateTime(_) => "DateTime",
            Value::DateTimeZoneId(_) => "DateTimeZoneId",
            Value::LocalDateTime(_) => "LocalDateTime",
            Value::Duration(_) => "Duration",
        }
    }

    /// 서버 값을 드라이버 값으로 해석
    pub fn hydrate(value: PackStreamValue, dialect: StructDialect) -> DriverResult<Value> {
        Ok(match value {
            PackStreamValue::Null => Value::Null,
            PackStreamValue::Boolean(b) => Value::Boolean(b),
            PackStreamValue::Integer(i) => Value::Integer(i),
            PackStreamValue::Float(f) => Value::Float(f),
            PackStreamValue::String(s) => Value::String(s),
            PackStreamValue::Bytes(b) => Value::Bytes(b),
            PackStreamValue::List(l) => Value::List(
                l.into_iter()
                    .map(|v| Value::hydrate(v, dialect))
                    .collect::<DriverResult<_>>()?,
            ),
            PackStreamValue::Map(m) => Value::Map(hydrate_map(m, dialect)?),
            PackStreamValue::Structure(s) => {
                let structure = ValueStructure::from_structure(s, dialect)
                    .map_err(|e| DriverError::protocol(format!("Cannot hydrate value: {}", e)))?;
                hydrate_structure(structure, dialect)?
            }
        })
    }

    /// 파라미터로 보낼 수 있게 인코딩
    ///
    /// 그래프 엔티티(Node, Relationship, Path)는 파라미터가 될 수 없습니다.
    pub fn dehydrate(self, dialect: StructDialect) -> DriverResult<PackStreamValue> {
        let structure = match self {
            Value::Null => return Ok(PackStreamValue::Null),
            Value::Boolean(b) => return Ok(PackStreamValue::Boolean(b)),
            Value::Integer(i) => return Ok(PackStreamValue::Integer(i)),
            Value::Float(f) => return Ok(PackStreamValue::Float(f)),
            Value::String(s) => return Ok(PackStreamValue::String(s)),
            Value::Bytes(b) => return Ok(PackStreamValue::Bytes(b)),
            Value::List(l) => {
                return Ok(PackStreamValue::List(
                    l.into_iter()
                        .map(|v| v.dehydrate(dialect))
                        .collect::<DriverResult<_>>()?,
                ))
            }
            Value::Map(m) => return dehydrate_params(m, dialect).map(PackStreamValue::Map),
            v @ (Value::Node(_) | Value::Relationship(_) | Value::Path(_)) => {
                return Err(DriverError::type_conversion(format!(
                    "{} values cannot be sent as parameters",
                    v.type_name()
                )))
            }
            Value::Point(p) => match p.z {
                Some(z) => ValueStructure::Point3D {
                    srid: p.srid as i64,
                    x: p.x,
                    y: p.y,
                    z,
                },
                None => ValueStructure::Point2D {
                    srid: p.srid as i64,
                    x: p.x,
                    y: p.y,
                },
            },
            Value::Date(d) => ValueStructure::Date {
                days: d.num_days_from_ce() as i64 - UNIX_EPOCH_DAYS_FROM_CE,
            },
            Value::Time(t) => ValueStructure::Time {
                nanoseconds: nanos_of_day(&t.time),
                offset_seconds: t.offset_seconds as i64,
            },
            Value::LocalTime(t) => ValueStructure::LocalTime {
                nanoseconds: nanos_of_day(&t),
            },
            Value::DateTime(dt) => {
                let offset = dt.offset().local_minus_utc() as i64;
                let seconds = if dialect.utc_date_time {
                    dt.timestamp()
                } else {
                    dt.timestamp() + offset
                };
                ValueStructure::DateTime(PackStreamDateTime {
                    seconds,
                    nanoseconds: dt.timestamp_subsec_nanos() as i64,
                    zone: TimeZone::Offset(offset),
                })
            }
            Value::DateTimeZoneId(zdt) => {
                if zdt.utc != dialect.utc_date_time {
                    return Err(DriverError::type_conversion(format!(
                        "Date-time in zone '{}' was received as {} time and cannot be re-sent under this protocol version",
                        zdt.zone_id,
                        if zdt.utc { "UTC" } else { "local" }
                    )));
                }
                ValueStructure::DateTime(PackStreamDateTime {
                    seconds: zdt.datetime.and_utc().timestamp(),
                    nanoseconds: zdt.datetime.nanosecond() as i64,
                    zone: TimeZone::Id(zdt.zone_id),
                })
            }
            Value::LocalDateTime(dt) => ValueStructure::LocalDateTime {
                seconds: dt.and_utc().timestamp(),
                nanoseconds: dt.nanosecond() as i64,
            },
            Value::Duration(d) => ValueStructure::Duration {
                months: d.months,
                days: d.days,
                seconds: d.seconds,
                nanoseconds: d.nanoseconds as i64,
            },
        };
        Ok(PackStreamValue::Structure(structure.into_structure(dialect)))
    }
}

/// 맵 값 해석
pub(crate) fn hydrate_map(
    map: HashMap<String, PackStreamValue>,
    dialect: StructDialect,
) -> DriverResult<HashMap<String, Value>> {
    map.into_iter()
        .map(|(k, v)| Value::hydrate(v, dialect).map(|v| (k, v)))
        .collect()
}

/// 파라미터 맵 인코딩
pub(crate) fn dehydrate_params(
    params: HashMap<String, Value>,
    dialect: StructDialect,
) -> DriverResult<HashMap<String, PackStreamValue>> {
    params
        .into_iter()
        .map(|(k, v)| v.dehydrate(dialect).map(|v| (k, v)))
        .collect()
}

fn out_of_range(what: &str) -> DriverError {
    DriverError::type_conversion(format!("{} value out of range", what))
}

fn nanos_of_day(time: &NaiveTime) -> i64 {
    time.num_seconds_from_midnight() as i64 * NANOS_PER_SECOND + time.nanosecond() as i64
}

fn time_from_nanos(nanoseconds: i64) -> DriverResult<NaiveTime> {
    let secs = u32::try_from(nanoseconds.div_euclid(NANOS_PER_SECOND)).map_err(|_| out_of_range("Time"))?;
    let nanos = nanoseconds.rem_euclid(NANOS_PER_SECOND) as u32;
    NaiveTime::from_num_seconds_from_midnight_opt(secs, nanos).ok_or_else(|| out_of_range("Time"))
}

fn naive_from_timestamp(seconds: i64, nanoseconds: i64) -> DriverResult<NaiveDateTime> {
    u32::try_from(nanoseconds)
        .ok()
        .and_then(|n| DateTime::<Utc>::from_timestamp(seconds, n))
        .map(|dt| dt.naive_utc())
        .ok_or_else(|| out_of_range("DateTime"))
}

fn offset_from_seconds(seconds: i64) -> DriverResult<FixedOffset> {
    i32::try_from(seconds)
        .ok()
        .and_then(FixedOffset::east_opt)
        .ok_or_else(|| out_of_range("Time zone offset"))
}

fn node_from(node: PackStreamNode, dialect: StructDialect) -> DriverResult<Node> {
    Ok(Node {
        id: node.id,
        labels: node.labels,
        properties: hydrate_map(node.properties, dialect)?,
        element_id: node.element_id,
    })
}

fn path_from(path: PackStreamPath, dialect: StructDialect) -> DriverResult<Path> {
    let invalid = |msg: &str| DriverError::protocol(format!("Invalid path: {}", msg));

    let nodes = path
        .nodes
        .into_iter()
        .map(|n| node_from(n, dialect))
        .collect::<DriverResult<Vec<_>>>()?;
    let unbound = path
        .relationships
        .into_iter()
        .map(|r| Ok((r.id, r.rel_type, hydrate_map(r.properties, dialect)?, r.element_id)))
        .collect::<DriverResult<Vec<_>>>()?;

    if path.indices.len() % 2 != 0 {
        return Err(invalid("odd number of indices"));
    }
    let mut previous = nodes.first().cloned().ok_or_else(|| invalid("no nodes"))?;
    let mut sequence = vec![previous.clone()];
    let mut relationships = Vec::with_capacity(path.indices.len() / 2);

    for pair in path.indices.chunks(2) {
        let (rel_index, node_index) = (pair[0], pair[1]);
        let next = usize::try_from(node_index)
            .ok()
            .and_then(|i| nodes.get(i))
            .cloned()
            .ok_or_else(|| invalid("node index out of range"))?;
        let forward = rel_index > 0;
        let (id, rel_type, properties, element_id) = usize::try_from(rel_index.unsigned_abs())
            .ok()
            .and_then(|i| i.checked_sub(1))
            .and_then(|i| unbound.get(i))
            .cloned()
            .ok_or_else(|| invalid("relationship index out of range"))?;

        let (start, end) = if forward { (&previous, &next) } else { (&next, &previous) };
        relationships.push(Relationship {
            id,
            start_node_id: start.id,
            end_node_id: end.id,
            rel_type,
            properties,
            element_id,
            start_node_element_id: start.element_id.clone(),
            end_node_element_id: end.element_id.clone(),
        });
        sequence.push(next.clone());
        previous = next;
    }

    Ok(Path::new(sequence, relationships))
}

fn hydrate_structure(structure: ValueStructure, dialect: StructDialect) -> DriverResult<Value> {
    Ok(match structure {
        ValueStructure::Node(n) => Value::Node(node_from(n, dialect)?),
        ValueStructure::Relationship(r) => Value::Relationship(Relationship {
            id: r.id,
            start_node_id: r.start_node_id,
            end_node_id: r.end_node_id,
            rel_type: r.rel_type,
            properties: hydrate_map(r.properties, dialect)?,
            element_id: r.element_id,
            start_node_element_id: r.start_node_element_id,
            end_node_element_id: r.end_node_element_id,
        }),
        ValueStructure::UnboundRelationship(_) => {
            return Err(DriverError::protocol("Unbound relationship outside of a path"))
        }
        ValueStructure::Path(p) => Value::Path(path_from(p, dialect)?),
        ValueStructure::Date { days } => {
            let days = days
                .checked_add(UNIX_EPOCH_DAYS_FROM_CE)
                .and_then(|d| i32::try_from(d).ok())
                .and_then(NaiveDate::from_num_days_from_ce_opt)
                .ok_or_else(|| out_of_range("Date"))?;
            Value::Date(days)
        }
        ValueStructure::Time {
            nanoseconds,
            offset_seconds,
        } => Value::Time(OffsetTime {
            time: time_from_nanos(nanoseconds)?,
            offset_seconds: offset_from_seconds(offset_seconds)?.local_minus_utc(),
        }),
        ValueStructure::LocalTime { nanoseconds } => Value::LocalTime(time_from_nanos(nanoseconds)?),
        ValueStructure::DateTime(dt) => {
            let naive = naive_from_timestamp(dt.seconds, dt.nanoseconds)?;
            match dt.zone {
                TimeZone::Offset(seconds) => {
                    let offset = offset_from_seconds(seconds)?;
                    let value = if dialect.utc_date_time {
                        Some(naive.and_utc().with_timezone(&offset))
                    } else {
                        naive.and_local_timezone(offset).single()
                    };
                    Value::DateTime(value.ok_or_else(|| out_of_range("DateTime"))?)
                }
                TimeZone::Id(zone_id) => Value::DateTimeZoneId(ZonedDateTime {
                    datetime: naive,
                    zone_id,
                    utc: dialect.utc_date_time,
                }),
            }
        }
        ValueStructure::LocalDateTime { seconds, nanoseconds } => {
            Value::LocalDateTime(naive_from_timestamp(seconds, nanoseconds)?)
        }
        ValueStructure::Duration {
            months,
            days,
            seconds,
            nanoseconds,
        } => Value::Duration(Duration::new(
            months,
            days,
            seconds,
            i32::try_from(nanoseconds).map_err(|_| out_of_range("Duration"))?,
        )),
        ValueStructure::Point2D { srid, x, y } => {
            Value::Point(Point::new_2d(i32::try_from(srid).map_err(|_| out_of_range("SRID"))?, x, y))
        }
        ValueStructure::Point3D { srid, x, y, z } => Value::Point(Point::new_3d(
            i32::try_from(srid).map_err(|_| out_of_range("SRID"))?,
            x,
            y,
            z,
        )),
    })
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(fl) => write!(f, "{}", fl),
            Value::String(s) => write!(f, "\"{}\"", s),
            Value::Bytes(b) => write!(f, "<{} bytes>", b.len()),
            Value::List(l) => write!(f, "[{} items]", l.len()),
            Value::Map(m) => write!(f, "{{{} entries}}", m.len()),
            Value::Node(n) => write!(f, "{}", n),
            Value::Relationship(r) => write!(f, "{}", r),
            Value::Path(p) => write!(f, "{}", p),
            Value::Point(p) => write!(f, "{}", p),
            Value::Date(d) => write!(f, "{}", d),
            Value::Time(t) => write!(f, "{}", t),
            Value::LocalTime(t) => write!(f, "{}", t),
            Value::DateTime(dt) => write!(f, "{}", dt),
            Value::DateTimeZoneId(dt) => write!(f, "{}", dt),
            Value::LocalDateTime(dt) => write!(f, "{}", dt),
            Value::Duration(d) => write!(f, "{}", d),
        }
    }
}

// From implementations
impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<HashMap<String, Value>> for Value {
    fn from(v: HashMap<String, Value>) -> Self {
        Value::Map(v)
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Value::Date(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::LocalDateTime(v)
    }
}

impl From<DateTime<FixedOffset>> for Value {
    fn from(v: DateTime<FixedOffset>) -> Self {
        Value::DateTime(v)
    }
}

impl From<Point> for Value {
    fn from(v: Point) -> Self {
        Value::Point(v)
    }
}

impl From<Duration> for Value {
    fn from(v: Duration) -> Self {
        Value::Duration(v)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::List(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(val) => val.into(),
            None => Value::Null,
        }
    }
}

// ============================================================================
// Node - 그래프 노드
// ============================================================================

/// 그래프 노드
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// 노드 ID
    pub id: i64,
    /// 레이블
    pub labels: Vec<String>,
    /// 속성
    pub properties: HashMap<String, Value>,
    /// 엘리먼트 ID (5.x)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub element_id: Option<String>,
}

impl Node {
    /// 새 노드 생성
    pub fn new(id: i64, labels: Vec<String>, properties: HashMap<String, Value>) -> Self {
        Self {
            id,
            labels,
            properties,
            element_id: None,
        }
    }

    /// 레이블 포함 여부
    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }

    /// 속성 가져오기
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    /// 속성 가져오기 (타입 변환)
    pub fn get_as<T: TryFrom<Value, Error = DriverError>>(&self, key: &str) -> DriverResult<T> {
        self.properties
            .get(key)
            .cloned()
            .ok_or_else(|| DriverError::type_conversion(format!("Property '{}' not found", key)))
            .and_then(|v| T::try_from(v))
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let labels = if self.labels.is_empty() {
            String::new()
        } else {
            format!(":{}", self.labels.join(":"))
        };
        write!(f, "({}{})", self.id, labels)
    }
}

// ============================================================================
// Relationship - 그래프 관계
// ============================================================================

/// 그래프 관계
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    /// 관계 ID
    pub id: i64,
    /// 시작 노드 ID
    pub start_node_id: i64,
    /// 끝 노드 ID
    pub end_node_id: i64,
    /// 타입
    #[serde(rename = "type")]
    pub rel_type: String,
    /// 속성
    pub properties: HashMap<String, Value>,
    /// 엘리먼트 ID (5.x)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub element_id: Option<String>,
    /// 시작 노드 엘리먼트 ID (5.x)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_node_element_id: Option<String>,
    /// 끝 노드 엘리먼트 ID (5.x)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_node_element_id: Option<String>,
}

impl Relationship {
    /// 새 관계 생성
    pub fn new(
        id: i64,
        start_node_id: i64,
        end_node_id: i64,
        rel_type: String,
        properties: HashMap<String, Value>,
    ) -> Self {
        Self {
            id,
            start_node_id,
            end_node_id,
            rel_type,
            properties,
            element_id: None,
            start_node_element_id: None,
            end_node_element_id: None,
        }
    }

    /// 속성 가져오기
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }
}

impl fmt::Display for Relationship {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({})-[:{}]->({})  [id: {}]",
            self.start_node_id, self.rel_type, self.end_node_id, self.id
        )
    }
}

// ============================================================================
// Path - 그래프 경로
// ============================================================================

/// 그래프 경로
///
/// `nodes`는 방문 순서 (같은 노드가 반복될 수 있음), `relationships`는
/// 이동 순서이며 각 관계의 시작/끝은 실제 방향을 따릅니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Path {
    /// 노드들
    pub nodes: Vec<Node>,
    /// 관계들
    pub relationships: Vec<Relationship>,
}

impl Path {
    /// 새 경로 생성
    pub fn new(nodes: Vec<Node>, relationships: Vec<Relationship>) -> Self {
        Self { nodes, relationships }
    }

    /// 경로 길이 (관계 수)
    pub fn len(&self) -> usize {
        self.relationships.len()
    }

    /// 빈 경로 여부
    pub fn is_empty(&self) -> bool {
        self.relationships.is_empty()
    }

    /// 시작 노드
    pub fn start(&self) -> Option<&Node> {
        self.nodes.first()
    }

    /// 끝 노드
    pub fn end(&self) -> Option<&Node> {
        self.nodes.last()
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<Path: {} nodes, {} rels>", self.nodes.len(), self.relationships.len())
    }
}

// ============================================================================
// Point - 공간 좌표
// ============================================================================

/// 공간 좌표
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// SRID (Spatial Reference ID)
    pub srid: i32,
    /// X 좌표 (경도)
    pub x: f64,
    /// Y 좌표 (위도)
    pub y: f64,
    /// Z 좌표 (고도, 선택적)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub z: Option<f64>,
}

impl Point {
    /// 2D 포인트 생성
    pub fn new_2d(srid: i32, x: f64, y: f64) -> Self {
        Self { srid, x, y, z: None }
    }

    /// 3D 포인트 생성
    pub fn new_3d(srid: i32, x: f64, y: f64, z: f64) -> Self {
        Self { srid, x, y, z: Some(z) }
    }

    /// WGS84 2D 포인트 (경도, 위도)
    pub fn wgs84_2d(longitude: f64, latitude: f64) -> Self {
        Self::new_2d(4326, longitude, latitude)
    }

    /// WGS84 3D 포인트 (경도, 위도, 고도)
    pub fn wgs84_3d(longitude: f64, latitude: f64, height: f64) -> Self {
        Self::new_3d(4979, longitude, latitude, height)
    }

    /// Cartesian 2D 포인트
    pub fn cartesian_2d(x: f64, y: f64) -> Self {
        Self::new_2d(7203, x, y)
    }

    /// Cartesian 3D 포인트
    pub fn cartesian_3d(x: f64, y: f64, z: f64) -> Self {
        Self::new_3d(9157, x, y, z)
    }

    /// 3D 여부
    pub fn is_3d(&self) -> bool {
        self.z.is_some()
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.z {
            Some(z) => write!(f, "Point(srid={}, x={}, y={}, z={})", self.srid, self.x, self.y, z),
            None => write!(f, "Point(srid={}, x={}, y={})", self.srid, self.x, self.y),
        }
    }
}

// ============================================================================
// Temporal - 시간 값
// ============================================================================

/// 오프셋이 있는 시각
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OffsetTime {
    /// 시각
    pub time: NaiveTime,
    /// UTC 기준 오프셋 (초)
    pub offset_seconds: i32,
}

impl fmt::Display for OffsetTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match FixedOffset::east_opt(self.offset_seconds) {
            Some(offset) => write!(f, "{}{}", self.time, offset),
            None => write!(f, "{}+{}s", self.time, self.offset_seconds),
        }
    }
}

/// 이름 있는 시간대의 날짜-시간
///
/// 시간대 데이터베이스 없이 받은 그대로 보관합니다. `utc`가 참이면
/// `datetime`은 UTC 시각, 거짓이면 해당 시간대의 벽시계 시각입니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZonedDateTime {
    /// 날짜-시간
    pub datetime: NaiveDateTime,
    /// 시간대 ID (예: `Europe/Stockholm`)
    pub zone_id: String,
    /// `datetime`이 UTC 기준인지
    pub utc: bool,
}

impl fmt::Display for ZonedDateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let suffix = if self.utc { "Z" } else { "" };
        write!(f, "{}{}[{}]", self.datetime, suffix, self.zone_id)
    }
}

// ============================================================================
// Duration - 시간 간격
// ============================================================================

/// 시간 간격
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Duration {
    /// 개월
    pub months: i64,
    /// 일
    pub days: i64,
    /// 초
    pub seconds: i64,
    /// 나노초
    pub nanoseconds: i32,
}

impl Duration {
    /// 새 Duration 생성
    pub fn new(months: i64, days: i64, seconds: i64, nanoseconds: i32) -> Self {
        Self {
            months,
            days,
            seconds,
            nanoseconds,
        }
    }

    /// 초에서 생성
    pub fn from_seconds(seconds: i64) -> Self {
        Self::new(0, 0, seconds, 0)
    }

    /// 일에서 생성
    pub fn from_days(days: i64) -> Self {
        Self::new(0, days, 0, 0)
    }

    /// 개월에서 생성
    pub fn from_months(months: i64) -> Self {
        Self::new(months, 0, 0, 0)
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "P{}M{}DT{}S",
            self.months,
            self.days,
            self.seconds as f64 + self.nanoseconds as f64 / 1_000_000_000.0
        )
    }
}

// ============================================================================
// TryFrom implementations
// ============================================================================

macro_rules! impl_try_from_value {
    ($target:ty, $name:literal, $($pattern:pat => $out:expr),+ $(,)?) => {
        impl TryFrom<Value> for $target {
            type Error = DriverError;

            fn try_from(value: Value) -> Result<Self, Self::Error> {
                match value {
                    $($pattern => Ok($out),)+
                    other => Err(DriverError::type_conversion(format!(
                        "Cannot convert {} to {}",
                        other.type_name(),
                        $name
                    ))),
                }
            }
        }
    };
}

impl_try_from_value!(bool, "bool", Value::Boolean(b) => b);
impl_try_from_value!(i64, "i64", Value::Integer(i) => i);
impl_try_from_value!(f64, "f64", Value::Float(f) => f, Value::Integer(i) => i as f64);
impl_try_from_value!(String, "String", Value::String(s) => s);
impl_try_from_value!(Vec<u8>, "bytes", Value::Bytes(b) => b);
impl_try_from_value!(Vec<Value>, "list", Value::List(l) => l);
impl_try_from_value!(HashMap<String, Value>, "map", Value::Map(m) => m);
impl_try_from_value!(Node, "Node", Value::Node(n) => n);
impl_try_from_value!(Relationship, "Relationship", Value::Relationship(r) => r);
impl_try_from_value!(Path, "Path", Value::Path(p) => p);
impl_try_from_value!(Point, "Point", Value::Point(p) => p);
impl_try_from_value!(NaiveDate, "Date", Value::Date(d) => d);
impl_try_from_value!(NaiveDateTime, "LocalDateTime", Value::LocalDateTime(d) => d);
impl_try_from_value!(DateTime<FixedOffset>, "DateTime", Value::DateTime(d) => d);
impl_try_from_value!(Duration, "Duration", Value::Duration(d) => d);

// ============================================================================
// Tests
// ============================================================================
