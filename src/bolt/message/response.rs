//! Bolt protocol response messages.
//!
//! Response messages are sent from the server to the client.

use std::collections::HashMap;

use super::metadata::{Notification, QueryStats, RoutingInfo};
use super::tag;
use crate::bolt::packstream::{PackStreamError, PackStreamStructure, PackStreamValue};

/// All Bolt response messages.
#[derive(Debug, Clone, PartialEq)]
pub enum BoltResponse {
    /// SUCCESS - Operation completed successfully
    Success(SuccessMessage),
    /// RECORD - Query result record
    Record(RecordMessage),
    /// FAILURE - Operation failed
    Failure(FailureMessage),
    /// IGNORED - Message was ignored (connection in FAILED state)
    Ignored,
}

impl BoltResponse {
    /// Get message name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            BoltResponse::Success(_) => "SUCCESS",
            BoltResponse::Record(_) => "RECORD",
            BoltResponse::Failure(_) => "FAILURE",
            BoltResponse::Ignored => "IGNORED",
        }
    }

    /// Whether this response ends the current request's response stream.
    pub fn is_summary(&self) -> bool {
        !matches!(self, BoltResponse::Record(_))
    }

    /// Convert to PackStream structure.
    pub fn to_structure(&self) -> PackStreamStructure {
        match self {
            BoltResponse::Success(msg) => PackStreamStructure::new(
                tag::SUCCESS,
                vec![PackStreamValue::Map(msg.metadata.clone())],
            ),
            BoltResponse::Record(msg) => PackStreamStructure::new(
                tag::RECORD,
                vec![PackStreamValue::List(msg.fields.clone())],
            ),
            BoltResponse::Failure(msg) => msg.to_structure(),
            BoltResponse::Ignored => PackStreamStructure::new(tag::IGNORED, vec![]),
        }
    }

    /// Parse from PackStream structure.
    pub fn from_structure(s: PackStreamStructure) -> Result<Self, PackStreamError> {
        let tag = s.tag;
        let mut fields = s.fields.into_iter();
        match tag {
            tag::SUCCESS => {
                let metadata = match fields.next() {
                    Some(PackStreamValue::Map(map)) => map,
                    None => HashMap::new(),
                    Some(other) => return Err(bad_field("SUCCESS", "map", &other)),
                };
                Ok(BoltResponse::Success(SuccessMessage { metadata }))
            }
            tag::RECORD => match fields.next() {
                Some(PackStreamValue::List(values)) => {
                    Ok(BoltResponse::Record(RecordMessage::new(values)))
                }
                Some(other) => Err(bad_field("RECORD", "list", &other)),
                None => Ok(BoltResponse::Record(RecordMessage::new(Vec::new()))),
            },
            tag::FAILURE => match fields.next() {
                Some(PackStreamValue::Map(map)) => {
                    Ok(BoltResponse::Failure(FailureMessage::from_map(&map)))
                }
                Some(other) => Err(bad_field("FAILURE", "map", &other)),
                None => Err(PackStreamError::InvalidStructure(
                    "FAILURE requires metadata map".to_string(),
                )),
            },
            tag::IGNORED => Ok(BoltResponse::Ignored),
            _ => Err(PackStreamError::InvalidStructure(format!(
                "Unknown response message tag: 0x{:02X}",
                tag
            ))),
        }
    }
}

fn bad_field(message: &str, expected: &str, got: &PackStreamValue) -> PackStreamError {
    PackStreamError::InvalidStructure(format!(
        "{} field must be {}, got {}",
        message,
        expected,
        got.type_name()
    ))
}

/// SUCCESS message - Operation completed successfully.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SuccessMessage {
    /// Response metadata
    pub metadata: HashMap<String, PackStreamValue>,
}

impl SuccessMessage {
    /// Create a new SUCCESS message with empty metadata.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add metadata entry.
    pub fn with(mut self, key: &str, value: impl Into<PackStreamValue>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    /// Get metadata entry.
    pub fn get(&self, key: &str) -> Option<&PackStreamValue> {
        self.metadata.get(key)
    }

    /// Server agent from HELLO.
    pub fn server(&self) -> Option<&str> {
        self.get("server").and_then(|v| v.as_str())
    }

    /// Connection id from HELLO.
    pub fn connection_id(&self) -> Option<&str> {
        self.get("connection_id").and_then(|v| v.as_str())
    }

    /// Milliseconds until the first record was available.
    pub fn t_first(&self) -> Option<i64> {
        self.get("t_first").and_then(|v| v.as_int())
    }

    /// Milliseconds until the last record was consumed.
    pub fn t_last(&self) -> Option<i64> {
        self.get("t_last").and_then(|v| v.as_int())
    }

    /// Field names from RUN success.
    pub fn fields(&self) -> Option<Vec<String>> {
        self.get("fields").cloned().and_then(|v| v.into_string_list())
    }

    /// Query statistics.
    pub fn stats(&self) -> Option<QueryStats> {
        self.get("stats").and_then(|v| v.as_map()).map(QueryStats::from_map)
    }

    /// Notifications attached to the summary.
    pub fn notifications(&self) -> Vec<Notification> {
        self.get("notifications")
            .and_then(|v| v.as_list())
            .map(|list| {
                list.iter()
                    .filter_map(|item| item.as_map().and_then(Notification::from_map))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Query type: "r", "w", "rw" or "s".
    pub fn query_type(&self) -> Option<&str> {
        self.get("type").and_then(|v| v.as_str())
    }

    /// Whether more records are waiting after a PULL with a limit.
    pub fn has_more(&self) -> bool {
        self.get("has_more")
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    /// Bookmark after commit or auto-commit.
    pub fn bookmark(&self) -> Option<&str> {
        self.get("bookmark").and_then(|v| v.as_str())
    }

    /// Database the query ran against.
    pub fn db(&self) -> Option<&str> {
        self.get("db").and_then(|v| v.as_str())
    }

    /// Query id inside an explicit transaction.
    pub fn qid(&self) -> Option<i64> {
        self.get("qid").and_then(|v| v.as_int())
    }

    /// Routing table from ROUTE success.
    pub fn routing_table(&self) -> Result<RoutingInfo, PackStreamError> {
        match self.get("rt").and_then(|v| v.as_map()) {
            Some(rt) => RoutingInfo::from_map(rt),
            None => Err(PackStreamError::InvalidStructure(
                "ROUTE success without rt map".to_string(),
            )),
        }
    }
}

/// RECORD message - Query result record.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordMessage {
    /// Field values
    pub fields: Vec<PackStreamValue>,
}

impl RecordMessage {
    /// Create a new RECORD message.
    pub fn new(fields: Vec<PackStreamValue>) -> Self {
        Self { fields }
    }
}

/// FAILURE message - Operation failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureMessage {
    /// Status code, e.g. `Neo.ClientError.Statement.SyntaxError`
    pub code: String,
    /// Error message
    pub message: String,
}

impl FailureMessage {
    /// Create a new FAILURE message.
    pub fn new(code: &str, message: &str) -> Self {
        Self {
            code: code.to_string(),
            message: message.to_string(),
        }
    }

    /// Classification segment of the code (`ClientError`, `TransientError`, ...).
    pub fn classification(&self) -> &str {
        self.code.split('.').nth(1).unwrap_or("Unknown")
    }

    /// Category segment of the code (`Statement`, `Security`, ...).
    pub fn category(&self) -> &str {
        self.code.split('.').nth(2).unwrap_or("Unknown")
    }

    fn from_map(map: &HashMap<String, PackStreamValue>) -> Self {
        // Servers omit the code for some internal failures.
        let code = map
            .get("code")
            .and_then(|v| v.as_str())
            .unwrap_or("Neo.DatabaseError.General.UnknownError");
        let message = map
            .get("message")
            .and_then(|v| v.as_str())
            .unwrap_or_default();
        Self::new(code, message)
    }

    /// Convert to PackStream structure.
    pub fn to_structure(&self) -> PackStreamStructure {
        let mut metadata = HashMap::new();
        metadata.insert("code".to_string(), self.code.as_str().into());
        metadata.insert("message".to_string(), self.message.as_str().into());
        PackStreamStructure::new(tag::FAILURE, vec![PackStreamValue::Map(metadata)])
    }
}

impl std::fmt::Display for FailureMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}
