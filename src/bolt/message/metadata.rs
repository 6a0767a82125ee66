//! Bolt protocol metadata types.
//!
//! Structured views over the maps carried in SUCCESS responses, plus the
//! notification filter settings sent in HELLO and BEGIN/RUN.

use std::collections::HashMap;

use crate::bolt::packstream::{PackStreamError, PackStreamValue};

/// Query statistics returned in SUCCESS after PULL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryStats {
    /// Nodes created
    pub nodes_created: i64,
    /// Nodes deleted
    pub nodes_deleted: i64,
    /// Relationships created
    pub relationships_created: i64,
    /// Relationships deleted
    pub relationships_deleted: i64,
    /// Properties set
    pub properties_set: i64,
    /// Labels added
    pub labels_added: i64,
    /// Labels removed
    pub labels_removed: i64,
    /// Indexes added
    pub indexes_added: i64,
    /// Indexes removed
    pub indexes_removed: i64,
    /// Constraints added
    pub constraints_added: i64,
    /// Constraints removed
    pub constraints_removed: i64,
    /// System updates (administration commands)
    pub system_updates: i64,
    /// Server flag for data updates
    pub contains_updates: bool,
    /// Server flag for system updates
    pub contains_system_updates: bool,
}

impl QueryStats {
    /// Check if there were any data modifications.
    pub fn has_updates(&self) -> bool {
        self.contains_updates
            || [
                self.nodes_created,
                self.nodes_deleted,
                self.relationships_created,
                self.relationships_deleted,
                self.properties_set,
                self.labels_added,
                self.labels_removed,
                self.indexes_added,
                self.indexes_removed,
                self.constraints_added,
                self.constraints_removed,
            ]
            .iter()
            .any(|&n| n > 0)
    }

    /// Check if there were system updates.
    pub fn has_system_updates(&self) -> bool {
        self.contains_system_updates || self.system_updates > 0
    }

    /// Parse from the `stats` map; missing counters are zero.
    pub fn from_map(map: &HashMap<String, PackStreamValue>) -> Self {
        let count = |key: &str| map.get(key).and_then(|v| v.as_int()).unwrap_or(0);
        let flag = |key: &str| map.get(key).and_then(|v| v.as_bool()).unwrap_or(false);
        Self {
            nodes_created: count("nodes-created"),
            nodes_deleted: count("nodes-deleted"),
            relationships_created: count("relationships-created"),
            relationships_deleted: count("relationships-deleted"),
            properties_set: count("properties-set"),
            labels_added: count("labels-added"),
            labels_removed: count("labels-removed"),
            indexes_added: count("indexes-added"),
            indexes_removed: count("indexes-removed"),
            constraints_added: count("constraints-added"),
            constraints_removed: count("constraints-removed"),
            system_updates: count("system-updates"),
            contains_updates: flag("contains-updates"),
            contains_system_updates: flag("contains-system-updates"),
        }
    }
}

/// Notification severity as reported by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationSeverity {
    /// Warning
    Warning,
    /// Information
    Information,
    /// Anything this client does not know
    Unknown,
}

impl NotificationSeverity {
    fn parse(s: &str) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "WARNING" => NotificationSeverity::Warning,
            "INFORMATION" => NotificationSeverity::Information,
            _ => NotificationSeverity::Unknown,
        }
    }
}

/// Notification category, used both in reports and in filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationCategory {
    /// Query hints the planner could not satisfy
    Hint,
    /// Unrecognized labels, types or properties
    Unrecognized,
    /// Unsupported features
    Unsupported,
    /// Potential performance issues
    Performance,
    /// Deprecated features
    Deprecation,
    /// Security-related notices
    Security,
    /// Cluster topology notices
    Topology,
    /// Anything else
    Generic,
}

impl NotificationCategory {
    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationCategory::Hint => "HINT",
            NotificationCategory::Unrecognized => "UNRECOGNIZED",
            NotificationCategory::Unsupported => "UNSUPPORTED",
            NotificationCategory::Performance => "PERFORMANCE",
            NotificationCategory::Deprecation => "DEPRECATION",
            NotificationCategory::Security => "SECURITY",
            NotificationCategory::Topology => "TOPOLOGY",
            NotificationCategory::Generic => "GENERIC",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        Some(match s.to_ascii_uppercase().as_str() {
            "HINT" => NotificationCategory::Hint,
            "UNRECOGNIZED" => NotificationCategory::Unrecognized,
            "UNSUPPORTED" => NotificationCategory::Unsupported,
            "PERFORMANCE" => NotificationCategory::Performance,
            "DEPRECATION" => NotificationCategory::Deprecation,
            "SECURITY" => NotificationCategory::Security,
            "TOPOLOGY" => NotificationCategory::Topology,
            "GENERIC" => NotificationCategory::Generic,
            _ => return None,
        })
    }
}

/// Position in query for a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotificationPosition {
    /// Line number (1-based)
    pub line: i64,
    /// Column number (1-based)
    pub column: i64,
    /// Offset from start
    pub offset: i64,
}

/// Notification returned in SUCCESS metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    /// Notification code
    pub code: String,
    /// Title
    pub title: String,
    /// Description
    pub description: String,
    /// Severity
    pub severity: NotificationSeverity,
    /// Category, when the server reports one
    pub category: Option<NotificationCategory>,
    /// Position in query
    pub position: Option<NotificationPosition>,
}

impl Notification {
    /// Parse from PackStream map; entries without a code are dropped.
    pub fn from_map(map: &HashMap<String, PackStreamValue>) -> Option<Self> {
        let text = |key: &str| {
            map.get(key)
                .and_then(|v| v.as_str())
                .map(str::to_string)
                .unwrap_or_default()
        };
        let code = map.get("code").and_then(|v| v.as_str())?.to_string();

        let position = map.get("position").and_then(|v| v.as_map()).and_then(|pos| {
            Some(NotificationPosition {
                line: pos.get("line").and_then(|v| v.as_int())?,
                column: pos.get("column").and_then(|v| v.as_int())?,
                offset: pos.get("offset").and_then(|v| v.as_int()).unwrap_or(0),
            })
        });

        Some(Self {
            code,
            title: text("title"),
            description: text("description"),
            severity: map
                .get("severity")
                .and_then(|v| v.as_str())
                .map(NotificationSeverity::parse)
                .unwrap_or(NotificationSeverity::Unknown),
            category: map
                .get("category")
                .and_then(|v| v.as_str())
                .and_then(NotificationCategory::parse),
            position,
        })
    }
}

/// Lowest severity the server should report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MinimumSeverity {
    /// No notifications at all
    Off,
    /// Warnings only
    Warning,
    /// Warnings and information
    Information,
}

impl MinimumSeverity {
    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            MinimumSeverity::Off => "OFF",
            MinimumSeverity::Warning => "WARNING",
            MinimumSeverity::Information => "INFORMATION",
        }
    }
}

/// Server-side notification filtering (Bolt 5.2+).
///
/// The default value sends nothing and leaves the server's own defaults in
/// place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotificationConfig {
    /// Lowest severity to report
    pub minimum_severity: Option<MinimumSeverity>,
    /// Categories to suppress
    pub disabled_categories: Option<Vec<NotificationCategory>>,
}

impl NotificationConfig {
    /// Turn notifications off entirely.
    pub fn disabled() -> Self {
        Self {
            minimum_severity: Some(MinimumSeverity::Off),
            disabled_categories: None,
        }
    }

    /// Set the minimum severity.
    pub fn with_minimum_severity(mut self, severity: MinimumSeverity) -> Self {
        self.minimum_severity = Some(severity);
        self
    }

    /// Set the disabled categories.
    pub fn with_disabled_categories(mut self, categories: Vec<NotificationCategory>) -> Self {
        self.disabled_categories = Some(categories);
        self
    }

    /// Whether anything would be sent.
    pub fn is_empty(&self) -> bool {
        self.minimum_severity.is_none() && self.disabled_categories.is_none()
    }

    /// Write the filter keys into a message's metadata map.
    pub fn write_to(&self, extra: &mut HashMap<String, PackStreamValue>) {
        if let Some(severity) = self.minimum_severity {
            extra.insert(
                "notifications_minimum_severity".to_string(),
                severity.as_str().into(),
            );
        }
        if let Some(ref categories) = self.disabled_categories {
            let names: Vec<PackStreamValue> =
                categories.iter().map(|c| c.as_str().into()).collect();
            extra.insert(
                "notifications_disabled_categories".to_string(),
                PackStreamValue::List(names),
            );
        }
    }
}

/// Routing table as returned in the `rt` entry of a ROUTE success (or the
/// single record of the routing procedure).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingInfo {
    /// Time to live in seconds
    pub ttl: i64,
    /// Database the table belongs to (4.4+ resolves the home database here)
    pub db: Option<String>,
    /// Addresses with the ROUTE role
    pub routers: Vec<String>,
    /// Addresses with the READ role
    pub readers: Vec<String>,
    /// Addresses with the WRITE role
    pub writers: Vec<String>,
}

impl RoutingInfo {
    /// Parse `{ttl, db, servers: [{role, addresses}]}`. Unknown roles are
    /// ignored.
    pub fn from_map(map: &HashMap<String, PackStreamValue>) -> Result<Self, PackStreamError> {
        let invalid = |msg: &str| PackStreamError::InvalidStructure(format!("routing table {}", msg));

        let ttl = map
            .get("ttl")
            .and_then(|v| v.as_int())
            .ok_or_else(|| invalid("missing integer ttl"))?;
        let servers = map
            .get("servers")
            .and_then(|v| v.as_list())
            .ok_or_else(|| invalid("missing servers list"))?;

        let mut info = Self {
            ttl,
            db: map.get("db").and_then(|v| v.as_str()).map(str::to_string),
            routers: Vec::new(),
            readers: Vec::new(),
            writers: Vec::new(),
        };

        for server in servers {
            let server = server.as_map().ok_or_else(|| invalid("server entry is not a map"))?;
            let role = server
                .get("role")
                .and_then(|v| v.as_str())
                .ok_or_else(|| invalid("server without role"))?;
            let addresses = server
                .get("addresses")
                .cloned()
                .and_then(|v| v.into_string_list())
                .ok_or_else(|| invalid("server without address list"))?;

            match role {
                "ROUTE" => info.routers.extend(addresses),
                "READ" => info.readers.extend(addresses),
                "WRITE" => info.writers.extend(addresses),
                _ => {}
            }
        }
        Ok(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server(role: &str, addresses: &[&str]) -> PackStreamValue {
        let addresses: Vec<String> = addresses.iter().map(|s| s.to_string()).collect();
        PackStreamValue::Map(HashMap::from([
            ("role".to_string(), PackStreamValue::from(role)),
            ("addresses".to_string(), PackStreamValue::from(addresses)),
        ]))
    }

    #[test]
    fn test_query_stats_from_map() {
        let map = HashMap::from([
            ("nodes-created".to_string(), PackStreamValue::Integer(2)),
            ("labels-added".to_string(), PackStreamValue::Integer(3)),
        ]);
        let stats = QueryStats::from_map(&map);
        assert_eq!(stats.nodes_created, 2);
        assert_eq!(stats.labels_added, 3);
        assert_eq!(stats.relationships_created, 0);
        assert!(stats.has_updates());
        assert!(!stats.has_system_updates());
        assert!(!QueryStats::default().has_updates());
    }

    #[test]
    fn test_notification_from_map() {
        let map = HashMap::from([
            ("code".to_string(), PackStreamValue::from("Neo.ClientNotification.Statement.CartesianProduct")),
            ("severity".to_string(), PackStreamValue::from("WARNING")),
            ("category".to_string(), PackStreamValue::from("PERFORMANCE")),
            (
                "position".to_string(),
                PackStreamValue::Map(HashMap::from([
                    ("line".to_string(), PackStreamValue::Integer(1)),
                    ("column".to_string(), PackStreamValue::Integer(9)),
                ])),
            ),
        ]);
        let n = Notification::from_map(&map).unwrap();
        assert_eq!(n.severity, NotificationSeverity::Warning);
        assert_eq!(n.category, Some(NotificationCategory::Performance));
        assert_eq!(n.position.map(|p| (p.line, p.column, p.offset)), Some((1, 9, 0)));
        assert!(n.title.is_empty());

        assert!(Notification::from_map(&HashMap::new()).is_none());
    }

    #[test]
    fn test_notification_config_keys() {
        let mut extra = HashMap::new();
        NotificationConfig::default().write_to(&mut extra);
        assert!(extra.is_empty());

        NotificationConfig::default()
            .with_minimum_severity(MinimumSeverity::Warning)
            .with_disabled_categories(vec![NotificationCategory::Generic])
            .write_to(&mut extra);
        assert_eq!(
            extra["notifications_minimum_severity"],
            PackStreamValue::from("WARNING")
        );
        assert_eq!(
            extra["notifications_disabled_categories"],
            PackStreamValue::List(vec!["GENERIC".into()])
        );

        assert_eq!(NotificationConfig::disabled().minimum_severity, Some(MinimumSeverity::Off));
    }

    #[test]
    fn test_routing_info_parse() {
        let map = HashMap::from([
            ("ttl".to_string(), PackStreamValue::Integer(300)),
            ("db".to_string(), PackStreamValue::from("neo4j")),
            (
                "servers".to_string(),
                PackStreamValue::List(vec![
                    server("ROUTE", &["a:7687", "b:7687"]),
                    server("READ", &["b:7687"]),
                    server("WRITE", &["a:7687"]),
                    server("SOMETHING_NEW", &["c:7687"]),
                ]),
            ),
        ]);
        let info = RoutingInfo::from_map(&map).unwrap();
        assert_eq!(info.ttl, 300);
        assert_eq!(info.db.as_deref(), Some("neo4j"));
        assert_eq!(info.routers, vec!["a:7687", "b:7687"]);
        assert_eq!(info.readers, vec!["b:7687"]);
        assert_eq!(info.writers, vec!["a:7687"]);
    }

    #[test]
    fn test_routing_info_rejects_malformed() {
        let no_ttl = HashMap::from([("servers".to_string(), PackStreamValue::List(vec![]))]);
        assert!(RoutingInfo::from_map(&no_ttl).is_err());

        let bad_server = HashMap::from([
            ("ttl".to_string(), PackStreamValue::Integer(1)),
            ("servers".to_string(), PackStreamValue::List(vec![PackStreamValue::Integer(1)])),
        ]);
        assert!(RoutingInfo::from_map(&bad_server).is_err());
    }
}
