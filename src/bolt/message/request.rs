//! Bolt protocol request messages.
//!
//! Request messages are sent from the client to the server. The structs here
//! are already in wire shape; which keys end up in an `extra` map is decided
//! per protocol version by [`crate::bolt::protocol`].

use std::collections::HashMap;

use super::tag;
use crate::bolt::packstream::{PackStreamStructure, PackStreamValue};

/// Access mode for transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AccessMode {
    /// Read-write access (default)
    #[default]
    Write,
    /// Read-only access
    Read,
}

impl AccessMode {
    /// Convert to string for metadata.
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessMode::Read => "r",
            AccessMode::Write => "w",
        }
    }
}

/// Authentication token sent in HELLO (before 5.1) or LOGON (5.1+).
#[derive(Debug, Clone, PartialEq)]
pub struct AuthToken {
    /// Authentication scheme (e.g., "basic", "bearer")
    pub scheme: String,
    /// Principal (username)
    pub principal: Option<String>,
    /// Credentials (password, token or ticket)
    pub credentials: Option<String>,
    /// Realm
    pub realm: Option<String>,
    /// Additional scheme parameters
    pub parameters: HashMap<String, PackStreamValue>,
}

impl AuthToken {
    fn with_scheme(scheme: &str) -> Self {
        Self {
            scheme: scheme.to_string(),
            principal: None,
            credentials: None,
            realm: None,
            parameters: HashMap::new(),
        }
    }

    /// Anonymous token.
    pub fn none() -> Self {
        Self::with_scheme("none")
    }

    /// Username and password.
    pub fn basic(principal: &str, credentials: &str) -> Self {
        Self {
            principal: Some(principal.to_string()),
            credentials: Some(credentials.to_string()),
            ..Self::with_scheme("basic")
        }
    }

    /// Username and password against a named realm.
    pub fn basic_with_realm(principal: &str, credentials: &str, realm: &str) -> Self {
        Self {
            realm: Some(realm.to_string()),
            ..Self::basic(principal, credentials)
        }
    }

    /// Bearer token (SSO).
    pub fn bearer(token: &str) -> Self {
        Self {
            credentials: Some(token.to_string()),
            ..Self::with_scheme("bearer")
        }
    }

    /// Base64-encoded Kerberos ticket.
    pub fn kerberos(ticket: &str) -> Self {
        Self {
            principal: Some(String::new()),
            credentials: Some(ticket.to_string()),
            ..Self::with_scheme("kerberos")
        }
    }

    /// Token for a server-side auth plugin.
    pub fn custom(
        scheme: &str,
        principal: &str,
        credentials: &str,
        realm: Option<&str>,
        parameters: HashMap<String, PackStreamValue>,
    ) -> Self {
        Self {
            principal: Some(principal.to_string()),
            credentials: Some(credentials.to_string()),
            realm: realm.map(str::to_string),
            parameters,
            ..Self::with_scheme(scheme)
        }
    }

    /// Entries as they appear in HELLO/LOGON.
    pub fn to_map(&self) -> HashMap<String, PackStreamValue> {
        let mut map = HashMap::new();
        map.insert("scheme".to_string(), self.scheme.as_str().into());
        if let Some(ref p) = self.principal {
            map.insert("principal".to_string(), p.as_str().into());
        }
        if let Some(ref c) = self.credentials {
            map.insert("credentials".to_string(), c.as_str().into());
        }
        if let Some(ref r) = self.realm {
            map.insert("realm".to_string(), r.as_str().into());
        }
        if !self.parameters.is_empty() {
            map.insert(
                "parameters".to_string(),
                PackStreamValue::Map(self.parameters.clone()),
            );
        }
        map
    }
}

/// All Bolt request messages.
#[derive(Debug, Clone)]
pub enum BoltRequest {
    /// HELLO - Initialize connection
    Hello(HelloMessage),
    /// LOGON - Authenticate (Bolt 5.1+)
    Logon(LogonMessage),
    /// LOGOFF - Deauthenticate (Bolt 5.1+)
    Logoff,
    /// GOODBYE - Close connection gracefully
    Goodbye,
    /// RESET - Reset connection state
    Reset,
    /// RUN - Execute a query
    Run(RunMessage),
    /// PULL - Pull results
    Pull(StreamMessage),
    /// DISCARD - Discard results
    Discard(StreamMessage),
    /// BEGIN - Start transaction
    Begin(BeginMessage),
    /// COMMIT - Commit transaction
    Commit,
    /// ROLLBACK - Rollback transaction
    Rollback,
    /// ROUTE - Request routing information (Bolt 4.3+)
    Route(RouteMessage),
    /// TELEMETRY - Report driver API usage (Bolt 5.4+)
    Telemetry(TelemetryApi),
}

impl BoltRequest {
    /// Get the message tag.
    pub fn tag(&self) -> u8 {
        match self {
            BoltRequest::Hello(_) => tag::HELLO,
            BoltRequest::Logon(_) => tag::LOGON,
            BoltRequest::Logoff => tag::LOGOFF,
            BoltRequest::Goodbye => tag::GOODBYE,
            BoltRequest::Reset => tag::RESET,
            BoltRequest::Run(_) => tag::RUN,
            BoltRequest::Pull(_) => tag::PULL,
            BoltRequest::Discard(_) => tag::DISCARD,
            BoltRequest::Begin(_) => tag::BEGIN,
            BoltRequest::Commit => tag::COMMIT,
            BoltRequest::Rollback => tag::ROLLBACK,
            BoltRequest::Route(_) => tag::ROUTE,
            BoltRequest::Telemetry(_) => tag::TELEMETRY,
        }
    }

    /// Get message name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            BoltRequest::Hello(_) => "HELLO",
            BoltRequest::Logon(_) => "LOGON",
            BoltRequest::Logoff => "LOGOFF",
            BoltRequest::Goodbye => "GOODBYE",
            BoltRequest::Reset => "RESET",
            BoltRequest::Run(_) => "RUN",
            BoltRequest::Pull(_) => "PULL",
            BoltRequest::Discard(_) => "DISCARD",
            BoltRequest::Begin(_) => "BEGIN",
            BoltRequest::Commit => "COMMIT",
            BoltRequest::Rollback => "ROLLBACK",
            BoltRequest::Route(_) => "ROUTE",
            BoltRequest::Telemetry(_) => "TELEMETRY",
        }
    }

    /// Convert to PackStream structure.
    pub fn to_structure(&self) -> PackStreamStructure {
        let fields = match self {
            BoltRequest::Hello(msg) => vec![PackStreamValue::Map(msg.extra.clone())],
            BoltRequest::Logon(msg) => vec![PackStreamValue::Map(msg.auth.to_map())],
            BoltRequest::Run(msg) => vec![
                msg.query.as_str().into(),
                PackStreamValue::Map(msg.parameters.clone()),
                PackStreamValue::Map(msg.extra.clone()),
            ],
            BoltRequest::Pull(msg) | BoltRequest::Discard(msg) => vec![msg.to_value()],
            BoltRequest::Begin(msg) => vec![PackStreamValue::Map(msg.extra.clone())],
            BoltRequest::Route(msg) => msg.to_fields(),
            BoltRequest::Telemetry(api) => vec![PackStreamValue::Integer(*api as i64)],
            BoltRequest::Logoff
            | BoltRequest::Goodbye
            | BoltRequest::Reset
            | BoltRequest::Commit
            | BoltRequest::Rollback => vec![],
        };
        PackStreamStructure::new(self.tag(), fields)
    }
}

/// HELLO message. Carries user agent, routing context and, before 5.1,
/// the auth token, all in one map.
#[derive(Debug, Clone, Default)]
pub struct HelloMessage {
    /// Metadata map
    pub extra: HashMap<String, PackStreamValue>,
}

/// LOGON message.
#[derive(Debug, Clone)]
pub struct LogonMessage {
    /// Credentials to authenticate with
    pub auth: AuthToken,
}

/// RUN message - Execute a query.
#[derive(Debug, Clone)]
pub struct RunMessage {
    /// Query string
    pub query: String,
    /// Query parameters
    pub parameters: HashMap<String, PackStreamValue>,
    /// Extra metadata (transaction fields for auto-commit)
    pub extra: HashMap<String, PackStreamValue>,
}

impl RunMessage {
    /// Create a new RUN message.
    pub fn new(query: &str) -> Self {
        Self {
            query: query.to_string(),
            parameters: HashMap::new(),
            extra: HashMap::new(),
        }
    }

    /// Set query parameters.
    pub fn with_parameters(mut self, params: HashMap<String, PackStreamValue>) -> Self {
        self.parameters = params;
        self
    }

    /// Set extra metadata.
    pub fn with_extra(mut self, extra: HashMap<String, PackStreamValue>) -> Self {
        self.extra = extra;
        self
    }
}

/// Body shared by PULL and DISCARD.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamMessage {
    /// Number of records (-1 for all)
    pub n: i64,
    /// Query id; `None` means the last query
    pub qid: Option<i64>,
}

impl StreamMessage {
    /// Everything that is left.
    pub fn all() -> Self {
        Self { n: -1, qid: None }
    }

    /// At most `n` records.
    pub fn with_n(n: i64) -> Self {
        Self { n, qid: None }
    }

    /// Set query ID.
    pub fn with_qid(mut self, qid: i64) -> Self {
        self.qid = Some(qid);
        self
    }

    fn to_value(self) -> PackStreamValue {
        let mut extra = HashMap::new();
        extra.insert("n".to_string(), PackStreamValue::Integer(self.n));
        if let Some(qid) = self.qid {
            extra.insert("qid".to_string(), PackStreamValue::Integer(qid));
        }
        PackStreamValue::Map(extra)
    }
}

/// BEGIN message - Start a transaction.
#[derive(Debug, Clone, Default)]
pub struct BeginMessage {
    /// Transaction metadata map
    pub extra: HashMap<String, PackStreamValue>,
}

/// Third field of ROUTE, which changed shape in 4.4.
#[derive(Debug, Clone, PartialEq)]
pub enum RouteTarget {
    /// 4.3: the database name, or null for the home database
    Database(Option<String>),
    /// 4.4+: a map with optional `db` and `imp_user`
    Extra {
        /// Database name
        db: Option<String>,
        /// Impersonated user
        imp_user: Option<String>,
    },
}

/// ROUTE message.
#[derive(Debug, Clone)]
pub struct RouteMessage {
    /// Routing context from the URI, including `address`
    pub routing: HashMap<String, PackStreamValue>,
    /// Bookmarks the table must reflect
    pub bookmarks: Vec<String>,
    /// Database selection
    pub target: RouteTarget,
}

impl RouteMessage {
    fn to_fields(&self) -> Vec<PackStreamValue> {
        let target = match &self.target {
            RouteTarget::Database(db) => db.as_deref().into(),
            RouteTarget::Extra { db, imp_user } => {
                let mut extra = HashMap::new();
                if let Some(db) = db {
                    extra.insert("db".to_string(), db.as_str().into());
                }
                if let Some(user) = imp_user {
                    extra.insert("imp_user".to_string(), user.as_str().into());
                }
                PackStreamValue::Map(extra)
            }
        };
        vec![
            PackStreamValue::Map(self.routing.clone()),
            self.bookmarks.clone().into(),
            target,
        ]
    }
}

/// API that triggered a transaction, reported through TELEMETRY.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i64)]
pub enum TelemetryApi {
    /// Managed transaction function (execute_read/execute_write)
    ManagedTransaction = 0,
    /// Explicit transaction
    UnmanagedTransaction = 1,
    /// Auto-commit query
    AutoCommit = 2,
    /// Driver-level query
    DriverLevel = 3,
}
