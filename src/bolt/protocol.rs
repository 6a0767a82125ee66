//! Version-indexed message strategies.
//!
//! Each negotiated [`BoltVersion`] maps to one static [`BoltProtocol`]. The
//! entry is picked once after the handshake; from then on every request is
//! shaped by it. Fields a version does not define are rejected with
//! [`BoltError::FeatureUnsupported`] instead of being dropped.

use std::collections::HashMap;
use std::time::Duration;

use super::handshake::BoltVersion;
use super::message::{
    AccessMode, AuthToken, BeginMessage, BoltRequest, HelloMessage, LogonMessage,
    NotificationConfig, RouteMessage, RouteTarget, RunMessage, StreamMessage, TelemetryApi,
};
use super::packstream::{PackStreamValue, StructDialect};
use super::{BoltError, BoltResult};

/// Routing procedure used before the ROUTE message existed.
pub const ROUTING_PROCEDURE: &str = "CALL dbms.routing.getRoutingTable($context, $database)";

/// Database the routing procedure runs against.
pub const SYSTEM_DATABASE: &str = "system";

/// Product reported in `bolt_agent`.
pub const BOLT_AGENT_PRODUCT: &str = concat!("graphbolt/", env!("CARGO_PKG_VERSION"));

/// Input for HELLO (and LOGON on 5.1+).
#[derive(Debug, Clone)]
pub struct HelloParams {
    /// User agent string
    pub user_agent: String,
    /// Credentials
    pub auth: AuthToken,
    /// Routing context; `None` for direct connections
    pub routing: Option<HashMap<String, PackStreamValue>>,
    /// Driver-level notification filters
    pub notifications: NotificationConfig,
}

/// Transaction fields shared by BEGIN and auto-commit RUN.
#[derive(Debug, Clone, Default)]
pub struct TxParams {
    /// Bookmarks the transaction must observe
    pub bookmarks: Vec<String>,
    /// Server-side transaction timeout
    pub timeout: Option<Duration>,
    /// Transaction metadata
    pub metadata: HashMap<String, PackStreamValue>,
    /// Access mode
    pub mode: AccessMode,
    /// Target database; `None` for the home database
    pub database: Option<String>,
    /// Impersonated user
    pub imp_user: Option<String>,
    /// Notification filters for this transaction
    pub notifications: NotificationConfig,
}

/// Input for a routing table request.
#[derive(Debug, Clone, Default)]
pub struct RouteParams {
    /// Routing context (including `address`)
    pub routing: HashMap<String, PackStreamValue>,
    /// Bookmarks the table must reflect
    pub bookmarks: Vec<String>,
    /// Database; `None` asks for the home database
    pub database: Option<String>,
    /// Impersonated user
    pub imp_user: Option<String>,
}

/// How a routing table is fetched on a given version.
#[derive(Debug, Clone)]
pub enum RouteRequest {
    /// ROUTE message, answered by one SUCCESS carrying `rt`
    Message(BoltRequest),
    /// RUN of the routing procedure plus PULL; the single record holds the table
    Procedure {
        /// RUN request
        run: BoltRequest,
        /// PULL request
        pull: BoltRequest,
    },
}

type HelloFn = fn(&BoltProtocol, &HelloParams) -> BoltResult<BoltRequest>;
type RouteFn = fn(&BoltProtocol, &RouteParams) -> BoltResult<RouteRequest>;

/// Message strategy for one protocol version.
#[derive(Debug)]
pub struct BoltProtocol {
    /// Version this entry speaks
    pub version: BoltVersion,
    /// Structure signatures legal on this version
    pub dialect: StructDialect,
    hello: HelloFn,
    route: RouteFn,
}

static V4_0: BoltProtocol = BoltProtocol::v4(BoltVersion::V4_0, route_procedure);
static V4_1: BoltProtocol = BoltProtocol::v4(BoltVersion::V4_1, route_procedure);
static V4_2: BoltProtocol = BoltProtocol::v4(BoltVersion::V4_2, route_procedure);
static V4_3: BoltProtocol = BoltProtocol::v4(BoltVersion::V4_3, route_v43);
static V4_4: BoltProtocol = BoltProtocol::v4(BoltVersion::V4_4, route_v44);
static V5_0: BoltProtocol = BoltProtocol::v5(BoltVersion::V5_0, hello_with_auth);
static V5_1: BoltProtocol = BoltProtocol::v5(BoltVersion::V5_1, hello_without_auth);
static V5_2: BoltProtocol = BoltProtocol::v5(BoltVersion::V5_2, hello_without_auth);
static V5_3: BoltProtocol = BoltProtocol::v5(BoltVersion::V5_3, hello_without_auth);
static V5_4: BoltProtocol = BoltProtocol::v5(BoltVersion::V5_4, hello_without_auth);

/// Look up the strategy for a negotiated version.
pub fn for_version(version: BoltVersion) -> &'static BoltProtocol {
    match version {
        BoltVersion::V4_0 => &V4_0,
        BoltVersion::V4_1 => &V4_1,
        BoltVersion::V4_2 => &V4_2,
        BoltVersion::V4_3 => &V4_3,
        BoltVersion::V4_4 => &V4_4,
        BoltVersion::V5_0 => &V5_0,
        BoltVersion::V5_1 => &V5_1,
        BoltVersion::V5_2 => &V5_2,
        BoltVersion::V5_3 => &V5_3,
        BoltVersion::V5_4 => &V5_4,
    }
}

impl BoltProtocol {
    const fn v4(version: BoltVersion, route: RouteFn) -> Self {
        Self {
            version,
            dialect: StructDialect::V4,
            hello: hello_with_auth,
            route,
        }
    }

    const fn v5(version: BoltVersion, hello: HelloFn) -> Self {
        Self {
            version,
            dialect: StructDialect::V5,
            hello,
            route: route_v44,
        }
    }

    fn require(&self, supported: bool, feature: &'static str) -> BoltResult<()> {
        if supported {
            Ok(())
        } else {
            Err(BoltError::FeatureUnsupported {
                feature,
                version: self.version,
            })
        }
    }

    fn check_notifications(&self, config: &NotificationConfig) -> BoltResult<()> {
        self.require(
            config.is_empty() || self.version.supports_notification_filters(),
            "notification filters",
        )
    }

    fn check_imp_user(&self, imp_user: &Option<String>) -> BoltResult<()> {
        self.require(
            imp_user.is_none() || self.version.supports_impersonation(),
            "user impersonation",
        )
    }

    /// HELLO; carries the auth token only before 5.1.
    pub fn hello(&self, params: &HelloParams) -> BoltResult<BoltRequest> {
        self.check_notifications(&params.notifications)?;
        (self.hello)(self, params)
    }

    /// LOGON on 5.1+, `None` where HELLO already authenticated.
    pub fn logon(&self, auth: &AuthToken) -> Option<BoltRequest> {
        self.version.supports_logon().then(|| {
            BoltRequest::Logon(LogonMessage { auth: auth.clone() })
        })
    }

    /// LOGOFF on 5.1+.
    pub fn logoff(&self) -> Option<BoltRequest> {
        self.version.supports_logon().then_some(BoltRequest::Logoff)
    }

    /// BEGIN of an explicit transaction.
    pub fn begin(&self, tx: &TxParams) -> BoltResult<BoltRequest> {
        Ok(BoltRequest::Begin(BeginMessage {
            extra: self.tx_extra(tx)?,
        }))
    }

    /// RUN outside a transaction; carries the transaction fields itself.
    pub fn run_auto_commit(
        &self,
        query: &str,
        parameters: HashMap<String, PackStreamValue>,
        tx: &TxParams,
    ) -> BoltResult<BoltRequest> {
        Ok(BoltRequest::Run(
            RunMessage::new(query)
                .with_parameters(parameters)
                .with_extra(self.tx_extra(tx)?),
        ))
    }

    /// RUN inside an explicit transaction.
    pub fn run_in_transaction(
        &self,
        query: &str,
        parameters: HashMap<String, PackStreamValue>,
    ) -> BoltRequest {
        BoltRequest::Run(RunMessage::new(query).with_parameters(parameters))
    }

    /// PULL `n` records (-1 for all).
    pub fn pull(&self, n: i64, qid: Option<i64>) -> BoltRequest {
        BoltRequest::Pull(stream_message(n, qid))
    }

    /// DISCARD `n` records (-1 for all).
    pub fn discard(&self, n: i64, qid: Option<i64>) -> BoltRequest {
        BoltRequest::Discard(stream_message(n, qid))
    }

    /// Routing table request in the shape this version understands.
    pub fn route(&self, params: &RouteParams) -> BoltResult<RouteRequest> {
        self.check_imp_user(&params.imp_user)?;
        (self.route)(self, params)
    }

    /// TELEMETRY on 5.4+.
    pub fn telemetry(&self, api: TelemetryApi) -> Option<BoltRequest> {
        self.version
            .supports_telemetry()
            .then_some(BoltRequest::Telemetry(api))
    }

    fn tx_extra(&self, tx: &TxParams) -> BoltResult<HashMap<String, PackStreamValue>> {
        self.check_imp_user(&tx.imp_user)?;
        self.check_notifications(&tx.notifications)?;

        let mut extra = HashMap::new();
        if !tx.bookmarks.is_empty() {
            extra.insert("bookmarks".to_string(), tx.bookmarks.clone().into());
        }
        if let Some(timeout) = tx.timeout {
            extra.insert("tx_timeout".to_string(), timeout_millis(timeout).into());
        }
        if !tx.metadata.is_empty() {
            extra.insert(
                "tx_metadata".to_string(),
                PackStreamValue::Map(tx.metadata.clone()),
            );
        }
        if tx.mode == AccessMode::Read {
            extra.insert("mode".to_string(), "r".into());
        }
        if let Some(ref db) = tx.database {
            extra.insert("db".to_string(), db.as_str().into());
        }
        if let Some(ref user) = tx.imp_user {
            extra.insert("imp_user".to_string(), user.as_str().into());
        }
        tx.notifications.write_to(&mut extra);
        Ok(extra)
    }
}

/// Whole milliseconds, rounding any sub-millisecond remainder up.
fn timeout_millis(timeout: Duration) -> i64 {
    let partial = u128::from(timeout.subsec_nanos() % 1_000_000 != 0);
    i64::try_from(timeout.as_millis() + partial).unwrap_or(i64::MAX)
}

fn stream_message(n: i64, qid: Option<i64>) -> StreamMessage {
    match qid {
        Some(qid) => StreamMessage::with_n(n).with_qid(qid),
        None => StreamMessage::with_n(n),
    }
}

fn hello_extra(protocol: &BoltProtocol, params: &HelloParams) -> HashMap<String, PackStreamValue> {
    let mut extra = HashMap::new();
    extra.insert("user_agent".to_string(), params.user_agent.as_str().into());
    // 4.0 predates routing context in HELLO
    if protocol.version > BoltVersion::V4_0 {
        if let Some(ref routing) = params.routing {
            extra.insert("routing".to_string(), PackStreamValue::Map(routing.clone()));
        }
    }
    if protocol.version.supports_bolt_agent() {
        extra.insert("bolt_agent".to_string(), bolt_agent());
    }
    params.notifications.write_to(&mut extra);
    extra
}

fn bolt_agent() -> PackStreamValue {
    let platform = format!("{}; {}", std::env::consts::OS, std::env::consts::ARCH);
    PackStreamValue::Map(HashMap::from([
        ("product".to_string(), BOLT_AGENT_PRODUCT.into()),
        ("platform".to_string(), platform.into()),
        ("language".to_string(), "Rust".into()),
    ]))
}

fn hello_with_auth(protocol: &BoltProtocol, params: &HelloParams) -> BoltResult<BoltRequest> {
    let mut extra = hello_extra(protocol, params);
    extra.extend(params.auth.to_map());
    Ok(BoltRequest::Hello(HelloMessage { extra }))
}

fn hello_without_auth(protocol: &BoltProtocol, params: &HelloParams) -> BoltResult<BoltRequest> {
    Ok(BoltRequest::Hello(HelloMessage {
        extra: hello_extra(protocol, params),
    }))
}

fn route_procedure(_: &BoltProtocol, params: &RouteParams) -> BoltResult<RouteRequest> {
    let parameters = HashMap::from([
        ("context".to_string(), PackStreamValue::Map(params.routing.clone())),
        ("database".to_string(), params.database.as_deref().into()),
    ]);
    let mut extra = HashMap::from([
        ("db".to_string(), PackStreamValue::from(SYSTEM_DATABASE)),
        ("mode".to_string(), PackStreamValue::from("r")),
    ]);
    if !params.bookmarks.is_empty() {
        extra.insert("bookmarks".to_string(), params.bookmarks.clone().into());
    }
    Ok(RouteRequest::Procedure {
        run: BoltRequest::Run(
            RunMessage::new(ROUTING_PROCEDURE)
                .with_parameters(parameters)
                .with_extra(extra),
        ),
        pull: BoltRequest::Pull(StreamMessage::all()),
    })
}

fn route_v43(_: &BoltProtocol, params: &RouteParams) -> BoltResult<RouteRequest> {
    Ok(RouteRequest::Message(BoltRequest::Route(RouteMessage {
        routing: params.routing.clone(),
        bookmarks: params.bookmarks.clone(),
        target: RouteTarget::Database(params.database.clone()),
    })))
}

fn route_v44(_: &BoltProtocol, params: &RouteParams) -> BoltResult<RouteRequest> {
    Ok(RouteRequest::Message(BoltRequest::Route(RouteMessage {
        routing: params.routing.clone(),
        bookmarks: params.bookmarks.clone(),
        target: RouteTarget::Extra {
            db: params.database.clone(),
            imp_user: params.imp_user.clone(),
        },
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bolt::message::{tag, MinimumSeverity, NotificationCategory};
    use crate::bolt::packstream::PackStreamStructure;

    fn hello_params() -> HelloParams {
        HelloParams {
            user_agent: "test/1.0".to_string(),
            auth: AuthToken::basic("neo4j", "pw"),
            routing: Some(HashMap::from([(
                "address".to_string(),
                PackStreamValue::from("localhost:7687"),
            )])),
            notifications: NotificationConfig::default(),
        }
    }

    fn extra_of(request: &BoltRequest) -> HashMap<String, PackStreamValue> {
        let s: PackStreamStructure = request.to_structure();
        s.fields
            .last()
            .and_then(|v| v.as_map())
            .cloned()
            .unwrap_or_default()
    }

    #[test]
    fn test_table_covers_every_version() {
        for version in BoltVersion::ALL {
            let protocol = for_version(version);
            assert_eq!(protocol.version, version);
            assert_eq!(protocol.dialect.element_ids, version.uses_element_ids());
        }
    }

    #[test]
    fn test_hello_auth_moves_to_logon() {
        let params = hello_params();

        let v44 = for_version(BoltVersion::V4_4);
        let extra = extra_of(&v44.hello(&params).unwrap());
        assert_eq!(extra["scheme"], PackStreamValue::from("basic"));
        assert!(extra.contains_key("routing"));
        assert!(v44.logon(&params.auth).is_none());

        let v51 = for_version(BoltVersion::V5_1);
        let extra = extra_of(&v51.hello(&params).unwrap());
        assert!(!extra.contains_key("scheme"));
        assert!(!extra.contains_key("credentials"));
        let logon = v51.logon(&params.auth).unwrap();
        assert_eq!(logon.tag(), tag::LOGON);
    }

    #[test]
    fn test_hello_version_specific_keys() {
        let params = hello_params();
        let v40 = extra_of(&for_version(BoltVersion::V4_0).hello(&params).unwrap());
        assert!(!v40.contains_key("routing"));

        let v52 = extra_of(&for_version(BoltVersion::V5_2).hello(&params).unwrap());
        assert!(!v52.contains_key("bolt_agent"));

        let v53 = extra_of(&for_version(BoltVersion::V5_3).hello(&params).unwrap());
        let agent = v53["bolt_agent"].as_map().unwrap();
        assert_eq!(agent["product"], PackStreamValue::from(BOLT_AGENT_PRODUCT));
    }

    #[test]
    fn test_begin_fields() {
        let tx = TxParams {
            bookmarks: vec!["bm:a".into()],
            timeout: Some(Duration::from_secs(1)),
            metadata: HashMap::from([("a".to_string(), PackStreamValue::from("b"))]),
            mode: AccessMode::Read,
            database: Some("neo4j".into()),
            imp_user: Some("Douglas Fir".into()),
            notifications: NotificationConfig::default(),
        };
        let extra = extra_of(&for_version(BoltVersion::V4_4).begin(&tx).unwrap());
        assert_eq!(extra["bookmarks"], PackStreamValue::List(vec!["bm:a".into()]));
        assert_eq!(extra["tx_timeout"], PackStreamValue::Integer(1000));
        assert_eq!(extra["mode"], PackStreamValue::from("r"));
        assert_eq!(extra["db"], PackStreamValue::from("neo4j"));
        assert_eq!(extra["imp_user"], PackStreamValue::from("Douglas Fir"));
        assert!(extra["tx_metadata"].as_map().is_some());
    }

    #[test]
    fn test_default_begin_is_empty() {
        let extra = extra_of(&for_version(BoltVersion::V5_0).begin(&TxParams::default()).unwrap());
        assert!(extra.is_empty());
    }

    #[test]
    fn test_timeout_rounds_up_to_millis() {
        assert_eq!(timeout_millis(Duration::from_micros(1)), 1);
        assert_eq!(timeout_millis(Duration::from_micros(1500)), 2);
        assert_eq!(timeout_millis(Duration::from_millis(7)), 7);
        assert_eq!(timeout_millis(Duration::ZERO), 0);
    }

    #[test]
    fn test_gated_fields_rejected_on_old_versions() {
        let tx = TxParams {
            imp_user: Some("someone".into()),
            ..TxParams::default()
        };
        let err = for_version(BoltVersion::V4_3).begin(&tx).unwrap_err();
        assert!(matches!(
            err,
            BoltError::FeatureUnsupported { version: BoltVersion::V4_3, .. }
        ));
        assert!(for_version(BoltVersion::V4_4).begin(&tx).is_ok());

        let tx = TxParams {
            notifications: NotificationConfig::default()
                .with_minimum_severity(MinimumSeverity::Warning),
            ..TxParams::default()
        };
        assert!(for_version(BoltVersion::V5_1).run_auto_commit("RETURN 1", HashMap::new(), &tx).is_err());
        let run = for_version(BoltVersion::V5_2)
            .run_auto_commit("RETURN 1", HashMap::new(), &tx)
            .unwrap();
        assert_eq!(
            extra_of(&run)["notifications_minimum_severity"],
            PackStreamValue::from("WARNING")
        );

        let mut params = hello_params();
        params.notifications = NotificationConfig::default()
            .with_disabled_categories(vec![NotificationCategory::Hint]);
        assert!(for_version(BoltVersion::V5_0).hello(&params).is_err());
    }

    #[test]
    fn test_route_shapes_per_version() {
        let params = RouteParams {
            routing: HashMap::from([("address".to_string(), PackStreamValue::from("h:7687"))]),
            bookmarks: vec!["bm".into()],
            database: Some("movies".into()),
            imp_user: None,
        };

        match for_version(BoltVersion::V4_2).route(&params).unwrap() {
            RouteRequest::Procedure { run, pull } => {
                let s = run.to_structure();
                assert_eq!(s.fields[0].as_str(), Some(ROUTING_PROCEDURE));
                let p = s.fields[1].as_map().unwrap();
                assert_eq!(p["database"], PackStreamValue::from("movies"));
                assert_eq!(extra_of(&run)["db"], PackStreamValue::from(SYSTEM_DATABASE));
                assert_eq!(pull.tag(), tag::PULL);
            }
            other => panic!("expected procedure, got {:?}", other),
        }

        match for_version(BoltVersion::V4_3).route(&params).unwrap() {
            RouteRequest::Message(m) => {
                assert_eq!(m.to_structure().fields[2], PackStreamValue::from("movies"))
            }
            other => panic!("expected ROUTE, got {:?}", other),
        }

        match for_version(BoltVersion::V5_4).route(&params).unwrap() {
            RouteRequest::Message(m) => {
                let s = m.to_structure();
                assert_eq!(s.fields[2].as_map().unwrap()["db"], PackStreamValue::from("movies"));
            }
            other => panic!("expected ROUTE, got {:?}", other),
        }

        let impersonating = RouteParams {
            imp_user: Some("u".into()),
            ..params
        };
        assert!(for_version(BoltVersion::V4_3).route(&impersonating).is_err());
    }

    #[test]
    fn test_telemetry_and_logoff_gates() {
        assert!(for_version(BoltVersion::V5_3).telemetry(TelemetryApi::AutoCommit).is_none());
        assert!(for_version(BoltVersion::V5_4).telemetry(TelemetryApi::AutoCommit).is_some());
        assert!(for_version(BoltVersion::V5_0).logoff().is_none());
        assert!(for_version(BoltVersion::V5_1).logoff().is_some());
    }
}
