//! In-process stub Bolt server for tests.
//!
//! Each [`StubServer`] answers the handshake with a fixed version, accepts
//! HELLO/LOGON/TELEMETRY automatically and replies to every other request
//! from a shared script queue (an empty queue answers SUCCESS `{}`). Streams
//! are `tokio::io::duplex` pairs, so no sockets are involved.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio_util::codec::Framed;

use crate::bolt::handshake::HANDSHAKE_SIZE;
use crate::bolt::message::tag;
use crate::bolt::{
    BoltCodec, BoltResponse, BoltVersion, FailureMessage, PackStreamStructure, PackStreamValue,
    SuccessMessage,
};

use super::bolt::{BoxedStream, Connection, ConnectionSettings};
use super::error::{DriverError, DriverResult};
use super::pool::Connector;
use super::uri::ServerAddress;

/// Agent string every stub reports.
pub const STUB_AGENT: &str = "Neo4j/5.13.0";

/// Scripted reaction to one request.
#[derive(Debug, Clone)]
pub enum Script {
    /// SUCCESS with metadata
    Success(SuccessMessage),
    /// RECORDs followed by SUCCESS
    Records(Vec<Vec<PackStreamValue>>, SuccessMessage),
    /// FAILURE
    Failure(FailureMessage),
    /// IGNORED
    Ignored,
    /// Drop the connection
    Hangup,
    /// Never answer
    Stall,
    /// Wait, then react
    Delayed(Duration, Box<Script>),
}

impl Script {
    pub fn success(summary: SuccessMessage) -> Self {
        Self::Success(summary)
    }

    pub fn records(records: Vec<Vec<PackStreamValue>>, summary: SuccessMessage) -> Self {
        Self::Records(records, summary)
    }

    pub fn failure(code: &str, message: &str) -> Self {
        Self::Failure(FailureMessage::new(code, message))
    }

    pub fn delayed(delay: Duration, script: Script) -> Self {
        Self::Delayed(delay, Box::new(script))
    }
}

/// `rt` map as a ROUTE reply carries it.
pub fn routing_table(ttl: i64, routers: &[&str], readers: &[&str], writers: &[&str]) -> PackStreamValue {
    let role = |name: &str, addresses: &[&str]| {
        PackStreamValue::Map(HashMap::from([
            ("role".to_string(), PackStreamValue::from(name)),
            (
                "addresses".to_string(),
                PackStreamValue::List(addresses.iter().map(|a| PackStreamValue::from(*a)).collect()),
            ),
        ]))
    };
    PackStreamValue::Map(HashMap::from([
        ("ttl".to_string(), PackStreamValue::Integer(ttl)),
        (
            "servers".to_string(),
            PackStreamValue::List(vec![
                role("ROUTE", routers),
                role("READ", readers),
                role("WRITE", writers),
            ]),
        ),
    ]))
}

/// Same as [`routing_table`] with the `db` key set.
pub fn routing_table_for(
    db: &str,
    ttl: i64,
    routers: &[&str],
    readers: &[&str],
    writers: &[&str],
) -> PackStreamValue {
    let mut table = routing_table(ttl, routers, readers, writers);
    if let PackStreamValue::Map(ref mut map) = table {
        map.insert("db".to_string(), PackStreamValue::from(db));
    }
    table
}

/// Install a test subscriber honouring `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

struct StubState {
    version: BoltVersion,
    scripts: Mutex<VecDeque<Script>>,
    received: Mutex<Vec<PackStreamStructure>>,
    auth_failure: Mutex<Option<FailureMessage>>,
    connections: AtomicUsize,
}

/// Scripted Bolt server.
#[derive(Clone)]
pub struct StubServer {
    address: ServerAddress,
    state: Arc<StubState>,
}

impl StubServer {
    pub fn new(version: BoltVersion) -> Self {
        Self::at("stub:7687", version)
    }

    pub fn at(address: &str, version: BoltVersion) -> Self {
        let address = match ServerAddress::parse(address) {
            Ok(address) => address,
            Err(e) => panic!("bad stub address {}: {}", address, e),
        };
        Self {
            address,
            state: Arc::new(StubState {
                version,
                scripts: Mutex::new(VecDeque::new()),
                received: Mutex::new(Vec::new()),
                auth_failure: Mutex::new(None),
                connections: AtomicUsize::new(0),
            }),
        }
    }

    pub fn address(&self) -> &ServerAddress {
        &self.address
    }

    pub fn push(&self, script: Script) {
        self.state.scripts.lock().push_back(script);
    }

    /// Fail authentication with the given code from now on.
    pub fn reject_auth(&self, code: &str, message: &str) {
        *self.state.auth_failure.lock() = Some(FailureMessage::new(code, message));
    }

    pub fn received(&self) -> Vec<PackStreamStructure> {
        self.state.received.lock().clone()
    }

    pub fn count(&self, request_tag: u8) -> usize {
        self.state.received.lock().iter().filter(|s| s.tag == request_tag).count()
    }

    pub fn connections(&self) -> usize {
        self.state.connections.load(Ordering::SeqCst)
    }

    /// Open a client stream served by a fresh task.
    pub fn open_stream(&self) -> BoxedStream {
        let (client, server) = tokio::io::duplex(64 * 1024);
        let id = self.state.connections.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::spawn(serve(server, self.state.clone(), id));
        Box::new(client)
    }

    pub async fn connect(&self, settings: &ConnectionSettings) -> DriverResult<Connection> {
        Connection::initialize(self.open_stream(), self.address.clone(), settings).await
    }
}

async fn serve(mut stream: DuplexStream, state: Arc<StubState>, id: usize) {
    let mut handshake = [0u8; HANDSHAKE_SIZE];
    if stream.read_exact(&mut handshake).await.is_err() {
        return;
    }
    if stream.write_all(&state.version.to_wire().to_be_bytes()).await.is_err() {
        return;
    }

    let mut framed = Framed::new(stream, BoltCodec::new());
    while let Some(Ok(value)) = framed.next().await {
        let request = match value {
            PackStreamValue::Structure(s) => s,
            _ => return,
        };
        let request_tag = request.tag;
        state.received.lock().push(request);

        let script = match request_tag {
            tag::GOODBYE => return,
            tag::HELLO if !state.version.supports_logon() => auth_reply(&state, id),
            tag::HELLO => Script::success(hello_success(id)),
            tag::LOGON => auth_reply(&state, id),
            tag::TELEMETRY => Script::success(SuccessMessage::new()),
            _ => state
                .scripts
                .lock()
                .pop_front()
                .unwrap_or_else(|| Script::success(SuccessMessage::new())),
        };

        if !play(&mut framed, script).await {
            return;
        }
    }
}

fn hello_success(id: usize) -> SuccessMessage {
    SuccessMessage::new()
        .with("server", STUB_AGENT)
        .with("connection_id", format!("bolt-{}", id))
}

fn auth_reply(state: &StubState, id: usize) -> Script {
    match state.auth_failure.lock().clone() {
        Some(failure) => Script::Failure(failure),
        None => Script::success(hello_success(id)),
    }
}

/// Returns `false` once the connection should end.
async fn play(framed: &mut Framed<DuplexStream, BoltCodec>, mut script: Script) -> bool {
    loop {
        let responses = match script {
            Script::Delayed(delay, inner) => {
                tokio::time::sleep(delay).await;
                script = *inner;
                continue;
            }
            Script::Hangup => return false,
            Script::Stall => return futures::future::pending::<bool>().await,
            Script::Success(summary) => vec![BoltResponse::Success(summary)],
            Script::Failure(failure) => vec![BoltResponse::Failure(failure)],
            Script::Ignored => vec![BoltResponse::Ignored],
            Script::Records(records, summary) => records
                .into_iter()
                .map(|fields| BoltResponse::Record(crate::bolt::RecordMessage::new(fields)))
                .chain(std::iter::once(BoltResponse::Success(summary)))
                .collect(),
        };

        for response in responses {
            let value = PackStreamValue::Structure(response.to_structure());
            if SinkExt::<PackStreamValue>::send(framed, value).await.is_err() {
                return false;
            }
        }
        return true;
    }
}

/// Connector resolving addresses to stub servers.
pub struct StubConnector {
    settings: ConnectionSettings,
    servers: Mutex<HashMap<ServerAddress, StubServer>>,
}

impl StubConnector {
    pub fn new(settings: ConnectionSettings) -> Self {
        Self {
            settings,
            servers: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_servers(settings: ConnectionSettings, servers: &[&StubServer]) -> Self {
        let connector = Self::new(settings);
        for server in servers {
            connector.add(server);
        }
        connector
    }

    pub fn add(&self, server: &StubServer) {
        self.servers.lock().insert(server.address().clone(), server.clone());
    }

    /// Make `address` refuse connections.
    pub fn remove(&self, address: &ServerAddress) {
        self.servers.lock().remove(address);
    }
}

#[async_trait]
impl Connector for StubConnector {
    async fn connect(&self, address: &ServerAddress) -> DriverResult<Connection> {
        let server = self.servers.lock().get(address).cloned();
        match server {
            Some(server) => server.connect(&self.settings).await,
            None => Err(DriverError::connection(address.to_string(), "connection refused")),
        }
    }
}
