//! Bolt connection with a pipelined response queue.
//!
//! Requests are encoded into the write buffer by [`Connection::enqueue`] and
//! only hit the socket on [`Connection::flush`]. Every queued request owns
//! one entry in a FIFO of pending responses; [`Connection::sync`] flushes and
//! then reads until that queue is empty, routing each response to the oldest
//! entry.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_util::codec::{Encoder, Framed};

use crate::bolt::codec::{BoltClientCodec, BoltCodec, DEFAULT_MAX_MESSAGE_SIZE, MAX_CHUNK_SIZE};
use crate::bolt::handshake::{default_offer, perform_handshake, VersionRange};
use crate::bolt::protocol::{self, BoltProtocol, HelloParams};
use crate::bolt::{
    AuthToken, BoltRequest, BoltResponse, BoltVersion, FailureMessage, NotificationConfig,
    PackStreamValue, SuccessMessage,
};
use crate::driver::error::{DriverError, DriverResult};
use crate::driver::uri::ServerAddress;

use super::transport::{BoxedStream, TransportSecurity};

/// Everything needed to open and initialise a connection.
#[derive(Clone)]
pub struct ConnectionSettings {
    /// Credentials sent in HELLO or LOGON
    pub auth: AuthToken,
    /// User agent string
    pub user_agent: String,
    /// Routing context; `None` for direct connections
    pub routing_context: Option<HashMap<String, PackStreamValue>>,
    /// Driver-level notification filters
    pub notifications: NotificationConfig,
    /// Versions proposed in the handshake
    pub offer: Vec<VersionRange>,
    /// Bound on TCP connect plus handshake and HELLO
    pub connection_timeout: Duration,
    /// Largest accepted incoming message
    pub max_message_size: usize,
    /// Outgoing chunk size
    pub chunk_size: usize,
    /// Send TELEMETRY on 5.4+
    pub telemetry: bool,
    /// Optional encryption layer
    pub security: Option<Arc<dyn TransportSecurity>>,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            auth: AuthToken::none(),
            user_agent: super::DEFAULT_USER_AGENT.to_string(),
            routing_context: None,
            notifications: NotificationConfig::default(),
            offer: default_offer(),
            connection_timeout: Duration::from_secs(30),
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            chunk_size: MAX_CHUNK_SIZE,
            telemetry: true,
            security: None,
        }
    }
}

impl fmt::Debug for ConnectionSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionSettings")
            .field("scheme", &self.auth.scheme)
            .field("user_agent", &self.user_agent)
            .field("routing", &self.routing_context.is_some())
            .field("offer", &self.offer)
            .field("encrypted", &self.security.is_some())
            .finish()
    }
}

/// Outcome of one queued request, in enqueue order.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// Summary plus any records streamed before it
    Success {
        /// Records received for this request
        records: Vec<Vec<PackStreamValue>>,
        /// Summary metadata
        summary: SuccessMessage,
    },
    /// Request failed
    Failure(FailureMessage),
    /// Request skipped because an earlier one failed
    Ignored,
}

impl Reply {
    /// Summary of a successful reply.
    pub fn into_success(self) -> Option<(Vec<Vec<PackStreamValue>>, SuccessMessage)> {
        match self {
            Self::Success { records, summary } => Some((records, summary)),
            _ => None,
        }
    }
}

/// Pending response slot for one request.
#[derive(Debug)]
struct ResponseHandler {
    request: &'static str,
    records: Vec<Vec<PackStreamValue>>,
}

/// Client-side Bolt connection.
pub struct Connection {
    framed: Framed<BoxedStream, BoltClientCodec>,
    protocol: &'static BoltProtocol,
    address: ServerAddress,
    handlers: VecDeque<ResponseHandler>,
    unflushed: bool,
    broken: bool,
    pending_failure: bool,
    io_in_progress: bool,
    in_transaction: bool,
    open_stream: bool,
    telemetry: bool,
    server_agent: String,
    connection_id: Option<String>,
    database: Option<String>,
    created_at: Instant,
    last_used: Instant,
    auth_generation: u64,
}

impl Connection {
    /// Connect over TCP, then handshake and authenticate.
    ///
    /// The whole sequence runs under `settings.connection_timeout`.
    pub async fn connect(address: &ServerAddress, settings: &ConnectionSettings) -> DriverResult<Self> {
        let opening = async {
            let tcp = TcpStream::connect(address.to_socket_addr())
                .await
                .map_err(|e| DriverError::connection(address.to_string(), e.to_string()))?;
            if let Err(e) = tcp.set_nodelay(true) {
                tracing::debug!(address = %address, error = %e, "could not disable Nagle");
            }

            let stream: BoxedStream = match settings.security {
                Some(ref security) => security.secure(address, tcp).await.map_err(|e| {
                    DriverError::connection(address.to_string(), format!("secure channel failed: {}", e))
                })?,
                None => Box::new(tcp),
            };
            Self::initialize(stream, address.clone(), settings).await
        };

        tokio::time::timeout(settings.connection_timeout, opening)
            .await
            .map_err(|_| {
                DriverError::connection(
                    address.to_string(),
                    format!("connection not established within {:?}", settings.connection_timeout),
                )
            })?
    }

    /// Handshake and authenticate over an already open stream.
    pub async fn initialize(
        mut stream: BoxedStream,
        address: ServerAddress,
        settings: &ConnectionSettings,
    ) -> DriverResult<Self> {
        let version = perform_handshake(&mut stream, &settings.offer)
            .await
            .map_err(|e| DriverError::from_bolt(e, &address.to_string()))?;

        let codec = BoltClientCodec::new(
            BoltCodec::new()
                .with_max_message_size(settings.max_message_size)
                .with_chunk_size(settings.chunk_size),
        );
        let now = Instant::now();
        let mut connection = Self {
            framed: Framed::new(stream, codec),
            protocol: protocol::for_version(version),
            address,
            handlers: VecDeque::new(),
            unflushed: false,
            broken: false,
            pending_failure: false,
            io_in_progress: false,
            in_transaction: false,
            open_stream: false,
            telemetry: settings.telemetry,
            server_agent: String::new(),
            connection_id: None,
            database: None,
            created_at: now,
            last_used: now,
            auth_generation: 0,
        };

        connection.hello(settings).await?;
        tracing::debug!(
            address = %connection.address,
            version = %version,
            server = %connection.server_agent,
            "connection established"
        );
        Ok(connection)
    }

    async fn hello(&mut self, settings: &ConnectionSettings) -> DriverResult<()> {
        let params = HelloParams {
            user_agent: settings.user_agent.clone(),
            auth: settings.auth.clone(),
            routing: settings.routing_context.clone(),
            notifications: settings.notifications.clone(),
        };
        let hello = self.protocol.hello(&params).map_err(|e| self.bolt_error(e))?;
        self.enqueue(hello)?;
        if let Some(logon) = self.protocol.logon(&settings.auth) {
            self.enqueue(logon)?;
        }

        let replies = self.sync().await?;
        if let Some((_, summary)) = replies.into_iter().next().and_then(Reply::into_success) {
            self.server_agent = summary.server().unwrap_or_default().to_string();
            self.connection_id = summary.connection_id().map(str::to_string);
        }
        Ok(())
    }

    /// Buffer a request without flushing and queue its response handler.
    pub fn enqueue(&mut self, request: BoltRequest) -> DriverResult<()> {
        if self.is_broken() {
            return Err(self.broken_error(request.name()));
        }

        let name = request.name();
        let (begins_tx, opens_stream) = (
            matches!(request, BoltRequest::Begin(_)),
            matches!(request, BoltRequest::Run(_)),
        );

        let mut encoded = bytes::BytesMut::new();
        Encoder::encode(self.framed.codec_mut(), request, &mut encoded)
            .map_err(|e| self.bolt_error(e))?;
        self.framed.write_buffer_mut().extend_from_slice(&encoded);
        self.unflushed = true;
        self.in_transaction |= begins_tx;
        self.open_stream |= opens_stream;

        self.handlers.push_back(ResponseHandler {
            request: name,
            records: Vec::new(),
        });
        Ok(())
    }

    /// Write every buffered request to the socket.
    pub async fn flush(&mut self) -> DriverResult<()> {
        if !self.unflushed {
            return Ok(());
        }
        self.io_in_progress = true;
        let result = SinkExt::<BoltRequest>::flush(&mut self.framed).await;
        self.io_in_progress = false;

        match result {
            Ok(()) => {
                self.unflushed = false;
                Ok(())
            }
            Err(e) => Err(self.fail_all(&e.to_string(), "flush")),
        }
    }

    /// Flush, then receive until every queued handler has its response.
    ///
    /// Replies come back in enqueue order. If the server answered any
    /// request with FAILURE the first one is returned as an error once the
    /// queue is drained; the connection then needs a RESET.
    pub async fn sync(&mut self) -> DriverResult<Vec<Reply>> {
        self.flush().await?;

        let mut replies = Vec::with_capacity(self.handlers.len());
        let mut first_failure: Option<FailureMessage> = None;

        while let Some(expecting) = self.handlers.front().map(|h| h.request) {
            self.io_in_progress = true;
            let next = self.framed.next().await;
            self.io_in_progress = false;

            let response = match next {
                Some(Ok(response)) => response,
                Some(Err(e)) => return Err(self.fail_all(&e.to_string(), expecting)),
                None => return Err(self.fail_all("connection closed by server", expecting)),
            };

            match response {
                BoltResponse::Record(record) => {
                    if let Some(handler) = self.handlers.front_mut() {
                        handler.records.push(record.fields);
                    }
                }
                BoltResponse::Success(summary) => {
                    let handler = self.pop_handler();
                    self.observe_success(handler.request, &summary);
                    replies.push(Reply::Success {
                        records: handler.records,
                        summary,
                    });
                }
                BoltResponse::Failure(failure) => {
                    self.pop_handler();
                    tracing::debug!(
                        address = %self.address,
                        request = expecting,
                        code = %failure.code,
                        "server failure"
                    );
                    self.pending_failure = true;
                    first_failure.get_or_insert_with(|| failure.clone());
                    replies.push(Reply::Failure(failure));
                }
                BoltResponse::Ignored => {
                    self.pop_handler();
                    replies.push(Reply::Ignored);
                }
            }
        }

        self.last_used = Instant::now();
        match first_failure {
            Some(failure) => Err(DriverError::from_server(failure.code, failure.message)),
            None => Ok(replies),
        }
    }

    fn pop_handler(&mut self) -> ResponseHandler {
        self.handlers.pop_front().unwrap_or(ResponseHandler {
            request: "UNKNOWN",
            records: Vec::new(),
        })
    }

    fn observe_success(&mut self, request: &'static str, summary: &SuccessMessage) {
        match request {
            "COMMIT" | "ROLLBACK" => {
                self.in_transaction = false;
                self.open_stream = false;
            }
            "PULL" | "DISCARD" if !summary.has_more() => self.open_stream = false,
            "RESET" => {
                self.in_transaction = false;
                self.open_stream = false;
                self.pending_failure = false;
            }
            _ => {}
        }
    }

    /// RESET the session state and clear a pending failure.
    pub async fn reset(&mut self) -> DriverResult<()> {
        self.enqueue(BoltRequest::Reset)?;
        self.sync().await?;
        self.pending_failure = false;
        self.in_transaction = false;
        self.open_stream = false;
        Ok(())
    }

    /// Best-effort GOODBYE followed by shutdown.
    pub async fn close(mut self) {
        if !self.is_broken() && self.enqueue(BoltRequest::Goodbye).is_ok() {
            let _ = SinkExt::<BoltRequest>::flush(&mut self.framed).await;
        }
        let _ = tokio::io::AsyncWriteExt::shutdown(self.framed.get_mut()).await;
        tracing::debug!(address = %self.address, "connection closed");
    }

    /// Send TELEMETRY once per connection when the server understands it.
    pub fn enqueue_telemetry(&mut self, api: crate::bolt::TelemetryApi) -> DriverResult<()> {
        if !self.telemetry {
            return Ok(());
        }
        self.telemetry = false;
        match self.protocol.telemetry(api) {
            Some(request) => self.enqueue(request),
            None => Ok(()),
        }
    }

    fn fail_all(&mut self, cause: &str, request: &str) -> DriverError {
        self.broken = true;
        let pending = self.handlers.len();
        self.handlers.clear();
        tracing::warn!(
            address = %self.address,
            request,
            pending,
            error = cause,
            "connection broken"
        );
        DriverError::connection(
            self.address.to_string(),
            format!("{} (while waiting for {} response)", cause, request),
        )
    }

    fn broken_error(&self, request: &str) -> DriverError {
        DriverError::connection(
            self.address.to_string(),
            format!("cannot send {} on a broken connection", request),
        )
    }

    pub(crate) fn bolt_error(&self, err: crate::bolt::BoltError) -> DriverError {
        DriverError::from_bolt(err, &self.address.to_string())
    }

    /// Negotiated message strategy.
    pub fn protocol(&self) -> &'static BoltProtocol {
        self.protocol
    }

    /// Negotiated version.
    pub fn version(&self) -> BoltVersion {
        self.protocol.version
    }

    /// Server address.
    pub fn address(&self) -> &ServerAddress {
        &self.address
    }

    /// Server agent from HELLO.
    pub fn server_agent(&self) -> &str {
        &self.server_agent
    }

    /// Connection id from HELLO.
    pub fn connection_id(&self) -> Option<&str> {
        self.connection_id.as_deref()
    }

    /// Database last used on this connection.
    pub fn database(&self) -> Option<&str> {
        self.database.as_deref()
    }

    pub(crate) fn set_database(&mut self, database: Option<String>) {
        self.database = database;
    }

    /// Broken connections are never reused. A cancelled `sync` counts.
    pub fn is_broken(&self) -> bool {
        self.broken || self.io_in_progress
    }

    /// Server sent FAILURE and is ignoring requests until RESET.
    pub fn has_pending_failure(&self) -> bool {
        self.pending_failure
    }

    /// Whether a RESET is required before the connection is reused.
    pub fn needs_reset(&self) -> bool {
        self.pending_failure || self.in_transaction || self.open_stream || !self.handlers.is_empty()
    }

    /// Creation instant.
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Time since the last completed exchange.
    pub fn idle_for(&self) -> Duration {
        self.last_used.elapsed()
    }

    pub(crate) fn auth_generation(&self) -> u64 {
        self.auth_generation
    }

    pub(crate) fn set_auth_generation(&mut self, generation: u64) {
        self.auth_generation = generation;
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("address", &self.address)
            .field("version", &self.protocol.version)
            .field("server_agent", &self.server_agent)
            .field("connection_id", &self.connection_id)
            .field("broken", &self.is_broken())
            .field("pending_failure", &self.pending_failure)
            .finish()
    }
}
