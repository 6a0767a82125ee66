//! Bolt protocol error types.

use std::fmt;
use std::io;

use super::handshake::{BoltVersion, VersionRange};
use super::packstream::PackStreamError;

/// Result type for Bolt operations.
pub type BoltResult<T> = Result<T, BoltError>;

/// Wire-level errors: transport, framing, negotiation and decoding.
///
/// Server FAILURE responses are not errors at this level; they are
/// ordinary [`crate::bolt::BoltResponse`] values.
#[derive(Debug)]
pub enum BoltError {
    /// I/O error on the transport
    Io(io::Error),

    /// Version negotiation failed
    Handshake(HandshakeError),

    /// PackStream serialization error
    PackStream(PackStreamError),

    /// Message shape or sequencing violated the protocol
    Protocol(String),

    /// Incoming message exceeded the configured limit
    MessageTooLarge { size: usize, max: usize },

    /// A request used a field the negotiated version does not define
    FeatureUnsupported {
        feature: &'static str,
        version: BoltVersion,
    },

    /// Peer closed the stream
    ConnectionClosed,
}

impl fmt::Display for BoltError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoltError::Io(e) => write!(f, "I/O error: {}", e),
            BoltError::Handshake(e) => write!(f, "Handshake error: {}", e),
            BoltError::PackStream(e) => write!(f, "PackStream error: {}", e),
            BoltError::Protocol(msg) => write!(f, "Protocol error: {}", msg),
            BoltError::MessageTooLarge { size, max } => {
                write!(f, "Message too large: {} bytes (max: {})", size, max)
            }
            BoltError::FeatureUnsupported { feature, version } => write!(
                f,
                "Bolt {} does not support {}; a newer server is required",
                version, feature
            ),
            BoltError::ConnectionClosed => write!(f, "Connection closed by peer"),
        }
    }
}

impl std::error::Error for BoltError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BoltError::Io(e) => Some(e),
            BoltError::Handshake(e) => Some(e),
            BoltError::PackStream(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for BoltError {
    fn from(err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            BoltError::ConnectionClosed
        } else {
            BoltError::Io(err)
        }
    }
}

impl From<HandshakeError> for BoltError {
    fn from(err: HandshakeError) -> Self {
        BoltError::Handshake(err)
    }
}

impl From<PackStreamError> for BoltError {
    fn from(err: PackStreamError) -> Self {
        BoltError::PackStream(err)
    }
}

/// Handshake-specific errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeError {
    /// Server answered with a version outside the offer or unknown to the client
    UnsupportedVersion {
        offered: Vec<VersionRange>,
        received: u32,
    },

    /// Server rejected every offered version
    Rejected { offered: Vec<VersionRange> },

    /// Peer answered in HTTP; the address points at an HTTP port
    HttpResponse,
}

impl fmt::Display for HandshakeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandshakeError::UnsupportedVersion { offered, received } => write!(
                f,
                "Unsupported protocol version: offered [{}], server selected {}",
                join_ranges(offered),
                describe_raw_version(*received)
            ),
            HandshakeError::Rejected { offered } => write!(
                f,
                "Server rejected all offered protocol versions [{}]",
                join_ranges(offered)
            ),
            HandshakeError::HttpResponse => write!(
                f,
                "Server responded with HTTP; the address is likely an HTTP port, not a Bolt port"
            ),
        }
    }
}

impl std::error::Error for HandshakeError {}

fn join_ranges(ranges: &[VersionRange]) -> String {
    ranges
        .iter()
        .map(|r| r.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn describe_raw_version(raw: u32) -> String {
    let major = raw & 0xFF;
    let minor = (raw >> 8) & 0xFF;
    format!("{}.{} (0x{:08X})", major, minor, raw)
}

/// Server status codes the driver reacts to.
pub struct BoltErrorCode;

impl BoltErrorCode {
    pub const TRANSIENT_PREFIX: &'static str = "Neo.TransientError.";
    pub const CLIENT_PREFIX: &'static str = "Neo.ClientError.";
    pub const DATABASE_PREFIX: &'static str = "Neo.DatabaseError.";
    pub const SECURITY_PREFIX: &'static str = "Neo.ClientError.Security.";

    pub const UNAUTHORIZED: &'static str = "Neo.ClientError.Security.Unauthorized";
    pub const AUTHORIZATION_EXPIRED: &'static str =
        "Neo.ClientError.Security.AuthorizationExpired";
    pub const TOKEN_EXPIRED: &'static str = "Neo.ClientError.Security.TokenExpired";

    pub const DATABASE_NOT_FOUND: &'static str = "Neo.ClientError.Database.DatabaseNotFound";
    pub const INVALID_BOOKMARK: &'static str = "Neo.ClientError.Transaction.InvalidBookmark";
    pub const INVALID_BOOKMARK_MIXTURE: &'static str =
        "Neo.ClientError.Transaction.InvalidBookmarkMixture";

    pub const NOT_A_LEADER: &'static str = "Neo.ClientError.Cluster.NotALeader";
    pub const FORBIDDEN_ON_READ_ONLY_DATABASE: &'static str =
        "Neo.ClientError.General.ForbiddenOnReadOnlyDatabase";

    /// Transient by prefix but caused by the client terminating the transaction.
    pub const TRANSACTION_TERMINATED: &'static str =
        "Neo.TransientError.Transaction.Terminated";
    pub const LOCK_CLIENT_STOPPED: &'static str =
        "Neo.TransientError.Transaction.LockClientStopped";

    pub const SYNTAX_ERROR: &'static str = "Neo.ClientError.Statement.SyntaxError";
    pub const DEADLOCK_DETECTED: &'static str = "Neo.TransientError.Transaction.DeadlockDetected";
    pub const DATABASE_UNAVAILABLE: &'static str =
        "Neo.TransientError.General.DatabaseUnavailable";
}
