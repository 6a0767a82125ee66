//! # Bolt Protocol Implementation
//!
//! Low-level Bolt protocol client for Bolt-compatible graph databases.
//!
//! ## Overview
//!
//! - **PackStream** - Binary serialization format for all data types
//! - **Message Types** - Request/response messages
//! - **Handshake** - Protocol version negotiation
//! - **Protocol** - Version-indexed message strategies (4.0 through 5.4)
//! - **Codec** - Chunked message framing for Tokio
//!
//! ## Submodules
//!
//! - [`packstream`] - Binary serialization/deserialization
//! - [`message`] - Bolt message types (HELLO, RUN, PULL, etc.)
//! - [`handshake`] - Version negotiation
//! - [`protocol`] - Per-version request shaping and field gating
//! - [`codec`] - Tokio codec for async I/O
//! - [`error`] - Protocol error types
//!
//! ## Note
//!
//! Most users should use the high-level [`crate::driver`] module instead of
//! interacting with the Bolt protocol directly.

pub mod codec;
pub mod error;
pub mod handshake;
pub mod message;
pub mod packstream;
pub mod protocol;

pub use codec::{BoltClientCodec, BoltCodec};
pub use error::{BoltError, BoltErrorCode, BoltResult, HandshakeError};
pub use handshake::{BoltVersion, VersionRange, BOLT_MAGIC};
pub use message::{
    AccessMode, AuthToken, BoltRequest, BoltResponse, FailureMessage, MinimumSeverity,
    Notification, NotificationCategory, NotificationConfig, NotificationSeverity, QueryStats,
    RecordMessage, RoutingInfo, SuccessMessage, TelemetryApi,
};
pub use packstream::{
    PackStreamDecoder, PackStreamEncoder, PackStreamError, PackStreamStructure, PackStreamValue,
};
pub use protocol::{BoltProtocol, HelloParams, RouteParams, RouteRequest, TxParams};
