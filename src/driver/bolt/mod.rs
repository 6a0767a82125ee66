//! Bolt protocol client implementation for the driver.
//!
//! # Architecture
//!
//! ```text
//! Session / Rediscovery
//!   └── Connection (client.rs: typed helpers)
//!         ├── FIFO of pending responses, enqueue / flush / sync / reset
//!         ├── BoltProtocol (picked once from the negotiated version)
//!         ├── Framed<BoxedStream, BoltClientCodec>
//!         └── TransportSecurity (optional, supplied by the application)
//! ```

pub mod client;
pub mod connection;
pub mod transport;

pub use client::{RunResponse, StreamBatch};
pub use connection::{Connection, ConnectionSettings, Reply};
pub use transport::{AsyncStream, BoxedStream, TransportSecurity};

/// Client user agent string
pub const DEFAULT_USER_AGENT: &str = concat!("graphbolt/", env!("CARGO_PKG_VERSION"));
