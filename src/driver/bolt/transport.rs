//! Transport streams.
//!
//! A connection talks to any `AsyncRead + AsyncWrite` stream. Plain TCP is
//! used as-is; encryption is delegated to a [`TransportSecurity`]
//! implementation supplied by the application.

use std::fmt;
use std::io;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

use crate::driver::uri::ServerAddress;

/// Byte stream a connection runs over.
pub trait AsyncStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> AsyncStream for T {}

/// Type-erased transport stream.
pub type BoxedStream = Box<dyn AsyncStream>;

/// Wraps a freshly connected TCP stream in an encrypted channel.
///
/// Certificate trust is entirely the implementation's concern; the driver
/// only hands over the socket and the address it was opened for.
#[async_trait]
pub trait TransportSecurity: Send + Sync + fmt::Debug {
    /// Perform the security handshake on `stream`.
    async fn secure(&self, address: &ServerAddress, stream: TcpStream) -> io::Result<BoxedStream>;
}
