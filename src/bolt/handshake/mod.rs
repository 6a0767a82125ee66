//! Bolt protocol handshake.
//!
//! 1. Client sends the 4-byte magic number (0x6060B017)
//! 2. Client sends 4 x 4-byte version proposals (preferred first)
//! 3. Server responds with the 4-byte agreed version, or zero if none fits

mod negotiation;
mod version;

pub use negotiation::{build_handshake, default_offer, perform_handshake, select_version};
pub use version::{BoltVersion, VersionRange};

pub use super::error::HandshakeError;

/// Bolt protocol magic number: 0x6060B017
pub const BOLT_MAGIC: [u8; 4] = [0x60, 0x60, 0xB0, 0x17];

/// Size of the client preamble (magic + 4 versions)
pub const HANDSHAKE_SIZE: usize = 20;

/// Size of the server reply
pub const HANDSHAKE_RESPONSE_SIZE: usize = 4;

/// Version slots in the preamble
pub const MAX_PROPOSALS: usize = 4;
