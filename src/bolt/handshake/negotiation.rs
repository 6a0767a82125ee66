//! Client side of the Bolt handshake.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use super::{BoltVersion, HandshakeError, VersionRange, BOLT_MAGIC, HANDSHAKE_RESPONSE_SIZE,
    HANDSHAKE_SIZE, MAX_PROPOSALS};
use crate::bolt::error::BoltResult;

/// The default offer: 5.4 down to 5.0, 4.4 down to 4.2, 4.1, 4.0.
pub fn default_offer() -> Vec<VersionRange> {
    vec![
        VersionRange { max: BoltVersion::V5_4, back: 4 },
        VersionRange { max: BoltVersion::V4_4, back: 2 },
        VersionRange::exact(BoltVersion::V4_1),
        VersionRange::exact(BoltVersion::V4_0),
    ]
}

/// Build the 20-byte client preamble.
///
/// Only the first four ranges are sent; unused slots stay zero.
pub fn build_handshake(offer: &[VersionRange]) -> [u8; HANDSHAKE_SIZE] {
    let mut data = [0u8; HANDSHAKE_SIZE];
    data[0..4].copy_from_slice(&BOLT_MAGIC);
    for (i, range) in offer.iter().take(MAX_PROPOSALS).enumerate() {
        let offset = 4 + i * 4;
        data[offset..offset + 4].copy_from_slice(&range.to_wire().to_be_bytes());
    }
    data
}

/// Interpret the server's 4-byte reply against what was offered.
///
/// A version the client knows but never offered is treated the same as an
/// unknown one: the server broke the negotiation.
pub fn select_version(
    offer: &[VersionRange],
    reply: [u8; HANDSHAKE_RESPONSE_SIZE],
) -> Result<BoltVersion, HandshakeError> {
    if &reply == b"HTTP" {
        return Err(HandshakeError::HttpResponse);
    }

    let sent: Vec<VersionRange> = offer.iter().take(MAX_PROPOSALS).copied().collect();
    let raw = u32::from_be_bytes(reply);
    if raw == 0 {
        return Err(HandshakeError::Rejected { offered: sent });
    }

    match BoltVersion::from_wire(raw) {
        Some(version) if sent.iter().any(|r| r.contains(version)) => Ok(version),
        _ => Err(HandshakeError::UnsupportedVersion {
            offered: sent,
            received: raw,
        }),
    }
}

/// Run the handshake over a freshly opened stream.
pub async fn perform_handshake<S>(stream: &mut S, offer: &[VersionRange]) -> BoltResult<BoltVersion>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    stream.write_all(&build_handshake(offer)).await?;
    stream.flush().await?;

    let mut reply = [0u8; HANDSHAKE_RESPONSE_SIZE];
    stream.read_exact(&mut reply).await?;

    let version = select_version(offer, reply)?;
    debug!(%version, "Bolt handshake complete");
    Ok(version)
}
