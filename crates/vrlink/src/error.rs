//! Unified error type for vrlink.

use vrlink_player::PlayerError;
use vrlink_protocol::ProtocolError;
use vrlink_session::SessionError;
use vrlink_store::StoreError;
use vrlink_transport::TransportError;
use vrlink_xr::XrError;

/// Top-level error wrapping every crate-specific error.
///
/// Applications built on the `vrlink` meta-crate can use this single type
/// and let `?` convert the sub-crate errors.
#[derive(Debug, thiserror::Error)]
pub enum VrlinkError {
    /// Connection, send or receive failure.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Malformed pin, token or message.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Session document store failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Pairing or issuer failure (pin storage, ack timeouts).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Playback controller failure.
    #[error(transparent)]
    Player(#[from] PlayerError),

    /// Immersive session failure.
    #[error(transparent)]
    Xr(#[from] XrError),
}
