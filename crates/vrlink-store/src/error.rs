//! Error types for the store layer.

use std::time::Duration;

use vrlink_protocol::{ProtocolError, Token};
use vrlink_transport::TransportError;

/// Errors surfaced by [`SessionStore`](crate::SessionStore) operations.
///
/// Store operations are never retried here; the caller decides whether a
/// failure is worth retrying or worth showing to the user.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// `update` on a document that does not exist.
    #[error("no session document for token {}", .0.as_str())]
    NotFound(Token),

    /// The relay server refused the request.
    #[error("store rejected request ({code}): {message}")]
    Rejected { code: u16, message: String },

    /// The connection to the relay server is gone.
    #[error("store connection lost")]
    Disconnected,

    /// The relay server did not answer in time.
    #[error("store request timed out after {0:?}")]
    Timeout(Duration),

    /// A transport-level failure while talking to the relay server.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A message could not be encoded or decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}
