use std::io;

/// Failures of the byte pipe itself. What the bytes mean is not its
/// concern.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("cannot listen on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("accept failed: {0}")]
    Accept(#[source] io::Error),

    /// The peer connected but the WebSocket upgrade did not complete.
    #[error("handshake with {peer} failed: {reason}")]
    Handshake { peer: String, reason: String },

    #[error("cannot reach {url}: {reason}")]
    Connect { url: String, reason: String },

    #[error("send to {peer} failed: {reason}")]
    Send { peer: String, reason: String },

    #[error("receive from {peer} failed: {reason}")]
    Receive { peer: String, reason: String },

    /// The connection is already closed.
    #[error("connection to {0} closed")]
    Closed(String),
}
