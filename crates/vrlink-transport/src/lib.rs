//! Byte pipes between the relay server and its store clients.
//!
//! The relay accepts through a [`Transport`]; both the relay and
//! [`RemoteStore`](https://docs.rs/vrlink-store) clients exchange frames
//! over a [`Connection`]. One frame carries one encoded relay message.
//!
//! # Feature Flags
//!
//! - `websocket` (default): [`WebSocketTransport`] and
//!   [`WebSocketConnection`], built on `tokio-tungstenite`.

#![allow(async_fn_in_trait)]

mod error;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::{WebSocketConnection, WebSocketTransport};

use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique connection number, used to correlate log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Hands out the next unused id.
    pub fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The listening side: hands out one [`Connection`] per client.
pub trait Transport: Send + Sync + 'static {
    type Connection: Connection;
    type Error: std::error::Error + Send + Sync;

    /// Waits for the next client and completes its handshake.
    async fn accept(&mut self) -> Result<Self::Connection, Self::Error>;

    /// The address actually listened on (resolves port `0`).
    fn local_addr(&self) -> Result<SocketAddr, Self::Error>;
}

/// One open, message-framed connection.
///
/// `send` and `recv` may run at the same time from different tasks: the
/// relay pushes watch values while it waits for the next request, and a
/// store client issues requests while its reader task waits for replies.
pub trait Connection: Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync;

    /// Sends one frame.
    async fn send(&self, frame: &[u8]) -> Result<(), Self::Error>;

    /// Waits for the next frame. `Ok(None)` once the peer closed cleanly.
    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error>;

    /// Starts a clean close. The peer's `recv` then yields `Ok(None)`.
    async fn close(&self) -> Result<(), Self::Error>;

    fn id(&self) -> ConnectionId;

    /// Who is on the other end: a socket address or the dialed URL.
    fn peer(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_ids_increase() {
        let a = ConnectionId::next();
        let b = ConnectionId::next();
        assert!(b > a);
    }

    #[test]
    fn test_display_is_prefixed() {
        let id = ConnectionId::next();
        let shown = id.to_string();
        assert!(shown.starts_with('#'));
        assert!(shown[1..].parse::<u64>().is_ok());
    }
}
