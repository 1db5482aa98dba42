//! WebSocket transport on `tokio-tungstenite`.
//!
//! The relay gets a [`WebSocketConnection`] from
//! [`WebSocketTransport::accept`], a store client dials one with
//! [`WebSocketConnection::connect`]. Frames are sent as binary messages;
//! text messages are accepted too, so browser clients can speak JSON text.

use std::net::SocketAddr;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::{Connection, ConnectionId, Transport, TransportError};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Listens for relay clients.
pub struct WebSocketTransport {
    listener: TcpListener,
}

impl WebSocketTransport {
    /// Listens on `addr` (e.g. `127.0.0.1:9000`, port `0` for any).
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| TransportError::Bind {
                addr: addr.to_string(),
                source,
            })?;
        tracing::info!(addr = ?listener.local_addr().ok(), "listening for relay clients");
        Ok(Self { listener })
    }
}

impl Transport for WebSocketTransport {
    type Connection = WebSocketConnection;
    type Error = TransportError;

    async fn accept(&mut self) -> Result<WebSocketConnection, TransportError> {
        let (tcp, addr) = self.listener.accept().await.map_err(TransportError::Accept)?;
        let peer = addr.to_string();

        let ws = tokio_tungstenite::accept_async(MaybeTlsStream::Plain(tcp))
            .await
            .map_err(|e| TransportError::Handshake {
                peer: peer.clone(),
                reason: e.to_string(),
            })?;

        let conn = WebSocketConnection::new(ws, peer);
        tracing::debug!(conn_id = %conn.id, peer = %conn.peer, "client connected");
        Ok(conn)
    }

    fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        self.listener.local_addr().map_err(TransportError::Accept)
    }
}

/// A WebSocket connection, server or client side.
///
/// Sending and receiving hold separate locks, so a task parked in `recv`
/// never delays a `send` from another task.
pub struct WebSocketConnection {
    id: ConnectionId,
    peer: String,
    sink: Mutex<SplitSink<WsStream, Message>>,
    stream: Mutex<SplitStream<WsStream>>,
}

impl WebSocketConnection {
    /// Dials a relay, e.g. `ws://127.0.0.1:9000`.
    pub async fn connect(url: &str) -> Result<Self, TransportError> {
        let (ws, _response) =
            tokio_tungstenite::connect_async(url)
                .await
                .map_err(|e| TransportError::Connect {
                    url: url.to_string(),
                    reason: e.to_string(),
                })?;
        let conn = Self::new(ws, url.to_string());
        tracing::debug!(conn_id = %conn.id, url, "connected to relay");
        Ok(conn)
    }

    fn new(ws: WsStream, peer: String) -> Self {
        let (sink, stream) = ws.split();
        Self {
            id: ConnectionId::next(),
            peer,
            sink: Mutex::new(sink),
            stream: Mutex::new(stream),
        }
    }

    fn send_error(&self, e: tungstenite::Error) -> TransportError {
        match e {
            tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => {
                TransportError::Closed(self.peer.clone())
            }
            other => TransportError::Send {
                peer: self.peer.clone(),
                reason: other.to_string(),
            },
        }
    }
}

impl Connection for WebSocketConnection {
    type Error = TransportError;

    async fn send(&self, frame: &[u8]) -> Result<(), TransportError> {
        let msg = Message::Binary(frame.to_vec().into());
        self.sink
            .lock()
            .await
            .send(msg)
            .await
            .map_err(|e| self.send_error(e))
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, TransportError> {
        let mut stream = self.stream.lock().await;
        while let Some(msg) = stream.next().await {
            match msg {
                Ok(Message::Binary(data)) => return Ok(Some(data.into())),
                Ok(Message::Text(text)) => return Ok(Some(text.as_bytes().to_vec())),
                Ok(Message::Close(_)) => return Ok(None),
                // Ping/pong are answered by tungstenite itself.
                Ok(_) => {}
                Err(tungstenite::Error::ConnectionClosed) => return Ok(None),
                Err(e) => {
                    return Err(TransportError::Receive {
                        peer: self.peer.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }
        Ok(None)
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.sink
            .lock()
            .await
            .close()
            .await
            .map_err(|e| self.send_error(e))
    }

    fn id(&self) -> ConnectionId {
        self.id
    }

    fn peer(&self) -> &str {
        &self.peer
    }
}
