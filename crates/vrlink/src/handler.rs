//! Per-connection handler: request routing and watch forwarding.
//!
//! Each accepted connection gets its own task running [`handle_connection`]:
//!   1. Receive a `ClientMessage` (bounded by the idle timeout)
//!   2. Resolve its path to a token
//!   3. Run it against the store and answer with `Ack` or `Error`
//!
//! A `Ping` only resets the idle timer and is answered with `Pong`.
//!
//! A `Watch` additionally spawns a forwarder task that pushes a `Value`
//! for the path now and after every change. A repeated `Watch` on the same
//! path replaces the forwarder, so the client gets the current value again.
//! Forwarders are aborted on `Unwatch` and when the connection ends.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::task::JoinHandle;
use vrlink_protocol::{ClientMessage, Codec, ServerMessage, Token, error_code};
use vrlink_store::{SessionStore, StoreError, Subscription};
use vrlink_transport::{Connection, WebSocketConnection};

use crate::VrlinkError;
use crate::server::RelayState;

/// Aborts the connection's forwarders when the handler exits, however it
/// exits.
#[derive(Default)]
struct Watches(HashMap<String, JoinHandle<()>>);

impl Drop for Watches {
    fn drop(&mut self) {
        for (_, task) in self.0.drain() {
            task.abort();
        }
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<C: Codec>(
    conn: WebSocketConnection,
    state: Arc<RelayState<C>>,
) -> Result<(), VrlinkError> {
    let conn = Arc::new(conn);
    let conn_id = conn.id();
    tracing::debug!(%conn_id, peer = conn.peer(), "handling new connection");

    let mut watches = Watches::default();

    loop {
        let data = match tokio::time::timeout(state.config.idle_timeout, conn.recv()).await {
            Ok(Ok(Some(data))) => data,
            Ok(Ok(None)) => {
                tracing::debug!(%conn_id, "connection closed cleanly");
                break;
            }
            Ok(Err(e)) => {
                tracing::debug!(%conn_id, error = %e, "recv error");
                break;
            }
            Err(_) => {
                tracing::info!(%conn_id, "connection idle, closing");
                let _ = conn.close().await;
                break;
            }
        };

        let msg: ClientMessage = match state.codec.decode(&data) {
            Ok(msg) => msg,
            Err(e) => {
                tracing::debug!(%conn_id, error = %e, "failed to decode request");
                send_error(&conn, &state.codec, 0, error_code::BAD_REQUEST, &e.to_string()).await?;
                continue;
            }
        };

        handle_request(&conn, &state, &mut watches, msg).await?;
    }

    tracing::debug!(%conn_id, watches = watches.0.len(), "connection finished");
    Ok(())
}

/// Runs one request and sends its reply.
async fn handle_request<C: Codec>(
    conn: &Arc<WebSocketConnection>,
    state: &Arc<RelayState<C>>,
    watches: &mut Watches,
    msg: ClientMessage,
) -> Result<(), VrlinkError> {
    let Some(path) = msg.path() else {
        return send(conn, &state.codec, &ServerMessage::Pong).await;
    };
    let id = msg.id().unwrap_or(0);
    let token = match Token::from_path(path) {
        Ok(token) => token,
        Err(e) => {
            // Unwatch expects no reply.
            if msg.id().is_some() {
                send_error(conn, &state.codec, id, error_code::BAD_REQUEST, &e.to_string())
                    .await?;
            }
            return Ok(());
        }
    };

    match msg {
        ClientMessage::Set { doc, .. } => {
            let result = state.store.create(&token, &doc).await;
            reply(conn, &state.codec, id, result.map(|()| None)).await?;
        }

        ClientMessage::Update { patch, .. } => {
            let result = state.store.update(&token, &patch).await;
            reply(conn, &state.codec, id, result.map(|()| None)).await?;
        }

        ClientMessage::Get { .. } => {
            let result = state.store.get(&token).await;
            reply(conn, &state.codec, id, result).await?;
        }

        ClientMessage::Watch { path, .. } => {
            if let Some(task) = watches.0.remove(&path) {
                task.abort();
                tracing::debug!(conn_id = %conn.id(), %token, "watch repeated, restarting");
            }
            if watches.0.len() >= state.config.max_watches {
                let message = format!("at most {} watches per connection", state.config.max_watches);
                return send_error(conn, &state.codec, id, error_code::BAD_REQUEST, &message).await;
            }

            let subscription = match state.store.subscribe(&token).await {
                Ok(subscription) => subscription,
                Err(e) => return reply(conn, &state.codec, id, Err(e)).await,
            };
            // The Ack goes out before the forwarder can push the first Value.
            send(conn, &state.codec, &ServerMessage::Ack { id, doc: None }).await?;

            let task = tokio::spawn(forward(
                Arc::clone(conn),
                Arc::clone(state),
                path.clone(),
                subscription,
            ));
            watches.0.insert(path, task);
            tracing::debug!(conn_id = %conn.id(), %token, "watch started");
        }

        ClientMessage::Unwatch { path } => {
            if let Some(task) = watches.0.remove(&path) {
                task.abort();
                tracing::debug!(conn_id = %conn.id(), %token, "watch stopped");
            }
        }

        ClientMessage::Ping => {}
    }

    Ok(())
}

/// Pushes every value of `subscription` to the client until either side
/// goes away.
async fn forward<C: Codec>(
    conn: Arc<WebSocketConnection>,
    state: Arc<RelayState<C>>,
    path: String,
    mut subscription: Subscription,
) {
    while let Some(doc) = subscription.changed().await {
        let msg = ServerMessage::Value {
            path: path.clone(),
            doc,
        };
        if let Err(e) = send(&conn, &state.codec, &msg).await {
            tracing::debug!(conn_id = %conn.id(), %path, error = %e, "watch forward failed");
            break;
        }
    }
}

/// Maps a store result to `Ack` or `Error`.
async fn reply<C: Codec>(
    conn: &WebSocketConnection,
    codec: &C,
    id: u64,
    result: Result<Option<vrlink_protocol::SessionDocument>, StoreError>,
) -> Result<(), VrlinkError> {
    match result {
        Ok(doc) => send(conn, codec, &ServerMessage::Ack { id, doc }).await,
        Err(e @ StoreError::NotFound(_)) => {
            send_error(conn, codec, id, error_code::NOT_FOUND, &e.to_string()).await
        }
        Err(e) => {
            tracing::warn!(id, error = %e, "store request failed");
            send_error(conn, codec, id, error_code::INTERNAL, &e.to_string()).await
        }
    }
}

async fn send_error<C: Codec>(
    conn: &WebSocketConnection,
    codec: &C,
    id: u64,
    code: u16,
    message: &str,
) -> Result<(), VrlinkError> {
    let msg = ServerMessage::Error {
        id,
        code,
        message: message.to_string(),
    };
    send(conn, codec, &msg).await
}

async fn send<C: Codec>(
    conn: &WebSocketConnection,
    codec: &C,
    msg: &ServerMessage,
) -> Result<(), VrlinkError> {
    let bytes = codec.encode(msg)?;
    conn.send(&bytes).await?;
    Ok(())
}
