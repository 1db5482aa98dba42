//! A [`SessionStore`] backed by the relay server.
//!
//! One WebSocket connection carries everything:
//!
//! ```text
//! request()  ── Set/Update/Get/Watch{id} ──→  relay
//!            ←── Ack{id} | Error{id} ───────  (matched through `pending`)
//! watchers   ←── Value{path} ───────────────  (fanned out through `watches`)
//! ```
//!
//! A reader task owns the receive side and routes every server message.
//! A second task turns dropped subscriptions into `Unwatch` messages, and a
//! third sends `Ping` so the relay does not close a connection that only
//! watches.
//! Losing the connection fails every pending request with
//! [`StoreError::Disconnected`] and ends every subscription.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use vrlink_protocol::{
    ClientMessage, Codec, DocumentPatch, JsonCodec, ServerMessage, SessionDocument, Token,
    error_code,
};
use vrlink_transport::{Connection, WebSocketConnection};

use crate::store::WatchGuard;
use crate::{SessionStore, StoreError, Subscription};

/// Settings for [`RemoteStore`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteStoreConfig {
    /// How long to wait for the relay to answer a request.
    pub request_timeout: Duration,
    /// How often to send a keepalive `Ping`. Keep it well below the relay's
    /// idle timeout. Zero disables keepalives.
    pub keepalive_interval: Duration,
}

impl Default for RemoteStoreConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
            keepalive_interval: Duration::from_secs(30),
        }
    }
}

/// A refusal from the relay, before it is mapped to a [`StoreError`].
struct Rejection {
    code: u16,
    message: String,
}

type Reply = Result<Option<SessionDocument>, Rejection>;

struct WatchEntry {
    tx: watch::Sender<Option<SessionDocument>>,
    subscribers: usize,
    /// Whether the relay has pushed at least one value for this path.
    primed: bool,
}

/// State shared between the store handle and its background tasks.
struct Shared {
    pending: Mutex<HashMap<u64, oneshot::Sender<Reply>>>,
    watches: Mutex<HashMap<String, WatchEntry>>,
    closed: AtomicBool,
}

struct Inner {
    conn: Arc<WebSocketConnection>,
    shared: Arc<Shared>,
    codec: JsonCodec,
    next_id: AtomicU64,
    unwatch_tx: mpsc::UnboundedSender<String>,
    config: RemoteStoreConfig,
    tasks: Vec<JoinHandle<()>>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

/// Client of the relay server.
///
/// Cheap to clone; clones share one connection. The connection closes when
/// the last clone is dropped.
#[derive(Clone)]
pub struct RemoteStore {
    inner: Arc<Inner>,
}

impl RemoteStore {
    /// Connects to a relay at `url` (e.g. `ws://127.0.0.1:9000`) with
    /// default settings.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        Self::connect_with(url, RemoteStoreConfig::default()).await
    }

    /// Connects to a relay at `url`.
    pub async fn connect_with(url: &str, config: RemoteStoreConfig) -> Result<Self, StoreError> {
        let conn = Arc::new(WebSocketConnection::connect(url).await?);
        let shared = Arc::new(Shared {
            pending: Mutex::new(HashMap::new()),
            watches: Mutex::new(HashMap::new()),
            closed: AtomicBool::new(false),
        });
        let (unwatch_tx, unwatch_rx) = mpsc::unbounded_channel();

        let reader = tokio::spawn(read_loop(Arc::clone(&conn), Arc::clone(&shared)));
        let unwatcher = tokio::spawn(unwatch_loop(
            Arc::clone(&conn),
            Arc::clone(&shared),
            unwatch_rx,
        ));
        let mut tasks = vec![reader, unwatcher];
        if !config.keepalive_interval.is_zero() {
            tasks.push(tokio::spawn(keepalive_loop(
                Arc::clone(&conn),
                Arc::clone(&shared),
                config.keepalive_interval,
            )));
        }

        tracing::info!(url, conn_id = %conn.id(), "connected to relay");

        Ok(Self {
            inner: Arc::new(Inner {
                conn,
                shared,
                codec: JsonCodec,
                next_id: AtomicU64::new(1),
                unwatch_tx,
                config,
                tasks,
            }),
        })
    }

    /// `true` once the relay connection has been lost.
    pub fn is_closed(&self) -> bool {
        self.inner.shared.closed.load(Ordering::Acquire)
    }

    /// Sends one request and waits for its `Ack`/`Error`.
    async fn request(&self, build: impl FnOnce(u64) -> ClientMessage) -> Result<Reply, StoreError> {
        if self.is_closed() {
            return Err(StoreError::Disconnected);
        }
        let inner = &self.inner;
        let id = inner.next_id.fetch_add(1, Ordering::Relaxed);
        let bytes = inner.codec.encode(&build(id))?;

        let (reply_tx, reply_rx) = oneshot::channel();
        inner.shared.pending.lock().await.insert(id, reply_tx);

        if let Err(e) = inner.conn.send(&bytes).await {
            inner.shared.pending.lock().await.remove(&id);
            return Err(e.into());
        }

        match tokio::time::timeout(inner.config.request_timeout, reply_rx).await {
            Ok(Ok(reply)) => Ok(reply),
            // The reader task dropped the sender: connection lost.
            Ok(Err(_)) => Err(StoreError::Disconnected),
            Err(_) => {
                inner.shared.pending.lock().await.remove(&id);
                Err(StoreError::Timeout(inner.config.request_timeout))
            }
        }
    }
}

fn rejected(token: &Token, rejection: Rejection) -> StoreError {
    if rejection.code == error_code::NOT_FOUND {
        StoreError::NotFound(token.clone())
    } else {
        StoreError::Rejected {
            code: rejection.code,
            message: rejection.message,
        }
    }
}

impl SessionStore for RemoteStore {
    async fn create(&self, token: &Token, doc: &SessionDocument) -> Result<(), StoreError> {
        let path = token.path();
        self.request(|id| ClientMessage::Set {
            id,
            path,
            doc: doc.clone(),
        })
        .await?
        .map(|_| ())
        .map_err(|r| rejected(token, r))
    }

    async fn update(&self, token: &Token, patch: &DocumentPatch) -> Result<(), StoreError> {
        let path = token.path();
        self.request(|id| ClientMessage::Update {
            id,
            path,
            patch: patch.clone(),
        })
        .await?
        .map(|_| ())
        .map_err(|r| rejected(token, r))
    }

    async fn get(&self, token: &Token) -> Result<Option<SessionDocument>, StoreError> {
        let path = token.path();
        self.request(|id| ClientMessage::Get { id, path })
            .await?
            .map_err(|r| rejected(token, r))
    }

    async fn subscribe(&self, token: &Token) -> Result<Subscription, StoreError> {
        let path = token.path();
        let guard = WatchGuard::new(path.clone(), self.inner.unwatch_tx.clone());

        let rx = {
            let mut watches = self.inner.shared.watches.lock().await;
            if let Some(entry) = watches.get_mut(&path) {
                // Already watching this path on the relay: share the channel.
                entry.subscribers += 1;
                let mut rx = entry.tx.subscribe();
                if entry.primed {
                    rx.mark_changed();
                }
                return Ok(Subscription::new(token.clone(), rx, Some(guard)));
            }
            let (tx, rx) = watch::channel(None);
            watches.insert(
                path.clone(),
                WatchEntry {
                    tx,
                    subscribers: 1,
                    primed: false,
                },
            );
            rx
        };

        // On failure the guard drops and releases the entry again.
        self.request(|id| ClientMessage::Watch { id, path })
            .await?
            .map_err(|r| rejected(token, r))?;

        tracing::debug!(%token, "watching on relay");
        Ok(Subscription::new(token.clone(), rx, Some(guard)))
    }
}

/// Routes server messages until the connection ends.
async fn read_loop(conn: Arc<WebSocketConnection>, shared: Arc<Shared>) {
    let codec = JsonCodec;
    loop {
        let data = match conn.recv().await {
            Ok(Some(data)) => data,
            Ok(None) => {
                tracing::info!(conn_id = %conn.id(), "relay closed the connection");
                break;
            }
            Err(e) => {
                tracing::warn!(conn_id = %conn.id(), error = %e, "relay connection failed");
                break;
            }
        };

        let msg: ServerMessage = match codec.decode(&data) {
            Ok(msg) => msg,
            Err(e) => {
                tracing::debug!(error = %e, "ignoring undecodable relay message");
                continue;
            }
        };

        match msg {
            ServerMessage::Ack { id, doc } => {
                if let Some(reply) = shared.pending.lock().await.remove(&id) {
                    let _ = reply.send(Ok(doc));
                }
            }
            ServerMessage::Error { id, code, message } => {
                if let Some(reply) = shared.pending.lock().await.remove(&id) {
                    let _ = reply.send(Err(Rejection { code, message }));
                }
            }
            ServerMessage::Value { path, doc } => {
                let mut watches = shared.watches.lock().await;
                if let Some(entry) = watches.get_mut(&path) {
                    entry.primed = true;
                    entry.tx.send_replace(doc);
                }
            }
            ServerMessage::Pong => tracing::trace!(conn_id = %conn.id(), "pong"),
        }
    }

    shared.closed.store(true, Ordering::Release);
    // Dropping the reply senders fails pending requests; dropping the watch
    // senders ends subscriptions.
    shared.pending.lock().await.clear();
    shared.watches.lock().await.clear();
}

/// Releases relay watches whose last local subscriber went away.
async fn unwatch_loop(
    conn: Arc<WebSocketConnection>,
    shared: Arc<Shared>,
    mut rx: mpsc::UnboundedReceiver<String>,
) {
    let codec = JsonCodec;
    while let Some(path) = rx.recv().await {
        let bytes = match codec.encode(&ClientMessage::Unwatch { path: path.clone() }) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(error = %e, "failed to encode unwatch");
                continue;
            }
        };

        // The lock stays held until the Unwatch is on the wire, so a
        // subscribe() for the same path can only send its Watch after it.
        let mut watches = shared.watches.lock().await;
        let last = match watches.get_mut(&path) {
            Some(entry) => {
                entry.subscribers = entry.subscribers.saturating_sub(1);
                entry.subscribers == 0
            }
            None => false,
        };
        if !last {
            continue;
        }
        watches.remove(&path);
        if shared.closed.load(Ordering::Acquire) {
            continue;
        }
        if let Err(e) = conn.send(&bytes).await {
            tracing::debug!(%path, error = %e, "unwatch not delivered");
        }
    }
}

/// Sends a `Ping` every `interval` until the connection ends.
async fn keepalive_loop(conn: Arc<WebSocketConnection>, shared: Arc<Shared>, interval: Duration) {
    let bytes = match JsonCodec.encode(&ClientMessage::Ping) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(error = %e, "failed to encode ping, keepalive disabled");
            return;
        }
    };
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        ticker.tick().await;
        if shared.closed.load(Ordering::Acquire) {
            break;
        }
        if let Err(e) = conn.send(&bytes).await {
            tracing::debug!(conn_id = %conn.id(), error = %e, "keepalive failed");
            break;
        }
    }
}
