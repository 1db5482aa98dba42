//! `RelayServer` builder and accept loop.
//!
//! The relay is the realtime document service both sides of a pairing
//! talk to through [`RemoteStore`](vrlink_store::RemoteStore). It ties
//! together transport → protocol → store.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use vrlink_protocol::{Codec, JsonCodec};
use vrlink_store::MemoryStore;
use vrlink_transport::{Transport, WebSocketTransport};

use crate::VrlinkError;
use crate::handler::handle_connection;

/// Settings for [`RelayServer`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Connections that send nothing for this long are closed. Watches do
    /// not count as activity.
    pub idle_timeout: Duration,
    /// Upper bound on concurrent watches per connection.
    pub max_watches: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(300),
            max_watches: 16,
        }
    }
}

/// State shared by every connection task.
pub(crate) struct RelayState<C: Codec> {
    pub(crate) store: MemoryStore,
    pub(crate) codec: C,
    pub(crate) config: RelayConfig,
}

/// Builder for [`RelayServer`].
///
/// ```rust,no_run
/// # async fn run() -> Result<(), vrlink::VrlinkError> {
/// let server = vrlink::RelayServer::builder()
///     .bind("0.0.0.0:9000")
///     .build()
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct RelayServerBuilder {
    bind_addr: String,
    config: RelayConfig,
    store: Option<MemoryStore>,
}

impl RelayServerBuilder {
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:9000".to_string(),
            config: RelayConfig::default(),
            store: None,
        }
    }

    /// Sets the address to bind to. Port `0` picks a free port.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    pub fn config(mut self, config: RelayConfig) -> Self {
        self.config = config;
        self
    }

    /// Serves documents from `store` instead of a fresh one.
    pub fn store(mut self, store: MemoryStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Binds the listener.
    pub async fn build(self) -> Result<RelayServer, VrlinkError> {
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;
        let state = Arc::new(RelayState {
            store: self.store.unwrap_or_default(),
            codec: JsonCodec,
            config: self.config,
        });
        Ok(RelayServer { transport, state })
    }
}

impl Default for RelayServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound relay server. Call [`run()`](Self::run) to serve.
pub struct RelayServer {
    transport: WebSocketTransport,
    state: Arc<RelayState<JsonCodec>>,
}

impl RelayServer {
    pub fn builder() -> RelayServerBuilder {
        RelayServerBuilder::new()
    }

    pub fn local_addr(&self) -> Result<SocketAddr, VrlinkError> {
        Ok(self.transport.local_addr()?)
    }

    /// The documents being served. Shares state with the running server.
    pub fn store(&self) -> MemoryStore {
        self.state.store.clone()
    }

    /// Accepts connections until the task is dropped, spawning one
    /// handler task per connection.
    pub async fn run(mut self) -> Result<(), VrlinkError> {
        tracing::info!(addr = ?self.transport.local_addr().ok(), "relay server running");

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}
