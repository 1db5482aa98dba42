//! # vrlink
//!
//! Pairs a VR video player (the headset) with a remote controller through
//! one shared session document, and keeps playback in sync.
//!
//! - The headset runs a [`Pairing`](vrlink_session::Pairing) and a player
//!   actor ([`spawn_player`](vrlink_player::spawn_player)) that executes
//!   the commands written into the document.
//! - The controller attaches with the 4-digit pin through an
//!   [`Issuer`](vrlink_session::Issuer) and waits for acknowledgements.
//! - Both talk to a [`RelayServer`] through
//!   [`RemoteStore`](vrlink_store::RemoteStore), or share a
//!   [`MemoryStore`](vrlink_store::MemoryStore) in-process.
//! - [`ImmersiveBinder`](vrlink_xr::ImmersiveBinder) presents the video
//!   inside an immersive session.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use vrlink::prelude::*;
//!
//! # async fn run() -> Result<(), VrlinkError> {
//! vrlink::init_tracing();
//! let server = RelayServer::builder().bind("127.0.0.1:9000").build().await?;
//! tokio::spawn(server.run());
//!
//! let store = RemoteStore::connect("ws://127.0.0.1:9000").await?;
//! let pin = Pin::parse("4821")?;
//! let mut issuer = Issuer::attach(store, pin).await?;
//! let seq = issuer.send(PlaybackCommand::Play).await?;
//! issuer.wait_for_ack(seq, std::time::Duration::from_secs(5)).await?;
//! # Ok(())
//! # }
//! ```

mod error;
mod handler;
mod server;

pub use error::VrlinkError;
pub use server::{RelayConfig, RelayServer, RelayServerBuilder};

pub use vrlink_player as player;
pub use vrlink_protocol as protocol;
pub use vrlink_session as session;
pub use vrlink_store as store;
pub use vrlink_transport as transport;
pub use vrlink_xr as xr;

/// Installs a `tracing` subscriber that reads `RUST_LOG`, defaulting to
/// `info`. Does nothing if a subscriber is already installed.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Everything needed to run a relay, a headset or a controller.
pub mod prelude {
    pub use crate::{RelayConfig, RelayServer, VrlinkError};

    pub use vrlink_player::{
        MediaEvent, MediaSource, PlayerConfig, PlayerHandle, PlayerStatus, ReadyState,
        VideoElement, spawn_player,
    };
    pub use vrlink_protocol::{
        DocumentPatch, LinkState, Pin, PlaybackCommand, PlaybackState, SessionDocument, Token,
    };
    pub use vrlink_session::{
        FilePinStorage, Issuer, MemoryPinStorage, Pairing, PairingState, PinStorage,
    };
    pub use vrlink_store::{MemoryStore, RemoteStore, RemoteStoreConfig, SessionStore};
    pub use vrlink_xr::{
        BinderConfig, EndReason, ImmersiveBinder, ImmersiveSession, VideoProjection, XrSession,
        XrSystem,
    };
}
