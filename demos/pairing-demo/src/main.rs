//! Runs a relay, a simulated headset and a controller in one process and
//! walks the controller through PLAY, PAUSE, PLAY, STOP.
//!
//! `VRLINK_ADDR` sets the relay address (default `127.0.0.1:9000`),
//! `RUST_LOG` the log filter.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use vrlink::player::MediaError;
use vrlink::prelude::*;

const ACK_TIMEOUT: Duration = Duration::from_secs(5);

// ---------------------------------------------------------------------------
// Simulated video element
// ---------------------------------------------------------------------------

/// A video element that is always buffered and never refuses to play.
struct SimulatedVideo {
    source: MediaSource,
    paused: Mutex<bool>,
}

impl SimulatedVideo {
    fn new(url: &str) -> Self {
        Self {
            source: MediaSource::from_url(url),
            paused: Mutex::new(true),
        }
    }

    fn set_paused(&self, paused: bool) {
        if let Ok(mut p) = self.paused.lock() {
            *p = paused;
        }
    }
}

impl VideoElement for SimulatedVideo {
    fn ready_state(&self) -> ReadyState {
        ReadyState::HaveEnoughData
    }

    fn is_paused(&self) -> bool {
        self.paused.lock().map(|p| *p).unwrap_or(true)
    }

    fn source(&self) -> &MediaSource {
        &self.source
    }

    async fn play(&self) -> Result<(), MediaError> {
        self.set_paused(false);
        tracing::debug!(source = %self.source, "video playing");
        Ok(())
    }

    fn pause(&self) {
        self.set_paused(true);
        tracing::debug!(source = %self.source, "video paused");
    }

    fn seek(&self, position: Duration) {
        tracing::debug!(?position, "video seeked");
    }

    async fn wait_for_data(&self) -> Result<(), MediaError> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Demo flow
// ---------------------------------------------------------------------------

/// Pairs a headset and a controller through the relay at `url` and drives
/// playback. Returns the final document as the controller sees it.
async fn run_demo(url: &str) -> Result<SessionDocument, Box<dyn std::error::Error>> {
    // Headset side.
    let headset_store = RemoteStore::connect(url).await?;
    let pairing = Pairing::new(headset_store, MemoryPinStorage::new());
    let video = Arc::new(SimulatedVideo::new("https://cdn.example.com/tour/master.m3u8"));
    let player = spawn_player(pairing, Arc::clone(&video), PlayerConfig::default()).await?;
    player.user_start().await?;

    let status = player.status().await?;
    let pin = status.pin.ok_or("headset has no pin")?;
    tracing::info!(%pin, "headset ready, enter this pin on the controller");

    // Controller side.
    let controller_store = RemoteStore::connect(url).await?;
    let mut issuer = Issuer::attach(controller_store, pin).await?;
    issuer.connect().await?;
    issuer.wait_for_player(ACK_TIMEOUT).await?;

    let mut last = None;
    for command in [
        PlaybackCommand::Play,
        PlaybackCommand::Pause,
        PlaybackCommand::Play,
        PlaybackCommand::Stop,
    ] {
        let seq = issuer.send(command).await?;
        let doc = issuer.wait_for_ack(seq, ACK_TIMEOUT).await?;
        tracing::info!(%command, seq, state = %doc.state, "acknowledged");
        last = Some(doc);
    }

    issuer.disconnect().await?;
    player.shutdown().await?;
    Ok(last.ok_or("no command was sent")?)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    vrlink::init_tracing();

    let addr = std::env::var("VRLINK_ADDR").unwrap_or_else(|_| "127.0.0.1:9000".to_string());
    let server = RelayServer::builder().bind(&addr).build().await?;
    let url = format!("ws://{}", server.local_addr()?);
    let relay = tokio::spawn(server.run());

    let doc = run_demo(&url).await?;
    tracing::info!(state = %doc.state, ack_seq = doc.ack_seq, "demo finished");

    relay.abort();
    Ok(())
}
