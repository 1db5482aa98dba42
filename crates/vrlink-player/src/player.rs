//! Player actor: one task that owns the pairing, the video and the error
//! slot.
//!
//! Two inputs drive it:
//!
//! ```text
//! PlayerHandle ──PlayerCommand──┐
//!                               ├──→ PlayerActor ──→ video.play()/pause()/seek()
//! Pairing::next_change() ───────┘         │
//!                                         └──→ store.update(sessions/<token>)
//! ```
//!
//! Both are polled in one `select!`, so commands from the document and
//! local events (user start, media events, pin change) never interleave.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use vrlink_protocol::{
    DocumentPatch, LinkState, Pin, PlaybackCommand, PlaybackState, SessionDocument, Token,
};
use vrlink_session::{Pairing, PairingState, PinStorage, SessionError};
use vrlink_store::SessionStore;

use crate::relay::{CommandRelay, Step, ack_patch};
use crate::{MediaError, MediaEvent, PlayerConfig, PlayerError, VideoElement, prime};

/// Commands sent from a [`PlayerHandle`] to the actor.
enum PlayerCommand {
    UserStart {
        reply: oneshot::Sender<Result<(), PlayerError>>,
    },
    Media(MediaEvent),
    ChangePin {
        reply: oneshot::Sender<Result<Pin, PlayerError>>,
    },
    Status {
        reply: oneshot::Sender<PlayerStatus>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// A snapshot of the player for display.
#[derive(Debug, Clone)]
pub struct PlayerStatus {
    pub pin: Option<Pin>,
    pub token: Option<Token>,
    pub pairing: PairingState,
    /// The playback state this side last wrote.
    pub state: PlaybackState,
    pub user_interacted: bool,
    /// The most recent error, rendered. Cleared by a user start or a
    /// `LoadedData` event.
    pub last_error: Option<String>,
    /// The highest command sequence executed here.
    pub last_handled_seq: Option<u64>,
}

/// Handle to a running player actor.
///
/// Cheap to clone. Every method fails with [`PlayerError::Unavailable`]
/// once the actor has stopped.
#[derive(Clone)]
pub struct PlayerHandle {
    sender: mpsc::Sender<PlayerCommand>,
}

impl PlayerHandle {
    /// The local user gesture: unlocks playback and marks the player
    /// connected. Commands that were waiting for it run now.
    pub async fn user_start(&self) -> Result<(), PlayerError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(PlayerCommand::UserStart { reply: reply_tx }).await?;
        reply_rx.await.map_err(|_| PlayerError::Unavailable)?
    }

    /// Forwards an event raised by the video element (fire-and-forget).
    pub async fn media_event(&self, event: MediaEvent) -> Result<(), PlayerError> {
        self.send(PlayerCommand::Media(event)).await
    }

    /// Generates a new pin and moves to its document.
    pub async fn change_pin(&self) -> Result<Pin, PlayerError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(PlayerCommand::ChangePin { reply: reply_tx }).await?;
        reply_rx.await.map_err(|_| PlayerError::Unavailable)?
    }

    pub async fn status(&self) -> Result<PlayerStatus, PlayerError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(PlayerCommand::Status { reply: reply_tx }).await?;
        reply_rx.await.map_err(|_| PlayerError::Unavailable)
    }

    /// Marks the player disconnected and stops the actor. Resolves once the
    /// subscription is gone.
    pub async fn shutdown(&self) -> Result<(), PlayerError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(PlayerCommand::Shutdown { reply: reply_tx }).await?;
        reply_rx.await.map_err(|_| PlayerError::Unavailable)
    }

    async fn send(&self, cmd: PlayerCommand) -> Result<(), PlayerError> {
        self.sender
            .send(cmd)
            .await
            .map_err(|_| PlayerError::Unavailable)
    }
}

/// Starts the pairing (if not started yet) and spawns the player actor.
///
/// # Errors
/// Fails only if the pairing cannot load or generate a pin.
pub async fn spawn_player<S, P, V>(
    mut pairing: Pairing<S, P>,
    video: Arc<V>,
    config: PlayerConfig,
) -> Result<PlayerHandle, PlayerError>
where
    S: SessionStore,
    P: PinStorage,
    V: VideoElement,
{
    match pairing.state() {
        PairingState::NoPin => {
            pairing.start().await?;
        }
        PairingState::PinLoaded => pairing.subscribe().await?,
        PairingState::Subscribed => {}
    }

    let (sender, receiver) = mpsc::channel(config.command_buffer.max(1));
    let actor = PlayerActor {
        pairing,
        video,
        config,
        receiver,
        relay: CommandRelay::new(),
        doc: None,
        state: PlaybackState::Initial,
        user_interacted: false,
        last_error: None,
    };
    tokio::spawn(actor.run());

    Ok(PlayerHandle { sender })
}

// ---------------------------------------------------------------------------
// Actor
// ---------------------------------------------------------------------------

struct PlayerActor<S, P, V> {
    pairing: Pairing<S, P>,
    video: Arc<V>,
    config: PlayerConfig,
    receiver: mpsc::Receiver<PlayerCommand>,
    relay: CommandRelay,
    /// The latest document seen through the subscription.
    doc: Option<SessionDocument>,
    state: PlaybackState,
    user_interacted: bool,
    last_error: Option<PlayerError>,
}

impl<S, P, V> PlayerActor<S, P, V>
where
    S: SessionStore,
    P: PinStorage,
    V: VideoElement,
{
    async fn run(mut self) {
        tracing::info!(
            pin = ?self.pairing.pin().map(Pin::as_str),
            source = %self.video.source(),
            "player started"
        );

        loop {
            tokio::select! {
                cmd = self.receiver.recv() => {
                    let Some(cmd) = cmd else {
                        tracing::debug!("all player handles dropped");
                        break;
                    };
                    if !self.handle_command(cmd).await {
                        break;
                    }
                }
                change = self.pairing.next_change() => match change {
                    Ok(doc) => self.on_document(doc).await,
                    Err(e) => self.on_subscription_lost(e).await,
                },
            }
        }

        tracing::info!("player stopped");
    }

    /// Returns `false` when the actor should stop.
    async fn handle_command(&mut self, cmd: PlayerCommand) -> bool {
        match cmd {
            PlayerCommand::UserStart { reply } => {
                let result = self.user_start().await;
                let _ = reply.send(result);
            }
            PlayerCommand::Media(event) => self.on_media_event(event).await,
            PlayerCommand::ChangePin { reply } => {
                let result = self.change_pin().await;
                let _ = reply.send(result);
            }
            PlayerCommand::Status { reply } => {
                let _ = reply.send(self.status());
            }
            PlayerCommand::Shutdown { reply } => {
                self.write(DocumentPatch::new().player(LinkState::Disconnected))
                    .await;
                self.pairing.unsubscribe();
                tracing::info!(token = ?self.pairing.token().map(Token::as_str), "player disconnected");
                let _ = reply.send(());
                return false;
            }
        }
        true
    }

    async fn user_start(&mut self) -> Result<(), PlayerError> {
        self.user_interacted = true;
        self.last_error = None;

        if let Err(e) = prime(self.video.as_ref()).await {
            self.fail(e.into());
        }

        let token = self
            .pairing
            .token()
            .cloned()
            .ok_or(SessionError::NotPaired)?;
        // A failed presence write lands in the error slot; deferred
        // commands still run.
        self.write(DocumentPatch::new().player(LinkState::Connected))
            .await;
        tracing::info!(%token, "user started playback");

        self.evaluate().await;
        Ok(())
    }

    async fn change_pin(&mut self) -> Result<Pin, PlayerError> {
        let pin = self.pairing.change_pin().await?;
        self.doc = None;
        self.relay.reset();

        if self.user_interacted {
            self.write(DocumentPatch::new().player(LinkState::Connected))
                .await;
        }
        Ok(pin)
    }

    fn status(&self) -> PlayerStatus {
        PlayerStatus {
            pin: self.pairing.pin().cloned(),
            token: self.pairing.token().cloned(),
            pairing: self.pairing.state(),
            state: self.state,
            user_interacted: self.user_interacted,
            last_error: self.last_error.as_ref().map(ToString::to_string),
            last_handled_seq: self.relay.last_handled(),
        }
    }

    async fn on_document(&mut self, doc: Option<SessionDocument>) {
        match &doc {
            Some(doc) => tracing::debug!(
                command = %doc.command,
                seq = doc.command_seq,
                ack = doc.ack_seq,
                app = %doc.app,
                "document changed"
            ),
            None => tracing::debug!("document missing"),
        }
        self.doc = doc;
        self.evaluate().await;
    }

    /// Reports the lost subscription and opens a new one on the same pin.
    async fn on_subscription_lost(&mut self, error: SessionError) {
        self.fail(error.into());
        match self.pairing.subscribe().await {
            Ok(()) => tracing::info!(
                token = ?self.pairing.token().map(Token::as_str),
                "resubscribed after losing the subscription"
            ),
            Err(e) => self.fail(e.into()),
        }
    }

    async fn on_media_event(&mut self, event: MediaEvent) {
        tracing::debug!(?event, "media event");
        match event {
            MediaEvent::Play => self.write_state(PlaybackState::Playing).await,
            MediaEvent::Pause => {
                // pause() is also how STOP is carried out; don't let the
                // resulting event overwrite STOPPED.
                if !matches!(self.state, PlaybackState::Paused | PlaybackState::Stopped) {
                    self.write_state(PlaybackState::Paused).await;
                }
            }
            MediaEvent::Ended => self.write_state(PlaybackState::Ended).await,
            MediaEvent::LoadedData => {
                self.last_error = None;
                self.evaluate().await;
            }
            MediaEvent::Error(message) => self.fail(PlayerError::Load(message)),
        }
    }

    /// Plans against the latest document and carries out the step.
    async fn evaluate(&mut self) {
        let Some(doc) = self.doc.as_ref() else {
            return;
        };
        let step = self
            .relay
            .plan(doc, self.user_interacted, self.video.ready_state());

        match step {
            Step::Idle => {}
            Step::Duplicate { seq } => {
                tracing::debug!(seq, "command already handled, waiting for ack to land");
            }
            Step::NeedsInteraction { command, seq } => {
                tracing::debug!(%command, seq, "command deferred until user start");
                self.fail(PlayerError::NeedsInteraction);
            }
            Step::NotReady { seq } => {
                tracing::debug!(seq, "play deferred until video data loads");
                self.fail(PlayerError::NotReady);
            }
            Step::Execute { command, seq } => self.execute(command, seq).await,
        }
    }

    async fn execute(&mut self, command: PlaybackCommand, seq: u64) {
        let outcome = match command {
            PlaybackCommand::Play => play(self.video.as_ref(), self.config.play_timeout).await,
            PlaybackCommand::Stop => {
                self.video.pause();
                self.video.seek(Duration::ZERO);
                Ok(())
            }
            PlaybackCommand::Pause => {
                self.video.pause();
                Ok(())
            }
            PlaybackCommand::None | PlaybackCommand::Proceeded => return,
        };
        self.relay.mark_handled(seq);

        let succeeded = match outcome {
            Ok(()) => {
                if let Some(state) = command.resulting_state() {
                    self.state = state;
                }
                tracing::info!(%command, seq, state = %self.state, "command executed");
                true
            }
            Err(e) => {
                tracing::warn!(%command, seq, "command failed, acknowledging without state change");
                self.fail(e.into());
                false
            }
        };
        self.write(ack_patch(command, seq, succeeded)).await;
    }

    async fn write_state(&mut self, state: PlaybackState) {
        self.state = state;
        self.write(DocumentPatch::new().state(state)).await;
    }

    /// Writes `patch` to the current document. Failures go to the error
    /// slot.
    async fn write(&mut self, patch: DocumentPatch) {
        let Some(token) = self.pairing.token().cloned() else {
            tracing::debug!(?patch, "not paired, write dropped");
            return;
        };
        if let Err(e) = self.pairing.store().update(&token, &patch).await {
            self.fail(e.into());
        }
    }

    /// Fills the error slot. The last error wins.
    fn fail(&mut self, error: PlayerError) {
        tracing::warn!(error = %error, "player error");
        self.last_error = Some(error);
    }
}

/// Starts the video unless it is already playing, bounded by `timeout`.
async fn play<V: VideoElement>(video: &V, timeout: Duration) -> Result<(), MediaError> {
    if !video.is_paused() {
        tracing::debug!("already playing, play() skipped");
        return Ok(());
    }
    match tokio::time::timeout(timeout, video.play()).await {
        Ok(result) => result,
        Err(_) => Err(MediaError(format!("play() did not settle within {timeout:?}"))),
    }
}
