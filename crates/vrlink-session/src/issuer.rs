//! The controller side of a pairing.
//!
//! An [`Issuer`] is what a phone or a desktop controller holds after the
//! user types the pin shown in the headset. It writes `app` and `command`
//! into the document and watches `player`, `state` and `ackSeq` come back.
//!
//! Every command gets the next sequence number, so the playback side can
//! tell a new `PLAY` from a re-delivered one and acknowledge exactly that
//! command.

use std::time::Duration;

use tokio::time::Instant;
use vrlink_protocol::{DocumentPatch, LinkState, Pin, PlaybackCommand, SessionDocument, Token};
use vrlink_store::{SessionStore, Subscription};

use crate::SessionError;

/// The issuing end of one pairing.
pub struct Issuer<S> {
    store: S,
    pin: Pin,
    token: Token,
    subscription: Subscription,
}

impl<S: SessionStore> Issuer<S> {
    /// Writes a fresh document for `pin` and attaches to it.
    ///
    /// Used when the issuer, not the headset, generates the pin.
    pub async fn create(store: S, pin: Pin) -> Result<Self, SessionError> {
        let doc = SessionDocument::new(pin.clone());
        store.create(&doc.token, &doc).await?;
        Self::open(store, pin, doc.token).await
    }

    /// Attaches to the document the headset created for `pin`.
    ///
    /// # Errors
    /// [`SessionError::NotFound`] if no such document exists.
    pub async fn attach(store: S, pin: Pin) -> Result<Self, SessionError> {
        let token = Token::derive(&pin);
        if store.get(&token).await?.is_none() {
            return Err(SessionError::NotFound(token));
        }
        Self::open(store, pin, token).await
    }

    async fn open(store: S, pin: Pin, token: Token) -> Result<Self, SessionError> {
        let subscription = store.subscribe(&token).await?;
        tracing::info!(%pin, %token, "issuer attached");
        Ok(Self {
            store,
            pin,
            token,
            subscription,
        })
    }

    pub fn pin(&self) -> &Pin {
        &self.pin
    }

    pub fn token(&self) -> &Token {
        &self.token
    }

    /// Marks the issuer side present (`app=CONNECTED`).
    pub async fn connect(&self) -> Result<(), SessionError> {
        self.set_app(LinkState::Connected).await
    }

    /// Marks the issuer side gone (`app=DISCONNECTED`).
    pub async fn disconnect(&self) -> Result<(), SessionError> {
        self.set_app(LinkState::Disconnected).await
    }

    async fn set_app(&self, app: LinkState) -> Result<(), SessionError> {
        self.store
            .update(&self.token, &DocumentPatch::new().app(app))
            .await?;
        tracing::debug!(token = %self.token, %app, "issuer link state written");
        Ok(())
    }

    /// Writes `command` with the next sequence number and returns that
    /// number.
    ///
    /// # Errors
    /// [`SessionError::InvalidCommand`] for anything other than
    /// `PLAY`/`STOP`/`PAUSE`, [`SessionError::NotFound`] if the document
    /// is gone.
    pub async fn send(&self, command: PlaybackCommand) -> Result<u64, SessionError> {
        if !command.is_actionable() {
            return Err(SessionError::InvalidCommand(command));
        }
        let current = self
            .store
            .get(&self.token)
            .await?
            .ok_or_else(|| SessionError::NotFound(self.token.clone()))?;
        let seq = current.command_seq.max(current.ack_seq) + 1;

        self.store
            .update(
                &self.token,
                &DocumentPatch::new().command(command).command_seq(seq),
            )
            .await?;
        tracing::info!(token = %self.token, %command, seq, "command issued");
        Ok(seq)
    }

    /// Waits until the playback side has acknowledged command `seq`.
    ///
    /// # Errors
    /// [`SessionError::AckTimeout`] if `timeout` passes first.
    pub async fn wait_for_ack(
        &mut self,
        seq: u64,
        timeout: Duration,
    ) -> Result<SessionDocument, SessionError> {
        self.wait_until(timeout, |doc| doc.ack_seq >= seq)
            .await?
            .ok_or(SessionError::AckTimeout { seq })
    }

    /// Waits until the playback side reports `player=CONNECTED`.
    pub async fn wait_for_player(
        &mut self,
        timeout: Duration,
    ) -> Result<SessionDocument, SessionError> {
        self.wait_until(timeout, |doc| doc.player == LinkState::Connected)
            .await?
            .ok_or(SessionError::PlayerTimeout)
    }

    /// Waits for the next document value. `None` means the document was
    /// removed or overwritten under a different token.
    pub async fn next_change(&mut self) -> Result<Option<SessionDocument>, SessionError> {
        self.subscription
            .changed()
            .await
            .ok_or(SessionError::SubscriptionClosed)
    }

    /// The most recent document value seen.
    pub fn latest(&self) -> Option<SessionDocument> {
        self.subscription.latest()
    }

    /// Resolves with the first value matching `done`, or `Ok(None)` when
    /// `timeout` passes.
    async fn wait_until(
        &mut self,
        timeout: Duration,
        done: impl Fn(&SessionDocument) -> bool,
    ) -> Result<Option<SessionDocument>, SessionError> {
        if let Some(doc) = self.subscription.latest().filter(|doc| done(doc)) {
            return Ok(Some(doc));
        }

        let deadline = Instant::now() + timeout;
        loop {
            match tokio::time::timeout_at(deadline, self.subscription.changed()).await {
                Err(_) => return Ok(None),
                Ok(None) => return Err(SessionError::SubscriptionClosed),
                Ok(Some(Some(doc))) if done(&doc) => return Ok(Some(doc)),
                Ok(Some(_)) => {}
            }
        }
    }
}
