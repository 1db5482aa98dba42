//! The headset side of a pairing: one pin, one document, one subscription.
//!
//! ```text
//!             start() / generate
//! [NoPin] ─────────────────────────→ [PinLoaded] ──subscribe()──→ [Subscribed]
//!                                        ▲                            │
//!                                        └────── change_pin() ────────┘
//!                                          (old subscription dropped
//!                                           once the new document exists)
//! ```
//!
//! # Ordering on a new pin
//!
//! Generating a pin does three writes in a fixed order:
//!
//! 1. clear the stored pin,
//! 2. create the fresh document in the store,
//! 3. persist the new pin.
//!
//! A crash between 2 and 3 leaves an orphaned document and no stored pin,
//! so the next start generates again. The stored pin never points at a
//! document that was not written.

use vrlink_protocol::{Pin, SessionDocument, Token};
use vrlink_store::{SessionStore, Subscription};

use crate::{PinStorage, SessionError};

/// Where a [`Pairing`] is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairingState {
    /// No pin loaded yet.
    NoPin,
    /// A pin (and its document) exists but nothing is subscribed.
    PinLoaded,
    /// Exactly one live subscription to the current pin's document.
    Subscribed,
}

/// Owns the headset's pin and its document subscription.
pub struct Pairing<S, P> {
    store: S,
    pins: P,
    current: Option<(Pin, Token)>,
    subscription: Option<Subscription>,
}

impl<S: SessionStore, P: PinStorage> Pairing<S, P> {
    /// A pairing in [`PairingState::NoPin`].
    pub fn new(store: S, pins: P) -> Self {
        Self {
            store,
            pins,
            current: None,
            subscription: None,
        }
    }

    pub fn state(&self) -> PairingState {
        match (&self.current, &self.subscription) {
            (None, _) => PairingState::NoPin,
            (Some(_), None) => PairingState::PinLoaded,
            (Some(_), Some(_)) => PairingState::Subscribed,
        }
    }

    pub fn pin(&self) -> Option<&Pin> {
        self.current.as_ref().map(|(pin, _)| pin)
    }

    pub fn token(&self) -> Option<&Token> {
        self.current.as_ref().map(|(_, token)| token)
    }

    /// The store this pairing writes to.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Loads the stored pin (or generates one) and subscribes.
    ///
    /// A stored value that is not a valid pin is discarded and replaced.
    /// If the stored pin's document has disappeared from the store, a fresh
    /// default document is written under it.
    pub async fn start(&mut self) -> Result<Pin, SessionError> {
        let stored = self.pins.load().await?;
        let loaded = match stored.as_deref().map(Pin::parse) {
            Some(Ok(pin)) => Some(pin),
            Some(Err(e)) => {
                tracing::warn!(error = %e, "discarding invalid stored pin");
                None
            }
            None => None,
        };

        let pin = match loaded {
            Some(pin) => {
                let token = Token::derive(&pin);
                if self.store.get(&token).await?.is_none() {
                    tracing::info!(%pin, %token, "stored pin has no document, recreating");
                    self.store
                        .create(&token, &SessionDocument::new(pin.clone()))
                        .await?;
                }
                tracing::info!(%pin, %token, "pin loaded");
                self.current = Some((pin.clone(), token));
                pin
            }
            None => self.generate().await?,
        };

        self.subscribe().await?;
        Ok(pin)
    }

    /// Replaces the pin with a fresh one and re-subscribes.
    ///
    /// If the new document cannot be written, the old pin and its
    /// subscription stay in place. Otherwise the old subscription is
    /// released before the new one opens, so nothing from the old pin is
    /// observed afterwards.
    pub async fn change_pin(&mut self) -> Result<Pin, SessionError> {
        let pin = self.generate().await?;
        self.subscribe().await?;
        Ok(pin)
    }

    /// Opens a subscription to the current pin's document, replacing any
    /// existing one.
    ///
    /// # Errors
    /// [`SessionError::NotPaired`] if no pin is loaded.
    pub async fn subscribe(&mut self) -> Result<(), SessionError> {
        let token = self.token().cloned().ok_or(SessionError::NotPaired)?;
        self.unsubscribe();
        self.subscription = Some(self.store.subscribe(&token).await?);
        tracing::debug!(%token, "pairing subscribed");
        Ok(())
    }

    /// Drops the subscription, keeping the pin.
    pub fn unsubscribe(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
    }

    /// Waits for the next document value from the subscription.
    ///
    /// Resolves with `Ok(None)` while the document does not exist. Never
    /// resolves when unsubscribed, which makes it safe to use as a
    /// `select!` branch.
    ///
    /// # Errors
    /// [`SessionError::SubscriptionClosed`] once, when the store ends the
    /// subscription. The pairing is then back in
    /// [`PairingState::PinLoaded`] and [`subscribe`](Self::subscribe) can
    /// be tried again.
    pub async fn next_change(&mut self) -> Result<Option<SessionDocument>, SessionError> {
        let Some(subscription) = self.subscription.as_mut() else {
            return std::future::pending().await;
        };
        match subscription.changed().await {
            Some(doc) => Ok(doc),
            None => {
                tracing::warn!(token = %subscription.token(), "store ended the subscription");
                self.subscription = None;
                Err(SessionError::SubscriptionClosed)
            }
        }
    }

    /// The most recent document value seen by the subscription.
    pub fn latest(&self) -> Option<SessionDocument> {
        self.subscription.as_ref().and_then(Subscription::latest)
    }

    /// Writes a fresh pin and document. `current` and the subscription are
    /// only touched once the document exists; the old subscription is
    /// dropped at that point.
    async fn generate(&mut self) -> Result<Pin, SessionError> {
        self.pins.clear().await?;

        let pin = Pin::generate();
        let doc = SessionDocument::new(pin.clone());
        let token = doc.token.clone();
        if let Err(e) = self.store.create(&token, &doc).await {
            self.restore_stored_pin().await;
            return Err(e.into());
        }

        self.unsubscribe();
        self.current = Some((pin.clone(), token.clone()));
        self.pins.save(&pin).await?;
        tracing::info!(%pin, %token, "generated new pin");
        Ok(pin)
    }

    /// Puts the current pin back into storage after a failed generate.
    async fn restore_stored_pin(&self) {
        let Some((pin, _)) = &self.current else {
            return;
        };
        if let Err(e) = self.pins.save(pin).await {
            tracing::warn!(error = %e, "could not restore stored pin");
        }
    }
}
