//! The store trait and the subscription handle it hands out.

use std::future::Future;

use tokio::sync::{mpsc, watch};
use vrlink_protocol::{DocumentPatch, SessionDocument, Token};

use crate::StoreError;

/// A realtime key-value store of session documents addressed by token
/// (`sessions/<token>`).
///
/// Methods return `impl Future + Send` rather than using `async fn` so the
/// futures can be awaited from spawned tasks; implementors can still write
/// `async fn` in their `impl` blocks.
pub trait SessionStore: Send + Sync + 'static {
    /// Overwrites the entire document. No version check: concurrent creates
    /// under the same token race and the last one wins.
    fn create(
        &self,
        token: &Token,
        doc: &SessionDocument,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Merges the fields present in `patch` into the existing document.
    ///
    /// # Errors
    /// [`StoreError::NotFound`] if there is no document under `token`.
    fn update(
        &self,
        token: &Token,
        patch: &DocumentPatch,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Reads the current value once.
    fn get(
        &self,
        token: &Token,
    ) -> impl Future<Output = Result<Option<SessionDocument>, StoreError>> + Send;

    /// Starts watching a document. See [`Subscription`].
    fn subscribe(
        &self,
        token: &Token,
    ) -> impl Future<Output = Result<Subscription, StoreError>> + Send;
}

// ---------------------------------------------------------------------------
// Subscription
// ---------------------------------------------------------------------------

/// A live watch on one session document.
///
/// The first [`changed`](Self::changed) call resolves with the current
/// value (`None` when the document does not exist), later calls resolve on
/// each change. Values are latest-wins: if the document changes several
/// times between two calls only the newest value is observed.
///
/// Dropping the subscription (or calling [`unsubscribe`](Self::unsubscribe))
/// ends delivery. Since the subscription owns its receiver, nothing can be
/// observed through it afterwards, however late the store sends.
#[derive(Debug)]
pub struct Subscription {
    token: Token,
    rx: watch::Receiver<Option<SessionDocument>>,
    _guard: Option<WatchGuard>,
}

impl Subscription {
    pub(crate) fn new(
        token: Token,
        rx: watch::Receiver<Option<SessionDocument>>,
        guard: Option<WatchGuard>,
    ) -> Self {
        Self {
            token,
            rx,
            _guard: guard,
        }
    }

    /// The token being watched.
    pub fn token(&self) -> &Token {
        &self.token
    }

    /// Waits for the next value.
    ///
    /// Returns `None` once the store side of the watch is gone (the store
    /// was dropped or the relay connection was lost).
    pub async fn changed(&mut self) -> Option<Option<SessionDocument>> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }

    /// The most recent value, without waiting or marking it seen.
    pub fn latest(&self) -> Option<SessionDocument> {
        self.rx.borrow().clone()
    }

    /// Stops delivery. Equivalent to dropping the subscription.
    pub fn unsubscribe(self) {
        tracing::debug!(token = %self.token, "unsubscribed");
    }
}

/// Tells a remote store that one subscriber of `path` went away.
#[derive(Debug)]
pub(crate) struct WatchGuard {
    path: String,
    tx: mpsc::UnboundedSender<String>,
}

impl WatchGuard {
    pub(crate) fn new(path: String, tx: mpsc::UnboundedSender<String>) -> Self {
        Self { path, tx }
    }
}

impl Drop for WatchGuard {
    fn drop(&mut self) {
        // The receiver is gone only when the store itself is gone.
        let _ = self.tx.send(std::mem::take(&mut self.path));
    }
}
