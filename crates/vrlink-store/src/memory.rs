//! In-process session store.
//!
//! Each document lives in a `tokio::sync::watch` channel: the sender holds
//! the current value, every subscription is a receiver. `watch` keeps only
//! the newest value, which is exactly the latest-wins delivery the store
//! contract promises.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, watch};
use vrlink_protocol::{DocumentPatch, SessionDocument, Token};

use crate::{SessionStore, StoreError, Subscription};

type DocSender = watch::Sender<Option<SessionDocument>>;

/// A [`SessionStore`] that keeps documents in memory.
///
/// Cheap to clone; clones share the same documents.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    docs: Arc<Mutex<HashMap<Token, DocSender>>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of paths that hold a document.
    pub async fn document_count(&self) -> usize {
        self.docs
            .lock()
            .await
            .values()
            .filter(|tx| tx.borrow().is_some())
            .count()
    }

    #[cfg(test)]
    async fn slot_count(&self) -> usize {
        self.docs.lock().await.len()
    }
}

/// Drops slots that hold no document and have no subscriber left.
fn prune_idle(docs: &mut HashMap<Token, DocSender>) {
    let before = docs.len();
    docs.retain(|_, tx| tx.borrow().is_some() || tx.receiver_count() > 0);
    let pruned = before - docs.len();
    if pruned > 0 {
        tracing::trace!(pruned, "dropped idle watch slots");
    }
}

impl SessionStore for MemoryStore {
    async fn create(&self, token: &Token, doc: &SessionDocument) -> Result<(), StoreError> {
        let mut docs = self.docs.lock().await;
        let tx = docs
            .entry(token.clone())
            .or_insert_with(|| watch::channel(None).0);
        tx.send_replace(Some(doc.clone()));
        tracing::debug!(%token, "document created");
        Ok(())
    }

    async fn update(&self, token: &Token, patch: &DocumentPatch) -> Result<(), StoreError> {
        let docs = self.docs.lock().await;
        let tx = docs
            .get(token)
            .ok_or_else(|| StoreError::NotFound(token.clone()))?;

        let mut missing = false;
        let modified = tx.send_if_modified(|current| match current {
            Some(doc) => {
                let before = doc.clone();
                doc.apply(patch);
                *doc != before
            }
            None => {
                missing = true;
                false
            }
        });

        if missing {
            return Err(StoreError::NotFound(token.clone()));
        }
        tracing::debug!(%token, modified, ?patch, "document updated");
        Ok(())
    }

    async fn get(&self, token: &Token) -> Result<Option<SessionDocument>, StoreError> {
        let docs = self.docs.lock().await;
        Ok(docs.get(token).and_then(|tx| tx.borrow().clone()))
    }

    async fn subscribe(&self, token: &Token) -> Result<Subscription, StoreError> {
        let mut docs = self.docs.lock().await;
        if !docs.contains_key(token) {
            prune_idle(&mut docs);
        }
        let tx = docs
            .entry(token.clone())
            .or_insert_with(|| watch::channel(None).0);
        let mut rx = tx.subscribe();
        // Deliver the current value (even "missing") on the first wait.
        rx.mark_changed();
        tracing::debug!(%token, "subscribed");
        Ok(Subscription::new(token.clone(), rx, None))
    }
}
