//! Pairing and issuing against a shared in-memory store.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use vrlink_protocol::{DocumentPatch, LinkState, Pin, PlaybackCommand, SessionDocument, Token};
use vrlink_session::{
    Issuer, MemoryPinStorage, Pairing, PairingState, PinStorage, SessionError,
};
use vrlink_store::{MemoryStore, SessionStore, StoreError, Subscription};

/// Pin storage that records the order of calls and checks the store at
/// save time.
#[derive(Clone)]
struct RecordingStorage {
    store: MemoryStore,
    log: Arc<Mutex<Vec<String>>>,
}

impl RecordingStorage {
    fn calls(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }
}

impl PinStorage for RecordingStorage {
    async fn load(&self) -> Result<Option<String>, SessionError> {
        self.log.lock().unwrap().push("load".into());
        Ok(None)
    }

    async fn save(&self, pin: &Pin) -> Result<(), SessionError> {
        let written = self.store.get(&Token::derive(pin)).await?.is_some();
        self.log
            .lock()
            .unwrap()
            .push(format!("save(doc_written={written})"));
        Ok(())
    }

    async fn clear(&self) -> Result<(), SessionError> {
        self.log.lock().unwrap().push("clear".into());
        Ok(())
    }
}

/// A memory store whose `create` can be made to fail.
#[derive(Clone, Default)]
struct FlakyStore {
    inner: MemoryStore,
    refuse_creates: Arc<AtomicBool>,
}

impl SessionStore for FlakyStore {
    async fn create(&self, token: &Token, doc: &SessionDocument) -> Result<(), StoreError> {
        if self.refuse_creates.load(Ordering::SeqCst) {
            return Err(StoreError::Disconnected);
        }
        self.inner.create(token, doc).await
    }

    async fn update(&self, token: &Token, patch: &DocumentPatch) -> Result<(), StoreError> {
        self.inner.update(token, patch).await
    }

    async fn get(&self, token: &Token) -> Result<Option<SessionDocument>, StoreError> {
        self.inner.get(token).await
    }

    async fn subscribe(&self, token: &Token) -> Result<Subscription, StoreError> {
        self.inner.subscribe(token).await
    }
}

#[tokio::test]
async fn test_generate_clears_then_writes_document_then_saves() {
    let store = MemoryStore::new();
    let storage = RecordingStorage {
        store: store.clone(),
        log: Arc::default(),
    };
    let mut pairing = Pairing::new(store, storage.clone());

    pairing.start().await.unwrap();

    assert_eq!(
        storage.calls(),
        vec!["load", "clear", "save(doc_written=true)"]
    );
}

#[tokio::test]
async fn test_headset_and_issuer_share_one_document() {
    let store = MemoryStore::new();
    let mut headset = Pairing::new(store.clone(), MemoryPinStorage::new());
    let pin = headset.start().await.unwrap();
    headset.next_change().await.unwrap();

    // The user types the pin shown in the headset into the controller.
    let typed = Pin::parse(pin.as_str()).unwrap();
    let issuer = Issuer::attach(store.clone(), typed).await.unwrap();
    assert_eq!(issuer.token(), headset.token().unwrap());

    issuer.connect().await.unwrap();
    let doc = headset.next_change().await.unwrap().unwrap();
    assert_eq!(doc.app, LinkState::Connected);

    let seq = issuer.send(PlaybackCommand::Play).await.unwrap();
    let doc = headset.next_change().await.unwrap().unwrap();
    assert_eq!(doc.pending_command(), Some((PlaybackCommand::Play, seq)));
}

#[tokio::test]
async fn test_issuer_waits_for_headset_acknowledgement() {
    let store = MemoryStore::new();
    let mut headset = Pairing::new(store.clone(), MemoryPinStorage::new());
    let pin = headset.start().await.unwrap();
    let mut issuer = Issuer::attach(store.clone(), pin).await.unwrap();

    let seq = issuer.send(PlaybackCommand::Pause).await.unwrap();

    // Play the part of the player: see the command, acknowledge it.
    let acker = tokio::spawn(async move {
        loop {
            let Ok(Some(doc)) = headset.next_change().await else {
                continue;
            };
            if let Some((command, seq)) = doc.pending_command() {
                let state = command.resulting_state().unwrap();
                let patch = DocumentPatch::new()
                    .command(PlaybackCommand::Proceeded)
                    .ack_seq(seq)
                    .state(state);
                headset
                    .store()
                    .update(headset.token().unwrap(), &patch)
                    .await
                    .unwrap();
                break;
            }
        }
    });

    let doc = issuer
        .wait_for_ack(seq, Duration::from_secs(2))
        .await
        .unwrap();
    assert_eq!(doc.command, PlaybackCommand::Proceeded);
    assert_eq!(doc.ack_seq, seq);
    acker.await.unwrap();
}

#[tokio::test]
async fn test_issuer_attach_fails_after_headset_changes_pin() {
    let store = MemoryStore::new();
    let mut headset = Pairing::new(store.clone(), MemoryPinStorage::new());
    let old_pin = headset.start().await.unwrap();
    let new_pin = headset.change_pin().await.unwrap();

    // The old document still exists (it is orphaned, not deleted), so
    // attaching to it works but never reaches the headset.
    if old_pin != new_pin {
        let issuer = Issuer::attach(store.clone(), old_pin).await.unwrap();
        assert_ne!(issuer.token(), headset.token().unwrap());
    }

    let unknown = Pin::parse("1000").unwrap();
    if unknown != new_pin && store.get(&Token::derive(&unknown)).await.unwrap().is_none() {
        let result = Issuer::attach(store, unknown).await;
        assert!(matches!(result, Err(SessionError::NotFound(_))));
    }
}

#[tokio::test]
async fn test_change_pin_failure_keeps_old_pin_and_subscription() {
    let store = FlakyStore::default();
    let pins = MemoryPinStorage::new();
    let mut headset = Pairing::new(store.clone(), pins.clone());
    let pin = headset.start().await.unwrap();
    headset.next_change().await.unwrap();

    store.refuse_creates.store(true, Ordering::SeqCst);
    let result = headset.change_pin().await;

    assert!(matches!(
        result,
        Err(SessionError::Store(StoreError::Disconnected))
    ));
    assert_eq!(headset.state(), PairingState::Subscribed);
    assert_eq!(headset.pin(), Some(&pin));
    assert_eq!(pins.current().await.as_deref(), Some(pin.as_str()));

    // The old document still reaches the headset.
    store
        .update(
            &Token::derive(&pin),
            &DocumentPatch::new().app(LinkState::Connected),
        )
        .await
        .unwrap();
    let doc = tokio::time::timeout(Duration::from_secs(1), headset.next_change())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(doc.app, LinkState::Connected);
}
