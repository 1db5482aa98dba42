//! Player actor against a fake video element and an in-memory store.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Notify;
use vrlink_player::{
    MediaError, MediaEvent, MediaSource, PlayerConfig, PlayerError, PlayerHandle, ReadyState,
    VideoElement, spawn_player,
};
use vrlink_protocol::{
    DocumentPatch, LinkState, PlaybackCommand, PlaybackState, SessionDocument, Token,
};
use vrlink_session::{Issuer, MemoryPinStorage, Pairing, PairingState};
use vrlink_store::{MemoryStore, SessionStore, StoreError, Subscription};

// ---------------------------------------------------------------------------
// FakeVideo
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct FakeState {
    ready: ReadyState,
    paused: bool,
    position: Duration,
    play_calls: usize,
    refuse_play: bool,
    hold_play: bool,
}

struct FakeVideo {
    source: MediaSource,
    state: Mutex<FakeState>,
    data: Notify,
    play_release: Notify,
}

impl FakeVideo {
    fn new(ready: ReadyState) -> Arc<Self> {
        Arc::new(Self {
            source: MediaSource::from_url("/videos/demo.mp4"),
            state: Mutex::new(FakeState {
                ready,
                paused: true,
                position: Duration::from_secs(12),
                play_calls: 0,
                refuse_play: false,
                hold_play: false,
            }),
            data: Notify::new(),
            play_release: Notify::new(),
        })
    }

    fn play_calls(&self) -> usize {
        self.state.lock().unwrap().play_calls
    }

    fn position(&self) -> Duration {
        self.state.lock().unwrap().position
    }

    fn set_ready(&self, ready: ReadyState) {
        self.state.lock().unwrap().ready = ready;
        self.data.notify_waiters();
    }

    fn refuse_play(&self, refuse: bool) {
        self.state.lock().unwrap().refuse_play = refuse;
    }

    /// Makes the next play() calls wait for [`release_play`](Self::release_play).
    fn hold_play(&self) {
        self.state.lock().unwrap().hold_play = true;
    }

    fn release_play(&self) {
        self.state.lock().unwrap().hold_play = false;
        self.play_release.notify_one();
    }
}

impl VideoElement for FakeVideo {
    fn ready_state(&self) -> ReadyState {
        self.state.lock().unwrap().ready
    }

    fn is_paused(&self) -> bool {
        self.state.lock().unwrap().paused
    }

    fn source(&self) -> &MediaSource {
        &self.source
    }

    async fn play(&self) -> Result<(), MediaError> {
        let held = {
            let mut state = self.state.lock().unwrap();
            state.play_calls += 1;
            state.hold_play
        };
        if held {
            self.play_release.notified().await;
        }

        let mut state = self.state.lock().unwrap();
        if state.refuse_play {
            return Err(MediaError("NotAllowedError: play() refused".into()));
        }
        state.paused = false;
        Ok(())
    }

    fn pause(&self) {
        self.state.lock().unwrap().paused = true;
    }

    fn seek(&self, position: Duration) {
        self.state.lock().unwrap().position = position;
    }

    async fn wait_for_data(&self) -> Result<(), MediaError> {
        loop {
            let notified = self.data.notified();
            if self.ready_state().is_playable() {
                return Ok(());
            }
            notified.await;
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

struct Fixture {
    store: MemoryStore,
    video: Arc<FakeVideo>,
    player: PlayerHandle,
    issuer: Issuer<MemoryStore>,
}

impl Fixture {
    async fn new(ready: ReadyState) -> Self {
        let store = MemoryStore::new();
        let video = FakeVideo::new(ready);
        let pairing = Pairing::new(store.clone(), MemoryPinStorage::new());
        let player = spawn_player(pairing, Arc::clone(&video), PlayerConfig::default())
            .await
            .unwrap();

        let pin = player.status().await.unwrap().pin.unwrap();
        let issuer = Issuer::attach(store.clone(), pin).await.unwrap();
        Self {
            store,
            video,
            player,
            issuer,
        }
    }

    async fn doc(&self) -> SessionDocument {
        self.store.get(self.issuer.token()).await.unwrap().unwrap()
    }
}

/// A memory store that can be told to refuse `player` presence writes.
#[derive(Clone, Default)]
struct FlakyStore {
    inner: MemoryStore,
    refuse_presence: Arc<AtomicBool>,
}

impl SessionStore for FlakyStore {
    async fn create(&self, token: &Token, doc: &SessionDocument) -> Result<(), StoreError> {
        self.inner.create(token, doc).await
    }

    async fn update(&self, token: &Token, patch: &DocumentPatch) -> Result<(), StoreError> {
        if patch.player.is_some() && self.refuse_presence.load(Ordering::SeqCst) {
            return Err(StoreError::Timeout(Duration::from_secs(10)));
        }
        self.inner.update(token, patch).await
    }

    async fn get(&self, token: &Token) -> Result<Option<SessionDocument>, StoreError> {
        self.inner.get(token).await
    }

    async fn subscribe(&self, token: &Token) -> Result<Subscription, StoreError> {
        self.inner.subscribe(token).await
    }
}

/// Gives the actor time to observe store changes that nobody waits on.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

const ACK_TIMEOUT: Duration = Duration::from_secs(2);

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_spawn_player_subscribes_and_exposes_pin() {
    let fx = Fixture::new(ReadyState::HaveEnoughData).await;
    let status = fx.player.status().await.unwrap();

    assert_eq!(status.pairing, PairingState::Subscribed);
    assert_eq!(status.token.as_ref(), Some(fx.issuer.token()));
    assert_eq!(status.state, PlaybackState::Initial);
    assert!(!status.user_interacted);
    assert_eq!(fx.doc().await.player, LinkState::Pending);
}

#[tokio::test]
async fn test_play_after_user_start_acks_and_reports_playing() {
    let mut fx = Fixture::new(ReadyState::HaveEnoughData).await;
    fx.player.user_start().await.unwrap();
    assert_eq!(fx.doc().await.player, LinkState::Connected);

    let seq = fx.issuer.send(PlaybackCommand::Play).await.unwrap();
    let doc = fx.issuer.wait_for_ack(seq, ACK_TIMEOUT).await.unwrap();

    assert_eq!(doc.command, PlaybackCommand::Proceeded);
    assert_eq!(doc.state, PlaybackState::Playing);
    assert!(!fx.video.is_paused());
    // One priming call from the user start, one for the command.
    assert_eq!(fx.video.play_calls(), 2);

    let status = fx.player.status().await.unwrap();
    assert_eq!(status.state, PlaybackState::Playing);
    assert_eq!(status.last_handled_seq, Some(seq));
    assert!(status.last_error.is_none());
}

#[tokio::test]
async fn test_redelivered_play_does_not_start_twice() {
    let mut fx = Fixture::new(ReadyState::HaveEnoughData).await;
    fx.player.user_start().await.unwrap();
    let seq = fx.issuer.send(PlaybackCommand::Play).await.unwrap();
    fx.issuer.wait_for_ack(seq, ACK_TIMEOUT).await.unwrap();

    // A stale copy of the document, as if the store delivered it again.
    fx.store
        .update(
            fx.issuer.token(),
            &DocumentPatch::new()
                .command(PlaybackCommand::Play)
                .command_seq(seq)
                .ack_seq(seq - 1),
        )
        .await
        .unwrap();
    settle().await;

    assert_eq!(fx.video.play_calls(), 2);
    let doc = fx.doc().await;
    assert_eq!(doc.command, PlaybackCommand::Play, "duplicate is not re-acked");
}

#[tokio::test]
async fn test_second_play_while_playing_acks_without_calling_play() {
    let mut fx = Fixture::new(ReadyState::HaveEnoughData).await;
    fx.player.user_start().await.unwrap();
    let first = fx.issuer.send(PlaybackCommand::Play).await.unwrap();
    fx.issuer.wait_for_ack(first, ACK_TIMEOUT).await.unwrap();

    let second = fx.issuer.send(PlaybackCommand::Play).await.unwrap();
    let doc = fx.issuer.wait_for_ack(second, ACK_TIMEOUT).await.unwrap();

    assert_eq!(second, first + 1);
    assert_eq!(doc.state, PlaybackState::Playing);
    assert_eq!(fx.video.play_calls(), 2);
}

#[tokio::test]
async fn test_command_written_while_play_pending_runs_after_it() {
    let mut fx = Fixture::new(ReadyState::HaveEnoughData).await;
    fx.player.user_start().await.unwrap();
    fx.video.hold_play();

    let play = fx.issuer.send(PlaybackCommand::Play).await.unwrap();
    settle().await;
    assert_eq!(fx.video.play_calls(), 2, "play() is in flight");
    let pause = fx.issuer.send(PlaybackCommand::Pause).await.unwrap();
    fx.video.release_play();

    let doc = fx.issuer.wait_for_ack(pause, ACK_TIMEOUT).await.unwrap();

    assert_eq!(pause, play + 1);
    assert_eq!(doc.command, PlaybackCommand::Proceeded);
    assert_eq!(doc.command_seq, pause);
    assert_eq!(doc.ack_seq, pause);
    assert_eq!(doc.state, PlaybackState::Paused);
    assert!(fx.video.is_paused());
    let status = fx.player.status().await.unwrap();
    assert_eq!(status.last_handled_seq, Some(pause));
}

#[tokio::test]
async fn test_failed_presence_write_still_releases_deferred_command() {
    let store = FlakyStore::default();
    let video = FakeVideo::new(ReadyState::HaveEnoughData);
    let pairing = Pairing::new(store.clone(), MemoryPinStorage::new());
    let player = spawn_player(pairing, Arc::clone(&video), PlayerConfig::default())
        .await
        .unwrap();
    let pin = player.status().await.unwrap().pin.unwrap();
    let mut issuer = Issuer::attach(store.inner.clone(), pin).await.unwrap();

    let seq = issuer.send(PlaybackCommand::Play).await.unwrap();
    settle().await;
    store.refuse_presence.store(true, Ordering::SeqCst);

    player.user_start().await.unwrap();

    let doc = issuer.wait_for_ack(seq, ACK_TIMEOUT).await.unwrap();
    assert_eq!(doc.state, PlaybackState::Playing);
    assert_eq!(doc.player, LinkState::Pending);
    let status = player.status().await.unwrap();
    assert!(status.user_interacted);
    assert!(status.last_error.unwrap().contains("timed out"));
}

#[tokio::test]
async fn test_command_before_user_start_is_deferred() {
    let mut fx = Fixture::new(ReadyState::HaveEnoughData).await;

    let seq = fx.issuer.send(PlaybackCommand::Play).await.unwrap();
    settle().await;

    let doc = fx.doc().await;
    assert_eq!(doc.command, PlaybackCommand::Play);
    assert_eq!(doc.ack_seq, 0);
    assert_eq!(doc.state, PlaybackState::Initial);
    assert_eq!(fx.video.play_calls(), 0);
    let status = fx.player.status().await.unwrap();
    assert!(status.last_error.unwrap().contains("user interaction"));

    // The gesture releases the pending command.
    fx.player.user_start().await.unwrap();
    let doc = fx.issuer.wait_for_ack(seq, ACK_TIMEOUT).await.unwrap();
    assert_eq!(doc.state, PlaybackState::Playing);
    assert!(fx.player.status().await.unwrap().last_error.is_none());
}

#[tokio::test]
async fn test_play_not_buffered_retries_on_loaded_data() {
    let mut fx = Fixture::new(ReadyState::HaveMetadata).await;
    fx.player.user_start().await.unwrap();

    let seq = fx.issuer.send(PlaybackCommand::Play).await.unwrap();
    settle().await;

    assert_eq!(fx.doc().await.ack_seq, 0);
    let status = fx.player.status().await.unwrap();
    assert!(status.last_error.unwrap().contains("not ready"));

    fx.video.set_ready(ReadyState::HaveEnoughData);
    fx.player.media_event(MediaEvent::LoadedData).await.unwrap();

    let doc = fx.issuer.wait_for_ack(seq, ACK_TIMEOUT).await.unwrap();
    assert_eq!(doc.state, PlaybackState::Playing);
}

#[tokio::test]
async fn test_refused_play_acks_without_state_change() {
    let mut fx = Fixture::new(ReadyState::HaveEnoughData).await;
    fx.player.user_start().await.unwrap();
    fx.video.refuse_play(true);

    let seq = fx.issuer.send(PlaybackCommand::Play).await.unwrap();
    let doc = fx.issuer.wait_for_ack(seq, ACK_TIMEOUT).await.unwrap();

    assert_eq!(doc.command, PlaybackCommand::Proceeded);
    assert_eq!(doc.state, PlaybackState::Initial);
    let status = fx.player.status().await.unwrap();
    assert!(status.last_error.unwrap().contains("NotAllowedError"));
}

#[tokio::test]
async fn test_stop_pauses_rewinds_and_survives_pause_event() {
    let mut fx = Fixture::new(ReadyState::HaveEnoughData).await;
    fx.player.user_start().await.unwrap();
    let seq = fx.issuer.send(PlaybackCommand::Play).await.unwrap();
    fx.issuer.wait_for_ack(seq, ACK_TIMEOUT).await.unwrap();
    fx.video.seek(Duration::from_secs(30));

    let seq = fx.issuer.send(PlaybackCommand::Stop).await.unwrap();
    let doc = fx.issuer.wait_for_ack(seq, ACK_TIMEOUT).await.unwrap();
    assert_eq!(doc.state, PlaybackState::Stopped);
    assert!(fx.video.is_paused());
    assert_eq!(fx.video.position(), Duration::ZERO);

    // The element reports the pause it just performed.
    fx.player.media_event(MediaEvent::Pause).await.unwrap();
    fx.player.status().await.unwrap();
    assert_eq!(fx.doc().await.state, PlaybackState::Stopped);
}

#[tokio::test]
async fn test_pause_command_reports_paused() {
    let mut fx = Fixture::new(ReadyState::HaveEnoughData).await;
    fx.player.user_start().await.unwrap();
    let seq = fx.issuer.send(PlaybackCommand::Play).await.unwrap();
    fx.issuer.wait_for_ack(seq, ACK_TIMEOUT).await.unwrap();

    let seq = fx.issuer.send(PlaybackCommand::Pause).await.unwrap();
    let doc = fx.issuer.wait_for_ack(seq, ACK_TIMEOUT).await.unwrap();

    assert_eq!(doc.state, PlaybackState::Paused);
    assert!(fx.video.is_paused());
}

#[tokio::test]
async fn test_media_events_write_state_back() {
    let fx = Fixture::new(ReadyState::HaveEnoughData).await;

    fx.player.media_event(MediaEvent::Play).await.unwrap();
    fx.player.status().await.unwrap();
    assert_eq!(fx.doc().await.state, PlaybackState::Playing);

    fx.player.media_event(MediaEvent::Pause).await.unwrap();
    fx.player.status().await.unwrap();
    assert_eq!(fx.doc().await.state, PlaybackState::Paused);

    fx.player.media_event(MediaEvent::Ended).await.unwrap();
    let status = fx.player.status().await.unwrap();
    assert_eq!(status.state, PlaybackState::Ended);
    assert_eq!(fx.doc().await.state, PlaybackState::Ended);
}

#[tokio::test]
async fn test_media_error_fills_slot_and_loaded_data_clears_it() {
    let fx = Fixture::new(ReadyState::HaveNothing).await;

    fx.player
        .media_event(MediaEvent::Error("MEDIA_ERR_NETWORK".into()))
        .await
        .unwrap();
    let status = fx.player.status().await.unwrap();
    assert!(status.last_error.unwrap().contains("MEDIA_ERR_NETWORK"));

    fx.player.media_event(MediaEvent::LoadedData).await.unwrap();
    let status = fx.player.status().await.unwrap();
    assert!(status.last_error.is_none());
}

#[tokio::test]
async fn test_change_pin_ignores_commands_on_old_document() {
    let fx = Fixture::new(ReadyState::HaveEnoughData).await;
    fx.player.user_start().await.unwrap();
    let old_token = fx.issuer.token().clone();

    let new_pin = fx.player.change_pin().await.unwrap();
    let new_token = Token::derive(&new_pin);
    if new_token == old_token {
        // Drew the same pin again; nothing to compare.
        return;
    }

    fx.store
        .update(
            &old_token,
            &DocumentPatch::new()
                .command(PlaybackCommand::Play)
                .command_seq(1),
        )
        .await
        .unwrap();
    settle().await;

    // Only the priming call from user_start.
    assert_eq!(fx.video.play_calls(), 1);
    let old = fx.store.get(&old_token).await.unwrap().unwrap();
    assert_eq!(old.command, PlaybackCommand::Play);

    let status = fx.player.status().await.unwrap();
    assert_eq!(status.token, Some(new_token.clone()));
    assert_eq!(status.last_handled_seq, None);
    let new = fx.store.get(&new_token).await.unwrap().unwrap();
    assert_eq!(new.player, LinkState::Connected);
}

#[tokio::test]
async fn test_shutdown_writes_disconnected_and_stops_actor() {
    let fx = Fixture::new(ReadyState::HaveEnoughData).await;
    fx.player.user_start().await.unwrap();

    fx.player.shutdown().await.unwrap();
    assert_eq!(fx.doc().await.player, LinkState::Disconnected);

    fx.store
        .update(
            fx.issuer.token(),
            &DocumentPatch::new()
                .command(PlaybackCommand::Play)
                .command_seq(1),
        )
        .await
        .unwrap();
    settle().await;
    assert_eq!(fx.video.play_calls(), 1);

    let result = fx.player.status().await;
    assert!(matches!(result, Err(PlayerError::Unavailable)));
}
