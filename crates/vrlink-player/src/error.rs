//! Error types for the playback side.

use vrlink_session::SessionError;
use vrlink_store::StoreError;

use crate::MediaError;

/// Errors surfaced by the player.
///
/// None of these end the player: they land in its error slot (see
/// [`PlayerStatus::last_error`](crate::PlayerStatus::last_error)) and are
/// logged.
#[derive(Debug, thiserror::Error)]
pub enum PlayerError {
    /// A command arrived before the user started playback locally.
    #[error("needs user interaction before playback can start")]
    NeedsInteraction,

    /// `PLAY` arrived before the video had buffered enough to start.
    #[error("video not ready to play")]
    NotReady,

    /// The video element refused an operation.
    #[error("playback error: {0}")]
    Media(#[from] MediaError),

    /// The video element reported a load failure.
    #[error("video load error: {0}")]
    Load(String),

    /// Writing to the session document failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Pairing failed.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The player actor has stopped.
    #[error("player is unavailable")]
    Unavailable,
}
