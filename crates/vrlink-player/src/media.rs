//! The seam between vrlink and a video element.
//!
//! The model is an HTML media element: a ready state that climbs as data
//! arrives, an asynchronous `play()` that the host may refuse (autoplay
//! policy), synchronous `pause()` and seek, and a stream of events.
//! Anything that decodes video can sit behind [`VideoElement`].

use std::fmt;
use std::future::Future;
use std::time::Duration;

/// How much media data the element has, in increasing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ReadyState {
    HaveNothing,
    HaveMetadata,
    HaveCurrentData,
    HaveFutureData,
    HaveEnoughData,
}

impl ReadyState {
    /// `true` once the current frame is available (`>= HaveCurrentData`).
    pub fn is_playable(self) -> bool {
        self >= Self::HaveCurrentData
    }
}

/// Events raised by the video element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaEvent {
    Play,
    Pause,
    Ended,
    /// The first frame is available.
    LoadedData,
    /// Loading failed; the message comes from the element.
    Error(String),
}

/// A failed media operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct MediaError(pub String);

/// Where the video comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaSource {
    /// A single progressive file (`.mp4`, `.webm`, ...).
    File(String),
    /// An adaptive streaming manifest (HLS `.m3u8` or DASH `.mpd`).
    Stream(String),
}

impl MediaSource {
    /// Classifies `url` by its extension, ignoring query and fragment.
    pub fn from_url(url: impl Into<String>) -> Self {
        let url = url.into();
        let path = url.split(['?', '#']).next().unwrap_or_default();
        let lower = path.to_ascii_lowercase();
        if lower.ends_with(".m3u8") || lower.ends_with(".mpd") {
            Self::Stream(url)
        } else {
            Self::File(url)
        }
    }

    pub fn url(&self) -> &str {
        match self {
            Self::File(url) | Self::Stream(url) => url,
        }
    }

    /// `true` for manifests that need a streaming client to play.
    pub fn is_adaptive(&self) -> bool {
        matches!(self, Self::Stream(_))
    }
}

impl fmt::Display for MediaSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.url())
    }
}

/// A video element the player and the immersive binder can drive.
///
/// Implementations use interior mutability; every method takes `&self` so
/// one element can be shared behind an `Arc`.
pub trait VideoElement: Send + Sync + 'static {
    fn ready_state(&self) -> ReadyState;

    fn is_paused(&self) -> bool;

    fn source(&self) -> &MediaSource;

    /// Starts playback. The host may refuse (for instance without a user
    /// gesture), which resolves with an error.
    fn play(&self) -> impl Future<Output = Result<(), MediaError>> + Send;

    fn pause(&self);

    fn seek(&self, position: Duration);

    /// Resolves once the element reaches [`ReadyState::HaveCurrentData`].
    fn wait_for_data(&self) -> impl Future<Output = Result<(), MediaError>> + Send;
}

/// Unlocks a freshly loaded element: play, pause, rewind.
///
/// Browsers only allow `play()` from inside a user gesture; calling it once
/// there lets later, remote-triggered calls through. The element is left
/// paused at the start either way; a refused `play()` is returned.
pub async fn prime<V: VideoElement>(video: &V) -> Result<(), MediaError> {
    let result = video.play().await;
    video.pause();
    video.seek(Duration::ZERO);
    if let Err(e) = &result {
        tracing::warn!(source = %video.source(), error = %e, "priming play() refused");
    }
    result
}
