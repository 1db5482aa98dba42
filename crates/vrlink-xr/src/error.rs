//! Error types for immersive playback.

use std::time::Duration;

use vrlink_player::MediaError;

/// Errors that can occur while entering or running an immersive session.
#[derive(Debug, thiserror::Error)]
pub enum XrError {
    /// The host cannot run the requested session mode.
    #[error("{0} sessions are not supported")]
    Unsupported(String),

    /// The host refused the session request.
    #[error("session request rejected: {0}")]
    SessionRejected(String),

    /// The session request did not settle in time.
    #[error("session request timed out after {0:?}")]
    SessionTimeout(Duration),

    /// The reference space could not be obtained.
    #[error("reference space unavailable: {0}")]
    ReferenceSpaceUnavailable(String),

    /// The projected video layer could not be created or attached.
    #[error("layer creation failed: {0}")]
    LayerCreation(String),

    /// The video did not reach a playable state in time.
    #[error("video not ready after {0:?}")]
    VideoNotReady(Duration),

    /// The video element failed while being prepared.
    #[error(transparent)]
    Media(#[from] MediaError),

    /// No projection has this identifier.
    #[error("unknown projection: {0}")]
    UnknownProjection(String),
}
