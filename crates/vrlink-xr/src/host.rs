//! The seam to the XR runtime.
//!
//! Shaped after WebXR with the layers module: a system hands out sessions,
//! a session hands out reference spaces and media layers and paces frames.
//! A headset shell, a browser binding or a test fake implements these.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use vrlink_player::MediaSource;

use crate::{LayerSpec, XrError};

/// The kind of session to request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionMode {
    Inline,
    ImmersiveVr,
    ImmersiveAr,
}

impl fmt::Display for SessionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Inline => "inline",
            Self::ImmersiveVr => "immersive-vr",
            Self::ImmersiveAr => "immersive-ar",
        })
    }
}

/// Features asked for when requesting a session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionInit {
    pub required_features: Vec<String>,
    pub optional_features: Vec<String>,
}

impl SessionInit {
    /// Requests the `layers` feature optionally.
    pub fn with_layers() -> Self {
        Self {
            required_features: Vec::new(),
            optional_features: vec!["layers".to_string()],
        }
    }
}

/// Reference space types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferenceSpaceKind {
    Viewer,
    Local,
    LocalFloor,
    BoundedFloor,
    Unbounded,
}

impl fmt::Display for ReferenceSpaceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Viewer => "viewer",
            Self::Local => "local",
            Self::LocalFloor => "local-floor",
            Self::BoundedFloor => "bounded-floor",
            Self::Unbounded => "unbounded",
        })
    }
}

/// One animation frame delivered by the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XrFrame {
    /// When the frame is expected to reach the displays, relative to the
    /// session's time origin.
    pub predicted_display_time: Duration,
}

/// Entry point to the XR runtime.
pub trait XrSystem: Send + Sync + 'static {
    type Session: XrSession;

    fn is_session_supported(&self, mode: SessionMode) -> impl Future<Output = bool> + Send;

    fn request_session(
        &self,
        mode: SessionMode,
        init: &SessionInit,
    ) -> impl Future<Output = Result<Self::Session, XrError>> + Send;
}

/// A running XR session.
pub trait XrSession: Send + Sync + 'static {
    type Space: Send + Sync + 'static;
    type Layer: Send + Sync + 'static;

    fn request_reference_space(
        &self,
        kind: ReferenceSpaceKind,
    ) -> impl Future<Output = Result<Self::Space, XrError>> + Send;

    /// Creates a media layer that shows the video at `source` with the
    /// geometry in `spec`.
    fn create_video_layer(
        &self,
        space: &Self::Space,
        source: &MediaSource,
        spec: &LayerSpec,
    ) -> Result<Self::Layer, XrError>;

    /// Replaces the layers being composited.
    fn set_layers(&self, layers: &[Self::Layer]) -> Result<(), XrError>;

    /// Waits for the next frame. `None` means the host ended the session.
    fn next_frame(&self) -> impl Future<Output = Option<XrFrame>> + Send;

    /// Ends the session. Ending twice is harmless.
    fn end(&self) -> impl Future<Output = ()> + Send;
}
