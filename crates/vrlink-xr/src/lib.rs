//! Immersive playback for vrlink.
//!
//! Puts a video element onto a projected layer inside an immersive VR
//! session and keeps the session's frame loop running until either side
//! ends it.
//!
//! # Entering
//!
//! ```text
//! ImmersiveBinder::enter(video, projection)
//!   1. video ready?      prime + wait_for_data    (video_ready_timeout)
//!   2. immersive-vr      XrSystem::request_session (session_timeout)
//!   3. "local" space     request_reference_space   (reference_space_timeout)
//!   4. projected layer   create_video_layer + set_layers
//!   5. frame loop        FrameLoopHandle::spawn
//! ```
//!
//! A failure after step 2 ends the XR session before the error is
//! returned.

mod binder;
mod catalog;
mod error;
mod frame_loop;
mod host;

pub use binder::{BinderConfig, EndReason, ImmersiveBinder, ImmersiveSession};
pub use catalog::{LayerSpec, Layout, VideoProjection};
pub use error::XrError;
pub use frame_loop::{FrameLoopConfig, FrameLoopHandle, FrameMetrics};
pub use host::{ReferenceSpaceKind, SessionInit, SessionMode, XrFrame, XrSession, XrSystem};
