//! Binding a video element to an immersive session.

use std::slice;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::timeout;
use vrlink_player::{VideoElement, prime};

use crate::frame_loop::FrameExit;
use crate::{
    FrameLoopConfig, FrameLoopHandle, FrameMetrics, ReferenceSpaceKind, SessionInit, SessionMode,
    VideoProjection, XrError, XrSession, XrSystem,
};

/// Timeouts for entering a session, plus the frame loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BinderConfig {
    /// How long the host may take to grant the session.
    pub session_timeout: Duration,
    /// How long the host may take to provide the reference space.
    pub reference_space_timeout: Duration,
    /// How long the video may take to buffer its first frame.
    pub video_ready_timeout: Duration,
    pub frame_loop: FrameLoopConfig,
}

impl Default for BinderConfig {
    fn default() -> Self {
        Self {
            session_timeout: Duration::from_secs(10),
            reference_space_timeout: Duration::from_secs(5),
            video_ready_timeout: Duration::from_secs(15),
            frame_loop: FrameLoopConfig::default(),
        }
    }
}

/// Why an immersive session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    /// The host ended it (headset removed, system menu, ...).
    Host,
    /// [`ImmersiveSession::exit`] was called.
    Exited,
}

/// Enters immersive sessions on one XR system.
pub struct ImmersiveBinder<X> {
    system: X,
    config: BinderConfig,
}

impl<X: XrSystem> ImmersiveBinder<X> {
    pub fn new(system: X) -> Self {
        Self::with_config(system, BinderConfig::default())
    }

    pub fn with_config(system: X, config: BinderConfig) -> Self {
        Self { system, config }
    }

    /// Presents `video` with `projection` in a new `immersive-vr` session.
    ///
    /// # Errors
    /// - [`XrError::VideoNotReady`] if the video does not buffer in time
    /// - [`XrError::Unsupported`] / [`XrError::SessionTimeout`] if no
    ///   session is granted
    /// - [`XrError::ReferenceSpaceUnavailable`] / [`XrError::LayerCreation`]
    ///   after the session was ended again
    pub async fn enter<V: VideoElement>(
        &self,
        video: Arc<V>,
        projection: VideoProjection,
    ) -> Result<ImmersiveSession<X::Session, V>, XrError> {
        self.prepare_video(video.as_ref()).await?;

        let mode = SessionMode::ImmersiveVr;
        if !self.system.is_session_supported(mode).await {
            return Err(XrError::Unsupported(mode.to_string()));
        }
        let init = SessionInit::with_layers();
        let request = self.system.request_session(mode, &init);
        let session = match timeout(self.config.session_timeout, request).await {
            Ok(result) => Arc::new(result?),
            Err(_) => return Err(XrError::SessionTimeout(self.config.session_timeout)),
        };
        tracing::info!(%mode, projection = projection.id(), "immersive session granted");

        let kind = ReferenceSpaceKind::Local;
        let space = match timeout(
            self.config.reference_space_timeout,
            session.request_reference_space(kind),
        )
        .await
        {
            Ok(Ok(space)) => space,
            Ok(Err(e)) => {
                session.end().await;
                return Err(XrError::ReferenceSpaceUnavailable(e.to_string()));
            }
            Err(_) => {
                session.end().await;
                return Err(XrError::ReferenceSpaceUnavailable(format!(
                    "{kind} space not provided within {:?}",
                    self.config.reference_space_timeout
                )));
            }
        };

        let spec = projection.layer_spec();
        let layer = session
            .create_video_layer(&space, video.source(), &spec)
            .and_then(|layer| {
                session.set_layers(slice::from_ref(&layer))?;
                Ok(layer)
            });
        let layer = match layer {
            Ok(layer) => layer,
            Err(e) => {
                session.end().await;
                return Err(match e {
                    XrError::LayerCreation(_) => e,
                    other => XrError::LayerCreation(other.to_string()),
                });
            }
        };
        tracing::debug!(?spec, source = %video.source(), "video layer attached");

        let frames = FrameLoopHandle::spawn(Arc::clone(&session), self.config.frame_loop.clone());
        tracing::info!(projection = projection.id(), "immersive playback started");

        Ok(ImmersiveSession {
            session,
            video,
            projection,
            _layer: layer,
            frames: Some(frames),
            ended: None,
        })
    }

    /// Makes sure the video has a frame to show before the session starts.
    async fn prepare_video<V: VideoElement>(&self, video: &V) -> Result<(), XrError> {
        if video.ready_state().is_playable() {
            return Ok(());
        }
        tracing::debug!(
            source = %video.source(),
            adaptive = video.source().is_adaptive(),
            "waiting for video data"
        );
        // A refused play() only means the element stays paused; the wait
        // below decides whether we can go on.
        let _ = prime(video).await;

        match timeout(self.config.video_ready_timeout, video.wait_for_data()).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(XrError::VideoNotReady(self.config.video_ready_timeout)),
        }
    }
}

/// A running immersive presentation of one video.
///
/// Ends when the host ends the session (observe with
/// [`ended`](Self::ended)) or on [`exit`](Self::exit). Either way the
/// video is paused and the frame loop stops.
pub struct ImmersiveSession<S: XrSession, V> {
    session: Arc<S>,
    video: Arc<V>,
    projection: VideoProjection,
    _layer: S::Layer,
    frames: Option<FrameLoopHandle>,
    ended: Option<(EndReason, FrameMetrics)>,
}

impl<S: XrSession, V: VideoElement> ImmersiveSession<S, V> {
    pub fn projection(&self) -> VideoProjection {
        self.projection
    }

    /// Frame pacing so far.
    pub fn metrics(&self) -> FrameMetrics {
        match (&self.frames, &self.ended) {
            (_, Some((_, metrics))) => *metrics,
            (Some(frames), None) => frames.metrics(),
            (None, None) => FrameMetrics::default(),
        }
    }

    /// Resolves when the session ends. Safe to call again afterwards.
    pub async fn ended(&mut self) -> EndReason {
        if let Some((reason, _)) = self.ended {
            return reason;
        }
        let exit = match self.frames.as_mut() {
            Some(frames) => frames.finished().await,
            None => std::future::pending().await,
        };
        self.frames = None;
        self.finish(exit).await
    }

    /// Leaves the session: stops the frame loop, pauses the video and ends
    /// the XR session.
    pub async fn exit(mut self) -> FrameMetrics {
        if let Some((_, metrics)) = self.ended {
            return metrics;
        }
        let metrics = match self.frames.take() {
            Some(frames) => frames.cancel().await,
            None => FrameMetrics::default(),
        };
        self.finish(FrameExit {
            reason: EndReason::Exited,
            metrics,
        })
        .await;
        metrics
    }

    async fn finish(&mut self, exit: FrameExit) -> EndReason {
        self.video.pause();
        if exit.reason == EndReason::Exited {
            self.session.end().await;
        }
        tracing::info!(
            reason = ?exit.reason,
            frames = exit.metrics.total_frames,
            late = exit.metrics.late_frames,
            "immersive session ended"
        );
        self.ended = Some((exit.reason, exit.metrics));
        exit.reason
    }
}
