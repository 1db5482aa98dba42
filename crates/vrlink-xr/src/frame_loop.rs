//! The per-session frame loop.
//!
//! While an immersive session runs, something has to keep asking the host
//! for frames or the compositor stops presenting. The loop is a tokio task
//! tied to the session:
//!
//! - it ends on its own when the host ends the session (`next_frame`
//!   returns `None`),
//! - it ends when its [`FrameLoopHandle`] is cancelled or dropped.
//!
//! In both cases no frame is requested after the loop has returned.
//!
//! Frame pacing is the host's job. The loop only measures it: every frame
//! interval is compared with the expected one and late frames are counted
//! and logged.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use crate::{EndReason, XrSession};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Settings for the frame loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameLoopConfig {
    /// The display's refresh rate in Hz. Used only to judge lateness.
    pub refresh_rate_hz: u32,
    /// A frame interval longer than this many expected intervals counts as
    /// late. Default: 1.5.
    pub late_frame_threshold: f64,
    /// Publish metrics after every frame.
    pub metrics_enabled: bool,
}

impl Default for FrameLoopConfig {
    fn default() -> Self {
        Self {
            refresh_rate_hz: 72,
            late_frame_threshold: 1.5,
            metrics_enabled: true,
        }
    }
}

impl FrameLoopConfig {
    pub const MAX_REFRESH_RATE_HZ: u32 = 144;
    pub const MAX_LATE_FRAME_THRESHOLD: f64 = 10.0;

    /// Clamps out-of-range values.
    ///
    /// - `refresh_rate_hz` into `1..=MAX_REFRESH_RATE_HZ`
    /// - `late_frame_threshold` into `1.0..=MAX_LATE_FRAME_THRESHOLD`
    pub fn validated(mut self) -> Self {
        if self.refresh_rate_hz == 0 || self.refresh_rate_hz > Self::MAX_REFRESH_RATE_HZ {
            let clamped = self.refresh_rate_hz.clamp(1, Self::MAX_REFRESH_RATE_HZ);
            warn!(
                rate = self.refresh_rate_hz,
                clamped, "refresh_rate_hz out of range, clamping"
            );
            self.refresh_rate_hz = clamped;
        }
        if self.late_frame_threshold.is_nan() || self.late_frame_threshold < 1.0 {
            self.late_frame_threshold = 1.0;
        } else if self.late_frame_threshold > Self::MAX_LATE_FRAME_THRESHOLD {
            warn!(
                threshold = self.late_frame_threshold,
                "late_frame_threshold too large, clamping"
            );
            self.late_frame_threshold = Self::MAX_LATE_FRAME_THRESHOLD;
        }
        self
    }

    /// The interval between two frames at the configured refresh rate.
    pub fn expected_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.refresh_rate_hz.max(1)))
    }
}

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

/// Frame pacing as observed by the loop.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FrameMetrics {
    pub total_frames: u64,
    /// Frames whose interval exceeded the late threshold.
    pub late_frames: u64,
    /// Exponential moving average of the frame interval (α = 0.1).
    pub avg_frame_interval: Duration,
    pub max_frame_interval: Duration,
}

impl FrameMetrics {
    fn record_interval(&mut self, interval: Duration) {
        if interval > self.max_frame_interval {
            self.max_frame_interval = interval;
        }
        if self.avg_frame_interval.is_zero() {
            self.avg_frame_interval = interval;
        } else {
            let alpha = 0.1;
            let prev = self.avg_frame_interval.as_secs_f64();
            let curr = interval.as_secs_f64();
            self.avg_frame_interval = Duration::from_secs_f64(prev * (1.0 - alpha) + curr * alpha);
        }
    }
}

/// How the loop finished.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct FrameExit {
    pub(crate) reason: EndReason,
    pub(crate) metrics: FrameMetrics,
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Owns a running frame loop.
///
/// Cancelling takes the handle by value, so a loop is cancelled at most
/// once. Dropping the handle cancels it too.
pub struct FrameLoopHandle {
    stop: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<FrameExit>>,
    metrics: watch::Receiver<FrameMetrics>,
}

impl FrameLoopHandle {
    /// Starts requesting frames from `session`.
    pub fn spawn<S: XrSession>(session: Arc<S>, config: FrameLoopConfig) -> Self {
        let config = config.validated();
        let (stop_tx, stop_rx) = oneshot::channel();
        let (metrics_tx, metrics_rx) = watch::channel(FrameMetrics::default());

        debug!(
            rate_hz = config.refresh_rate_hz,
            expected_ms = config.expected_interval().as_secs_f64() * 1000.0,
            "frame loop starting"
        );
        let task = tokio::spawn(run(session, config, stop_rx, metrics_tx));

        Self {
            stop: Some(stop_tx),
            task: Some(task),
            metrics: metrics_rx,
        }
    }

    /// The most recently published metrics.
    pub fn metrics(&self) -> FrameMetrics {
        *self.metrics.borrow()
    }

    /// `true` once the loop has returned.
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Stops the loop and waits for it to return. No frame is requested
    /// after this resolves.
    pub async fn cancel(mut self) -> FrameMetrics {
        self.stop.take();
        self.join().await.metrics
    }

    /// Waits for the loop to return on its own (host ended the session).
    pub(crate) async fn finished(&mut self) -> FrameExit {
        self.join().await
    }

    async fn join(&mut self) -> FrameExit {
        let Some(task) = self.task.take() else {
            return FrameExit {
                reason: EndReason::Exited,
                metrics: self.metrics(),
            };
        };
        match task.await {
            Ok(exit) => exit,
            Err(e) => {
                warn!(error = %e, "frame loop task failed");
                FrameExit {
                    reason: EndReason::Host,
                    metrics: self.metrics(),
                }
            }
        }
    }
}

impl Drop for FrameLoopHandle {
    fn drop(&mut self) {
        // Dropping the sender is the cancellation signal.
        self.stop.take();
    }
}

// ---------------------------------------------------------------------------
// Loop
// ---------------------------------------------------------------------------

async fn run<S: XrSession>(
    session: Arc<S>,
    config: FrameLoopConfig,
    mut stop: oneshot::Receiver<()>,
    metrics_tx: watch::Sender<FrameMetrics>,
) -> FrameExit {
    let expected = config.expected_interval();
    let late_after = expected.mul_f64(config.late_frame_threshold);
    let mut metrics = FrameMetrics::default();
    let mut last_frame: Option<Instant> = None;

    let reason = loop {
        let frame = tokio::select! {
            biased;
            // Resolves on send and on drop of the sender alike.
            _ = &mut stop => {
                debug!(frames = metrics.total_frames, "frame loop cancelled");
                break EndReason::Exited;
            }
            frame = session.next_frame() => frame,
        };
        let Some(frame) = frame else {
            info!(frames = metrics.total_frames, "host ended the session");
            break EndReason::Host;
        };

        let now = Instant::now();
        if let Some(prev) = last_frame {
            let interval = now.saturating_duration_since(prev);
            metrics.record_interval(interval);
            if interval > late_after {
                metrics.late_frames += 1;
                warn!(
                    frame = metrics.total_frames + 1,
                    interval_ms = interval.as_secs_f64() * 1000.0,
                    expected_ms = expected.as_secs_f64() * 1000.0,
                    "late frame"
                );
            }
        }
        last_frame = Some(now);
        metrics.total_frames += 1;
        trace!(
            frame = metrics.total_frames,
            display_time = ?frame.predicted_display_time,
            "frame"
        );

        if config.metrics_enabled {
            metrics_tx.send_replace(metrics);
        }
    };

    metrics_tx.send_replace(metrics);
    FrameExit { reason, metrics }
}
