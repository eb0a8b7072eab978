use super::encode::encode_jpeg;
use super::stats::StreamStats;
use crate::camera_id::CameraId;
use crate::config::StreamConfig;
use crate::frame::Frame;
use crate::source::{DummySource, DummyStyle, FrameSource, SourceOpener};
use bytes::Bytes;
use futures::stream::BoxStream;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Endless sequence of JPEG images for one viewer
pub type FrameStream = BoxStream<'static, Bytes>;

/// What a viewer stream reads from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamTarget {
    /// Synthesized frames only
    Placeholder,
    /// A physical source opened privately for this viewer
    Source { location: String },
}

/// Everything a viewer stream needs besides its camera
#[derive(Clone)]
pub struct StreamerContext {
    pub opener: Arc<dyn SourceOpener>,
    pub dummy_style: Arc<DummyStyle>,
    pub config: StreamConfig,
    /// Wait between attempts to (re)open a source that failed
    pub reopen_backoff: Duration,
    pub stats: Arc<StreamStats>,
}

impl StreamerContext {
    pub fn streamer(
        &self,
        camera_id: CameraId,
        target: StreamTarget,
        cancel: CancellationToken,
    ) -> FrameStreamer {
        FrameStreamer {
            camera_id,
            target,
            context: self.clone(),
            cancel,
            session: Uuid::new_v4(),
        }
    }
}

/// Per-viewer frame generator.
///
/// Each viewer owns an independent source handle, so viewers never move each
/// other's read position. Read failures are handled by rewinding and retrying
/// inside the same step; while no handle can be opened, placeholder frames keep
/// the stream alive.
pub struct FrameStreamer {
    camera_id: CameraId,
    target: StreamTarget,
    context: StreamerContext,
    cancel: CancellationToken,
    session: Uuid,
}

impl FrameStreamer {
    pub fn camera_id(&self) -> &CameraId {
        &self.camera_id
    }

    pub fn session(&self) -> Uuid {
        self.session
    }

    pub fn target(&self) -> &StreamTarget {
        &self.target
    }

    /// Turn the streamer into a paced stream of JPEG buffers.
    ///
    /// The stream only ends when it is dropped or its cancellation token fires.
    pub fn into_stream(self) -> FrameStream {
        let FrameStreamer {
            camera_id,
            target,
            context,
            cancel,
            session,
        } = self;

        Box::pin(async_stream::stream! {
            let _viewer = ViewerGuard::connect(Arc::clone(&context.stats), &camera_id, session);
            let dummy = DummySource::new(camera_id.clone(), Arc::clone(&context.dummy_style));
            let mut feed = SourceFeed::new(&camera_id, target, &context);
            let quality = context.config.jpeg_quality;

            let mut pacing = interval(context.config.frame_interval());
            pacing.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    _ = pacing.tick() => {}
                }

                let captured = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    captured = feed.next_frame() => captured,
                };

                let placeholder = captured.is_none();
                let frame = captured.unwrap_or_else(|| dummy.synthesize());

                match encode_jpeg(&frame, quality) {
                    Ok(jpeg) => {
                        context.stats.record_frame(jpeg.len(), placeholder);
                        yield jpeg;
                    }
                    Err(e) => {
                        warn!("Viewer {} of camera {} skipped a frame: {}", session, camera_id, e);
                        context.stats.record_encode_error();
                    }
                }
            }

            feed.close().await;
            debug!("Viewer {} of camera {} stream ended", session, camera_id);
        })
    }
}

/// Private source handle of one viewer, reopened after failures
struct SourceFeed {
    camera_id: CameraId,
    location: Option<String>,
    opener: Arc<dyn SourceOpener>,
    backoff: Duration,
    source: Option<Box<dyn FrameSource>>,
    retry_at: Option<Instant>,
}

impl SourceFeed {
    fn new(camera_id: &CameraId, target: StreamTarget, context: &StreamerContext) -> Self {
        let location = match target {
            StreamTarget::Placeholder => None,
            StreamTarget::Source { location } => Some(location),
        };

        Self {
            camera_id: camera_id.clone(),
            location,
            opener: Arc::clone(&context.opener),
            backoff: context.reopen_backoff,
            source: None,
            retry_at: None,
        }
    }

    /// Next real frame, or `None` when a placeholder should be shown instead
    async fn next_frame(&mut self) -> Option<Frame> {
        let location = self.location.clone()?;

        if self.source.is_none() {
            if matches!(self.retry_at, Some(at) if Instant::now() < at) {
                return None;
            }
            match self.opener.open(&location).await {
                Ok(source) => {
                    debug!("Viewer source for camera {} opened", self.camera_id);
                    self.source = Some(source);
                    self.retry_at = None;
                }
                Err(e) => {
                    warn!(
                        "Camera {} stream could not open {}: {}, showing placeholder",
                        self.camera_id, location, e
                    );
                    self.retry_at = Some(Instant::now() + self.backoff);
                    return None;
                }
            }
        }

        let source = self.source.as_mut()?;
        let failure = match source.read_frame().await {
            Ok(frame) => return Some(frame),
            Err(e) => e,
        };

        debug!(
            "Camera {} stream read ended ({}), rewinding",
            self.camera_id, failure
        );
        let retried = match source.reset().await {
            Ok(()) => source.read_frame().await,
            Err(e) => Err(e),
        };

        match retried {
            Ok(frame) => Some(frame),
            Err(e) => {
                warn!(
                    "Camera {} stream lost its source: {}, retrying in {:?}",
                    self.camera_id, e, self.backoff
                );
                self.close().await;
                self.retry_at = Some(Instant::now() + self.backoff);
                None
            }
        }
    }

    async fn close(&mut self) {
        if let Some(mut source) = self.source.take() {
            source.close().await;
        }
    }
}

/// Keeps the active-viewer count honest however the stream ends
struct ViewerGuard {
    stats: Arc<StreamStats>,
    camera_id: CameraId,
    session: Uuid,
}

impl ViewerGuard {
    fn connect(stats: Arc<StreamStats>, camera_id: &CameraId, session: Uuid) -> Self {
        stats.viewer_connected();
        info!("Viewer {} connected to camera {}", session, camera_id);
        Self {
            stats,
            camera_id: camera_id.clone(),
            session,
        }
    }
}

impl Drop for ViewerGuard {
    fn drop(&mut self) {
        self.stats.viewer_disconnected();
        info!(
            "Viewer {} disconnected from camera {}",
            self.session, self.camera_id
        );
    }
}
