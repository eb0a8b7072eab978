use super::{FrameSource, SourceKind};
use crate::error::SourceError;
use crate::frame::{Frame, RGB_BYTES_PER_PIXEL};
use async_trait::async_trait;
use gstreamer::prelude::*;
use gstreamer::Pipeline;
use gstreamer_app::AppSink;
use gstreamer_video::VideoInfo;
use std::time::{Duration, SystemTime};
use tracing::{debug, error, info, warn};

/// GStreamer decode pipeline for network streams and video files
pub struct GstSource {
    location: String,
    kind: SourceKind,
    pipeline: Pipeline,
    appsink: AppSink,
    read_timeout: Duration,
    next_id: u64,
    open: bool,
}

impl GstSource {
    /// Open and preroll a pipeline for `location`
    pub async fn open(
        location: &str,
        kind: SourceKind,
        read_timeout: Duration,
    ) -> Result<Self, SourceError> {
        let owned = location.to_string();
        tokio::task::spawn_blocking(move || Self::open_blocking(owned, kind, read_timeout))
            .await
            .map_err(|e| SourceError::open(location, format!("open task failed: {}", e)))?
    }

    fn open_blocking(
        location: String,
        kind: SourceKind,
        read_timeout: Duration,
    ) -> Result<Self, SourceError> {
        gstreamer::init().map_err(|e| {
            SourceError::open(&location, format!("Failed to initialize GStreamer: {}", e))
        })?;

        let pipeline_desc = build_pipeline_string(&location, kind);
        info!("Creating GStreamer pipeline: {}", pipeline_desc);

        let pipeline = gstreamer::parse::launch(&pipeline_desc)
            .map_err(|e| SourceError::open(&location, format!("Failed to create pipeline: {}", e)))?
            .downcast::<Pipeline>()
            .map_err(|_| SourceError::open(&location, "Failed to downcast to Pipeline"))?;

        let appsink = pipeline
            .by_name("sink")
            .ok_or_else(|| SourceError::open(&location, "Failed to get appsink element"))?
            .downcast::<AppSink>()
            .map_err(|_| SourceError::open(&location, "Failed to downcast to AppSink"))?;

        if let Err(e) = pipeline.set_state(gstreamer::State::Playing) {
            let _ = pipeline.set_state(gstreamer::State::Null);
            return Err(SourceError::open(
                &location,
                format!("Failed to start pipeline: {}", e),
            ));
        }

        let preroll_timeout = gstreamer::ClockTime::from_mseconds(read_timeout.as_millis() as u64);
        let (state_result, _, _) = pipeline.state(preroll_timeout);
        let bus_error = pipeline.bus().and_then(|bus| {
            bus.pop_filtered(&[gstreamer::MessageType::Error])
                .and_then(|msg| match msg.view() {
                    gstreamer::MessageView::Error(err) => Some(err.error().to_string()),
                    _ => None,
                })
        });

        if let Some(details) = bus_error {
            let _ = pipeline.set_state(gstreamer::State::Null);
            return Err(SourceError::open(&location, details));
        }
        if let Err(e) = state_result {
            let _ = pipeline.set_state(gstreamer::State::Null);
            return Err(SourceError::open(
                &location,
                format!("Pipeline failed to preroll: {}", e),
            ));
        }

        info!("GStreamer source opened: {} ({:?})", location, kind);

        Ok(Self {
            location,
            kind,
            pipeline,
            appsink,
            read_timeout,
            next_id: 0,
            open: true,
        })
    }

    fn sample_to_frame(&mut self, sample: gstreamer::Sample) -> Result<Frame, SourceError> {
        let caps = sample
            .caps()
            .ok_or_else(|| SourceError::read("sample has no caps"))?;
        let info = VideoInfo::from_caps(caps)
            .map_err(|e| SourceError::read(format!("unreadable video caps: {}", e)))?;
        let buffer = sample
            .buffer()
            .ok_or_else(|| SourceError::read("sample has no buffer"))?;
        let map = buffer
            .map_readable()
            .map_err(|e| SourceError::read(format!("failed to map buffer: {}", e)))?;

        let width = info.width();
        let height = info.height();
        let row_bytes = width as usize * RGB_BYTES_PER_PIXEL;
        let stride = info.stride()[0] as usize;
        let data = map.as_slice();

        // Rows may be padded; repack them tightly
        let mut packed = Vec::with_capacity(row_bytes * height as usize);
        for row in 0..height as usize {
            let start = row * stride;
            let end = start + row_bytes;
            let Some(slice) = data.get(start..end) else {
                return Err(SourceError::read(format!(
                    "buffer too small for {}x{} frame",
                    width, height
                )));
            };
            packed.extend_from_slice(slice);
        }

        let id = self.next_id;
        self.next_id += 1;
        Frame::from_rgb24(id, SystemTime::now(), width, height, packed)
    }
}

#[async_trait]
impl FrameSource for GstSource {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    fn location(&self) -> &str {
        &self.location
    }

    fn is_open(&self) -> bool {
        self.open
    }

    async fn read_frame(&mut self) -> Result<Frame, SourceError> {
        if !self.open {
            return Err(SourceError::read("source is closed"));
        }

        let appsink = self.appsink.clone();
        let timeout_ms = self.read_timeout.as_millis() as u64;
        let (sample, eos) = tokio::task::spawn_blocking(move || {
            let sample = appsink.try_pull_sample(gstreamer::ClockTime::from_mseconds(timeout_ms));
            let eos = sample.is_none() && appsink.is_eos();
            (sample, eos)
        })
        .await
        .map_err(|e| SourceError::read(format!("read task failed: {}", e)))?;

        match sample {
            Some(sample) => self.sample_to_frame(sample),
            None if eos => match self.kind {
                SourceKind::File => Err(SourceError::EndOfStream),
                _ => Err(SourceError::read("live stream ended")),
            },
            None => Err(SourceError::Timeout {
                timeout: self.read_timeout,
            }),
        }
    }

    async fn reset(&mut self) -> Result<(), SourceError> {
        if !self.open {
            return Err(SourceError::read("source is closed"));
        }

        match self.kind {
            SourceKind::File => {
                debug!("Seeking {} back to the start", self.location);
                self.pipeline
                    .seek_simple(
                        gstreamer::SeekFlags::FLUSH | gstreamer::SeekFlags::KEY_UNIT,
                        gstreamer::ClockTime::ZERO,
                    )
                    .map_err(|e| SourceError::read(format!("seek failed: {}", e)))
            }
            _ => {
                warn!("Restarting live pipeline for {}", self.location);
                let _ = self.pipeline.set_state(gstreamer::State::Null);
                self.pipeline
                    .set_state(gstreamer::State::Playing)
                    .map(|_| ())
                    .map_err(|e| SourceError::read(format!("restart failed: {}", e)))
            }
        }
    }

    async fn close(&mut self) {
        if self.open {
            self.open = false;
            if let Err(e) = self.pipeline.set_state(gstreamer::State::Null) {
                error!("Failed to stop pipeline for {}: {}", self.location, e);
            }
            debug!("Closed GStreamer source {}", self.location);
        }
    }
}

impl Drop for GstSource {
    fn drop(&mut self) {
        if self.open {
            let _ = self.pipeline.set_state(gstreamer::State::Null);
        }
    }
}

fn build_pipeline_string(location: &str, kind: SourceKind) -> String {
    let escaped = location.replace('"', "\\\"");
    match kind {
        SourceKind::Live => format!(
            "uridecodebin uri=\"{}\" ! \
             videoconvert ! \
             video/x-raw,format=RGB ! \
             appsink name=sink sync=false max-buffers=1 drop=true",
            escaped
        ),
        _ => format!(
            "filesrc location=\"{}\" ! \
             decodebin ! \
             videoconvert ! \
             video/x-raw,format=RGB ! \
             appsink name=sink sync=false max-buffers=2 drop=false",
            escaped
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_strings() {
        let live = build_pipeline_string("http://192.168.137.66:8080/video", SourceKind::Live);
        assert!(live.starts_with("uridecodebin uri=\"http://192.168.137.66:8080/video\""));
        assert!(live.contains("drop=true"));

        let file = build_pipeline_string("video1.mp4", SourceKind::File);
        assert!(file.starts_with("filesrc location=\"video1.mp4\""));
        assert!(file.contains("format=RGB"));
    }

    #[tokio::test]
    async fn test_missing_file_fails_to_open() {
        let result = GstSource::open(
            "/nonexistent/camwatch/video.mp4",
            SourceKind::File,
            Duration::from_millis(500),
        )
        .await;
        assert!(matches!(result, Err(SourceError::Open { .. })));
    }
}
