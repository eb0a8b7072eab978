mod dummy;
#[cfg(all(feature = "camera", target_os = "linux"))]
mod gst;
mod opener;
mod sequence;
#[cfg(test)]
mod tests;

pub use dummy::{DummySource, DummyStyle};
#[cfg(all(feature = "camera", target_os = "linux"))]
pub use gst::GstSource;
pub use opener::{DefaultSourceOpener, SourceOpener};
pub use sequence::SequenceSource;

use crate::error::SourceError;
use crate::frame::Frame;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// What sits behind a camera location
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Network stream; never legitimately ends
    Live,
    /// Local video file or image sequence; loops via reset
    File,
    /// Synthesized placeholder, never read physically
    Dummy,
}

impl SourceKind {
    /// Classify a location string
    pub fn classify(location: &str) -> Self {
        let location = location.trim();
        if location.is_empty() || location.eq_ignore_ascii_case("dummy") {
            SourceKind::Dummy
        } else if location.contains("://") {
            SourceKind::Live
        } else {
            SourceKind::File
        }
    }
}

/// A physical frame source owned by exactly one consumer.
///
/// Reads yield [`SourceError::EndOfStream`] when a file source runs out, and
/// any other error is a read failure the caller may retry after a backoff.
#[async_trait]
pub trait FrameSource: Send {
    fn kind(&self) -> SourceKind;

    fn location(&self) -> &str;

    fn is_open(&self) -> bool;

    /// Read the next frame
    async fn read_frame(&mut self) -> Result<Frame, SourceError>;

    /// Rewind to the first frame (reconnect, for live sources)
    async fn reset(&mut self) -> Result<(), SourceError>;

    /// Release the underlying handle; further reads fail
    async fn close(&mut self);
}
