use super::{FrameSource, SequenceSource, SourceKind};
use crate::error::SourceError;
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Opens a physical source for a location string
#[async_trait]
pub trait SourceOpener: Send + Sync {
    async fn open(&self, location: &str) -> Result<Box<dyn FrameSource>, SourceError>;
}

/// Opener used by the application: image directories natively, video files and
/// network streams through GStreamer when the `camera` feature is enabled
#[derive(Debug, Clone)]
pub struct DefaultSourceOpener {
    read_timeout: Duration,
}

impl DefaultSourceOpener {
    pub fn new(read_timeout: Duration) -> Self {
        Self { read_timeout }
    }

    #[cfg(all(feature = "camera", target_os = "linux"))]
    async fn open_media(
        &self,
        location: &str,
        kind: SourceKind,
    ) -> Result<Box<dyn FrameSource>, SourceError> {
        let source = super::GstSource::open(location, kind, self.read_timeout).await?;
        Ok(Box::new(source))
    }

    #[cfg(not(all(feature = "camera", target_os = "linux")))]
    async fn open_media(
        &self,
        location: &str,
        kind: SourceKind,
    ) -> Result<Box<dyn FrameSource>, SourceError> {
        debug!(
            "No media backend compiled in for {:?} source {} (timeout {:?})",
            kind, location, self.read_timeout
        );
        Err(SourceError::Unsupported {
            location: location.to_string(),
        })
    }
}

#[async_trait]
impl SourceOpener for DefaultSourceOpener {
    async fn open(&self, location: &str) -> Result<Box<dyn FrameSource>, SourceError> {
        let kind = SourceKind::classify(location);
        debug!("Opening {:?} source {}", kind, location);

        match kind {
            SourceKind::Dummy => Err(SourceError::open(
                location,
                "placeholder cameras have no physical source",
            )),
            SourceKind::Live => self.open_media(location, kind).await,
            SourceKind::File => {
                let path = Path::new(location);
                if path.is_dir() {
                    Ok(Box::new(SequenceSource::open_dir(path).await?))
                } else if path.exists() {
                    self.open_media(location, kind).await
                } else {
                    Err(SourceError::open(location, "file does not exist"))
                }
            }
        }
    }
}
