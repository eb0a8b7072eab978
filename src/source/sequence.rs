use super::{FrameSource, SourceKind};
use crate::error::SourceError;
use crate::frame::Frame;
use async_trait::async_trait;
use image::RgbImage;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, info, warn};

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "ppm"];

enum SequenceEntry {
    File(PathBuf),
    Decoded(Arc<RgbImage>),
}

/// Looping file source over an ordered sequence of still images.
///
/// Backed either by a directory of image files (sorted by file name, decoded
/// lazily on each read) or by images already held in memory.
pub struct SequenceSource {
    location: String,
    entries: Vec<SequenceEntry>,
    cursor: usize,
    next_id: u64,
    open: bool,
}

impl SequenceSource {
    /// Open a directory of image files
    pub async fn open_dir<P: AsRef<Path>>(path: P) -> Result<Self, SourceError> {
        let path = path.as_ref();
        let location = path.to_string_lossy().to_string();

        let mut dir = tokio::fs::read_dir(path)
            .await
            .map_err(|e| SourceError::open(&location, e.to_string()))?;

        let mut files = Vec::new();
        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| SourceError::open(&location, e.to_string()))?
        {
            let file_path = entry.path();
            let is_image = file_path
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
                .unwrap_or(false);
            if is_image {
                files.push(file_path);
            }
        }

        if files.is_empty() {
            return Err(SourceError::open(location, "directory contains no images"));
        }

        files.sort();
        info!(
            "Opened image sequence {} with {} frames",
            location,
            files.len()
        );

        Ok(Self {
            location,
            entries: files.into_iter().map(SequenceEntry::File).collect(),
            cursor: 0,
            next_id: 0,
            open: true,
        })
    }

    /// Build a sequence from images already in memory
    pub fn from_images<S: Into<String>>(location: S, images: Vec<RgbImage>) -> Self {
        Self {
            location: location.into(),
            entries: images
                .into_iter()
                .map(|image| SequenceEntry::Decoded(Arc::new(image)))
                .collect(),
            cursor: 0,
            next_id: 0,
            open: true,
        }
    }

    /// Number of frames in one traversal
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Position of the next frame to be read
    pub fn position(&self) -> usize {
        self.cursor
    }
}

#[async_trait]
impl FrameSource for SequenceSource {
    fn kind(&self) -> SourceKind {
        SourceKind::File
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

        let Some(entry) = self.entries.get(self.cursor) else {
            return Err(SourceError::EndOfStream);
        };

        // A file that fails to decode is skipped rather than retried forever
        self.cursor += 1;

        let image = match entry {
            SequenceEntry::Decoded(image) => Arc::clone(image),
            SequenceEntry::File(path) => {
                let path = path.clone();
                let decoded = tokio::task::spawn_blocking(move || {
                    image::open(&path)
                        .map(|img| img.to_rgb8())
                        .map_err(|e| format!("{}: {}", path.display(), e))
                })
                .await
                .map_err(|e| SourceError::read(format!("decode task failed: {}", e)))?;

                match decoded {
                    Ok(image) => Arc::new(image),
                    Err(details) => {
                        warn!("Skipping undecodable frame in {}: {}", self.location, details);
                        return Err(SourceError::read(details));
                    }
                }
            }
        };

        let id = self.next_id;
        self.next_id += 1;
        Ok(Frame::from_shared(id, SystemTime::now(), image))
    }

    async fn reset(&mut self) -> Result<(), SourceError> {
        if !self.open {
            return Err(SourceError::read("source is closed"));
        }
        debug!("Rewinding image sequence {}", self.location);
        self.cursor = 0;
        Ok(())
    }

    async fn close(&mut self) {
        if self.open {
            debug!("Closing image sequence {}", self.location);
            self.open = false;
        }
    }
}
