use crate::error::SourceError;
use image::RgbImage;
use std::sync::Arc;
use std::time::SystemTime;

/// Bytes per pixel of the RGB24 layout every source decodes into
pub const RGB_BYTES_PER_PIXEL: usize = 3;

/// One decoded image sample from a source.
///
/// The pixel buffer is immutable once built; cloning a frame only bumps the
/// reference count, so handing a frame to a detector or a viewer never exposes
/// it to mutation by another component.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Per-source frame counter
    pub id: u64,
    /// Timestamp when the frame was read
    pub timestamp: SystemTime,
    /// RGB24 pixel data
    pub image: Arc<RgbImage>,
}

impl Frame {
    /// Create a new frame from an already decoded image
    pub fn new(id: u64, timestamp: SystemTime, image: RgbImage) -> Self {
        Self {
            id,
            timestamp,
            image: Arc::new(image),
        }
    }

    /// Create a frame sharing an existing image buffer
    pub fn from_shared(id: u64, timestamp: SystemTime, image: Arc<RgbImage>) -> Self {
        Self {
            id,
            timestamp,
            image,
        }
    }

    /// Build a frame from tightly packed RGB24 bytes, validating the size
    pub fn from_rgb24(
        id: u64,
        timestamp: SystemTime,
        width: u32,
        height: u32,
        data: Vec<u8>,
    ) -> Result<Self, SourceError> {
        let expected = width as usize * height as usize * RGB_BYTES_PER_PIXEL;
        if data.len() != expected {
            return Err(SourceError::read(format!(
                "RGB24 buffer for {}x{} should be {} bytes, got {}",
                width,
                height,
                expected,
                data.len()
            )));
        }

        let image = RgbImage::from_raw(width, height, data)
            .ok_or_else(|| SourceError::read("Failed to wrap RGB24 buffer"))?;
        Ok(Self::new(id, timestamp, image))
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// Get frame age in milliseconds
    pub fn age_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(self.timestamp)
            .unwrap_or_default()
            .as_millis() as u64
    }
}
