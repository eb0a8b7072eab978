use crate::config::DetectorConfig;
use crate::error::AnalyzerError;
use image::{GrayImage, Luma, RgbImage};
use imageproc::contrast::threshold;
use tracing::{debug, trace};

/// Frame-pair differencing with a fixed binary threshold
#[derive(Debug, Clone)]
pub struct MotionAnalyzer {
    pixel_threshold: u8,
    motion_threshold: u32,
}

impl MotionAnalyzer {
    pub fn new(config: &DetectorConfig) -> Self {
        Self {
            pixel_threshold: config.pixel_threshold,
            motion_threshold: config.motion_threshold,
        }
    }

    /// Number of pixels whose difference intensity reaches the pixel threshold
    pub fn changed_pixel_count(
        &self,
        previous: &RgbImage,
        current: &RgbImage,
    ) -> Result<u32, AnalyzerError> {
        let diff = difference_intensity(previous, current)?;

        // `threshold` keeps pixels strictly above its argument
        let binary = threshold(&diff, self.pixel_threshold.saturating_sub(1));
        let count = binary.pixels().filter(|p| p[0] == 255).count() as u32;

        trace!("Frame pair difference: {} changed pixels", count);
        Ok(count)
    }

    /// Changed pixel count when it exceeds the motion threshold
    pub fn evaluate(
        &self,
        previous: &RgbImage,
        current: &RgbImage,
    ) -> Result<Option<u32>, AnalyzerError> {
        let count = self.changed_pixel_count(previous, current)?;
        if count > self.motion_threshold {
            Ok(Some(count))
        } else {
            if count > 0 {
                debug!(
                    "Change of {} pixels below threshold {}",
                    count, self.motion_threshold
                );
            }
            Ok(None)
        }
    }

    pub fn motion_threshold(&self) -> u32 {
        self.motion_threshold
    }
}

/// Per-channel absolute difference reduced to one intensity channel
fn difference_intensity(previous: &RgbImage, current: &RgbImage) -> Result<GrayImage, AnalyzerError> {
    if previous.dimensions() != current.dimensions() {
        return Err(AnalyzerError::DimensionMismatch {
            previous: previous.dimensions(),
            current: current.dimensions(),
        });
    }

    let (width, height) = previous.dimensions();
    let mut gray = GrayImage::new(width, height);

    for ((prev, curr), out) in previous
        .pixels()
        .zip(current.pixels())
        .zip(gray.pixels_mut())
    {
        let dr = prev[0].abs_diff(curr[0]) as f32;
        let dg = prev[1].abs_diff(curr[1]) as f32;
        let db = prev[2].abs_diff(curr[2]) as f32;
        let value = (0.299 * dr + 0.587 * dg + 0.114 * db).round().min(255.0) as u8;
        *out = Luma([value]);
    }

    Ok(gray)
}
