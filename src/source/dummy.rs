use crate::camera_id::CameraId;
use crate::config::DummyConfig;
use crate::frame::Frame;
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use rusttype::{Font, Scale};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, error, warn};

const LABEL_COLOR: Rgb<u8> = Rgb([255, 255, 255]);
const SUBTITLE_COLOR: Rgb<u8> = Rgb([128, 128, 128]);
const BAND_COLOR: Rgb<u8> = Rgb([32, 32, 32]);

/// Label font used when the configured one cannot be loaded
static BUNDLED_FONT: &[u8] = include_bytes!("../../assets/DejaVuSansMono.ttf");

/// Shared look of placeholder frames; loads the label font once
pub struct DummyStyle {
    width: u32,
    height: u32,
    font_size: f32,
    font: Option<Font<'static>>,
}

impl DummyStyle {
    /// Build the style from configuration, falling back to the bundled font
    /// when the configured one cannot be loaded
    pub fn from_config(config: &DummyConfig) -> Self {
        let configured = match std::fs::read(&config.font_path) {
            Ok(data) => {
                let font = Font::try_from_vec(data);
                if font.is_none() {
                    warn!(
                        "Failed to parse font file '{}', using the bundled font",
                        config.font_path
                    );
                }
                font
            }
            Err(e) => {
                warn!(
                    "Failed to read font file '{}': {}, using the bundled font",
                    config.font_path, e
                );
                None
            }
        };

        let font = configured.or_else(|| Font::try_from_bytes(BUNDLED_FONT));
        if font.is_none() {
            error!("Bundled font is unreadable, placeholder frames will be unlabelled");
        }

        Self {
            width: config.width,
            height: config.height,
            font_size: config.font_size,
            font,
        }
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Font size that fits `text` across the frame width
    fn fitted_scale(&self, font: &Font<'static>, text: &str, size: f32) -> Scale {
        let scale = Scale::uniform(size);
        let (text_width, _) = text_size(scale, font, text);
        let max_width = self.width as i32 * 9 / 10;
        if text_width > max_width && text_width > 0 {
            Scale::uniform((size * max_width as f32 / text_width as f32).max(1.0))
        } else {
            scale
        }
    }
}

/// Placeholder for a camera with no usable video source.
///
/// Never read physically: every call to [`DummySource::synthesize`] paints a
/// fresh frame showing the camera label.
pub struct DummySource {
    camera_id: CameraId,
    style: Arc<DummyStyle>,
    next_id: AtomicU64,
}

impl DummySource {
    pub fn new(camera_id: CameraId, style: Arc<DummyStyle>) -> Self {
        Self {
            camera_id,
            style,
            next_id: AtomicU64::new(0),
        }
    }

    pub fn camera_id(&self) -> &CameraId {
        &self.camera_id
    }

    /// Text drawn on every placeholder frame
    pub fn label(&self) -> String {
        format!("Camera {}", self.camera_id)
    }

    /// Paint a new placeholder frame
    pub fn synthesize(&self) -> Frame {
        let (width, height) = self.style.dimensions();
        let mut image = RgbImage::new(width, height);

        let label = self.label();
        match &self.style.font {
            Some(font) => {
                let title_scale = self.style.fitted_scale(font, &label, self.style.font_size);
                let subtitle_scale = self.style.fitted_scale(
                    font,
                    "No Video Source",
                    self.style.font_size / 2.0,
                );

                let (title_w, title_h) = text_size(title_scale, font, &label);
                let (sub_w, _) = text_size(subtitle_scale, font, "No Video Source");

                let title_x = (width as i32 - title_w) / 2;
                let title_y = height as i32 / 2 - title_h;
                draw_text_mut(
                    &mut image,
                    LABEL_COLOR,
                    title_x.max(0),
                    title_y.max(0),
                    title_scale,
                    font,
                    &label,
                );
                draw_text_mut(
                    &mut image,
                    SUBTITLE_COLOR,
                    ((width as i32 - sub_w) / 2).max(0),
                    height as i32 / 2 + title_h / 2,
                    subtitle_scale,
                    font,
                    "No Video Source",
                );
            }
            None => {
                // Without a font, a band marks where the label would be
                let band_height = (height / 6).max(1);
                draw_filled_rect_mut(
                    &mut image,
                    Rect::at(0, ((height - band_height) / 2) as i32).of_size(width, band_height),
                    BAND_COLOR,
                );
            }
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        debug!("Synthesized placeholder frame {} for {}", id, label);
        Frame::new(id, SystemTime::now(), image)
    }
}
