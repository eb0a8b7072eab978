use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct CamwatchConfig {
    #[serde(default)]
    pub cameras: CamerasConfig,
    #[serde(default)]
    pub detector: DetectorConfig,
    #[serde(default)]
    pub stream: StreamConfig,
    #[serde(default)]
    pub dummy: DummyConfig,
    #[serde(default)]
    pub system: SystemConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CamerasConfig {
    /// Number of numbered camera slots ("0".."slots-1") that always exist
    #[serde(default = "default_slots")]
    pub slots: u32,

    /// Camera that is active before any motion has been seen
    #[serde(default = "default_active_camera")]
    pub default_active: String,

    /// Flat JSON file mapping camera id to location, loaded on startup
    #[serde(default)]
    pub registry_path: Option<String>,

    /// Inline camera locations (id -> URI, video file or image directory)
    #[serde(default)]
    pub sources: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DetectorConfig {
    /// Per-pixel intensity at or above which a difference counts as changed
    #[serde(default = "default_pixel_threshold")]
    pub pixel_threshold: u8,

    /// Changed pixel count that must be exceeded to report motion
    #[serde(default = "default_motion_threshold")]
    pub motion_threshold: u32,

    /// Pause after a motion trigger, in milliseconds
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,

    /// Pause between detection iterations, in milliseconds
    #[serde(default = "default_idle_ms")]
    pub idle_ms: u64,

    /// Wait before retrying a failed read, in milliseconds
    #[serde(default = "default_read_backoff_ms")]
    pub read_backoff_ms: u64,

    /// Consecutive read failures before the detector gives up (unset = never)
    #[serde(default)]
    pub max_read_failures: Option<u32>,

    /// Timeout for a single read from a live source, in milliseconds
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StreamConfig {
    /// IP address to bind to
    #[serde(default = "default_stream_ip")]
    pub ip: String,

    /// Port to listen on
    #[serde(default = "default_stream_port")]
    pub port: u16,

    /// Upper bound on frames sent per second to each viewer
    #[serde(default = "default_stream_fps")]
    pub fps: u32,

    /// JPEG quality factor (1-100)
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DummyConfig {
    /// Width of synthesized placeholder frames
    #[serde(default = "default_dummy_width")]
    pub width: u32,

    /// Height of synthesized placeholder frames
    #[serde(default = "default_dummy_height")]
    pub height: u32,

    /// TrueType font used for the camera label
    #[serde(default = "default_font_path")]
    pub font_path: String,

    /// Label font size in pixels
    #[serde(default = "default_font_size")]
    pub font_size: f32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SystemConfig {
    /// Event bus capacity
    #[serde(default = "default_event_bus_capacity")]
    pub event_bus_capacity: usize,

    /// How long to wait for a detector to wind down after cancellation
    #[serde(default = "default_stop_timeout_ms")]
    pub stop_timeout_ms: u64,
}

impl CamwatchConfig {
    /// Load configuration from default sources (file + environment variables)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file("camwatch.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            .set_default("cameras.slots", default_slots() as i64)?
            .set_default("cameras.default_active", default_active_camera())?
            .set_default("detector.pixel_threshold", default_pixel_threshold() as i64)?
            .set_default("detector.motion_threshold", default_motion_threshold() as i64)?
            .set_default("detector.cooldown_ms", default_cooldown_ms() as i64)?
            .set_default("detector.idle_ms", default_idle_ms() as i64)?
            .set_default("detector.read_backoff_ms", default_read_backoff_ms() as i64)?
            .set_default("detector.read_timeout_ms", default_read_timeout_ms() as i64)?
            .set_default("stream.ip", default_stream_ip())?
            .set_default("stream.port", default_stream_port() as i64)?
            .set_default("stream.fps", default_stream_fps() as i64)?
            .set_default("stream.jpeg_quality", default_jpeg_quality() as i64)?
            .set_default("dummy.width", default_dummy_width() as i64)?
            .set_default("dummy.height", default_dummy_height() as i64)?
            .set_default("dummy.font_path", default_font_path())?
            .set_default("dummy.font_size", default_font_size() as f64)?
            .set_default(
                "system.event_bus_capacity",
                default_event_bus_capacity() as i64,
            )?
            .set_default("system.stop_timeout_ms", default_stop_timeout_ms() as i64)?
            .add_source(File::with_name(&path_str).required(false))
            // CAMWATCH_DETECTOR__COOLDOWN_MS=500
            .add_source(
                Environment::with_prefix("CAMWATCH")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let config: CamwatchConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cameras.slots == 0 && self.cameras.sources.is_empty() {
            return Err(ConfigError::Message(
                "At least one camera slot or source must be configured".to_string(),
            ));
        }

        if self.cameras.default_active.is_empty() {
            return Err(ConfigError::Message(
                "Default active camera must not be empty".to_string(),
            ));
        }

        if self.detector.pixel_threshold == 0 {
            return Err(ConfigError::Message(
                "Detector pixel_threshold must be greater than 0".to_string(),
            ));
        }

        if self.detector.idle_ms == 0 {
            return Err(ConfigError::Message(
                "Detector idle_ms must be greater than 0".to_string(),
            ));
        }

        if self.detector.read_timeout_ms == 0 {
            return Err(ConfigError::Message(
                "Detector read_timeout_ms must be greater than 0".to_string(),
            ));
        }

        if self.stream.fps == 0 {
            return Err(ConfigError::Message(
                "Stream fps must be greater than 0".to_string(),
            ));
        }

        if !(1..=100).contains(&self.stream.jpeg_quality) {
            return Err(ConfigError::Message(
                "Stream jpeg_quality must be between 1 and 100".to_string(),
            ));
        }

        if self.dummy.width == 0 || self.dummy.height == 0 {
            return Err(ConfigError::Message(
                "Dummy frame size must be greater than 0".to_string(),
            ));
        }

        if self.system.event_bus_capacity == 0 {
            return Err(ConfigError::Message(
                "Event bus capacity must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl DetectorConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    pub fn idle(&self) -> Duration {
        Duration::from_millis(self.idle_ms)
    }

    pub fn read_backoff(&self) -> Duration {
        Duration::from_millis(self.read_backoff_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

impl StreamConfig {
    pub fn frame_interval(&self) -> Duration {
        Duration::from_micros(1_000_000u64 / self.fps.max(1) as u64)
    }
}

impl SystemConfig {
    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }
}

impl Default for CamerasConfig {
    fn default() -> Self {
        Self {
            slots: default_slots(),
            default_active: default_active_camera(),
            registry_path: None,
            sources: BTreeMap::new(),
        }
    }
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            pixel_threshold: default_pixel_threshold(),
            motion_threshold: default_motion_threshold(),
            cooldown_ms: default_cooldown_ms(),
            idle_ms: default_idle_ms(),
            read_backoff_ms: default_read_backoff_ms(),
            max_read_failures: None,
            read_timeout_ms: default_read_timeout_ms(),
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            ip: default_stream_ip(),
            port: default_stream_port(),
            fps: default_stream_fps(),
            jpeg_quality: default_jpeg_quality(),
        }
    }
}

impl Default for DummyConfig {
    fn default() -> Self {
        Self {
            width: default_dummy_width(),
            height: default_dummy_height(),
            font_path: default_font_path(),
            font_size: default_font_size(),
        }
    }
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            event_bus_capacity: default_event_bus_capacity(),
            stop_timeout_ms: default_stop_timeout_ms(),
        }
    }
}

// Default value functions
fn default_slots() -> u32 {
    16
}
fn default_active_camera() -> String {
    "0".to_string()
}

fn default_pixel_threshold() -> u8 {
    30
}
fn default_motion_threshold() -> u32 {
    5000
}
fn default_cooldown_ms() -> u64 {
    2000
}
fn default_idle_ms() -> u64 {
    100
}
fn default_read_backoff_ms() -> u64 {
    1000
}
fn default_read_timeout_ms() -> u64 {
    5000
}

fn default_stream_ip() -> String {
    "0.0.0.0".to_string()
}
fn default_stream_port() -> u16 {
    5000
}
fn default_stream_fps() -> u32 {
    15
}
fn default_jpeg_quality() -> u8 {
    80
}

fn default_dummy_width() -> u32 {
    640
}
fn default_dummy_height() -> u32 {
    480
}
fn default_font_path() -> String {
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf".to_string()
}
fn default_font_size() -> f32 {
    48.0
}

fn default_event_bus_capacity() -> usize {
    100
}
fn default_stop_timeout_ms() -> u64 {
    5000
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = CamwatchConfig::default();

        assert!(config.validate().is_ok());
        assert_eq!(config.cameras.slots, 16);
        assert_eq!(config.detector.pixel_threshold, 30);
        assert_eq!(config.detector.motion_threshold, 5000);
        assert_eq!(config.detector.cooldown(), Duration::from_secs(2));
        assert_eq!(config.detector.idle(), Duration::from_millis(100));
        assert_eq!(config.detector.max_read_failures, None);
        assert_eq!(config.stream.jpeg_quality, 80);
    }

    #[test]
    fn test_load_from_file_with_sources() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[cameras]
slots = 4
default_active = "2"

[cameras.sources]
"0" = "http://192.168.137.66:8080/video"
"1" = "video1.mp4"

[detector]
cooldown_ms = 500
max_read_failures = 10
"#
        )
        .unwrap();

        let config = CamwatchConfig::load_from_file(file.path()).unwrap();

        assert_eq!(config.cameras.slots, 4);
        assert_eq!(config.cameras.default_active, "2");
        assert_eq!(config.cameras.sources.len(), 2);
        assert_eq!(config.cameras.sources["1"], "video1.mp4");
        assert_eq!(config.detector.cooldown_ms, 500);
        assert_eq!(config.detector.max_read_failures, Some(10));
        // Untouched values keep their defaults
        assert_eq!(config.detector.motion_threshold, 5000);
        assert_eq!(config.stream.port, 5000);
    }

    #[test]
    fn test_config_validation() {
        let mut config = CamwatchConfig::default();

        config.stream.jpeg_quality = 0;
        assert!(config.validate().is_err());
        config.stream.jpeg_quality = 80;

        config.detector.pixel_threshold = 0;
        assert!(config.validate().is_err());
        config.detector.pixel_threshold = 30;

        config.cameras.slots = 0;
        assert!(config.validate().is_err());

        config
            .cameras
            .sources
            .insert("lobby".to_string(), "rtsp://lobby/stream".to_string());
        assert!(config.validate().is_ok());
    }
}
