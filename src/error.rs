use crate::camera_id::CameraId;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CamwatchError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    #[error("Analyzer error: {0}")]
    Analyzer(#[from] AnalyzerError),

    #[error("Stream error: {0}")]
    Stream(#[from] StreamError),

    #[error("Event bus error: {0}")]
    EventBus(#[from] EventBusError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Camera {camera_id} not found")]
    NotFound { camera_id: CameraId },

    #[error("System error: {message}")]
    System { message: String },

    #[error("Component error in {component}: {message}")]
    Component { component: String, message: String },
}

impl CamwatchError {
    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }

    pub fn component<S: Into<String>>(component: S, message: S) -> Self {
        Self::Component {
            component: component.into(),
            message: message.into(),
        }
    }

    pub fn not_found(camera_id: &CameraId) -> Self {
        Self::NotFound {
            camera_id: camera_id.clone(),
        }
    }

    /// Whether the failure is local to one camera and worth retrying
    pub fn is_recoverable(&self) -> bool {
        match self {
            CamwatchError::Source(e) => e.is_transient(),
            CamwatchError::Stream(StreamError::Encode { .. }) => true,
            CamwatchError::Analyzer(_) => true,
            _ => false,
        }
    }
}

/// Failures of a frame source
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SourceError {
    #[error("Failed to open source '{location}': {details}")]
    Open { location: String, details: String },

    #[error("No backend available for source '{location}'")]
    Unsupported { location: String },

    #[error("Frame read failed: {details}")]
    Read { details: String },

    #[error("No frame received within {timeout:?}")]
    Timeout { timeout: Duration },

    #[error("End of stream")]
    EndOfStream,
}

impl SourceError {
    pub fn read<S: Into<String>>(details: S) -> Self {
        Self::Read {
            details: details.into(),
        }
    }

    pub fn open<L: Into<String>, D: Into<String>>(location: L, details: D) -> Self {
        Self::Open {
            location: location.into(),
            details: details.into(),
        }
    }

    /// Read-side failures that a retry may clear
    pub fn is_transient(&self) -> bool {
        matches!(self, SourceError::Read { .. } | SourceError::Timeout { .. })
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalyzerError {
    #[error("Frame dimensions differ: {previous:?} vs {current:?}")]
    DimensionMismatch {
        previous: (u32, u32),
        current: (u32, u32),
    },

    #[error("Frame processing failed: {details}")]
    FrameProcessing { details: String },
}

#[derive(Error, Debug)]
pub enum StreamError {
    #[error("Camera {camera_id} not found")]
    NotFound { camera_id: CameraId },

    #[error("JPEG encoding failed: {details}")]
    Encode { details: String },

    #[error("Failed to bind {address}: {source}")]
    BindFailed {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Stream server startup failed: {details}")]
    StartupFailed { details: String },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EventBusError {
    #[error("Failed to publish event: {details}")]
    PublishFailed { details: String },

    #[error("Event channel closed")]
    ChannelClosed,
}

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Registry file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Registry file is not a flat JSON object: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Camera {camera_id} is not registered")]
    UnknownCamera { camera_id: CameraId },
}

pub type Result<T> = std::result::Result<T, CamwatchError>;
