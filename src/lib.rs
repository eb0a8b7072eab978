pub mod active;
pub mod analyzer;
pub mod app;
pub mod camera_id;
pub mod config;
pub mod error;
pub mod events;
pub mod frame;
pub mod hub;
pub mod recovery;
pub mod registry;
pub mod source;
pub mod streaming;

#[cfg(test)]
mod test_support;

pub use active::ActiveCamera;
pub use analyzer::{DetectorHandle, DetectorState, MotionAnalyzer, MotionDetector};
pub use app::{CamwatchOrchestrator, Component, ComponentState, ShutdownReason};
pub use camera_id::CameraId;
pub use config::CamwatchConfig;
pub use error::{CamwatchError, Result};
pub use events::{
    CamwatchEvent, EventBus, EventFilter, EventReceiver, MotionEvent, MotionSubscription,
};
pub use frame::Frame;
pub use hub::{CameraHub, CameraHubBuilder, CameraStatus};
pub use recovery::{ReadRecovery, RecoveryAction, RecoveryConfig};
pub use registry::{CameraRegistry, RegistryChange};
pub use source::{DefaultSourceOpener, FrameSource, SourceKind, SourceOpener};
pub use streaming::{FrameStream, StreamStats, StreamStatsSnapshot};

#[cfg(feature = "streaming")]
pub use streaming::{StreamServer, StreamServerBuilder};
