use super::status::{CameraEntry, CameraStatus};
use crate::active::ActiveCamera;
use crate::analyzer::DetectorState;
use crate::camera_id::CameraId;
use crate::config::DetectorConfig;
use crate::error::{CamwatchError, Result};
use crate::events::{CamwatchEvent, EventBus, MotionEvent, MotionSubscription};
use crate::registry::CameraRegistry;
use crate::source::SourceOpener;
use crate::streaming::{FrameStream, StreamStatsSnapshot, StreamerContext};
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Supervisor of every camera: one detector task per opened source, viewer
/// streams on demand, and the shared active-camera register.
pub struct CameraHub {
    pub(super) registry: Arc<CameraRegistry>,
    pub(super) active: Arc<ActiveCamera>,
    pub(super) event_bus: Arc<EventBus>,
    pub(super) opener: Arc<dyn SourceOpener>,
    pub(super) detector_config: DetectorConfig,
    pub(super) streamer: StreamerContext,
    pub(super) slots: u32,
    pub(super) stop_timeout: Duration,

    pub(super) cameras: RwLock<BTreeMap<CameraId, CameraEntry>>,
    /// Serializes registry changes so attach/detach never interleave
    pub(super) changes_lock: tokio::sync::Mutex<()>,
    pub(super) follower: Mutex<Option<JoinHandle<()>>>,
    pub(super) root_token: CancellationToken,
}

impl CameraHub {
    /// Whether `camera_id` names one of the always-present numbered slots
    pub fn is_slot(&self, camera_id: &CameraId) -> bool {
        camera_id
            .as_str()
            .parse::<u32>()
            .map(|n| n < self.slots && n.to_string() == camera_id.as_str())
            .unwrap_or(false)
    }

    pub fn registry(&self) -> &Arc<CameraRegistry> {
        &self.registry
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    /// Currently active camera
    pub fn active_camera(&self) -> CameraId {
        self.active.get()
    }

    /// Motion events from every camera, including manual triggers
    pub fn subscribe_motion_events(&self) -> MotionSubscription {
        self.event_bus.subscribe_motion()
    }

    /// Start a viewer stream for a known camera
    pub fn open_stream(&self, camera_id: &CameraId) -> Result<FrameStream> {
        let (target, token) = {
            let cameras = self.cameras.read();
            let entry = cameras
                .get(camera_id)
                .ok_or_else(|| CamwatchError::not_found(camera_id))?;
            (entry.stream_target(), entry.token.clone())
        };

        debug!("Opening {:?} stream for camera {}", target, camera_id);
        Ok(self
            .streamer
            .streamer(camera_id.clone(), target, token)
            .into_stream())
    }

    /// Publish a synthetic motion event for a known camera.
    ///
    /// Leaves the active-camera register untouched; every call publishes.
    pub fn trigger_test_motion(&self, camera_id: &CameraId) -> Result<MotionEvent> {
        if !self.cameras.read().contains_key(camera_id) {
            return Err(CamwatchError::not_found(camera_id));
        }

        let event = MotionEvent::new(camera_id.clone(), 0);
        info!("Manual motion trigger for camera {}", camera_id);
        if let Err(e) = self
            .event_bus
            .publish(CamwatchEvent::MotionDetected(event.clone()))
        {
            debug!("Manual trigger for camera {} not delivered: {}", camera_id, e);
        }
        Ok(event)
    }

    /// Detector state of every camera that has one
    pub fn detector_states(&self) -> BTreeMap<CameraId, DetectorState> {
        self.cameras
            .read()
            .iter()
            .filter_map(|(id, entry)| entry.detector.as_ref().map(|d| (id.clone(), d.state())))
            .collect()
    }

    /// Follow one camera's detector state; the receiver outlives the detector
    pub fn watch_detector(&self, camera_id: &CameraId) -> Option<watch::Receiver<DetectorState>> {
        self.cameras
            .read()
            .get(camera_id)
            .and_then(|entry| entry.detector.as_ref())
            .map(|detector| detector.state_receiver())
    }

    pub fn camera_status(&self, camera_id: &CameraId) -> Option<CameraStatus> {
        self.cameras
            .read()
            .get(camera_id)
            .map(|entry| entry.status(camera_id))
    }

    /// Status of every known camera, slots included
    pub fn camera_statuses(&self) -> Vec<CameraStatus> {
        self.cameras
            .read()
            .iter()
            .map(|(id, entry)| entry.status(id))
            .collect()
    }

    pub fn stream_stats(&self) -> StreamStatsSnapshot {
        self.streamer.stats.snapshot()
    }

    /// Token cancelled when the hub shuts down
    pub fn lifetime_token(&self) -> CancellationToken {
        self.root_token.child_token()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.root_token.is_cancelled()
    }
}
