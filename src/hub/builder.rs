use super::camera_hub::CameraHub;
use super::status::CameraEntry;
use crate::active::ActiveCamera;
use crate::camera_id::CameraId;
use crate::config::CamwatchConfig;
use crate::error::{CamwatchError, Result};
use crate::events::EventBus;
use crate::registry::CameraRegistry;
use crate::source::{DefaultSourceOpener, DummyStyle, SourceOpener};
use crate::streaming::{StreamStats, StreamerContext};
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Camera hub builder
#[derive(Default)]
pub struct CameraHubBuilder {
    config: Option<CamwatchConfig>,
    registry: Option<Arc<CameraRegistry>>,
    opener: Option<Arc<dyn SourceOpener>>,
    event_bus: Option<Arc<EventBus>>,
    dummy_style: Option<Arc<DummyStyle>>,
}

impl CameraHubBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: CamwatchConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn registry(mut self, registry: Arc<CameraRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Override how camera locations are opened
    pub fn opener(mut self, opener: Arc<dyn SourceOpener>) -> Self {
        self.opener = Some(opener);
        self
    }

    pub fn event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn dummy_style(mut self, dummy_style: Arc<DummyStyle>) -> Self {
        self.dummy_style = Some(dummy_style);
        self
    }

    /// Build the hub with every slot populated by a placeholder camera.
    ///
    /// Registered sources are attached by [`CameraHub::start`].
    pub fn build(self) -> Result<CameraHub> {
        let config = self
            .config
            .ok_or_else(|| CamwatchError::component("camera_hub", "Configuration is required"))?;
        let registry = self
            .registry
            .ok_or_else(|| CamwatchError::component("camera_hub", "Camera registry is required"))?;

        let opener = self.opener.unwrap_or_else(|| {
            Arc::new(DefaultSourceOpener::new(config.detector.read_timeout()))
        });
        let event_bus = self
            .event_bus
            .unwrap_or_else(|| Arc::new(EventBus::new(config.system.event_bus_capacity)));
        let dummy_style = self
            .dummy_style
            .unwrap_or_else(|| Arc::new(DummyStyle::from_config(&config.dummy)));

        let root_token = CancellationToken::new();
        let cameras: BTreeMap<CameraId, CameraEntry> = (0..config.cameras.slots)
            .map(|slot| {
                (
                    CameraId::from(slot),
                    CameraEntry::placeholder(true, root_token.child_token()),
                )
            })
            .collect();

        let streamer = StreamerContext {
            opener: Arc::clone(&opener),
            dummy_style,
            config: config.stream.clone(),
            reopen_backoff: config.detector.read_backoff(),
            stats: Arc::new(StreamStats::default()),
        };

        Ok(CameraHub {
            registry,
            active: Arc::new(ActiveCamera::new(CameraId::from(
                config.cameras.default_active.as_str(),
            ))),
            event_bus,
            opener,
            detector_config: config.detector.clone(),
            streamer,
            slots: config.cameras.slots,
            stop_timeout: config.system.stop_timeout(),
            cameras: RwLock::new(cameras),
            changes_lock: tokio::sync::Mutex::new(()),
            follower: Mutex::new(None),
            root_token,
        })
    }
}
