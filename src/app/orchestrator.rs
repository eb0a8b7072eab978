use super::types::{Component, ComponentState, ShutdownReason};
use crate::config::CamwatchConfig;
use crate::error::Result;
use crate::events::EventBus;
use crate::hub::{CameraHub, CameraHubBuilder};
use crate::registry::CameraRegistry;
use crate::source::{DefaultSourceOpener, SourceOpener};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Main application coordinator: the camera hub plus the HTTP adapter
pub struct CamwatchOrchestrator {
    pub(super) config: CamwatchConfig,
    pub(super) event_bus: Arc<EventBus>,
    pub(super) hub: Arc<CameraHub>,

    // Components
    pub(super) stream_server_enabled: bool,
    pub(super) stream_server_task: Option<JoinHandle<Result<()>>>,

    // Lifecycle management
    pub(super) component_states: Arc<Mutex<BTreeMap<Component, ComponentState>>>,
    pub(super) shutdown_sender: Option<oneshot::Sender<ShutdownReason>>,
    pub(super) shutdown_receiver: Option<oneshot::Receiver<ShutdownReason>>,
    pub(super) cancellation_token: CancellationToken,
}

impl CamwatchOrchestrator {
    /// Create a new orchestrator with the given configuration
    pub async fn new(config: CamwatchConfig) -> Result<Self> {
        let opener = Arc::new(DefaultSourceOpener::new(config.detector.read_timeout()));
        Self::with_opener(config, opener).await
    }

    /// Create an orchestrator that opens camera locations through `opener`
    pub async fn with_opener(
        config: CamwatchConfig,
        opener: Arc<dyn SourceOpener>,
    ) -> Result<Self> {
        let event_bus = Arc::new(EventBus::new(config.system.event_bus_capacity));
        let registry = Arc::new(CameraRegistry::from_config(&config.cameras).await?);
        let (shutdown_sender, shutdown_receiver) = oneshot::channel();

        let hub = Arc::new(
            CameraHubBuilder::new()
                .config(config.clone())
                .registry(registry)
                .opener(opener)
                .event_bus(Arc::clone(&event_bus))
                .build()?,
        );

        info!(
            "Camwatch orchestrator created with {} camera slots",
            config.cameras.slots
        );

        Ok(Self {
            config,
            event_bus,
            hub,
            stream_server_enabled: cfg!(feature = "streaming"),
            stream_server_task: None,
            component_states: Arc::new(Mutex::new(BTreeMap::new())),
            shutdown_sender: Some(shutdown_sender),
            shutdown_receiver: Some(shutdown_receiver),
            cancellation_token: CancellationToken::new(),
        })
    }

    /// Enable or disable the HTTP adapter (enabled whenever it is compiled in)
    pub fn set_stream_server_enabled(&mut self, enabled: bool) {
        self.stream_server_enabled = enabled && cfg!(feature = "streaming");
    }

    pub fn hub(&self) -> &Arc<CameraHub> {
        &self.hub
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    pub fn config(&self) -> &CamwatchConfig {
        &self.config
    }

    /// Cancelling this token makes a running [`run`](Self::run) loop shut down
    pub fn shutdown_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }
}
