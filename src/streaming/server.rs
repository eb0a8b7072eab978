use crate::{
    config::StreamConfig,
    error::{CamwatchError, Result, StreamError},
    hub::CameraHub,
};
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use super::handlers::{
    active_camera_handler, cameras_handler, events_handler, health_handler, index_handler,
    stream_handler, test_motion_handler,
};

/// Shared state for the Axum server
#[derive(Clone)]
pub struct ServerState {
    pub(crate) hub: Arc<CameraHub>,
}

/// Routes of the HTTP adapter, without a listener
pub fn router(hub: Arc<CameraHub>) -> Router {
    let state = ServerState { hub };

    Router::new()
        .route("/", get(index_handler))
        .route("/stream/:id", get(stream_handler))
        .route("/active", get(active_camera_handler))
        .route("/events", get(events_handler))
        .route("/test_motion", post(test_motion_handler))
        .route("/cameras", get(cameras_handler))
        .route("/health", get(health_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// HTTP server exposing camera streams, the active camera and motion events
pub struct StreamServer {
    pub(crate) config: StreamConfig,
    pub(crate) hub: Arc<CameraHub>,
}

impl StreamServer {
    pub fn new(config: StreamConfig, hub: Arc<CameraHub>) -> Self {
        Self { config, hub }
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.config.ip, self.config.port)
    }

    /// Bind and serve until `shutdown` is cancelled
    pub async fn run(&self, shutdown: CancellationToken) -> Result<()> {
        let addr = self.address();
        info!("Starting camera stream server on {}", addr);

        let listener =
            tokio::net::TcpListener::bind(&addr)
                .await
                .map_err(|e| StreamError::BindFailed {
                    address: addr.clone(),
                    source: e,
                })?;

        info!("Stream server listening on {}", addr);

        axum::serve(listener, router(Arc::clone(&self.hub)))
            .with_graceful_shutdown(shutdown.cancelled_owned())
            .await
            .map_err(|e| StreamError::StartupFailed {
                details: format!("Server error: {}", e),
            })?;

        info!("Stream server on {} stopped", addr);
        Ok(())
    }
}

/// Stream server builder for configuration
#[derive(Default)]
pub struct StreamServerBuilder {
    config: Option<StreamConfig>,
    hub: Option<Arc<CameraHub>>,
}

impl StreamServerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the stream configuration
    pub fn config(mut self, config: StreamConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the camera hub that serves the streams
    pub fn hub(mut self, hub: Arc<CameraHub>) -> Self {
        self.hub = Some(hub);
        self
    }

    pub fn build(self) -> Result<StreamServer> {
        let config = self.config.ok_or_else(|| {
            CamwatchError::Stream(StreamError::StartupFailed {
                details: "Stream configuration is required".to_string(),
            })
        })?;

        let hub = self.hub.ok_or_else(|| {
            CamwatchError::Stream(StreamError::StartupFailed {
                details: "Camera hub is required".to_string(),
            })
        })?;

        Ok(StreamServer::new(config, hub))
    }
}
