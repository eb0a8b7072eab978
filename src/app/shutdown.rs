use super::{CamwatchOrchestrator, Component, ComponentState};
use crate::error::{CamwatchError, Result};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{error, info, warn};

const SERVER_STOP_TIMEOUT: Duration = Duration::from_secs(5);

impl CamwatchOrchestrator {
    /// Stop the hub, then drain the HTTP adapter
    ///
    /// Returns 1 if any component failed along the way, 0 otherwise.
    pub async fn shutdown(&mut self) -> Result<i32> {
        info!("Beginning graceful shutdown");

        // Stop accepting connections and cancel background tasks
        self.cancellation_token.cancel();

        // Camera hub first: it ends every open viewer stream and event feed,
        // which lets the server finish draining
        if let Err(e) = self.stop_hub().await {
            error!("Error stopping camera hub: {}", e);
        }

        if self.stream_server_enabled {
            if let Err(e) = self.stop_stream_server().await {
                error!("Error stopping stream server: {}", e);
            }
        }

        let exit_code = if self.has_failed_component().await { 1 } else { 0 };
        info!("Graceful shutdown completed with exit code: {}", exit_code);
        Ok(exit_code)
    }

    async fn stop_hub(&mut self) -> Result<()> {
        self.set_component_state(Component::Hub, ComponentState::Stopping)
            .await;

        // Each detector is bounded by the stop timeout; allow for the slowest
        let budget = self.config.system.stop_timeout() + Duration::from_secs(1);
        match timeout(budget, self.hub.shutdown()).await {
            Ok(()) => {
                self.set_component_state(Component::Hub, ComponentState::Stopped)
                    .await;
                info!("Camera hub stopped");
                Ok(())
            }
            Err(_) => {
                self.set_component_state(
                    Component::Hub,
                    ComponentState::failed("stop timed out"),
                )
                .await;
                Err(CamwatchError::system("camera hub stop timeout"))
            }
        }
    }

    async fn stop_stream_server(&mut self) -> Result<()> {
        // Already exited on its own; run() recorded why
        let Some(task) = self.stream_server_task.take() else {
            return Ok(());
        };

        self.set_component_state(Component::StreamServer, ComponentState::Stopping)
            .await;

        let outcome = match timeout(SERVER_STOP_TIMEOUT, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(CamwatchError::system(format!(
                "stream server task failed: {}",
                e
            ))),
            Err(_) => {
                warn!("Stream server did not drain in {:?}", SERVER_STOP_TIMEOUT);
                Err(CamwatchError::system("stream server stop timeout"))
            }
        };

        let state = match &outcome {
            Ok(()) => ComponentState::Stopped,
            Err(e) => ComponentState::failed(e.to_string()),
        };
        self.set_component_state(Component::StreamServer, state).await;
        if outcome.is_ok() {
            info!("Stream server stopped");
        }
        outcome
    }
}
