use super::{CamwatchOrchestrator, Component, ComponentState};
use crate::error::Result;
use tracing::{error, info};

impl CamwatchOrchestrator {
    /// Register every enabled component as stopped
    pub async fn initialize(&mut self) -> Result<()> {
        info!("Initializing Camwatch system components");

        let mut states = self.component_states.lock().await;
        states.insert(Component::Hub, ComponentState::Stopped);
        if self.stream_server_enabled {
            states.insert(Component::StreamServer, ComponentState::Stopped);
        }
        drop(states);

        info!("All components initialized successfully");
        Ok(())
    }

    /// Start the camera hub, then the HTTP adapter
    pub async fn start(&mut self) -> Result<()> {
        info!("Starting Camwatch system");

        self.set_component_state(Component::Hub, ComponentState::Starting)
            .await;
        if let Err(e) = self.hub.start().await {
            error!("Failed to start camera hub: {}", e);
            self.set_component_state(Component::Hub, ComponentState::failed(e.to_string()))
                .await;
            return Err(e);
        }
        self.set_component_state(Component::Hub, ComponentState::Running)
            .await;

        if self.stream_server_enabled {
            self.start_stream_server().await?;
        }

        info!("Camwatch system started successfully");
        Ok(())
    }

    #[cfg(feature = "streaming")]
    async fn start_stream_server(&mut self) -> Result<()> {
        use crate::streaming::StreamServerBuilder;
        use std::sync::Arc;

        self.set_component_state(Component::StreamServer, ComponentState::Starting)
            .await;

        let server = match StreamServerBuilder::new()
            .config(self.config.stream.clone())
            .hub(Arc::clone(&self.hub))
            .build()
        {
            Ok(server) => server,
            Err(e) => {
                self.set_component_state(
                    Component::StreamServer,
                    ComponentState::failed(e.to_string()),
                )
                .await;
                return Err(e);
            }
        };
        let shutdown = self.cancellation_token.child_token();

        // Binding happens inside the task; a bind failure surfaces through run()
        self.stream_server_task = Some(tokio::spawn(async move {
            let result = server.run(shutdown).await;
            if let Err(e) = &result {
                error!("Stream server error: {}", e);
            }
            result
        }));

        self.set_component_state(Component::StreamServer, ComponentState::Running)
            .await;
        info!(
            "Streaming server started on {}:{}",
            self.config.stream.ip, self.config.stream.port
        );
        Ok(())
    }

    #[cfg(not(feature = "streaming"))]
    async fn start_stream_server(&mut self) -> Result<()> {
        Ok(())
    }
}
