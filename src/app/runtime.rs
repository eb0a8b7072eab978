use super::{CamwatchOrchestrator, Component, ComponentState, ShutdownReason};
use crate::error::{CamwatchError, Result};
use tokio::signal;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{error, info};

impl CamwatchOrchestrator {
    /// Run until a signal, a shutdown request or the HTTP adapter exiting,
    /// then shut down gracefully
    pub async fn run(&mut self) -> Result<i32> {
        let shutdown_sender = self
            .shutdown_sender
            .take()
            .ok_or_else(|| CamwatchError::system("Shutdown sender already taken"))?;

        let shutdown_receiver = self
            .shutdown_receiver
            .take()
            .ok_or_else(|| CamwatchError::system("Shutdown receiver already taken"))?;

        let signals = tokio::spawn(forward_shutdown_signal(shutdown_sender));
        info!("Camwatch system is running");

        let shutdown_reason = tokio::select! {
            reason = shutdown_receiver => reason.map_err(|_| {
                CamwatchError::system("Shutdown channel closed unexpectedly")
            })?,
            _ = self.cancellation_token.cancelled() => ShutdownReason::UserRequest,
            exit = server_exit(&mut self.stream_server_task) => ShutdownReason::ServerExited(exit),
        };
        signals.abort();

        if let ShutdownReason::ServerExited(why) = &shutdown_reason {
            // The join handle has already been consumed
            self.stream_server_task = None;
            self.set_component_state(Component::StreamServer, ComponentState::failed(why.clone()))
                .await;
        }

        info!("Shutdown initiated: {:?}", shutdown_reason);

        let exit_code = self.shutdown().await?;

        info!("Camwatch system shutdown complete");
        Ok(exit_code)
    }
}

/// Resolves when the stream server task finishes; never resolves without one
async fn server_exit(task: &mut Option<JoinHandle<Result<()>>>) -> String {
    let Some(task) = task else {
        return std::future::pending().await;
    };
    match task.await {
        Ok(Ok(())) => "stream server stopped unexpectedly".to_string(),
        Ok(Err(e)) => e.to_string(),
        Err(e) => format!("stream server task failed: {}", e),
    }
}

async fn forward_shutdown_signal(sender: oneshot::Sender<ShutdownReason>) {
    let name = wait_for_signal().await;
    info!("Received {} signal", name);
    let _ = sender.send(ShutdownReason::Signal(name));
}

#[cfg(unix)]
async fn wait_for_signal() -> &'static str {
    use signal::unix::{signal, SignalKind};

    // SIGTERM (systemd stop)
    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => tokio::select! {
            _ = sigterm.recv() => "SIGTERM",
            _ = ctrl_c() => "SIGINT",
        },
        Err(e) => {
            error!("Failed to register SIGTERM handler: {}", e);
            ctrl_c().await;
            "SIGINT"
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> &'static str {
    ctrl_c().await;
    "SIGINT"
}

async fn ctrl_c() {
    if let Err(e) = signal::ctrl_c().await {
        error!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}
