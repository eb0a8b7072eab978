use super::motion::MotionAnalyzer;
use crate::active::ActiveCamera;
use crate::camera_id::CameraId;
use crate::config::DetectorConfig;
use crate::error::SourceError;
use crate::events::{CamwatchEvent, EventBus, MotionEvent};
use crate::frame::Frame;
use crate::recovery::{ReadRecovery, RecoveryAction, RecoveryConfig};
use crate::source::{FrameSource, SourceKind};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Lifecycle of a motion detector
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DetectorState {
    /// Reading the first frame pair
    Priming,
    /// Comparing frame pairs
    Running,
    /// Rewinding a file source after its last frame
    Resetting,
    /// Stopped for good after a failure; never restarts on its own
    Terminated { reason: String },
    /// Stopped by cancellation
    Stopped,
}

impl DetectorState {
    pub fn is_final(&self) -> bool {
        matches!(
            self,
            DetectorState::Terminated { .. } | DetectorState::Stopped
        )
    }
}

enum Advance {
    Frame(Frame),
    Reprimed(Frame, Frame),
    Cancelled,
}

/// Frame-differencing motion detector for one camera.
///
/// Owns its source exclusively and closes it when the run ends, so the
/// source is only released after the detector has stopped reading.
pub struct MotionDetector {
    camera_id: CameraId,
    source: Box<dyn FrameSource>,
    analyzer: MotionAnalyzer,
    config: DetectorConfig,
    active: Arc<ActiveCamera>,
    event_bus: Arc<EventBus>,
    cancel: CancellationToken,
    recovery: ReadRecovery,
    state_tx: watch::Sender<DetectorState>,
    frames_processed: u64,
}

impl MotionDetector {
    pub fn new(
        camera_id: CameraId,
        source: Box<dyn FrameSource>,
        config: &DetectorConfig,
        active: Arc<ActiveCamera>,
        event_bus: Arc<EventBus>,
        cancel: CancellationToken,
    ) -> Self {
        let (state_tx, _) = watch::channel(DetectorState::Priming);
        let recovery = ReadRecovery::new(
            format!("camera {}", camera_id),
            RecoveryConfig::from(config),
        );

        Self {
            camera_id,
            source,
            analyzer: MotionAnalyzer::new(config),
            config: config.clone(),
            active,
            event_bus,
            cancel,
            recovery,
            state_tx,
            frames_processed: 0,
        }
    }

    pub fn camera_id(&self) -> &CameraId {
        &self.camera_id
    }

    /// Watch the detector's state
    pub fn subscribe_state(&self) -> watch::Receiver<DetectorState> {
        self.state_tx.subscribe()
    }

    /// Run the detector on its own task
    pub fn spawn(self) -> DetectorHandle {
        let camera_id = self.camera_id.clone();
        let cancel = self.cancel.clone();
        let state = self.subscribe_state();
        let task = tokio::spawn(self.run());

        DetectorHandle {
            camera_id,
            cancel,
            state,
            task,
        }
    }

    /// Run until cancelled or terminated, returning the final state
    pub async fn run(mut self) -> DetectorState {
        info!("Starting motion detection for camera {}", self.camera_id);

        let final_state = match self.detect().await {
            Ok(()) => DetectorState::Stopped,
            Err(reason) => DetectorState::Terminated { reason },
        };

        self.source.close().await;

        match &final_state {
            DetectorState::Terminated { reason } => {
                error!(
                    "Motion detection for camera {} terminated: {}",
                    self.camera_id, reason
                );
                let _ = self.event_bus.publish(CamwatchEvent::DetectorTerminated {
                    camera_id: self.camera_id.clone(),
                    reason: reason.clone(),
                });
            }
            _ => info!(
                "Motion detection for camera {} stopped after {} frame pairs",
                self.camera_id, self.frames_processed
            ),
        }

        self.set_state(final_state.clone());
        final_state
    }

    async fn detect(&mut self) -> Result<(), String> {
        self.set_state(DetectorState::Priming);
        let Some((mut previous, mut current)) = self.prime().await? else {
            return Ok(());
        };
        self.set_state(DetectorState::Running);

        while !self.cancel.is_cancelled() {
            match self.analyzer.evaluate(&previous.image, &current.image) {
                Ok(Some(changed)) => {
                    self.report_motion(changed);
                    if !pause(&self.cancel, self.config.cooldown()).await {
                        break;
                    }
                }
                Ok(None) => {}
                Err(e) => warn!(
                    "Skipping frame pair {}/{} on camera {}: {}",
                    previous.id, current.id, self.camera_id, e
                ),
            }

            self.frames_processed += 1;
            if self.frames_processed % 100 == 0 {
                debug!(
                    "Camera {} processed {} frame pairs",
                    self.camera_id, self.frames_processed
                );
            }

            match self.advance().await? {
                Advance::Frame(next) => previous = std::mem::replace(&mut current, next),
                Advance::Reprimed(first, second) => {
                    previous = first;
                    current = second;
                }
                Advance::Cancelled => break,
            }

            if !pause(&self.cancel, self.config.idle()).await {
                break;
            }
        }

        Ok(())
    }

    /// Read two consecutive frames; `None` when cancelled
    async fn prime(&mut self) -> Result<Option<(Frame, Frame)>, String> {
        let mut pair = Vec::with_capacity(2);
        for which in ["initial", "second"] {
            match self.read().await {
                None => return Ok(None),
                Some(Ok(frame)) => pair.push(frame),
                Some(Err(e)) => {
                    return Err(format!(
                        "could not read {} frame from {}: {}",
                        which,
                        self.source.location(),
                        e
                    ))
                }
            }
        }

        let current = pair.pop();
        let previous = pair.pop();
        Ok(previous.zip(current))
    }

    /// Read the next frame, rewinding file sources at the end
    async fn advance(&mut self) -> Result<Advance, String> {
        loop {
            let Some(result) = self.read().await else {
                return Ok(Advance::Cancelled);
            };

            match result {
                Ok(frame) => {
                    self.recovery.on_success();
                    return Ok(Advance::Frame(frame));
                }
                Err(SourceError::EndOfStream) if self.source.kind() == SourceKind::File => {
                    info!(
                        "[RESET] Camera {} reached end, restarting...",
                        self.camera_id
                    );
                    self.set_state(DetectorState::Resetting);
                    self.source
                        .reset()
                        .await
                        .map_err(|e| format!("could not reset source: {}", e))?;

                    return match self.prime().await? {
                        Some((first, second)) => {
                            self.set_state(DetectorState::Running);
                            Ok(Advance::Reprimed(first, second))
                        }
                        None => Ok(Advance::Cancelled),
                    };
                }
                Err(e) => match self.recovery.on_failure(&e) {
                    RecoveryAction::RetryAfterDelay(delay) => {
                        if !pause(&self.cancel, delay).await {
                            return Ok(Advance::Cancelled);
                        }
                    }
                    RecoveryAction::GiveUp => {
                        return Err(format!(
                            "{} consecutive read failures, last: {}",
                            self.recovery.consecutive_failures(),
                            e
                        ));
                    }
                },
            }
        }
    }

    async fn read(&mut self) -> Option<Result<Frame, SourceError>> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            result = self.source.read_frame() => Some(result),
        }
    }

    fn report_motion(&self, changed: u32) {
        let previous = self.active.set(self.camera_id.clone());
        if previous != self.camera_id {
            self.publish(CamwatchEvent::ActiveCameraChanged {
                previous,
                current: self.camera_id.clone(),
                timestamp: Utc::now(),
            });
        }

        self.publish(CamwatchEvent::MotionDetected(MotionEvent::new(
            self.camera_id.clone(),
            changed,
        )));
    }

    fn publish(&self, event: CamwatchEvent) {
        if let Err(e) = self.event_bus.publish(event) {
            debug!("No subscribers for camera {} event: {}", self.camera_id, e);
        }
    }

    fn set_state(&self, state: DetectorState) {
        self.state_tx.send_replace(state);
    }
}

/// Sleep unless cancelled first; returns whether to keep going
async fn pause(cancel: &CancellationToken, duration: Duration) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}

/// Owner's handle on a spawned detector
pub struct DetectorHandle {
    camera_id: CameraId,
    cancel: CancellationToken,
    state: watch::Receiver<DetectorState>,
    task: JoinHandle<DetectorState>,
}

impl DetectorHandle {
    pub fn camera_id(&self) -> &CameraId {
        &self.camera_id
    }

    pub fn state(&self) -> DetectorState {
        self.state.borrow().clone()
    }

    pub fn state_receiver(&self) -> watch::Receiver<DetectorState> {
        self.state.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the detector to finish on its own
    pub async fn join(self) -> DetectorState {
        match self.task.await {
            Ok(state) => state,
            Err(e) => DetectorState::Terminated {
                reason: format!("detector task failed: {}", e),
            },
        }
    }

    /// Cancel the detector and wait up to `timeout` for it to wind down
    pub async fn stop(self, timeout: Duration) -> DetectorState {
        self.cancel.cancel();
        let camera_id = self.camera_id.clone();
        let state = self.state.clone();

        match tokio::time::timeout(timeout, self.join()).await {
            Ok(final_state) => final_state,
            Err(_) => {
                warn!(
                    "Detector for camera {} did not stop within {:?}",
                    camera_id, timeout
                );
                let last = state.borrow().clone();
                last
            }
        }
    }
}
