use super::camera_hub::CameraHub;
use super::status::CameraEntry;
use crate::analyzer::{DetectorHandle, DetectorState, MotionDetector};
use crate::camera_id::CameraId;
use crate::error::{CamwatchError, Result};
use crate::events::CamwatchEvent;
use crate::registry::RegistryChange;
use crate::source::SourceKind;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

impl CameraHub {
    /// Attach every registered camera and follow registry changes from then on
    pub async fn start(self: &Arc<Self>) -> Result<()> {
        if self.follower.lock().is_some() {
            return Err(CamwatchError::component(
                "camera_hub",
                "Camera hub already started",
            ));
        }

        info!("Starting camera hub with {} slots", self.slots);

        // Subscribe before the snapshot so no change falls in between
        let changes = self.registry.subscribe();
        for (camera_id, location) in self.registry.list_cameras().await {
            self.apply_change(RegistryChange::Added {
                camera_id,
                location,
            })
            .await;
        }

        let hub = Arc::clone(self);
        let follower = tokio::spawn(async move { hub.follow_registry(changes).await });
        *self.follower.lock() = Some(follower);

        info!(
            "Camera hub running: {} cameras, {} detectors",
            self.cameras.read().len(),
            self.detector_states().len()
        );
        Ok(())
    }

    async fn follow_registry(self: Arc<Self>, mut changes: broadcast::Receiver<RegistryChange>) {
        loop {
            let change = tokio::select! {
                biased;
                _ = self.root_token.cancelled() => break,
                change = changes.recv() => change,
            };

            match change {
                Ok(change) => self.apply_change(change).await,
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(
                        "Camera hub missed {} registry changes, resynchronizing",
                        missed
                    );
                    self.resync().await;
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Registry change feed closed");
                    break;
                }
            }
        }
    }

    /// Bring the camera table in line with one registry change
    pub async fn apply_change(&self, change: RegistryChange) {
        let _serialized = self.changes_lock.lock().await;
        if self.root_token.is_cancelled() {
            return;
        }

        match change {
            RegistryChange::Added {
                camera_id,
                location,
            } => {
                self.detach(&camera_id).await;
                self.attach(camera_id.clone(), location.clone()).await;
                self.publish(CamwatchEvent::CameraAdded {
                    camera_id,
                    location,
                });
            }
            RegistryChange::Removed { camera_id } => {
                self.detach(&camera_id).await;
                if self.is_slot(&camera_id) {
                    let entry = CameraEntry::placeholder(true, self.root_token.child_token());
                    self.cameras.write().insert(camera_id.clone(), entry);
                } else {
                    self.cameras.write().remove(&camera_id);
                }
                self.publish(CamwatchEvent::CameraRemoved { camera_id });
            }
        }
    }

    /// Re-add everything from a fresh registry snapshot and drop what is gone
    async fn resync(&self) {
        let snapshot = self.registry.list_cameras().await;
        let stale: Vec<CameraId> = self
            .cameras
            .read()
            .iter()
            .filter(|(id, entry)| entry.location.is_some() && !snapshot.contains_key(*id))
            .map(|(id, _)| id.clone())
            .collect();

        for camera_id in stale {
            self.apply_change(RegistryChange::Removed { camera_id }).await;
        }
        for (camera_id, location) in snapshot {
            self.apply_change(RegistryChange::Added {
                camera_id,
                location,
            })
            .await;
        }
    }

    /// Open a camera's source and start its detector; failures leave a placeholder
    async fn attach(&self, camera_id: CameraId, location: String) {
        let slot = self.is_slot(&camera_id);
        let token = self.root_token.child_token();
        let kind = SourceKind::classify(&location);

        let mut entry = CameraEntry::placeholder(slot, token.clone());
        entry.location = Some(location.clone());

        if kind == SourceKind::Dummy {
            info!("Camera {} configured as placeholder", camera_id);
        } else {
            match self.opener.open(&location).await {
                Ok(source) => {
                    entry.kind = source.kind();
                    let detector = MotionDetector::new(
                        camera_id.clone(),
                        source,
                        &self.detector_config,
                        Arc::clone(&self.active),
                        Arc::clone(&self.event_bus),
                        token,
                    );
                    entry.detector = Some(detector.spawn());
                    info!(
                        "Camera {} attached to {} ({:?})",
                        camera_id, location, entry.kind
                    );
                }
                Err(e) => {
                    warn!(
                        "Camera {} could not open {}: {}, serving placeholder frames",
                        camera_id, location, e
                    );
                    entry.error = Some(e.to_string());
                }
            }
        }

        self.cameras.write().insert(camera_id, entry);
    }

    /// Cancel a camera's detector and viewer streams and wait for the detector to exit
    async fn detach(&self, camera_id: &CameraId) -> Option<DetectorState> {
        let detector = {
            let mut cameras = self.cameras.write();
            let entry = cameras.get_mut(camera_id)?;
            entry.token.cancel();
            entry.detector.take()
        }?;

        Some(self.stop_detector(detector).await)
    }

    async fn stop_detector(&self, detector: DetectorHandle) -> DetectorState {
        let camera_id = detector.camera_id().clone();
        let state = detector.stop(self.stop_timeout).await;
        debug!("Detector for camera {} ended as {:?}", camera_id, state);
        state
    }

    /// Stop following the registry, cancel every camera and wait for all detectors
    pub async fn shutdown(&self) {
        info!("Shutting down camera hub");
        self.root_token.cancel();

        let follower = self.follower.lock().take();
        if let Some(follower) = follower {
            if let Err(e) = follower.await {
                error!("Registry follower task failed: {}", e);
            }
        }

        let _serialized = self.changes_lock.lock().await;
        let detectors: Vec<DetectorHandle> = self
            .cameras
            .write()
            .values_mut()
            .filter_map(|entry| entry.detector.take())
            .collect();

        let stops = detectors
            .into_iter()
            .map(|detector| self.stop_detector(detector));
        let states = futures::future::join_all(stops).await;

        info!("Camera hub stopped {} detectors", states.len());
    }

    fn publish(&self, event: CamwatchEvent) {
        if let Err(e) = self.event_bus.publish(event) {
            debug!("Camera hub event not delivered: {}", e);
        }
    }
}
