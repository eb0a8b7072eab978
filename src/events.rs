use crate::camera_id::CameraId;
use crate::error::EventBusError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// A qualifying change detected on one camera. Emitted once, never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotionEvent {
    pub camera_id: CameraId,
    pub changed_pixel_count: u32,
    pub timestamp: DateTime<Utc>,
}

impl MotionEvent {
    pub fn new(camera_id: CameraId, changed_pixel_count: u32) -> Self {
        Self {
            camera_id,
            changed_pixel_count,
            timestamp: Utc::now(),
        }
    }
}

/// Events that can occur in the camwatch system
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CamwatchEvent {
    /// Motion crossed the threshold on a camera (or was triggered manually)
    MotionDetected(MotionEvent),
    /// The active camera register changed value
    ActiveCameraChanged {
        previous: CameraId,
        current: CameraId,
        timestamp: DateTime<Utc>,
    },
    /// A camera was added or replaced in the registry
    CameraAdded {
        camera_id: CameraId,
        location: String,
    },
    /// A camera was removed from the registry
    CameraRemoved { camera_id: CameraId },
    /// A detector stopped for good and will not report motion again
    DetectorTerminated { camera_id: CameraId, reason: String },
    /// A system error occurred in a component
    SystemError { component: String, error: String },
}

impl CamwatchEvent {
    /// Get a human-readable description of the event
    pub fn description(&self) -> String {
        match self {
            CamwatchEvent::MotionDetected(motion) => format!(
                "Motion detected on camera {} ({} pixels changed)",
                motion.camera_id, motion.changed_pixel_count
            ),
            CamwatchEvent::ActiveCameraChanged {
                previous, current, ..
            } => {
                format!("Active camera changed {} -> {}", previous, current)
            }
            CamwatchEvent::CameraAdded {
                camera_id,
                location,
            } => {
                format!("Camera {} added ({})", camera_id, location)
            }
            CamwatchEvent::CameraRemoved { camera_id } => {
                format!("Camera {} removed", camera_id)
            }
            CamwatchEvent::DetectorTerminated { camera_id, reason } => {
                format!("Detector for camera {} terminated: {}", camera_id, reason)
            }
            CamwatchEvent::SystemError { component, error } => {
                format!("Error in {}: {}", component, error)
            }
        }
    }

    /// Get the event type as a string for filtering and push message naming
    pub fn event_type(&self) -> &'static str {
        match self {
            CamwatchEvent::MotionDetected(_) => "motion_detected",
            CamwatchEvent::ActiveCameraChanged { .. } => "active_camera_changed",
            CamwatchEvent::CameraAdded { .. } => "camera_added",
            CamwatchEvent::CameraRemoved { .. } => "camera_removed",
            CamwatchEvent::DetectorTerminated { .. } => "detector_terminated",
            CamwatchEvent::SystemError { .. } => "system_error",
        }
    }
}

/// Async event bus for component coordination using broadcast channels
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CamwatchEvent>,
}

impl EventBus {
    /// Create a new event bus with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to events and get a receiver
    pub fn subscribe(&self) -> broadcast::Receiver<CamwatchEvent> {
        self.sender.subscribe()
    }

    /// Subscribe to motion events only
    pub fn subscribe_motion(&self) -> MotionSubscription {
        MotionSubscription {
            inner: EventReceiver::new(
                self.sender.subscribe(),
                EventFilter::EventTypes(vec!["motion_detected"]),
                "motion".to_string(),
            ),
        }
    }

    /// Publish an event to all subscribers
    pub fn publish(&self, event: CamwatchEvent) -> Result<usize, EventBusError> {
        match &event {
            CamwatchEvent::MotionDetected(motion) => {
                info!(
                    "[MOTION] camera {} - pixels changed: {}",
                    motion.camera_id, motion.changed_pixel_count
                );
            }
            CamwatchEvent::DetectorTerminated { camera_id, reason } => {
                warn!("Detector for camera {} terminated: {}", camera_id, reason);
            }
            CamwatchEvent::SystemError { component, error } => {
                error!("System error in {}: {}", component, error);
            }
            _ => debug!("Event: {}", event.description()),
        }

        self.sender
            .send(event)
            .map_err(|e| EventBusError::PublishFailed {
                details: e.to_string(),
            })
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Check if there are any active subscribers
    pub fn has_subscribers(&self) -> bool {
        self.sender.receiver_count() > 0
    }
}

/// Event filter for selective event handling
#[derive(Debug, Clone)]
pub enum EventFilter {
    /// Accept all events
    All,
    /// Accept only specific event types
    EventTypes(Vec<&'static str>),
    /// Accept events concerning specific cameras
    Cameras(Vec<CameraId>),
}

impl EventFilter {
    /// Check if an event passes this filter
    pub fn matches(&self, event: &CamwatchEvent) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::EventTypes(types) => types.contains(&event.event_type()),
            EventFilter::Cameras(cameras) => match event {
                CamwatchEvent::MotionDetected(motion) => cameras.contains(&motion.camera_id),
                CamwatchEvent::ActiveCameraChanged { current, .. } => cameras.contains(current),
                CamwatchEvent::CameraAdded { camera_id, .. }
                | CamwatchEvent::CameraRemoved { camera_id }
                | CamwatchEvent::DetectorTerminated { camera_id, .. } => {
                    cameras.contains(camera_id)
                }
                CamwatchEvent::SystemError { .. } => false,
            },
        }
    }
}

/// Event receiver with filtering
pub struct EventReceiver {
    receiver: broadcast::Receiver<CamwatchEvent>,
    filter: EventFilter,
    name: String,
}

impl EventReceiver {
    /// Create a new event receiver with a filter
    pub fn new(
        receiver: broadcast::Receiver<CamwatchEvent>,
        filter: EventFilter,
        name: String,
    ) -> Self {
        Self {
            receiver,
            filter,
            name,
        }
    }

    /// Receive the next filtered event.
    ///
    /// A lagging receiver skips what it missed and keeps going, so a slow
    /// subscriber loses old events rather than its subscription.
    pub async fn recv(&mut self) -> Result<CamwatchEvent, EventBusError> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => {
                    if self.filter.matches(&event) {
                        debug!(
                            "Receiver '{}' received event: {}",
                            self.name,
                            event.description()
                        );
                        return Ok(event);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Receiver '{}' lagged behind by {} events", self.name, n);
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Event bus closed for receiver '{}'", self.name);
                    return Err(EventBusError::ChannelClosed);
                }
            }
        }
    }

    /// Try to receive an event without blocking
    pub fn try_recv(&mut self) -> Result<Option<CamwatchEvent>, EventBusError> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.filter.matches(&event) {
                        return Ok(Some(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => {
                    return Ok(None);
                }
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    warn!("Receiver '{}' lagged behind by {} events", self.name, n);
                }
                Err(broadcast::error::TryRecvError::Closed) => {
                    return Err(EventBusError::ChannelClosed);
                }
            }
        }
    }
}

/// Stream of motion events handed to notification transports
pub struct MotionSubscription {
    inner: EventReceiver,
}

impl MotionSubscription {
    /// Wait for the next motion event
    pub async fn recv(&mut self) -> Result<MotionEvent, EventBusError> {
        loop {
            if let CamwatchEvent::MotionDetected(motion) = self.inner.recv().await? {
                return Ok(motion);
            }
        }
    }

    /// Take a pending motion event, if any
    pub fn try_recv(&mut self) -> Result<Option<MotionEvent>, EventBusError> {
        loop {
            match self.inner.try_recv()? {
                Some(CamwatchEvent::MotionDetected(motion)) => return Ok(Some(motion)),
                Some(_) => continue,
                None => return Ok(None),
            }
        }
    }
}
