use crate::analyzer::{DetectorHandle, DetectorState};
use crate::camera_id::CameraId;
use crate::source::SourceKind;
use crate::streaming::StreamTarget;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

/// One row of the hub's camera table
pub(super) struct CameraEntry {
    pub(super) location: Option<String>,
    pub(super) kind: SourceKind,
    pub(super) slot: bool,
    pub(super) token: CancellationToken,
    pub(super) detector: Option<DetectorHandle>,
    pub(super) error: Option<String>,
}

impl CameraEntry {
    /// Placeholder camera with no physical source
    pub(super) fn placeholder(slot: bool, token: CancellationToken) -> Self {
        Self {
            location: None,
            kind: SourceKind::Dummy,
            slot,
            token,
            detector: None,
            error: None,
        }
    }

    pub(super) fn stream_target(&self) -> StreamTarget {
        match (&self.location, self.kind) {
            (Some(location), SourceKind::Live | SourceKind::File) => StreamTarget::Source {
                location: location.clone(),
            },
            _ => StreamTarget::Placeholder,
        }
    }

    pub(super) fn status(&self, camera_id: &CameraId) -> CameraStatus {
        CameraStatus {
            camera_id: camera_id.clone(),
            kind: self.kind,
            location: self.location.clone(),
            slot: self.slot,
            detector: self.detector.as_ref().map(|d| d.state()),
            error: self.error.clone(),
        }
    }
}

/// Externally visible state of one camera
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CameraStatus {
    pub camera_id: CameraId,
    pub kind: SourceKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub slot: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detector: Option<DetectorState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
