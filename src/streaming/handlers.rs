use crate::camera_id::CameraId;
use crate::error::CamwatchError;
use crate::events::CamwatchEvent;
use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        Html, IntoResponse, Response,
    },
    Json,
};
use futures::{Stream, StreamExt};
use serde::Deserialize;
use std::convert::Infallible;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, warn};

use super::encode::{multipart_part, MULTIPART_CONTENT_TYPE};
use super::server::ServerState;

/// Body of a manual motion trigger; ids may be sent as strings or numbers
#[derive(Debug, Deserialize)]
pub struct TestMotionRequest {
    pub cam_id: serde_json::Value,
}

impl TestMotionRequest {
    fn camera_id(&self) -> Option<CameraId> {
        match &self.cam_id {
            serde_json::Value::String(id) => Some(CameraId::from(id.as_str())),
            serde_json::Value::Number(id) => Some(CameraId::from(id.to_string())),
            _ => None,
        }
    }
}

fn error_response(error: CamwatchError) -> Response {
    let status = match error {
        CamwatchError::NotFound { .. } => StatusCode::NOT_FOUND,
        _ => {
            error!("Request failed: {}", error);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };

    (
        status,
        Json(serde_json::json!({ "error": error.to_string() })),
    )
        .into_response()
}

/// Handler for the multipart JPEG stream of one camera
pub async fn stream_handler(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> Response {
    let camera_id = CameraId::from(id);

    let frames = match state.hub.open_stream(&camera_id) {
        Ok(frames) => frames,
        Err(e) => {
            debug!("Rejected stream request for camera {}: {}", camera_id, e);
            return error_response(e);
        }
    };
    info!("New stream client for camera {}", camera_id);

    let parts = frames.map(|jpeg| Ok::<_, Infallible>(multipart_part(&jpeg)));

    (
        [
            (header::CONTENT_TYPE, MULTIPART_CONTENT_TYPE),
            (header::CACHE_CONTROL, "no-cache, private"),
            (header::PRAGMA, "no-cache"),
        ],
        Body::from_stream(parts),
    )
        .into_response()
}

/// Handler for the active camera query
pub async fn active_camera_handler(State(state): State<ServerState>) -> impl IntoResponse {
    Json(serde_json::json!({ "camera_id": state.hub.active_camera() }))
}

/// Server-sent events: `motion_detected` and `active_camera_changed`, both
/// carrying the camera id as data
pub async fn events_handler(
    State(state): State<ServerState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mut receiver = state.hub.event_bus().subscribe();
    let shutdown = state.hub.lifetime_token();
    info!("New event feed client connected");

    let events = async_stream::stream! {
        loop {
            let received = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                received = receiver.recv() => received,
            };

            match received {
                Ok(CamwatchEvent::MotionDetected(motion)) => {
                    yield Ok::<_, Infallible>(
                        Event::default()
                            .event("motion_detected")
                            .data(motion.camera_id.to_string()),
                    );
                }
                Ok(CamwatchEvent::ActiveCameraChanged { current, .. }) => {
                    yield Ok(
                        Event::default()
                            .event("active_camera_changed")
                            .data(current.to_string()),
                    );
                }
                Ok(_) => {}
                Err(RecvError::Lagged(missed)) => {
                    warn!("Event feed client lagged behind by {} events", missed);
                }
                Err(RecvError::Closed) => break,
            }
        }
        debug!("Event feed client stream ended");
    };

    Sse::new(events).keep_alive(KeepAlive::default())
}

/// Handler for manual motion triggers
pub async fn test_motion_handler(
    State(state): State<ServerState>,
    Json(request): Json<TestMotionRequest>,
) -> Response {
    let Some(camera_id) = request.camera_id() else {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "cam_id must be a string or number" })),
        )
            .into_response();
    };

    match state.hub.trigger_test_motion(&camera_id) {
        Ok(event) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "status": "triggered",
                "camera_id": event.camera_id,
                "timestamp": event.timestamp,
            })),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

/// Handler for the camera table
pub async fn cameras_handler(State(state): State<ServerState>) -> impl IntoResponse {
    Json(state.hub.camera_statuses())
}

/// Handler for health check endpoint
pub async fn health_handler(State(state): State<ServerState>) -> impl IntoResponse {
    let detectors = state.hub.detector_states();
    let terminated = detectors.values().filter(|s| s.is_final()).count();

    let health_info = serde_json::json!({
        "status": if state.hub.is_shutting_down() { "stopping" } else { "healthy" },
        "active_camera": state.hub.active_camera(),
        "cameras": state.hub.camera_statuses().len(),
        "detectors": detectors,
        "terminated_detectors": terminated,
        "streaming": state.hub.stream_stats(),
        "server_info": {
            "subscribers": state.hub.event_bus().subscriber_count(),
        }
    });

    (StatusCode::OK, Json(health_info))
}

/// Simple HTML page showing the active camera's stream
pub async fn index_handler(State(state): State<ServerState>) -> impl IntoResponse {
    let active = state.hub.active_camera();

    let html = format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <title>camwatch</title>
    <style>
        :root {{ color-scheme: dark; }}
        body {{
            margin: 0;
            background: #000;
            display: flex;
            align-items: center;
            justify-content: center;
            min-height: 100vh;
        }}
        img.stream {{
            display: block;
            max-width: 100vw;
            max-height: 100vh;
            object-fit: contain;
        }}
    </style>
</head>
<body>
    <img class="stream" id="stream" src="/stream/{src}" alt="Camera {alt}">
    <script>
        const events = new EventSource("/events");
        events.addEventListener("active_camera_changed", (e) => {{
            document.getElementById("stream").src = "/stream/" + encodeURIComponent(e.data);
        }});
    </script>
</body>
</html>
"#,
        src = urlencoding::encode(active.as_str()),
        alt = escape_html(active.as_str()),
    );

    Html(html)
}

/// Escape text for use inside an HTML element or quoted attribute
fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}
