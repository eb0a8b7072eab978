use super::*;
use crate::analyzer::DetectorState;
use crate::camera_id::CameraId;
use crate::config::{CamwatchConfig, DummyConfig};
use crate::error::CamwatchError;
use crate::events::CamwatchEvent;
use crate::registry::CameraRegistry;
use crate::source::SourceKind;
use crate::test_support::{frame_with_changes, ten_frame_clip, Script, ScriptedOpener};
use futures::StreamExt;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

fn test_config() -> CamwatchConfig {
    let mut config = CamwatchConfig::default();
    config.dummy = DummyConfig {
        width: 64,
        height: 48,
        ..DummyConfig::default()
    };
    config
}

fn still_feed() -> Script {
    Script::live(vec![frame_with_changes(0), frame_with_changes(10)])
}

async fn start_hub(cameras: &[(&str, &str)], opener: &Arc<ScriptedOpener>) -> Arc<CameraHub> {
    let registry = Arc::new(CameraRegistry::new(
        cameras
            .iter()
            .map(|(id, location)| (CameraId::from(*id), location.to_string()))
            .collect(),
    ));

    let hub = Arc::new(
        CameraHubBuilder::new()
            .config(test_config())
            .registry(registry)
            .opener(opener.clone())
            .build()
            .unwrap(),
    );
    hub.start().await.unwrap();
    hub
}

async fn wait_until<F: Fn() -> bool>(condition: F) {
    timeout(Duration::from_secs(10), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition reached in time");
}

#[tokio::test]
async fn test_builder_requires_registry() {
    let result = CameraHubBuilder::new().config(test_config()).build();
    assert!(matches!(result, Err(CamwatchError::Component { .. })));
}

#[tokio::test]
async fn test_slots_exist_as_placeholders() {
    let opener = Arc::new(ScriptedOpener::new());
    let hub = start_hub(&[], &opener).await;

    let statuses = hub.camera_statuses();
    assert_eq!(statuses.len(), 16);
    assert!(statuses.iter().all(|s| s.kind == SourceKind::Dummy && s.slot));
    assert!(hub.detector_states().is_empty());
    assert_eq!(hub.active_camera(), CameraId::from("0"));

    hub.shutdown().await;
}

#[tokio::test]
async fn test_unknown_ids_are_not_found() {
    let opener = Arc::new(ScriptedOpener::new());
    let hub = start_hub(&[], &opener).await;

    for id in ["16", "99", "07", "front-door"] {
        let camera_id = CameraId::from(id);
        assert!(matches!(
            hub.open_stream(&camera_id),
            Err(CamwatchError::NotFound { .. })
        ));
        assert!(matches!(
            hub.trigger_test_motion(&camera_id),
            Err(CamwatchError::NotFound { .. })
        ));
    }

    hub.shutdown().await;
}

#[tokio::test]
async fn test_manual_trigger_publishes_every_time() {
    let opener = Arc::new(ScriptedOpener::new());
    let hub = start_hub(&[], &opener).await;
    let mut motion = hub.subscribe_motion_events();

    hub.trigger_test_motion(&CameraId::from("3")).unwrap();
    hub.trigger_test_motion(&CameraId::from("3")).unwrap();

    for _ in 0..2 {
        let event = motion.recv().await.unwrap();
        assert_eq!(event.camera_id, CameraId::from("3"));
        assert_eq!(event.changed_pixel_count, 0);
    }
    // A manual trigger does not move the register
    assert_eq!(hub.active_camera(), CameraId::from("0"));

    hub.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_registered_clip_drives_register() {
    let opener = Arc::new(ScriptedOpener::new());
    let tracker = opener.insert("video7.mp4", Script::file(ten_frame_clip()));
    let hub = start_hub(&[("7", "video7.mp4")], &opener).await;
    let mut motion = hub.subscribe_motion_events();

    for traversal in 0..2 {
        let event = timeout(Duration::from_secs(30), motion.recv())
            .await
            .expect("one event per traversal")
            .unwrap();
        assert_eq!(event.camera_id, CameraId::from("7"));
        assert_eq!(event.changed_pixel_count, 6000);
        assert_eq!(hub.active_camera(), CameraId::from("7"));
        assert_eq!(tracker.resets(), traversal);
    }

    assert_eq!(
        hub.detector_states().get(&CameraId::from("7")),
        Some(&DetectorState::Running)
    );
    hub.shutdown().await;
    assert!(tracker.closed.load(Ordering::SeqCst));
}

#[tokio::test(start_paused = true)]
async fn test_removal_stops_only_that_camera() {
    let opener = Arc::new(ScriptedOpener::new());
    let tracker_3 = opener.insert("rtsp://porch/stream", still_feed());
    let tracker_20 = opener.insert("rtsp://yard/stream", still_feed());
    let hub = start_hub(
        &[("3", "rtsp://porch/stream"), ("20", "rtsp://yard/stream")],
        &opener,
    )
    .await;

    let mut state_3 = hub.watch_detector(&CameraId::from("3")).unwrap();
    wait_until(|| *state_3.borrow() == DetectorState::Running).await;

    hub.registry()
        .remove_camera(&CameraId::from("3"))
        .await
        .unwrap();
    state_3
        .wait_for(|s| *s == DetectorState::Stopped)
        .await
        .unwrap();
    wait_until(|| hub.camera_status(&CameraId::from("3")).unwrap().location.is_none()).await;

    // Slot 3 falls back to a placeholder; camera 20 keeps running
    let status = hub.camera_status(&CameraId::from("3")).unwrap();
    assert_eq!(status.kind, SourceKind::Dummy);
    assert!(status.detector.is_none());
    assert_eq!(tracker_3.closes(), 1);
    assert_eq!(
        hub.detector_states().get(&CameraId::from("20")),
        Some(&DetectorState::Running)
    );
    assert_eq!(tracker_20.closes(), 0);

    // Camera 20 is not a slot, so removal makes it unknown
    hub.registry()
        .remove_camera(&CameraId::from("20"))
        .await
        .unwrap();
    wait_until(|| hub.camera_status(&CameraId::from("20")).is_none()).await;
    assert!(matches!(
        hub.open_stream(&CameraId::from("20")),
        Err(CamwatchError::NotFound { .. })
    ));
    assert_eq!(tracker_20.closes(), 1);

    hub.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_cameras_added_at_runtime_are_attached() {
    let opener = Arc::new(ScriptedOpener::new());
    opener.insert("rtsp://garage/stream", still_feed());
    let hub = start_hub(&[], &opener).await;
    let mut events = hub.event_bus().subscribe();

    hub.registry()
        .add_camera(CameraId::from("garage"), "rtsp://garage/stream")
        .await
        .unwrap();

    match timeout(Duration::from_secs(5), events.recv()).await.unwrap().unwrap() {
        CamwatchEvent::CameraAdded { camera_id, location } => {
            assert_eq!(camera_id, CameraId::from("garage"));
            assert_eq!(location, "rtsp://garage/stream");
        }
        other => panic!("unexpected event {:?}", other),
    }

    let status = hub.camera_status(&CameraId::from("garage")).unwrap();
    assert_eq!(status.kind, SourceKind::Live);
    assert!(!status.slot);
    assert!(hub.open_stream(&CameraId::from("garage")).is_ok());

    hub.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_unopenable_source_becomes_placeholder() {
    let opener = Arc::new(ScriptedOpener::new());
    let hub = start_hub(&[("2", "missing.mp4")], &opener).await;

    let status = hub.camera_status(&CameraId::from("2")).unwrap();
    assert_eq!(status.kind, SourceKind::Dummy);
    assert_eq!(status.location.as_deref(), Some("missing.mp4"));
    assert!(status.error.is_some());
    assert!(hub.detector_states().is_empty());

    let mut stream = hub.open_stream(&CameraId::from("2")).unwrap();
    for _ in 0..3 {
        let jpeg = stream.next().await.unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
    }

    hub.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_dummy_stream_runs_until_shutdown() {
    let opener = Arc::new(ScriptedOpener::new());
    let hub = start_hub(&[], &opener).await;

    let mut stream = hub.open_stream(&CameraId::from("11")).unwrap();
    for _ in 0..30 {
        let jpeg = stream.next().await.expect("placeholder frames keep coming");
        let decoded = image::load_from_memory(&jpeg).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (64, 48));
    }
    assert_eq!(hub.stream_stats().active_viewers, 1);

    hub.shutdown().await;
    assert!(timeout(Duration::from_secs(1), stream.next())
        .await
        .unwrap()
        .is_none());
    drop(stream);
    assert_eq!(hub.stream_stats().active_viewers, 0);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_stops_every_detector() {
    let opener = Arc::new(ScriptedOpener::new());
    let trackers: Vec<_> = ["rtsp://a", "rtsp://b", "rtsp://c"]
        .iter()
        .map(|location| opener.insert(location, still_feed()))
        .collect();
    let hub = start_hub(&[("0", "rtsp://a"), ("1", "rtsp://b"), ("x", "rtsp://c")], &opener).await;
    assert_eq!(hub.detector_states().len(), 3);

    hub.shutdown().await;

    assert!(hub.is_shutting_down());
    assert!(hub.detector_states().is_empty());
    for tracker in trackers {
        assert_eq!(tracker.closes(), 1);
    }
}
