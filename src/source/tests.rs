use super::*;
use crate::camera_id::CameraId;
use crate::config::DummyConfig;
use crate::error::SourceError;
use image::{Rgb, RgbImage};
use std::sync::Arc;
use std::time::Duration;

fn solid(width: u32, height: u32, value: u8) -> RgbImage {
    RgbImage::from_pixel(width, height, Rgb([value, value, value]))
}

#[test]
fn test_classify_locations() {
    assert_eq!(SourceKind::classify(""), SourceKind::Dummy);
    assert_eq!(SourceKind::classify("dummy"), SourceKind::Dummy);
    assert_eq!(
        SourceKind::classify("http://192.168.137.66:8080/video"),
        SourceKind::Live
    );
    assert_eq!(SourceKind::classify("rtsp://cam/stream"), SourceKind::Live);
    assert_eq!(SourceKind::classify("video1.mp4"), SourceKind::File);
    assert_eq!(SourceKind::classify("/srv/frames"), SourceKind::File);
}

#[tokio::test]
async fn test_sequence_reaches_end_of_stream() {
    let mut source = SequenceSource::from_images("memory", vec![solid(4, 4, 0), solid(4, 4, 9)]);
    assert_eq!(source.kind(), SourceKind::File);
    assert_eq!(source.len(), 2);

    assert!(source.read_frame().await.is_ok());
    assert!(source.read_frame().await.is_ok());
    assert_eq!(source.read_frame().await.unwrap_err(), SourceError::EndOfStream);
}

#[tokio::test]
async fn test_reset_yields_same_first_frame() {
    let images: Vec<_> = (0..5u8).map(|i| solid(8, 6, i * 40)).collect();
    let mut source = SequenceSource::from_images("memory", images);

    let first = source.read_frame().await.unwrap();
    while source.read_frame().await.is_ok() {}

    source.reset().await.unwrap();
    assert_eq!(source.position(), 0);

    let again = source.read_frame().await.unwrap();
    assert_eq!(first.image.as_raw(), again.image.as_raw());
    assert!(again.id > first.id);
}

#[tokio::test]
async fn test_open_dir_reads_sorted_images_and_loops() {
    let dir = tempfile::tempdir().unwrap();
    for (i, value) in [10u8, 120, 250].iter().enumerate() {
        solid(6, 4, *value)
            .save(dir.path().join(format!("frame_{:02}.png", i)))
            .unwrap();
    }
    std::fs::write(dir.path().join("notes.txt"), "not a frame").unwrap();

    let mut source = SequenceSource::open_dir(dir.path()).await.unwrap();
    assert_eq!(source.len(), 3);

    let mut values = Vec::new();
    loop {
        match source.read_frame().await {
            Ok(frame) => values.push(frame.image.get_pixel(0, 0)[0]),
            Err(SourceError::EndOfStream) => break,
            Err(e) => panic!("unexpected read error: {}", e),
        }
    }
    assert_eq!(values, vec![10, 120, 250]);

    source.reset().await.unwrap();
    let first = source.read_frame().await.unwrap();
    assert_eq!(first.image.get_pixel(0, 0)[0], 10);
}

#[tokio::test]
async fn test_open_empty_dir_fails() {
    let dir = tempfile::tempdir().unwrap();
    let result = SequenceSource::open_dir(dir.path()).await;
    assert!(matches!(result, Err(SourceError::Open { .. })));
}

#[tokio::test]
async fn test_closed_source_rejects_reads() {
    let mut source = SequenceSource::from_images("memory", vec![solid(2, 2, 1)]);
    source.close().await;
    assert!(!source.is_open());
    assert!(matches!(
        source.read_frame().await,
        Err(SourceError::Read { .. })
    ));
    assert!(source.reset().await.is_err());
}

#[test]
fn test_dummy_synthesizes_fresh_frames() {
    let config = DummyConfig {
        width: 320,
        height: 240,
        ..DummyConfig::default()
    };
    let style = Arc::new(DummyStyle::from_config(&config));
    let dummy = DummySource::new(CameraId::from("12"), style);

    assert_eq!(dummy.label(), "Camera 12");

    let first = dummy.synthesize();
    let second = dummy.synthesize();
    assert_eq!(first.dimensions(), (320, 240));
    assert_ne!(first.id, second.id);
    // Either the label or the placeholder band is painted
    assert!(first.image.pixels().any(|p| p.0 != [0, 0, 0]));
}

#[test]
fn test_dummy_labels_cameras_without_configured_font() {
    let config = DummyConfig {
        width: 160,
        height: 120,
        font_path: "/nonexistent/font.ttf".to_string(),
        font_size: 24.0,
    };
    let style = Arc::new(DummyStyle::from_config(&config));
    assert!(style.has_font());

    let third = DummySource::new(CameraId::from("3"), Arc::clone(&style)).synthesize();
    let fourth = DummySource::new(CameraId::from("4"), style).synthesize();

    assert!(third.image.pixels().any(|p| p.0[0] > 200));
    assert_ne!(third.image.as_raw(), fourth.image.as_raw());
}

#[test]
fn test_dummy_label_fits_small_frames() {
    let config = DummyConfig {
        width: 64,
        height: 48,
        font_path: "/nonexistent/font.ttf".to_string(),
        ..DummyConfig::default()
    };
    let style = Arc::new(DummyStyle::from_config(&config));

    let first = DummySource::new(CameraId::from("11"), Arc::clone(&style)).synthesize();
    let second = DummySource::new(CameraId::from("12"), style).synthesize();
    assert_eq!(first.dimensions(), (64, 48));
    assert_ne!(first.image.as_raw(), second.image.as_raw());
}

#[tokio::test]
async fn test_default_opener_rejects_dummy_and_missing_files() {
    let opener = DefaultSourceOpener::new(Duration::from_millis(200));

    assert!(matches!(
        opener.open("dummy").await,
        Err(SourceError::Open { .. })
    ));
    assert!(matches!(
        opener.open("/nonexistent/camwatch/video7.mp4").await,
        Err(SourceError::Open { .. })
    ));
}

#[tokio::test]
async fn test_default_opener_opens_image_directory() {
    let dir = tempfile::tempdir().unwrap();
    solid(4, 4, 77).save(dir.path().join("0001.png")).unwrap();

    let opener = DefaultSourceOpener::new(Duration::from_millis(200));
    let mut source = opener
        .open(dir.path().to_str().unwrap())
        .await
        .unwrap();

    assert_eq!(source.kind(), SourceKind::File);
    let frame = source.read_frame().await.unwrap();
    assert_eq!(frame.image.get_pixel(1, 1), &Rgb([77, 77, 77]));
}

#[cfg(not(all(feature = "camera", target_os = "linux")))]
#[tokio::test]
async fn test_live_source_unsupported_without_media_backend() {
    let opener = DefaultSourceOpener::new(Duration::from_millis(200));
    assert!(matches!(
        opener.open("http://192.168.137.66:8080/video").await,
        Err(SourceError::Unsupported { .. })
    ));
}

#[cfg(all(feature = "camera", target_os = "linux"))]
#[tokio::test]
async fn test_media_files_reach_gstreamer_backend() {
    let dir = tempfile::tempdir().unwrap();
    let clip = dir.path().join("video1.mp4");
    std::fs::write(&clip, b"not really a video").unwrap();

    let opener = DefaultSourceOpener::new(Duration::from_millis(500));
    match opener.open(clip.to_str().unwrap()).await {
        Err(SourceError::Unsupported { .. }) => panic!("media backend missing from the build"),
        Err(SourceError::Open { location, .. }) => {
            assert!(location.ends_with("video1.mp4"))
        }
        Err(e) => panic!("unexpected error: {}", e),
        Ok(_) => panic!("garbage file should not decode"),
    }
}
