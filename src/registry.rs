use crate::camera_id::CameraId;
use crate::config::CamerasConfig;
use crate::error::RegistryError;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, warn};

const CHANGE_FEED_CAPACITY: usize = 32;

/// Change notification delivered to registry subscribers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "change", rename_all = "snake_case")]
pub enum RegistryChange {
    Added { camera_id: CameraId, location: String },
    Removed { camera_id: CameraId },
}

impl RegistryChange {
    pub fn camera_id(&self) -> &CameraId {
        match self {
            RegistryChange::Added { camera_id, .. } | RegistryChange::Removed { camera_id } => {
                camera_id
            }
        }
    }
}

/// Camera id to location mapping, optionally persisted as a flat JSON object
pub struct CameraRegistry {
    cameras: RwLock<BTreeMap<CameraId, String>>,
    path: Option<PathBuf>,
    changes: broadcast::Sender<RegistryChange>,
}

impl CameraRegistry {
    /// In-memory registry seeded with `cameras`
    pub fn new(cameras: BTreeMap<CameraId, String>) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Self {
            cameras: RwLock::new(cameras),
            path: None,
            changes,
        }
    }

    /// Load a registry file; a missing file starts empty and is created on the first change
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self, RegistryError> {
        let path = path.as_ref().to_path_buf();
        let cameras = read_registry_file(&path).await?;

        let mut registry = Self::new(cameras);
        registry.path = Some(path);
        Ok(registry)
    }

    /// Build the registry from the `[cameras]` section: inline sources first,
    /// then the registry file (if any) on top
    pub async fn from_config(config: &CamerasConfig) -> Result<Self, RegistryError> {
        let mut cameras: BTreeMap<CameraId, String> = config
            .sources
            .iter()
            .map(|(id, location)| (CameraId::from(id.as_str()), location.clone()))
            .collect();

        let path = config.registry_path.as_ref().map(PathBuf::from);
        if let Some(path) = &path {
            let stored = read_registry_file(path).await?;
            debug!(
                "Registry file {} holds {} cameras",
                path.display(),
                stored.len()
            );
            cameras.extend(stored);
        }

        info!("Camera registry loaded with {} cameras", cameras.len());

        let mut registry = Self::new(cameras);
        registry.path = path;
        Ok(registry)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Snapshot of every registered camera
    pub async fn list_cameras(&self) -> BTreeMap<CameraId, String> {
        self.cameras.read().await.clone()
    }

    pub async fn location(&self, camera_id: &CameraId) -> Option<String> {
        self.cameras.read().await.get(camera_id).cloned()
    }

    pub async fn contains(&self, camera_id: &CameraId) -> bool {
        self.cameras.read().await.contains_key(camera_id)
    }

    /// Register or relocate a camera.
    ///
    /// The file is written first; on failure the registry is left unchanged
    /// and no change is announced.
    pub async fn add_camera(
        &self,
        camera_id: CameraId,
        location: impl Into<String>,
    ) -> Result<(), RegistryError> {
        let location = location.into();
        let mut cameras = self.cameras.write().await;

        let mut updated = cameras.clone();
        updated.insert(camera_id.clone(), location.clone());
        self.persist(&updated).await?;
        *cameras = updated;

        info!("Camera {} registered at {}", camera_id, location);
        self.notify(RegistryChange::Added {
            camera_id,
            location,
        });
        Ok(())
    }

    /// Unregister a camera, returning its former location
    pub async fn remove_camera(&self, camera_id: &CameraId) -> Result<String, RegistryError> {
        let mut cameras = self.cameras.write().await;

        let mut updated = cameras.clone();
        let location = updated
            .remove(camera_id)
            .ok_or_else(|| RegistryError::UnknownCamera {
                camera_id: camera_id.clone(),
            })?;
        self.persist(&updated).await?;
        *cameras = updated;

        info!("Camera {} removed from registry", camera_id);
        self.notify(RegistryChange::Removed {
            camera_id: camera_id.clone(),
        });
        Ok(location)
    }

    /// Follow additions and removals made after this call
    pub fn subscribe(&self) -> broadcast::Receiver<RegistryChange> {
        self.changes.subscribe()
    }

    /// Write the current mapping to the registry file, if there is one
    pub async fn save(&self) -> Result<(), RegistryError> {
        let cameras = self.cameras.read().await;
        self.persist(&cameras).await
    }

    async fn persist(&self, cameras: &BTreeMap<CameraId, String>) -> Result<(), RegistryError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let json = serde_json::to_string_pretty(cameras)?;
        let tmp_path = path.with_extension("json.tmp");
        let io_error = |source| RegistryError::Io {
            path: path.display().to_string(),
            source,
        };

        fs::write(&tmp_path, json).await.map_err(io_error)?;
        fs::rename(&tmp_path, path).await.map_err(io_error)?;
        debug!("Saved {} cameras to {}", cameras.len(), path.display());
        Ok(())
    }

    fn notify(&self, change: RegistryChange) {
        if self.changes.send(change).is_err() {
            debug!("No registry subscribers");
        }
    }
}

async fn read_registry_file(path: &Path) -> Result<BTreeMap<CameraId, String>, RegistryError> {
    match fs::read_to_string(path).await {
        Ok(content) if content.trim().is_empty() => Ok(BTreeMap::new()),
        Ok(content) => Ok(serde_json::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(
                "Registry file {} does not exist, starting empty",
                path.display()
            );
            Ok(BTreeMap::new())
        }
        Err(source) => Err(RegistryError::Io {
            path: path.display().to_string(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_load_flat_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cameras.json");
        std::fs::write(
            &path,
            r#"{"0": "http://192.168.137.66:8080/video", "1": "video1.mp4"}"#,
        )
        .unwrap();

        let registry = CameraRegistry::open(&path).await.unwrap();
        let cameras = registry.list_cameras().await;
        assert_eq!(cameras.len(), 2);
        assert_eq!(
            cameras.get(&CameraId::from("0")).map(String::as_str),
            Some("http://192.168.137.66:8080/video")
        );
        assert_eq!(
            registry.location(&CameraId::from("1")).await.as_deref(),
            Some("video1.mp4")
        );
    }

    #[tokio::test]
    async fn test_changes_are_saved_and_reloaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cameras.json");

        let registry = CameraRegistry::open(&path).await.unwrap();
        assert!(registry.list_cameras().await.is_empty());

        registry.add_camera(CameraId::from("3"), "clip.mp4").await.unwrap();
        registry.add_camera(CameraId::from("20"), "rtsp://yard/stream").await.unwrap();
        registry.remove_camera(&CameraId::from("3")).await.unwrap();

        let raw: BTreeMap<String, String> =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw.len(), 1);
        assert_eq!(raw["20"], "rtsp://yard/stream");

        let reloaded = CameraRegistry::open(&path).await.unwrap();
        assert_eq!(reloaded.list_cameras().await, registry.list_cameras().await);
    }

    #[tokio::test]
    async fn test_change_feed_delivers_add_and_remove() {
        let registry = CameraRegistry::new(BTreeMap::new());
        let mut changes = registry.subscribe();

        registry.add_camera(CameraId::from("5"), "frames/").await.unwrap();
        registry.remove_camera(&CameraId::from("5")).await.unwrap();

        assert_eq!(
            changes.recv().await.unwrap(),
            RegistryChange::Added {
                camera_id: CameraId::from("5"),
                location: "frames/".to_string()
            }
        );
        assert_eq!(
            changes.recv().await.unwrap(),
            RegistryChange::Removed {
                camera_id: CameraId::from("5")
            }
        );
    }

    #[tokio::test]
    async fn test_failed_save_leaves_registry_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cameras.json");
        std::fs::write(&path, r#"{"3": "clip.mp4"}"#).unwrap();

        let registry = CameraRegistry::open(&path).await.unwrap();
        let mut changes = registry.subscribe();

        // Saving now fails: the directory holding the file is gone
        std::fs::remove_file(&path).unwrap();
        std::fs::remove_dir(dir.path()).unwrap();

        assert!(matches!(
            registry.add_camera(CameraId::from("20"), "video20.mp4").await,
            Err(RegistryError::Io { .. })
        ));
        assert!(matches!(
            registry.remove_camera(&CameraId::from("3")).await,
            Err(RegistryError::Io { .. })
        ));

        let cameras = registry.list_cameras().await;
        assert_eq!(cameras.len(), 1);
        assert_eq!(cameras[&CameraId::from("3")], "clip.mp4");
        assert!(!registry.contains(&CameraId::from("20")).await);
        assert!(matches!(
            changes.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }

    #[tokio::test]
    async fn test_missing_parent_directory_rejects_changes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing_dir").join("cameras.json");

        let registry = CameraRegistry::open(&path).await.unwrap();
        let mut changes = registry.subscribe();

        assert!(registry
            .add_camera(CameraId::from("20"), "video20.mp4")
            .await
            .is_err());
        assert!(registry.list_cameras().await.is_empty());
        assert!(changes.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_remove_unknown_camera() {
        let registry = CameraRegistry::new(BTreeMap::new());
        assert!(matches!(
            registry.remove_camera(&CameraId::from("9")).await,
            Err(RegistryError::UnknownCamera { .. })
        ));
    }

    #[tokio::test]
    async fn test_file_entries_override_inline_sources() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cameras.json");
        std::fs::write(&path, r#"{"1": "override.mp4"}"#).unwrap();

        let mut config = CamerasConfig::default();
        config.sources.insert("1".to_string(), "inline.mp4".to_string());
        config.sources.insert("2".to_string(), "frames/".to_string());
        config.registry_path = Some(path.to_string_lossy().to_string());

        let registry = CameraRegistry::from_config(&config).await.unwrap();
        let cameras = registry.list_cameras().await;
        assert_eq!(cameras[&CameraId::from("1")], "override.mp4");
        assert_eq!(cameras[&CameraId::from("2")], "frames/");
    }

    #[tokio::test]
    async fn test_rejects_nested_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cameras.json");
        std::fs::write(&path, r#"{"0": {"uri": "x"}}"#).unwrap();

        assert!(matches!(
            CameraRegistry::open(&path).await,
            Err(RegistryError::Parse(_))
        ));
    }
}
