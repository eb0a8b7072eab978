use crate::camera_id::CameraId;
use parking_lot::RwLock;
use tracing::debug;

/// Process-wide record of the most recently triggered camera.
///
/// Handed to every detector and reader as an `Arc`; there is no global
/// instance. Writers exclude each other, readers always see a whole value,
/// and the lock is never held across an await point.
#[derive(Debug)]
pub struct ActiveCamera {
    current: RwLock<CameraId>,
}

impl ActiveCamera {
    pub fn new(initial: CameraId) -> Self {
        Self {
            current: RwLock::new(initial),
        }
    }

    /// Current active camera
    pub fn get(&self) -> CameraId {
        self.current.read().clone()
    }

    /// Make `camera_id` active, returning the value it replaced
    pub fn set(&self, camera_id: CameraId) -> CameraId {
        let previous = {
            let mut current = self.current.write();
            std::mem::replace(&mut *current, camera_id)
        };
        debug!("Active camera register updated (was {})", previous);
        previous
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_initial_value_and_last_write_wins() {
        let active = ActiveCamera::new(CameraId::from("0"));
        assert_eq!(active.get(), CameraId::from("0"));

        assert_eq!(active.set(CameraId::from("3")), CameraId::from("0"));
        assert_eq!(active.set(CameraId::from("5")), CameraId::from("3"));
        assert_eq!(active.get(), CameraId::from("5"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_writers_leave_one_written_value() {
        let active = Arc::new(ActiveCamera::new(CameraId::from("initial")));
        let ids: Vec<CameraId> = (0..32u32)
            .map(|i| CameraId::from(format!("camera-with-long-id-{:04}", i)))
            .collect();

        let barrier = Arc::new(tokio::sync::Barrier::new(ids.len()));
        let mut handles = Vec::new();
        for id in ids.clone() {
            let active = Arc::clone(&active);
            let barrier = Arc::clone(&barrier);
            handles.push(tokio::spawn(async move {
                barrier.wait().await;
                for _ in 0..100 {
                    active.set(id.clone());
                    // Readers never see a mixed value while others write
                    let seen = active.get();
                    assert!(seen.as_str().starts_with("camera-with-long-id-"));
                    tokio::task::yield_now().await;
                }
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }

        assert!(ids.contains(&active.get()));
    }
}
