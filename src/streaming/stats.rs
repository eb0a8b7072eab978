use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters shared by every viewer stream
#[derive(Debug, Default)]
pub struct StreamStats {
    active_viewers: AtomicU64,
    total_viewers: AtomicU64,
    frames_streamed: AtomicU64,
    bytes_streamed: AtomicU64,
    placeholder_frames: AtomicU64,
    encode_errors: AtomicU64,
}

/// Point-in-time copy of [`StreamStats`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StreamStatsSnapshot {
    pub active_viewers: u64,
    pub total_viewers: u64,
    pub frames_streamed: u64,
    pub bytes_streamed: u64,
    pub placeholder_frames: u64,
    pub encode_errors: u64,
}

impl StreamStats {
    pub fn viewer_connected(&self) {
        self.active_viewers.fetch_add(1, Ordering::Relaxed);
        self.total_viewers.fetch_add(1, Ordering::Relaxed);
    }

    pub fn viewer_disconnected(&self) {
        let _ = self
            .active_viewers
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
    }

    pub fn record_frame(&self, bytes: usize, placeholder: bool) {
        self.frames_streamed.fetch_add(1, Ordering::Relaxed);
        self.bytes_streamed.fetch_add(bytes as u64, Ordering::Relaxed);
        if placeholder {
            self.placeholder_frames.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_encode_error(&self) {
        self.encode_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StreamStatsSnapshot {
        StreamStatsSnapshot {
            active_viewers: self.active_viewers.load(Ordering::Relaxed),
            total_viewers: self.total_viewers.load(Ordering::Relaxed),
            frames_streamed: self.frames_streamed.load(Ordering::Relaxed),
            bytes_streamed: self.bytes_streamed.load(Ordering::Relaxed),
            placeholder_frames: self.placeholder_frames.load(Ordering::Relaxed),
            encode_errors: self.encode_errors.load(Ordering::Relaxed),
        }
    }
}
