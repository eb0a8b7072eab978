//! Scripted frame sources for exercising detectors, the hub and streams

use crate::error::SourceError;
use crate::frame::Frame;
use crate::source::{FrameSource, SourceKind, SourceOpener};
use async_trait::async_trait;
use image::{Rgb, RgbImage};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

/// 100x100 black frame with the first `changed` pixels painted white
pub fn frame_with_changes(changed: u32) -> RgbImage {
    let mut image = RgbImage::new(100, 100);
    for (i, pixel) in image.pixels_mut().enumerate() {
        if (i as u32) < changed {
            *pixel = Rgb([255, 255, 255]);
        }
    }
    image
}

/// Five still frames followed by five frames with 6000 changed pixels
pub fn ten_frame_clip() -> Vec<RgbImage> {
    let mut frames: Vec<_> = (0..5).map(|_| frame_with_changes(0)).collect();
    frames.extend((0..5).map(|_| frame_with_changes(6000)));
    frames
}

/// Counters shared between a test and the sources it scripted
#[derive(Debug, Default)]
pub struct SourceTracker {
    pub reads: AtomicUsize,
    pub resets: AtomicUsize,
    pub closes: AtomicUsize,
    pub opened: AtomicUsize,
    pub closed: AtomicBool,
}

impl SourceTracker {
    pub fn resets(&self) -> usize {
        self.resets.load(Ordering::SeqCst)
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

/// Describes how a scripted source behaves
#[derive(Debug, Clone)]
pub struct Script {
    pub kind: SourceKind,
    pub frames: Vec<Arc<RgbImage>>,
    /// Live sources wrap around instead of ending
    pub cycle: bool,
    /// Every read after this many successful reads fails
    pub fail_after: Option<usize>,
}

impl Script {
    /// Looping file clip
    pub fn file(frames: Vec<RgbImage>) -> Self {
        Self {
            kind: SourceKind::File,
            frames: frames.into_iter().map(Arc::new).collect(),
            cycle: false,
            fail_after: None,
        }
    }

    /// Endless live feed cycling through `frames`
    pub fn live(frames: Vec<RgbImage>) -> Self {
        Self {
            kind: SourceKind::Live,
            frames: frames.into_iter().map(Arc::new).collect(),
            cycle: true,
            fail_after: None,
        }
    }

    pub fn failing_after(mut self, reads: usize) -> Self {
        self.fail_after = Some(reads);
        self
    }

    pub fn ending(mut self) -> Self {
        self.cycle = false;
        self
    }
}

pub struct ScriptedSource {
    location: String,
    script: Script,
    cursor: usize,
    successful_reads: usize,
    next_id: u64,
    open: bool,
    tracker: Arc<SourceTracker>,
}

impl ScriptedSource {
    pub fn new(location: &str, script: Script, tracker: Arc<SourceTracker>) -> Self {
        tracker.opened.fetch_add(1, Ordering::SeqCst);
        Self {
            location: location.to_string(),
            script,
            cursor: 0,
            successful_reads: 0,
            next_id: 0,
            open: true,
            tracker,
        }
    }
}

#[async_trait]
impl FrameSource for ScriptedSource {
    fn kind(&self) -> SourceKind {
        self.script.kind
    }

    fn location(&self) -> &str {
        &self.location
    }

    fn is_open(&self) -> bool {
        self.open
    }

    async fn read_frame(&mut self) -> Result<Frame, SourceError> {
        self.tracker.reads.fetch_add(1, Ordering::SeqCst);
        if !self.open {
            return Err(SourceError::read("source is closed"));
        }
        if matches!(self.script.fail_after, Some(limit) if self.successful_reads >= limit) {
            return Err(SourceError::read("scripted failure"));
        }
        if self.cursor >= self.script.frames.len() {
            if self.script.cycle && !self.script.frames.is_empty() {
                self.cursor = 0;
            } else {
                return Err(SourceError::EndOfStream);
            }
        }

        let image = Arc::clone(&self.script.frames[self.cursor]);
        self.cursor += 1;
        self.successful_reads += 1;
        self.next_id += 1;
        Ok(Frame::from_shared(self.next_id, SystemTime::now(), image))
    }

    async fn reset(&mut self) -> Result<(), SourceError> {
        self.tracker.resets.fetch_add(1, Ordering::SeqCst);
        self.cursor = 0;
        Ok(())
    }

    async fn close(&mut self) {
        if self.open {
            self.open = false;
            self.tracker.closes.fetch_add(1, Ordering::SeqCst);
            self.tracker.closed.store(true, Ordering::SeqCst);
        }
    }
}

/// Opener that hands out a fresh scripted source per call
#[derive(Default)]
pub struct ScriptedOpener {
    scripts: Mutex<HashMap<String, (Script, Arc<SourceTracker>)>>,
}

impl ScriptedOpener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a location and get the tracker shared by every source opened for it
    pub fn insert(&self, location: &str, script: Script) -> Arc<SourceTracker> {
        let tracker = Arc::new(SourceTracker::default());
        self.scripts
            .lock()
            .insert(location.to_string(), (script, Arc::clone(&tracker)));
        tracker
    }
}

#[async_trait]
impl SourceOpener for ScriptedOpener {
    async fn open(&self, location: &str) -> Result<Box<dyn FrameSource>, SourceError> {
        let entry = self.scripts.lock().get(location).cloned();
        match entry {
            Some((script, tracker)) => Ok(Box::new(ScriptedSource::new(location, script, tracker))),
            None => Err(SourceError::open(location, "no such scripted source")),
        }
    }
}
