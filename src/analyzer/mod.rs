mod detector;
mod motion;

pub use detector::{DetectorHandle, DetectorState, MotionDetector};
pub use motion::MotionAnalyzer;
