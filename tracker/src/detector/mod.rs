pub mod blob;
pub mod brightest;
pub mod traits;

use ball_speed_common::config::{DetectorKind, TrackerConfig};

pub use blob::ColorBlobDetector;
pub use brightest::BrightestPixelDetector;
pub use traits::{Detector, Point};

pub fn from_config(config: &TrackerConfig) -> Box<dyn Detector> {
    match config.detector {
        DetectorKind::Brightest => Box::new(BrightestPixelDetector),
        DetectorKind::ColorBlob => Box::new(ColorBlobDetector::new(config.color_blob.clone())),
    }
}
