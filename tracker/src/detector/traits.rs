use ball_speed_common::frame::RgbaFrame;
use serde::Serialize;

/// Integer pixel coordinate: `x` is the column, `y` the row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub struct Point {
    pub x: u32,
    pub y: u32,
}

impl Point {
    pub fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance in pixels.
    pub fn distance_to(&self, other: &Point) -> f64 {
        let dx = self.x as f64 - other.x as f64;
        let dy = self.y as f64 - other.y as f64;
        dx.hypot(dy)
    }
}

/// Locates the tracked object in a single frame.
///
/// Implementations are pure functions of the frame and always return a
/// point inside `[0, width) x [0, height)`.
pub trait Detector: Send + Sync {
    fn detect(&self, frame: &RgbaFrame) -> Point;

    /// Human-readable name for logging.
    fn name(&self) -> &str {
        "unnamed"
    }
}
