use std::collections::VecDeque;

use ball_speed_common::config::ColorBlobConfig;
use ball_speed_common::frame::RgbaFrame;
use tracing::debug;

use super::brightest::BrightestPixelDetector;
use super::traits::{Detector, Point};

/// White-ball detector.
///
/// Masks low-saturation, high-value pixels, labels 4-connected components
/// in scan order and returns the centroid of the first component whose
/// pixel area lies strictly between `min_area` and `max_area`. Falls back to
/// the brightest pixel when no component qualifies.
///
/// Area is the number of pixels in the component, not the area of a contour
/// polygon through the boundary pixel centres: a solid `n x n` square counts
/// `n²` here where a contour area would be `(n - 1)²`. Diagonal neighbours
/// belong to different components.
pub struct ColorBlobDetector {
    config: ColorBlobConfig,
    fallback: BrightestPixelDetector,
}

impl ColorBlobDetector {
    pub fn new(config: ColorBlobConfig) -> Self {
        Self {
            config,
            fallback: BrightestPixelDetector,
        }
    }

    fn is_ball_colored(&self, rgb: [u8; 3]) -> bool {
        let (saturation, value) = saturation_value(rgb);
        saturation <= self.config.max_saturation && value >= self.config.min_value
    }

    fn mask(&self, frame: &RgbaFrame) -> Vec<bool> {
        frame
            .pixels()
            .map(|(_, _, rgb)| self.is_ball_colored(rgb))
            .collect()
    }
}

/// HSV saturation and value on the 0..=255 scale.
fn saturation_value([r, g, b]: [u8; 3]) -> (u8, u8) {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    if max == 0 {
        return (0, 0);
    }
    let delta = (max - min) as u32;
    let saturation = (delta * 255 + max as u32 / 2) / max as u32;
    (saturation as u8, max)
}

struct Component {
    area: usize,
    sum_x: u64,
    sum_y: u64,
}

impl Component {
    fn centroid(&self) -> Point {
        let area = self.area as u64;
        Point::new((self.sum_x / area) as u32, (self.sum_y / area) as u32)
    }
}

/// Flood-fill the component containing `start`, clearing it from `mask`.
fn take_component(mask: &mut [bool], width: usize, height: usize, start: usize) -> Component {
    let mut component = Component {
        area: 0,
        sum_x: 0,
        sum_y: 0,
    };
    let mut queue = VecDeque::new();
    mask[start] = false;
    queue.push_back(start);

    while let Some(i) = queue.pop_front() {
        let (x, y) = (i % width, i / width);
        component.area += 1;
        component.sum_x += x as u64;
        component.sum_y += y as u64;

        let mut visit = |j: usize| {
            if mask[j] {
                mask[j] = false;
                queue.push_back(j);
            }
        };
        if x > 0 {
            visit(i - 1);
        }
        if x + 1 < width {
            visit(i + 1);
        }
        if y > 0 {
            visit(i - width);
        }
        if y + 1 < height {
            visit(i + width);
        }
    }
    component
}

impl Detector for ColorBlobDetector {
    fn detect(&self, frame: &RgbaFrame) -> Point {
        let width = frame.width() as usize;
        let height = frame.height() as usize;
        let mut mask = self.mask(frame);

        for start in 0..mask.len() {
            if !mask[start] {
                continue;
            }
            let component = take_component(&mut mask, width, height, start);
            if component.area > self.config.min_area && component.area < self.config.max_area {
                let centroid = component.centroid();
                debug!(
                    area = component.area,
                    x = centroid.x,
                    y = centroid.y,
                    "ball blob found"
                );
                return centroid;
            }
        }

        debug!("no blob within area bounds, using brightest pixel");
        self.fallback.detect(frame)
    }

    fn name(&self) -> &str {
        "color_blob"
    }
}
