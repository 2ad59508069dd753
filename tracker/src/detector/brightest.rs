use ball_speed_common::frame::RgbaFrame;

use super::traits::{Detector, Point};

/// Brightest-pixel detector.
///
/// Brightness is the unweighted mean `(R + G + B) / 3`. The scan keeps the
/// first maximum in row-major order, so an all-black frame yields `(0, 0)`.
pub struct BrightestPixelDetector;

// Ordering by the sum is the same as ordering by the mean, without the division.
fn channel_sum([r, g, b]: [u8; 3]) -> u16 {
    r as u16 + g as u16 + b as u16
}

impl Detector for BrightestPixelDetector {
    fn detect(&self, frame: &RgbaFrame) -> Point {
        let mut best_sum = 0u16;
        let mut best = Point::default();
        for (x, y, rgb) in frame.pixels() {
            let sum = channel_sum(rgb);
            if sum > best_sum {
                best_sum = sum;
                best = Point::new(x, y);
            }
        }
        best
    }

    fn name(&self) -> &str {
        "brightest"
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Black RGBA frame with the given `(x, y, rgb)` pixels painted in.
    pub(crate) fn frame_with(width: u32, height: u32, pixels: &[(u32, u32, [u8; 3])]) -> RgbaFrame {
        let mut data = vec![0u8; (width * height * 4) as usize];
        for px in data.chunks_exact_mut(4) {
            px[3] = 255;
        }
        for &(x, y, [r, g, b]) in pixels {
            let i = ((y * width + x) * 4) as usize;
            data[i] = r;
            data[i + 1] = g;
            data[i + 2] = b;
        }
        RgbaFrame::new(width, height, data).unwrap()
    }

    #[test]
    fn finds_single_bright_pixel() {
        let frame = frame_with(8, 6, &[(5, 3, [250, 250, 250]), (1, 1, [40, 40, 40])]);
        assert_eq!(BrightestPixelDetector.detect(&frame), Point::new(5, 3));
    }

    #[test]
    fn all_black_frame_is_origin() {
        let frame = frame_with(4, 4, &[]);
        assert_eq!(BrightestPixelDetector.detect(&frame), Point::new(0, 0));
    }

    #[test]
    fn ties_resolve_to_first_in_scan_order() {
        let frame = frame_with(
            5,
            5,
            &[(4, 1, [90, 90, 90]), (2, 3, [90, 90, 90]), (0, 2, [90, 90, 90])],
        );
        assert_eq!(BrightestPixelDetector.detect(&frame), Point::new(4, 1));
    }

    #[test]
    fn mean_is_unweighted() {
        // Pure green would win under luma weighting; the plain mean prefers
        // the pixel with the larger channel sum.
        let frame = frame_with(3, 1, &[(0, 0, [0, 200, 0]), (2, 0, [0, 0, 201])]);
        assert_eq!(BrightestPixelDetector.detect(&frame), Point::new(2, 0));
    }

    #[test]
    fn alpha_is_ignored() {
        let mut data = vec![0u8; 8];
        data[3] = 255; // opaque black
        data[4..8].copy_from_slice(&[10, 10, 10, 0]); // transparent grey
        let frame = RgbaFrame::new(2, 1, data).unwrap();
        assert_eq!(BrightestPixelDetector.detect(&frame), Point::new(1, 0));
    }

    #[test]
    fn deterministic_and_in_bounds() {
        let pixels: Vec<(u32, u32, [u8; 3])> = (0..7u32)
            .flat_map(|y| (0..9u32).map(move |x| (x, y, [(x * 28) as u8, (y * 36) as u8, 17])))
            .collect();
        let frame = frame_with(9, 7, &pixels);
        let first = BrightestPixelDetector.detect(&frame);
        assert_eq!(first, BrightestPixelDetector.detect(&frame.clone()));
        assert!(first.x < frame.width() && first.y < frame.height());
        assert_eq!(first, Point::new(8, 6));
    }
}
