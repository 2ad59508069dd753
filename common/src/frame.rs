use image::ImageReader;
use std::io::Cursor;

const BYTES_PER_PIXEL: usize = 4;

/// An immutable RGBA raster, row-major, 4 bytes per pixel. Alpha is carried
/// but never read by the tracker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RgbaFrame {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl RgbaFrame {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self, FrameError> {
        if width == 0 || height == 0 {
            return Err(FrameError::Empty { width, height });
        }
        let expected = width as usize * height as usize * BYTES_PER_PIXEL;
        if data.len() != expected {
            return Err(FrameError::SizeMismatch {
                got: data.len(),
                expected,
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Decode any format the `image` crate can guess (JPEG from the camera,
    /// PNG in tests) into RGBA8.
    pub fn decode(encoded: &[u8]) -> Result<Self, FrameError> {
        let img = ImageReader::new(Cursor::new(encoded))
            .with_guessed_format()
            .map_err(|e| FrameError::Decode(e.to_string()))?
            .decode()
            .map_err(|e| FrameError::Decode(e.to_string()))?
            .to_rgba8();
        let (width, height) = img.dimensions();
        Self::new(width, height, img.into_raw())
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// `[r, g, b]` of the pixel at column `x`, row `y`, or `None` outside
    /// the frame.
    pub fn rgb(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * BYTES_PER_PIXEL;
        let px = self.data.get(i..i + 3)?;
        Some([px[0], px[1], px[2]])
    }

    /// Iterate `(x, y, [r, g, b])` in row-major scan order.
    pub fn pixels(&self) -> impl Iterator<Item = (u32, u32, [u8; 3])> + '_ {
        let width = self.width;
        self.data
            .chunks_exact(BYTES_PER_PIXEL)
            .enumerate()
            .map(move |(i, px)| {
                let i = i as u32;
                (i % width, i / width, [px[0], px[1], px[2]])
            })
    }

    pub fn into_image(self) -> Option<image::RgbaImage> {
        image::RgbaImage::from_raw(self.width, self.height, self.data)
    }
}

/// An encoded camera frame with capture metadata.
#[derive(Debug, Clone)]
pub struct TimestampedFrame {
    pub jpeg_data: Vec<u8>,
    /// Monotonic millis on the driver's clock. All speed and display timing
    /// uses this.
    pub monotonic_ms: i64,
    /// Unix millis at which the frame was read off the stream.
    pub captured_at_ms: i64,
    pub seq: u64,
}

impl TimestampedFrame {
    pub fn new(jpeg_data: Vec<u8>, monotonic_ms: i64, captured_at_ms: i64, seq: u64) -> Self {
        Self {
            jpeg_data,
            monotonic_ms,
            captured_at_ms,
            seq,
        }
    }

    pub fn payload_size(&self) -> usize {
        self.jpeg_data.len()
    }

    pub fn decode(&self) -> Result<RgbaFrame, FrameError> {
        RgbaFrame::decode(&self.jpeg_data)
    }

    /// File name for an annotated snapshot of this frame.
    pub fn snapshot_name(&self) -> String {
        let dt = chrono::DateTime::from_timestamp_millis(self.captured_at_ms)
            .unwrap_or_else(chrono::Utc::now);
        let ts = dt.format("%Y%m%dT%H%M%S%3fZ");
        format!("{ts}_{seq:06}.png", seq = self.seq)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("frame has no pixels: {width}x{height}")]
    Empty { width: u32, height: u32 },
    #[error("frame buffer is {got} bytes, expected {expected}")]
    SizeMismatch { got: usize, expected: usize },
    #[error("failed to decode frame: {0}")]
    Decode(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_wrong_buffer_length() {
        let result = RgbaFrame::new(2, 2, vec![0; 15]);
        assert!(matches!(
            result,
            Err(FrameError::SizeMismatch {
                got: 15,
                expected: 16
            })
        ));
    }

    #[test]
    fn rejects_empty_frame() {
        assert!(matches!(
            RgbaFrame::new(0, 3, vec![]),
            Err(FrameError::Empty { .. })
        ));
    }

    #[test]
    fn pixels_follow_scan_order() {
        let mut data = vec![0u8; 3 * 2 * 4];
        // pixel (2, 1) -> index 5
        data[5 * 4] = 200;
        data[5 * 4 + 3] = 255;
        let frame = RgbaFrame::new(3, 2, data).unwrap();
        let coords: Vec<(u32, u32)> = frame.pixels().map(|(x, y, _)| (x, y)).collect();
        assert_eq!(coords, vec![(0, 0), (1, 0), (2, 0), (0, 1), (1, 1), (2, 1)]);
        assert_eq!(frame.rgb(2, 1), Some([200, 0, 0]));
    }

    #[test]
    fn rgb_outside_frame_is_none() {
        let frame = RgbaFrame::new(3, 2, vec![0; 3 * 2 * 4]).unwrap();
        assert_eq!(frame.rgb(2, 1), Some([0, 0, 0]));
        // Column 3 would otherwise alias the first pixel of the next row.
        assert_eq!(frame.rgb(3, 0), None);
        assert_eq!(frame.rgb(0, 2), None);
        assert_eq!(frame.rgb(u32::MAX, u32::MAX), None);
    }

    #[test]
    fn decodes_png() {
        let mut img = image::RgbaImage::new(4, 3);
        img.put_pixel(1, 2, image::Rgba([10, 20, 30, 255]));
        let mut encoded = Vec::new();
        img.write_to(&mut Cursor::new(&mut encoded), image::ImageFormat::Png)
            .unwrap();

        let frame = RgbaFrame::decode(&encoded).unwrap();
        assert_eq!((frame.width(), frame.height()), (4, 3));
        assert_eq!(frame.rgb(1, 2), Some([10, 20, 30]));
    }

    #[test]
    fn garbage_is_a_decode_error() {
        let frame = TimestampedFrame::new(vec![0xFF, 0xD8, 0x00], 0, 1708300000000, 1);
        assert!(matches!(frame.decode(), Err(FrameError::Decode(_))));
    }

    #[test]
    fn snapshot_name_carries_sequence() {
        let frame = TimestampedFrame::new(vec![], 42, 1708300000000, 7);
        let name = frame.snapshot_name();
        assert!(name.starts_with("20240218T"));
        assert!(name.ends_with("_000007.png"));
    }
}
