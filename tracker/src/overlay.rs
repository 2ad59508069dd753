use image::{Rgba, RgbaImage};

use crate::detector::Point;

pub const MARKER_RADIUS: u32 = 5;
pub const MARKER_COLOR: Rgba<u8> = Rgba([255, 0, 0, 255]);

/// Fill a disc centred on `center`, clipped to the image.
pub fn draw_marker(img: &mut RgbaImage, center: Point, radius: u32, color: Rgba<u8>) {
    let (width, height) = img.dimensions();
    let r = radius as i64;
    let (cx, cy) = (center.x as i64, center.y as i64);

    for dy in -r..=r {
        for dx in -r..=r {
            if dx * dx + dy * dy > r * r {
                continue;
            }
            let (x, y) = (cx + dx, cy + dy);
            if x < 0 || y < 0 || x >= width as i64 || y >= height as i64 {
                continue;
            }
            img.put_pixel(x as u32, y as u32, color);
        }
    }
}
