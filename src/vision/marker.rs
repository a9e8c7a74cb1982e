//! Colour marker detection.
//!
//! Pixels are converted to 8-bit HSV (hue 0..180), thresholded against a
//! colour range and reduced to the centroid of the matching pixels.

use crate::core::types::Point;
use image::RgbImage;

/// Inclusive HSV range, hue on the 0..180 scale
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HsvRange {
    pub low: [u8; 3],
    pub high: [u8; 3],
}

impl HsvRange {
    pub const fn new(low: [u8; 3], high: [u8; 3]) -> Self {
        Self { low, high }
    }

    #[inline]
    pub fn contains(&self, hsv: [u8; 3]) -> bool {
        (0..3).all(|i| hsv[i] >= self.low[i] && hsv[i] <= self.high[i])
    }
}

/// Arena corner markers
pub const YELLOW: HsvRange = HsvRange::new([25, 140, 110], [35, 255, 255]);
/// Front robot marker
pub const BLUE: HsvRange = HsvRange::new([90, 100, 90], [110, 255, 255]);
/// Rear robot marker
pub const GREEN: HsvRange = HsvRange::new([40, 140, 90], [55, 255, 255]);

/// Convert one RGB pixel to 8-bit HSV
pub fn rgb_to_hsv(rgb: [u8; 3]) -> [u8; 3] {
    let [r, g, b] = rgb.map(|c| c as f64);
    let v = r.max(g).max(b);
    let min = r.min(g).min(b);
    let diff = v - min;

    let s = if v > 0.0 { 255.0 * diff / v } else { 0.0 };
    let mut h = if diff == 0.0 {
        0.0
    } else if v == r {
        60.0 * (g - b) / diff
    } else if v == g {
        120.0 + 60.0 * (b - r) / diff
    } else {
        240.0 + 60.0 * (r - g) / diff
    };
    if h < 0.0 {
        h += 360.0;
    }

    [
        (h / 2.0).round().min(180.0) as u8,
        s.round().min(255.0) as u8,
        v as u8,
    ]
}

/// Rectangular image region in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    pub fn whole(image: &RgbImage) -> Self {
        Self::new(0, 0, image.width(), image.height())
    }
}

/// Zeroth and first order moments of a binary mask
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Moments {
    pub m00: f64,
    pub m10: f64,
    pub m01: f64,
}

impl Moments {
    /// Integer centroid (truncated), or the origin for an empty mask
    pub fn centroid(&self) -> Point {
        if self.m00 == 0.0 {
            return Point::new(0, 0);
        }
        Point::new((self.m10 / self.m00) as i32, (self.m01 / self.m00) as i32)
    }
}

/// Moments of the pixels inside `region` that fall in `range`.
///
/// Coordinates are relative to the region origin.
pub fn threshold_moments(image: &RgbImage, region: Region, range: HsvRange) -> Moments {
    let mut moments = Moments::default();
    let x_end = (region.x + region.width).min(image.width());
    let y_end = (region.y + region.height).min(image.height());

    for y in region.y..y_end {
        for x in region.x..x_end {
            let px = image.get_pixel(x, y).0;
            if range.contains(rgb_to_hsv(px)) {
                moments.m00 += 1.0;
                moments.m10 += (x - region.x) as f64;
                moments.m01 += (y - region.y) as f64;
            }
        }
    }
    moments
}

/// Centroid of a colour marker, or `None` when it is implausible.
///
/// A centroid is plausible when `0 < x < bounds.0` and `0 < y < bounds.1`;
/// an empty mask yields the origin and therefore fails.
pub fn locate_marker(image: &RgbImage, region: Region, range: HsvRange, bounds: (u32, u32)) -> Option<Point> {
    let centroid = threshold_moments(image, region, range).centroid();
    let plausible = centroid.x > 0
        && centroid.y > 0
        && (centroid.x as u32) < bounds.0
        && (centroid.y as u32) < bounds.1;
    plausible.then_some(centroid)
}
