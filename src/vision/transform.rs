//! Pixel to arena coordinate transform.
//!
//! Each pixel is projected onto the top edge (for x) and the left edge (for
//! y) of the calibrated quadrilateral using the law of cosines, then scaled
//! to millimetres. This is exact for a fronto-parallel camera and degrades
//! gracefully under mild perspective.

use super::calibration::Calibration;
use crate::core::types::Point;
use crate::utils::{normalize_degrees, round_half_up};

#[inline]
fn squared_distance(a: Point, b: Point) -> f64 {
    let dx = (a.x - b.x) as f64;
    let dy = (a.y - b.y) as f64;
    dx * dx + dy * dy
}

/// Project a pixel into arena millimetres
pub fn pixel_to_arena(point: Point, calibration: &Calibration, arena_width: f64, arena_height: f64) -> Point {
    let c0 = calibration.top_left();
    let c1 = calibration.bottom_left();
    let c3 = calibration.top_right();

    let d03 = c0.distance(&c3);
    let d01 = c0.distance(&c1);
    let c0p = squared_distance(c0, point);

    let along_top = (d03 * d03 + c0p - squared_distance(point, c3)) / (2.0 * d03);
    let along_left = (d01 * d01 + c0p - squared_distance(point, c1)) / (2.0 * d01);

    Point::new(
        round_half_up(along_top * arena_width / d03),
        round_half_up(along_left * arena_height / d01),
    )
}

/// Heading in degrees from the rear marker toward the front marker.
///
/// `None` when the markers coincide.
pub fn heading_from_markers(front: Point, rear: Point) -> Option<f64> {
    let dist = front.distance(&rear);
    if dist == 0.0 {
        return None;
    }
    let mut angle = ((front.y - rear.y) as f64 / dist).clamp(-1.0, 1.0).asin().to_degrees();
    if front.x < rear.x {
        angle = if angle > 0.0 { 180.0 - angle } else { -180.0 - angle };
    }
    Some(normalize_degrees(round_half_up(angle) as f64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn unit_square() -> Calibration {
        Calibration::new([
            Point::new(0, 0),
            Point::new(0, 100),
            Point::new(100, 100),
            Point::new(100, 0),
        ])
        .unwrap()
    }

    #[test]
    fn test_centre_maps_to_centre() {
        let p = pixel_to_arena(Point::new(50, 50), &unit_square(), 100.0, 100.0);
        assert_eq!(p, Point::new(50, 50));
    }

    #[test]
    fn test_scaling_and_offset() {
        let calibration = Calibration::new([
            Point::new(20, 40),
            Point::new(20, 226),
            Point::new(620, 226),
            Point::new(620, 40),
        ])
        .unwrap();
        // 600 px for 1000 mm, 186 px for 310 mm
        let p = pixel_to_arena(Point::new(320, 133), &calibration, 1000.0, 310.0);
        assert_eq!(p, Point::new(500, 155));
        let corner = pixel_to_arena(Point::new(620, 226), &calibration, 1000.0, 310.0);
        assert_eq!(corner, Point::new(1000, 310));
    }

    #[test]
    fn test_heading_quadrants() {
        let rear = Point::new(100, 100);
        assert_relative_eq!(heading_from_markers(Point::new(120, 100), rear).unwrap(), 0.0);
        assert_relative_eq!(heading_from_markers(Point::new(100, 120), rear).unwrap(), 90.0);
        assert_relative_eq!(heading_from_markers(Point::new(80, 100), rear).unwrap(), 180.0);
        assert_relative_eq!(heading_from_markers(Point::new(100, 80), rear).unwrap(), -90.0);
        assert_relative_eq!(heading_from_markers(Point::new(90, 90), rear).unwrap(), -135.0);
        assert_relative_eq!(heading_from_markers(Point::new(90, 110), rear).unwrap(), 135.0);
    }

    #[test]
    fn test_heading_coincident_markers() {
        assert!(heading_from_markers(Point::new(5, 5), Point::new(5, 5)).is_none());
    }
}
