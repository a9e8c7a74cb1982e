//! Arena corner calibration.
//!
//! The four yellow corner markers are searched one per image quadrant, in
//! the order top-left, bottom-left, bottom-right, top-right. Each centroid is
//! pushed outward by half a marker so the calibration point lands on the
//! arena corner itself.

use super::marker::{self, Region, YELLOW};
use crate::config::{ArenaConfig, CameraConfig};
use crate::core::types::Point;
use crate::error::{DishaError, Result};
use std::fs;
use std::io::Write;
use std::path::Path;
use tracing::{info, warn};

pub const CORNER_NAMES: [&str; 4] = ["top-left", "bottom-left", "bottom-right", "top-right"];

/// Outward direction of each corner
const OFFSET_X: [i32; 4] = [-1, -1, 1, 1];
const OFFSET_Y: [i32; 4] = [-1, 1, 1, -1];

const FILE_HEADER: &str = "calibration[i][0]\tcalibration[i][1]";

/// Pixel positions of the four arena corners
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Calibration {
    corners: [Point; 4],
}

impl Calibration {
    /// Accepts only four distinct corners forming a simple quadrilateral
    pub fn new(corners: [Point; 4]) -> Result<Self> {
        for i in 0..4 {
            for j in (i + 1)..4 {
                if corners[i] == corners[j] {
                    return Err(DishaError::Calibration(format!(
                        "{} and {} corners coincide at {}",
                        CORNER_NAMES[i], CORNER_NAMES[j], corners[i]
                    )));
                }
            }
        }
        let [c0, c1, c2, c3] = corners;
        if segments_intersect(c0, c1, c2, c3) || segments_intersect(c1, c2, c3, c0) {
            return Err(DishaError::Calibration(
                "corners do not form a simple quadrilateral".to_string(),
            ));
        }
        Ok(Self { corners })
    }

    /// Build from detection results; every corner must have been found
    pub fn from_detections(detections: &[Option<Point>; 4]) -> Result<Self> {
        let missing: Vec<&str> = detections
            .iter()
            .zip(CORNER_NAMES)
            .filter(|(d, _)| d.is_none())
            .map(|(_, name)| name)
            .collect();
        if !missing.is_empty() {
            return Err(DishaError::Calibration(format!(
                "corner marker(s) not found: {}",
                missing.join(", ")
            )));
        }
        Self::new(detections.map(Option::unwrap_or_default))
    }

    pub fn corners(&self) -> &[Point; 4] {
        &self.corners
    }

    pub fn top_left(&self) -> Point {
        self.corners[0]
    }

    pub fn bottom_left(&self) -> Point {
        self.corners[1]
    }

    pub fn top_right(&self) -> Point {
        self.corners[3]
    }
}

fn orientation(a: Point, b: Point, c: Point) -> i64 {
    let v = (b.x - a.x) as i64 * (c.y - a.y) as i64 - (b.y - a.y) as i64 * (c.x - a.x) as i64;
    v.signum()
}

fn on_segment(a: Point, b: Point, p: Point) -> bool {
    p.x >= a.x.min(b.x) && p.x <= a.x.max(b.x) && p.y >= a.y.min(b.y) && p.y <= a.y.max(b.y)
}

/// True when segment ab touches segment cd
fn segments_intersect(a: Point, b: Point, c: Point, d: Point) -> bool {
    let o1 = orientation(a, b, c);
    let o2 = orientation(a, b, d);
    let o3 = orientation(c, d, a);
    let o4 = orientation(c, d, b);
    if o1 != o2 && o3 != o4 {
        return true;
    }
    (o1 == 0 && on_segment(a, b, c))
        || (o2 == 0 && on_segment(a, b, d))
        || (o3 == 0 && on_segment(c, d, a))
        || (o4 == 0 && on_segment(c, d, b))
}

/// Search each quadrant of a prepared frame for its corner marker
pub fn detect_corners(prepared: &image::RgbImage, arena: &ArenaConfig, roi: &CameraConfig) -> [Option<Point>; 4] {
    let (w, h) = (prepared.width(), prepared.height());
    let (hw, hh) = (w / 2, h / 2);
    let quadrants = [
        Region::new(0, 0, hw, hh),
        Region::new(0, hh, hw, h - hh),
        Region::new(hw, hh, w - hw, h - hh),
        Region::new(hw, 0, w - hw, hh),
    ];
    // Corner offset in pixels, half a marker
    let marker_px = if arena.width_mm > 0.0 {
        (arena.marker_size_mm as f64 * roi.width as f64 / arena.width_mm / 2.0) as i32
    } else {
        0
    };

    let mut corners = [None; 4];
    for (i, region) in quadrants.iter().enumerate() {
        match marker::locate_marker(prepared, *region, YELLOW, (roi.width, roi.height)) {
            Some(centroid) => {
                let corner = Point::new(
                    centroid.x + region.x as i32 + OFFSET_X[i] * marker_px,
                    centroid.y + region.y as i32 + OFFSET_Y[i] * marker_px,
                );
                info!("Found {} corner marker at {}", CORNER_NAMES[i], corner);
                corners[i] = Some(corner);
            }
            None => warn!("Marker {} ({}) not found", i, CORNER_NAMES[i]),
        }
    }
    corners
}

/// Write detection results; failed corners are recorded as such
pub fn save_calibration(path: &Path, detections: &[Option<Point>; 4]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = fs::File::create(path)?;
    writeln!(file, "{}", FILE_HEADER)?;
    for (i, detection) in detections.iter().enumerate() {
        match detection {
            Some(p) => writeln!(file, "{}\t{}", p.x, p.y)?,
            None => writeln!(file, "Marker {} not found.", i)?,
        }
    }
    Ok(())
}

/// Read a calibration file; any failed or malformed row rejects it
pub fn load_calibration(path: &Path) -> Result<Calibration> {
    let content = fs::read_to_string(path)?;
    parse_calibration(&content)
}

pub fn parse_calibration(content: &str) -> Result<Calibration> {
    let rows: Vec<&str> = content.lines().skip(1).collect();
    if rows.len() != 4 {
        return Err(DishaError::Calibration(format!(
            "expected 4 corner rows, found {}",
            rows.len()
        )));
    }

    let mut corners = [Point::default(); 4];
    for (i, row) in rows.iter().enumerate() {
        if row.contains("Marker") {
            return Err(DishaError::Calibration(format!(
                "{} corner was not found during calibration",
                CORNER_NAMES[i]
            )));
        }
        let values: Vec<i32> = row
            .split_whitespace()
            .map(|token| token.parse::<i32>())
            .collect::<std::result::Result<_, _>>()
            .map_err(|_| DishaError::Calibration(format!("non-numeric row {}: {:?}", i + 1, row)))?;
        let &[x, y] = values.as_slice() else {
            return Err(DishaError::Calibration(format!(
                "row {} must have two values: {:?}",
                i + 1,
                row
            )));
        };
        corners[i] = Point::new(x, y);
    }
    Calibration::new(corners)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn square() -> [Point; 4] {
        [
            Point::new(0, 0),
            Point::new(0, 100),
            Point::new(100, 100),
            Point::new(100, 0),
        ]
    }

    #[test]
    fn test_accepts_rectangle() {
        assert!(Calibration::new(square()).is_ok());
    }

    #[test]
    fn test_rejects_bow_tie() {
        let corners = [
            Point::new(0, 0),
            Point::new(100, 100),
            Point::new(0, 100),
            Point::new(100, 0),
        ];
        assert!(matches!(
            Calibration::new(corners),
            Err(DishaError::Calibration(_))
        ));
    }

    #[test]
    fn test_rejects_coincident_corners() {
        let mut corners = square();
        corners[2] = corners[1];
        assert!(Calibration::new(corners).is_err());
    }

    #[test]
    fn test_missing_detection_fails_whole_calibration() {
        let mut detections = square().map(Some);
        detections[3] = None;
        let err = Calibration::from_detections(&detections).unwrap_err();
        assert!(err.to_string().contains("top-right"));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cam/calibration/calibration_pts.txt");
        save_calibration(&path, &square().map(Some)).unwrap();

        let calibration = load_calibration(&path).unwrap();
        assert_eq!(calibration.corners(), &square());
    }

    #[test]
    fn test_failed_report_cannot_be_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("calibration_pts.txt");
        let mut detections = square().map(Some);
        detections[1] = None;
        save_calibration(&path, &detections).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("Marker 1 not found."));
        assert!(load_calibration(&path).is_err());
    }

    #[test]
    fn test_parse_rejects_wrong_row_count() {
        let content = format!("{}\n1\t2\n3\t4\n", FILE_HEADER);
        assert!(parse_calibration(&content).is_err());
    }

    #[test]
    fn test_parse_rejects_non_numeric() {
        let content = format!("{}\n0\t0\n0\tabc\n100\t100\n100\t0\n", FILE_HEADER);
        assert!(parse_calibration(&content).is_err());
    }

    #[test]
    fn test_detect_corners_applies_offset() {
        // Arena spans the whole ROI: 200 mm over 200 px, 20 mm markers
        let arena = ArenaConfig {
            width_mm: 200.0,
            height_mm: 100.0,
            marker_size_mm: 20,
            max_marker_distance_px: 84.0,
        };
        let roi = CameraConfig {
            offx: 0,
            offy: 0,
            width: 200,
            height: 100,
        };
        let mut img = RgbImage::new(200, 100);
        let yellow = Rgb([255, 255, 0]);
        // 21 px squares at each corner, one pixel in from the border
        let fill = |img: &mut RgbImage, x0: u32, y0: u32| {
            for y in y0..y0 + 21 {
                for x in x0..x0 + 21 {
                    img.put_pixel(x, y, yellow);
                }
            }
        };
        fill(&mut img, 1, 1);
        fill(&mut img, 1, 78);
        fill(&mut img, 178, 78);
        fill(&mut img, 178, 1);

        let corners = detect_corners(&img, &arena, &roi);
        // Centroid 11, marker offset 10
        assert_eq!(corners[0], Some(Point::new(1, 1)));
        assert_eq!(corners[1], Some(Point::new(1, 98)));
        assert_eq!(corners[2], Some(Point::new(198, 98)));
        assert_eq!(corners[3], Some(Point::new(198, 1)));
    }

    #[test]
    fn test_detect_corners_with_sub_millimetre_arena() {
        let arena = ArenaConfig {
            width_mm: 0.5,
            height_mm: 0.5,
            marker_size_mm: 35,
            max_marker_distance_px: 84.0,
        };
        let roi = CameraConfig {
            offx: 0,
            offy: 0,
            width: 40,
            height: 40,
        };
        let corners = detect_corners(&RgbImage::new(40, 40), &arena, &roi);
        assert_eq!(corners, [None; 4]);

        let zero = ArenaConfig { width_mm: 0.0, ..arena };
        assert_eq!(detect_corners(&RgbImage::new(40, 40), &zero, &roi), [None; 4]);
    }
}
