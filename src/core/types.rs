//! Core data types for poses, encoder counters and proximity readings.
//!
//! Arena coordinates are integer millimetres with the origin at the top-left
//! arena corner, x to the right and y downward. Headings are degrees in
//! (-180, 180], measured from +x toward +y.

use crate::utils::normalize_degrees;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Integer 2D point, used for both pixel and arena coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point
    #[inline]
    pub fn distance(&self, other: &Point) -> f64 {
        let dx = (self.x - other.x) as f64;
        let dy = (self.y - other.y) as f64;
        (dx * dx + dy * dy).sqrt()
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Robot pose in arena coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Pose {
    pub location: Point,
    /// Heading in degrees, (-180, 180]
    pub heading: f64,
}

impl Pose {
    pub fn new(x: i32, y: i32, heading: f64) -> Self {
        Self {
            location: Point::new(x, y),
            heading: normalize_degrees(heading),
        }
    }

    #[inline]
    pub fn distance_to(&self, point: &Point) -> f64 {
        self.location.distance(point)
    }
}

impl fmt::Display for Pose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @ {:.1}°", self.location, self.heading)
    }
}

/// Raw wheel encoder counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EncoderState {
    pub left: i32,
    pub right: i32,
}

impl EncoderState {
    pub const fn new(left: i32, right: i32) -> Self {
        Self { left, right }
    }

    pub fn wheel(&self, wheel: Wheel) -> i32 {
        match wheel {
            Wheel::Left => self.left,
            Wheel::Right => self.right,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wheel {
    Left,
    Right,
}

/// Number of infrared proximity sensors around the body
pub const PROXIMITY_SENSORS: usize = 8;

/// One sanitized proximity reading.
///
/// Sensors are numbered clockwise from the front right (p0) to the front
/// left (p7).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ProximitySample {
    pub values: [i32; PROXIMITY_SENSORS],
}

impl ProximitySample {
    /// Replace out-of-range readings (hardware glitches) with `replacement`
    pub fn sanitized(raw: [i32; PROXIMITY_SENSORS], fault_level: i32, replacement: i32) -> Self {
        let mut values = raw;
        for v in values.iter_mut() {
            if *v > fault_level {
                *v = replacement;
            }
        }
        Self { values }
    }

    #[inline]
    pub fn get(&self, index: usize) -> f64 {
        self.values[index] as f64
    }
}
