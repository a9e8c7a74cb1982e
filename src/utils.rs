//! Shared utility functions

/// Normalize an angle in degrees to (-180, 180]
#[inline]
pub fn normalize_degrees(angle: f64) -> f64 {
    let mut a = angle;
    while a > 180.0 {
        a -= 360.0;
    }
    while a <= -180.0 {
        a += 360.0;
    }
    a
}

/// Absolute difference between two headings, folded into [0, 180]
#[inline]
pub fn angle_difference(a: f64, b: f64) -> f64 {
    let result = (a - b).abs().rem_euclid(360.0);
    if result > 180.0 { 360.0 - result } else { result }
}

/// Shortest signed rotation in [-180, 180] that turns `from` into `to`
#[inline]
pub fn shortest_turn(from: f64, to: f64) -> f64 {
    let phi = (to - from).rem_euclid(360.0);
    if phi > 180.0 { phi - 360.0 } else { phi }
}

/// Round half up to the nearest integer (floor(v + 0.5))
#[inline]
pub fn round_half_up(value: f64) -> i32 {
    (value + 0.5).floor() as i32
}
