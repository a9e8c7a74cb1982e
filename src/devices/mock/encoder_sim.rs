//! Encoder simulator for the mock robot
//!
//! Wheel speeds are in encoder steps per second. Counters wrap into
//! `[0, pos_max]` like the real hardware.

use crate::noise::NoiseGenerator;

pub struct EncoderSimulator {
    span: i64,
    slip_stddev: f64,
    noise: NoiseGenerator,
    /// Counter value at the last reset
    left_base: i64,
    right_base: i64,
    /// Fractional ticks travelled since the last reset
    left_accumulator: f64,
    right_accumulator: f64,
}

impl EncoderSimulator {
    pub fn new(pos_max: i32, slip_stddev: f64, noise: NoiseGenerator) -> Self {
        Self {
            span: pos_max as i64 + 1,
            slip_stddev,
            noise,
            left_base: 0,
            right_base: 0,
            left_accumulator: 0.0,
            right_accumulator: 0.0,
        }
    }

    /// Advance by `dt` seconds; returns the ticks each wheel actually travelled
    pub fn update(&mut self, left_speed: i32, right_speed: i32, dt: f64) -> (f64, f64) {
        let left_slip = 1.0 + self.noise.gaussian(self.slip_stddev);
        let right_slip = 1.0 + self.noise.gaussian(self.slip_stddev);
        let left = left_speed as f64 * dt * left_slip;
        let right = right_speed as f64 * dt * right_slip;
        self.left_accumulator += left;
        self.right_accumulator += right;
        (left, right)
    }

    pub fn counters(&self) -> (i32, i32) {
        let left = (self.left_base + self.left_accumulator.floor() as i64).rem_euclid(self.span);
        let right = (self.right_base + self.right_accumulator.floor() as i64).rem_euclid(self.span);
        (left as i32, right as i32)
    }

    /// Overwrite both counters
    pub fn set(&mut self, left: i32, right: i32) {
        self.left_base = left as i64;
        self.right_base = right as i64;
        self.left_accumulator = 0.0;
        self.right_accumulator = 0.0;
    }
}
