//! Dead-reckoning pose integration from wheel encoder counters.
//!
//! Each tick the guarded counter deltas are converted into travelled
//! distance and heading change, and the displacement is projected at the
//! mid-turn heading. Each displacement component is rounded half-up to whole
//! millimetres and added to the integer location, so many sub-millimetre
//! steps in a row quantize (seven ticks of 0.91 mm count as 1 mm each).

use super::overflow::OverflowGuard;
use crate::config::EncoderConfig;
use crate::core::types::{EncoderState, Point, Pose};
use crate::utils::{normalize_degrees, round_half_up};

/// Result of integrating one encoder reading
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct OdometryStep {
    pub delta_left: i32,
    pub delta_right: i32,
    /// Travelled distance in mm
    pub distance: f64,
    /// Heading change in degrees
    pub heading_change: f64,
}

pub struct DeadReckoning {
    guard: OverflowGuard,
    mm_per_tick: f64,
    degrees_per_tick: f64,
    counters: Option<EncoderState>,
    last_delta: (i32, i32),
    previous: Pose,
    current: Pose,
    path_length: f64,
    recentre_count: u64,
}

impl DeadReckoning {
    pub fn new(config: &EncoderConfig, start: Pose) -> Self {
        Self {
            guard: OverflowGuard::from_config(config),
            mm_per_tick: 1000.0 / config.ticks_per_meter,
            degrees_per_tick: 360.0 / config.full_turn_ticks,
            counters: None,
            last_delta: (0, 0),
            previous: start,
            current: start,
            path_length: 0.0,
            recentre_count: 0,
        }
    }

    /// Set the reference counters without integrating
    pub fn prime(&mut self, counters: EncoderState) {
        self.counters = Some(counters);
        self.last_delta = (0, 0);
    }

    /// Integrate a new encoder reading into the pose
    pub fn integrate(&mut self, counters: EncoderState) -> OdometryStep {
        let Some(last) = self.counters else {
            self.prime(counters);
            return OdometryStep::default();
        };

        let delta_left = self.guard.wrapped_delta(last.left, counters.left);
        let delta_right = self.guard.wrapped_delta(last.right, counters.right);
        self.counters = Some(counters);
        self.last_delta = (delta_left, delta_right);

        let distance = (delta_right + delta_left) as f64 * 0.5 * self.mm_per_tick;
        let heading_change = (delta_left - delta_right) as f64 * 0.5 * self.degrees_per_tick;
        self.path_length += distance;

        // Trapezoidal: project along the heading halfway through the turn
        let mid = (self.current.heading + heading_change * 0.5).to_radians();
        let dx = round_half_up(distance * mid.cos());
        let dy = round_half_up(distance * mid.sin());

        self.previous = self.current;
        let location = self.current.location;
        self.current = Pose {
            location: Point::new(location.x + dx, location.y + dy),
            heading: normalize_degrees(self.current.heading + heading_change),
        };

        OdometryStep {
            delta_left,
            delta_right,
            distance,
            heading_change,
        }
    }

    /// Counters to write back to the hardware if a wheel is about to wrap.
    ///
    /// The engine adopts the returned values as its new reference.
    pub fn check_overflow(&mut self) -> Option<EncoderState> {
        let counters = self.counters?;
        let (delta_left, delta_right) = self.last_delta;
        let recentred = self.guard.check(counters, delta_left, delta_right)?;
        self.counters = Some(recentred);
        self.recentre_count += 1;
        Some(recentred)
    }

    /// Replace the current pose with an external measurement
    pub fn correct(&mut self, pose: Pose) {
        self.current = pose;
    }

    /// Replace both current and previous pose (start of run)
    pub fn seed(&mut self, pose: Pose) {
        self.correct(pose);
        self.previous = pose;
    }

    pub fn pose(&self) -> Pose {
        self.current
    }

    pub fn previous(&self) -> Pose {
        self.previous
    }

    pub fn counters(&self) -> Option<EncoderState> {
        self.counters
    }

    pub fn guard(&self) -> &OverflowGuard {
        &self.guard
    }

    pub fn path_length(&self) -> f64 {
        self.path_length
    }

    pub fn reset_path_length(&mut self) {
        self.path_length = 0.0;
    }

    pub fn recentre_count(&self) -> u64 {
        self.recentre_count
    }
}
