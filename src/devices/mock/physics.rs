//! Kinematics of the simulated robot inside the rectangular arena

use crate::core::types::Pose;
use crate::utils::{normalize_degrees, round_half_up};

/// True pose of the simulated robot (mm, degrees)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhysicsState {
    pub x: f64,
    pub y: f64,
    pub heading: f64,
    arena_width: f64,
    arena_height: f64,
    radius: f64,
    /// Steps in which a wall stopped the body
    wall_contacts: u64,
}

impl PhysicsState {
    pub fn new(x: f64, y: f64, heading: f64, arena_width: f64, arena_height: f64, radius: f64) -> Self {
        Self {
            x,
            y,
            heading: normalize_degrees(heading),
            arena_width,
            arena_height,
            radius,
            wall_contacts: 0,
        }
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    pub fn arena(&self) -> (f64, f64) {
        (self.arena_width, self.arena_height)
    }

    pub fn wall_contacts(&self) -> u64 {
        self.wall_contacts
    }

    pub fn pose(&self) -> Pose {
        Pose::new(round_half_up(self.x), round_half_up(self.y), self.heading)
    }

    pub fn place(&mut self, x: f64, y: f64, heading: f64) {
        self.x = x;
        self.y = y;
        self.heading = normalize_degrees(heading);
    }

    /// Move by the given wheel travel; the body slides along walls
    pub fn advance(&mut self, left_mm: f64, right_mm: f64, degrees_per_mm: f64) {
        let distance = (left_mm + right_mm) * 0.5;
        let turn = (left_mm - right_mm) * 0.5 * degrees_per_mm;
        let mid = (self.heading + turn * 0.5).to_radians();

        let x = self.x + distance * mid.cos();
        let y = self.y + distance * mid.sin();
        self.x = x.clamp(self.radius, self.arena_width - self.radius);
        self.y = y.clamp(self.radius, self.arena_height - self.radius);
        if self.x != x || self.y != y {
            self.wall_contacts += 1;
        }
        self.heading = normalize_degrees(self.heading + turn);
    }

    /// Distance from the robot centre to the nearest wall along `bearing`
    /// (degrees relative to the heading, positive to the right)
    pub fn ray_to_wall(&self, bearing: f64) -> f64 {
        let angle = (self.heading + bearing).to_radians();
        let (dx, dy) = (angle.cos(), angle.sin());
        let mut t = f64::INFINITY;
        if dx > 1e-9 {
            t = t.min((self.arena_width - self.x) / dx);
        } else if dx < -1e-9 {
            t = t.min(-self.x / dx);
        }
        if dy > 1e-9 {
            t = t.min((self.arena_height - self.y) / dy);
        } else if dy < -1e-9 {
            t = t.min(-self.y / dy);
        }
        t
    }
}
