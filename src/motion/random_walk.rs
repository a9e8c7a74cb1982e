//! Reactive random walk with wall dodging.
//!
//! Each tick the weighted proximity sums of both sides and the four
//! front-facing sensors are compared against thresholds. A trigger spins
//! the robot away from the closer side and keeps spinning for a few ticks
//! after the last trigger. Between dodges the robot cruises at full speed
//! and periodically slows one wheel by a random amount, with `momentum`
//! controlling how straight the walk stays.

use crate::config::RandomWalkConfig;
use crate::core::types::ProximitySample;
use crate::noise::NoiseGenerator;

/// Side weights for sensors (5, 6, 7) on the left and (2, 1, 0) on the right
const SIDE_WEIGHTS: [f64; 3] = [0.05, 0.4, 0.55];
/// Front-facing sensors checked individually
const FRONT_SENSORS: [usize; 4] = [7, 6, 0, 1];

pub struct RandomWalkController {
    max_speed: i32,
    dodge_speed: i32,
    update_interval: u64,
    continue_turning_steps: i32,
    sum_threshold: f64,
    single_threshold: f64,
    momentum: f64,
    noise: NoiseGenerator,
    counter: u64,
    turning_left: i32,
    dodging: bool,
    just_dodged: bool,
}

impl RandomWalkController {
    /// `momentum` is clamped to [0, 1]; `light_factor` scales both thresholds
    pub fn new(config: &RandomWalkConfig, light_factor: f64, momentum: f64, seed: u64) -> Self {
        Self {
            max_speed: config.max_speed,
            dodge_speed: config.dodge_speed,
            update_interval: config.update_interval.max(1),
            continue_turning_steps: config.continue_turning_steps,
            sum_threshold: config.sum_threshold * light_factor,
            single_threshold: config.single_threshold * light_factor,
            momentum: momentum.clamp(0.0, 1.0),
            noise: NoiseGenerator::new(seed),
            counter: 0,
            turning_left: 0,
            dodging: false,
            // Forces the initial full-speed command
            just_dodged: true,
        }
    }

    pub fn is_dodging(&self) -> bool {
        self.dodging
    }

    pub fn side_sums(sample: &ProximitySample) -> (f64, f64) {
        let left = SIDE_WEIGHTS[0] * sample.get(5) + SIDE_WEIGHTS[1] * sample.get(6) + SIDE_WEIGHTS[2] * sample.get(7);
        let right = SIDE_WEIGHTS[0] * sample.get(2) + SIDE_WEIGHTS[1] * sample.get(1) + SIDE_WEIGHTS[2] * sample.get(0);
        (left, right)
    }

    /// True when the sample calls for a dodge
    pub fn triggered(&self, sample: &ProximitySample) -> bool {
        let (left, right) = Self::side_sums(sample);
        left > self.sum_threshold
            || right > self.sum_threshold
            || FRONT_SENSORS.iter().any(|&i| sample.get(i) > self.single_threshold)
    }

    /// Extra dodge ticks in -1..=1 from three coin flips
    fn randomized_extra(&mut self) -> i32 {
        let up = self.noise.coin();
        if !self.noise.coin() {
            return if up { -1 } else { 1 };
        }
        match (self.noise.coin(), up) {
            (true, true) => 1,
            (true, false) => -1,
            (false, _) => 0,
        }
    }

    /// Wheel commands for one tick, in the order they must be sent
    pub fn tick(&mut self, sample: &ProximitySample) -> Vec<(i32, i32)> {
        let mut commands = Vec::new();

        if self.triggered(sample) {
            if !self.dodging {
                self.turning_left = self.continue_turning_steps + self.randomized_extra();
                let (left, right) = Self::side_sums(sample);
                // Spin away from the closer side
                commands.push(if left > right {
                    (self.dodge_speed, -self.dodge_speed)
                } else {
                    (-self.dodge_speed, self.dodge_speed)
                });
            }
            self.dodging = true;
            self.just_dodged = true;
        } else if self.turning_left > 0 {
            self.turning_left -= 1;
        } else {
            self.dodging = false;
        }

        if !self.dodging {
            if self.just_dodged {
                self.just_dodged = false;
                commands.push((self.max_speed, self.max_speed));
            }
            if self.counter % self.update_interval == 0 {
                commands.push(self.random_speeds());
            }
        }

        self.counter += 1;
        commands
    }

    fn random_speeds(&mut self) -> (i32, i32) {
        let max = self.max_speed as f64;
        let slow_left = self.noise.coin();
        let slowed = (self.momentum * max + (1.0 - self.momentum) * self.noise.uniform() * max) as i32;
        if slow_left {
            (slowed, self.max_speed)
        } else {
            (self.max_speed, slowed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller(momentum: f64, seed: u64) -> RandomWalkController {
        RandomWalkController::new(&RandomWalkConfig::default(), 1.1, momentum, seed)
    }

    fn sample(values: [i32; 8]) -> ProximitySample {
        ProximitySample { values }
    }

    #[test]
    fn test_clear_start_drives_full_speed() {
        let mut c = controller(1.0, 3);
        let commands = c.tick(&sample([0; 8]));
        assert_eq!(commands[0], (900, 900));
        // Momentum 1 keeps both wheels at max
        assert_eq!(commands[1], (900, 900));
    }

    #[test]
    fn test_dodges_away_from_left_wall() {
        let mut c = controller(0.5, 3);
        c.tick(&sample([0; 8]));
        let commands = c.tick(&sample([0, 0, 0, 0, 0, 0, 50, 200]));
        assert_eq!(commands, vec![(400, -400)]);
        assert!(c.is_dodging());
    }

    #[test]
    fn test_dodges_away_from_right_wall() {
        let mut c = controller(0.5, 3);
        let commands = c.tick(&sample([200, 50, 0, 0, 0, 0, 0, 0]));
        assert_eq!(commands, vec![(-400, 400)]);
    }

    #[test]
    fn test_single_sensor_threshold() {
        let c = controller(0.5, 3);
        // 0.55 * 82 = 45 stays below the sum threshold 66, but 83 > 82.5
        assert!(!c.triggered(&sample([82, 0, 0, 0, 0, 0, 0, 0])));
        assert!(c.triggered(&sample([83, 0, 0, 0, 0, 0, 0, 0])));
    }

    #[test]
    fn test_keeps_turning_after_trigger_then_resumes() {
        let mut c = controller(0.5, 11);
        c.tick(&sample([0, 0, 0, 0, 0, 0, 0, 300]));
        let clear = sample([0; 8]);
        let mut ticks = 0;
        let resumed = loop {
            let commands = c.tick(&clear);
            ticks += 1;
            if !commands.is_empty() {
                break commands;
            }
            assert!(ticks <= 4, "still dodging after {} clear ticks", ticks);
        };
        assert_eq!(resumed[0], (900, 900));
        assert!(ticks >= 2);
    }

    #[test]
    fn test_no_forward_command_while_front_blocked() {
        for seed in 1..50 {
            let mut c = controller(0.3, seed);
            for i in 0..200 {
                let blocked = (i / 7) % 2 == 0;
                let s = if blocked {
                    sample([0, 0, 0, 0, 0, 0, 100, 0])
                } else {
                    sample([0; 8])
                };
                for (left, right) in c.tick(&s) {
                    if blocked {
                        assert!(!(left > 0 && right > 0), "forward command {:?} while blocked", (left, right));
                    }
                }
            }
        }
    }

    #[test]
    fn test_random_speed_range() {
        let mut c = controller(0.25, 5);
        for _ in 0..200 {
            let (l, r) = c.random_speeds();
            assert!(l == 900 || r == 900);
            assert!(l.min(r) >= 225 && l.max(r) <= 900);
        }
    }
}
