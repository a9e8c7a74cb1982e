//! HardwareDriver trait definition

use crate::core::types::{EncoderState, PROXIMITY_SENSORS};
use crate::error::{DishaError, Result};
use std::fmt;
use tracing::{info, warn};

/// Sensors that must be enabled before they can be read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sensor {
    MotorPosition,
    MotorSpeed,
    Proximity,
}

impl fmt::Display for Sensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Sensor::MotorPosition => "motor_position",
            Sensor::MotorSpeed => "motor_speed",
            Sensor::Proximity => "proximity",
        };
        f.write_str(name)
    }
}

/// Differential-drive robot with wheel encoders and proximity sensors.
///
/// Calls are synchronous. Readings reflect the state at the last `step`.
/// Any call may fail transiently; callers log and retry on the next tick.
pub trait HardwareDriver: Send {
    /// Open the link to the robot
    fn connect(&mut self) -> Result<()>;

    /// Exchange one round of commands and sensor readings
    fn step(&mut self) -> Result<()>;

    fn enable(&mut self, sensor: Sensor) -> Result<()>;

    /// Current wheel encoder counters
    fn motor_position(&mut self) -> Result<EncoderState>;

    /// Overwrite the wheel encoder counters
    fn set_motor_position(&mut self, left: i32, right: i32) -> Result<()>;

    fn set_motor_speed(&mut self, left: i32, right: i32) -> Result<()>;

    /// Wheel speeds as last reported by the robot
    fn motor_speed(&mut self) -> Result<(i32, i32)>;

    fn proximity(&mut self) -> Result<[i32; PROXIMITY_SENSORS]>;
}

/// Try to connect up to `attempts` times
pub fn connect_with_retry(driver: &mut dyn HardwareDriver, attempts: u32) -> Result<()> {
    let attempts = attempts.max(1);
    for attempt in 1..=attempts {
        match driver.connect() {
            Ok(()) => {
                info!("Connected to robot (attempt {}/{})", attempt, attempts);
                return Ok(());
            }
            Err(e) => warn!("Connection attempt {}/{} failed: {}", attempt, attempts, e),
        }
    }
    Err(DishaError::Connection(format!(
        "robot unreachable after {} attempts",
        attempts
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Driver that refuses the first `failures` connection attempts
    struct FlakyLink {
        failures: u32,
        attempts: u32,
    }

    impl HardwareDriver for FlakyLink {
        fn connect(&mut self) -> Result<()> {
            self.attempts += 1;
            if self.attempts <= self.failures {
                Err(DishaError::Hardware("no answer".into()))
            } else {
                Ok(())
            }
        }
        fn step(&mut self) -> Result<()> {
            Ok(())
        }
        fn enable(&mut self, _sensor: Sensor) -> Result<()> {
            Ok(())
        }
        fn motor_position(&mut self) -> Result<EncoderState> {
            Ok(EncoderState::default())
        }
        fn set_motor_position(&mut self, _left: i32, _right: i32) -> Result<()> {
            Ok(())
        }
        fn set_motor_speed(&mut self, _left: i32, _right: i32) -> Result<()> {
            Ok(())
        }
        fn motor_speed(&mut self) -> Result<(i32, i32)> {
            Ok((0, 0))
        }
        fn proximity(&mut self) -> Result<[i32; PROXIMITY_SENSORS]> {
            Ok([0; PROXIMITY_SENSORS])
        }
    }

    #[test]
    fn test_connect_succeeds_within_attempts() {
        let mut link = FlakyLink {
            failures: 4,
            attempts: 0,
        };
        assert!(connect_with_retry(&mut link, 5).is_ok());
        assert_eq!(link.attempts, 5);
    }

    #[test]
    fn test_connect_gives_up() {
        let mut link = FlakyLink {
            failures: 5,
            attempts: 0,
        };
        let err = connect_with_retry(&mut link, 5).unwrap_err();
        assert!(matches!(err, DishaError::Connection(_)));
        assert_eq!(link.attempts, 5);
    }
}
