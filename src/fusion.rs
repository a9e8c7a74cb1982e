//! Correction policy: when to replace the dead-reckoning pose.
//!
//! - `GroundTruth`: the vision tracker replaces the pose whenever position
//!   or heading drift reaches its threshold
//! - `External`: an external estimator's pose is substituted every tick
//!   except while turning
//! - `Disabled`: pure dead reckoning

use crate::config::RobotConfig;
use crate::core::types::Pose;
use crate::shared::Correction;
use crate::utils::angle_difference;
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrectionMode {
    Disabled,
    #[default]
    GroundTruth,
    External,
}

/// Source of pose estimates independent of the wheel encoders
pub trait ExternalPoseSource: Send + Sync {
    /// Latest estimate, `None` until one is available
    fn estimate(&self) -> Option<Pose>;
}

/// Drift between the dead-reckoning pose and a measurement
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseError {
    /// Euclidean location error in mm
    pub position: f64,
    /// Absolute heading error in degrees, [0, 180]
    pub heading: f64,
}

impl PoseError {
    pub fn between(estimate: &Pose, measurement: &Pose) -> Self {
        Self {
            position: measurement.location.distance(&estimate.location),
            heading: angle_difference(measurement.heading, estimate.heading),
        }
    }
}

pub struct FusionPolicy {
    mode: CorrectionMode,
    position_threshold: f64,
    angle_threshold: f64,
    source: Option<Arc<dyn ExternalPoseSource>>,
}

impl FusionPolicy {
    pub fn new(mode: CorrectionMode, robot: &RobotConfig, source: Option<Arc<dyn ExternalPoseSource>>) -> Self {
        Self {
            mode,
            position_threshold: robot.position_threshold(),
            angle_threshold: robot.angle_error_threshold,
            source,
        }
    }

    pub fn disabled() -> Self {
        Self {
            mode: CorrectionMode::Disabled,
            position_threshold: f64::INFINITY,
            angle_threshold: f64::INFINITY,
            source: None,
        }
    }

    pub fn mode(&self) -> CorrectionMode {
        self.mode
    }

    pub fn position_threshold(&self) -> f64 {
        self.position_threshold
    }

    /// Thresholds are inclusive
    pub fn needs_correction(&self, error: &PoseError) -> bool {
        error.position >= self.position_threshold || error.heading >= self.angle_threshold
    }

    /// Decide this tick's correction for the dead-reckoning pose
    pub fn evaluate(&self, dead_reckoning: &Pose, turning: bool) -> Option<(Pose, Correction)> {
        match self.mode {
            CorrectionMode::Disabled => None,
            CorrectionMode::GroundTruth => {
                let measured = self.source.as_ref()?.estimate()?;
                let error = PoseError::between(dead_reckoning, &measured);
                if self.needs_correction(&error) {
                    debug!(
                        "Correcting {} -> {} (error {:.1} mm, {:.1}°)",
                        dead_reckoning, measured, error.position, error.heading
                    );
                    Some((measured, Correction::Position))
                } else {
                    None
                }
            }
            CorrectionMode::External => {
                if turning {
                    return None;
                }
                let estimate = self.source.as_ref()?.estimate()?;
                Some((estimate, Correction::Start))
            }
        }
    }

    /// Pose to seed the run with, if the source has one
    pub fn start_pose(&self) -> Option<Pose> {
        match self.mode {
            CorrectionMode::Disabled => None,
            _ => self.source.as_ref()?.estimate(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Pose);

    impl ExternalPoseSource for Fixed {
        fn estimate(&self) -> Option<Pose> {
            Some(self.0)
        }
    }

    fn ground_truth(measured: Pose) -> FusionPolicy {
        let robot = RobotConfig {
            diameter_mm: 100.0,
            error_threshold: 0.25,
            angle_error_threshold: 10.0,
            ..RobotConfig::default()
        };
        FusionPolicy::new(CorrectionMode::GroundTruth, &robot, Some(Arc::new(Fixed(measured))))
    }

    #[test]
    fn test_fires_at_exact_position_threshold() {
        let policy = ground_truth(Pose::new(125, 100, 0.0));
        let (pose, kind) = policy.evaluate(&Pose::new(100, 100, 0.0), false).unwrap();
        assert_eq!(pose, Pose::new(125, 100, 0.0));
        assert_eq!(kind, Correction::Position);

        let policy = ground_truth(Pose::new(124, 100, 0.0));
        assert!(policy.evaluate(&Pose::new(100, 100, 0.0), false).is_none());
    }

    #[test]
    fn test_fires_at_exact_angle_threshold() {
        let policy = ground_truth(Pose::new(100, 100, 175.0));
        assert!(policy.evaluate(&Pose::new(100, 100, -175.0), false).is_some());

        let policy = ground_truth(Pose::new(100, 100, 9.0));
        assert!(policy.evaluate(&Pose::new(100, 100, 0.0), false).is_none());
    }

    #[test]
    fn test_ground_truth_applies_while_turning() {
        let policy = ground_truth(Pose::new(200, 100, 0.0));
        assert!(policy.evaluate(&Pose::new(100, 100, 0.0), true).is_some());
    }

    #[test]
    fn test_external_skipped_while_turning() {
        let policy = FusionPolicy::new(
            CorrectionMode::External,
            &RobotConfig::default(),
            Some(Arc::new(Fixed(Pose::new(101, 100, 0.0)))),
        );
        assert!(policy.evaluate(&Pose::new(100, 100, 0.0), true).is_none());
        let (_, kind) = policy.evaluate(&Pose::new(100, 100, 0.0), false).unwrap();
        assert_eq!(kind, Correction::Start);
    }

    #[test]
    fn test_disabled_never_corrects() {
        let policy = FusionPolicy::disabled();
        assert!(policy.evaluate(&Pose::new(0, 0, 0.0), false).is_none());
        assert!(policy.start_pose().is_none());
    }
}
