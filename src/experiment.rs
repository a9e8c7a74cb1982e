//! Experiment runner: wires the robot, the vision tracker and the fusion
//! policy together for one run.
//!
//! Flow:
//! 1. Validate the run parameters (fatal before anything starts)
//! 2. Calibrate only, or load the saved calibration
//! 3. Seed the start pose from a strict vision fix
//! 4. Start the tracker thread
//! 5. Follow the path or random walk until the limit is hit
//! 6. Stop everything and report

use crate::config::{DishaConfig, LimitCondition};
use crate::core::driver::HardwareDriver;
use crate::core::types::Pose;
use crate::error::{DishaError, Result};
use crate::fusion::{CorrectionMode, ExternalPoseSource, FusionPolicy};
use crate::motion::{MotionReport, Navigator};
use crate::trace::TraceSettings;
use crate::vision::{Calibration, FrameSource, TrackerState, VisionLocalizer};
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{info, warn};

/// What a finished run produced
#[derive(Debug, Clone, Default)]
pub struct ExperimentReport {
    /// Set for calibration-only runs
    pub calibration: Option<Calibration>,
    pub start_pose: Option<Pose>,
    pub final_pose: Option<Pose>,
    pub motion: Option<MotionReport>,
    pub tracker: Option<TrackerState>,
}

fn precondition(message: &str) -> DishaError {
    DishaError::Precondition(message.to_string())
}

/// Reject inconsistent run parameters
pub fn check_settings(config: &DishaConfig) -> Result<()> {
    let run = &config.run;
    if run.enable_external && !run.use_tracking {
        return Err(precondition("external estimation enabled without tracking: set use_tracking"));
    }
    if run.correction_mode == CorrectionMode::External && !run.enable_external {
        return Err(precondition("correction_mode is external but enable_external is off"));
    }
    if run.new_calibration && !run.use_tracking {
        return Err(precondition("calibration enabled without tracking: set use_tracking"));
    }
    if run.nav_param != -1.0 && !(0.0..=1.0).contains(&run.nav_param) {
        return Err(precondition("nav_param has to be in [0, 1] or -1"));
    }
    if run.limit == LimitCondition::Time && run.limit_value == 0 {
        return Err(precondition("time limit needs limit_value > 0"));
    }
    Ok(())
}

/// Run one experiment to completion
pub fn run(
    config: &DishaConfig,
    hardware: Box<dyn HardwareDriver>,
    camera: Option<Box<dyn FrameSource>>,
    external: Option<Arc<dyn ExternalPoseSource>>,
) -> Result<ExperimentReport> {
    check_settings(config)?;
    let run = &config.run;
    let mut report = ExperimentReport::default();

    let mut localizer = match (run.use_tracking, camera) {
        (true, Some(camera)) => Some(VisionLocalizer::from_config(camera, config)?),
        (true, None) => return Err(precondition("tracking enabled but no camera available")),
        (false, _) => None,
    };
    if run.enable_external && external.is_none() {
        return Err(precondition("external estimation enabled but no estimator available"));
    }

    if run.new_calibration {
        let localizer = localizer
            .as_mut()
            .ok_or_else(|| precondition("calibration needs the tracker"))?;
        let calibration = localizer.calibrate()?;
        info!("Calibration saved to {:?}", config.output.calibration_path());
        report.calibration = Some(calibration);
        return Ok(report);
    }

    if let Some(localizer) = localizer.as_mut() {
        localizer.load_calibration(&config.output.calibration_path())?;
    }

    let source: Option<Arc<dyn ExternalPoseSource>> = match run.correction_mode {
        CorrectionMode::Disabled => None,
        CorrectionMode::GroundTruth => localizer
            .as_ref()
            .map(|l| Arc::new(l.handle()) as Arc<dyn ExternalPoseSource>),
        CorrectionMode::External => external,
    };
    let fusion = FusionPolicy::new(run.correction_mode, &config.robot, source);
    let mut navigator = Navigator::new(hardware, config, fusion, Some(TraceSettings::from_config(config)))?;

    let mut tracker = None;
    if let Some(mut localizer) = localizer {
        if run.correction_mode == CorrectionMode::GroundTruth {
            match localizer.locate_robot() {
                Ok(pose) => {
                    navigator.seed_start_pose(pose);
                    report.start_pose = Some(pose);
                }
                Err(e) => warn!("Could not locate robot, keeping default start pose: {}", e),
            }
        }
        let thread = localizer.spawn(run.tracker_interval());
        navigator.attach_tracker(thread.handle());
        tracker = Some(thread);
    }

    let path = Path::new(&run.path_file);
    match run.limit {
        LimitCondition::Path => {
            navigator.follow_path(path)?;
            report.motion = navigator.wait_for_completion();
        }
        LimitCondition::Time => {
            match run.momentum() {
                Some(momentum) => navigator.start_random_walk(momentum)?,
                None => navigator.follow_path(path)?,
            }
            info!("Running for {} s", run.limit_value);
            thread::sleep(Duration::from_secs(run.limit_value));
            navigator.stop();
            report.motion = navigator.wait_for_completion();
        }
    }

    if let Some(mut thread) = tracker {
        let handle = thread.handle();
        thread.stop();
        report.tracker = Some(handle.state());
    }
    report.final_pose = Some(navigator.pose());
    info!("Experiment finished at {}", navigator.pose());
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> DishaConfig {
        let mut config = DishaConfig::default();
        config.run.use_tracking = false;
        config.run.correction_mode = CorrectionMode::Disabled;
        config
    }

    #[test]
    fn test_default_settings_are_valid() {
        assert!(check_settings(&DishaConfig::default()).is_ok());
    }

    #[test]
    fn test_calibration_needs_tracking() {
        let mut c = config();
        c.run.new_calibration = true;
        assert!(matches!(check_settings(&c), Err(DishaError::Precondition(_))));
    }

    #[test]
    fn test_external_needs_tracking() {
        let mut c = config();
        c.run.enable_external = true;
        assert!(check_settings(&c).is_err());
        c.run.use_tracking = true;
        assert!(check_settings(&c).is_ok());
    }

    #[test]
    fn test_external_mode_needs_estimator() {
        let mut c = config();
        c.run.correction_mode = CorrectionMode::External;
        assert!(check_settings(&c).is_err());
    }

    #[test]
    fn test_nav_param_range() {
        let mut c = config();
        for valid in [-1.0, 0.0, 0.5, 1.0] {
            c.run.nav_param = valid;
            assert!(check_settings(&c).is_ok(), "{} rejected", valid);
        }
        for invalid in [-0.5, 1.5, -2.0] {
            c.run.nav_param = invalid;
            assert!(check_settings(&c).is_err(), "{} accepted", invalid);
        }
    }

    #[test]
    fn test_time_limit_needs_value() {
        let mut c = config();
        c.run.limit_value = 0;
        assert!(check_settings(&c).is_err());
        c.run.limit = LimitCondition::Path;
        assert!(check_settings(&c).is_ok());
    }
}
