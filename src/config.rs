//! Configuration loading for Disha

use crate::error::{DishaError, Result};
use crate::fusion::CorrectionMode;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Clone, Debug, Default, Deserialize)]
pub struct DishaConfig {
    #[serde(default)]
    pub arena: ArenaConfig,
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub robot: RobotConfig,
    #[serde(default)]
    pub encoder: EncoderConfig,
    #[serde(default)]
    pub motion: MotionConfig,
    #[serde(default)]
    pub random_walk: RandomWalkConfig,
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
}

/// Physical arena and its corner markers
#[derive(Clone, Debug, Deserialize)]
pub struct ArenaConfig {
    /// Arena width in mm (default: 1000)
    #[serde(default = "default_arena_width")]
    pub width_mm: f64,

    /// Arena height in mm (default: 310)
    #[serde(default = "default_arena_height")]
    pub height_mm: f64,

    /// Side length of the yellow corner markers in mm (default: 35)
    #[serde(default = "default_marker_size")]
    pub marker_size_mm: i32,

    /// Largest plausible pixel distance between the two robot markers (default: 84)
    #[serde(default = "default_max_marker_distance")]
    pub max_marker_distance_px: f64,
}

/// Camera region of interest, in pixels of the full frame
#[derive(Clone, Debug, Deserialize)]
pub struct CameraConfig {
    #[serde(default)]
    pub offx: u32,
    #[serde(default)]
    pub offy: u32,
    #[serde(default = "default_roi_width")]
    pub width: u32,
    #[serde(default = "default_roi_height")]
    pub height: u32,
}

/// Robot body and fusion tolerances
#[derive(Clone, Debug, Deserialize)]
pub struct RobotConfig {
    /// Robot diameter in mm (default: 84)
    #[serde(default = "default_diameter")]
    pub diameter_mm: f64,

    /// Position error threshold as a fraction of the diameter (default: 0.3)
    #[serde(default = "default_error_threshold")]
    pub error_threshold: f64,

    /// Heading error threshold in degrees (default: 1000, never fires)
    #[serde(default = "default_angle_error_threshold")]
    pub angle_error_threshold: f64,

    /// Scales the proximity thresholds for ambient light (default: 1.1)
    #[serde(default = "default_light_factor")]
    pub light_factor: f64,
}

impl RobotConfig {
    /// Position error (mm) at which a ground-truth correction fires
    pub fn position_threshold(&self) -> f64 {
        self.diameter_mm * self.error_threshold
    }
}

/// Wheel encoder geometry
#[derive(Clone, Debug, Deserialize)]
pub struct EncoderConfig {
    /// Largest counter value before the hardware wraps (default: 32767)
    #[serde(default = "default_pos_max")]
    pub pos_max: i32,

    /// Distance from the wrap point at which counters are re-centred (default: 1000)
    #[serde(default = "default_wrap_margin")]
    pub wrap_margin: i32,

    /// Ticks one wheel travels while the robot spins 360 degrees in place (default: 1278)
    #[serde(default = "default_full_turn")]
    pub full_turn_ticks: f64,

    /// Ticks per metre of wheel travel (default: 7700)
    #[serde(default = "default_ticks_per_meter")]
    pub ticks_per_meter: f64,
}

impl EncoderConfig {
    /// Counter value written to both wheels at start-up
    pub fn initial_counter(&self) -> i32 {
        self.pos_max / 2
    }
}

/// Turn and straight-line motion parameters
#[derive(Clone, Debug, Deserialize)]
pub struct MotionConfig {
    #[serde(default = "default_turn_fast_speed")]
    pub turn_fast_speed: i32,

    #[serde(default = "default_turn_slow_speed")]
    pub turn_slow_speed: i32,

    /// Remaining ticks below which a turn creeps (default: 50)
    #[serde(default = "default_slow_band")]
    pub slow_band_ticks: i32,

    /// Safety margin applied to turn targets near the wrap boundary (default: 75)
    #[serde(default = "default_turn_margin")]
    pub turn_margin_ticks: i32,

    /// Smallest heading error that triggers a turn before driving (default: 2)
    #[serde(default = "default_heading_deadband")]
    pub heading_deadband_deg: f64,

    #[serde(default = "default_cruise_speed")]
    pub cruise_speed: i32,

    /// Poll interval while waiting for the wheels to stop (default: 33)
    #[serde(default = "default_stop_poll")]
    pub stop_poll_ms: u64,
}

impl MotionConfig {
    pub fn stop_poll(&self) -> Duration {
        Duration::from_millis(self.stop_poll_ms)
    }
}

/// Obstacle-avoiding random walk
#[derive(Clone, Debug, Deserialize)]
pub struct RandomWalkConfig {
    #[serde(default = "default_max_speed")]
    pub max_speed: i32,

    #[serde(default = "default_dodge_speed")]
    pub dodge_speed: i32,

    /// Ticks between random wheel speed updates (default: 10)
    #[serde(default = "default_update_interval")]
    pub update_interval: u64,

    /// Ticks to keep spinning after the last trigger (default: 2)
    #[serde(default = "default_continue_turning")]
    pub continue_turning_steps: i32,

    /// Weighted side-sum threshold before the light factor (default: 60)
    #[serde(default = "default_sum_threshold")]
    pub sum_threshold: f64,

    /// Single front sensor threshold before the light factor (default: 75)
    #[serde(default = "default_single_threshold")]
    pub single_threshold: f64,

    /// Raw readings above this are treated as faults (default: 65000)
    #[serde(default = "default_proximity_fault")]
    pub proximity_fault_level: i32,

    /// Replacement for faulty readings (default: 10)
    #[serde(default = "default_proximity_replacement")]
    pub proximity_replacement: i32,

    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
}

impl RandomWalkConfig {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}

/// How long an experiment runs
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitCondition {
    /// Run for `limit_value` seconds
    #[default]
    Time,
    /// Run until the path has been followed once
    Path,
}

/// Experiment run parameters
#[derive(Clone, Debug, Deserialize)]
pub struct RunConfig {
    #[serde(default)]
    pub correction_mode: CorrectionMode,

    /// Start the vision tracker (default: true)
    #[serde(default = "default_true")]
    pub use_tracking: bool,

    /// Only calibrate the camera and write the calibration file
    #[serde(default)]
    pub new_calibration: bool,

    /// Substitute poses from an external estimator
    #[serde(default)]
    pub enable_external: bool,

    #[serde(default)]
    pub limit: LimitCondition,

    /// Seconds for `time` runs (default: 30)
    #[serde(default = "default_limit_value")]
    pub limit_value: u64,

    /// -1 follows the path file, a value in [0, 1] random walks with that momentum
    #[serde(default = "default_nav_param")]
    pub nav_param: f64,

    #[serde(default = "default_path_file")]
    pub path_file: String,

    #[serde(default = "default_connect_attempts")]
    pub connect_attempts: u32,

    #[serde(default = "default_tracker_interval")]
    pub tracker_interval_ms: u64,

    #[serde(default = "default_trace_interval")]
    pub trace_interval_ms: u64,
}

impl RunConfig {
    /// Random-walk momentum, or `None` when the path file should be followed
    pub fn momentum(&self) -> Option<f64> {
        (self.nav_param >= 0.0).then_some(self.nav_param)
    }

    pub fn tracker_interval(&self) -> Duration {
        Duration::from_millis(self.tracker_interval_ms)
    }

    pub fn trace_interval(&self) -> Duration {
        Duration::from_millis(self.trace_interval_ms)
    }
}

/// Where run artifacts are written
#[derive(Clone, Debug, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: String,

    /// Append every tracked pose to the tracking log
    #[serde(default)]
    pub store_positions: bool,

    /// Also draw start-correction segments in the trace image and the
    /// individual marker paths in the tracker traces
    #[serde(default)]
    pub debug: bool,
}

impl OutputConfig {
    pub fn calibration_path(&self) -> PathBuf {
        Path::new(&self.dir).join("cam/calibration/calibration_pts.txt")
    }

    pub fn trace_image_path(&self) -> PathBuf {
        Path::new(&self.dir).join("epuck/trace.png")
    }

    pub fn trace_log_path(&self) -> PathBuf {
        Path::new(&self.dir).join("epuck/trace.txt")
    }

    pub fn tracking_log_path(&self) -> PathBuf {
        Path::new(&self.dir).join("tracking.txt")
    }

    /// Marker trace in camera pixels, with the calibrated arena outline
    pub fn tracker_trace_path(&self) -> PathBuf {
        Path::new(&self.dir).join("cam/trace.png")
    }

    /// Marker trace projected into arena millimetres
    pub fn tracker_arena_trace_path(&self) -> PathBuf {
        Path::new(&self.dir).join("cam/traceCvt.png")
    }
}

/// Simulated robot and camera used by the binary and the tests
#[derive(Clone, Debug, Deserialize)]
pub struct SimulationConfig {
    /// Random seed (0 = seed from entropy)
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// True start pose; defaults to one diameter from the top-left corner
    #[serde(default = "default_start_x")]
    pub start_x: f64,
    #[serde(default = "default_start_y")]
    pub start_y: f64,
    #[serde(default)]
    pub start_heading: f64,

    /// Simulated time per hardware step in seconds (default: 0.022, where a
    /// 700 steps/s cruise covers 15.4 ticks, 2 mm, per step)
    #[serde(default = "default_step_dt")]
    pub step_dt: f64,

    /// Standard deviation of per-step wheel slip as a fraction of travel
    #[serde(default)]
    pub wheel_slip: f64,

    /// Failed connection attempts before the simulated robot answers
    #[serde(default)]
    pub connect_failures: u32,

    /// Distance of each robot marker from the robot centre in mm (default: 20)
    #[serde(default = "default_marker_offset")]
    pub marker_offset_mm: f64,

    /// Radius of each robot marker in mm (default: 8)
    #[serde(default = "default_marker_radius")]
    pub marker_radius_mm: f64,

    /// Pixel margin between the ROI border and the arena (default: 20)
    #[serde(default = "default_margin_px")]
    pub margin_px: u32,

    /// Simulated seconds per wall-clock second; 0 steps as fast as possible
    #[serde(default)]
    pub time_scale: f64,
}

impl DishaConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| DishaError::Config(format!("Failed to read config file: {}", e)))?;
        let config: DishaConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings later stages would divide by
    pub fn validate(&self) -> Result<()> {
        if !(self.arena.width_mm > 0.0 && self.arena.height_mm > 0.0) {
            return Err(DishaError::Config(format!(
                "arena must have a positive size, got {} x {} mm",
                self.arena.width_mm, self.arena.height_mm
            )));
        }
        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(DishaError::Config("camera ROI must not be empty".to_string()));
        }
        Ok(())
    }
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            width_mm: default_arena_width(),
            height_mm: default_arena_height(),
            marker_size_mm: default_marker_size(),
            max_marker_distance_px: default_max_marker_distance(),
        }
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            offx: 0,
            offy: 0,
            width: default_roi_width(),
            height: default_roi_height(),
        }
    }
}

impl Default for RobotConfig {
    fn default() -> Self {
        Self {
            diameter_mm: default_diameter(),
            error_threshold: default_error_threshold(),
            angle_error_threshold: default_angle_error_threshold(),
            light_factor: default_light_factor(),
        }
    }
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            pos_max: default_pos_max(),
            wrap_margin: default_wrap_margin(),
            full_turn_ticks: default_full_turn(),
            ticks_per_meter: default_ticks_per_meter(),
        }
    }
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            turn_fast_speed: default_turn_fast_speed(),
            turn_slow_speed: default_turn_slow_speed(),
            slow_band_ticks: default_slow_band(),
            turn_margin_ticks: default_turn_margin(),
            heading_deadband_deg: default_heading_deadband(),
            cruise_speed: default_cruise_speed(),
            stop_poll_ms: default_stop_poll(),
        }
    }
}

impl Default for RandomWalkConfig {
    fn default() -> Self {
        Self {
            max_speed: default_max_speed(),
            dodge_speed: default_dodge_speed(),
            update_interval: default_update_interval(),
            continue_turning_steps: default_continue_turning(),
            sum_threshold: default_sum_threshold(),
            single_threshold: default_single_threshold(),
            proximity_fault_level: default_proximity_fault(),
            proximity_replacement: default_proximity_replacement(),
            tick_ms: default_tick_ms(),
        }
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            correction_mode: CorrectionMode::default(),
            use_tracking: default_true(),
            new_calibration: false,
            enable_external: false,
            limit: LimitCondition::default(),
            limit_value: default_limit_value(),
            nav_param: default_nav_param(),
            path_file: default_path_file(),
            connect_attempts: default_connect_attempts(),
            tracker_interval_ms: default_tracker_interval(),
            trace_interval_ms: default_trace_interval(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            store_positions: false,
            debug: false,
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: default_seed(),
            start_x: default_start_x(),
            start_y: default_start_y(),
            start_heading: 0.0,
            step_dt: default_step_dt(),
            wheel_slip: 0.0,
            connect_failures: 0,
            marker_offset_mm: default_marker_offset(),
            marker_radius_mm: default_marker_radius(),
            margin_px: default_margin_px(),
            time_scale: 0.0,
        }
    }
}

// Default value functions
fn default_true() -> bool {
    true
}
fn default_arena_width() -> f64 {
    1000.0
}
fn default_arena_height() -> f64 {
    310.0
}
fn default_marker_size() -> i32 {
    35
}
fn default_max_marker_distance() -> f64 {
    84.0
}
fn default_roi_width() -> u32 {
    640
}
fn default_roi_height() -> u32 {
    480
}
fn default_diameter() -> f64 {
    84.0
}
fn default_error_threshold() -> f64 {
    0.3
}
fn default_angle_error_threshold() -> f64 {
    1000.0
}
fn default_light_factor() -> f64 {
    1.1
}

// Encoder defaults
fn default_pos_max() -> i32 {
    32767
}
fn default_wrap_margin() -> i32 {
    1000
}
fn default_full_turn() -> f64 {
    1278.0
}
fn default_ticks_per_meter() -> f64 {
    7700.0
}

// Motion defaults
fn default_turn_fast_speed() -> i32 {
    400
}
fn default_turn_slow_speed() -> i32 {
    150
}
fn default_slow_band() -> i32 {
    50
}
fn default_turn_margin() -> i32 {
    75
}
fn default_heading_deadband() -> f64 {
    2.0
}
fn default_cruise_speed() -> i32 {
    700
}
fn default_stop_poll() -> u64 {
    33
}

// Random walk defaults
fn default_max_speed() -> i32 {
    900
}
fn default_dodge_speed() -> i32 {
    400
}
fn default_update_interval() -> u64 {
    10
}
fn default_continue_turning() -> i32 {
    2
}
fn default_sum_threshold() -> f64 {
    60.0
}
fn default_single_threshold() -> f64 {
    75.0
}
fn default_proximity_fault() -> i32 {
    65000
}
fn default_proximity_replacement() -> i32 {
    10
}
fn default_tick_ms() -> u64 {
    5
}

// Run defaults
fn default_limit_value() -> u64 {
    30
}
fn default_nav_param() -> f64 {
    -1.0
}
fn default_path_file() -> String {
    "input/path/path_c.txt".to_string()
}
fn default_connect_attempts() -> u32 {
    5
}
fn default_tracker_interval() -> u64 {
    30
}
fn default_trace_interval() -> u64 {
    33
}
fn default_output_dir() -> String {
    "output".to_string()
}

// Simulation defaults
fn default_seed() -> u64 {
    42
}
fn default_start_x() -> f64 {
    default_diameter()
}
fn default_start_y() -> f64 {
    default_diameter()
}
fn default_step_dt() -> f64 {
    0.022
}
fn default_marker_offset() -> f64 {
    20.0
}
fn default_marker_radius() -> f64 {
    8.0
}
fn default_margin_px() -> u32 {
    20
}
