//! Simulated e-puck and overhead camera for hardware-free runs
//!
//! | Component | Simulation Method |
//! |-----------|-------------------|
//! | Wheel encoders | Speed integration per step, wrapping counters, optional slip |
//! | Proximity (8 IR) | Ray cast to the arena walls, exponential falloff |
//! | Overhead camera | Rendered corner markers and robot discs |
//! | Link faults | Scripted connection, read, frame and glitch failures |
//!
//! Time advances only when `step` is called, by `simulation.step_dt`
//! seconds, so a run is reproducible for a given seed. With
//! `simulation.time_scale > 0` each step also sleeps, so other threads
//! (the tracker) see the robot move at a realistic pace.

mod camera;
mod encoder_sim;
mod physics;

pub use camera::SyntheticCamera;
pub use encoder_sim::EncoderSimulator;
pub use physics::PhysicsState;

use crate::config::DishaConfig;
use crate::core::driver::{HardwareDriver, Sensor};
use crate::core::types::{EncoderState, PROXIMITY_SENSORS, Pose};
use crate::error::{DishaError, Result};
use crate::noise::NoiseGenerator;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::debug;

/// Fastest wheel speed the motors accept (steps/s)
pub const MAX_WHEEL_SPEED: i32 = 1000;

/// Sensor bearings relative to the heading, clockwise from front right
const SENSOR_BEARINGS: [f64; PROXIMITY_SENSORS] = [15.0, 45.0, 90.0, 150.0, -150.0, -90.0, -45.0, -15.0];
const PROXIMITY_PEAK: f64 = 3000.0;
const PROXIMITY_FALLOFF_MM: f64 = 10.0;
const PROXIMITY_AMBIENT: f64 = 5.0;
/// Raw value reported by a glitching sensor
const PROXIMITY_GLITCH: i32 = 65535;

#[derive(Debug, Default)]
struct FaultPlan {
    failed_reads: u32,
    dropped_frames: u32,
    hidden_front_frames: u32,
    proximity_glitches: u32,
}

/// Faults to apply to the next camera frame
#[derive(Debug, Clone, Copy, Default)]
pub struct CameraFaults {
    pub drop_frame: bool,
    pub hide_front: bool,
}

/// Shared view of the simulated world for the camera and for tests
#[derive(Clone)]
pub struct SimHandle {
    physics: Arc<Mutex<PhysicsState>>,
    faults: Arc<Mutex<FaultPlan>>,
}

impl SimHandle {
    pub fn physics(&self) -> PhysicsState {
        *self.physics.lock()
    }

    /// Ground-truth pose, rounded to the mm
    pub fn true_pose(&self) -> Pose {
        self.physics.lock().pose()
    }

    /// Teleport the robot (encoders are not touched)
    pub fn place(&self, x: f64, y: f64, heading: f64) {
        self.physics.lock().place(x, y, heading);
    }

    /// Make the next `n` encoder reads fail
    pub fn fail_reads(&self, n: u32) {
        self.faults.lock().failed_reads += n;
    }

    pub fn drop_frames(&self, n: u32) {
        self.faults.lock().dropped_frames += n;
    }

    /// Render the next `n` frames without the front marker
    pub fn hide_front_marker(&self, n: u32) {
        self.faults.lock().hidden_front_frames += n;
    }

    /// Make the next `n` proximity reads contain an out-of-range value
    pub fn glitch_proximity(&self, n: u32) {
        self.faults.lock().proximity_glitches += n;
    }

    fn take_read_fault(&self) -> bool {
        let mut faults = self.faults.lock();
        take(&mut faults.failed_reads)
    }

    fn take_proximity_glitch(&self) -> bool {
        let mut faults = self.faults.lock();
        take(&mut faults.proximity_glitches)
    }

    pub(crate) fn take_camera_faults(&self) -> CameraFaults {
        let mut faults = self.faults.lock();
        CameraFaults {
            drop_frame: take(&mut faults.dropped_frames),
            hide_front: take(&mut faults.hidden_front_frames),
        }
    }
}

fn take(counter: &mut u32) -> bool {
    if *counter > 0 {
        *counter -= 1;
        true
    } else {
        false
    }
}

/// Simulated e-puck implementing [`HardwareDriver`]
pub struct SimulatedEpuck {
    sim: SimHandle,
    encoders: EncoderSimulator,
    step_dt: f64,
    /// Wall-clock pause per step
    step_pause: Option<Duration>,
    mm_per_tick: f64,
    degrees_per_mm: f64,
    connect_failures: u32,
    connected: bool,
    enabled: HashSet<Sensor>,
    commanded: (i32, i32),
    applied: (i32, i32),
}

impl SimulatedEpuck {
    pub fn new(config: &DishaConfig) -> Self {
        let sim_config = &config.simulation;
        let physics = PhysicsState::new(
            sim_config.start_x,
            sim_config.start_y,
            sim_config.start_heading,
            config.arena.width_mm,
            config.arena.height_mm,
            config.robot.diameter_mm / 2.0,
        );
        let mm_per_tick = 1000.0 / config.encoder.ticks_per_meter;
        let degrees_per_tick = 360.0 / config.encoder.full_turn_ticks;

        Self {
            sim: SimHandle {
                physics: Arc::new(Mutex::new(physics)),
                faults: Arc::new(Mutex::new(FaultPlan::default())),
            },
            encoders: EncoderSimulator::new(
                config.encoder.pos_max,
                sim_config.wheel_slip,
                NoiseGenerator::new(sim_config.seed),
            ),
            step_dt: sim_config.step_dt,
            step_pause: (sim_config.time_scale > 0.0)
                .then(|| Duration::from_secs_f64(sim_config.step_dt / sim_config.time_scale)),
            mm_per_tick,
            degrees_per_mm: degrees_per_tick / mm_per_tick,
            connect_failures: sim_config.connect_failures,
            connected: false,
            enabled: HashSet::new(),
            commanded: (0, 0),
            applied: (0, 0),
        }
    }

    pub fn handle(&self) -> SimHandle {
        self.sim.clone()
    }

    /// Camera looking at this robot's arena
    pub fn camera(&self, config: &DishaConfig) -> SyntheticCamera {
        SyntheticCamera::new(self.handle(), &config.arena, &config.camera, &config.simulation)
    }

    fn require(&self, sensor: Option<Sensor>) -> Result<()> {
        if !self.connected {
            return Err(DishaError::Hardware("robot not connected".to_string()));
        }
        if let Some(sensor) = sensor
            && !self.enabled.contains(&sensor)
        {
            return Err(DishaError::Hardware(format!("sensor {} not enabled", sensor)));
        }
        Ok(())
    }

    fn proximity_reading(&self, state: &PhysicsState, bearing: f64) -> i32 {
        let gap = (state.ray_to_wall(bearing) - state.radius()).max(0.0);
        (PROXIMITY_AMBIENT + PROXIMITY_PEAK * (-gap / PROXIMITY_FALLOFF_MM).exp()) as i32
    }
}

impl HardwareDriver for SimulatedEpuck {
    fn connect(&mut self) -> Result<()> {
        if self.connect_failures > 0 {
            self.connect_failures -= 1;
            return Err(DishaError::Hardware("no response from robot".to_string()));
        }
        self.connected = true;
        Ok(())
    }

    fn step(&mut self) -> Result<()> {
        self.require(None)?;
        self.applied = self.commanded;
        let (left, right) = self.encoders.update(self.applied.0, self.applied.1, self.step_dt);
        self.sim
            .physics
            .lock()
            .advance(left * self.mm_per_tick, right * self.mm_per_tick, self.degrees_per_mm);
        if let Some(pause) = self.step_pause {
            thread::sleep(pause);
        }
        Ok(())
    }

    fn enable(&mut self, sensor: Sensor) -> Result<()> {
        self.require(None)?;
        debug!("Enabling {}", sensor);
        self.enabled.insert(sensor);
        Ok(())
    }

    fn motor_position(&mut self) -> Result<EncoderState> {
        self.require(Some(Sensor::MotorPosition))?;
        if self.sim.take_read_fault() {
            return Err(DishaError::Hardware("motor position read timed out".to_string()));
        }
        let (left, right) = self.encoders.counters();
        Ok(EncoderState::new(left, right))
    }

    fn set_motor_position(&mut self, left: i32, right: i32) -> Result<()> {
        self.require(None)?;
        self.encoders.set(left, right);
        Ok(())
    }

    fn set_motor_speed(&mut self, left: i32, right: i32) -> Result<()> {
        self.require(None)?;
        self.commanded = (
            left.clamp(-MAX_WHEEL_SPEED, MAX_WHEEL_SPEED),
            right.clamp(-MAX_WHEEL_SPEED, MAX_WHEEL_SPEED),
        );
        Ok(())
    }

    fn motor_speed(&mut self) -> Result<(i32, i32)> {
        self.require(Some(Sensor::MotorSpeed))?;
        Ok(self.applied)
    }

    fn proximity(&mut self) -> Result<[i32; PROXIMITY_SENSORS]> {
        self.require(Some(Sensor::Proximity))?;
        let state = self.sim.physics();
        let mut values = SENSOR_BEARINGS.map(|bearing| self.proximity_reading(&state, bearing));
        if self.sim.take_proximity_glitch() {
            values[3] = PROXIMITY_GLITCH;
        }
        Ok(values)
    }
}
