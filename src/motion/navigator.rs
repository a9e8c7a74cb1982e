//! Motion control for the e-puck.
//!
//! The navigator owns the hardware link and the dead-reckoning engine behind
//! one mutex. Every command runs on its own named worker thread:
//! - `turn`: spin in place by a number of degrees
//! - `go_to`: turn towards a point and drive there, restarting whenever
//!   the pose is corrected on the way
//! - `follow_path` / `loop_path`: `go_to` every point of a path file
//! - `start_random_walk`: reactive wall-dodging walk until stopped
//!
//! Commands are expected to be issued from one controlling thread. A new
//! command waits for the previous worker to finish.

use super::path::load_path;
use super::random_walk::RandomWalkController;
use crate::config::{DishaConfig, MotionConfig, RandomWalkConfig};
use crate::core::driver::{HardwareDriver, Sensor, connect_with_retry};
use crate::core::types::{EncoderState, Point, Pose, ProximitySample, Wheel};
use crate::error::{DishaError, Result};
use crate::fusion::FusionPolicy;
use crate::odometry::{DeadReckoning, TurnTarget};
use crate::shared::{Correction, SharedPose};
use crate::trace::{TraceCanvas, TraceRecorder, TraceSettings};
use crate::utils::{round_half_up, shortest_turn};
use crate::vision::TrackerHandle;
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info, warn};

/// What the robot is currently doing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MotionState {
    #[default]
    Idle,
    Turning,
    Straight,
    /// A correction interrupted a straight segment; the segment is replanned
    Correcting,
    FollowingPath,
    RandomWalking,
    Stopped,
}

/// Outcome of a single `go_to`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GoToOutcome {
    pub reached: bool,
    /// Times the segment was replanned after a correction
    pub restarts: u32,
}

/// Summary returned by a finished motion worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MotionReport {
    /// Targets attempted
    pub targets: usize,
    pub reached: usize,
    pub restarts: u32,
    pub stopped: bool,
}

impl MotionReport {
    fn record(&mut self, outcome: GoToOutcome) {
        self.targets += 1;
        self.reached += outcome.reached as usize;
        self.restarts += outcome.restarts;
    }
}

/// Hardware link and odometry, always locked together
struct Drive {
    hardware: Box<dyn HardwareDriver>,
    odometry: DeadReckoning,
}

struct TraceControl {
    settings: Option<TraceSettings>,
    canvas: Arc<Mutex<TraceCanvas>>,
    recorder: Option<TraceRecorder>,
}

struct NavigatorInner {
    drive: Mutex<Drive>,
    pose: Arc<SharedPose>,
    fusion: FusionPolicy,
    motion: MotionConfig,
    random_walk: RandomWalkConfig,
    light_factor: f64,
    full_turn_ticks: f64,
    position_threshold: f64,
    walk_seed: u64,
    stopped: AtomicBool,
    turning: AtomicBool,
    state: Mutex<MotionState>,
    trace: Mutex<TraceControl>,
}

impl NavigatorInner {
    fn set_state(&self, state: MotionState) {
        *self.state.lock() = state;
    }

    fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Relaxed)
    }

    fn corrected_since(&self, epoch: u64) -> bool {
        self.pose.correction_epoch() != epoch
    }

    /// One odometry tick: step, integrate, fuse, guard the encoders.
    ///
    /// Returns the raw counters read this tick, `None` if the read failed
    /// and the tick was skipped.
    fn update_position(&self) -> Option<EncoderState> {
        let mut drive = self.drive.lock();

        let counters = match drive.hardware.step().and_then(|_| drive.hardware.motor_position()) {
            Ok(counters) => counters,
            Err(e) => {
                warn!("Odometry tick skipped: {}", e);
                return None;
            }
        };

        drive.odometry.integrate(counters);
        let previous = drive.odometry.previous();
        let turning = self.turning.load(Ordering::Relaxed);
        let correction = match self.fusion.evaluate(&drive.odometry.pose(), turning) {
            Some((measured, kind)) => {
                drive.odometry.correct(measured);
                kind
            }
            None => Correction::None,
        };
        self.pose.publish(previous, drive.odometry.pose(), correction);

        if let Some(recentred) = drive.odometry.check_overflow() {
            debug!("Re-centring encoders {:?} -> {:?}", counters, recentred);
            let written = drive
                .hardware
                .set_motor_position(recentred.left, recentred.right)
                .and_then(|_| drive.hardware.step());
            if let Err(e) = written {
                error!("Failed to re-centre encoders: {}", e);
                drive.odometry.prime(counters);
            }
        }
        Some(counters)
    }

    fn set_speed(&self, left: i32, right: i32) -> Result<()> {
        let mut drive = self.drive.lock();
        drive.hardware.set_motor_speed(left, right)?;
        drive.hardware.step()
    }

    fn motor_speed(&self) -> Option<(i32, i32)> {
        match self.drive.lock().hardware.motor_speed() {
            Ok(speed) => Some(speed),
            Err(e) => {
                warn!("Failed to read wheel speed: {}", e);
                None
            }
        }
    }

    /// Keep commanding zero speed until the robot reports both wheels stopped
    fn zero_wheel_speed(&self) {
        let mut speed = self.motor_speed();
        while speed != Some((0, 0)) {
            if let Err(e) = self.drive.lock().hardware.set_motor_speed(0, 0) {
                error!("Couldn't stop robot: {}", e);
            }
            self.update_position();
            thread::sleep(self.motion.stop_poll());
            speed = self.motor_speed();
        }
    }

    fn path_length(&self) -> f64 {
        self.drive.lock().odometry.path_length()
    }

    /// Spin in place. The wheel moving forward is monitored against its target.
    fn turn(&self, degrees: f64) {
        self.turning.store(true, Ordering::Relaxed);
        self.set_state(MotionState::Turning);

        let (wheel, direction) = if degrees > 0.0 {
            (Wheel::Left, 1)
        } else {
            (Wheel::Right, -1)
        };
        let ticks = round_half_up(degrees.abs() * self.full_turn_ticks / 360.0);
        if ticks == 0 {
            self.turning.store(false, Ordering::Relaxed);
            return;
        }

        let start = loop {
            if self.is_stopped() {
                self.turning.store(false, Ordering::Relaxed);
                return;
            }
            if let Some(counters) = self.update_position() {
                break counters.wheel(wheel);
            }
        };
        let guard = *self.drive.lock().odometry.guard();
        let mut target = TurnTarget::new(&guard, start, ticks, self.motion.turn_margin_ticks);
        debug!("Turning {:.1}° ({} ticks, target {})", degrees, ticks, target.target());

        let fast = (direction * self.motion.turn_fast_speed, -direction * self.motion.turn_fast_speed);
        if target.remaining(start) >= self.motion.slow_band_ticks {
            // Repeat until the robot confirms the turn speed
            while !self.is_stopped() {
                if let Err(e) = self.drive.lock().hardware.set_motor_speed(fast.0, fast.1) {
                    warn!("Failed to command turn: {}", e);
                }
                self.update_position();
                if self.motor_speed() == Some(fast) {
                    break;
                }
            }
        }

        let slow = (direction * self.motion.turn_slow_speed, -direction * self.motion.turn_slow_speed);
        let mut creeping = false;
        while !self.is_stopped() {
            let Some(counters) = self.update_position() else {
                continue;
            };
            let position = counters.wheel(wheel);
            if target.reached(position) {
                break;
            }
            if !creeping && target.remaining(position) < self.motion.slow_band_ticks {
                match self.drive.lock().hardware.set_motor_speed(slow.0, slow.1) {
                    Ok(()) => creeping = true,
                    Err(e) => warn!("Failed to slow turn: {}", e),
                }
            }
        }

        self.turning.store(false, Ordering::Relaxed);
    }

    /// Drive to `target`, replanning from the corrected pose after each correction
    fn go_to(&self, target: Point) -> GoToOutcome {
        let mut outcome = GoToOutcome::default();

        loop {
            let pose = self.pose.current();
            let distance = pose.distance_to(&target);
            if distance <= self.position_threshold {
                if outcome.restarts == 0 {
                    debug!("Already at {}, skipping", target);
                }
                outcome.reached = true;
                return outcome;
            }

            let epoch = self.pose.correction_epoch();
            self.drive.lock().odometry.reset_path_length();

            let turn = shortest_turn(pose.heading, bearing(pose.location, target, distance));
            if turn.abs() > self.motion.heading_deadband_deg {
                self.turn(turn);
            }

            self.set_state(MotionState::Straight);
            let cruise = self.motion.cruise_speed;
            while !self.corrected_since(epoch) && !self.is_stopped() {
                match self.set_speed(cruise, cruise) {
                    Ok(()) => break,
                    Err(e) => warn!("Failed to start driving: {}", e),
                }
            }

            while self.path_length() < distance && !self.corrected_since(epoch) && !self.is_stopped() {
                self.update_position();
            }

            if self.corrected_since(epoch) && !self.is_stopped() {
                outcome.restarts += 1;
                self.set_state(MotionState::Correcting);
                debug!("Pose corrected on the way to {}, replanning", target);
                // Turn targets are counted from a standing start
                self.zero_wheel_speed();
                continue;
            }

            self.zero_wheel_speed();
            outcome.reached = !self.is_stopped();
            if outcome.reached {
                info!("Reached target {}", target);
            }
            return outcome;
        }
    }

    fn follow(&self, points: &[Point], turns: u32) -> MotionReport {
        let mut report = MotionReport::default();
        'laps: for lap in 0..turns {
            debug!("Path lap {}/{}", lap + 1, turns);
            for &point in points {
                if self.is_stopped() {
                    break 'laps;
                }
                self.set_state(MotionState::FollowingPath);
                report.record(self.go_to(point));
            }
        }
        report
    }

    fn random_walk(&self, mut controller: RandomWalkController, active: &AtomicBool) {
        let config = &self.random_walk;
        while active.load(Ordering::Relaxed) {
            let raw = {
                let mut drive = self.drive.lock();
                drive.hardware.step().and_then(|_| drive.hardware.proximity())
            };
            match raw {
                Ok(raw) => {
                    let sample = ProximitySample::sanitized(
                        raw,
                        config.proximity_fault_level,
                        config.proximity_replacement,
                    );
                    self.update_position();
                    for (left, right) in controller.tick(&sample) {
                        if let Err(e) = self.set_speed(left, right) {
                            warn!("Failed to command wheels: {}", e);
                        }
                    }
                }
                Err(e) => warn!("Proximity read failed: {}", e),
            }
            thread::sleep(config.tick());
        }
        self.zero_wheel_speed();
    }

    fn start_trace(&self) {
        let mut trace = self.trace.lock();
        if trace.recorder.is_some() {
            return;
        }
        if let Some(settings) = trace.settings.clone() {
            let canvas = Arc::clone(&trace.canvas);
            trace.recorder = Some(TraceRecorder::start(Arc::clone(&self.pose), canvas, settings));
        }
    }

    fn stop_trace(&self) {
        let recorder = self.trace.lock().recorder.take();
        if let Some(mut recorder) = recorder
            && let Err(e) = recorder.stop()
        {
            error!("Failed to write trace: {}", e);
        }
    }

    /// Final state once a worker exits
    fn finish(&self) {
        self.set_state(if self.is_stopped() {
            MotionState::Stopped
        } else {
            MotionState::Idle
        });
    }
}

/// Heading in degrees from `from` towards `to`, `distance` apart
fn bearing(from: Point, to: Point, distance: f64) -> f64 {
    let alpha = ((to.y - from.y) as f64 / distance).clamp(-1.0, 1.0).asin().to_degrees();
    if from.x > to.x {
        if alpha >= 0.0 { 180.0 - alpha } else { -180.0 - alpha }
    } else {
        alpha
    }
}

struct RandomWalkWorker {
    active: Arc<AtomicBool>,
    join: JoinHandle<()>,
}

/// Drives the robot and keeps its fused pose
pub struct Navigator {
    inner: Arc<NavigatorInner>,
    worker: Option<JoinHandle<MotionReport>>,
    random_walk: Option<RandomWalkWorker>,
    tracker: Option<TrackerHandle>,
}

impl Navigator {
    /// Connect to the robot and prepare its encoders.
    ///
    /// The pose starts one diameter away from the top-left corner, facing +x.
    /// `trace` enables the trace recorder during motion.
    pub fn new(
        mut hardware: Box<dyn HardwareDriver>,
        config: &DishaConfig,
        fusion: FusionPolicy,
        trace: Option<TraceSettings>,
    ) -> Result<Self> {
        info!("Connecting to robot...");
        connect_with_retry(hardware.as_mut(), config.run.connect_attempts)?;
        hardware.enable(Sensor::MotorPosition)?;
        hardware.enable(Sensor::MotorSpeed)?;

        let initial = config.encoder.initial_counter();
        if let Err(e) = hardware
            .set_motor_position(initial, initial)
            .and_then(|_| hardware.step())
        {
            error!("Failed to reset encoders: {}", e);
        }

        let diameter = round_half_up(config.robot.diameter_mm);
        let start = Pose::new(diameter, diameter, 0.0);
        let mut odometry = DeadReckoning::new(&config.encoder, start);
        odometry.prime(EncoderState::new(initial, initial));

        let width = config.arena.width_mm.max(1.0) as u32;
        let height = config.arena.height_mm.max(1.0) as u32;
        let canvas = match &trace {
            Some(settings) => match &settings.image_path {
                Some(path) => TraceCanvas::load_or_new(path, width, height),
                None => TraceCanvas::new(width, height),
            },
            None => TraceCanvas::new(width, height),
        };

        Ok(Self {
            inner: Arc::new(NavigatorInner {
                drive: Mutex::new(Drive { hardware, odometry }),
                pose: Arc::new(SharedPose::new(start)),
                fusion,
                motion: config.motion.clone(),
                random_walk: config.random_walk.clone(),
                light_factor: config.robot.light_factor,
                full_turn_ticks: config.encoder.full_turn_ticks,
                position_threshold: config.robot.position_threshold(),
                walk_seed: config.simulation.seed,
                stopped: AtomicBool::new(false),
                turning: AtomicBool::new(false),
                state: Mutex::new(MotionState::Idle),
                trace: Mutex::new(TraceControl {
                    settings: trace,
                    canvas: Arc::new(Mutex::new(canvas)),
                    recorder: None,
                }),
            }),
            worker: None,
            random_walk: None,
            tracker: None,
        })
    }

    /// Tracker to stop together with the robot
    pub fn attach_tracker(&mut self, tracker: TrackerHandle) {
        self.tracker = Some(tracker);
    }

    pub fn pose(&self) -> Pose {
        self.inner.pose.current()
    }

    pub fn shared_pose(&self) -> Arc<SharedPose> {
        Arc::clone(&self.inner.pose)
    }

    pub fn state(&self) -> MotionState {
        *self.inner.state.lock()
    }

    pub fn path_length(&self) -> f64 {
        self.inner.path_length()
    }

    pub fn is_random_walking(&self) -> bool {
        self.random_walk.is_some()
    }

    /// How often the encoder counters were re-centred before wrapping
    pub fn recentre_count(&self) -> u64 {
        self.inner.drive.lock().odometry.recentre_count()
    }

    /// Run one odometry tick on the calling thread
    pub fn update_position(&self) -> Option<EncoderState> {
        self.inner.update_position()
    }

    /// Replace the pose with a start-of-run measurement.
    ///
    /// Both the current and previous pose are set and both correction flags
    /// are raised; running motion is not interrupted.
    pub fn seed_start_pose(&self, pose: Pose) {
        let mut drive = self.inner.drive.lock();
        drive.odometry.seed(pose);
        self.inner.pose.publish(pose, pose, Correction::Start);
        info!("Start pose set to {}", pose);
    }

    /// Seed the start pose from the correction source, if it has one
    pub fn adjust_start_position(&self) -> Option<Pose> {
        let pose = self.inner.fusion.start_pose()?;
        self.seed_start_pose(pose);
        Some(pose)
    }

    pub fn turn(&mut self, degrees: f64) {
        self.spawn("turn", move |inner| {
            inner.turn(degrees);
            inner.zero_wheel_speed();
            MotionReport {
                stopped: inner.is_stopped(),
                ..MotionReport::default()
            }
        });
    }

    pub fn go_to(&mut self, target: Point) {
        info!("Starting go_to {}", target);
        self.spawn("goto", move |inner| {
            inner.start_trace();
            let mut report = MotionReport::default();
            report.record(inner.go_to(target));
            inner.stop_trace();
            report
        });
    }

    /// Follow the points of a path file once
    pub fn follow_path(&mut self, path: &Path) -> Result<()> {
        self.loop_path(path, 1)
    }

    /// Follow the points of a path file `turns` times.
    ///
    /// The file is parsed before the worker starts; parse errors are fatal.
    pub fn loop_path(&mut self, path: &Path, turns: u32) -> Result<()> {
        if turns == 0 {
            return Err(DishaError::Precondition("loop_path needs at least one turn".to_string()));
        }
        let points = load_path(path)?;
        info!("Following {} points from {:?} ({} laps)", points.len(), path, turns);
        self.spawn("path", move |inner| {
            inner.start_trace();
            let report = inner.follow(&points, turns);
            inner.stop_trace();
            info!("Finished following path");
            report
        });
        Ok(())
    }

    /// Start the obstacle-avoiding random walk; runs until stopped
    pub fn start_random_walk(&mut self, momentum: f64) -> Result<()> {
        if self.random_walk.is_some() {
            return Err(DishaError::Precondition("random walk already running".to_string()));
        }
        self.wait_worker();
        self.inner.drive.lock().hardware.enable(Sensor::Proximity)?;

        let controller = RandomWalkController::new(
            &self.inner.random_walk,
            self.inner.light_factor,
            momentum,
            self.inner.walk_seed,
        );
        info!("Starting random walk (momentum {:.2})", momentum);
        self.inner.stopped.store(false, Ordering::Relaxed);
        self.inner.set_state(MotionState::RandomWalking);
        self.inner.start_trace();

        let active = Arc::new(AtomicBool::new(true));
        let thread_active = Arc::clone(&active);
        let inner = Arc::clone(&self.inner);
        let join = thread::Builder::new()
            .name("random-walk".into())
            .spawn(move || {
                inner.random_walk(controller, &thread_active);
                inner.finish();
            })
            .expect("Failed to spawn random-walk thread");

        self.random_walk = Some(RandomWalkWorker { active, join });
        Ok(())
    }

    pub fn stop_random_walk(&mut self) {
        if let Some(worker) = self.random_walk.take() {
            worker.active.store(false, Ordering::Relaxed);
            if worker.join.join().is_err() {
                error!("Random-walk thread panicked");
            }
            info!("Random walk stopped");
        }
        self.stop_tracker();
    }

    /// Stop whatever the robot is doing
    pub fn stop(&mut self) {
        info!("Stopping");
        if self.random_walk.is_some() {
            self.stop_random_walk();
        } else {
            self.inner.stopped.store(true, Ordering::Relaxed);
            self.stop_tracker();
        }
        self.inner.stop_trace();
    }

    /// Block until the current command finishes
    pub fn wait_for_completion(&mut self) -> Option<MotionReport> {
        if self.random_walk.is_some() {
            debug!("wait_for_completion has no effect while random walking");
        }
        let report = self.wait_worker();
        self.stop_tracker();
        report
    }

    fn stop_tracker(&self) {
        if let Some(tracker) = &self.tracker {
            tracker.stop();
        }
    }

    fn wait_worker(&mut self) -> Option<MotionReport> {
        let join = self.worker.take()?;
        match join.join() {
            Ok(report) => Some(report),
            Err(_) => {
                error!("Motion worker panicked");
                None
            }
        }
    }

    fn spawn<F>(&mut self, name: &str, work: F)
    where
        F: FnOnce(&NavigatorInner) -> MotionReport + Send + 'static,
    {
        self.wait_worker();
        self.inner.stopped.store(false, Ordering::Relaxed);
        let inner = Arc::clone(&self.inner);
        let join = thread::Builder::new()
            .name(name.into())
            .spawn(move || {
                let report = work(&inner);
                inner.finish();
                report
            })
            .expect("Failed to spawn motion worker thread");
        self.worker = Some(join);
    }
}

impl Drop for Navigator {
    fn drop(&mut self) {
        self.stop_random_walk();
        if self.worker.is_some() {
            self.inner.stopped.store(true, Ordering::Relaxed);
            self.wait_worker();
        }
        self.inner.stop_trace();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::mock::SimulatedEpuck;
    use crate::utils::angle_difference;

    fn navigator(config: &DishaConfig) -> (Navigator, crate::devices::mock::SimHandle) {
        let robot = SimulatedEpuck::new(config);
        let sim = robot.handle();
        let nav = Navigator::new(Box::new(robot), config, FusionPolicy::disabled(), None).unwrap();
        (nav, sim)
    }

    #[test]
    fn test_bearing_quadrants() {
        let origin = Point::new(100, 100);
        assert_eq!(bearing(origin, Point::new(200, 100), 100.0), 0.0);
        assert!((bearing(origin, Point::new(100, 200), 100.0) - 90.0).abs() < 1e-9);
        assert!((bearing(origin, Point::new(0, 100), 100.0) - 180.0).abs() < 1e-9);
        assert!((bearing(origin, Point::new(100, 0), 100.0) + 90.0).abs() < 1e-9);
        assert!((bearing(origin, Point::new(0, 0), 141.42135623730951) + 135.0).abs() < 1e-6);
    }

    #[test]
    fn test_starts_one_diameter_from_corner() {
        let (nav, _) = navigator(&DishaConfig::default());
        assert_eq!(nav.pose(), Pose::new(84, 84, 0.0));
        assert_eq!(nav.state(), MotionState::Idle);
    }

    #[test]
    fn test_connection_failure_is_fatal() {
        let mut config = DishaConfig::default();
        config.simulation.connect_failures = 10;
        let robot = SimulatedEpuck::new(&config);
        let result = Navigator::new(Box::new(robot), &config, FusionPolicy::disabled(), None);
        assert!(matches!(result, Err(DishaError::Connection(_))));
    }

    #[test]
    fn test_turn_reaches_heading() {
        let config = DishaConfig::default();
        let (mut nav, sim) = navigator(&config);
        nav.turn(90.0);
        let report = nav.wait_for_completion().unwrap();
        assert!(!report.stopped);
        assert!(angle_difference(nav.pose().heading, 90.0) < 3.0, "heading {}", nav.pose().heading);
        assert!(angle_difference(sim.true_pose().heading, 90.0) < 3.0);
        assert_eq!(nav.state(), MotionState::Idle);
    }

    #[test]
    fn test_turn_negative() {
        let (mut nav, _) = navigator(&DishaConfig::default());
        nav.turn(-45.0);
        nav.wait_for_completion();
        assert!(angle_difference(nav.pose().heading, -45.0) < 3.0);
    }

    #[test]
    fn test_go_to_skips_when_close() {
        let (mut nav, _) = navigator(&DishaConfig::default());
        nav.go_to(Point::new(90, 90));
        let report = nav.wait_for_completion().unwrap();
        assert_eq!(report.reached, 1);
        assert_eq!(nav.path_length(), 0.0);
    }

    #[test]
    fn test_go_to_straight_ahead() {
        let (mut nav, sim) = navigator(&DishaConfig::default());
        nav.go_to(Point::new(400, 84));
        let report = nav.wait_for_completion().unwrap();
        assert_eq!(report.reached, 1);
        assert_eq!(report.restarts, 0);
        assert!(nav.pose().distance_to(&Point::new(400, 84)) < 10.0);
        assert!(sim.true_pose().distance_to(&Point::new(400, 84)) < 10.0);
    }

    #[test]
    fn test_read_faults_skip_ticks() {
        let (mut nav, sim) = navigator(&DishaConfig::default());
        sim.fail_reads(5);
        nav.go_to(Point::new(300, 84));
        nav.wait_for_completion();
        assert!(nav.pose().distance_to(&Point::new(300, 84)) < 10.0);
    }

    #[test]
    fn test_loop_path_rejects_zero_turns() {
        let (mut nav, _) = navigator(&DishaConfig::default());
        let err = nav.loop_path(Path::new("unused.txt"), 0).unwrap_err();
        assert!(matches!(err, DishaError::Precondition(_)));
    }

    #[test]
    fn test_follow_path_bad_file_fails_before_start() {
        let (mut nav, _) = navigator(&DishaConfig::default());
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, b"x\ty\n100\tabc\n").unwrap();
        assert!(nav.follow_path(file.path()).is_err());
        assert!(nav.wait_for_completion().is_none());
    }

    #[test]
    fn test_seed_start_pose_raises_flags() {
        let (nav, _) = navigator(&DishaConfig::default());
        nav.seed_start_pose(Pose::new(300, 150, 45.0));
        let snapshot = nav.shared_pose().snapshot();
        assert_eq!(snapshot.current, Pose::new(300, 150, 45.0));
        assert_eq!(snapshot.previous, Pose::new(300, 150, 45.0));
        assert!(snapshot.status.position_corrected && snapshot.status.start_corrected);
        assert_eq!(snapshot.epoch, 0);
    }

    #[test]
    fn test_adjust_start_position_from_source() {
        struct Fixed(Pose);
        impl crate::fusion::ExternalPoseSource for Fixed {
            fn estimate(&self) -> Option<Pose> {
                Some(self.0)
            }
        }

        let config = DishaConfig::default();
        let fusion = FusionPolicy::new(
            crate::fusion::CorrectionMode::GroundTruth,
            &config.robot,
            Some(Arc::new(Fixed(Pose::new(120, 95, -10.0)))),
        );
        let nav = Navigator::new(Box::new(SimulatedEpuck::new(&config)), &config, fusion, None).unwrap();
        assert_eq!(nav.adjust_start_position(), Some(Pose::new(120, 95, -10.0)));
        assert_eq!(nav.pose(), Pose::new(120, 95, -10.0));

        let (plain, _) = navigator(&config);
        assert!(plain.adjust_start_position().is_none());
    }

    #[test]
    fn test_random_walk_stops_with_zero_speed() {
        let mut config = DishaConfig::default();
        config.random_walk.tick_ms = 1;
        let (mut nav, _) = navigator(&config);
        nav.start_random_walk(0.5).unwrap();
        assert!(nav.start_random_walk(0.5).is_err());
        thread::sleep(std::time::Duration::from_millis(50));
        nav.stop();
        assert!(!nav.is_random_walking());
        assert!(nav.path_length() > 0.0);
        assert_eq!(nav.inner.motor_speed(), Some((0, 0)));
        assert_eq!(nav.state(), MotionState::Idle);
    }
}
