//! Navigation Integration Tests
//!
//! Drives the navigator against the simulated e-puck to verify:
//! - go_to terminates near reachable targets
//! - a single in-motion correction replans exactly once
//! - external substitution never replans
//! - path following and the random walk
//!
//! Run with: `cargo test --test navigation`

use disha::config::DishaConfig;
use disha::core::types::{Point, Pose};
use disha::devices::mock::{SimHandle, SimulatedEpuck};
use disha::fusion::{CorrectionMode, ExternalPoseSource, FusionPolicy};
use disha::motion::{MotionState, Navigator};
use disha::trace::TraceSettings;
use disha::utils::angle_difference;
use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

// ============================================================================
// Helpers
// ============================================================================

fn navigator_with(config: &DishaConfig, fusion: FusionPolicy) -> (Navigator, SimHandle) {
    let robot = SimulatedEpuck::new(config);
    let sim = robot.handle();
    let navigator = Navigator::new(Box::new(robot), config, fusion, None).unwrap();
    (navigator, sim)
}

/// Reports `pose` on exactly one call, nothing otherwise
struct OneShot {
    calls: AtomicUsize,
    fire_on: usize,
    pose: Pose,
}

impl ExternalPoseSource for OneShot {
    fn estimate(&self) -> Option<Pose> {
        let call = self.calls.fetch_add(1, Ordering::Relaxed);
        (call == self.fire_on).then_some(self.pose)
    }
}

/// Always reports the same pose
struct Fixed(Pose);

impl ExternalPoseSource for Fixed {
    fn estimate(&self) -> Option<Pose> {
        Some(self.0)
    }
}

// ============================================================================
// go_to
// ============================================================================

#[test]
fn test_go_to_reachable_point_terminates() {
    let config = DishaConfig::default();
    let (mut nav, sim) = navigator_with(&config, FusionPolicy::disabled());
    let target = Point::new(600, 220);

    nav.go_to(target);
    let report = nav.wait_for_completion().unwrap();

    assert_eq!(report.targets, 1);
    assert_eq!(report.reached, 1);
    assert_eq!(report.restarts, 0);
    // Odometry rounds each tick per axis, so on a diagonal only the robot is checked
    assert!(sim.true_pose().distance_to(&target) < 25.0, "robot at {}", sim.true_pose());
    assert_eq!(nav.state(), MotionState::Idle);
}

#[test]
fn test_go_to_backwards_turns_around() {
    let config = DishaConfig::default();
    let (mut nav, sim) = navigator_with(&config, FusionPolicy::disabled());
    sim.place(700.0, 150.0, 0.0);
    nav.seed_start_pose(Pose::new(700, 150, 0.0));

    nav.go_to(Point::new(200, 150));
    nav.wait_for_completion();

    assert!(nav.pose().distance_to(&Point::new(200, 150)) < 25.0);
    assert!((nav.pose().heading.abs() - 180.0).abs() < 5.0, "heading {}", nav.pose().heading);
}

#[test]
fn test_single_correction_restarts_once() {
    let config = DishaConfig::default();
    let source = Arc::new(OneShot {
        calls: AtomicUsize::new(0),
        fire_on: 40,
        pose: Pose::new(250, 84, 0.0),
    });
    let fusion = FusionPolicy::new(CorrectionMode::GroundTruth, &config.robot, Some(source));
    let (mut nav, _) = navigator_with(&config, fusion);
    let target = Point::new(700, 84);

    nav.go_to(target);
    let report = nav.wait_for_completion().unwrap();

    assert_eq!(report.restarts, 1);
    assert_eq!(report.reached, 1);
    assert!(nav.pose().distance_to(&target) < 25.0);
    assert_eq!(nav.shared_pose().correction_epoch(), 1);
}

#[test]
fn test_external_substitution_never_restarts() {
    let config = DishaConfig::default();
    let substituted = Pose::new(500, 150, 0.0);
    let fusion = FusionPolicy::new(CorrectionMode::External, &config.robot, Some(Arc::new(Fixed(substituted))));
    let (mut nav, _) = navigator_with(&config, fusion);

    nav.go_to(Point::new(300, 84));
    let report = nav.wait_for_completion().unwrap();

    assert_eq!(report.restarts, 0);
    assert_eq!(nav.pose(), substituted);
    assert_eq!(nav.shared_pose().correction_epoch(), 0);
}

#[test]
fn test_stop_interrupts_go_to() {
    let mut config = DishaConfig::default();
    config.simulation.time_scale = 10.0;
    let (mut nav, sim) = navigator_with(&config, FusionPolicy::disabled());

    nav.go_to(Point::new(900, 84));
    thread::sleep(Duration::from_millis(100));
    nav.stop();
    let report = nav.wait_for_completion().unwrap();

    assert_eq!(report.reached, 0);
    assert!(sim.true_pose().location.x < 800);
    assert_eq!(nav.state(), MotionState::Stopped);
}

// ============================================================================
// Paths
// ============================================================================

#[test]
fn test_follow_path_visits_every_point() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("path.txt");
    let mut file = std::fs::File::create(&path).unwrap();
    write!(file, "x\ty\n300\t84\n300\t220\n100\t220\n").unwrap();

    let mut config = DishaConfig::default();
    config.output.dir = dir.path().to_string_lossy().into_owned();
    let robot = SimulatedEpuck::new(&config);
    let sim = robot.handle();
    let trace = TraceSettings {
        interval: Duration::from_millis(1),
        ..TraceSettings::from_config(&config)
    };
    let mut nav = Navigator::new(Box::new(robot), &config, FusionPolicy::disabled(), Some(trace)).unwrap();

    nav.follow_path(&path).unwrap();
    let report = nav.wait_for_completion().unwrap();

    assert_eq!(report.targets, 3);
    assert_eq!(report.reached, 3);
    assert!(sim.true_pose().distance_to(&Point::new(100, 220)) < 30.0);
    assert!(config.output.trace_image_path().exists());
}

#[test]
fn test_loop_path_repeats() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "x\ty\n250\t84\n84\t84\n").unwrap();

    let (mut nav, _) = navigator_with(&DishaConfig::default(), FusionPolicy::disabled());
    nav.loop_path(file.path(), 2).unwrap();
    let report = nav.wait_for_completion().unwrap();

    assert_eq!(report.targets, 4);
    assert_eq!(report.reached, 4);
}

#[test]
fn test_long_path_recentres_encoders() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "x\ty\n900\t84\n84\t84\n").unwrap();

    let (mut nav, sim) = navigator_with(&DishaConfig::default(), FusionPolicy::disabled());
    // 4 x 816 mm takes the forward wheels past the upper margin
    nav.loop_path(file.path(), 2).unwrap();
    let report = nav.wait_for_completion().unwrap();

    assert_eq!(report.reached, 4);
    assert!(nav.recentre_count() >= 1);
    assert!(
        nav.pose().distance_to(&sim.true_pose().location) < 25.0,
        "odometry {} vs robot {}",
        nav.pose(),
        sim.true_pose()
    );
}

#[test]
fn test_repeated_turns_recentre_encoders() {
    let (mut nav, sim) = navigator_with(&DishaConfig::default(), FusionPolicy::disabled());

    // Each turn moves both wheels 604 ticks, in opposite directions
    for _ in 0..60 {
        nav.turn(170.0);
        nav.wait_for_completion();
    }

    assert!(nav.recentre_count() >= 1);
    let (odometry, truth) = (nav.pose(), sim.true_pose());
    assert!(
        angle_difference(odometry.heading, truth.heading) < 2.0,
        "odometry {} vs robot {}",
        odometry,
        truth
    );
    assert!(odometry.distance_to(&truth.location) < 5.0);
}

// ============================================================================
// Random walk
// ============================================================================

#[test]
fn test_random_walk_dodges_walls() {
    let mut config = DishaConfig::default();
    config.random_walk.tick_ms = 1;
    let (mut nav, sim) = navigator_with(&config, FusionPolicy::disabled());
    // 53 mm from the top wall, driving straight at it
    sim.place(500.0, 90.0, -90.0);

    nav.start_random_walk(0.5).unwrap();
    assert_eq!(nav.state(), MotionState::RandomWalking);

    // Several arena crossings' worth of travel
    let deadline = Instant::now() + Duration::from_secs(20);
    while nav.path_length() < 1500.0 {
        assert!(Instant::now() < deadline, "walked only {:.0} mm", nav.path_length());
        thread::sleep(Duration::from_millis(5));
    }
    nav.stop();

    assert!(!nav.is_random_walking());
    let state = sim.physics();
    assert_eq!(state.wall_contacts(), 0, "robot ran into a wall, now at {}", state.pose());
}

#[test]
fn test_random_walk_survives_proximity_glitches() {
    let mut config = DishaConfig::default();
    config.random_walk.tick_ms = 1;
    let (mut nav, sim) = navigator_with(&config, FusionPolicy::disabled());
    sim.glitch_proximity(20);

    nav.start_random_walk(1.0).unwrap();
    thread::sleep(Duration::from_millis(50));
    nav.stop();

    // A glitching rear sensor must not be taken for an obstacle
    assert!(nav.path_length() > 0.0);
}
