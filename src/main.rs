//! Disha - runs one experiment against the simulated e-puck and overhead camera
//!
//! Usage: `disha [config.toml]`. Without an argument `disha.toml` is used if
//! present, otherwise the defaults.

use disha::config::DishaConfig;
use disha::devices::mock::SimulatedEpuck;
use disha::error::Result;
use disha::experiment;

use std::path::Path;
use tracing::info;

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("disha=info".parse().unwrap()),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let config = if args.len() > 1 {
        let config_path = Path::new(&args[1]);
        info!("Loading configuration from {:?}", config_path);
        DishaConfig::load(config_path)?
    } else if Path::new("disha.toml").exists() {
        info!("Loading configuration from disha.toml");
        DishaConfig::load(Path::new("disha.toml"))?
    } else {
        info!("Using default configuration");
        DishaConfig::default()
    };

    info!("Disha v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Arena {}x{} mm, correction mode {:?}",
        config.arena.width_mm, config.arena.height_mm, config.run.correction_mode
    );

    // A tracked run needs a saved calibration; make one from the simulated camera
    let calibration_path = config.output.calibration_path();
    if config.run.use_tracking && !config.run.new_calibration && !calibration_path.exists() {
        info!("No calibration at {:?}, calibrating first", calibration_path);
        let mut calibrate = config.clone();
        calibrate.run.new_calibration = true;
        let robot = SimulatedEpuck::new(&calibrate);
        let camera = robot.camera(&calibrate);
        experiment::run(&calibrate, Box::new(robot), Some(Box::new(camera)), None)?;
    }

    let robot = SimulatedEpuck::new(&config);
    let sim = robot.handle();
    let camera = config.run.use_tracking.then(|| robot.camera(&config));
    let report = experiment::run(
        &config,
        Box::new(robot),
        camera.map(|c| Box::new(c) as Box<dyn disha::vision::FrameSource>),
        None,
    )?;

    if let Some(motion) = report.motion {
        info!(
            "Targets reached {}/{}, {} replans, stopped: {}",
            motion.reached, motion.targets, motion.restarts, motion.stopped
        );
    }
    if let Some(tracker) = report.tracker {
        info!(
            "Tracker: {} frames, {} recovered",
            tracker.frames, tracker.recovered_frames
        );
    }
    if let Some(pose) = report.final_pose {
        info!("Final pose {} (true pose {})", pose, sim.true_pose());
    }

    info!("Disha finished");
    Ok(())
}
