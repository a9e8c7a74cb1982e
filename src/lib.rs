//! Disha - arena localization and motion control for a small two-wheeled robot
//!
//! Two pose estimates are fused into one corrected pose that drives the
//! motion commands:
//!
//! - **Odometry**: wheel-encoder dead reckoning with overflow-safe counters
//! - **Vision**: overhead-camera tracking of two coloured markers, projected
//!   into arena millimetres through four calibrated corner markers
//!
//! ## Threads
//!
//! - **Tracker** (~30Hz): grabs frames and publishes the tracked pose
//! - **Motion worker**: one per command (turn, go-to, path, random walk)
//! - **Trace recorder** (~30Hz): draws the fused pose history
//!
//! The `devices::mock` module provides a simulated robot and camera so the
//! whole stack runs without hardware.

pub mod config;
pub mod core;
pub mod devices;
pub mod error;
pub mod experiment;
pub mod fusion;
pub mod motion;
pub mod noise;
pub mod odometry;
pub mod pose_log;
pub mod shared;
pub mod trace;
pub mod utils;
pub mod vision;

// Re-export commonly used types
pub use config::DishaConfig;
pub use core::driver::HardwareDriver;
pub use core::types::{EncoderState, Point, Pose};
pub use error::{DishaError, Result};
pub use fusion::{CorrectionMode, ExternalPoseSource, FusionPolicy};
pub use motion::{MotionReport, MotionState, Navigator};
pub use shared::SharedPose;
