//! Overhead camera localization.
//!
//! - [`calibration`]: find the four arena corners, persist and reload them
//! - [`marker`]: HSV thresholding and centroid extraction
//! - [`transform`]: pixel to arena projection and marker heading
//! - [`tracker`]: per-frame tracking with recovery, on its own thread

pub mod calibration;
pub mod frame;
pub mod marker;
pub mod tracker;
pub mod transform;

pub use calibration::Calibration;
pub use frame::FrameSource;
pub use tracker::{TrackSample, TrackedMarkers, TrackerHandle, TrackerState, TrackerThread, VisionLocalizer};
