//! Core abstractions shared by every component.
//!
//! - [`driver::HardwareDriver`]: Trait to implement for a real or simulated robot
//! - [`types`]: Poses, points, encoder and proximity samples

pub mod driver;
pub mod types;
