//! Wheel odometry: encoder overflow handling and dead reckoning.

mod dead_reckoning;
mod overflow;

pub use dead_reckoning::{DeadReckoning, OdometryStep};
pub use overflow::{OverflowGuard, TurnTarget};
