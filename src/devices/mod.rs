//! Device implementations.
//!
//! Only the simulated robot ships with the crate; a real robot link or
//! camera implements [`HardwareDriver`](crate::core::driver::HardwareDriver)
//! and [`FrameSource`](crate::vision::FrameSource).

pub mod mock;
