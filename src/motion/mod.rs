//! Motion commands: turning, point-to-point driving, path following and
//! the reactive random walk.

mod navigator;
pub mod path;
pub mod random_walk;

pub use navigator::{GoToOutcome, MotionReport, MotionState, Navigator};
pub use path::{load_path, parse_path};
pub use random_walk::RandomWalkController;
