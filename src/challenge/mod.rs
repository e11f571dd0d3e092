pub mod detector;
pub mod solver;
pub mod trajectory;

pub use detector::{GapBox, GapDetector, HttpGapDetector};
pub use solver::{ChallengeSolver, DistanceSolver};
pub use trajectory::{generate_trajectory, TrajectoryProfile};
