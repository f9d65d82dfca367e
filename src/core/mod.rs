//! Core types: variable keys, poses and estimates.

mod key;
mod pose;
mod values;

pub use key::{Edge, Key, ObservationId};
pub use pose::{LiePose, Pose2D, Pose3D, normalize_angle};
pub use values::{Value, Values};
