//! Pose geometry and state prediction
//!
//! This crate provides:
//! - SO(3) exponential / logarithmic maps and pose integration
//! - Displacement twists between poses
//! - Joint-space and Cartesian-space state prediction

pub mod geometry;
pub mod prediction;

pub use geometry::{displacement_twist, exp_map_so3, integrate_pose, log_map_so3, wrap_angle};
pub use prediction::{integrate_to_position, integrate_to_velocity, PredictionStatus, StatePredictor};
