//! Shared types for the Cartesian dynamics controller
//!
//! This crate provides:
//! - Spatial quantities (poses, twists, wrenches)
//! - The robot state aggregate and constraint directions
//! - Control modes, dynamics interfaces and collaborator traits
//! - Scalar integration rules
//! - The controller error type

pub mod error;
pub mod integrators;
pub mod spatial;
pub mod state;
pub mod traits;

pub use error::{ControlError, Result};
pub use integrators::IntegrationMethod;
pub use spatial::{Pose, Twist, Wrench};
pub use state::{ConstraintDirections, NUM_CONSTRAINTS, RobotState};
pub use traits::*;
