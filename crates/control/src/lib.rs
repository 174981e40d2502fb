//! Cartesian adaptive dynamics control
//!
//! This crate provides:
//! - Adaptive feedback modules and motion profiles
//! - Task-space error measurement and the error-to-command pipeline
//! - Control mode negotiation and a joint-limit safety module
//! - The fixed-rate control loop with its clock and diagnostic logs

pub mod clock;
pub mod config;
pub mod controller;
pub mod diagnostics;
pub mod feedback;
pub mod mode;
pub mod motion_profile;
pub mod safety;
pub mod shaper;
pub mod tracking;

pub use clock::{Clock, LoopStats, MonotonicClock, PeriodOutcome, SimulatedClock};
pub use config::ControllerConfig;
pub use controller::{ControllerParts, DynamicsController};
pub use diagnostics::{DiagnosticLog, DiagnosticsConfig};
pub use feedback::{AdaptiveFeedback, ErrorType, FeedbackConfig, FilteredProportional};
pub use motion_profile::MotionProfileConfig;
pub use safety::JointLimitSafety;
pub use shaper::{CommandShaper, CommandVectors};
pub use tracking::{ErrorVectors, HorizonConfig, HorizonMode, HorizonSample};
