//! Simulated robot backends
//!
//! This crate provides:
//! - A six-axis Cartesian gantry with closed-form kinematics and dynamics
//! - A joint-level simulated robot implementing the hardware mediator

pub mod gantry;
pub mod sim_robot;

pub use gantry::{CartesianGantry, GantryConfig, GANTRY_JOINTS};
pub use sim_robot::SimulatedRobot;
