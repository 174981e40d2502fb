//! Application configuration loaded from JSON

use std::error::Error;
use std::fs;
use std::path::Path;

use control::ControllerConfig;
use hardware::GantryConfig;
use robotcore::{ConstraintDirections, ControlMode, DynamicsInterface, JointLimits};
use serde::{Deserialize, Serialize};

/// Task handed to the controller before it starts
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskConfig {
    pub control_mode: ControlMode,
    pub interface: DynamicsInterface,
    pub use_transformed_driver: bool,
    pub store_control_data: bool,
    pub constraint_directions: ConstraintDirections,
    /// `[x, y, z, r11, r12, r13, r21, r22, r23, r31, r32, r33]`
    pub desired_pose: [f64; 12],
    /// End-effector acceleration constraint `[directions, acceleration]`
    pub acceleration_directions: ConstraintDirections,
    pub acceleration: [f64; 6],
    /// End-effector external wrench `[force, torque]`
    pub external_force: [f64; 6],
    pub feedforward_torque: Vec<f64>,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            control_mode: ControlMode::Torque,
            interface: DynamicsInterface::CartForce,
            use_transformed_driver: true,
            store_control_data: false,
            constraint_directions: ConstraintDirections::linear(),
            desired_pose: [0.3, -0.1, 0.2, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0],
            acceleration_directions: ConstraintDirections::none(),
            acceleration: [0.0; 6],
            external_force: [0.0; 6],
            feedforward_torque: vec![0.0; hardware::GANTRY_JOINTS],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// off, error, warn, info, debug or trace
    pub log_level: String,
    /// Number of control cycles to run
    pub cycles: u64,
    pub controller: ControllerConfig,
    pub gantry: GantryConfig,
    pub limits: JointLimits,
    pub task: TaskConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            cycles: 2000,
            controller: ControllerConfig::default(),
            gantry: GantryConfig::default(),
            limits: JointLimits::uniform(hardware::GANTRY_JOINTS, 1.5, 1.0, 10.0, 50.0),
            task: TaskConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Box<dyn Error>> {
        let text = fs::read_to_string(path.as_ref())?;
        Ok(serde_json::from_str(&text)?)
    }
}
