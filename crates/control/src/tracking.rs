//! Task-space error and prediction horizon
//!
//! Each cycle the end-effector error is measured twice: desired vs current pose (drives
//! the motion profile) and desired vs predicted pose (drives the feedback module).

use kinematics::displacement_twist;
use nalgebra::Vector6;
use robotcore::{ConstraintDirections, RobotState, Twist};
use serde::{Deserialize, Serialize};

/// How the prediction horizon is chosen each cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HorizonMode {
    /// Always `amplitude` seconds
    #[default]
    Constant,
    /// `amplitude * tanh(slope * energy)` of the error + velocity twist
    Tanh,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HorizonConfig {
    pub mode: HorizonMode,
    /// Horizon length in seconds (upper bound in tanh mode)
    pub amplitude: f64,
    pub slope: f64,
}

impl Default for HorizonConfig {
    fn default() -> Self {
        Self {
            mode: HorizonMode::Constant,
            amplitude: 1.0,
            slope: 4.5,
        }
    }
}

impl HorizonConfig {
    pub fn constant(amplitude: f64) -> Self {
        Self {
            mode: HorizonMode::Constant,
            amplitude,
            ..Default::default()
        }
    }

    pub fn tanh(amplitude: f64, slope: f64) -> Self {
        Self {
            mode: HorizonMode::Tanh,
            amplitude,
            slope,
        }
    }

    pub fn horizon_sec(&self, energy: f64) -> f64 {
        match self.mode {
            HorizonMode::Constant => self.amplitude,
            HorizonMode::Tanh => self.amplitude * (self.slope * energy).tanh(),
        }
    }
}

/// Kinetic energy of `twist` for a unit-inertia body
pub fn kinetic_energy(twist: &Twist) -> f64 {
    0.5 * twist.to_vector().norm_squared()
}

/// Energy and horizon chosen for one cycle
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct HorizonSample {
    pub energy: f64,
    pub horizon_sec: f64,
}

impl HorizonSample {
    /// Energy of the current error plus end-effector velocity, restricted to controlled
    /// axes. Only evaluated in tanh mode.
    pub fn evaluate(
        config: &HorizonConfig,
        current_error: &Twist,
        ee_twist: &Twist,
        directions: &ConstraintDirections,
    ) -> Self {
        let energy = match config.mode {
            HorizonMode::Constant => 0.0,
            HorizonMode::Tanh => {
                let mut total = (*current_error + *ee_twist).to_vector();
                for i in 0..6 {
                    if !directions.is_enabled(i) {
                        total[i] = 0.0;
                    }
                }
                kinetic_energy(&Twist::from_vector(&total))
            }
        };
        Self {
            energy,
            horizon_sec: config.horizon_sec(energy),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ErrorVectors {
    /// Desired vs current end-effector pose
    pub current: Twist,
    /// Desired vs predicted end-effector pose
    pub predicted: Twist,
    /// Linear norm at 0, angular norm at 3, zeros elsewhere
    pub normalized: Vector6<f64>,
}

impl ErrorVectors {
    pub fn update_current(&mut self, desired: &RobotState, current: &RobotState) {
        self.current = displacement_twist(desired.ee_pose(), current.ee_pose());
    }

    pub fn update_predicted(&mut self, desired: &RobotState, predicted: &RobotState) {
        self.predicted = displacement_twist(desired.ee_pose(), predicted.ee_pose());
        self.normalized = normalize(&self.predicted);
    }

    pub fn linear_norm(&self) -> f64 {
        self.normalized[0]
    }

    pub fn angular_norm(&self) -> f64 {
        self.normalized[3]
    }
}

pub fn normalize(twist: &Twist) -> Vector6<f64> {
    let mut out = Vector6::zeros();
    out[0] = twist.linear.norm();
    out[3] = twist.angular.norm();
    out
}
