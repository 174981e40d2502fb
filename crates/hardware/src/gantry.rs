//! Six-axis Cartesian gantry model
//!
//! Joints 0..3 are prismatic along x, y, z. Joints 3..6 hold the end-effector
//! orientation as a rotation vector. Each joint carries its own effective inertia and
//! viscous damping, with no coupling between axes, so forward kinematics and hybrid
//! dynamics both have closed forms.

use nalgebra::{Rotation3, Vector3, Vector6};
use robotcore::{DynamicsSolver, FkSolver, RobotState, Twist, Wrench};
use serde::{Deserialize, Serialize};

pub const GANTRY_JOINTS: usize = 6;

/// Status returned when a solver produced non-finite values
pub const NON_FINITE_STATUS: i32 = -1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GantryConfig {
    /// Effective inertia per axis (kg for prismatic, kg*m^2 for rotational)
    pub inertia: [f64; GANTRY_JOINTS],
    /// Viscous damping per axis
    pub damping: [f64; GANTRY_JOINTS],
}

impl Default for GantryConfig {
    fn default() -> Self {
        Self {
            inertia: [4.0, 4.0, 4.0, 0.2, 0.2, 0.2],
            damping: [0.0; GANTRY_JOINTS],
        }
    }
}

impl GantryConfig {
    /// Set effective inertia per axis
    pub fn with_inertia(mut self, inertia: [f64; GANTRY_JOINTS]) -> Self {
        self.inertia = inertia;
        self
    }

    /// Set viscous damping per axis
    pub fn with_damping(mut self, damping: [f64; GANTRY_JOINTS]) -> Self {
        self.damping = damping;
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct CartesianGantry {
    config: GantryConfig,
}

impl CartesianGantry {
    pub fn new(config: GantryConfig) -> Self {
        Self { config }
    }

    pub fn num_joints(&self) -> usize {
        GANTRY_JOINTS
    }

    /// One segment per joint
    pub fn num_segments(&self) -> usize {
        GANTRY_JOINTS
    }

    pub fn config(&self) -> &GantryConfig {
        &self.config
    }

    /// Frame `i` sees the first `i` joints.
    fn frame_from_joints(q: &[f64], qd: &[f64], active: usize) -> (Vector3<f64>, Vector3<f64>, Vector3<f64>, Vector3<f64>) {
        let mut position = Vector3::zeros();
        let mut rotation = Vector3::zeros();
        let mut linear = Vector3::zeros();
        let mut angular = Vector3::zeros();
        for j in 0..active {
            if j < 3 {
                position[j] = q[j];
                linear[j] = qd[j];
            } else {
                rotation[j - 3] = q[j];
                angular[j - 3] = qd[j];
            }
        }
        (position, rotation, linear, angular)
    }
}

impl FkSolver for CartesianGantry {
    fn solve(&mut self, state: &mut RobotState) -> Result<(), i32> {
        if !state.q.iter().chain(state.qd.iter()).all(|v| v.is_finite()) {
            return Err(NON_FINITE_STATUS);
        }

        let q = state.q.as_slice();
        let qd = state.qd.as_slice();
        for frame in 0..state.frame_pose.len() {
            let (position, rotation, linear, angular) = Self::frame_from_joints(q, qd, frame.min(GANTRY_JOINTS));
            state.frame_pose[frame].position = position;
            state.frame_pose[frame].rotation = Rotation3::new(rotation);
            state.frame_twist[frame] = Twist::new(linear, angular);
        }
        Ok(())
    }
}

impl DynamicsSolver for CartesianGantry {
    /// Constrained axes follow the commanded acceleration energy; every axis then adds
    /// the end-effector Cartesian force, the external wrench and feedforward torque.
    fn solve(&mut self, state: &mut RobotState, cart_force: &[Wrench]) -> Result<(), i32> {
        let ee = state.end_effector_segment();
        let applied: Vector6<f64> = cart_force.get(ee).copied().unwrap_or_default().to_vector();
        let external = state.external_force[ee].to_vector();

        for j in 0..state.num_joints() {
            let inertia = self.config.inertia[j];
            let constrained = state.ee_unit_constraint_force[(j, j)] != 0.0;
            let drive = applied[j] + external[j] + state.feedforward_torque[j]
                - self.config.damping[j] * state.qd[j];

            let mut qdd = drive / inertia;
            if constrained {
                qdd += state.ee_acceleration_energy[j];
            }
            if !qdd.is_finite() {
                return Err(NON_FINITE_STATUS);
            }

            state.qdd[j] = qdd;
            // Actuator share of the net generalized force
            state.control_torque[j] = inertia * qdd - external[j] + self.config.damping[j] * state.qd[j];
        }
        Ok(())
    }
}
