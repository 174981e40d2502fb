//! Control modes and collaborator contracts
//!
//! The controller talks to its solvers, the safety layer and the hardware only through
//! the traits below. Every call receives the state aggregate by reference for the
//! duration of that call.

use nalgebra::DVector;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::integrators::IntegrationMethod;
use crate::spatial::Wrench;
use crate::state::RobotState;

// Modes and interfaces

/// Joint-level command type sent to the hardware
///
/// Variants are declared in safety order: `Torque > Velocity > Position > StopMotion`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ControlMode {
    StopMotion,
    Position,
    Velocity,
    Torque,
}

impl ControlMode {
    pub fn label(&self) -> &'static str {
        match self {
            ControlMode::StopMotion => "Stop Motion",
            ControlMode::Position => "Joint Position Control",
            ControlMode::Velocity => "Joint Velocity Control",
            ControlMode::Torque => "Joint Torque Control",
        }
    }
}

/// Quantity the task command is injected as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DynamicsInterface {
    CartForce,
    CartAcceleration,
    FfJointTorque,
}

impl DynamicsInterface {
    pub fn label(&self) -> &'static str {
        match self {
            DynamicsInterface::CartForce => "Cartesian Force Interface",
            DynamicsInterface::CartAcceleration => "Cartesian EndEffector Acceleration Interface",
            DynamicsInterface::FfJointTorque => "FeedForward Joint Torque Interface",
        }
    }
}

/// Requested control mode and whether the safety module accepted it unchanged
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlModeDecision {
    pub interface: ControlMode,
    pub is_safe: bool,
}

impl Default for ControlModeDecision {
    fn default() -> Self {
        Self {
            interface: ControlMode::StopMotion,
            is_safe: false,
        }
    }
}

// Joint limits

/// Joint limit tables, one entry per joint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointLimits {
    pub position_max: Vec<f64>,
    pub position_min: Vec<f64>,
    pub velocity: Vec<f64>,
    pub acceleration: Vec<f64>,
    pub torque: Vec<f64>,
}

impl JointLimits {
    /// Symmetric limits shared by every joint
    pub fn uniform(num_joints: usize, position: f64, velocity: f64, acceleration: f64, torque: f64) -> Self {
        Self {
            position_max: vec![position; num_joints],
            position_min: vec![-position; num_joints],
            velocity: vec![velocity; num_joints],
            acceleration: vec![acceleration; num_joints],
            torque: vec![torque; num_joints],
        }
    }

    pub fn num_joints(&self) -> usize {
        self.torque.len()
    }

    pub fn position_ok(&self, joint: usize, position: f64) -> bool {
        position <= self.position_max[joint] && position >= self.position_min[joint]
    }

    pub fn velocity_ok(&self, joint: usize, velocity: f64) -> bool {
        velocity.abs() <= self.velocity[joint]
    }

    pub fn acceleration_ok(&self, joint: usize, acceleration: f64) -> bool {
        acceleration.abs() <= self.acceleration[joint]
    }

    pub fn torque_ok(&self, joint: usize, torque: f64) -> bool {
        torque.abs() <= self.torque[joint]
    }
}

// Collaborators

/// Forward position and velocity kinematics
pub trait FkSolver {
    /// Fill `frame_pose` / `frame_twist` from `q` / `qd`.
    ///
    /// `Err(status)` carries the solver's non-zero status; the state may be stale.
    fn solve(&mut self, state: &mut RobotState) -> std::result::Result<(), i32>;
}

/// Hybrid dynamics: Cartesian constraints and forces to joint accelerations/torques
pub trait DynamicsSolver {
    /// Reads q, qd, the end-effector constraint (unit directions + acceleration energy),
    /// external wrenches and feedforward torque from `state`, plus the virtual Cartesian
    /// force per segment. Writes `qdd` and `control_torque`.
    fn solve(&mut self, state: &mut RobotState, cart_force: &[Wrench]) -> std::result::Result<(), i32>;
}

/// Safety layer between the controller and the hardware
pub trait SafetyModule {
    /// Joints of the robot behind the module
    fn num_joints(&self) -> usize;

    /// Read measured joint state (and end-effector wrench) into `state`.
    fn get_current_state(&mut self, state: &mut RobotState);

    /// Send the commands in `state` using the highest safe mode not above `requested`.
    /// Returns the mode that was actually applied.
    fn apply(
        &mut self,
        state: &mut RobotState,
        dt_sec: f64,
        requested: ControlMode,
        method: IntegrationMethod,
    ) -> ControlMode;

    /// Bring the robot to a halt.
    fn stop(&mut self);
}

/// Capability interface of a robot backend (simulated or physical)
pub trait RobotMediator {
    fn num_joints(&self) -> usize;

    fn joint_limits(&self) -> &JointLimits;

    fn joint_positions(&self, out: &mut DVector<f64>);
    fn joint_velocities(&self, out: &mut DVector<f64>);
    fn joint_torques(&self, out: &mut DVector<f64>);

    /// Measured or estimated wrench on the end-effector
    fn end_effector_wrench(&self) -> Wrench;

    fn set_joint_positions(&mut self, q: &DVector<f64>) -> Result<()>;
    fn set_joint_velocities(&mut self, qd: &DVector<f64>) -> Result<()>;
    fn set_joint_torques(&mut self, tau: &DVector<f64>) -> Result<()>;

    /// Command zero joint velocities.
    fn stop_motion(&mut self) -> Result<()>;

    /// Read joints and end-effector wrench into `state`.
    fn read_state(&self, state: &mut RobotState) {
        self.joint_positions(&mut state.q);
        self.joint_velocities(&mut state.qd);
        self.joint_torques(&mut state.measured_torque);
        state.ee_measured_wrench = self.end_effector_wrench();
    }
}
