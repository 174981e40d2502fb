//! Robot state aggregate shared by the controller and its collaborators
//!
//! A controller owns three of these (current, desired, predicted). They are sized once
//! from the kinematic chain and then mutated in place every cycle.

use nalgebra::{DVector, Matrix6, Vector6};
use serde::{Deserialize, Serialize};

use crate::error::{ControlError, Result};
use crate::spatial::{Pose, Twist, Wrench};

/// Number of Cartesian constraint dimensions on the end-effector
pub const NUM_CONSTRAINTS: usize = 6;

/// Per-axis flags selecting which Cartesian directions are controlled
///
/// Index order is `[x, y, z, rot_x, rot_y, rot_z]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConstraintDirections(pub [bool; NUM_CONSTRAINTS]);

impl ConstraintDirections {
    pub fn all() -> Self {
        Self([true; NUM_CONSTRAINTS])
    }

    pub fn none() -> Self {
        Self([false; NUM_CONSTRAINTS])
    }

    pub fn linear() -> Self {
        Self([true, true, true, false, false, false])
    }

    pub fn is_enabled(&self, axis: usize) -> bool {
        self.0[axis]
    }

    /// Diagonal matrix of unit constraint twists: column `i` is the unit twist along
    /// axis `i` when enabled, zero otherwise.
    pub fn unit_constraint_matrix(&self) -> Matrix6<f64> {
        let mut m = Matrix6::zeros();
        for (i, enabled) in self.0.iter().enumerate() {
            if *enabled {
                m[(i, i)] = 1.0;
            }
        }
        m
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RobotState {
    // Joint space
    pub q: DVector<f64>,
    pub qd: DVector<f64>,
    pub qdd: DVector<f64>,
    pub measured_torque: DVector<f64>,
    pub feedforward_torque: DVector<f64>,
    pub control_torque: DVector<f64>,

    // Cartesian space, one entry per frame (frame 0 = base)
    pub frame_pose: Vec<Pose>,
    pub frame_twist: Vec<Twist>,

    // End-effector acceleration constraint (alpha, beta)
    pub ee_unit_constraint_force: Matrix6<f64>,
    pub ee_acceleration_energy: Vector6<f64>,

    /// External wrench per segment
    pub external_force: Vec<Wrench>,
    /// Measured / estimated wrench on the end-effector
    pub ee_measured_wrench: Wrench,
}

impl RobotState {
    pub fn new(num_joints: usize, num_segments: usize) -> Self {
        let num_frames = num_segments + 1;
        Self {
            q: DVector::zeros(num_joints),
            qd: DVector::zeros(num_joints),
            qdd: DVector::zeros(num_joints),
            measured_torque: DVector::zeros(num_joints),
            feedforward_torque: DVector::zeros(num_joints),
            control_torque: DVector::zeros(num_joints),
            frame_pose: vec![Pose::identity(); num_frames],
            frame_twist: vec![Twist::zero(); num_frames],
            ee_unit_constraint_force: Matrix6::zeros(),
            ee_acceleration_energy: Vector6::zeros(),
            external_force: vec![Wrench::zero(); num_segments],
            ee_measured_wrench: Wrench::zero(),
        }
    }

    pub fn num_joints(&self) -> usize {
        self.q.len()
    }

    pub fn num_segments(&self) -> usize {
        self.external_force.len()
    }

    /// Index of the end-effector frame (the last one)
    pub fn end_effector_frame(&self) -> usize {
        self.frame_pose.len() - 1
    }

    /// Index of the end-effector segment (the last one)
    pub fn end_effector_segment(&self) -> usize {
        self.external_force.len() - 1
    }

    pub fn ee_pose(&self) -> &Pose {
        &self.frame_pose[self.end_effector_frame()]
    }

    pub fn ee_pose_mut(&mut self) -> &mut Pose {
        let ee = self.end_effector_frame();
        &mut self.frame_pose[ee]
    }

    pub fn ee_twist(&self) -> &Twist {
        &self.frame_twist[self.end_effector_frame()]
    }

    pub fn ee_twist_mut(&mut self) -> &mut Twist {
        let ee = self.end_effector_frame();
        &mut self.frame_twist[ee]
    }

    /// Same joint and segment counts as `other`
    pub fn same_shape(&self, other: &RobotState) -> bool {
        self.num_joints() == other.num_joints() && self.num_segments() == other.num_segments()
    }

    /// Copy every field from `other` without reallocating.
    ///
    /// Panics if the shapes differ; all states of one controller are built from the
    /// same chain.
    pub fn copy_from(&mut self, other: &RobotState) {
        assert!(self.same_shape(other), "robot states of different shape");
        self.q.copy_from(&other.q);
        self.qd.copy_from(&other.qd);
        self.qdd.copy_from(&other.qdd);
        self.measured_torque.copy_from(&other.measured_torque);
        self.feedforward_torque.copy_from(&other.feedforward_torque);
        self.control_torque.copy_from(&other.control_torque);
        self.frame_pose.copy_from_slice(&other.frame_pose);
        self.frame_twist.copy_from_slice(&other.frame_twist);
        self.ee_unit_constraint_force = other.ee_unit_constraint_force;
        self.ee_acceleration_energy = other.ee_acceleration_energy;
        self.external_force.copy_from_slice(&other.external_force);
        self.ee_measured_wrench = other.ee_measured_wrench;
    }

    /// Zero every value, keeping sizes.
    pub fn reset_values(&mut self) {
        self.q.fill(0.0);
        self.qd.fill(0.0);
        self.qdd.fill(0.0);
        self.measured_torque.fill(0.0);
        self.feedforward_torque.fill(0.0);
        self.control_torque.fill(0.0);
        self.frame_pose.fill(Pose::identity());
        self.frame_twist.fill(Twist::zero());
        self.ee_unit_constraint_force = Matrix6::zeros();
        self.ee_acceleration_energy = Vector6::zeros();
        self.external_force.fill(Wrench::zero());
        self.ee_measured_wrench = Wrench::zero();
    }

    /// Overwrite the end-effector acceleration constraint.
    ///
    /// Unit directions come from `directions`; `acceleration` is the desired
    /// acceleration energy along each axis.
    pub fn set_ee_acc_constraints(
        &mut self,
        directions: &ConstraintDirections,
        acceleration: &Vector6<f64>,
    ) {
        self.ee_unit_constraint_force = directions.unit_constraint_matrix();
        self.ee_acceleration_energy = *acceleration;
    }

    /// External wrench on the end-effector segment
    pub fn set_ee_external_force(&mut self, wrench: Wrench) {
        let ee = self.end_effector_segment();
        self.external_force[ee] = wrench;
    }

    pub fn set_feedforward_torque(&mut self, torque: &[f64]) -> Result<()> {
        if torque.len() != self.num_joints() {
            return Err(ControlError::dimension_mismatch(
                "feedforward torque",
                self.num_joints(),
                torque.len(),
            ));
        }
        self.feedforward_torque.copy_from_slice(torque);
        Ok(())
    }

    /// Set positions and velocities together. Nothing is written unless both sizes match.
    pub fn set_joint_state(&mut self, q: &[f64], qd: &[f64]) -> Result<()> {
        let n = self.num_joints();
        if q.len() != n {
            return Err(ControlError::dimension_mismatch("joint positions", n, q.len()));
        }
        if qd.len() != n {
            return Err(ControlError::dimension_mismatch("joint velocities", n, qd.len()));
        }
        self.q.copy_from_slice(q);
        self.qd.copy_from_slice(qd);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector3;

    #[test]
    fn test_state_shapes() {
        let state = RobotState::new(5, 5);
        assert_eq!(state.num_joints(), 5);
        assert_eq!(state.num_segments(), 5);
        assert_eq!(state.frame_pose.len(), 6);
        assert_eq!(state.frame_twist.len(), 6);
        assert_eq!(state.end_effector_frame(), 5);
        assert_eq!(state.end_effector_segment(), 4);
    }

    #[test]
    fn test_acc_constraints_follow_directions() {
        let mut state = RobotState::new(6, 6);
        let dirs = ConstraintDirections([true, false, true, false, false, true]);
        let acc = Vector6::new(1.0, 2.0, 3.0, 4.0, 5.0, 6.0);
        state.set_ee_acc_constraints(&dirs, &acc);

        assert_eq!(state.ee_unit_constraint_force[(0, 0)], 1.0);
        assert_eq!(state.ee_unit_constraint_force[(1, 1)], 0.0);
        assert_eq!(state.ee_unit_constraint_force[(5, 5)], 1.0);
        assert_eq!(state.ee_unit_constraint_force[(0, 1)], 0.0);
        assert_eq!(state.ee_acceleration_energy, acc);
    }

    #[test]
    fn test_feedforward_size_is_checked() {
        let mut state = RobotState::new(5, 5);
        assert!(state.set_feedforward_torque(&[0.0; 4]).is_err());
        assert!(state.set_feedforward_torque(&[1.0, 2.0, 3.0, 4.0, 5.0]).is_ok());
        assert_eq!(state.feedforward_torque[4], 5.0);
    }

    #[test]
    fn test_copy_from_and_reset() {
        let mut a = RobotState::new(3, 3);
        let mut b = RobotState::new(3, 3);
        b.q[1] = 2.0;
        b.ee_pose_mut().position = Vector3::new(1.0, 0.0, 0.0);
        b.set_ee_external_force(Wrench::new(Vector3::new(0.0, 0.0, -9.81), Vector3::zeros()));

        a.copy_from(&b);
        assert_eq!(a, b);

        a.reset_values();
        assert_eq!(a, RobotState::new(3, 3));
        assert_eq!(a.frame_pose.len(), 4);
    }

    #[test]
    fn test_joint_state_is_all_or_nothing() {
        let mut state = RobotState::new(3, 3);
        let err = state.set_joint_state(&[0.5; 3], &[1.0; 2]).unwrap_err();
        assert!(matches!(err, ControlError::DimensionMismatch { what: "joint velocities", .. }));
        assert_eq!(state.q, DVector::zeros(3));

        state.set_joint_state(&[0.5; 3], &[1.0; 3]).unwrap();
        assert_eq!(state.q[2], 0.5);
        assert_eq!(state.qd[0], 1.0);
    }
}
