//! Simulated joint-level robot backend
//!
//! Every command advances the simulation by one fixed step:
//! - torque: `qdd = tau / inertia`, then semi-implicit Euler
//! - velocity: `qd` is set, `q` integrates it
//! - position: `q` is set directly, `qd` is the finite difference

use log::debug;
use nalgebra::DVector;
use robotcore::{ControlError, IntegrationMethod, JointLimits, Result, RobotMediator, Wrench};

#[derive(Debug, Clone)]
pub struct SimulatedRobot {
    q: DVector<f64>,
    qd: DVector<f64>,
    torque: DVector<f64>,
    inertia: DVector<f64>,
    limits: JointLimits,
    ee_wrench: Wrench,
    dt_sec: f64,
    commands: u64,
}

impl SimulatedRobot {
    pub fn new(limits: JointLimits, inertia: &[f64], dt_sec: f64) -> Result<Self> {
        let n = limits.num_joints();
        if inertia.len() != n {
            return Err(ControlError::dimension_mismatch("joint inertia", n, inertia.len()));
        }
        Ok(Self {
            q: DVector::zeros(n),
            qd: DVector::zeros(n),
            torque: DVector::zeros(n),
            inertia: DVector::from_column_slice(inertia),
            limits,
            ee_wrench: Wrench::zero(),
            dt_sec,
            commands: 0,
        })
    }

    /// Place the robot at `q`, at rest.
    pub fn with_positions(mut self, q: &[f64]) -> Result<Self> {
        if q.len() != self.q.len() {
            return Err(ControlError::dimension_mismatch("joint positions", self.q.len(), q.len()));
        }
        self.q.copy_from_slice(q);
        self.qd.fill(0.0);
        Ok(self)
    }

    /// Wrench reported by the simulated force sensor
    pub fn set_end_effector_wrench(&mut self, wrench: Wrench) {
        self.ee_wrench = wrench;
    }

    /// Number of commands received so far
    pub fn commands(&self) -> u64 {
        self.commands
    }

    fn check_len(&self, what: &'static str, values: &DVector<f64>) -> Result<()> {
        if values.len() != self.q.len() {
            return Err(ControlError::dimension_mismatch(what, self.q.len(), values.len()));
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(ControlError::hardware(format!("non-finite {what} command")));
        }
        Ok(())
    }
}

impl RobotMediator for SimulatedRobot {
    fn num_joints(&self) -> usize {
        self.q.len()
    }

    fn joint_limits(&self) -> &JointLimits {
        &self.limits
    }

    fn joint_positions(&self, out: &mut DVector<f64>) {
        out.copy_from(&self.q);
    }

    fn joint_velocities(&self, out: &mut DVector<f64>) {
        out.copy_from(&self.qd);
    }

    fn joint_torques(&self, out: &mut DVector<f64>) {
        out.copy_from(&self.torque);
    }

    fn end_effector_wrench(&self) -> Wrench {
        self.ee_wrench
    }

    fn set_joint_positions(&mut self, q: &DVector<f64>) -> Result<()> {
        self.check_len("joint position", q)?;
        for j in 0..self.q.len() {
            self.qd[j] = (q[j] - self.q[j]) / self.dt_sec;
        }
        self.q.copy_from(q);
        self.torque.fill(0.0);
        self.commands += 1;
        Ok(())
    }

    fn set_joint_velocities(&mut self, qd: &DVector<f64>) -> Result<()> {
        self.check_len("joint velocity", qd)?;
        let method = IntegrationMethod::SymplecticEuler;
        for j in 0..self.q.len() {
            self.qd[j] = qd[j];
            self.q[j] = method.integrate_to_position(0.0, qd[j], self.q[j], self.dt_sec);
        }
        self.torque.fill(0.0);
        self.commands += 1;
        Ok(())
    }

    fn set_joint_torques(&mut self, tau: &DVector<f64>) -> Result<()> {
        self.check_len("joint torque", tau)?;
        let method = IntegrationMethod::SymplecticEuler;
        for j in 0..self.q.len() {
            let qdd = tau[j] / self.inertia[j];
            self.qd[j] = method.integrate_to_velocity(qdd, self.qd[j], self.dt_sec);
            self.q[j] = method.integrate_to_position(qdd, self.qd[j], self.q[j], self.dt_sec);
        }
        self.torque.copy_from(tau);
        self.commands += 1;
        Ok(())
    }

    fn stop_motion(&mut self) -> Result<()> {
        debug!("simulated robot stopping");
        self.qd.fill(0.0);
        self.torque.fill(0.0);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn robot() -> SimulatedRobot {
        SimulatedRobot::new(JointLimits::uniform(2, 3.0, 2.0, 10.0, 50.0), &[2.0, 1.0], 0.01).unwrap()
    }

    #[test]
    fn test_inertia_size_is_checked() {
        let result = SimulatedRobot::new(JointLimits::uniform(3, 1.0, 1.0, 1.0, 1.0), &[1.0], 0.01);
        assert!(matches!(result, Err(ControlError::DimensionMismatch { expected: 3, actual: 1, .. })));
    }

    #[test]
    fn test_torque_step_is_semi_implicit() {
        let mut robot = robot();
        robot.set_joint_torques(&DVector::from_vec(vec![4.0, -1.0])).unwrap();

        let mut q = DVector::zeros(2);
        let mut qd = DVector::zeros(2);
        robot.joint_positions(&mut q);
        robot.joint_velocities(&mut qd);

        assert_relative_eq!(qd[0], 0.02, epsilon = 1e-12);
        assert_relative_eq!(q[0], 0.0002, epsilon = 1e-12);
        assert_relative_eq!(qd[1], -0.01, epsilon = 1e-12);
        assert_eq!(robot.commands(), 1);
    }

    #[test]
    fn test_velocity_and_position_commands() {
        let mut robot = robot().with_positions(&[0.5, 0.0]).unwrap();
        robot.set_joint_velocities(&DVector::from_vec(vec![1.0, 0.0])).unwrap();

        let mut q = DVector::zeros(2);
        robot.joint_positions(&mut q);
        assert_relative_eq!(q[0], 0.51, epsilon = 1e-12);

        robot.set_joint_positions(&DVector::from_vec(vec![0.52, 0.0])).unwrap();
        let mut qd = DVector::zeros(2);
        robot.joint_velocities(&mut qd);
        assert_relative_eq!(qd[0], 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_non_finite_command_rejected() {
        let mut robot = robot();
        let err = robot.set_joint_torques(&DVector::from_vec(vec![f64::NAN, 0.0])).unwrap_err();
        assert!(matches!(err, ControlError::Hardware(_)));
        assert_eq!(robot.commands(), 0);
    }

    #[test]
    fn test_stop_zeroes_velocity() {
        let mut robot = robot();
        robot.set_joint_velocities(&DVector::from_vec(vec![1.0, 1.0])).unwrap();
        robot.stop_motion().unwrap();
        let mut qd = DVector::from_vec(vec![9.0, 9.0]);
        robot.joint_velocities(&mut qd);
        assert_eq!(qd, DVector::zeros(2));
    }
}
