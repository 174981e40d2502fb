//! Short-horizon state prediction
//!
//! Two integration modes:
//! - Joint space: acceleration -> velocity -> position per joint, used for joint-limit
//!   look-ahead.
//! - Cartesian space: end-effector pose integrated by its current twist, used to
//!   anticipate the task error.

use nalgebra::DVector;
use robotcore::{DynamicsSolver, FkSolver, IntegrationMethod, RobotState, Wrench};
use thiserror::Error;

use crate::geometry::integrate_pose;

/// Non-fatal problems hit while predicting. The prediction is still produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PredictionStatus {
    #[error("forward kinematics returned status {0} during prediction")]
    Kinematics(i32),
    #[error("dynamics solver returned status {0} during prediction")]
    Dynamics(i32),
}

/// Velocity after one step of `method`
#[inline]
pub fn integrate_to_velocity(
    acceleration: f64,
    current_velocity: f64,
    method: IntegrationMethod,
    dt_sec: f64,
) -> f64 {
    method.integrate_to_velocity(acceleration, current_velocity, dt_sec)
}

/// Position after one step of `method`, from the already integrated velocity
#[inline]
pub fn integrate_to_position(
    acceleration: f64,
    predicted_velocity: f64,
    current_position: f64,
    method: IntegrationMethod,
    dt_sec: f64,
) -> f64 {
    method.integrate_to_position(acceleration, predicted_velocity, current_position, dt_sec)
}

/// Integrates robot state forward in time.
///
/// Owns its scratch buffers, sized once from the chain, so repeated predictions do not
/// allocate.
#[derive(Debug, Clone)]
pub struct StatePredictor {
    temp_state: RobotState,
    start_q: DVector<f64>,
    start_qd: DVector<f64>,
    start_qdd: DVector<f64>,
    zero_cart_force: Vec<Wrench>,
}

impl StatePredictor {
    pub fn new(num_joints: usize, num_segments: usize) -> Self {
        Self {
            temp_state: RobotState::new(num_joints, num_segments),
            start_q: DVector::zeros(num_joints),
            start_qd: DVector::zeros(num_joints),
            start_qdd: DVector::zeros(num_joints),
            zero_cart_force: vec![Wrench::zero(); num_segments],
        }
    }

    /// Integrate joint state for `num_of_steps` steps of `dt_sec`.
    ///
    /// - `fk`: when given, Cartesian poses and twists are recomputed after every step.
    /// - `dynamics`: when given (predictor-corrector only), acceleration is recomputed at
    ///   the half step.
    ///
    /// Solver failures do not stop the integration; the first one is returned once the
    /// prediction is written into `predicted`.
    #[allow(clippy::too_many_arguments)]
    pub fn integrate_joint_space(
        &mut self,
        current: &RobotState,
        predicted: &mut RobotState,
        dt_sec: f64,
        num_of_steps: usize,
        method: IntegrationMethod,
        mut fk: Option<&mut dyn FkSolver>,
        mut dynamics: Option<&mut dyn DynamicsSolver>,
    ) -> Result<(), PredictionStatus> {
        let mut status = None;
        self.temp_state.copy_from(current);
        let num_joints = current.num_joints();

        for _ in 0..num_of_steps {
            match method {
                IntegrationMethod::SymplecticEuler => {
                    let state = &mut self.temp_state;
                    for j in 0..num_joints {
                        let qd = integrate_to_velocity(state.qdd[j], state.qd[j], method, dt_sec);
                        let q = integrate_to_position(state.qdd[j], qd, state.q[j], method, dt_sec);
                        state.qd[j] = qd;
                        state.q[j] = q;
                    }
                }
                IntegrationMethod::PredictorCorrector => {
                    self.start_q.copy_from(&self.temp_state.q);
                    self.start_qd.copy_from(&self.temp_state.qd);
                    self.start_qdd.copy_from(&self.temp_state.qdd);

                    // Predict the half step
                    let half_dt = 0.5 * dt_sec;
                    let state = &mut self.temp_state;
                    for j in 0..num_joints {
                        let qd = integrate_to_velocity(self.start_qdd[j], self.start_qd[j], method, half_dt);
                        let q = integrate_to_position(self.start_qdd[j], qd, self.start_q[j], method, half_dt);
                        state.qd[j] = qd;
                        state.q[j] = q;
                    }

                    if let Some(solver) = dynamics.as_mut() {
                        if let Err(code) = solver.solve(state, &self.zero_cart_force) {
                            status.get_or_insert(PredictionStatus::Dynamics(code));
                            state.qdd.copy_from(&self.start_qdd);
                        }
                    }

                    // Correct with the averaged acceleration over the full step
                    for j in 0..num_joints {
                        let qdd = 0.5 * (self.start_qdd[j] + state.qdd[j]);
                        let qd = integrate_to_velocity(qdd, self.start_qd[j], method, dt_sec);
                        let q = integrate_to_position(qdd, qd, self.start_q[j], method, dt_sec);
                        state.qd[j] = qd;
                        state.q[j] = q;
                    }
                }
            }

            if let Some(solver) = fk.as_mut() {
                if let Err(code) = solver.solve(&mut self.temp_state) {
                    status.get_or_insert(PredictionStatus::Kinematics(code));
                }
            }
        }

        predicted.copy_from(&self.temp_state);
        match status {
            Some(s) => {
                log::warn!("{s}");
                Err(s)
            }
            None => Ok(()),
        }
    }

    /// Integrate the end-effector pose by its current twist scaled with `dt_sec`,
    /// `num_of_steps` times. Every other field of `predicted` mirrors `current`.
    pub fn integrate_cartesian_space(
        &mut self,
        current: &RobotState,
        predicted: &mut RobotState,
        dt_sec: f64,
        num_of_steps: usize,
    ) {
        predicted.copy_from(current);

        let mut pose = *current.ee_pose();
        for _ in 0..num_of_steps {
            let mut twist = *current.ee_twist() * dt_sec;
            pose = integrate_pose(&pose, &mut twist, true);
        }
        *predicted.ee_pose_mut() = pose;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::{Rotation3, Vector3};
    use robotcore::{Pose, Twist};

    /// FK for a chain whose end-effector position is simply (q0, q1, q2)
    struct PrismaticFk {
        calls: usize,
        fail_with: Option<i32>,
    }

    impl FkSolver for PrismaticFk {
        fn solve(&mut self, state: &mut RobotState) -> Result<(), i32> {
            self.calls += 1;
            if let Some(code) = self.fail_with {
                return Err(code);
            }
            let pose = Pose::from_translation(state.q[0], state.q[1], state.q[2]);
            *state.ee_pose_mut() = pose;
            Ok(())
        }
    }

    /// Spring dynamics: qdd = -k q
    struct Spring {
        k: f64,
    }

    impl DynamicsSolver for Spring {
        fn solve(&mut self, state: &mut RobotState, _cart_force: &[Wrench]) -> Result<(), i32> {
            for j in 0..state.num_joints() {
                state.qdd[j] = -self.k * state.q[j];
            }
            Ok(())
        }
    }

    fn moving_state() -> RobotState {
        let mut state = RobotState::new(3, 3);
        state.q = DVector::from_vec(vec![0.1, -0.2, 0.3]);
        state.qd = DVector::from_vec(vec![1.0, 0.5, -0.25]);
        state.qdd = DVector::from_vec(vec![2.0, -1.0, 0.0]);
        state
    }

    #[test]
    fn test_symplectic_loop_matches_scalar_rules() {
        let current = moving_state();
        let mut predicted = RobotState::new(3, 3);
        let mut predictor = StatePredictor::new(3, 3);
        let method = IntegrationMethod::SymplecticEuler;
        let dt = 0.01;

        predictor
            .integrate_joint_space(&current, &mut predicted, dt, 3, method, None, None)
            .unwrap();

        for j in 0..3 {
            let (mut q, mut qd) = (current.q[j], current.qd[j]);
            for _ in 0..3 {
                qd = integrate_to_velocity(current.qdd[j], qd, method, dt);
                q = integrate_to_position(current.qdd[j], qd, q, method, dt);
            }
            assert_eq!(predicted.qd[j], qd);
            assert_eq!(predicted.q[j], q);
        }
    }

    #[test]
    fn test_predictor_corrector_constant_acceleration() {
        let current = moving_state();
        let mut predicted = RobotState::new(3, 3);
        let mut predictor = StatePredictor::new(3, 3);
        let dt = 0.1;

        predictor
            .integrate_joint_space(&current, &mut predicted, dt, 1, IntegrationMethod::PredictorCorrector, None, None)
            .unwrap();

        for j in 0..3 {
            let (q0, v0, a) = (current.q[j], current.qd[j], current.qdd[j]);
            assert_relative_eq!(predicted.qd[j], v0 + a * dt, epsilon = 1e-12);
            assert_relative_eq!(predicted.q[j], q0 + v0 * dt + 0.5 * a * dt * dt, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_predictor_corrector_recomputes_acceleration() {
        let mut current = RobotState::new(1, 1);
        current.q[0] = 1.0;
        current.qdd[0] = -4.0;
        let mut predicted = RobotState::new(1, 1);
        let mut predictor = StatePredictor::new(1, 1);
        let mut spring = Spring { k: 4.0 };
        let dt = 0.1;

        predictor
            .integrate_joint_space(
                &current,
                &mut predicted,
                dt,
                1,
                IntegrationMethod::PredictorCorrector,
                None,
                Some(&mut spring),
            )
            .unwrap();

        // Half step: v = -0.2, q = 0.995, recomputed a = -3.98, averaged a = -3.99
        assert_relative_eq!(predicted.qdd[0], -3.98, epsilon = 1e-12);
        assert_relative_eq!(predicted.qd[0], -0.399, epsilon = 1e-12);
        assert_relative_eq!(predicted.q[0], 1.0 - 0.5 * 3.99 * dt * dt, epsilon = 1e-12);
    }

    #[test]
    fn test_fk_runs_every_step() {
        let current = moving_state();
        let mut predicted = RobotState::new(3, 3);
        let mut predictor = StatePredictor::new(3, 3);
        let mut fk = PrismaticFk { calls: 0, fail_with: None };

        predictor
            .integrate_joint_space(
                &current,
                &mut predicted,
                0.01,
                4,
                IntegrationMethod::SymplecticEuler,
                Some(&mut fk),
                None,
            )
            .unwrap();

        assert_eq!(fk.calls, 4);
        assert_relative_eq!(predicted.ee_pose().position.x, predicted.q[0], epsilon = 1e-15);
    }

    #[test]
    fn test_fk_failure_is_reported_not_fatal() {
        let current = moving_state();
        let mut predicted = RobotState::new(3, 3);
        let mut predictor = StatePredictor::new(3, 3);
        let mut fk = PrismaticFk { calls: 0, fail_with: Some(-2) };

        let result = predictor.integrate_joint_space(
            &current,
            &mut predicted,
            0.01,
            2,
            IntegrationMethod::SymplecticEuler,
            Some(&mut fk),
            None,
        );

        assert_eq!(result, Err(PredictionStatus::Kinematics(-2)));
        assert_eq!(fk.calls, 2);
        // Joint state is still integrated
        assert!(predicted.q[0] > current.q[0]);
    }

    #[test]
    fn test_cartesian_prediction_one_step() {
        let mut current = RobotState::new(3, 3);
        *current.ee_pose_mut() = Pose::from_translation(0.5, 0.0, 0.2);
        *current.ee_twist_mut() = Twist::new(Vector3::new(0.1, 0.0, -0.2), Vector3::new(0.0, 0.0, 0.3));
        let mut predicted = RobotState::new(3, 3);
        let mut predictor = StatePredictor::new(3, 3);

        predictor.integrate_cartesian_space(&current, &mut predicted, 2.0, 1);

        assert_relative_eq!(predicted.ee_pose().position, Vector3::new(0.7, 0.0, -0.2), epsilon = 1e-12);
        assert_relative_eq!(
            predicted.ee_pose().rotation,
            Rotation3::new(Vector3::new(0.0, 0.0, 0.6)),
            epsilon = 1e-12
        );
        assert_eq!(predicted.q, current.q);
        assert_eq!(current.ee_pose().position, Vector3::new(0.5, 0.0, 0.2));
    }

    #[test]
    fn test_cartesian_prediction_steps_accumulate() {
        let mut current = RobotState::new(2, 2);
        *current.ee_twist_mut() = Twist::new(Vector3::new(1.0, 0.0, 0.0), Vector3::zeros());
        let mut predicted = RobotState::new(2, 2);
        let mut predictor = StatePredictor::new(2, 2);

        predictor.integrate_cartesian_space(&current, &mut predicted, 0.25, 4);
        assert_relative_eq!(predicted.ee_pose().position.x, 1.0, epsilon = 1e-12);

        predictor.integrate_cartesian_space(&current, &mut predicted, 0.25, 0);
        assert_eq!(predicted, current);
    }
}
