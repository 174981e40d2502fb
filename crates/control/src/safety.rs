//! Joint-limit safety module
//!
//! Sits between the controller and a robot backend. Commands are checked against the
//! backend's joint limit tables with a one-step joint-space look-ahead, trying modes
//! from the requested one downward:
//!
//! - Torque: every torque and commanded acceleration within limits, and the resulting
//!   velocity and position too.
//! - Velocity: the integrated velocity within limits, and the resulting position too.
//! - Position: the integrated position within limits.
//! - Otherwise the robot is stopped.

use kinematics::StatePredictor;
use log::{debug, error, warn};
use robotcore::{ControlMode, IntegrationMethod, RobotMediator, RobotState, SafetyModule};

pub struct JointLimitSafety<M: RobotMediator> {
    robot: M,
    predictor: StatePredictor,
    predicted: RobotState,
}

impl<M: RobotMediator> JointLimitSafety<M> {
    pub fn new(robot: M) -> Self {
        let n = robot.num_joints();
        Self {
            robot,
            predictor: StatePredictor::new(n, n),
            predicted: RobotState::new(n, n),
        }
    }

    pub fn robot(&self) -> &M {
        &self.robot
    }

    pub fn robot_mut(&mut self) -> &mut M {
        &mut self.robot
    }

    pub fn into_inner(self) -> M {
        self.robot
    }

    /// Joint state one step ahead, as of the last `apply`
    pub fn predicted_state(&self) -> &RobotState {
        &self.predicted
    }

    /// One-step look-ahead of the commanded joint state
    fn predict(&mut self, state: &RobotState, dt_sec: f64, method: IntegrationMethod) {
        if !self.predicted.same_shape(state) {
            self.predictor = StatePredictor::new(state.num_joints(), state.num_segments());
            self.predicted = state.clone();
        }
        if let Err(status) =
            self.predictor
                .integrate_joint_space(state, &mut self.predicted, dt_sec, 1, method, None, None)
        {
            debug!("look-ahead: {status}");
        }
    }

    fn first_violation(&self, mode: ControlMode, state: &RobotState) -> Option<String> {
        let limits = self.robot.joint_limits();
        let predicted = &self.predicted;
        for j in 0..state.num_joints() {
            if mode == ControlMode::Torque {
                if !limits.torque_ok(j, state.control_torque[j]) {
                    return Some(format!("joint {j} torque {:.3} over limit", state.control_torque[j]));
                }
                if !limits.acceleration_ok(j, state.qdd[j]) {
                    return Some(format!("joint {j} acceleration {:.3} over limit", state.qdd[j]));
                }
            }
            if mode >= ControlMode::Velocity && !limits.velocity_ok(j, predicted.qd[j]) {
                return Some(format!("joint {j} velocity {:.3} over limit", predicted.qd[j]));
            }
            if mode >= ControlMode::Position && !limits.position_ok(j, predicted.q[j]) {
                return Some(format!("joint {j} position {:.3} outside limits", predicted.q[j]));
            }
        }
        None
    }

    fn send(&mut self, mode: ControlMode, state: &RobotState) -> robotcore::Result<()> {
        match mode {
            ControlMode::Torque => self.robot.set_joint_torques(&state.control_torque),
            ControlMode::Velocity => self.robot.set_joint_velocities(&self.predicted.qd),
            ControlMode::Position => self.robot.set_joint_positions(&self.predicted.q),
            ControlMode::StopMotion => self.robot.stop_motion(),
        }
    }
}

impl<M: RobotMediator> SafetyModule for JointLimitSafety<M> {
    fn num_joints(&self) -> usize {
        self.robot.num_joints()
    }

    fn get_current_state(&mut self, state: &mut RobotState) {
        self.robot.read_state(state);
    }

    fn apply(
        &mut self,
        state: &mut RobotState,
        dt_sec: f64,
        requested: ControlMode,
        method: IntegrationMethod,
    ) -> ControlMode {
        self.predict(state, dt_sec, method);

        for mode in [ControlMode::Torque, ControlMode::Velocity, ControlMode::Position] {
            if mode > requested {
                continue;
            }
            if let Some(reason) = self.first_violation(mode, state) {
                warn!("{} unsafe: {reason}", mode.label());
                continue;
            }
            match self.send(mode, state) {
                Ok(()) => return mode,
                Err(e) => {
                    error!("{} command rejected: {e}", mode.label());
                    break;
                }
            }
        }

        self.stop();
        ControlMode::StopMotion
    }

    fn stop(&mut self) {
        if let Err(e) = self.robot.stop_motion() {
            error!("failed to stop robot motion: {e}");
        }
    }
}
