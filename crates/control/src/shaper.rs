//! Error-to-command pipeline
//!
//! 1. The normalized error (or the full predicted error twist) goes through the adaptive
//!    feedback module.
//! 2. Linear and angular scalars are spread back along the error direction of their group.
//! 3. Each axis is scaled by the motion profile multiplier.
//! 4. The shaped command is routed into the selected dynamics interface.

use log::debug;
use nalgebra::Vector6;
use robotcore::{ConstraintDirections, ControlError, DynamicsInterface, Result, RobotState, Wrench};

use crate::feedback::AdaptiveFeedback;
use crate::motion_profile::MotionProfileConfig;
use crate::tracking::ErrorVectors;

/// Group norms below this produce an exactly zero command for the group
pub const MIN_NORM: f64 = 1e-10;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CommandVectors {
    /// Output of the feedback module
    pub raw: Vector6<f64>,
    /// Feedback output spread along the error direction
    pub directional: Vector6<f64>,
    /// User configured per-axis command limit
    pub max_command: Vector6<f64>,
    /// Multiplier chosen by the motion profile this cycle
    pub motion_profile: Vector6<f64>,
}

impl CommandVectors {
    pub fn new(max_command: Vector6<f64>) -> Self {
        Self {
            max_command,
            motion_profile: max_command,
            ..Default::default()
        }
    }

    /// Directional command scaled by the motion profile
    pub fn shaped(&self) -> Vector6<f64> {
        self.directional.component_mul(&self.motion_profile)
    }
}

/// Spread the group scalars of `command` (indices 0 and 3) along `error`.
///
/// A group whose error norm is below [`MIN_NORM`] gets exactly zero.
pub fn reconstruct_directional(error: &Vector6<f64>, normalized: &Vector6<f64>, command: &Vector6<f64>) -> Vector6<f64> {
    let mut out = Vector6::zeros();
    for group in [0, 3] {
        let norm = normalized[group];
        if norm < MIN_NORM {
            debug!("{} error norm too small", if group == 0 { "linear" } else { "angular" });
            continue;
        }
        for i in group..group + 3 {
            out[i] = error[i] / norm * command[group];
        }
    }
    out
}

/// Drives the feedback module and shapes its output
pub struct CommandShaper {
    feedback: Box<dyn AdaptiveFeedback>,
    profile: MotionProfileConfig,
    commands: CommandVectors,
}

impl CommandShaper {
    pub fn new(feedback: Box<dyn AdaptiveFeedback>, profile: MotionProfileConfig, max_command: Vector6<f64>) -> Self {
        Self {
            feedback,
            profile,
            commands: CommandVectors::new(max_command),
        }
    }

    pub fn feedback(&self) -> &dyn AdaptiveFeedback {
        self.feedback.as_ref()
    }

    pub fn feedback_mut(&mut self) -> &mut dyn AdaptiveFeedback {
        self.feedback.as_mut()
    }

    pub fn commands(&self) -> &CommandVectors {
        &self.commands
    }

    pub fn profile(&self) -> MotionProfileConfig {
        self.profile
    }

    pub fn set_profile(&mut self, profile: MotionProfileConfig) {
        self.profile = profile;
    }

    pub fn set_max_command(&mut self, max_command: Vector6<f64>) {
        self.commands.max_command = max_command;
    }

    /// Run one shaping pass and return the shaped 6D command.
    ///
    /// With `use_transformed_driver` the feedback sees only the two group norms and its
    /// output is reconstructed along the error direction; otherwise it sees the full
    /// predicted error twist and its output is used directly.
    pub fn shape(&mut self, errors: &ErrorVectors, use_transformed_driver: bool) -> Vector6<f64> {
        let predicted = errors.predicted.to_vector();
        if use_transformed_driver {
            self.commands.raw = self.feedback.update(&errors.normalized);
            self.commands.directional = reconstruct_directional(&predicted, &errors.normalized, &self.commands.raw);
        } else {
            self.commands.raw = self.feedback.update(&predicted);
            self.commands.directional = self.commands.raw;
        }

        let linear_norm = errors.current.linear.norm();
        let angular_norm = errors.current.angular.norm();
        for i in 0..6 {
            let norm = if i < 3 { linear_norm } else { angular_norm };
            self.commands.motion_profile[i] = self.profile.multiplier(norm, self.commands.max_command[i]);
        }

        self.commands.shaped()
    }
}

/// Write `shaped` into the quantity selected by `interface`.
///
/// - Cartesian force: virtual wrench on the end-effector segment, disabled axes zeroed.
/// - Cartesian acceleration: end-effector acceleration constraint on `state` is replaced.
pub fn route_command(
    interface: DynamicsInterface,
    directions: &ConstraintDirections,
    shaped: &Vector6<f64>,
    state: &mut RobotState,
    cart_force: &mut [Wrench],
) -> Result<()> {
    match interface {
        DynamicsInterface::CartForce => {
            let ee = state.end_effector_segment();
            for i in 0..6 {
                let value = if directions.is_enabled(i) { shaped[i] } else { 0.0 };
                cart_force[ee].set_component(i, value);
            }
            Ok(())
        }
        DynamicsInterface::CartAcceleration => {
            state.set_ee_acc_constraints(directions, shaped);
            Ok(())
        }
        DynamicsInterface::FfJointTorque => Err(ControlError::UnsupportedInterface(interface)),
    }
}
