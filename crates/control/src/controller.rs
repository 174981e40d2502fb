//! Cartesian dynamics controller
//!
//! One control cycle:
//! 1. Read joint state through the safety module and run forward kinematics.
//! 2. Predict the end-effector pose over the horizon and measure the task error.
//! 3. Shape the error into a 6D command and route it into the dynamics interface.
//! 4. Solve hybrid dynamics for joint accelerations and control torques.
//! 5. Hand the commands to the safety module and negotiate the applied mode.
//! 6. Busy-wait out the rest of the period.
//!
//! The loop can drive itself ([`DynamicsController::control`],
//! [`DynamicsController::control_for`]) or be ticked by a host framework with
//! [`DynamicsController::step`]. Any cycle error stops the robot, closes the
//! diagnostic logs and ends the loop.

use std::time::Duration;

use kinematics::StatePredictor;
use log::{debug, error, info, warn};
use nalgebra::{DVector, Vector6};
use robotcore::{
    ConstraintDirections, ControlError, ControlMode, ControlModeDecision, DynamicsInterface, DynamicsSolver,
    FkSolver, Pose, Result, RobotState, SafetyModule, Wrench,
};

use crate::clock::{enforce_period, Clock, LoopStats, MonotonicClock};
use crate::config::{ControllerConfig, FeedbackConfig, HorizonConfig, MotionProfileConfig};
use crate::diagnostics::{CycleRecord, DiagnosticLog};
use crate::feedback::{AdaptiveFeedback, FilteredProportional};
use crate::mode::negotiate;
use crate::shaper::{route_command, CommandShaper, CommandVectors};
use crate::tracking::{ErrorVectors, HorizonSample};

/// Collaborators and chain dimensions handed to the controller
pub struct ControllerParts {
    pub num_joints: usize,
    pub num_segments: usize,
    /// Written as the joint log header
    pub torque_limits: Vec<f64>,
    pub fk: Box<dyn FkSolver>,
    pub dynamics: Box<dyn DynamicsSolver>,
    pub safety: Box<dyn SafetyModule>,
    /// Defaults to [`FilteredProportional`]
    pub feedback: Option<Box<dyn AdaptiveFeedback>>,
    pub clock: Box<dyn Clock>,
}

impl ControllerParts {
    pub fn new(
        num_joints: usize,
        num_segments: usize,
        fk: impl FkSolver + 'static,
        dynamics: impl DynamicsSolver + 'static,
        safety: impl SafetyModule + 'static,
    ) -> Self {
        Self {
            num_joints,
            num_segments,
            torque_limits: Vec::new(),
            fk: Box::new(fk),
            dynamics: Box::new(dynamics),
            safety: Box::new(safety),
            feedback: None,
            clock: Box::new(MonotonicClock::new()),
        }
    }

    /// Set the loop time source
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Set the adaptive feedback module
    pub fn with_feedback(mut self, feedback: impl AdaptiveFeedback + 'static) -> Self {
        self.feedback = Some(Box::new(feedback));
        self
    }

    /// Set the torque-limit table written to the joint log
    pub fn with_torque_limits(mut self, torque_limits: Vec<f64>) -> Self {
        self.torque_limits = torque_limits;
        self
    }
}

pub struct DynamicsController {
    config: ControllerConfig,
    dt_sec: f64,
    period: Duration,

    fk: Box<dyn FkSolver>,
    dynamics: Box<dyn DynamicsSolver>,
    safety: Box<dyn SafetyModule>,
    clock: Box<dyn Clock>,
    shaper: CommandShaper,
    predictor: StatePredictor,

    current: RobotState,
    desired: RobotState,
    predicted: RobotState,
    cart_force: Vec<Wrench>,

    errors: ErrorVectors,
    horizon: HorizonSample,
    directions: ConstraintDirections,
    decision: ControlModeDecision,
    interface: DynamicsInterface,
    use_transformed_driver: bool,

    torque_limits: Vec<f64>,
    log: Option<DiagnosticLog>,
    initialized: bool,
    stats: LoopStats,
}

impl DynamicsController {
    pub fn new(config: ControllerConfig, parts: ControllerParts) -> Result<Self> {
        config.validate()?;
        if parts.num_joints != parts.num_segments || parts.num_segments == 0 {
            return Err(ControlError::ChainMismatch {
                joints: parts.num_joints,
                segments: parts.num_segments,
            });
        }
        if parts.safety.num_joints() != parts.num_joints {
            return Err(ControlError::dimension_mismatch(
                "robot joints",
                parts.num_joints,
                parts.safety.num_joints(),
            ));
        }
        if !parts.torque_limits.is_empty() && parts.torque_limits.len() != parts.num_joints {
            return Err(ControlError::dimension_mismatch(
                "torque limits",
                parts.num_joints,
                parts.torque_limits.len(),
            ));
        }

        let mut feedback = parts
            .feedback
            .unwrap_or_else(|| Box::new(FilteredProportional::new(config.feedback.clone())));
        feedback.set_config(config.feedback.clone());
        let shaper = CommandShaper::new(feedback, config.motion_profile, Vector6::from(config.max_command));

        let state = RobotState::new(parts.num_joints, parts.num_segments);
        Ok(Self {
            dt_sec: config.dt_sec(),
            period: config.period(),
            config,
            fk: parts.fk,
            dynamics: parts.dynamics,
            safety: parts.safety,
            clock: parts.clock,
            shaper,
            predictor: StatePredictor::new(parts.num_joints, parts.num_segments),
            current: state.clone(),
            desired: state.clone(),
            predicted: state,
            cart_force: vec![Wrench::zero(); parts.num_segments],
            errors: ErrorVectors::default(),
            horizon: HorizonSample::default(),
            directions: ConstraintDirections::none(),
            decision: ControlModeDecision::default(),
            interface: DynamicsInterface::CartForce,
            use_transformed_driver: true,
            torque_limits: parts.torque_limits,
            log: None,
            initialized: false,
            stats: LoopStats::default(),
        })
    }

    // Task definition

    /// Target end-effector pose and the axes along which it is controlled
    pub fn define_desired_ee_pose(&mut self, directions: ConstraintDirections, pose: Pose) {
        self.directions = directions;
        *self.desired.ee_pose_mut() = pose;
    }

    pub fn define_ee_acc_constraint(&mut self, directions: &ConstraintDirections, acceleration: &Vector6<f64>) {
        self.desired.set_ee_acc_constraints(directions, acceleration);
    }

    pub fn define_ee_external_force(&mut self, wrench: Wrench) {
        self.desired.set_ee_external_force(wrench);
    }

    pub fn define_feedforward_torque(&mut self, torque: &[f64]) -> Result<()> {
        self.desired.set_feedforward_torque(torque)
    }

    pub fn set_parameters(&mut self, horizon: HorizonConfig, max_command: [f64; 6], feedback: FeedbackConfig) {
        self.config.horizon = horizon;
        self.config.max_command = max_command;
        self.shaper.set_max_command(Vector6::from(max_command));
        self.shaper.feedback_mut().set_config(feedback.clone());
        self.config.feedback = feedback;
    }

    pub fn set_motion_profile(&mut self, profile: MotionProfileConfig) {
        self.config.motion_profile = profile;
        self.shaper.set_profile(profile);
    }

    /// Zero every value of the desired state. The current state is left untouched.
    pub fn reset_desired_state(&mut self) {
        self.desired.reset_values();
    }

    // Lifecycle

    /// Select the control mode and dynamics interface and prepare the first cycle.
    ///
    /// The current state takes over the constraint, feedforward torque and external
    /// force defined on the desired state. With `store_control_data` the diagnostic
    /// logs are opened here.
    pub fn initialize(
        &mut self,
        mode: ControlMode,
        interface: DynamicsInterface,
        use_transformed_driver: bool,
        store_control_data: bool,
    ) -> Result<()> {
        if mode == ControlMode::StopMotion {
            info!("Stop Motion mode selected. Exiting");
            return Err(ControlError::StopModeRequested);
        }

        self.decision = ControlModeDecision {
            interface: mode,
            is_safe: false,
        };
        self.interface = interface;
        self.use_transformed_driver = use_transformed_driver;
        self.update_dynamics_interfaces();

        if store_control_data {
            self.log = Some(DiagnosticLog::open(&self.config.diagnostics, &self.torque_limits)?);
        }
        self.stats = LoopStats::default();
        self.initialized = true;
        Ok(())
    }

    /// Stop the robot and close the diagnostic logs.
    pub fn deinitialize(&mut self) -> Result<()> {
        self.safety.stop();
        self.initialized = false;
        if let Some(log) = self.log.take() {
            log.close()?;
        }
        Ok(())
    }

    /// Run the loop until a cycle fails. Never returns `Ok`.
    pub fn control(&mut self) -> Result<()> {
        self.run(None).map(|_| ())
    }

    /// Run the loop for `cycles` cycles, or until one fails.
    pub fn control_for(&mut self, cycles: u64) -> Result<LoopStats> {
        self.run(Some(cycles))
    }

    /// One cycle on externally supplied joint state, without period enforcement.
    ///
    /// Returns the control torque of the cycle.
    pub fn step(&mut self, q: &[f64], qd: &[f64]) -> Result<&DVector<f64>> {
        if !self.initialized {
            return Err(ControlError::NotInitialized);
        }
        self.current.set_joint_state(q, qd)?;
        self.solve_fk();

        let result = self.cycle();
        self.end_on_fatal(result)?;
        self.stats.cycles += 1;
        Ok(&self.current.control_torque)
    }

    pub fn print_settings_info(&self) {
        info!("Selected controller settings:");
        info!("Control loop frequency: {} Hz", self.config.rate_hz);
        info!("Desired control mode: {}", self.decision.interface.label());
        info!("Dynamics interface: {}", self.interface.label());
        info!(
            "Feedback driver: {}",
            if self.use_transformed_driver { "decoupled error norms" } else { "full error twist" }
        );
        info!("Prediction horizon: {:?}", self.config.horizon);
        info!("Motion profile: {:?}", self.config.motion_profile);
        info!("Initial joint positions: {:?}", self.current.q.as_slice());
        info!("Initial end-effector position: {:?}", self.current.ee_pose().position.as_slice());
        info!("Desired end-effector position: {:?}", self.desired.ee_pose().position.as_slice());
    }

    // Accessors

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn current_state(&self) -> &RobotState {
        &self.current
    }

    pub fn desired_state(&self) -> &RobotState {
        &self.desired
    }

    pub fn predicted_state(&self) -> &RobotState {
        &self.predicted
    }

    pub fn errors(&self) -> &ErrorVectors {
        &self.errors
    }

    pub fn commands(&self) -> &CommandVectors {
        self.shaper.commands()
    }

    pub fn cart_force(&self) -> &[Wrench] {
        &self.cart_force
    }

    pub fn decision(&self) -> ControlModeDecision {
        self.decision
    }

    pub fn horizon(&self) -> HorizonSample {
        self.horizon
    }

    pub fn stats(&self) -> &LoopStats {
        &self.stats
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    // Loop internals

    fn run(&mut self, max_cycles: Option<u64>) -> Result<LoopStats> {
        if !self.initialized {
            return Err(ControlError::NotInitialized);
        }

        // Make sure the robot is not moving before the first command
        self.safety.stop();
        self.update_current_state();
        self.print_settings_info();
        info!("Control loop started");

        let mut done = 0u64;
        while max_cycles.is_none_or(|limit| done < limit) {
            let start = self.clock.now();
            self.update_current_state();
            let result = self.cycle();
            self.end_on_fatal(result)?;

            let outcome = enforce_period(self.clock.as_ref(), start, self.period);
            if outcome.is_overrun() {
                warn!("Control loop runs too slow: {:?} for a {:?} period", outcome.work(), self.period);
            }
            self.stats.record(outcome);
            done += 1;
        }
        Ok(self.stats)
    }

    /// Everything after state acquisition
    fn cycle(&mut self) -> Result<()> {
        self.compute_control_error();
        self.compute_cart_control_commands()?;

        if let Some(log) = self.log.as_mut() {
            log.write_cycle(&CycleRecord {
                current: &self.current,
                desired: &self.desired,
                errors: &self.errors,
                horizon: &self.horizon,
                feedback: self.shaper.feedback(),
            })?;
        }

        self.evaluate_dynamics()?;
        self.apply_joint_control_commands()
    }

    /// Abort on cycle-fatal errors; anything else is handed back untouched.
    fn end_on_fatal(&mut self, result: Result<()>) -> Result<()> {
        match result {
            Err(e) if e.is_cycle_fatal() => Err(self.abort(e)),
            other => other,
        }
    }

    fn abort(&mut self, err: ControlError) -> ControlError {
        error!("{err}. Stopping the robot!");
        self.safety.stop();
        if let Some(log) = self.log.take() {
            if let Err(e) = log.close() {
                warn!("failed to flush diagnostic logs: {e}");
            }
        }
        self.initialized = false;
        err
    }

    fn update_current_state(&mut self) {
        self.safety.get_current_state(&mut self.current);
        self.solve_fk();
    }

    fn solve_fk(&mut self) {
        if let Err(status) = self.fk.solve(&mut self.current) {
            warn!("FK solver returned an error: {status}");
        }
    }

    fn update_dynamics_interfaces(&mut self) {
        self.current.ee_unit_constraint_force = self.desired.ee_unit_constraint_force;
        self.current.ee_acceleration_energy = self.desired.ee_acceleration_energy;
        self.current.feedforward_torque.copy_from(&self.desired.feedforward_torque);
        self.current.external_force.copy_from_slice(&self.desired.external_force);
    }

    fn compute_control_error(&mut self) {
        self.errors.update_current(&self.desired, &self.current);
        self.horizon = HorizonSample::evaluate(
            &self.config.horizon,
            &self.errors.current,
            self.current.ee_twist(),
            &self.directions,
        );
        self.predictor
            .integrate_cartesian_space(&self.current, &mut self.predicted, self.horizon.horizon_sec, 1);
        self.errors.update_predicted(&self.desired, &self.predicted);

        debug!(
            "linear error {:.6}, angular error {:.6}, horizon {:.3} s",
            self.errors.linear_norm(),
            self.errors.angular_norm(),
            self.horizon.horizon_sec
        );
    }

    fn compute_cart_control_commands(&mut self) -> Result<()> {
        let shaped = self.shaper.shape(&self.errors, self.use_transformed_driver);
        route_command(self.interface, &self.directions, &shaped, &mut self.current, &mut self.cart_force)
    }

    fn evaluate_dynamics(&mut self) -> Result<()> {
        self.dynamics
            .solve(&mut self.current, &self.cart_force)
            .map_err(ControlError::DynamicsSolver)
    }

    fn apply_joint_control_commands(&mut self) -> Result<()> {
        let requested = self.decision.interface;
        let applied = self
            .safety
            .apply(&mut self.current, self.dt_sec, requested, self.config.integration_method);
        self.decision = negotiate(requested, applied)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use robotcore::IntegrationMethod;

    struct NoFk;
    impl FkSolver for NoFk {
        fn solve(&mut self, _state: &mut RobotState) -> std::result::Result<(), i32> {
            Ok(())
        }
    }

    struct NoDynamics;
    impl DynamicsSolver for NoDynamics {
        fn solve(&mut self, _state: &mut RobotState, _cart_force: &[Wrench]) -> std::result::Result<(), i32> {
            Ok(())
        }
    }

    struct AcceptAll(usize);
    impl SafetyModule for AcceptAll {
        fn num_joints(&self) -> usize {
            self.0
        }
        fn get_current_state(&mut self, _state: &mut RobotState) {}
        fn apply(&mut self, _: &mut RobotState, _: f64, requested: ControlMode, _: IntegrationMethod) -> ControlMode {
            requested
        }
        fn stop(&mut self) {}
    }

    fn parts(joints: usize, segments: usize) -> ControllerParts {
        ControllerParts::new(joints, segments, NoFk, NoDynamics, AcceptAll(joints))
    }

    fn controller() -> DynamicsController {
        DynamicsController::new(ControllerConfig::default(), parts(3, 3)).unwrap()
    }

    #[test]
    fn test_rejects_bad_rate() {
        let result = DynamicsController::new(ControllerConfig::default().with_rate(0), parts(3, 3));
        assert!(matches!(result, Err(ControlError::InvalidRate { rate_hz: 0 })));
        let result = DynamicsController::new(ControllerConfig::default().with_rate(20_000), parts(3, 3));
        assert!(matches!(result, Err(ControlError::InvalidRate { .. })));
    }

    #[test]
    fn test_rejects_chain_mismatch() {
        let result = DynamicsController::new(ControllerConfig::default(), parts(5, 6));
        assert!(matches!(result, Err(ControlError::ChainMismatch { joints: 5, segments: 6 })));
    }

    #[test]
    fn test_rejects_robot_with_other_joint_count() {
        let parts = ControllerParts::new(3, 3, NoFk, NoDynamics, AcceptAll(2));
        let result = DynamicsController::new(ControllerConfig::default(), parts);
        assert!(matches!(
            result,
            Err(ControlError::DimensionMismatch { what: "robot joints", expected: 3, actual: 2 })
        ));
    }

    #[test]
    fn test_rejects_stop_mode() {
        let mut ctrl = controller();
        let result = ctrl.initialize(ControlMode::StopMotion, DynamicsInterface::CartForce, true, false);
        assert!(matches!(result, Err(ControlError::StopModeRequested)));
        assert!(!ctrl.is_initialized());
    }

    #[test]
    fn test_feedforward_size_checked() {
        let mut ctrl = controller();
        assert!(ctrl.define_feedforward_torque(&[1.0, 2.0]).is_err());
        assert!(ctrl.define_feedforward_torque(&[1.0, 2.0, 3.0]).is_ok());
    }

    #[test]
    fn test_initialize_copies_dynamics_interfaces() {
        let mut ctrl = controller();
        ctrl.define_feedforward_torque(&[0.5, 0.0, -0.5]).unwrap();
        ctrl.define_ee_external_force(Wrench::from_vector(&Vector6::new(0.0, 0.0, -1.0, 0.0, 0.0, 0.0)));
        ctrl.define_ee_acc_constraint(&ConstraintDirections::linear(), &Vector6::new(0.0, 0.0, 9.81, 0.0, 0.0, 0.0));

        ctrl.initialize(ControlMode::Torque, DynamicsInterface::CartAcceleration, true, false)
            .unwrap();

        let current = ctrl.current_state();
        assert_eq!(current.feedforward_torque[2], -0.5);
        assert_eq!(current.external_force[2].force.z, -1.0);
        assert_eq!(current.ee_acceleration_energy[2], 9.81);
        assert_eq!(current.ee_unit_constraint_force[(0, 0)], 1.0);
    }

    #[test]
    fn test_reset_desired_state_leaves_current_untouched() {
        let mut ctrl = controller();
        ctrl.define_desired_ee_pose(ConstraintDirections::all(), Pose::from_translation(0.3, 0.2, 0.1));
        ctrl.define_feedforward_torque(&[1.0, 1.0, 1.0]).unwrap();
        ctrl.initialize(ControlMode::Torque, DynamicsInterface::CartForce, true, false)
            .unwrap();
        ctrl.step(&[0.1, 0.2, 0.3], &[0.0; 3]).unwrap();
        let current_before = ctrl.current_state().clone();

        ctrl.reset_desired_state();

        assert_eq!(ctrl.desired_state(), &RobotState::new(3, 3));
        assert_eq!(ctrl.current_state(), &current_before);
    }

    #[test]
    fn test_reset_has_no_target_and_always_clears_desired() {
        // Reset cannot be pointed at another state: it always clears the desired one,
        // even where a caller might expect the current or predicted state to be reset.
        let mut ctrl = controller();
        ctrl.define_desired_ee_pose(ConstraintDirections::all(), Pose::from_translation(0.3, 0.0, 0.0));
        ctrl.define_ee_external_force(Wrench::from_vector(&Vector6::new(0.0, 0.0, -2.0, 0.0, 0.0, 0.0)));
        ctrl.initialize(ControlMode::Torque, DynamicsInterface::CartForce, true, false)
            .unwrap();
        ctrl.step(&[0.1, 0.0, 0.0], &[0.0; 3]).unwrap();
        let predicted_before = ctrl.predicted_state().clone();

        ctrl.reset_desired_state();

        assert_eq!(ctrl.desired_state().ee_pose(), &Pose::identity());
        assert_eq!(ctrl.desired_state().external_force[2], Wrench::zero());
        // Interfaces copied at initialize survive on the current state
        assert_eq!(ctrl.current_state().external_force[2].force.z, -2.0);
        assert_eq!(ctrl.current_state().q[0], 0.1);
        assert_eq!(ctrl.predicted_state(), &predicted_before);
    }

    #[test]
    fn test_step_requires_initialize() {
        let mut ctrl = controller();
        assert!(matches!(ctrl.step(&[0.0; 3], &[0.0; 3]), Err(ControlError::NotInitialized)));
        assert!(matches!(ctrl.control_for(1), Err(ControlError::NotInitialized)));
    }

    #[test]
    fn test_step_checks_input_size() {
        let mut ctrl = controller();
        ctrl.initialize(ControlMode::Torque, DynamicsInterface::CartForce, true, false)
            .unwrap();
        assert!(matches!(ctrl.step(&[0.0; 2], &[0.0; 3]), Err(ControlError::DimensionMismatch { .. })));
        // A size error is a caller mistake, not a cycle failure
        assert!(ctrl.is_initialized());
    }

    #[test]
    fn test_step_size_error_leaves_state_untouched() {
        let mut ctrl = controller();
        ctrl.initialize(ControlMode::Torque, DynamicsInterface::CartForce, true, false)
            .unwrap();
        ctrl.step(&[0.1, 0.2, 0.3], &[0.01; 3]).unwrap();
        let before = ctrl.current_state().clone();

        assert!(ctrl.step(&[0.5; 3], &[0.0; 2]).is_err());

        assert_eq!(ctrl.current_state().q, before.q);
        assert_eq!(ctrl.current_state().qd, before.qd);
        assert_eq!(ctrl.stats().cycles, 1);
    }

    #[test]
    fn test_unsupported_interface_aborts_step() {
        let mut ctrl = controller();
        ctrl.initialize(ControlMode::Torque, DynamicsInterface::FfJointTorque, true, false)
            .unwrap();
        let err = ctrl.step(&[0.0; 3], &[0.0; 3]).unwrap_err();
        assert!(matches!(err, ControlError::UnsupportedInterface(DynamicsInterface::FfJointTorque)));
        assert!(!ctrl.is_initialized());
    }
}
