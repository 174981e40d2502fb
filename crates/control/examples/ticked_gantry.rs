//! Externally ticked controller
//!
//! A host loop owns the plant (a six-axis gantry integrated in place) and calls
//! `DynamicsController::step` once per tick with the measured joint state:
//! - The controller never paces itself or reads the hardware
//! - The returned control torque is clamped and integrated by the host
//! - The end-effector trace is printed every 100 ticks

use control::{ControllerConfig, ControllerParts, DynamicsController, HorizonConfig, MotionProfileConfig};
use hardware::{CartesianGantry, GantryConfig, GANTRY_JOINTS};
use kinematics::{integrate_to_position, integrate_to_velocity};
use robotcore::{
    ConstraintDirections, ControlMode, DynamicsInterface, IntegrationMethod, JointLimits, Pose, RobotState,
    SafetyModule,
};

const RATE_HZ: u32 = 1000;
const TICKS: usize = 1500;
const TORQUE_LIMIT: f64 = 20.0;

/// Clamps torques in place; the host applies them.
struct TorqueClamp {
    limits: JointLimits,
}

impl SafetyModule for TorqueClamp {
    fn num_joints(&self) -> usize {
        self.limits.num_joints()
    }

    fn get_current_state(&mut self, _state: &mut RobotState) {}

    fn apply(&mut self, state: &mut RobotState, _dt: f64, requested: ControlMode, _m: IntegrationMethod) -> ControlMode {
        for (j, tau) in state.control_torque.iter_mut().enumerate() {
            *tau = tau.clamp(-self.limits.torque[j], self.limits.torque[j]);
        }
        requested.min(ControlMode::Torque)
    }

    fn stop(&mut self) {}
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let gantry_config = GantryConfig::default().with_damping([2.0, 2.0, 2.0, 0.1, 0.1, 0.1]);
    let inertia = gantry_config.inertia;
    let damping = gantry_config.damping;
    let limits = JointLimits::uniform(GANTRY_JOINTS, 2.0, 1.0, 10.0, TORQUE_LIMIT);

    let parts = ControllerParts::new(
        GANTRY_JOINTS,
        GANTRY_JOINTS,
        CartesianGantry::new(gantry_config.clone()),
        CartesianGantry::new(gantry_config),
        TorqueClamp { limits: limits.clone() },
    )
    .with_torque_limits(limits.torque.clone());

    let config = ControllerConfig::default()
        .with_rate(RATE_HZ)
        .with_horizon(HorizonConfig::tanh(0.2, 4.5))
        .with_motion_profile(MotionProfileConfig::NegativeStep {
            floor_ratio: 0.3,
            upper_threshold: 0.2,
            lower_threshold: 0.02,
        })
        .with_max_command([8.0, 8.0, 8.0, 1.0, 1.0, 1.0]);
    let dt = config.dt_sec();
    let mut controller = DynamicsController::new(config, parts)?;

    controller.define_desired_ee_pose(ConstraintDirections::linear(), Pose::from_translation(0.3, -0.1, 0.2));
    controller.initialize(ControlMode::Torque, DynamicsInterface::CartForce, true, false)?;

    let mut q = [0.0; GANTRY_JOINTS];
    let mut qd = [0.0; GANTRY_JOINTS];
    for tick in 0..TICKS {
        let torque = controller.step(&q, &qd)?;
        for j in 0..GANTRY_JOINTS {
            let qdd = (torque[j] - damping[j] * qd[j]) / inertia[j];
            qd[j] = integrate_to_velocity(qdd, qd[j], IntegrationMethod::SymplecticEuler, dt);
            q[j] = integrate_to_position(qdd, qd[j], q[j], IntegrationMethod::SymplecticEuler, dt);
        }

        if tick % 100 == 0 {
            let errors = controller.errors();
            println!(
                "t={:>5.3}s  x={:+.4} y={:+.4} z={:+.4}  |e|={:.5}  horizon={:.3}s",
                tick as f64 * dt,
                q[0],
                q[1],
                q[2],
                errors.current.linear.norm(),
                controller.horizon().horizon_sec,
            );
        }
    }

    controller.deinitialize()?;
    println!("{} ticks, final position {:?}", controller.stats().cycles, &q[..3]);
    Ok(())
}
