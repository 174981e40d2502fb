//! Runs the Cartesian dynamics controller on a simulated six-axis gantry.
//!
//! Usage: `arm-control-app [config.json]` (defaults to `config/default.json`)

mod config;

use std::env;
use std::error::Error;
use std::process::ExitCode;
use std::str::FromStr;

use control::{ControllerParts, DynamicsController, JointLimitSafety, LoopStats};
use hardware::{CartesianGantry, SimulatedRobot};
use log::{error, info, LevelFilter};
use nalgebra::Vector6;
use robotcore::{Pose, RobotMediator, Wrench};
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};

use crate::config::AppConfig;

const DEFAULT_CONFIG: &str = "config/default.json";

fn init_logger(level: &str) {
    let filter = LevelFilter::from_str(level).unwrap_or(LevelFilter::Info);
    if let Err(e) = TermLogger::init(filter, Config::default(), TerminalMode::Mixed, ColorChoice::Auto) {
        eprintln!("logger already initialized: {e}");
    }
}

fn run(config: &AppConfig) -> Result<LoopStats, Box<dyn Error>> {
    let gantry = CartesianGantry::new(config.gantry.clone());
    let robot = SimulatedRobot::new(config.limits.clone(), &config.gantry.inertia, config.controller.dt_sec())?;
    let torque_limits = robot.joint_limits().torque.clone();

    let parts = ControllerParts::new(
        gantry.num_joints(),
        gantry.num_segments(),
        gantry.clone(),
        gantry,
        JointLimitSafety::new(robot),
    )
    .with_torque_limits(torque_limits);
    let mut controller = DynamicsController::new(config.controller.clone(), parts)?;

    let task = &config.task;
    controller.define_desired_ee_pose(task.constraint_directions, Pose::from_row_major(&task.desired_pose));
    controller.define_ee_acc_constraint(&task.acceleration_directions, &Vector6::from(task.acceleration));
    controller.define_ee_external_force(Wrench::from_vector(&Vector6::from(task.external_force)));
    controller.define_feedforward_torque(&task.feedforward_torque)?;

    controller.initialize(
        task.control_mode,
        task.interface,
        task.use_transformed_driver,
        task.store_control_data,
    )?;

    let stats = controller.control_for(config.cycles)?;
    controller.deinitialize()?;

    let state = controller.current_state();
    info!("Final end-effector position: {:?}", state.ee_pose().position.as_slice());
    info!(
        "Remaining error: linear {:.5}, angular {:.5}",
        controller.errors().current.linear.norm(),
        controller.errors().current.angular.norm()
    );
    Ok(stats)
}

fn main() -> ExitCode {
    let path = env::args().nth(1).unwrap_or_else(|| DEFAULT_CONFIG.to_string());
    let config = match AppConfig::load(&path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("failed to load {path}: {e}");
            return ExitCode::FAILURE;
        }
    };
    init_logger(&config.log_level);

    match run(&config) {
        Ok(stats) => {
            info!(
                "Finished {} cycles, {} overruns, max cycle {:?}",
                stats.cycles, stats.overruns, stats.max_cycle
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Controller stopped: {e}");
            ExitCode::FAILURE
        }
    }
}
