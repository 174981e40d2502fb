//! Per-cycle diagnostic logs
//!
//! Three whitespace-delimited text files, one value row per line:
//! - Cartesian: current and desired end-effector position, predicted error twist, then
//!   the feedback module's error, bias, gain and command.
//! - Joint: the torque-limit table once, then the control torque every cycle.
//! - Predictions: end-effector linear velocity, horizon energy and horizon length.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use log::info;
use nalgebra::Vector6;
use robotcore::RobotState;
use serde::{Deserialize, Serialize};

use crate::feedback::AdaptiveFeedback;
use crate::tracking::{ErrorVectors, HorizonSample};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticsConfig {
    pub directory: PathBuf,
    pub cart_file: String,
    pub joint_file: String,
    pub predictions_file: String,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("control_data"),
            cart_file: "control_error_data.txt".to_string(),
            joint_file: "control_torque_data.txt".to_string(),
            predictions_file: "prediction_effects.txt".to_string(),
        }
    }
}

impl DiagnosticsConfig {
    /// Set the log directory
    pub fn with_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.directory = directory.into();
        self
    }

    pub fn cart_path(&self) -> PathBuf {
        self.directory.join(&self.cart_file)
    }

    pub fn joint_path(&self) -> PathBuf {
        self.directory.join(&self.joint_file)
    }

    pub fn predictions_path(&self) -> PathBuf {
        self.directory.join(&self.predictions_file)
    }
}

/// Everything written for one cycle
pub struct CycleRecord<'a> {
    pub current: &'a RobotState,
    pub desired: &'a RobotState,
    pub errors: &'a ErrorVectors,
    pub horizon: &'a HorizonSample,
    pub feedback: &'a dyn AdaptiveFeedback,
}

pub struct DiagnosticLog {
    cart: BufWriter<File>,
    joint: BufWriter<File>,
    predictions: BufWriter<File>,
}

fn create(path: &Path) -> io::Result<BufWriter<File>> {
    File::create(path).map(BufWriter::new)
}

fn write_row<W: Write>(out: &mut W, values: impl IntoIterator<Item = f64>) -> io::Result<()> {
    let mut first = true;
    for v in values {
        if !first {
            out.write_all(b" ")?;
        }
        write!(out, "{v}")?;
        first = false;
    }
    out.write_all(b"\n")
}

fn vector_row<W: Write>(out: &mut W, v: &Vector6<f64>) -> io::Result<()> {
    write_row(out, v.iter().copied())
}

impl DiagnosticLog {
    /// Create the log directory and the three files, writing the joint file header.
    pub fn open(config: &DiagnosticsConfig, torque_limits: &[f64]) -> io::Result<Self> {
        fs::create_dir_all(&config.directory)?;
        let mut log = Self {
            cart: create(&config.cart_path())?,
            joint: create(&config.joint_path())?,
            predictions: create(&config.predictions_path())?,
        };
        write_row(&mut log.joint, torque_limits.iter().copied())?;
        info!("Writing control data to {}", config.directory.display());
        Ok(log)
    }

    pub fn write_cycle(&mut self, record: &CycleRecord<'_>) -> io::Result<()> {
        let current = record.current.ee_pose().position;
        let desired = record.desired.ee_pose().position;
        // Orientation columns are kept for a fixed row width
        write_row(&mut self.cart, current.iter().copied().chain([0.0; 3]))?;
        write_row(&mut self.cart, desired.iter().copied().chain([0.0; 3]))?;
        vector_row(&mut self.cart, &record.errors.predicted.to_vector())?;
        vector_row(&mut self.cart, &record.feedback.error())?;
        vector_row(&mut self.cart, &record.feedback.bias())?;
        vector_row(&mut self.cart, &record.feedback.gain())?;
        vector_row(&mut self.cart, &record.feedback.command())?;

        write_row(&mut self.joint, record.current.control_torque.iter().copied())?;

        let velocity = record.current.ee_twist().linear;
        write_row(
            &mut self.predictions,
            velocity.iter().copied().chain([record.horizon.energy, record.horizon.horizon_sec]),
        )
    }

    /// Flush all files.
    pub fn close(mut self) -> io::Result<()> {
        self.cart.flush()?;
        self.joint.flush()?;
        self.predictions.flush()
    }
}
