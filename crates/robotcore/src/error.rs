//! Error types shared by the controller crates.

use thiserror::Error;

use crate::traits::{ControlMode, DynamicsInterface};

/// Errors raised while setting up or running the control loop.
///
/// Setup errors come out of constructors and configuration calls; the remaining
/// variants end a running loop after the robot has been stopped.
#[derive(Debug, Error)]
pub enum ControlError {
    /// Control loop frequency outside the supported range.
    #[error("control loop frequency {rate_hz} Hz outside [1, 10000] Hz")]
    InvalidRate { rate_hz: u32 },

    /// The dynamics solver needs one joint per segment.
    #[error("kinematic chain mismatch: {joints} joints, {segments} segments")]
    ChainMismatch { joints: usize, segments: usize },

    /// A vector handed to the controller has the wrong size.
    #[error("{what}: expected {expected} values, got {actual}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    /// STOP_MOTION selected as the desired control mode.
    #[error("stop motion selected as the desired control mode")]
    StopModeRequested,

    /// Control entry point called before `initialize`.
    #[error("controller is not initialized")]
    NotInitialized,

    /// Diagnostic log could not be opened or written.
    #[error("diagnostic log error: {0}")]
    DiagnosticLog(#[from] std::io::Error),

    /// Dynamics solver returned a non-zero status.
    #[error("dynamics solver returned status {0}")]
    DynamicsSolver(i32),

    /// Safety module stopped the robot.
    #[error("safety module switched to stop motion (requested {requested:?})")]
    SafetyStop { requested: ControlMode },

    /// Safety module returned a mode above the requested one.
    #[error("safety module upgraded {requested:?} to {returned:?}")]
    SafetyUpgrade {
        requested: ControlMode,
        returned: ControlMode,
    },

    /// Task command cannot be routed into this dynamics interface.
    #[error("unsupported dynamics interface {0:?}")]
    UnsupportedInterface(DynamicsInterface),

    /// Hardware backend rejected a command.
    #[error("hardware error: {0}")]
    Hardware(String),
}

impl ControlError {
    #[must_use]
    pub fn dimension_mismatch(what: &'static str, expected: usize, actual: usize) -> Self {
        Self::DimensionMismatch {
            what,
            expected,
            actual,
        }
    }

    #[must_use]
    pub fn hardware(reason: impl Into<String>) -> Self {
        Self::Hardware(reason.into())
    }

    /// Errors that end a running loop when raised inside a cycle
    pub fn is_cycle_fatal(&self) -> bool {
        matches!(
            self,
            ControlError::DiagnosticLog(_)
                | ControlError::DynamicsSolver(_)
                | ControlError::SafetyStop { .. }
                | ControlError::SafetyUpgrade { .. }
                | ControlError::UnsupportedInterface(_)
                | ControlError::Hardware(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, ControlError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = ControlError::InvalidRate { rate_hz: 20_000 };
        assert!(err.to_string().contains("20000"));

        let err = ControlError::dimension_mismatch("feedforward torque", 5, 7);
        assert!(err.to_string().contains("expected 5"));
        assert!(err.to_string().contains("got 7"));

        let err = ControlError::DynamicsSolver(3);
        assert!(err.to_string().contains("status 3"));
    }

    #[test]
    fn test_cycle_fatal_classification() {
        assert!(ControlError::DynamicsSolver(1).is_cycle_fatal());
        assert!(ControlError::SafetyStop { requested: ControlMode::Torque }.is_cycle_fatal());
        assert!(!ControlError::StopModeRequested.is_cycle_fatal());
        assert!(!ControlError::InvalidRate { rate_hz: 0 }.is_cycle_fatal());
        assert!(!ControlError::dimension_mismatch("joint positions", 6, 2).is_cycle_fatal());
        assert!(ControlError::from(std::io::Error::other("disk full")).is_cycle_fatal());
    }
}
