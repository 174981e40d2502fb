//! Controller configuration

use std::time::Duration;

use robotcore::{ControlError, IntegrationMethod, Result};
use serde::{Deserialize, Serialize};

pub use crate::diagnostics::DiagnosticsConfig;
pub use crate::feedback::{ErrorType, FeedbackConfig};
pub use crate::motion_profile::MotionProfileConfig;
pub use crate::tracking::{HorizonConfig, HorizonMode};

pub const MIN_RATE_HZ: u32 = 1;
pub const MAX_RATE_HZ: u32 = 10_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Control loop frequency
    pub rate_hz: u32,
    /// Per-axis command limit, scaled by the motion profile
    pub max_command: [f64; 6],
    /// Rule the safety module uses for its look-ahead
    pub integration_method: IntegrationMethod,
    pub horizon: HorizonConfig,
    pub motion_profile: MotionProfileConfig,
    pub feedback: FeedbackConfig,
    pub diagnostics: DiagnosticsConfig,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            rate_hz: 1000,
            max_command: [1.0; 6],
            integration_method: IntegrationMethod::SymplecticEuler,
            horizon: HorizonConfig::default(),
            motion_profile: MotionProfileConfig::default(),
            feedback: FeedbackConfig::default(),
            diagnostics: DiagnosticsConfig::default(),
        }
    }
}

impl ControllerConfig {
    /// Set the control loop frequency
    pub fn with_rate(mut self, rate_hz: u32) -> Self {
        self.rate_hz = rate_hz;
        self
    }

    /// Set the per-axis command limit
    pub fn with_max_command(mut self, max_command: [f64; 6]) -> Self {
        self.max_command = max_command;
        self
    }

    /// Set the prediction horizon
    pub fn with_horizon(mut self, horizon: HorizonConfig) -> Self {
        self.horizon = horizon;
        self
    }

    /// Set the motion profile
    pub fn with_motion_profile(mut self, profile: MotionProfileConfig) -> Self {
        self.motion_profile = profile;
        self
    }

    /// Set the feedback module parameters
    pub fn with_feedback(mut self, feedback: FeedbackConfig) -> Self {
        self.feedback = feedback;
        self
    }

    /// Set where diagnostic logs are written
    pub fn with_diagnostics(mut self, diagnostics: DiagnosticsConfig) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(MIN_RATE_HZ..=MAX_RATE_HZ).contains(&self.rate_hz) {
            return Err(ControlError::InvalidRate { rate_hz: self.rate_hz });
        }
        Ok(())
    }

    pub fn period(&self) -> Duration {
        Duration::from_secs(1) / self.rate_hz.max(MIN_RATE_HZ)
    }

    pub fn dt_sec(&self) -> f64 {
        1.0 / self.rate_hz.max(MIN_RATE_HZ) as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_bounds() {
        assert!(ControllerConfig::default().with_rate(1).validate().is_ok());
        assert!(ControllerConfig::default().with_rate(10_000).validate().is_ok());
        assert!(matches!(
            ControllerConfig::default().with_rate(0).validate(),
            Err(ControlError::InvalidRate { rate_hz: 0 })
        ));
        assert!(ControllerConfig::default().with_rate(10_001).validate().is_err());
    }

    #[test]
    fn test_period() {
        let config = ControllerConfig::default().with_rate(500);
        assert_eq!(config.period(), Duration::from_millis(2));
        assert_eq!(config.dt_sec(), 0.002);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{
            "rate_hz": 250,
            "horizon": { "mode": "tanh", "amplitude": 0.5, "slope": 2.0 },
            "feedback": {
                "error_alpha": [0.8, 0.8, 0.8, 0.8, 0.8, 0.8],
                "bias_threshold": [0.7, 0.7, 0.7, 0.7, 0.7, 0.7],
                "bias_step": [0.001, 0.001, 0.001, 0.001, 0.001, 0.001],
                "gain_threshold": [0.5, 0.5, 0.5, 0.5, 0.5, 0.5],
                "gain_step": [0.002, 0.002, 0.002, 0.002, 0.002, 0.002],
                "min_bias_sat": [-1.0, -1.0, -1.0, -1.0, -1.0, -1.0],
                "min_command_sat": [-1.0, -1.0, -1.0, -1.0, -1.0, -1.0],
                "error_type": "magnitude"
            }
        }"#;
        let config: ControllerConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.rate_hz, 250);
        assert_eq!(config.horizon, HorizonConfig::tanh(0.5, 2.0));
        assert_eq!(config.feedback.error_type, ErrorType::Magnitude);
        assert_eq!(config.motion_profile, MotionProfileConfig::default());
        assert_eq!(config.max_command, [1.0; 6]);
    }
}
