//! Command saturation profiles
//!
//! A motion profile maps the current (unpredicted) error norm to a per-axis multiplier
//! in `[0, max_command]`. Large errors get the full command; as the error shrinks the
//! multiplier falls toward a floor so the arm settles instead of overshooting.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MotionProfileConfig {
    /// Multiplier is always `max_command`
    Constant,
    /// `max_command * floor_ratio` below `lower_threshold`, `max_command` above
    /// `upper_threshold`, linear in between
    NegativeStep {
        floor_ratio: f64,
        upper_threshold: f64,
        lower_threshold: f64,
    },
    /// `max_command * tanh(slope * error)`
    Tanh { slope: f64 },
}

impl Default for MotionProfileConfig {
    fn default() -> Self {
        MotionProfileConfig::NegativeStep {
            floor_ratio: 0.25,
            upper_threshold: 0.4,
            lower_threshold: 0.1,
        }
    }
}

impl MotionProfileConfig {
    /// Multiplier for one axis given its group's current error norm
    pub fn multiplier(&self, error_norm: f64, max_command: f64) -> f64 {
        match *self {
            MotionProfileConfig::Constant => max_command,
            MotionProfileConfig::NegativeStep {
                floor_ratio,
                upper_threshold,
                lower_threshold,
            } => negative_step_decision_map(error_norm, max_command, floor_ratio, upper_threshold, lower_threshold),
            MotionProfileConfig::Tanh { slope } => tanh_decision_map(error_norm, max_command, slope),
        }
    }
}

/// Piecewise-linear step falling from `amplitude` to `amplitude * floor_ratio` as
/// `state` drops from `upper_threshold` to `lower_threshold`.
pub fn negative_step_decision_map(
    state: f64,
    amplitude: f64,
    floor_ratio: f64,
    upper_threshold: f64,
    lower_threshold: f64,
) -> f64 {
    let floor = amplitude * floor_ratio;
    if state >= upper_threshold {
        amplitude
    } else if state <= lower_threshold {
        floor
    } else {
        let t = (state - lower_threshold) / (upper_threshold - lower_threshold);
        floor + t * (amplitude - floor)
    }
}

/// Two-parameter scaled tanh
pub fn tanh_decision_map(state: f64, amplitude: f64, slope: f64) -> f64 {
    amplitude * (slope * state).tanh()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_negative_step_regions() {
        let m = |e| negative_step_decision_map(e, 8.0, 0.25, 0.4, 0.1);
        assert_eq!(m(1.0), 8.0);
        assert_eq!(m(0.4), 8.0);
        assert_eq!(m(0.05), 2.0);
        assert_eq!(m(0.1), 2.0);
        assert_relative_eq!(m(0.25), 5.0, epsilon = 1e-12);
    }

    #[test]
    fn test_negative_step_is_monotonic() {
        let profile = MotionProfileConfig::default();
        let mut last = 0.0;
        for k in 0..100 {
            let value = profile.multiplier(k as f64 * 0.01, 3.0);
            assert!(value >= last);
            assert!(value <= 3.0);
            last = value;
        }
    }

    #[test]
    fn test_constant_and_tanh() {
        assert_eq!(MotionProfileConfig::Constant.multiplier(0.0, 4.0), 4.0);
        let tanh = MotionProfileConfig::Tanh { slope: 10.0 };
        assert_eq!(tanh.multiplier(0.0, 4.0), 0.0);
        assert_relative_eq!(tanh.multiplier(5.0, 4.0), 4.0, epsilon = 1e-9);
    }

    #[test]
    fn test_profile_config_from_json() {
        let profile: MotionProfileConfig = serde_json::from_str(r#"{"kind": "tanh", "slope": 2.0}"#).unwrap();
        assert_eq!(profile, MotionProfileConfig::Tanh { slope: 2.0 });
    }
}
