//! Adaptive error feedback
//!
//! The controller treats the feedback law as a black box behind [`AdaptiveFeedback`]:
//! a 6D error goes in, a 6D command in `[min_command_sat, 1]` comes out. The per-axis
//! parameters mirror the adaptive bias/gain family of laws.
//!
//! [`FilteredProportional`] is the bundled reference module.

use nalgebra::Vector6;
use serde::{Deserialize, Serialize};

/// How the raw error enters the low-pass filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    /// Error value as is
    Magnitude,
    /// Only the sign of the error (-1, 0, 1)
    #[default]
    Sign,
}

/// Per-axis parameters of an adaptive feedback module
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackConfig {
    /// Low-pass filter pole for the error, in [0, 1)
    pub error_alpha: [f64; 6],
    /// Filtered error magnitude above which the bias adapts
    pub bias_threshold: [f64; 6],
    /// Bias increment per cycle
    pub bias_step: [f64; 6],
    /// Filtered error magnitude above which the gain grows (and below which it decays)
    pub gain_threshold: [f64; 6],
    /// Gain increment / decrement per cycle
    pub gain_step: [f64; 6],
    /// Lower saturation of the bias
    pub min_bias_sat: [f64; 6],
    /// Lower saturation of the command (upper is always 1)
    pub min_command_sat: [f64; 6],
    pub error_type: ErrorType,
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            error_alpha: [0.9; 6],
            bias_threshold: [0.75; 6],
            bias_step: [0.0005; 6],
            gain_threshold: [0.5; 6],
            gain_step: [0.003; 6],
            min_bias_sat: [-1.0; 6],
            min_command_sat: [-1.0; 6],
            error_type: ErrorType::Sign,
        }
    }
}

impl FeedbackConfig {
    /// Set the error filter pole per axis
    pub fn with_error_alpha(mut self, error_alpha: [f64; 6]) -> Self {
        self.error_alpha = error_alpha;
        self
    }

    /// Set bias adaptation threshold and step
    pub fn with_bias(mut self, threshold: [f64; 6], step: [f64; 6]) -> Self {
        self.bias_threshold = threshold;
        self.bias_step = step;
        self
    }

    /// Set gain adaptation threshold and step
    pub fn with_gain(mut self, threshold: [f64; 6], step: [f64; 6]) -> Self {
        self.gain_threshold = threshold;
        self.gain_step = step;
        self
    }

    /// Set lower saturation of bias and command
    pub fn with_saturation(mut self, min_bias_sat: [f64; 6], min_command_sat: [f64; 6]) -> Self {
        self.min_bias_sat = min_bias_sat;
        self.min_command_sat = min_command_sat;
        self
    }

    /// Set how the error enters the filter
    pub fn with_error_type(mut self, error_type: ErrorType) -> Self {
        self.error_type = error_type;
        self
    }
}

/// Contract of an adaptive feedback module
pub trait AdaptiveFeedback {
    /// Advance one cycle with `error` and return the new command.
    fn update(&mut self, error: &Vector6<f64>) -> Vector6<f64>;

    fn set_config(&mut self, config: FeedbackConfig);
    fn config(&self) -> &FeedbackConfig;

    /// Forget the internal state, keeping the configuration.
    fn reset(&mut self);

    // Diagnostics
    fn error(&self) -> Vector6<f64>;
    fn bias(&self) -> Vector6<f64>;
    fn gain(&self) -> Vector6<f64>;
    fn command(&self) -> Vector6<f64>;
}

/// Low-pass filtered proportional law with slowly adapting bias and gain.
///
/// Per axis `i`, each update:
/// ```text
/// e      = alpha * e + (1 - alpha) * input        (input = error or sign(error))
/// bias  += bias_step * sign(e)      if |e| > bias_threshold
/// gain  += gain_step                if |e| > gain_threshold, else -= gain_step
/// u      = clamp(bias + gain * e, min_command_sat, 1)
/// ```
/// with `bias` kept in `[min_bias_sat, 1]` and `gain` in `[0, 1]`.
#[derive(Debug, Clone)]
pub struct FilteredProportional {
    config: FeedbackConfig,
    error: Vector6<f64>,
    bias: Vector6<f64>,
    gain: Vector6<f64>,
    command: Vector6<f64>,
}

impl FilteredProportional {
    pub fn new(config: FeedbackConfig) -> Self {
        Self {
            config,
            error: Vector6::zeros(),
            bias: Vector6::zeros(),
            gain: Vector6::zeros(),
            command: Vector6::zeros(),
        }
    }
}

impl Default for FilteredProportional {
    fn default() -> Self {
        Self::new(FeedbackConfig::default())
    }
}

fn sign(value: f64) -> f64 {
    if value > 0.0 {
        1.0
    } else if value < 0.0 {
        -1.0
    } else {
        0.0
    }
}

impl AdaptiveFeedback for FilteredProportional {
    fn update(&mut self, error: &Vector6<f64>) -> Vector6<f64> {
        let c = &self.config;
        for i in 0..6 {
            let input = match c.error_type {
                ErrorType::Magnitude => error[i],
                ErrorType::Sign => sign(error[i]),
            };
            let alpha = c.error_alpha[i];
            self.error[i] = alpha * self.error[i] + (1.0 - alpha) * input;
            let filtered = self.error[i];

            if filtered.abs() > c.bias_threshold[i] {
                self.bias[i] += c.bias_step[i] * sign(filtered);
            }
            self.bias[i] = self.bias[i].clamp(c.min_bias_sat[i], 1.0);

            if filtered.abs() > c.gain_threshold[i] {
                self.gain[i] += c.gain_step[i];
            } else {
                self.gain[i] -= c.gain_step[i];
            }
            self.gain[i] = self.gain[i].clamp(0.0, 1.0);

            self.command[i] = (self.bias[i] + self.gain[i] * filtered).clamp(c.min_command_sat[i], 1.0);
        }
        self.command
    }

    fn set_config(&mut self, config: FeedbackConfig) {
        self.config = config;
    }

    fn config(&self) -> &FeedbackConfig {
        &self.config
    }

    fn reset(&mut self) {
        self.error = Vector6::zeros();
        self.bias = Vector6::zeros();
        self.gain = Vector6::zeros();
        self.command = Vector6::zeros();
    }

    fn error(&self) -> Vector6<f64> {
        self.error
    }

    fn bias(&self) -> Vector6<f64> {
        self.bias
    }

    fn gain(&self) -> Vector6<f64> {
        self.gain
    }

    fn command(&self) -> Vector6<f64> {
        self.command
    }
}
