//! Scalar integration rules for joint-space prediction
//!
//! Both rules integrate acceleration -> velocity -> position for a single joint over one
//! step. The joint-space predictor and the safety look-ahead call these directly, so a
//! value integrated standalone matches the vectorized loop bit for bit.

use serde::{Deserialize, Serialize};

/// Integration scheme for joint-space state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum IntegrationMethod {
    /// Heun-style scheme: half-step prediction, then correction with the averaged
    /// derivative.
    PredictorCorrector,
    /// Semi-implicit Euler. Velocity is updated first, then position with the NEW
    /// velocity. First order, but stable for stiff systems, so it is the runtime default.
    #[default]
    SymplecticEuler,
}

impl IntegrationMethod {
    /// Velocity after one step.
    ///
    /// For the predictor-corrector scheme `acceleration` is the averaged acceleration
    /// of the step.
    #[inline]
    pub fn integrate_to_velocity(&self, acceleration: f64, current_velocity: f64, dt_sec: f64) -> f64 {
        match self {
            IntegrationMethod::SymplecticEuler | IntegrationMethod::PredictorCorrector => {
                current_velocity + acceleration * dt_sec
            }
        }
    }

    /// Position after one step, given the already integrated velocity.
    #[inline]
    pub fn integrate_to_position(
        &self,
        acceleration: f64,
        predicted_velocity: f64,
        current_position: f64,
        dt_sec: f64,
    ) -> f64 {
        match self {
            IntegrationMethod::SymplecticEuler => current_position + predicted_velocity * dt_sec,
            // Trapezoid of old and new velocity: v_old = v_new - a*dt
            IntegrationMethod::PredictorCorrector => {
                current_position + (predicted_velocity - 0.5 * acceleration * dt_sec) * dt_sec
            }
        }
    }
}
