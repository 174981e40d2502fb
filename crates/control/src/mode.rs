//! Control mode negotiation with the safety module

use log::warn;
use robotcore::{ControlError, ControlMode, ControlModeDecision, Result};

/// Turn the mode the safety module applied into a decision for the requested mode.
///
/// - Same mode: safe.
/// - Downgrade to velocity or position: warning, loop continues.
/// - Stop motion: fatal.
/// - Anything above the request breaks the safety contract: fatal.
pub fn negotiate(requested: ControlMode, applied: ControlMode) -> Result<ControlModeDecision> {
    let decision = ControlModeDecision {
        interface: requested,
        is_safe: applied == requested,
    };

    if applied > requested {
        return Err(ControlError::SafetyUpgrade {
            requested,
            returned: applied,
        });
    }

    match applied {
        ControlMode::Torque => Ok(decision),
        ControlMode::Velocity | ControlMode::Position => {
            if !decision.is_safe {
                warn!("Control switched to {}", applied.label());
            }
            Ok(decision)
        }
        ControlMode::StopMotion => Err(ControlError::SafetyStop { requested }),
    }
}
