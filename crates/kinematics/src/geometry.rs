//! Exponential / logarithmic maps and pose arithmetic
//!
//! Provides:
//! - SO(3) exponential and logarithmic maps
//! - One-step pose integration by a time-scaled twist
//! - Decoupled displacement twist between two poses

use std::f64::consts::PI;

use nalgebra::{Rotation3, Vector3};
use robotcore::{Pose, Twist};

/// Rotation magnitudes below this are integrated as pure translation
pub const MIN_ROTATION_NORM: f64 = 1e-10;

/// Below this angle the log map uses its first-order expansion
const SMALL_ANGLE: f64 = 1e-8;
/// Within this distance of pi the axis is recovered from the symmetric part
const NEAR_PI: f64 = 1e-6;

/// Exponential map: rotation vector (axis * angle) to rotation matrix
pub fn exp_map_so3(rotation_vector: &Vector3<f64>) -> Rotation3<f64> {
    Rotation3::new(*rotation_vector)
}

/// Logarithmic map: rotation matrix to geodesic rotation vector, angle in [0, pi]
pub fn log_map_so3(rotation: &Rotation3<f64>) -> Vector3<f64> {
    let m = rotation.matrix();
    let cos_angle = ((m.trace() - 1.0) * 0.5).clamp(-1.0, 1.0);
    let angle = cos_angle.acos();

    // Twice the axis scaled by sin(angle)
    let skew = Vector3::new(
        m[(2, 1)] - m[(1, 2)],
        m[(0, 2)] - m[(2, 0)],
        m[(1, 0)] - m[(0, 1)],
    );

    if angle < SMALL_ANGLE {
        return skew * 0.5;
    }

    if PI - angle < NEAR_PI {
        // Symmetric part: cos*I + (1 - cos) * n * n^T
        let one_minus_cos = 1.0 - cos_angle;
        let k = (0..3)
            .max_by(|&a, &b| m[(a, a)].total_cmp(&m[(b, b)]))
            .unwrap_or(0);
        let n_k = ((m[(k, k)] - cos_angle) / one_minus_cos).max(0.0).sqrt();
        let mut axis = Vector3::zeros();
        for j in 0..3 {
            axis[j] = if j == k {
                n_k
            } else {
                (m[(j, k)] + m[(k, j)]) / (2.0 * one_minus_cos * n_k)
            };
        }
        let axis = axis.normalize();
        // Sign follows the antisymmetric part so log(R^T) == -log(R)
        let sign = if skew.dot(&axis) < 0.0 { -1.0 } else { 1.0 };
        return axis * (sign * angle);
    }

    skew * (angle / (2.0 * angle.sin()))
}

/// Wrap an angle into (-pi, pi].
pub fn wrap_angle(angle: f64) -> f64 {
    let wrapped = (angle + PI).rem_euclid(2.0 * PI) - PI;
    if wrapped <= -PI { wrapped + 2.0 * PI } else { wrapped }
}

/// Integrate `current_pose` by a twist that is already scaled with the time step.
///
/// The linear part is added to the position. The angular part is skipped below
/// [`MIN_ROTATION_NORM`]; otherwise its exponential is composed onto the rotation from
/// the left, as the twist is expressed in the base frame. With `rescale_rotation` an
/// angle above pi is wrapped back into (-pi, pi], and `twist` is rescaled in place.
pub fn integrate_pose(current_pose: &Pose, twist: &mut Twist, rescale_rotation: bool) -> Pose {
    let mut pose = Pose::new(current_pose.position + twist.linear, current_pose.rotation);

    let angle = twist.angular.norm();
    if angle < MIN_ROTATION_NORM {
        return pose;
    }

    if rescale_rotation && angle > PI {
        let wrapped = wrap_angle(angle);
        twist.angular *= wrapped / angle;
        if wrapped.abs() < MIN_ROTATION_NORM {
            return pose;
        }
    }

    pose.rotation = exp_map_so3(&twist.angular) * current_pose.rotation;
    pose
}

/// Displacement twist taking pose `b` to pose `a`.
///
/// Decoupled calculation: the linear part is the plain position difference, not the
/// twist-consistent one. The angular part is the log map of `R_a * R_b^-1`, i.e. the
/// rotation from `b` to `a` expressed in the base frame.
pub fn displacement_twist(a: &Pose, b: &Pose) -> Twist {
    let relative = a.rotation * b.rotation.inverse();
    Twist::new(a.position - b.position, log_map_so3(&relative))
}
