//! Spatial quantities: poses, twists and wrenches
//!
//! All quantities are expressed in the base frame of the kinematic chain unless a
//! function says otherwise. Six-dimensional vectors follow the `[linear; angular]`
//! ordering everywhere in the workspace.

use std::ops::{Add, Mul, Neg, Sub};

use nalgebra::{Matrix3, Rotation3, Vector3, Vector6};

/// Position + orientation of a frame relative to a reference frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub position: Vector3<f64>,
    pub rotation: Rotation3<f64>,
}

impl Default for Pose {
    fn default() -> Self {
        Self::identity()
    }
}

impl Pose {
    pub fn new(position: Vector3<f64>, rotation: Rotation3<f64>) -> Self {
        Self { position, rotation }
    }

    pub fn identity() -> Self {
        Self {
            position: Vector3::zeros(),
            rotation: Rotation3::identity(),
        }
    }

    pub fn from_translation(x: f64, y: f64, z: f64) -> Self {
        Self {
            position: Vector3::new(x, y, z),
            rotation: Rotation3::identity(),
        }
    }

    /// Build a pose from `[x, y, z, r11, r12, r13, r21, r22, r23, r31, r32, r33]`.
    ///
    /// The rotation block is read row by row and re-orthonormalized, so matrices typed
    /// in with a handful of decimals still yield a proper rotation.
    pub fn from_row_major(values: &[f64; 12]) -> Self {
        let m = Matrix3::new(
            values[3], values[4], values[5],
            values[6], values[7], values[8],
            values[9], values[10], values[11],
        );
        Self {
            position: Vector3::new(values[0], values[1], values[2]),
            rotation: Rotation3::from_matrix(&m),
        }
    }
}

/// 6D velocity (or velocity increment) of a frame
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Twist {
    pub linear: Vector3<f64>,
    pub angular: Vector3<f64>,
}

impl Twist {
    pub fn new(linear: Vector3<f64>, angular: Vector3<f64>) -> Self {
        Self { linear, angular }
    }

    pub fn zero() -> Self {
        Self::default()
    }

    pub fn from_vector(v: &Vector6<f64>) -> Self {
        Self {
            linear: Vector3::new(v[0], v[1], v[2]),
            angular: Vector3::new(v[3], v[4], v[5]),
        }
    }

    pub fn to_vector(&self) -> Vector6<f64> {
        Vector6::new(
            self.linear.x, self.linear.y, self.linear.z,
            self.angular.x, self.angular.y, self.angular.z,
        )
    }

    /// Component access in `[linear; angular]` order
    pub fn component(&self, index: usize) -> f64 {
        if index < 3 {
            self.linear[index]
        } else {
            self.angular[index - 3]
        }
    }

    pub fn is_zero(&self) -> bool {
        self.linear == Vector3::zeros() && self.angular == Vector3::zeros()
    }
}

impl Add for Twist {
    type Output = Twist;

    fn add(self, rhs: Twist) -> Twist {
        Twist::new(self.linear + rhs.linear, self.angular + rhs.angular)
    }
}

impl Sub for Twist {
    type Output = Twist;

    fn sub(self, rhs: Twist) -> Twist {
        Twist::new(self.linear - rhs.linear, self.angular - rhs.angular)
    }
}

impl Neg for Twist {
    type Output = Twist;

    fn neg(self) -> Twist {
        Twist::new(-self.linear, -self.angular)
    }
}

impl Mul<f64> for Twist {
    type Output = Twist;

    fn mul(self, scale: f64) -> Twist {
        Twist::new(self.linear * scale, self.angular * scale)
    }
}

/// 6D force + torque acting on a segment
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Wrench {
    pub force: Vector3<f64>,
    pub torque: Vector3<f64>,
}

impl Wrench {
    pub fn new(force: Vector3<f64>, torque: Vector3<f64>) -> Self {
        Self { force, torque }
    }

    pub fn zero() -> Self {
        Self::default()
    }

    pub fn from_vector(v: &Vector6<f64>) -> Self {
        Self {
            force: Vector3::new(v[0], v[1], v[2]),
            torque: Vector3::new(v[3], v[4], v[5]),
        }
    }

    pub fn to_vector(&self) -> Vector6<f64> {
        Vector6::new(
            self.force.x, self.force.y, self.force.z,
            self.torque.x, self.torque.y, self.torque.z,
        )
    }

    pub fn set_component(&mut self, index: usize, value: f64) {
        if index < 3 {
            self.force[index] = value;
        } else {
            self.torque[index - 3] = value;
        }
    }
}
