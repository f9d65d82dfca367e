//! 2D and 3D rigid-body poses with their Lie group maps.
//!
//! Tangent vectors are ordered rotation-last for SE(2) `[vx, vy, ω]` and
//! rotation-first for SE(3) `[ωx, ωy, ωz, vx, vy, vz]`. Information
//! matrices attached to factors use the same ordering.

use nalgebra::{DVector, Isometry3, Matrix3, Translation3, UnitQuaternion, Vector3};

use super::values::Value;

/// Small angle threshold below which first-order expansions are used.
const SMALL_ANGLE: f64 = 1e-10;

/// Normalize angle to [-π, π].
pub fn normalize_angle(angle: f64) -> f64 {
    let mut a = angle % (2.0 * std::f64::consts::PI);
    if a > std::f64::consts::PI {
        a -= 2.0 * std::f64::consts::PI;
    } else if a < -std::f64::consts::PI {
        a += 2.0 * std::f64::consts::PI;
    }
    a
}

/// Operations a pose type must provide for optimization and consistency
/// checking.
pub trait LiePose: Copy + std::fmt::Debug + PartialEq + Send + Sync + 'static {
    /// Tangent space dimension.
    const DIM: usize;

    /// Identity transform.
    fn identity() -> Self;

    /// `self * other`.
    fn compose(&self, other: &Self) -> Self;

    /// Inverse transform.
    fn inverse(&self) -> Self;

    /// Logarithm map to the tangent space.
    fn log(&self) -> DVector<f64>;

    /// Exponential map from the tangent space. `xi` must have `DIM` entries.
    fn exp(xi: &[f64]) -> Self;

    /// Translation magnitude in meters.
    fn translation_norm(&self) -> f64;

    /// Rotation magnitude in radians.
    fn rotation_angle(&self) -> f64;

    /// Extract this pose type from a variable value.
    fn from_value(value: &Value) -> Option<Self>;

    /// Wrap this pose into a variable value.
    fn into_value(self) -> Value;

    /// Relative transform `self⁻¹ * other`.
    fn between(&self, other: &Self) -> Self {
        self.inverse().compose(other)
    }

    /// Right perturbation `self * exp(delta)`.
    fn retract(&self, delta: &[f64]) -> Self {
        self.compose(&Self::exp(delta))
    }
}

/// A 2D pose representing position and orientation.
///
/// Theta is kept in [-π, π], counter-clockwise positive from the X axis.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Pose2D {
    /// X position in meters.
    pub x: f64,
    /// Y position in meters.
    pub y: f64,
    /// Heading angle in radians.
    pub theta: f64,
}

impl Pose2D {
    /// Create a new pose, normalizing theta.
    #[inline]
    pub fn new(x: f64, y: f64, theta: f64) -> Self {
        Self {
            x,
            y,
            theta: normalize_angle(theta),
        }
    }

    #[inline]
    fn rotate(&self, x: f64, y: f64) -> (f64, f64) {
        let (sin, cos) = self.theta.sin_cos();
        (x * cos - y * sin, x * sin + y * cos)
    }

    #[inline]
    fn unrotate(&self, x: f64, y: f64) -> (f64, f64) {
        let (sin, cos) = self.theta.sin_cos();
        (x * cos + y * sin, -x * sin + y * cos)
    }
}

impl LiePose for Pose2D {
    const DIM: usize = 3;

    fn identity() -> Self {
        Self::default()
    }

    fn compose(&self, other: &Self) -> Self {
        let (dx, dy) = self.rotate(other.x, other.y);
        Self::new(self.x + dx, self.y + dy, self.theta + other.theta)
    }

    fn inverse(&self) -> Self {
        let (x, y) = self.unrotate(-self.x, -self.y);
        Self::new(x, y, -self.theta)
    }

    fn log(&self) -> DVector<f64> {
        let w = self.theta;
        if w.abs() < SMALL_ANGLE {
            return DVector::from_vec(vec![self.x, self.y, w]);
        }
        let (s, c) = w.sin_cos();
        let c_1 = c - 1.0;
        let det = c_1 * c_1 + s * s;
        // R(π/2) * (Rᵀ t - t)
        let (ux, uy) = self.unrotate(self.x, self.y);
        let (px, py) = (-(uy - self.y), ux - self.x);
        DVector::from_vec(vec![w / det * px, w / det * py, w])
    }

    fn exp(xi: &[f64]) -> Self {
        let (vx, vy, w) = (xi[0], xi[1], xi[2]);
        if w.abs() < SMALL_ANGLE {
            return Self::new(vx, vy, w);
        }
        let rot = Self::new(0.0, 0.0, w);
        // v rotated by π/2 points towards the rotation center
        let (ox, oy) = (-vy, vx);
        let (rx, ry) = rot.rotate(ox, oy);
        Self::new((ox - rx) / w, (oy - ry) / w, w)
    }

    fn translation_norm(&self) -> f64 {
        self.x.hypot(self.y)
    }

    fn rotation_angle(&self) -> f64 {
        self.theta.abs()
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Pose2(p) => Some(*p),
            Value::Pose3(_) => None,
        }
    }

    fn into_value(self) -> Value {
        Value::Pose2(self)
    }
}

/// A 3D pose backed by a nalgebra isometry.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Pose3D(pub Isometry3<f64>);

impl Pose3D {
    /// Create a pose from a translation and a rotation quaternion.
    pub fn new(translation: Vector3<f64>, rotation: UnitQuaternion<f64>) -> Self {
        Self(Isometry3::from_parts(Translation3::from(translation), rotation))
    }

    /// Create a pose from a translation and roll/pitch/yaw angles.
    pub fn from_xyz_rpy(x: f64, y: f64, z: f64, roll: f64, pitch: f64, yaw: f64) -> Self {
        Self::new(
            Vector3::new(x, y, z),
            UnitQuaternion::from_euler_angles(roll, pitch, yaw),
        )
    }

    /// Translation vector.
    pub fn translation(&self) -> Vector3<f64> {
        self.0.translation.vector
    }

    /// Rotation quaternion.
    pub fn rotation(&self) -> UnitQuaternion<f64> {
        self.0.rotation
    }
}

/// Skew-symmetric matrix [v]× such that [v]× u = v × u.
#[inline]
fn skew(v: &Vector3<f64>) -> Matrix3<f64> {
    Matrix3::new(0.0, -v.z, v.y, v.z, 0.0, -v.x, -v.y, v.x, 0.0)
}

impl LiePose for Pose3D {
    const DIM: usize = 6;

    fn identity() -> Self {
        Self(Isometry3::identity())
    }

    fn compose(&self, other: &Self) -> Self {
        Self(self.0 * other.0)
    }

    fn inverse(&self) -> Self {
        Self(self.0.inverse())
    }

    fn log(&self) -> DVector<f64> {
        let w = self.0.rotation.scaled_axis();
        let t = self.translation();
        let theta = w.norm();
        let v = if theta < SMALL_ANGLE {
            t - 0.5 * w.cross(&t)
        } else {
            let w_hat = skew(&w);
            let coeff = 1.0 / (theta * theta)
                - (1.0 + theta.cos()) / (2.0 * theta * theta.sin());
            let v_inv = Matrix3::identity() - 0.5 * w_hat + coeff * w_hat * w_hat;
            v_inv * t
        };
        DVector::from_vec(vec![w.x, w.y, w.z, v.x, v.y, v.z])
    }

    fn exp(xi: &[f64]) -> Self {
        let w = Vector3::new(xi[0], xi[1], xi[2]);
        let v = Vector3::new(xi[3], xi[4], xi[5]);
        let theta = w.norm();
        let rotation = UnitQuaternion::from_scaled_axis(w);
        let t = if theta < SMALL_ANGLE {
            v + 0.5 * w.cross(&v)
        } else {
            let w_hat = skew(&w);
            let theta_sq = theta * theta;
            let v_mat = Matrix3::identity()
                + ((1.0 - theta.cos()) / theta_sq) * w_hat
                + ((theta - theta.sin()) / (theta_sq * theta)) * w_hat * w_hat;
            v_mat * v
        };
        Self::new(t, rotation)
    }

    fn translation_norm(&self) -> f64 {
        self.translation().norm()
    }

    fn rotation_angle(&self) -> f64 {
        self.0.rotation.angle()
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Pose3(p) => Some(*p),
            Value::Pose2(_) => None,
        }
    }

    fn into_value(self) -> Value {
        Value::Pose3(self)
    }
}
