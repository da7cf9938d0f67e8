use nalgebra::{
    Isometry3, Matrix3, Matrix4, Quaternion, Rotation3, Translation3, UnitQuaternion, Vector3,
};

use std::{f64::consts::FRAC_PI_2, ops};

/// Column names of the relative pose labels, in storage order.
pub const LABEL_COLUMNS: [&str; 6] = ["euler_x", "euler_y", "euler_z", "t_x", "t_y", "t_z"];

/// Rotation and translation delta between frames `i` and `i + 1`.
///
/// The rotation is stored as x-y-z Euler angles (`R = Rz * Ry * Rx`) and the
/// translation is expressed in the frame of pose `i`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RelativePose {
    pub euler: Vector3<f64>,
    pub translation: Vector3<f64>,
}

impl Default for RelativePose {
    fn default() -> Self {
        Self::zero()
    }
}

impl RelativePose {
    pub fn new(euler: Vector3<f64>, translation: Vector3<f64>) -> Self {
        Self { euler, translation }
    }

    /// No motion.
    pub fn zero() -> Self {
        Self {
            euler: Vector3::zeros(),
            translation: Vector3::zeros(),
        }
    }

    /// Creates the record from `[euler_x, euler_y, euler_z, t_x, t_y, t_z]`.
    pub fn from_array(values: [f64; 6]) -> Self {
        Self {
            euler: Vector3::new(values[0], values[1], values[2]),
            translation: Vector3::new(values[3], values[4], values[5]),
        }
    }

    /// Values in `LABEL_COLUMNS` order.
    pub fn to_array(&self) -> [f64; 6] {
        [
            self.euler[0],
            self.euler[1],
            self.euler[2],
            self.translation[0],
            self.translation[1],
            self.translation[2],
        ]
    }

    pub fn is_finite(&self) -> bool {
        self.to_array().iter().all(|v| v.is_finite())
    }
}

/// Rigid transform, used for absolute poses (camera to world).
#[derive(Clone, Debug, PartialEq)]
pub struct Transform(Isometry3<f64>);

impl Default for Transform {
    fn default() -> Self {
        Self::eye()
    }
}

impl Transform {
    pub fn eye() -> Self {
        Self(Isometry3::identity())
    }

    /// Creates a transform from a translation and a (not necessarily normalized) quaternion.
    pub fn new(translation: &Vector3<f64>, rotation: &Quaternion<f64>) -> Self {
        Self(Isometry3::from_parts(
            Translation3::from(*translation),
            UnitQuaternion::from_quaternion(*rotation),
        ))
    }

    pub fn from_parts(translation: &Vector3<f64>, rotation: UnitQuaternion<f64>) -> Self {
        Self(Isometry3::from_parts(Translation3::from(*translation), rotation))
    }

    pub fn from_isometry(isometry: Isometry3<f64>) -> Self {
        Self(isometry)
    }

    pub fn from_matrix4(matrix: &Matrix4<f64>) -> Self {
        let translation = Vector3::new(matrix[(0, 3)], matrix[(1, 3)], matrix[(2, 3)]);
        let rotation = UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix(
            &matrix.fixed_slice::<3, 3>(0, 0).into_owned(),
        ));
        Self::from_parts(&translation, rotation)
    }

    /// Transform that applies the relative motion `relative`.
    pub fn from_relative(relative: &RelativePose) -> Self {
        Self::from_parts(&relative.translation, euler_to_quaternion(&relative.euler))
    }

    /// Expresses this transform as a relative pose record.
    pub fn to_relative(&self) -> RelativePose {
        RelativePose {
            euler: quaternion_to_euler(&self.0.rotation),
            translation: self.translation(),
        }
    }

    pub fn inverse(&self) -> Self {
        Self(self.0.inverse())
    }

    pub fn translation(&self) -> Vector3<f64> {
        self.0.translation.vector
    }

    pub fn rotation(&self) -> UnitQuaternion<f64> {
        self.0.rotation
    }

    /// Rotation angle in radians.
    pub fn angle(&self) -> f64 {
        self.0.rotation.angle()
    }

    pub fn isometry(&self) -> &Isometry3<f64> {
        &self.0
    }

    pub fn is_finite(&self) -> bool {
        self.0.translation.vector.iter().all(|v| v.is_finite())
            && self.0.rotation.coords.iter().all(|v| v.is_finite())
    }
}

impl ops::Mul<&Vector3<f64>> for &Transform {
    type Output = Vector3<f64>;

    fn mul(self, rhs: &Vector3<f64>) -> Self::Output {
        self.0.transform_point(&(*rhs).into()).coords
    }
}

impl ops::Mul<&Transform> for &Transform {
    type Output = Transform;

    fn mul(self, rhs: &Transform) -> Self::Output {
        Transform(self.0 * rhs.0)
    }
}

impl From<Transform> for Matrix4<f64> {
    fn from(transform: Transform) -> Self {
        transform.0.to_homogeneous()
    }
}

/// Converts x-y-z Euler angles into a unit quaternion.
pub fn euler_to_quaternion(euler: &Vector3<f64>) -> UnitQuaternion<f64> {
    UnitQuaternion::from_euler_angles(euler[0], euler[1], euler[2])
}

/// Converts a unit quaternion into x-y-z Euler angles.
///
/// Near `|euler_y| = pi/2` (gimbal lock) the x and z angles are not unique and
/// the returned split between them is arbitrary; the rotation itself is still
/// reproduced. Use [`is_near_gimbal_lock`] to detect it.
pub fn quaternion_to_euler(rotation: &UnitQuaternion<f64>) -> Vector3<f64> {
    let (x, y, z) = rotation.euler_angles();
    Vector3::new(x, y, z)
}

pub fn euler_to_matrix(euler: &Vector3<f64>) -> Matrix3<f64> {
    Rotation3::from_euler_angles(euler[0], euler[1], euler[2]).into_inner()
}

/// Converts a rotation matrix into x-y-z Euler angles. Same singularity as
/// [`quaternion_to_euler`].
pub fn matrix_to_euler(matrix: &Matrix3<f64>) -> Vector3<f64> {
    let (x, y, z) = Rotation3::from_matrix_unchecked(*matrix).euler_angles();
    Vector3::new(x, y, z)
}

/// Whether the middle Euler angle is within `tolerance` of the singular configuration.
pub fn is_near_gimbal_lock(euler: &Vector3<f64>, tolerance: f64) -> bool {
    (euler[1].abs() - FRAC_PI_2).abs() < tolerance
}

/// Applies `relative_b` in the frame of `pose_a` and returns the resulting pose in world frame.
pub fn compose(pose_a: &Transform, relative_b: &RelativePose) -> Transform {
    pose_a * &Transform::from_relative(relative_b)
}

/// Relative motion taking `pose_a` into `pose_b`. Inverse of [`compose`].
pub fn relative_between(pose_a: &Transform, pose_b: &Transform) -> RelativePose {
    (&pose_a.inverse() * pose_b).to_relative()
}
