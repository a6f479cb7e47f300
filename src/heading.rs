//! Heading derived from an estimated orientation
//!
//! The world "north" reference is projected onto the plane orthogonal to
//! "up", carried into the body frame through `Rᵀ`, and the angle of its
//! horizontal components is the heading. Roll and pitch do not enter the
//! projection, so the result isolates yaw.

use core::f64::consts::{PI, TAU};

use nalgebra::{Rotation3, Vector3};

use crate::math::Vector3Ext;

/// Heading in radians, range (−π, π]
///
/// # Arguments
/// * `rotation` - Estimated body-to-world rotation
/// * `north` - World-frame north reference (magnetic or true)
/// * `up` - World-frame up reference (unit length)
///
/// # Example
/// ```
/// use nalgebra::{Rotation3, Vector3};
/// use se3_fusion::heading::calculate_heading;
///
/// let heading = calculate_heading(&Rotation3::identity(), &Vector3::x(), &Vector3::z());
/// assert_eq!(heading, 0.0);
/// ```
pub fn calculate_heading(rotation: &Rotation3<f64>, north: &Vector3<f64>, up: &Vector3<f64>) -> f64 {
    let horizontal_north = north.reject_from(up).safe_normalize();
    let body_north = rotation.inverse() * horizontal_north;

    wrap_angle(body_north.y.atan2(body_north.x))
}

/// Replace the yaw of `rotation` with `yaw`, keeping its roll and pitch
///
/// Angles come from the Z-Y-X decomposition `Rz(yaw)·Ry(pitch)·Rx(roll)` of
/// the body-to-world rotation, so yaw turns about world z.
///
/// # Example
/// ```
/// use nalgebra::Rotation3;
/// use se3_fusion::heading::correct_yaw;
///
/// let tracked = Rotation3::from_euler_angles(0.1, -0.2, 1.0);
/// let (roll, pitch, yaw) = correct_yaw(&tracked, 0.4).euler_angles();
/// assert!((roll - 0.1).abs() < 1e-12 && (pitch + 0.2).abs() < 1e-12);
/// assert!((yaw - 0.4).abs() < 1e-12);
/// ```
pub fn correct_yaw(rotation: &Rotation3<f64>, yaw: f64) -> Rotation3<f64> {
    let (roll, pitch, _) = rotation.euler_angles();
    Rotation3::from_euler_angles(roll, pitch, wrap_angle(yaw))
}

/// Yaw of `rotation` in its Z-Y-X decomposition, range (−π, π]
pub fn yaw_angle(rotation: &Rotation3<f64>) -> f64 {
    wrap_angle(rotation.euler_angles().2)
}

/// Map an angle into (−π, π]
pub fn wrap_angle(angle: f64) -> f64 {
    let wrapped = (angle + PI).rem_euclid(TAU) - PI;
    if wrapped <= -PI { wrapped + TAU } else { wrapped }
}
