//! Mathematical utilities and nalgebra extensions for the SE(3) fusion library

use nalgebra::{Matrix3, Vector3};

/// Mathematical constants
pub const DEG_TO_RAD: f64 = core::f64::consts::PI / 180.0;
pub const RAD_TO_DEG: f64 = 180.0 / core::f64::consts::PI;

/// Norm below which a vector is treated as degenerate
pub const EPSILON: f64 = 1e-12;

/// Extension trait for Vector3 operations
pub trait Vector3Ext {
    /// Normalize the vector, leaving it unchanged when its norm is below
    /// [`EPSILON`]
    fn safe_normalize(&self) -> Vector3<f64>;

    /// Skew-symmetric matrix `[v]×` such that `[v]× u = v × u`
    fn skew(&self) -> Matrix3<f64>;

    /// Component of the vector orthogonal to `axis` (assumed unit length)
    fn reject_from(&self, axis: &Vector3<f64>) -> Vector3<f64>;

    /// Convert degrees to radians
    fn deg_to_rad(&self) -> Vector3<f64>;

    /// Convert radians to degrees
    fn rad_to_deg(&self) -> Vector3<f64>;
}

impl Vector3Ext for Vector3<f64> {
    fn safe_normalize(&self) -> Vector3<f64> {
        let norm = self.norm();
        if norm > EPSILON { *self / norm } else { *self }
    }

    #[rustfmt::skip]
    fn skew(&self) -> Matrix3<f64> {
        Matrix3::new(
            0.0,     -self.z,  self.y,
            self.z,   0.0,    -self.x,
            -self.y,  self.x,  0.0,
        )
    }

    fn reject_from(&self, axis: &Vector3<f64>) -> Vector3<f64> {
        *self - *axis * self.dot(axis)
    }

    fn deg_to_rad(&self) -> Vector3<f64> {
        *self * DEG_TO_RAD
    }

    fn rad_to_deg(&self) -> Vector3<f64> {
        *self * RAD_TO_DEG
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_normalize() {
        let v = Vector3::new(3.0, 4.0, 0.0);
        let normalized = v.safe_normalize();
        assert!((normalized.norm() - 1.0).abs() < 1e-12);
        assert!((normalized - Vector3::new(0.6, 0.8, 0.0)).norm() < 1e-12);
    }

    #[test]
    fn test_safe_normalize_degenerate_is_noop() {
        let tiny = Vector3::new(1e-14, -1e-14, 0.0);
        assert_eq!(tiny.safe_normalize(), tiny);

        let zero = Vector3::<f64>::zeros();
        assert_eq!(zero.safe_normalize(), zero);
    }

    #[test]
    fn test_skew_matches_cross_product() {
        let v = Vector3::new(1.0, 2.0, 3.0);
        let u = Vector3::new(-4.0, 5.0, 0.5);

        assert!((v.skew() * u - v.cross(&u)).norm() < 1e-12);
        assert_eq!(v.skew(), -v.skew().transpose());
    }

    #[test]
    fn test_reject_from_removes_axis_component() {
        let up = Vector3::z();
        let v = Vector3::new(0.6, 0.0, -0.8);
        let horizontal = v.reject_from(&up);

        assert_eq!(horizontal, Vector3::new(0.6, 0.0, 0.0));
    }

    #[test]
    fn test_angle_conversion() {
        let degrees = Vector3::new(90.0, -180.0, 45.0);
        let recovered = degrees.deg_to_rad().rad_to_deg();
        assert!((degrees - recovered).norm() < 1e-12);
        assert!((degrees.deg_to_rad().x - core::f64::consts::FRAC_PI_2).abs() < 1e-12);
    }
}
