//! SO(3) exponential and logarithm maps
//!
//! Both maps use the closed-form Rodrigues formula. Rotation vectors are
//! axis-angle: direction is the rotation axis, norm the angle in radians.

use nalgebra::{Matrix3, Rotation3, Vector3};

use crate::math::{EPSILON, Vector3Ext};

/// Angles closer than this to π use the symmetric-part axis extraction
const NEAR_PI: f64 = 1e-6;

/// Exponential map: rotation vector to rotation matrix
///
/// ```text
/// exp(w) = I + sin θ/θ [w]× + (1 − cos θ)/θ² [w]×²,   θ = |w|
/// ```
///
/// Returns identity for `|w| < 1e-12`.
///
/// # Example
/// ```
/// use nalgebra::Vector3;
/// use se3_fusion::so3;
///
/// let r = so3::exp(&Vector3::new(0.0, 0.0, core::f64::consts::FRAC_PI_2));
/// assert!((r * Vector3::x() - Vector3::y()).norm() < 1e-12);
/// ```
pub fn exp(w: &Vector3<f64>) -> Rotation3<f64> {
    let theta = w.norm();
    if theta < EPSILON {
        return Rotation3::identity();
    }

    let k = w.skew();
    let a = theta.sin() / theta;
    let b = (1.0 - theta.cos()) / (theta * theta);

    Rotation3::from_matrix_unchecked(Matrix3::identity() + k * a + k * k * b)
}

/// Logarithm map: rotation matrix to rotation vector
///
/// The cosine recovered from the trace is clamped to [-1, 1] before the
/// arccosine. Returns the zero vector when the angle is below 1e-12. The
/// returned norm lies in [0, π].
pub fn log(r: &Rotation3<f64>) -> Vector3<f64> {
    let m = r.matrix();
    let cos_theta = ((m.trace() - 1.0) * 0.5).clamp(-1.0, 1.0);
    let theta = cos_theta.acos();

    if theta < EPSILON {
        return Vector3::zeros();
    }

    if core::f64::consts::PI - theta < NEAR_PI {
        return log_near_pi(m, theta);
    }

    let scale = theta / (2.0 * theta.sin());
    Vector3::new(m[(2, 1)] - m[(1, 2)], m[(0, 2)] - m[(2, 0)], m[(1, 0)] - m[(0, 1)]) * scale
}

/// At θ ≈ π the antisymmetric part vanishes; the axis is read from
/// `(R + I) / 2 = a aᵀ` instead.
fn log_near_pi(m: &Matrix3<f64>, theta: f64) -> Vector3<f64> {
    let outer = (m + Matrix3::identity()) * 0.5;
    let column = (0..3)
        .max_by(|&i, &j| outer[(i, i)].total_cmp(&outer[(j, j)]))
        .unwrap_or(0);

    let axis = outer.column(column).into_owned().safe_normalize();
    axis * theta
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::{Rng, SeedableRng};
    use rand_pcg::Pcg64;

    fn random_rotation_vector(rng: &mut Pcg64, max_angle: f64) -> Vector3<f64> {
        let axis = Vector3::new(
            rng.random_range(-1.0..1.0),
            rng.random_range(-1.0..1.0),
            rng.random_range(-1.0..1.0),
        )
        .safe_normalize();
        axis * rng.random_range(0.0..max_angle)
    }

    #[test]
    fn test_exp_zero_is_identity() {
        assert_eq!(exp(&Vector3::zeros()), Rotation3::identity());
        assert_eq!(exp(&Vector3::new(1e-13, 0.0, 0.0)), Rotation3::identity());
    }

    #[test]
    fn test_log_identity_is_zero() {
        assert_eq!(log(&Rotation3::identity()), Vector3::zeros());
    }

    #[test]
    fn test_exp_matches_nalgebra() {
        let mut rng = Pcg64::seed_from_u64(11);
        for _ in 0..200 {
            let w = random_rotation_vector(&mut rng, 3.0);
            assert_relative_eq!(exp(&w), Rotation3::new(w), epsilon = 1e-12);
        }
    }

    #[test]
    fn test_exp_is_orthonormal() {
        let r = exp(&Vector3::new(0.3, -1.2, 2.0));
        let m = r.matrix();

        assert_relative_eq!(m.transpose() * m, Matrix3::identity(), epsilon = 1e-12);
        assert_relative_eq!(m.determinant(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_log_exp_round_trip() {
        let mut rng = Pcg64::seed_from_u64(42);
        for _ in 0..1000 {
            let w = random_rotation_vector(&mut rng, core::f64::consts::PI - 1e-3);
            let recovered = log(&exp(&w));
            assert!(
                (recovered - w).norm() < 1e-4,
                "round trip failed: w={:?}, recovered={:?}",
                w,
                recovered
            );
        }
    }

    #[test]
    fn test_exp_log_round_trip_on_rotations() {
        let mut rng = Pcg64::seed_from_u64(3);
        for _ in 0..200 {
            let r = Rotation3::new(random_rotation_vector(&mut rng, 3.1));
            assert_relative_eq!(exp(&log(&r)), r, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_log_angle_and_axis() {
        let axis = Vector3::new(1.0, 2.0, -2.0) / 3.0;
        let angle = 2.5;
        let w = log(&Rotation3::from_axis_angle(&nalgebra::Unit::new_unchecked(axis), angle));

        assert_relative_eq!(w.norm(), angle, epsilon = 1e-12);
        assert_relative_eq!(w / w.norm(), axis, epsilon = 1e-12);
    }

    #[test]
    fn test_log_half_turn() {
        let w = Vector3::new(0.0, core::f64::consts::PI, 0.0);
        let recovered = log(&exp(&w));

        assert_relative_eq!(recovered.norm(), core::f64::consts::PI, epsilon = 1e-6);
        // ±axis describe the same half turn
        assert_relative_eq!(recovered.y.abs(), core::f64::consts::PI, epsilon = 1e-6);
    }

    #[test]
    fn test_log_clamps_overshooting_trace() {
        // Trace slightly above 3 from accumulated rounding
        let m = Matrix3::identity() * (1.0 + 1e-15);
        let w = log(&Rotation3::from_matrix_unchecked(m));
        assert_eq!(w, Vector3::zeros());
    }
}
