//! Linearized residuals and Gauss-Newton normal-equation assembly
//!
//! Every measurement contributes `H += Jᵀ S J` and `b += Jᵀ S (−r)` at the
//! current estimate, where `S` is its inverse covariance. The state tangent is
//! ordered `[δω, δρ]`: body-frame rotation first, translation second.

use nalgebra::{Matrix3, Matrix6, Rotation3, Vector3, Vector6};

use crate::math::Vector3Ext;
use crate::so3;
use crate::types::{Pose, PoseMeasurement, UnitVectorMeasurement};

/// Pose residual `[log(R_measᵀ R_est), t_est − t_meas]`
///
/// The Jacobian with respect to `[δω, δρ]` is taken as identity.
pub fn pose_residual(estimate: &Pose, measurement: &PoseMeasurement) -> Vector6<f64> {
    let relative = measurement.rotation.inverse() * estimate.rotation;
    let rotation = so3::log(&relative);
    let translation = estimate.translation - measurement.translation;

    Vector6::new(
        rotation.x,
        rotation.y,
        rotation.z,
        translation.x,
        translation.y,
        translation.z,
    )
}

/// Linearized unit-vector residual
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnitVectorResidual {
    /// `predicted × measured`
    pub residual: Vector3<f64>,
    /// Derivative with respect to the rotation tangent
    pub jacobian: Matrix3<f64>,
}

/// Misalignment between the world reference seen through the estimate and
/// the observed body vector
///
/// With `p = normalize(Rᵀ v_world)` and `m = normalize(v_body)`:
///
/// ```text
/// r = p × m
/// J = (p · m) I − m pᵀ
/// ```
///
/// `J` is the small-misalignment form; it matches the exact derivative when
/// `p` and `m` are aligned.
pub fn unit_vector_residual(
    rotation: &Rotation3<f64>,
    measurement: &UnitVectorMeasurement,
) -> UnitVectorResidual {
    let predicted = (rotation.inverse() * measurement.world).safe_normalize();
    let measured = measurement.body.safe_normalize();

    let residual = predicted.cross(&measured);
    let jacobian = Matrix3::identity() * predicted.dot(&measured) - measured * predicted.transpose();

    UnitVectorResidual { residual, jacobian }
}

/// Accumulated Gauss-Newton system `H dx = b`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalEquations {
    pub hessian: Matrix6<f64>,
    pub gradient: Vector6<f64>,
}

impl NormalEquations {
    pub fn new() -> Self {
        Self {
            hessian: Matrix6::zeros(),
            gradient: Vector6::zeros(),
        }
    }

    pub fn clear(&mut self) {
        self.hessian.fill(0.0);
        self.gradient.fill(0.0);
    }

    /// Adds an absolute pose factor; with `J = I` the whole information
    /// block lands in `H` unchanged.
    pub fn add_pose(&mut self, estimate: &Pose, measurement: &PoseMeasurement) {
        let r = pose_residual(estimate, measurement);
        self.hessian += measurement.information;
        self.gradient += measurement.information * -r;
    }

    /// Adds a gravity or magnetic factor to the rotation block only
    pub fn add_unit_vector(&mut self, rotation: &Rotation3<f64>, measurement: &UnitVectorMeasurement) {
        let UnitVectorResidual { residual, jacobian } = unit_vector_residual(rotation, measurement);
        let jt_s = jacobian.transpose() * measurement.information;

        let mut h = self.hessian.fixed_view_mut::<3, 3>(0, 0);
        h += jt_s * jacobian;

        let mut b = self.gradient.fixed_rows_mut::<3>(0);
        b += jt_s * -residual;
    }
}

impl Default for NormalEquations {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn pose_measurement(pose: &Pose) -> PoseMeasurement {
        PoseMeasurement::new(pose.rotation, pose.translation, Matrix6::identity())
    }

    #[test]
    fn test_pose_residual_zero_at_measurement() {
        let pose = Pose::new(
            Rotation3::new(Vector3::new(0.1, -0.4, 0.7)),
            Vector3::new(1.0, 2.0, 3.0),
        );
        let r = pose_residual(&pose, &pose_measurement(&pose));
        assert_relative_eq!(r, Vector6::zeros(), epsilon = 1e-9);
    }

    #[test]
    fn test_pose_residual_components() {
        let measured = Pose::new(Rotation3::identity(), Vector3::new(1.0, 0.0, 0.0));
        let estimate = Pose::new(
            Rotation3::new(Vector3::new(0.0, 0.0, 0.2)),
            Vector3::new(1.5, -1.0, 0.0),
        );

        let r = pose_residual(&estimate, &pose_measurement(&measured));
        assert_relative_eq!(r, Vector6::new(0.0, 0.0, 0.2, 0.5, -1.0, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn test_unit_vector_residual_aligned() {
        let rotation = Rotation3::new(Vector3::new(0.3, 0.2, -0.5));
        let world = Vector3::z();
        // Raw body vector at an arbitrary scale, e.g. 1 g in m/s²
        let body = rotation.inverse() * world * 9.81;
        let measurement = UnitVectorMeasurement::new(world, body, Matrix3::identity());

        let UnitVectorResidual { residual, jacobian } = unit_vector_residual(&rotation, &measurement);

        assert_relative_eq!(residual, Vector3::zeros(), epsilon = 1e-12);
        // J = I − p pᵀ when aligned
        let p = body.normalize();
        assert_relative_eq!(jacobian, Matrix3::identity() - p * p.transpose(), epsilon = 1e-12);
    }

    #[test]
    fn test_unit_vector_residual_misaligned() {
        let measurement = UnitVectorMeasurement::new(Vector3::z(), Vector3::x(), Matrix3::identity());
        let UnitVectorResidual { residual, jacobian } = unit_vector_residual(&Rotation3::identity(), &measurement);

        // p = z, m = x
        assert_relative_eq!(residual, Vector3::y(), epsilon = 1e-12);
        assert_relative_eq!(jacobian, -(Vector3::x() * Vector3::z().transpose()), epsilon = 1e-12);
    }

    #[test]
    fn test_pose_factor_adds_information_unchanged() {
        let information = Matrix6::from_diagonal(&Vector6::new(1.0, 2.0, 3.0, 4.0, 5.0, 6.0));
        let measurement = PoseMeasurement::new(Rotation3::identity(), Vector3::new(1.0, 1.0, 1.0), information);

        let mut normal = NormalEquations::new();
        normal.add_pose(&Pose::identity(), &measurement);

        assert_eq!(normal.hessian, information);
        assert_relative_eq!(normal.gradient, Vector6::new(0.0, 0.0, 0.0, 4.0, 5.0, 6.0), epsilon = 1e-12);
    }

    #[test]
    fn test_unit_vector_factor_touches_rotation_block_only() {
        let measurement = UnitVectorMeasurement::new(
            Vector3::z(),
            Vector3::new(0.1, 0.0, 1.0),
            Matrix3::identity() * 50.0,
        );

        let mut normal = NormalEquations::new();
        normal.add_unit_vector(&Rotation3::identity(), &measurement);

        assert!(normal.hessian.fixed_view::<3, 3>(0, 0).norm() > 0.0);
        assert_eq!(normal.hessian.fixed_view::<3, 3>(3, 3).norm(), 0.0);
        assert_eq!(normal.hessian.fixed_view::<3, 3>(0, 3).norm(), 0.0);
        assert_eq!(normal.hessian.fixed_view::<3, 3>(3, 0).norm(), 0.0);
        assert_eq!(normal.gradient.fixed_rows::<3>(3).norm(), 0.0);
    }

    #[test]
    fn test_clear() {
        let mut normal = NormalEquations::new();
        normal.add_pose(
            &Pose::identity(),
            &PoseMeasurement::new(Rotation3::identity(), Vector3::x(), Matrix6::identity()),
        );
        normal.clear();
        assert_eq!(normal, NormalEquations::default());
    }
}
