//! Maximum-a-posteriori pose estimator on SE(3)
//!
//! Gauss-Newton over `[δω, δρ]` with a right (body-frame) update. Each
//! solve starts from a caller-supplied warm start and always returns an
//! estimate; numerical trouble only degrades the result.

use crate::cholesky::Cholesky6;
use crate::residual::NormalEquations;
use crate::types::{EstimatorSettings, MapResult, Pose, PoseMeasurement, UnitVectorMeasurement};

/// MAP estimator fusing absolute poses with gravity and magnetic directions
///
/// # Example
/// ```
/// use nalgebra::{Matrix3, Matrix6, Rotation3, Vector3};
/// use se3_fusion::{Pose, PoseEstimator, PoseMeasurement, UnitVectorMeasurement, so3};
///
/// let truth = Rotation3::new(Vector3::new(0.0, 0.0, 0.5));
/// let pose = PoseMeasurement::new(truth, Vector3::new(1.0, 0.0, 0.0), Matrix6::identity());
/// let gravity = UnitVectorMeasurement::new(
///     Vector3::z(),
///     truth.inverse() * Vector3::z(),
///     Matrix3::identity() * 50.0,
/// );
///
/// let estimator = PoseEstimator::new();
/// let result = estimator.solve(&Pose::identity(), &[pose], &[gravity], &[], true);
///
/// assert!(result.converged);
/// assert!(so3::log(&(truth.inverse() * result.rotation)).norm() < 1e-6);
/// assert!(result.covariance.is_some());
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct PoseEstimator {
    settings: EstimatorSettings,
}

impl PoseEstimator {
    /// Create an estimator with default settings
    pub fn new() -> Self {
        Self::with_settings(EstimatorSettings::default())
    }

    /// Create an estimator with specified settings
    pub fn with_settings(settings: EstimatorSettings) -> Self {
        Self { settings }
    }

    /// Get current estimator settings
    pub fn settings(&self) -> EstimatorSettings {
        self.settings
    }

    /// Solve for the MAP pose given the supplied measurements
    ///
    /// # Arguments
    /// * `initial` - Warm start for the iteration
    /// * `poses` - Absolute pose observations
    /// * `gravity` - Gravity direction observations
    /// * `magnetic` - Magnetic field direction observations
    /// * `with_covariance` - Whether to invert the final Hessian; skip it on
    ///   latency-sensitive paths
    pub fn solve(
        &self,
        initial: &Pose,
        poses: &[PoseMeasurement],
        gravity: &[UnitVectorMeasurement],
        magnetic: &[UnitVectorMeasurement],
        with_covariance: bool,
    ) -> MapResult {
        let settings = &self.settings;
        let mut estimate = *initial;
        let mut normal = NormalEquations::new();
        let mut factor = None;
        let mut iterations = 0;
        let mut converged = false;

        while iterations < settings.max_iterations {
            iterations += 1;

            normal.clear();
            for measurement in poses {
                normal.add_pose(&estimate, measurement);
            }
            for measurement in gravity.iter().chain(magnetic) {
                normal.add_unit_vector(&estimate.rotation, measurement);
            }

            factor = Cholesky6::new_damped(&normal.hessian, settings.damping);
            let Some(cholesky) = &factor else {
                // H does not change without an update, so retrying is pointless
                log::warn!("normal equations singular after damping; keeping current estimate");
                break;
            };

            let delta = cholesky.solve(&normal.gradient);
            estimate = estimate.retract(&delta);

            let rotation_step = delta.fixed_rows::<3>(0).norm();
            let translation_step = delta.fixed_rows::<3>(3).norm();
            if rotation_step < settings.rotation_threshold
                && translation_step < settings.translation_threshold
            {
                converged = true;
                break;
            }
        }

        if converged {
            log::debug!("MAP solve converged after {iterations} iteration(s)");
        } else {
            log::debug!("MAP solve stopped after {iterations} iteration(s) without converging");
        }

        let covariance = if with_covariance {
            factor.map(|cholesky| cholesky.inverse())
        } else {
            None
        };

        MapResult {
            rotation: estimate.rotation,
            translation: estimate.translation,
            covariance,
            iterations,
            converged,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::{Matrix3, Matrix6, Rotation3, Vector3};

    #[test]
    fn test_default_settings() {
        let settings = PoseEstimator::new().settings();
        assert_eq!(settings.max_iterations, 10);
        assert_eq!(settings.rotation_threshold, 1e-6);
        assert_eq!(settings.translation_threshold, 1e-6);
        assert_eq!(settings.damping, 1e-6);
    }

    #[test]
    fn test_no_measurements_is_damped_noop() {
        let initial = Pose::new(Rotation3::new(Vector3::new(0.1, 0.2, 0.3)), Vector3::new(1.0, 2.0, 3.0));
        let result = PoseEstimator::new().solve(&initial, &[], &[], &[], true);

        assert_eq!(result.pose(), initial);
        assert!(result.converged);
        assert_eq!(result.iterations, 1);
        // Damped H = 1e-6 I
        assert_relative_eq!(result.covariance.unwrap(), Matrix6::identity() * 1e6, epsilon = 1e-3);
    }

    #[test]
    fn test_indefinite_information_degrades() {
        let initial = Pose::identity();
        let bad = PoseMeasurement::new(Rotation3::identity(), Vector3::x(), Matrix6::identity() * -1.0);
        let result = PoseEstimator::new().solve(&initial, &[bad], &[], &[], true);

        assert_eq!(result.pose(), initial);
        assert!(!result.converged);
        assert!(result.covariance.is_none());
    }

    #[test]
    fn test_translation_solved_in_one_step() {
        let target = Vector3::new(-2.0, 0.5, 4.0);
        let pose = PoseMeasurement::new(Rotation3::identity(), target, Matrix6::identity());
        let gravity = UnitVectorMeasurement::new(Vector3::z(), Vector3::z(), Matrix3::identity());

        let result = PoseEstimator::new().solve(&Pose::identity(), &[pose], &[gravity], &[], false);

        assert_relative_eq!(result.translation, target, epsilon = 1e-12);
        assert_eq!(result.iterations, 2);
        assert!(result.covariance.is_none());
    }

    #[test]
    fn test_iteration_cap() {
        let estimator = PoseEstimator::with_settings(EstimatorSettings {
            max_iterations: 1,
            ..Default::default()
        });
        let truth = Rotation3::new(Vector3::new(0.4, -0.3, 0.8));
        let pose = PoseMeasurement::new(truth, Vector3::zeros(), Matrix6::identity());

        let result = estimator.solve(&Pose::identity(), &[pose], &[], &[], true);

        assert_eq!(result.iterations, 1);
        assert!(!result.converged);
        assert!(result.covariance.is_some());
    }
}
