//! Sensor calibration applied before filtering

use nalgebra::{Matrix3, Vector3};

/// Inertial sensor calibration
///
/// Applied as `misalignment * ((uncalibrated - offset) ∘ sensitivity)`.
///
/// # Example
/// ```
/// use nalgebra::{Matrix3, Vector3};
/// use se3_fusion::InertialCalibration;
///
/// let calibration = InertialCalibration {
///     misalignment: Matrix3::identity(),
///     sensitivity: Vector3::new(1.0, 1.0, 1.0),
///     offset: Vector3::new(0.1, 0.2, 0.3),
/// };
///
/// let calibrated = calibration.apply(Vector3::new(1.0, 2.0, 3.0));
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct InertialCalibration {
    /// 3x3 misalignment correction matrix
    pub misalignment: Matrix3<f64>,
    /// Per-axis sensitivity scaling
    pub sensitivity: Vector3<f64>,
    /// Bias subtracted from the raw reading
    pub offset: Vector3<f64>,
}

impl InertialCalibration {
    pub fn apply(&self, uncalibrated: Vector3<f64>) -> Vector3<f64> {
        self.misalignment * (uncalibrated - self.offset).component_mul(&self.sensitivity)
    }
}

impl Default for InertialCalibration {
    fn default() -> Self {
        Self {
            misalignment: Matrix3::identity(),
            sensitivity: Vector3::repeat(1.0),
            offset: Vector3::zeros(),
        }
    }
}

/// Magnetometer hard and soft iron correction
///
/// Applied as `soft_iron * (uncalibrated - hard_iron)`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MagneticCalibration {
    /// 3x3 soft iron correction matrix
    pub soft_iron: Matrix3<f64>,
    /// Hard iron offset
    pub hard_iron: Vector3<f64>,
}

impl MagneticCalibration {
    pub fn apply(&self, uncalibrated: Vector3<f64>) -> Vector3<f64> {
        self.soft_iron * (uncalibrated - self.hard_iron)
    }
}

impl Default for MagneticCalibration {
    fn default() -> Self {
        Self {
            soft_iron: Matrix3::identity(),
            hard_iron: Vector3::zeros(),
        }
    }
}
