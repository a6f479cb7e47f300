//! First-order low-pass filter for raw sensor vectors

use nalgebra::Vector3;

/// Exponential smoothing `y ← (1 − α)·y + α·x`
///
/// The output starts at zero, so the first samples ramp up from the origin
/// rather than jumping to the first reading. Only the direction of the
/// filtered vector matters downstream, and it settles within a few samples.
///
/// # Example
/// ```
/// use nalgebra::Vector3;
/// use se3_fusion::LowPassFilter;
///
/// let mut filter = LowPassFilter::new(0.5);
/// let output = filter.update(Vector3::new(2.0, 0.0, 0.0));
/// assert_eq!(output, Vector3::new(1.0, 0.0, 0.0));
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LowPassFilter {
    alpha: f64,
    output: Vector3<f64>,
}

impl LowPassFilter {
    /// Create a filter; `alpha` is the weight of the newest sample and is
    /// clamped to [0, 1]
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha: alpha.clamp(0.0, 1.0),
            output: Vector3::zeros(),
        }
    }

    /// Feed one sample and return the updated output
    pub fn update(&mut self, input: Vector3<f64>) -> Vector3<f64> {
        self.output = self.output * (1.0 - self.alpha) + input * self.alpha;
        self.output
    }

    pub fn output(&self) -> Vector3<f64> {
        self.output
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Reset the output to zero
    pub fn reset(&mut self) {
        self.output = Vector3::zeros();
    }
}
