//! Cholesky factorization of 6x6 symmetric positive-definite matrices
//!
//! Used to solve the Gauss-Newton normal equations `H dx = b` and to recover
//! the approximate posterior covariance `H⁻¹`.

use nalgebra::{Matrix6, Vector6};

use crate::error::NotPositiveDefinite;

/// Smallest pivot accepted during factorization
pub const PIVOT_THRESHOLD: f64 = 1e-12;

/// Lower-triangular factor `L` with `A = L Lᵀ`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cholesky6 {
    l: Matrix6<f64>,
}

impl Cholesky6 {
    /// Factorize a symmetric 6x6 matrix
    ///
    /// Only the lower triangle of `a` is read. Fails if any pivot is
    /// `<= 1e-12`.
    pub fn new(a: &Matrix6<f64>) -> Result<Self, NotPositiveDefinite> {
        let mut l = Matrix6::zeros();

        for i in 0..6 {
            for j in 0..=i {
                let mut sum = a[(i, j)];
                for k in 0..j {
                    sum -= l[(i, k)] * l[(j, k)];
                }

                if i == j {
                    if sum <= PIVOT_THRESHOLD {
                        return Err(NotPositiveDefinite { index: i, pivot: sum });
                    }
                    l[(i, j)] = sum.sqrt();
                } else {
                    l[(i, j)] = sum / l[(j, j)];
                }
            }
        }

        Ok(Self { l })
    }

    /// Factorize, retrying once with `damping` added to every diagonal entry
    ///
    /// Returns `None` when the damped matrix is still not positive definite.
    ///
    /// # Example
    /// ```
    /// use nalgebra::Matrix6;
    /// use se3_fusion::Cholesky6;
    ///
    /// let singular = Matrix6::zeros();
    /// assert!(Cholesky6::new(&singular).is_err());
    /// assert!(Cholesky6::new_damped(&singular, 1e-6).is_some());
    /// ```
    pub fn new_damped(a: &Matrix6<f64>, damping: f64) -> Option<Self> {
        match Self::new(a) {
            Ok(factor) => Some(factor),
            Err(err) => {
                log::debug!("{err}; retrying with damping {damping:e}");
                let damped = a + Matrix6::identity() * damping;
                Self::new(&damped)
                    .inspect_err(|err| log::warn!("damped factorization failed: {err}"))
                    .ok()
            }
        }
    }

    /// Lower-triangular factor
    pub fn l(&self) -> &Matrix6<f64> {
        &self.l
    }

    /// Solve `A x = b` by forward then back substitution
    pub fn solve(&self, b: &Vector6<f64>) -> Vector6<f64> {
        let l = &self.l;

        // L y = b
        let mut y = Vector6::zeros();
        for i in 0..6 {
            let mut sum = b[i];
            for k in 0..i {
                sum -= l[(i, k)] * y[k];
            }
            y[i] = sum / l[(i, i)];
        }

        // Lᵀ x = y
        let mut x = Vector6::zeros();
        for i in (0..6).rev() {
            let mut sum = y[i];
            for k in (i + 1)..6 {
                sum -= l[(k, i)] * x[k];
            }
            x[i] = sum / l[(i, i)];
        }

        x
    }

    /// `A⁻¹`, assembled column by column from the canonical basis
    pub fn inverse(&self) -> Matrix6<f64> {
        let mut inverse = Matrix6::zeros();
        for i in 0..6 {
            let column = self.solve(&Vector6::ith(i, 1.0));
            inverse.set_column(i, &column);
        }
        inverse
    }
}
