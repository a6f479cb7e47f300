//! Error types for the SE(3) fusion library

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Worker lifecycle errors
///
/// Numerical trouble inside a solve is never reported here: the estimator
/// degrades instead of failing.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The estimator thread could not be spawned
    #[error("failed to spawn estimator thread: {0}")]
    Spawn(#[from] std::io::Error),

    /// `start` was called on a running worker
    #[error("estimator worker is already running")]
    AlreadyRunning,

    /// The estimator thread panicked before it could be joined
    #[error("estimator worker thread panicked")]
    WorkerPanicked,
}

/// Cholesky factorization failure
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
#[error("matrix is not positive definite: pivot {pivot:e} at row {index}")]
pub struct NotPositiveDefinite {
    /// Row of the first pivot that fell below the threshold
    pub index: usize,
    /// Value of that pivot before the square root
    pub pivot: f64,
}
