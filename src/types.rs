//! Core types, settings and conventions for the SE(3) fusion library

use nalgebra::{Matrix3, Matrix4, Matrix6, Rotation3, Vector3, Vector6};

use crate::so3;

/// Earth axes convention
///
/// Defines the world frame in which the reference "north" and "up" vectors
/// are expressed. Gravity and magnetic measurements carry their own world
/// reference, but the worker and the sensor front end seed their references
/// from the convention.
///
/// # Conventions
/// - **NWU**: North-West-Up (X=North, Y=West, Z=Up)
/// - **ENU**: East-North-Up (X=East, Y=North, Z=Up)
/// - **NED**: North-East-Down (X=North, Y=East, Z=Down)
///
/// # Example
/// ```
/// use nalgebra::Vector3;
/// use se3_fusion::Convention;
///
/// assert_eq!(Convention::Enu.north(), Vector3::y());
/// assert_eq!(Convention::Ned.up(), -Vector3::z());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Convention {
    /// North-West-Up coordinate system
    #[default]
    Nwu,
    /// East-North-Up coordinate system
    Enu,
    /// North-East-Down coordinate system
    Ned,
}

impl Convention {
    /// World-frame unit vector pointing north
    pub fn north(self) -> Vector3<f64> {
        match self {
            Convention::Nwu | Convention::Ned => Vector3::x(),
            Convention::Enu => Vector3::y(),
        }
    }

    /// World-frame unit vector pointing up (against gravity)
    pub fn up(self) -> Vector3<f64> {
        match self {
            Convention::Nwu | Convention::Enu => Vector3::z(),
            Convention::Ned => -Vector3::z(),
        }
    }
}

/// MAP estimator settings
///
/// Controls the Gauss-Newton loop run by [`PoseEstimator`](crate::PoseEstimator).
///
/// # Example
/// ```
/// use se3_fusion::EstimatorSettings;
///
/// let settings = EstimatorSettings {
///     max_iterations: 4,          // latency-sensitive caller
///     ..Default::default()
/// };
/// assert_eq!(settings.rotation_threshold, 1e-6);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EstimatorSettings {
    /// Upper bound on Gauss-Newton iterations per solve
    pub max_iterations: usize,
    /// Early-exit threshold on the rotation increment norm in radians
    pub rotation_threshold: f64,
    /// Early-exit threshold on the translation increment norm
    pub translation_threshold: f64,
    /// Value added to every diagonal entry of H when the first
    /// factorization fails
    pub damping: f64,
}

impl Default for EstimatorSettings {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            rotation_threshold: 1e-6,
            translation_threshold: 1e-6,
            damping: 1e-6,
        }
    }
}

/// Estimator worker settings
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WorkerSettings {
    /// Settings for the per-tick solve
    ///
    /// The worker runs a shorter iteration budget than a standalone solve
    /// because every tick is warm-started from the previous estimate.
    pub estimator: EstimatorSettings,
    /// Convention used to seed the world north/up references for heading
    pub convention: Convention,
    /// Name given to the dedicated estimator thread
    pub thread_name: String,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            estimator: EstimatorSettings {
                max_iterations: 6,
                ..Default::default()
            },
            convention: Convention::default(),
            thread_name: "pose-worker".into(),
        }
    }
}

/// Sensor front end settings
///
/// Smoothing factors are the weight of the newest sample in a first-order
/// low-pass filter. Weights are the inverse covariances attached to every
/// submitted measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FrontendSettings {
    /// World convention for the gravity and magnetic references
    pub convention: Convention,
    /// Accelerometer low-pass smoothing factor in (0, 1]
    pub accelerometer_smoothing: f64,
    /// Magnetometer low-pass smoothing factor in (0, 1]
    pub magnetometer_smoothing: f64,
    /// 6x6 inverse covariance of the external pose, ordered [rotation, translation]
    pub pose_weight: Matrix6<f64>,
    /// 3x3 inverse covariance of the gravity direction
    pub gravity_weight: Matrix3<f64>,
    /// 3x3 inverse covariance of the magnetic direction
    pub magnetic_weight: Matrix3<f64>,
}

impl Default for FrontendSettings {
    fn default() -> Self {
        Self {
            convention: Convention::default(),
            accelerometer_smoothing: 0.05,
            magnetometer_smoothing: 0.1,
            pose_weight: Matrix6::identity(),
            gravity_weight: Matrix3::identity() * 50.0,
            magnetic_weight: Matrix3::identity() * 10.0,
        }
    }
}

/// Rigid-body pose on SE(3)
///
/// `rotation` maps body-frame vectors into the world frame, so a world
/// reference is predicted in the body frame as `rotationᵀ · v`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub rotation: Rotation3<f64>,
    pub translation: Vector3<f64>,
}

impl Pose {
    pub fn new(rotation: Rotation3<f64>, translation: Vector3<f64>) -> Self {
        Self {
            rotation,
            translation,
        }
    }

    /// Identity rotation, zero translation
    pub fn identity() -> Self {
        Self::new(Rotation3::identity(), Vector3::zeros())
    }

    /// Builds a pose from a column-major homogeneous 4x4 transform, the
    /// layout produced by most AR and graphics APIs.
    ///
    /// The upper-left block is projected onto the closest rotation, so scale
    /// or rounding carried by the source matrix does not reach the solver.
    ///
    /// # Example
    /// ```
    /// use nalgebra::Vector3;
    /// use se3_fusion::Pose;
    ///
    /// let mut m = [0.0; 16];
    /// m[0] = 1.0; m[5] = 1.0; m[10] = 1.0; m[15] = 1.0;
    /// m[12] = 1.0; m[13] = 2.0; m[14] = 3.0;
    ///
    /// let pose = Pose::from_column_major(&m);
    /// assert_eq!(pose.translation, Vector3::new(1.0, 2.0, 3.0));
    /// ```
    pub fn from_column_major(m: &[f64; 16]) -> Self {
        let h = Matrix4::from_column_slice(m);
        let rotation = Rotation3::from_matrix(&h.fixed_view::<3, 3>(0, 0).into_owned());
        Self::new(rotation, h.fixed_view::<3, 1>(0, 3).into_owned())
    }

    /// Right (body-frame) update: `R ← R · exp(δω)`, `t ← t + δρ`
    ///
    /// `delta` is ordered `[δω, δρ]`.
    pub fn retract(&self, delta: &Vector6<f64>) -> Self {
        let omega = delta.fixed_rows::<3>(0).into_owned();
        let rho = delta.fixed_rows::<3>(3).into_owned();
        Self::new(self.rotation * so3::exp(&omega), self.translation + rho)
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::identity()
    }
}

/// Absolute 6-DOF observation from an external tracker
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseMeasurement {
    pub rotation: Rotation3<f64>,
    pub translation: Vector3<f64>,
    /// Inverse covariance ordered [rotation, translation]
    pub information: Matrix6<f64>,
}

impl PoseMeasurement {
    pub fn new(
        rotation: Rotation3<f64>,
        translation: Vector3<f64>,
        information: Matrix6<f64>,
    ) -> Self {
        Self {
            rotation,
            translation,
            information,
        }
    }
}

/// Direction observation used for both gravity and magnetic cues
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnitVectorMeasurement {
    /// Reference direction in the world frame (unit length)
    pub world: Vector3<f64>,
    /// Raw observed vector in the body frame, normalized when used
    pub body: Vector3<f64>,
    pub information: Matrix3<f64>,
}

impl UnitVectorMeasurement {
    pub fn new(world: Vector3<f64>, body: Vector3<f64>, information: Matrix3<f64>) -> Self {
        Self {
            world,
            body,
            information,
        }
    }
}

/// Outcome of a MAP solve
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapResult {
    pub rotation: Rotation3<f64>,
    pub translation: Vector3<f64>,
    /// Approximate posterior covariance H⁻¹, when requested and H was
    /// factorizable
    pub covariance: Option<Matrix6<f64>>,
    /// Gauss-Newton iterations actually run
    pub iterations: usize,
    /// Whether the increment fell below both thresholds
    pub converged: bool,
}

impl MapResult {
    pub fn pose(&self) -> Pose {
        Pose::new(self.rotation, self.translation)
    }
}
