//! Producer-side adapter between raw sensors and the estimator worker
//!
//! Raw accelerometer and magnetometer samples are calibrated and low-pass
//! filtered before being submitted as direction measurements. Every camera
//! pose is submitted together with a tick, so the worker solves once per
//! rendered frame with the latest sensor bundle.

use std::sync::Arc;

use nalgebra::{Rotation3, Vector3};

use crate::calibration::{InertialCalibration, MagneticCalibration};
use crate::filter::LowPassFilter;
use crate::heading;
use crate::inbox::SendOutcome;
use crate::types::{FrontendSettings, Pose};
use crate::worker::PoseEstimatorWorker;

/// Sensor front end feeding a shared [`PoseEstimatorWorker`]
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use nalgebra::{Rotation3, Vector3};
/// use se3_fusion::{PoseEstimatorWorker, SensorFrontend};
///
/// let worker = Arc::new(PoseEstimatorWorker::new());
/// let mut frontend = SensorFrontend::new(worker.clone());
///
/// // Worker stopped: the camera pose is rendered as-is
/// let camera = Vector3::new(0.0, 1.0, 0.0);
/// let pose = frontend.on_camera_pose(Rotation3::identity(), camera);
/// assert_eq!(pose.translation, camera);
/// ```
pub struct SensorFrontend {
    worker: Arc<PoseEstimatorWorker>,
    settings: FrontendSettings,
    inertial: InertialCalibration,
    magnetic: MagneticCalibration,
    accelerometer_filter: LowPassFilter,
    magnetometer_filter: LowPassFilter,
}

impl SensorFrontend {
    /// Create a front end with default settings and identity calibrations
    pub fn new(worker: Arc<PoseEstimatorWorker>) -> Self {
        Self::with_settings(worker, FrontendSettings::default())
    }

    /// Create a front end with specified settings
    pub fn with_settings(worker: Arc<PoseEstimatorWorker>, settings: FrontendSettings) -> Self {
        Self {
            worker,
            inertial: InertialCalibration::default(),
            magnetic: MagneticCalibration::default(),
            accelerometer_filter: LowPassFilter::new(settings.accelerometer_smoothing),
            magnetometer_filter: LowPassFilter::new(settings.magnetometer_smoothing),
            settings,
        }
    }

    /// Set the calibration applied to accelerometer samples
    pub fn set_inertial_calibration(&mut self, calibration: InertialCalibration) {
        self.inertial = calibration;
    }

    /// Set the calibration applied to magnetometer samples
    pub fn set_magnetic_calibration(&mut self, calibration: MagneticCalibration) {
        self.magnetic = calibration;
    }

    pub fn settings(&self) -> &FrontendSettings {
        &self.settings
    }

    pub fn worker(&self) -> &Arc<PoseEstimatorWorker> {
        &self.worker
    }

    /// Calibrate, filter and submit an accelerometer sample as gravity
    ///
    /// The filter advances even while the worker is stopped.
    pub fn on_accelerometer(&mut self, raw: Vector3<f64>) -> SendOutcome {
        let calibrated = self.inertial.apply(raw);
        let body = self.accelerometer_filter.update(calibrated);

        self.worker
            .submit_gravity(self.settings.convention.up(), body, self.settings.gravity_weight)
    }

    /// Calibrate, filter and submit a magnetometer sample
    pub fn on_magnetometer(&mut self, raw: Vector3<f64>) -> SendOutcome {
        let calibrated = self.magnetic.apply(raw);
        let body = self.magnetometer_filter.update(calibrated);

        self.worker.submit_magnetic(
            self.settings.convention.north(),
            body,
            self.settings.magnetic_weight,
        )
    }

    /// Submit a camera pose, request a solve, and return the pose to render
    ///
    /// Returns the latest published estimate while the worker runs; the
    /// estimate lags the camera by at least one solve. Falls back to the
    /// camera pose when the worker is stopped.
    pub fn on_camera_pose(&mut self, rotation: Rotation3<f64>, translation: Vector3<f64>) -> Pose {
        let submitted = self
            .worker
            .submit_pose(rotation, translation, self.settings.pose_weight);
        self.worker.tick();

        if submitted == SendOutcome::Stopped {
            Pose::new(rotation, translation)
        } else {
            self.worker.snapshot_pose()
        }
    }

    /// [`on_camera_pose`](Self::on_camera_pose) for a column-major 4x4
    /// homogeneous transform
    pub fn on_camera_matrix(&mut self, matrix: &[f64; 16]) -> Pose {
        let pose = Pose::from_column_major(matrix);
        self.on_camera_pose(pose.rotation, pose.translation)
    }

    /// Keep the roll and pitch of a tracker rotation and take yaw from the
    /// latest published estimate
    ///
    /// Returns `rotation` unchanged while the worker is stopped.
    pub fn correct_heading(&self, rotation: Rotation3<f64>) -> Rotation3<f64> {
        if !self.worker.is_running() {
            return rotation;
        }

        let estimate = self.worker.snapshot_rotation();
        heading::correct_yaw(&rotation, heading::yaw_angle(&estimate))
    }

    /// Reset both sensor filters to zero
    pub fn reset_filters(&mut self) {
        self.accelerometer_filter.reset();
        self.magnetometer_filter.reset();
    }
}
