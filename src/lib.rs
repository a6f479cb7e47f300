//! SE(3) Fusion - MAP pose fusion of external poses with gravity and magnetic cues
//!
//! This library estimates the pose of a rigid body by fusing absolute 6-DOF
//! pose observations from an external tracker (visual-inertial odometry, AR
//! sessions) with gravity and magnetic field directions. Each estimate is a
//! maximum-a-posteriori solve on SE(3) using Gauss-Newton on the manifold,
//! warm-started from the previous one.
//!
//! # Features
//!
//! - Gauss-Newton MAP solver with right (body-frame) updates on SO(3)
//! - Closed-form SO(3) exp/log maps
//! - 6x6 Cholesky solver with a damping fallback for singular systems
//! - Background worker with a conflated, latest-value-wins inbox per message kind
//! - Lock-free snapshot reads of the latest rotation, translation and heading
//! - Calibration and low-pass filtering front end for raw sensor samples
//! - Support for multiple Earth coordinate conventions (NWU, ENU, NED)
//!
//! # Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use nalgebra::{Rotation3, Vector3};
//! use se3_fusion::{PoseEstimatorWorker, SensorFrontend};
//!
//! let worker = Arc::new(PoseEstimatorWorker::new());
//! worker.start()?;
//!
//! let mut frontend = SensorFrontend::new(worker.clone());
//!
//! // Sensor callbacks
//! frontend.on_accelerometer(Vector3::new(0.0, 0.0, 9.81)); // m/s²
//! frontend.on_magnetometer(Vector3::new(20.0, 0.0, -40.0)); // µT
//!
//! // Render callback: submit the camera pose, get the fused pose back
//! let pose = frontend.on_camera_pose(Rotation3::identity(), Vector3::new(0.0, 0.0, 1.5));
//!
//! // Heading in radians
//! let heading = worker.snapshot_heading();
//!
//! worker.stop()?;
//! # let _ = (pose, heading);
//! # Ok::<(), se3_fusion::Error>(())
//! ```
//!
//! Solves can also be run synchronously with [`PoseEstimator`].

pub mod calibration;
pub mod cholesky;
mod error;
mod estimator;
pub mod filter;
mod frontend;
pub mod heading;
mod inbox;
mod math;
pub mod residual;
pub mod so3;
mod types;
mod worker;

// Re-export all public types and functions
pub use calibration::{InertialCalibration, MagneticCalibration};
pub use cholesky::Cholesky6;
pub use error::{Error, NotPositiveDefinite, Result};
pub use estimator::PoseEstimator;
pub use filter::LowPassFilter;
pub use frontend::SensorFrontend;
pub use heading::{calculate_heading, correct_yaw};
pub use inbox::{ConflatedSlot, Inbox, SendOutcome, WorkerMessage};
pub use math::{DEG_TO_RAD, EPSILON, RAD_TO_DEG, Vector3Ext};
pub use types::*;
pub use worker::{PoseEstimatorWorker, WorkerStats};
