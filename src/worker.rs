//! Estimator worker - MAP solves on a dedicated thread.
//!
//! The worker thread is the only writer of the estimator state: the warm
//! start pose and the latest measurement of each kind. Producers hand values
//! to a conflated [`Inbox`] and never block; readers load the published
//! rotation and translation from independent lock-free cells.
//!
//! ```text
//!  accelerometer ─┐
//!  magnetometer  ─┼─▶ Inbox (one slot per kind) ─▶ pose-worker ─▶ ArcSwap cells ─▶ readers
//!  pose / tick   ─┘                                  (solve)
//! ```
//!
//! Rotation and translation are swapped separately, so a reader racing a
//! publish may pair a new rotation with the previous translation.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};

use arc_swap::ArcSwap;
use crossbeam_channel::{Receiver, Sender, bounded, select};
use nalgebra::{Matrix3, Matrix6, Rotation3, Vector3};
use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::estimator::PoseEstimator;
use crate::heading::calculate_heading;
use crate::inbox::{Inbox, SendOutcome, WorkerMessage};
use crate::types::{
    Convention, EstimatorSettings, MapResult, Pose, PoseMeasurement, UnitVectorMeasurement,
    WorkerSettings,
};

/// Counters published by the worker
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    /// Ticks taken from the inbox
    pub ticks: u64,
    /// Ticks that ran a solve and published its result
    pub solves: u64,
}

/// Lock-free output cells shared between the worker and its readers
#[derive(Debug)]
struct Published {
    rotation: ArcSwap<Rotation3<f64>>,
    translation: ArcSwap<Vector3<f64>>,
    north: ArcSwap<Vector3<f64>>,
    up: ArcSwap<Vector3<f64>>,
    ticks: AtomicU64,
    solves: AtomicU64,
}

impl Published {
    fn new(convention: Convention) -> Self {
        Self {
            rotation: ArcSwap::from_pointee(Rotation3::identity()),
            translation: ArcSwap::from_pointee(Vector3::zeros()),
            north: ArcSwap::from_pointee(convention.north()),
            up: ArcSwap::from_pointee(convention.up()),
            ticks: AtomicU64::new(0),
            solves: AtomicU64::new(0),
        }
    }

    fn reset(&self, convention: Convention) {
        self.rotation.store(Arc::new(Rotation3::identity()));
        self.translation.store(Arc::new(Vector3::zeros()));
        self.north.store(Arc::new(convention.north()));
        self.up.store(Arc::new(convention.up()));
        self.ticks.store(0, Ordering::Relaxed);
        self.solves.store(0, Ordering::Relaxed);
    }

    fn publish(&self, result: &MapResult) {
        self.rotation.store(Arc::new(result.rotation));
        self.translation.store(Arc::new(result.translation));
        self.solves.fetch_add(1, Ordering::Release);
    }
}

/// State owned exclusively by the worker thread
struct EstimatorState {
    estimator: PoseEstimator,
    current: Pose,
    pose: Option<PoseMeasurement>,
    gravity: Option<UnitVectorMeasurement>,
    magnetic: Option<UnitVectorMeasurement>,
}

impl EstimatorState {
    fn new(settings: EstimatorSettings) -> Self {
        Self {
            estimator: PoseEstimator::with_settings(settings),
            current: Pose::identity(),
            pose: None,
            gravity: None,
            magnetic: None,
        }
    }

    fn set_pose(&mut self, measurement: PoseMeasurement) {
        self.pose = Some(measurement);
    }

    fn set_gravity(&mut self, measurement: UnitVectorMeasurement, published: &Published) {
        published.up.store(Arc::new(measurement.world));
        self.gravity = Some(measurement);
    }

    fn set_magnetic(&mut self, measurement: UnitVectorMeasurement, published: &Published) {
        published.north.store(Arc::new(measurement.world));
        self.magnetic = Some(measurement);
    }

    /// Pull whatever arrived alongside the tick so the solve sees the
    /// latest bundle
    fn drain(&mut self, inbox: &Inbox, published: &Published) {
        if let Some(measurement) = inbox.pose.take() {
            self.set_pose(measurement);
        }
        if let Some(measurement) = inbox.gravity.take() {
            self.set_gravity(measurement, published);
        }
        if let Some(measurement) = inbox.magnetic.take() {
            self.set_magnetic(measurement, published);
        }
    }

    /// Run one warm-started solve; `None` until pose and gravity are cached
    fn solve(&mut self) -> Option<MapResult> {
        let (Some(pose), Some(gravity)) = (&self.pose, &self.gravity) else {
            log::trace!("tick skipped: pose or gravity not yet received");
            return None;
        };
        let magnetic = self.magnetic.as_slice();

        let mut result = self.estimator.solve(
            &self.current,
            core::slice::from_ref(pose),
            core::slice::from_ref(gravity),
            magnetic,
            false,
        );
        // Rounding in repeated R·exp(δω) would otherwise accumulate across
        // warm-started ticks
        result.rotation.renormalize();
        self.current = result.pose();
        Some(result)
    }
}

/// Handle to a running worker thread
struct Running {
    thread: JoinHandle<()>,
    shutdown: Sender<()>,
}

/// MAP estimator running on its own thread
///
/// All methods take `&self`; share the worker behind an `Arc` to feed it
/// from several producer threads.
///
/// # Example
/// ```
/// use nalgebra::{Matrix3, Matrix6, Rotation3, Vector3};
/// use se3_fusion::PoseEstimatorWorker;
///
/// let worker = PoseEstimatorWorker::new();
/// worker.start()?;
///
/// worker.submit_pose(Rotation3::identity(), Vector3::new(0.0, 0.0, 1.5), Matrix6::identity());
/// worker.submit_gravity(Vector3::z(), Vector3::new(0.0, 0.0, 9.81), Matrix3::identity() * 50.0);
/// worker.tick();
///
/// // Non-blocking reads of the latest published estimate
/// let _rotation = worker.snapshot_rotation();
/// let _heading = worker.snapshot_heading();
///
/// worker.stop()?;
/// # Ok::<(), se3_fusion::Error>(())
/// ```
pub struct PoseEstimatorWorker {
    settings: WorkerSettings,
    inbox: Arc<Inbox>,
    published: Arc<Published>,
    running: Arc<AtomicBool>,
    handle: Mutex<Option<Running>>,
}

impl PoseEstimatorWorker {
    /// Create a stopped worker with default settings
    pub fn new() -> Self {
        Self::with_settings(WorkerSettings::default())
    }

    /// Create a stopped worker with specified settings
    pub fn with_settings(settings: WorkerSettings) -> Self {
        Self {
            published: Arc::new(Published::new(settings.convention)),
            settings,
            inbox: Arc::new(Inbox::new()),
            running: Arc::new(AtomicBool::new(false)),
            handle: Mutex::new(None),
        }
    }

    /// Get current worker settings
    pub fn settings(&self) -> &WorkerSettings {
        &self.settings
    }

    /// Spawn the estimator thread with fresh state
    ///
    /// The estimate restarts at identity rotation and zero translation.
    pub fn start(&self) -> Result<()> {
        let mut handle = self.handle.lock();
        if handle.is_some() {
            return Err(Error::AlreadyRunning);
        }

        self.inbox.clear();
        self.published.reset(self.settings.convention);

        let (shutdown_tx, shutdown_rx) = bounded(1);
        let estimator = self.settings.estimator;
        let inbox = Arc::clone(&self.inbox);
        let published = Arc::clone(&self.published);
        let running = Arc::clone(&self.running);

        self.running.store(true, Ordering::Release);
        let spawned = thread::Builder::new()
            .name(self.settings.thread_name.clone())
            .spawn(move || run(estimator, &inbox, &published, &running, &shutdown_rx));

        match spawned {
            Ok(thread) => {
                log::info!("estimator worker '{}' started", self.settings.thread_name);
                *handle = Some(Running {
                    thread,
                    shutdown: shutdown_tx,
                });
                Ok(())
            }
            Err(err) => {
                self.running.store(false, Ordering::Release);
                Err(Error::Spawn(err))
            }
        }
    }

    /// Stop the estimator thread and drop every pending message
    ///
    /// Idempotent. A solve still running when stop is requested completes
    /// but is not published.
    pub fn stop(&self) -> Result<()> {
        // Held until the inbox is cleared so a concurrent start cannot share
        // the inbox or cells with the exiting thread
        let mut handle = self.handle.lock();
        let Some(Running { thread, shutdown }) = handle.take() else {
            return Ok(());
        };

        self.running.store(false, Ordering::Release);
        // A full channel already carries the signal
        let _ = shutdown.try_send(());

        let joined = thread.join();
        self.inbox.clear();
        drop(handle);

        match joined {
            Ok(()) => {
                log::info!("estimator worker '{}' stopped", self.settings.thread_name);
                Ok(())
            }
            Err(_) => {
                log::warn!("estimator worker '{}' panicked", self.settings.thread_name);
                Err(Error::WorkerPanicked)
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Hand a message to the inbox without blocking
    pub fn submit(&self, message: WorkerMessage) -> SendOutcome {
        if !self.is_running() {
            return SendOutcome::Stopped;
        }
        self.inbox.push(message)
    }

    /// Submit an absolute pose observation
    pub fn submit_pose(
        &self,
        rotation: Rotation3<f64>,
        translation: Vector3<f64>,
        information: Matrix6<f64>,
    ) -> SendOutcome {
        self.submit(WorkerMessage::PoseUpdate(PoseMeasurement::new(
            rotation,
            translation,
            information,
        )))
    }

    /// Submit a gravity observation
    ///
    /// # Arguments
    /// * `up` - World "up" unit vector
    /// * `body` - Filtered accelerometer reading in the body frame
    /// * `information` - 3x3 inverse covariance
    pub fn submit_gravity(
        &self,
        up: Vector3<f64>,
        body: Vector3<f64>,
        information: Matrix3<f64>,
    ) -> SendOutcome {
        self.submit(WorkerMessage::GravityUpdate(UnitVectorMeasurement::new(
            up,
            body,
            information,
        )))
    }

    /// Submit a magnetic observation
    ///
    /// # Arguments
    /// * `north` - World magnetic reference unit vector
    /// * `body` - Filtered magnetometer reading in the body frame
    /// * `information` - 3x3 inverse covariance
    pub fn submit_magnetic(
        &self,
        north: Vector3<f64>,
        body: Vector3<f64>,
        information: Matrix3<f64>,
    ) -> SendOutcome {
        self.submit(WorkerMessage::MagneticUpdate(UnitVectorMeasurement::new(
            north,
            body,
            information,
        )))
    }

    /// Request a solve with the currently cached measurements
    pub fn tick(&self) -> SendOutcome {
        self.submit(WorkerMessage::Tick)
    }

    /// Latest published rotation
    pub fn snapshot_rotation(&self) -> Rotation3<f64> {
        **self.published.rotation.load()
    }

    /// Latest published translation
    pub fn snapshot_translation(&self) -> Vector3<f64> {
        **self.published.translation.load()
    }

    /// Latest published rotation and translation, loaded one after the other
    pub fn snapshot_pose(&self) -> Pose {
        Pose::new(self.snapshot_rotation(), self.snapshot_translation())
    }

    /// Heading of the latest published rotation in radians, range (−π, π]
    pub fn snapshot_heading(&self) -> f64 {
        let rotation = self.published.rotation.load();
        let north = self.published.north.load();
        let up = self.published.up.load();
        calculate_heading(&rotation, &north, &up)
    }

    pub fn stats(&self) -> WorkerStats {
        WorkerStats {
            ticks: self.published.ticks.load(Ordering::Acquire),
            solves: self.published.solves.load(Ordering::Acquire),
        }
    }
}

impl Default for PoseEstimatorWorker {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for PoseEstimatorWorker {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

/// Worker thread body
fn run(
    settings: EstimatorSettings,
    inbox: &Inbox,
    published: &Published,
    running: &AtomicBool,
    shutdown: &Receiver<()>,
) {
    let mut state = EstimatorState::new(settings);
    let mut active = true;

    while active {
        select! {
            recv(shutdown) -> _ => {
                active = false;
            }
            recv(inbox.pose.receiver()) -> message => {
                if let Ok(measurement) = message {
                    state.set_pose(measurement);
                }
            }
            recv(inbox.gravity.receiver()) -> message => {
                if let Ok(measurement) = message {
                    state.set_gravity(measurement, published);
                }
            }
            recv(inbox.magnetic.receiver()) -> message => {
                if let Ok(measurement) = message {
                    state.set_magnetic(measurement, published);
                }
            }
            recv(inbox.tick.receiver()) -> message => {
                if message.is_ok() {
                    state.drain(inbox, published);
                    let result = state.solve();

                    if !running.load(Ordering::Acquire) {
                        active = false;
                    } else if let Some(result) = result {
                        published.publish(&result);
                    }
                    published.ticks.fetch_add(1, Ordering::Release);
                }
            }
        }
    }
}
