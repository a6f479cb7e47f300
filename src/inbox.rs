//! Conflated per-kind inbox feeding the estimator worker
//!
//! Each message kind owns a single-slot channel. Sending into a full slot
//! evicts the pending value. Producers never block and kinds never displace
//! each other; the worker only ever sees the latest value of each kind.

use crossbeam_channel::{Receiver, Sender, TryRecvError, TrySendError, bounded};

use crate::types::{PoseMeasurement, UnitVectorMeasurement};

/// Message accepted by the estimator worker
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WorkerMessage {
    /// Latest absolute pose from the external tracker
    PoseUpdate(PoseMeasurement),
    /// Latest filtered accelerometer direction
    GravityUpdate(UnitVectorMeasurement),
    /// Latest filtered magnetometer direction
    MagneticUpdate(UnitVectorMeasurement),
    /// Solve with whatever is cached
    Tick,
}

/// What happened to a value handed to the inbox
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Stored in an empty slot
    Enqueued,
    /// Stored after evicting an unconsumed older value of the same kind
    Replaced,
    /// Discarded because the worker is not running
    Stopped,
}

impl SendOutcome {
    /// Whether the value is now pending in the inbox
    pub fn is_pending(self) -> bool {
        matches!(self, SendOutcome::Enqueued | SendOutcome::Replaced)
    }
}

/// Single-slot latest-value-wins channel
///
/// The slot keeps a receiver on the producer side so a full slot can be
/// emptied before sending; the channel therefore never disconnects while the
/// slot lives.
#[derive(Debug)]
pub struct ConflatedSlot<T> {
    tx: Sender<T>,
    rx: Receiver<T>,
}

impl<T> ConflatedSlot<T> {
    pub fn new() -> Self {
        let (tx, rx) = bounded(1);
        Self { tx, rx }
    }

    /// Store `value`, evicting any unconsumed older value
    ///
    /// Retries until the slot accepts `value`: with several producers of the
    /// same kind, the value whose send completes last is the one left pending.
    pub fn replace(&self, mut value: T) -> SendOutcome {
        let mut evicted = false;

        loop {
            match self.tx.try_send(value) {
                Ok(()) => {
                    return if evicted {
                        SendOutcome::Replaced
                    } else {
                        SendOutcome::Enqueued
                    };
                }
                Err(TrySendError::Full(returned)) => {
                    value = returned;
                    evicted |= self.rx.try_recv().is_ok();
                }
                // Unreachable while the slot owns both ends
                Err(TrySendError::Disconnected(_)) => return SendOutcome::Stopped,
            }
        }
    }

    /// Take the pending value, if any
    pub fn take(&self) -> Option<T> {
        match self.rx.try_recv() {
            Ok(value) => Some(value),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Receiver for use in `crossbeam_channel::select!`
    pub fn receiver(&self) -> &Receiver<T> {
        &self.rx
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

impl<T> Default for ConflatedSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// One conflated slot per [`WorkerMessage`] kind
///
/// # Example
/// ```
/// use nalgebra::{Matrix3, Vector3};
/// use se3_fusion::{Inbox, SendOutcome, UnitVectorMeasurement, WorkerMessage};
///
/// let inbox = Inbox::new();
/// let first = UnitVectorMeasurement::new(Vector3::z(), Vector3::z(), Matrix3::identity());
/// let second = UnitVectorMeasurement::new(Vector3::z(), Vector3::x(), Matrix3::identity());
///
/// assert_eq!(inbox.push(WorkerMessage::GravityUpdate(first)), SendOutcome::Enqueued);
/// assert_eq!(inbox.push(WorkerMessage::GravityUpdate(second)), SendOutcome::Replaced);
/// assert_eq!(inbox.gravity.take(), Some(second));
/// ```
#[derive(Debug, Default)]
pub struct Inbox {
    pub pose: ConflatedSlot<PoseMeasurement>,
    pub gravity: ConflatedSlot<UnitVectorMeasurement>,
    pub magnetic: ConflatedSlot<UnitVectorMeasurement>,
    pub tick: ConflatedSlot<()>,
}

impl Inbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route a message to the slot of its kind
    pub fn push(&self, message: WorkerMessage) -> SendOutcome {
        let outcome = match message {
            WorkerMessage::PoseUpdate(measurement) => self.pose.replace(measurement),
            WorkerMessage::GravityUpdate(measurement) => self.gravity.replace(measurement),
            WorkerMessage::MagneticUpdate(measurement) => self.magnetic.replace(measurement),
            WorkerMessage::Tick => self.tick.replace(()),
        };

        if outcome == SendOutcome::Replaced {
            log::trace!("conflated pending {}", kind_name(&message));
        }
        outcome
    }

    /// Drop every pending value
    pub fn clear(&self) {
        self.pose.take();
        self.gravity.take();
        self.magnetic.take();
        self.tick.take();
    }

    pub fn is_empty(&self) -> bool {
        self.pose.is_empty() && self.gravity.is_empty() && self.magnetic.is_empty() && self.tick.is_empty()
    }
}

fn kind_name(message: &WorkerMessage) -> &'static str {
    match message {
        WorkerMessage::PoseUpdate(_) => "pose update",
        WorkerMessage::GravityUpdate(_) => "gravity update",
        WorkerMessage::MagneticUpdate(_) => "magnetic update",
        WorkerMessage::Tick => "tick",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Matrix3, Matrix6, Rotation3, Vector3};

    fn pose(x: f64) -> PoseMeasurement {
        PoseMeasurement::new(Rotation3::identity(), Vector3::new(x, 0.0, 0.0), Matrix6::identity())
    }

    fn direction(v: Vector3<f64>) -> UnitVectorMeasurement {
        UnitVectorMeasurement::new(Vector3::z(), v, Matrix3::identity())
    }

    #[test]
    fn test_slot_keeps_latest() {
        let slot = ConflatedSlot::new();
        assert_eq!(slot.replace(1), SendOutcome::Enqueued);
        assert_eq!(slot.replace(2), SendOutcome::Replaced);
        assert_eq!(slot.replace(3), SendOutcome::Replaced);

        assert_eq!(slot.take(), Some(3));
        assert_eq!(slot.take(), None);
        assert!(slot.is_empty());
    }

    #[test]
    fn test_slot_reusable_after_take() {
        let slot = ConflatedSlot::new();
        slot.replace("a");
        assert_eq!(slot.take(), Some("a"));
        assert_eq!(slot.replace("b"), SendOutcome::Enqueued);
        assert_eq!(slot.take(), Some("b"));
    }

    #[test]
    fn test_same_kind_conflates() {
        let inbox = Inbox::new();
        inbox.push(WorkerMessage::PoseUpdate(pose(1.0)));
        inbox.push(WorkerMessage::PoseUpdate(pose(2.0)));

        assert_eq!(inbox.pose.take(), Some(pose(2.0)));
        assert_eq!(inbox.pose.take(), None);
    }

    #[test]
    fn test_distinct_kinds_independent() {
        let inbox = Inbox::new();
        inbox.push(WorkerMessage::GravityUpdate(direction(Vector3::z())));
        inbox.push(WorkerMessage::MagneticUpdate(direction(Vector3::x())));
        inbox.push(WorkerMessage::Tick);
        inbox.push(WorkerMessage::PoseUpdate(pose(5.0)));

        assert_eq!(inbox.gravity.take(), Some(direction(Vector3::z())));
        assert_eq!(inbox.magnetic.take(), Some(direction(Vector3::x())));
        assert_eq!(inbox.tick.take(), Some(()));
        assert_eq!(inbox.pose.take(), Some(pose(5.0)));
        assert!(inbox.is_empty());
    }

    #[test]
    fn test_ticks_conflate() {
        let inbox = Inbox::new();
        assert_eq!(inbox.push(WorkerMessage::Tick), SendOutcome::Enqueued);
        assert_eq!(inbox.push(WorkerMessage::Tick), SendOutcome::Replaced);
        assert_eq!(inbox.tick.take(), Some(()));
        assert_eq!(inbox.tick.take(), None);
    }

    #[test]
    fn test_clear_drops_pending() {
        let inbox = Inbox::new();
        inbox.push(WorkerMessage::PoseUpdate(pose(1.0)));
        inbox.push(WorkerMessage::Tick);
        inbox.clear();
        assert!(inbox.is_empty());
    }

    #[test]
    fn test_concurrent_producers_never_block() {
        let inbox = std::sync::Arc::new(Inbox::new());
        let handles: Vec<_> = (0..4)
            .map(|id| {
                let inbox = inbox.clone();
                std::thread::spawn(move || {
                    for i in 0..1000 {
                        let outcome = inbox.push(WorkerMessage::PoseUpdate(pose((id * 1000 + i) as f64)));
                        assert!(outcome.is_pending(), "value {i} from producer {id} lost: {outcome:?}");
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        // Whichever producer finished last, its final value is the one left
        let latest = inbox.pose.take().unwrap().translation.x as usize;
        assert_eq!(latest % 1000, 999);
        assert_eq!(inbox.pose.take(), None);
    }

    #[test]
    fn test_outcome_pending() {
        assert!(SendOutcome::Enqueued.is_pending());
        assert!(SendOutcome::Replaced.is_pending());
        assert!(!SendOutcome::Stopped.is_pending());
    }
}
