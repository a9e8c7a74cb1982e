//! Shared pose state for the multi-threaded runtime.
//!
//! The fused pose is written by whichever motion worker currently owns the
//! drive and read by the trace recorder and callers:
//! - Motion workers publish every odometry tick and every correction
//! - The trace recorder consumes the correction flags
//! - Subscribers receive snapshots over bounded channels

use crate::core::types::Pose;
use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use parking_lot::Mutex;

/// How the latest update changed the pose
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Correction {
    /// Plain odometry integration
    None,
    /// The pose was replaced by an external measurement during motion
    Position,
    /// The pose was replaced by a measurement that does not interrupt
    /// the current motion (start-of-run seeding, external substitution)
    Start,
}

/// Correction flags, consumed by the trace recorder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CorrectionStatus {
    pub position_corrected: bool,
    pub start_corrected: bool,
}

/// Consistent view of the shared pose
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseSnapshot {
    pub previous: Pose,
    pub current: Pose,
    pub status: CorrectionStatus,
    /// Number of in-motion corrections so far
    pub epoch: u64,
}

/// Mutex-guarded canonical pose with change notification
pub struct SharedPose {
    state: Mutex<PoseSnapshot>,
    subscribers: Mutex<Vec<Sender<PoseSnapshot>>>,
}

impl SharedPose {
    pub fn new(start: Pose) -> Self {
        Self {
            state: Mutex::new(PoseSnapshot {
                previous: start,
                current: start,
                status: CorrectionStatus::default(),
                epoch: 0,
            }),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    pub fn snapshot(&self) -> PoseSnapshot {
        *self.state.lock()
    }

    pub fn current(&self) -> Pose {
        self.state.lock().current
    }

    /// Counter bumped by every in-motion correction.
    ///
    /// Unlike the flags this is never reset, so a motion loop can compare it
    /// against the value it saw when it started.
    pub fn correction_epoch(&self) -> u64 {
        self.state.lock().epoch
    }

    /// Record a new pose pair
    pub fn publish(&self, previous: Pose, current: Pose, correction: Correction) {
        let snapshot = {
            let mut state = self.state.lock();
            state.previous = previous;
            state.current = current;
            match correction {
                Correction::None => {}
                Correction::Position => {
                    state.status.position_corrected = true;
                    state.epoch += 1;
                }
                Correction::Start => {
                    state.status.position_corrected = true;
                    state.status.start_corrected = true;
                }
            }
            *state
        };
        self.notify(snapshot);
    }

    /// Return the current snapshot and reset the correction flags
    pub fn take_snapshot(&self) -> PoseSnapshot {
        let mut state = self.state.lock();
        let snapshot = *state;
        state.status = CorrectionStatus::default();
        snapshot
    }

    /// Receive every published snapshot.
    ///
    /// Slow subscribers miss samples rather than blocking the publisher.
    pub fn subscribe(&self, capacity: usize) -> Receiver<PoseSnapshot> {
        let (tx, rx) = bounded(capacity.max(1));
        self.subscribers.lock().push(tx);
        rx
    }

    fn notify(&self, snapshot: PoseSnapshot) {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|tx| !matches!(tx.try_send(snapshot), Err(TrySendError::Disconnected(_))));
    }
}
