//! Broadcast frame subscriptions.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::pacer::Shared;
use crate::signal::WaitOutcome;

/// Per-consumer view of frame boundaries.
///
/// Unlike [`FramePacer::wait_for_frame`](crate::FramePacer::wait_for_frame),
/// a subscriber does not consume the shared ready flag: every subscriber
/// wakes for every frame. A subscriber that falls behind skips straight to
/// the latest frame instead of replaying the ones it missed.
///
/// Subscribers keep the pacer's shared state alive, so waits keep returning
/// `false` after the pacer has been stopped or dropped.
#[derive(Debug, Clone)]
pub struct FrameSubscriber {
    shared: Arc<Shared>,
    last_seen: u64,
}

impl FrameSubscriber {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        let last_seen = shared.signal.generation();
        Self { shared, last_seen }
    }

    /// Block until a frame newer than the last one seen.
    ///
    /// Returns `false` once the pacer is stopped.
    pub fn wait(&mut self) -> bool {
        self.wait_until(None).is_ready()
    }

    /// Like [`wait`](Self::wait) with an upper bound on the wait.
    pub fn wait_timeout(&mut self, timeout: Duration) -> WaitOutcome {
        self.wait_until(Instant::now().checked_add(timeout))
    }

    fn wait_until(&mut self, deadline: Option<Instant>) -> WaitOutcome {
        let (outcome, generation) = self.shared.signal.next_generation(self.last_seen, deadline);
        if outcome.is_ready() {
            self.last_seen = generation;
        }
        outcome
    }

    /// Generation of the last frame this subscriber observed.
    #[must_use]
    pub fn last_seen_generation(&self) -> u64 {
        self.last_seen
    }
}
