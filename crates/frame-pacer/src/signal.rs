//! Single-slot ready signal shared by the pacing loop and its waiters.
//!
//! One mutex guards three pieces of state: the ready flag, the frame
//! generation and whether the signal is open. Every wait re-checks the flag
//! (or generation) *and* the open state under that mutex, so a waiter can
//! neither miss a frame nor stay blocked after the signal is closed.

use parking_lot::{Condvar, Mutex, MutexGuard};
use std::time::Instant;

/// Result of a wait on the frame signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WaitOutcome {
    /// A frame boundary was observed.
    Ready,
    /// The pacer is stopped; no frame will come.
    Stopped,
    /// The timeout elapsed first.
    TimedOut,
}

impl WaitOutcome {
    /// Whether a frame boundary was observed.
    #[inline]
    #[must_use]
    pub fn is_ready(self) -> bool {
        matches!(self, WaitOutcome::Ready)
    }
}

#[derive(Debug, Default)]
struct SignalState {
    /// Pending, uncollected frame
    ready: bool,
    /// Bumped on every publish
    generation: u64,
    open: bool,
}

#[derive(Debug, Default)]
pub(crate) struct ReadySignal {
    state: Mutex<SignalState>,
    condvar: Condvar,
}

impl ReadySignal {
    /// Closed signal with no pending frame.
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Accept publishes again, dropping any stale pending frame.
    pub(crate) fn open(&self) {
        let mut state = self.state.lock();
        state.open = true;
        state.ready = false;
    }

    /// Refuse further publishes and release every waiter.
    pub(crate) fn close(&self) {
        {
            let mut state = self.state.lock();
            state.open = false;
            state.ready = false;
        }
        self.condvar.notify_all();
    }

    /// Mark a frame ready and wake all waiters. No-op while closed.
    pub(crate) fn publish(&self) -> bool {
        {
            let mut state = self.state.lock();
            if !state.open {
                return false;
            }
            state.ready = true;
            state.generation = state.generation.wrapping_add(1);
        }
        self.condvar.notify_all();
        true
    }

    pub(crate) fn generation(&self) -> u64 {
        self.state.lock().generation
    }

    pub(crate) fn is_pending(&self) -> bool {
        self.state.lock().ready
    }

    /// Wait for the ready flag and consume it. Only one waiter wins each frame.
    pub(crate) fn take(&self, deadline: Option<Instant>) -> WaitOutcome {
        let mut state = self.state.lock();
        self.wait_on(&mut state, deadline, |state| {
            if state.ready {
                state.ready = false;
                Some(WaitOutcome::Ready)
            } else if !state.open {
                Some(WaitOutcome::Stopped)
            } else {
                None
            }
        })
    }

    /// Wait for a generation newer than `last_seen` without consuming the flag.
    ///
    /// Returns the outcome and the generation observed, so callers that fell
    /// several frames behind catch up in one step.
    pub(crate) fn next_generation(
        &self,
        last_seen: u64,
        deadline: Option<Instant>,
    ) -> (WaitOutcome, u64) {
        let mut state = self.state.lock();
        let outcome = self.wait_on(&mut state, deadline, |state| {
            if !state.open {
                Some(WaitOutcome::Stopped)
            } else if state.generation != last_seen {
                Some(WaitOutcome::Ready)
            } else {
                None
            }
        });
        (outcome, state.generation)
    }

    /// Block until `poll` yields an outcome or `deadline` passes.
    fn wait_on<F>(
        &self,
        state: &mut MutexGuard<'_, SignalState>,
        deadline: Option<Instant>,
        mut poll: F,
    ) -> WaitOutcome
    where
        F: FnMut(&mut SignalState) -> Option<WaitOutcome>,
    {
        loop {
            if let Some(outcome) = poll(&mut **state) {
                return outcome;
            }
            match deadline {
                None => self.condvar.wait(state),
                Some(deadline) => {
                    if self.condvar.wait_until(state, deadline).timed_out() {
                        return poll(&mut **state).unwrap_or(WaitOutcome::TimedOut);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    fn soon(ms: u64) -> Option<Instant> {
        Some(Instant::now() + Duration::from_millis(ms))
    }

    #[test]
    fn test_new_signal_is_closed() {
        let signal = ReadySignal::new();
        assert!(!signal.publish());
        assert_eq!(signal.take(None), WaitOutcome::Stopped);
        assert_eq!(signal.generation(), 0);
    }

    #[test]
    fn test_publish_then_take() {
        let signal = ReadySignal::new();
        signal.open();
        assert!(signal.publish());
        assert!(signal.is_pending());

        assert_eq!(signal.take(None), WaitOutcome::Ready);
        assert!(!signal.is_pending());
    }

    #[test]
    fn test_publishes_coalesce() {
        let signal = ReadySignal::new();
        signal.open();
        signal.publish();
        signal.publish();
        signal.publish();

        assert_eq!(signal.generation(), 3);
        assert_eq!(signal.take(soon(5)), WaitOutcome::Ready);
        assert_eq!(signal.take(soon(5)), WaitOutcome::TimedOut);
    }

    #[test]
    fn test_close_drops_pending_frame() {
        let signal = ReadySignal::new();
        signal.open();
        signal.publish();
        signal.close();

        assert_eq!(signal.take(None), WaitOutcome::Stopped);
    }

    #[test]
    fn test_reopen_clears_stale_frame() {
        let signal = ReadySignal::new();
        signal.open();
        signal.publish();
        signal.open();

        assert_eq!(signal.take(soon(5)), WaitOutcome::TimedOut);
    }

    #[test]
    fn test_close_releases_blocked_waiter() {
        let signal = Arc::new(ReadySignal::new());
        signal.open();

        let waiter = {
            let signal = Arc::clone(&signal);
            thread::spawn(move || signal.take(None))
        };

        thread::sleep(Duration::from_millis(20));
        signal.close();

        let outcome = waiter.join();
        assert!(matches!(outcome, Ok(WaitOutcome::Stopped)), "got {outcome:?}");
    }

    #[test]
    fn test_publish_wakes_blocked_waiter() {
        let signal = Arc::new(ReadySignal::new());
        signal.open();

        let waiter = {
            let signal = Arc::clone(&signal);
            thread::spawn(move || signal.take(soon(2_000)))
        };

        thread::sleep(Duration::from_millis(20));
        signal.publish();

        let outcome = waiter.join();
        assert!(matches!(outcome, Ok(WaitOutcome::Ready)), "got {outcome:?}");
    }

    #[test]
    fn test_next_generation_does_not_consume() {
        let signal = ReadySignal::new();
        signal.open();
        let start = signal.generation();
        signal.publish();

        let (outcome, seen) = signal.next_generation(start, soon(5));
        assert_eq!(outcome, WaitOutcome::Ready);
        assert_eq!(seen, start + 1);
        assert!(signal.is_pending());

        let (outcome, again) = signal.next_generation(seen, soon(5));
        assert_eq!(outcome, WaitOutcome::TimedOut);
        assert_eq!(again, seen);
    }

    #[test]
    fn test_next_generation_stops_when_closed() {
        let signal = ReadySignal::new();
        signal.open();
        signal.publish();
        signal.close();

        let (outcome, _) = signal.next_generation(0, None);
        assert_eq!(outcome, WaitOutcome::Stopped);
    }

    #[test]
    fn test_wait_outcome_is_ready() {
        assert!(WaitOutcome::Ready.is_ready());
        assert!(!WaitOutcome::Stopped.is_ready());
        assert!(!WaitOutcome::TimedOut.is_ready());
    }
}
