//! Frame pacer: lifecycle, configuration and the pacing loop.
//!
//! The pacer owns one background thread. Each cycle that thread marks the
//! ready signal, measures how long signaling took, lets the
//! [`DriftCorrector`] pick the next interval and sleeps for the remainder.
//! Waiters block on the signal; `stop()` closes it before joining the loop so
//! nobody stays blocked once the pacer is down.

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, trace, warn};

use crate::config::PacerConfig;
use crate::correction::{Correction, DriftCorrector};
use crate::counters::{CounterSnapshot, PacerCounters};
use crate::error::{PacerError, PacerResult};
use crate::jitter::{JitterReport, PeriodJitter};
use crate::signal::{ReadySignal, WaitOutcome};
use crate::subscriber::FrameSubscriber;

/// Depth of the loop command queue. Retargets coalesce, so a full queue is harmless.
const COMMAND_QUEUE_DEPTH: usize = 16;

/// Commands delivered to the pacing loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PacerCommand {
    /// Configuration revision changed; re-read it now instead of after the sleep.
    Retarget,
    /// Exit the loop.
    Shutdown,
}

/// State shared between the pacer handle, its loop thread and subscribers.
#[derive(Debug)]
pub(crate) struct Shared {
    /// Authoritative configuration snapshot
    config: RwLock<PacerConfig>,

    /// Bumped on every configuration change
    revision: AtomicU64,

    /// Effective interval in milliseconds, published by the loop
    render_interval_ms: AtomicI64,

    running: AtomicBool,

    /// Set by `start()`, cleared by `stop()`
    epoch: Mutex<Option<Instant>>,

    pub(crate) signal: ReadySignal,

    counters: PacerCounters,

    jitter: Mutex<PeriodJitter>,
}

#[derive(Debug, Default)]
struct Lifecycle {
    thread: Option<JoinHandle<()>>,
}

/// Adaptive frame pacer.
///
/// Throttles a background loop to a target frame rate and lets any number of
/// threads block until the next frame boundary. All operations take `&self`,
/// so a pacer is typically shared behind an `Arc`.
///
/// # Waiting
///
/// - [`wait_for_frame`](Self::wait_for_frame) consumes a single-slot flag:
///   each frame has exactly one winner among concurrent callers, and frames
///   that nobody collected coalesce into one.
/// - [`subscribe`](Self::subscribe) returns a [`FrameSubscriber`] that wakes
///   once per frame independently of every other subscriber.
///
/// Both return promptly once the pacer is stopped.
///
/// # Example
///
/// ```no_run
/// use frame_pacer::FramePacer;
///
/// let pacer = FramePacer::new();
/// pacer.start().expect("failed to start pacer");
///
/// while pacer.wait_for_frame() {
///     // render one frame
/// #   break;
/// }
///
/// pacer.stop().expect("pacing loop panicked");
/// ```
#[derive(Debug)]
pub struct FramePacer {
    shared: Arc<Shared>,

    /// Serializes `start()`/`stop()` and owns the loop thread handle
    lifecycle: Mutex<Lifecycle>,

    command_tx: Sender<PacerCommand>,

    /// Kept so the channel never disconnects; cloned into each loop thread
    command_rx: Receiver<PacerCommand>,
}

impl FramePacer {
    /// Create a stopped pacer with the default configuration (60 fps).
    #[must_use]
    pub fn new() -> Self {
        Self::from_valid_config(PacerConfig::default())
    }

    /// Create a stopped pacer with `config`.
    ///
    /// # Errors
    ///
    /// Returns [`PacerError::InvalidConfiguration`] if `config` fails validation.
    pub fn with_config(config: PacerConfig) -> PacerResult<Self> {
        config.validate()?;
        Ok(Self::from_valid_config(config))
    }

    fn from_valid_config(config: PacerConfig) -> Self {
        let (command_tx, command_rx) = channel::bounded(COMMAND_QUEUE_DEPTH);
        let render_interval_ms = ms_to_i64(config.nominal_interval_ms());
        let jitter = PeriodJitter::with_capacity(config.jitter_samples);

        debug!(
            target_fps = config.target_fps,
            interval_ms = render_interval_ms,
            policy = %config.correction.policy,
            "Creating frame pacer"
        );

        Self {
            shared: Arc::new(Shared {
                config: RwLock::new(config),
                revision: AtomicU64::new(0),
                render_interval_ms: AtomicI64::new(render_interval_ms),
                running: AtomicBool::new(false),
                epoch: Mutex::new(None),
                signal: ReadySignal::new(),
                counters: PacerCounters::new(),
                jitter: Mutex::new(jitter),
            }),
            lifecycle: Mutex::new(Lifecycle::default()),
            command_tx,
            command_rx,
        }
    }

    /// Start the pacing loop.
    ///
    /// Resets the epoch, drift correction and jitter statistics, then spawns
    /// the loop thread. Calling this while already running does nothing.
    ///
    /// # Errors
    ///
    /// Returns [`PacerError::ThreadSpawn`] if the thread cannot be spawned;
    /// the pacer is left stopped.
    pub fn start(&self) -> PacerResult {
        let mut lifecycle = self.lifecycle.lock();

        if lifecycle.thread.is_some() {
            if self.shared.running.load(Ordering::Acquire) {
                debug!("Frame pacer already running");
                return Ok(());
            }
            // The loop exited on its own; reap it before starting a new one.
            if let Err(err) = self.reap(&mut lifecycle) {
                warn!(error = %err, "Reaped failed pacing loop before restart");
            }
        }

        // Commands left over from the previous run
        while self.command_rx.try_recv().is_ok() {}

        // Revision first: a concurrent set_fps after this point is picked up by the loop.
        let revision = self.shared.revision.load(Ordering::Acquire);
        let config = self.shared.config.read().clone();
        let corrector = DriftCorrector::new(config.nominal_interval(), &config.correction);

        self.shared
            .render_interval_ms
            .store(corrector.interval_ms(), Ordering::Release);
        self.shared.jitter.lock().reset();

        let epoch = Instant::now();
        *self.shared.epoch.lock() = Some(epoch);
        self.shared.running.store(true, Ordering::Release);
        self.shared.signal.open();

        let pacer_loop = PacerLoop::new(
            Arc::clone(&self.shared),
            self.command_rx.clone(),
            corrector,
            revision,
        );

        match thread::Builder::new()
            .name(config.thread_name.clone())
            .spawn(move || pacer_loop.run())
        {
            Ok(handle) => {
                lifecycle.thread = Some(handle);
                info!(
                    target_fps = config.target_fps,
                    interval_ms = config.nominal_interval_ms(),
                    thread = %config.thread_name,
                    "Frame pacer started"
                );
                Ok(())
            }
            Err(source) => {
                self.shared.running.store(false, Ordering::Release);
                self.shared.signal.close();
                *self.shared.epoch.lock() = None;
                error!(thread = %config.thread_name, error = %source, "Failed to spawn pacing thread");
                Err(PacerError::thread_spawn(config.thread_name, source))
            }
        }
    }

    /// Stop the pacing loop and wait for it to exit.
    ///
    /// Every thread blocked in [`wait_for_frame`](Self::wait_for_frame) or a
    /// subscriber wait is released before the join. Calling this while
    /// stopped does nothing.
    ///
    /// # Errors
    ///
    /// Returns [`PacerError::LoopPanicked`] if the loop thread panicked. The
    /// thread is reaped and the pacer is stopped either way.
    pub fn stop(&self) -> PacerResult {
        let mut lifecycle = self.lifecycle.lock();
        if lifecycle.thread.is_none() {
            return Ok(());
        }

        info!("Stopping frame pacer");
        self.shared.running.store(false, Ordering::Release);
        self.shared.signal.close();

        // A full queue wakes the loop just as well; it re-checks `running` on every command.
        if let Err(err) = self.command_tx.try_send(PacerCommand::Shutdown) {
            debug!(error = %err, "Shutdown command not queued");
        }

        self.reap(&mut lifecycle)
    }

    fn loop_state(&self) -> LoopState {
        if self.lifecycle.lock().thread.is_none() {
            LoopState::Idle
        } else if self.shared.running.load(Ordering::Acquire) {
            LoopState::Running
        } else {
            LoopState::Exited
        }
    }

    fn reap(&self, lifecycle: &mut Lifecycle) -> PacerResult {
        *self.shared.epoch.lock() = None;

        let Some(handle) = lifecycle.thread.take() else {
            return Ok(());
        };

        match handle.join() {
            Ok(()) => {
                info!("Frame pacer stopped");
                Ok(())
            }
            Err(_) => {
                error!("Pacing loop panicked");
                Err(PacerError::LoopPanicked)
            }
        }
    }

    /// Change the target frame rate.
    ///
    /// Values `<= 0` are ignored, as is the current rate. A running loop
    /// applies the new interval immediately, including to the sleep in progress.
    pub fn set_fps(&self, fps: i32) {
        if let Err(err) = self.try_set_fps(fps) {
            debug!(fps, error = %err, "Ignoring frame rate change");
        }
    }

    /// Change the target frame rate, reporting invalid input.
    ///
    /// # Errors
    ///
    /// Returns [`PacerError::InvalidFps`] if `fps <= 0`.
    pub fn try_set_fps(&self, fps: i32) -> PacerResult {
        let target_fps = u32::try_from(fps)
            .ok()
            .filter(|fps| *fps > 0)
            .ok_or_else(|| PacerError::invalid_fps(fps))?;

        let interval_ms = {
            let mut config = self.shared.config.write();
            if config.target_fps == target_fps {
                return Ok(());
            }
            config.target_fps = target_fps;
            let interval_ms = ms_to_i64(config.nominal_interval_ms());
            self.shared
                .render_interval_ms
                .store(interval_ms, Ordering::Release);
            self.shared.revision.fetch_add(1, Ordering::AcqRel);
            interval_ms
        };

        if self.shared.running.load(Ordering::Acquire)
            && let Err(err) = self.command_tx.try_send(PacerCommand::Retarget)
        {
            trace!(error = %err, "Retarget already pending");
        }

        debug!(target_fps, interval_ms, "Frame rate changed");
        Ok(())
    }

    /// Block until the next frame is ready and consume it.
    ///
    /// Returns `true` when a frame was consumed and `false` when the pacer is
    /// stopped (or stops while waiting).
    pub fn wait_for_frame(&self) -> bool {
        self.take_frame(None).is_ready()
    }

    /// Like [`wait_for_frame`](Self::wait_for_frame) with an upper bound on the wait.
    pub fn wait_for_frame_timeout(&self, timeout: Duration) -> WaitOutcome {
        self.take_frame(Instant::now().checked_add(timeout))
    }

    fn take_frame(&self, deadline: Option<Instant>) -> WaitOutcome {
        let outcome = self.shared.signal.take(deadline);
        match outcome {
            WaitOutcome::Ready => self.shared.counters.inc_frame_taken(),
            WaitOutcome::Stopped => self.shared.counters.inc_cancelled_wait(),
            WaitOutcome::TimedOut => {}
        }
        outcome
    }

    /// Subscribe to every frame boundary from now on.
    #[must_use]
    pub fn subscribe(&self) -> FrameSubscriber {
        FrameSubscriber::new(Arc::clone(&self.shared))
    }

    /// Current effective interval in whole milliseconds.
    ///
    /// Best effort: may briefly lag a concurrent correction or `set_fps`.
    /// Under the cumulative correction policy this can reach zero or below.
    pub fn get_render_interval(&self) -> i64 {
        self.shared.render_interval_ms.load(Ordering::Acquire)
    }

    /// Current target frame rate.
    pub fn target_fps(&self) -> u32 {
        self.shared.config.read().target_fps
    }

    /// Snapshot of the current configuration.
    pub fn config(&self) -> PacerConfig {
        self.shared.config.read().clone()
    }

    /// Whether the pacing loop is running.
    #[inline]
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    /// Whether a frame is marked ready and not yet consumed.
    pub fn is_frame_pending(&self) -> bool {
        self.shared.signal.is_pending()
    }

    /// Time since the last `start()`, or `None` while stopped.
    pub fn uptime(&self) -> Option<Duration> {
        self.shared.epoch.lock().map(|epoch| epoch.elapsed())
    }

    /// Snapshot of the lifetime counters.
    pub fn counters(&self) -> CounterSnapshot {
        self.shared.counters.snapshot()
    }

    /// Period jitter since the last `start()`.
    pub fn jitter_report(&self) -> JitterReport {
        self.shared.jitter.lock().report()
    }
}

impl Default for FramePacer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for FramePacer {
    fn drop(&mut self) {
        match self.loop_state() {
            LoopState::Idle => return,
            LoopState::Running => warn!("Frame pacer dropped while still running - forcing stop"),
            LoopState::Exited => debug!("Frame pacer dropped with an unreaped loop thread"),
        }
        if let Err(err) = self.stop() {
            error!(error = %err, "Frame pacer did not stop cleanly");
        }
    }
}

/// Loop thread state as seen from the handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopState {
    /// No loop thread
    Idle,
    Running,
    /// The loop exited on its own and has not been joined yet
    Exited,
}

#[inline]
fn ms_to_i64(ms: u64) -> i64 {
    i64::try_from(ms).unwrap_or(i64::MAX)
}

/// Marks the pacer stopped and releases waiters however the loop exits.
struct LoopExitGuard {
    shared: Arc<Shared>,
}

impl Drop for LoopExitGuard {
    fn drop(&mut self) {
        if thread::panicking() {
            error!("Pacing loop panicked - releasing waiters");
        }
        self.shared.running.store(false, Ordering::Release);
        self.shared.signal.close();
    }
}

/// Everything the loop thread owns.
struct PacerLoop {
    shared: Arc<Shared>,
    command_rx: Receiver<PacerCommand>,
    corrector: DriftCorrector,

    /// Configuration revision the corrector was built from
    revision: u64,

    last_frame_start: Option<Instant>,

    /// Interval the previous period aimed for
    last_target_ns: i64,

    /// Latched so sustained saturation or collapse is reported once per episode
    saturation_reported: bool,
    collapse_reported: bool,
}

impl PacerLoop {
    fn new(
        shared: Arc<Shared>,
        command_rx: Receiver<PacerCommand>,
        corrector: DriftCorrector,
        revision: u64,
    ) -> Self {
        let last_target_ns = corrector.interval_ns();
        Self {
            shared,
            command_rx,
            corrector,
            revision,
            last_frame_start: None,
            last_target_ns,
            saturation_reported: false,
            collapse_reported: false,
        }
    }

    fn run(mut self) {
        let _exit = LoopExitGuard {
            shared: Arc::clone(&self.shared),
        };

        info!(
            interval_ms = self.corrector.interval_ms(),
            policy = %self.corrector.policy(),
            "Pacing loop started"
        );

        while self.shared.running.load(Ordering::Acquire) {
            self.apply_config_changes();

            let frame_start = Instant::now();
            self.shared.signal.publish();
            let frame_duration = frame_start.elapsed();
            // After the measurement: a concurrent report may hold the jitter lock.
            self.record_period(frame_start);

            let correction = self.corrector.observe(frame_duration);
            self.shared
                .render_interval_ms
                .store(self.corrector.interval_ms(), Ordering::Release);
            self.report_correction(&correction);

            let sleep = correction.sleep();
            self.shared
                .counters
                .record_cycle(correction.overran(), sleep.is_some());
            self.last_target_ns = correction.interval_ns;

            let keep_running = match sleep {
                Some(sleep) => {
                    let deadline = frame_start
                        .checked_add(frame_duration.saturating_add(sleep))
                        .unwrap_or_else(Instant::now);
                    self.sleep_until(deadline, frame_start)
                }
                None => self.drain_commands(),
            };

            if !keep_running {
                break;
            }
        }

        info!("Pacing loop stopping");
    }

    /// Sleep until `deadline`, waking early for commands.
    ///
    /// A retarget moves the deadline to `frame_start` plus the new interval.
    /// Returns `false` when the loop should exit.
    fn sleep_until(&mut self, mut deadline: Instant, frame_start: Instant) -> bool {
        loop {
            match self.command_rx.recv_deadline(deadline) {
                Err(RecvTimeoutError::Timeout) => return true,
                Ok(PacerCommand::Shutdown) | Err(RecvTimeoutError::Disconnected) => return false,
                Ok(PacerCommand::Retarget) => {
                    if !self.shared.running.load(Ordering::Acquire) {
                        return false;
                    }
                    if self.apply_config_changes() {
                        let Some(interval) = self.corrector.interval() else {
                            return true;
                        };
                        self.last_target_ns = self.corrector.interval_ns();
                        deadline = frame_start.checked_add(interval).unwrap_or(deadline);
                    }
                }
            }
        }
    }

    /// Handle queued commands without blocking. Returns `false` when the loop should exit.
    fn drain_commands(&mut self) -> bool {
        loop {
            match self.command_rx.try_recv() {
                Err(TryRecvError::Empty) => return true,
                Ok(PacerCommand::Shutdown) | Err(TryRecvError::Disconnected) => return false,
                Ok(PacerCommand::Retarget) => {
                    self.apply_config_changes();
                }
            }
        }
    }

    /// Rebuild the corrector if the configuration revision moved.
    fn apply_config_changes(&mut self) -> bool {
        let revision = self.shared.revision.load(Ordering::Acquire);
        if revision == self.revision {
            return false;
        }

        let (target_fps, nominal) = {
            let config = self.shared.config.read();
            (config.target_fps, config.nominal_interval())
        };
        self.revision = revision;
        self.corrector.set_nominal(nominal);
        self.saturation_reported = false;
        self.collapse_reported = false;
        self.shared
            .render_interval_ms
            .store(self.corrector.interval_ms(), Ordering::Release);

        debug!(
            target_fps,
            interval_ms = self.corrector.interval_ms(),
            "Pacing loop retargeted"
        );
        true
    }

    fn record_period(&mut self, frame_start: Instant) {
        if let Some(previous) = self.last_frame_start.replace(frame_start) {
            let period = frame_start.saturating_duration_since(previous);
            self.shared
                .jitter
                .lock()
                .record_period(period, self.last_target_ns);
        }
    }

    fn report_correction(&mut self, correction: &Correction) {
        if correction.overran() {
            trace!(
                overrun_ns = correction.overrun_ns,
                next_interval_ns = correction.next_interval_ns,
                "Frame signaling overran interval"
            );
        }

        if correction.saturated {
            if !self.saturation_reported {
                warn!(
                    interval_ns = correction.next_interval_ns,
                    nominal_ns = self.corrector.nominal_ns(),
                    "Drift correction saturated"
                );
                self.saturation_reported = true;
            }
        } else {
            self.saturation_reported = false;
        }

        if self.corrector.is_collapsed() && !self.collapse_reported {
            warn!(
                interval_ns = self.corrector.interval_ns(),
                "Frame interval collapsed; pacing loop is spinning"
            );
            self.collapse_reported = true;
        }
    }
}
