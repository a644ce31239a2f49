//! Adaptive frame pacing for render loops.
//!
//! A [`FramePacer`] runs a background loop at a target frame rate and lets
//! consumer threads block until the next frame boundary. It includes:
//!
//! - **Single-slot ready signal**: each frame is consumed by exactly one
//!   waiter; frames nobody collected coalesce instead of queueing
//! - **Drift correction**: signaling overhead that exceeds the interval
//!   shortens later intervals, bounded by default (see [`CorrectionPolicy`])
//! - **Shutdown-safe waits**: `stop()` releases every blocked waiter, and
//!   waits on a stopped pacer return immediately
//! - **Broadcast subscriptions**: [`FrameSubscriber`] wakes once per frame
//!   for every subscriber
//! - **Diagnostics**: lifetime [`CounterSnapshot`]s and period [`JitterReport`]s
//!
//! # Example
//!
//! ```no_run
//! use frame_pacer::FramePacer;
//! use std::sync::Arc;
//! use std::thread;
//!
//! let pacer = Arc::new(FramePacer::new());
//! pacer.start().expect("failed to start pacer");
//!
//! let render = {
//!     let pacer = Arc::clone(&pacer);
//!     thread::spawn(move || {
//!         while pacer.wait_for_frame() {
//!             // draw
//!         }
//!     })
//! };
//!
//! pacer.set_fps(30);
//! println!("interval: {} ms", pacer.get_render_interval());
//!
//! pacer.stop().expect("pacing loop panicked");
//! render.join().expect("render thread panicked");
//! ```

#![deny(unsafe_op_in_unsafe_fn)]
#![deny(clippy::unwrap_used)]
#![deny(static_mut_refs)]
#![deny(unused_must_use)]

pub mod config;
pub mod correction;
pub mod counters;
pub mod error;
pub mod jitter;
pub mod pacer;
mod signal;
pub mod subscriber;

pub mod prelude;

pub use config::{
    CorrectionConfig, CorrectionPolicy, DEFAULT_FPS, PacerConfig, PacerConfigBuilder,
    interval_ms_for_fps,
};
pub use correction::{Correction, DriftCorrector};
pub use counters::{CounterSnapshot, PacerCounters};
pub use error::{PacerError, PacerResult};
pub use jitter::{JitterReport, PeriodJitter};
pub use pacer::FramePacer;
pub use signal::WaitOutcome;
pub use subscriber::FrameSubscriber;
