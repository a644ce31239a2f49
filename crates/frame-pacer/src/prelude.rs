//! Prelude module for common pacer types.
//!
//! ```
//! use frame_pacer::prelude::*;
//!
//! let pacer = FramePacer::new();
//! assert_eq!(pacer.get_render_interval(), 16);
//! ```

pub use crate::config::{CorrectionPolicy, PacerConfig};
pub use crate::counters::CounterSnapshot;
pub use crate::error::{PacerError, PacerResult};
pub use crate::jitter::JitterReport;
pub use crate::pacer::FramePacer;
pub use crate::signal::WaitOutcome;
pub use crate::subscriber::FrameSubscriber;
