//! Error types for the frame pacer.

use thiserror::Error;

/// Errors reported by [`FramePacer`](crate::FramePacer) operations.
#[derive(Debug, Error)]
pub enum PacerError {
    /// Requested frame rate is zero or negative.
    #[error("Invalid frame rate: {0} (must be greater than 0)")]
    InvalidFps(i32),

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The OS refused to spawn the pacing thread.
    #[error("Failed to spawn pacing thread '{name}': {source}")]
    ThreadSpawn {
        /// Name the thread was spawned with.
        name: String,
        /// Underlying spawn error.
        #[source]
        source: std::io::Error,
    },

    /// The pacing loop panicked; the thread has been reaped.
    #[error("Pacing loop panicked")]
    LoopPanicked,
}

impl PacerError {
    /// Create an invalid frame rate error.
    #[must_use]
    pub fn invalid_fps(fps: i32) -> Self {
        Self::InvalidFps(fps)
    }

    /// Create an invalid configuration error.
    #[must_use]
    pub fn invalid_configuration(reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration(reason.into())
    }

    /// Create a thread spawn error.
    #[must_use]
    pub fn thread_spawn(name: impl Into<String>, source: std::io::Error) -> Self {
        Self::ThreadSpawn {
            name: name.into(),
            source,
        }
    }
}

/// A specialized `Result` type for pacer operations.
pub type PacerResult<T = ()> = std::result::Result<T, PacerError>;
