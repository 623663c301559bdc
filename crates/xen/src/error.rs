//! Engine-level errors.
//!
//! Everything that can stop the engine from starting, or end a run early,
//! funnels into [`EngineError`]. The demo binary logs it and exits non-zero.

use std::io;
use std::path::PathBuf;

use thiserror::Error;
use xen_core::StateBufferError;
use xen_rendering::RenderError;

/// Errors surfaced by [`GameLoop::run`](crate::GameLoop::run) and config loading.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The config file could not be read.
    #[error("failed to read config {}: {source}", .path.display())]
    ConfigRead {
        /// File that was requested.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// The config file is not valid TOML for [`EngineConfig`](crate::EngineConfig).
    #[error("invalid config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// The config could not be written back out.
    #[error("config serialization failed: {0}")]
    ConfigWrite(#[from] toml::ser::Error),

    /// A config value is out of range.
    #[error("invalid config value: {0}")]
    InvalidConfig(String),

    /// Graphics device or render system failure.
    #[error(transparent)]
    Render(#[from] RenderError),

    /// State buffer misuse.
    #[error(transparent)]
    State(#[from] StateBufferError),

    /// The simulation thread could not be started.
    #[error("failed to spawn simulation thread: {0}")]
    ThreadSpawn(#[source] io::Error),

    /// The simulation thread panicked.
    #[error("simulation thread panicked")]
    SimulationPanicked,

    /// The game's own content failed to load.
    #[error("content load failed: {0}")]
    Content(String),
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
