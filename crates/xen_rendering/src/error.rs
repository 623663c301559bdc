//! # Rendering Error Types
//!
//! Driver errors raised while draining a queue are logged, not returned.
//! Synchronous entry points (`execute_immediate`, device creation) return
//! them as [`RenderError`].

use thiserror::Error;

/// Error reported by a [`GraphicsDevice`](crate::GraphicsDevice) after a call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    /// A call referenced a name the driver never handed out (or already deleted).
    #[error("invalid {kind} handle: {name}")]
    InvalidHandle {
        /// Object kind ("buffer", "texture", "framebuffer").
        kind: &'static str,
        /// The raw name.
        name: u32,
    },

    /// The call is not legal in the current driver state.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// The driver could not allocate the requested objects.
    #[error("out of GPU memory: {requested} objects requested, {live} live")]
    OutOfMemory {
        /// Objects requested by the failing call.
        requested: usize,
        /// Objects alive at the time.
        live: usize,
    },

    /// Backend-specific failure (validation layer message etc).
    #[error("backend error: {0}")]
    Backend(String),
}

/// Errors raised by command submission.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueError {
    /// A command tried to submit into the queue that is currently draining it.
    #[error("re-entrant submission: command submitted while its queue drains on this thread")]
    ReentrantSubmission,

    /// The cross-thread channel is at capacity.
    #[error("command channel full ({capacity} pending)")]
    Full {
        /// Channel capacity.
        capacity: usize,
    },

    /// The render system owning the channel is gone.
    #[error("command channel disconnected")]
    Disconnected,
}

/// Errors surfaced by the render system.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    /// Driver error after a synchronous call.
    #[error(transparent)]
    Device(#[from] DeviceError),

    /// Submission error.
    #[error(transparent)]
    Queue(#[from] QueueError),

    /// The device handed out fewer objects than requested.
    #[error("failed to allocate {what}")]
    Allocation {
        /// What was being allocated.
        what: &'static str,
    },

    /// No usable graphics adapter/device could be created.
    #[error("graphics device unavailable: {0}")]
    Unavailable(String),
}

/// Result type for render system operations.
pub type RenderResult<T> = Result<T, RenderError>;
