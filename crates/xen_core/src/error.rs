//! # Core Error Types
//!
//! Misuse of the [`StateBuffer`](crate::StateBuffer) is reported as a typed
//! error instead of undefined behavior. Backpressure (stale frames, replaced
//! snapshots) is normal flow control and never shows up here.

use thiserror::Error;

/// Errors raised by the triple buffer at its API boundary.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateBufferError {
    /// A buffer accessor or swap was called before `init()`.
    #[error("state buffer used before init()")]
    NotInitialized,

    /// `init()` was called on a buffer that is already initialized.
    #[error("state buffer already initialized; call cleanup() first")]
    AlreadyInitialized,

    /// The write side is already claimed (a live write guard or a swap in flight).
    #[error("write slot already claimed: only one writer at a time")]
    WriterBusy,

    /// The read side is already claimed (a live read guard or a swap in flight).
    #[error("read slot already claimed: only one reader at a time")]
    ReaderBusy,
}

/// Result type for state buffer operations.
pub type StateBufferResult<T> = Result<T, StateBufferError>;
