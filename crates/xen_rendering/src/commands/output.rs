//! Shared result slot filled by a deferred command.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

/// Where a queued command puts what it produced (e.g. freshly created ids).
///
/// The command holds one clone, the caller keeps another. The slot stays
/// valid no matter when the queue drains, so a command can never write
/// through a dangling reference.
///
/// ```rust,ignore
/// let buffers = CommandOutput::new();
/// render.submit(CreateBuffersCommand::new(2).into_output(&buffers));
/// render.execute();
/// let ids = buffers.take().unwrap_or_default();
/// ```
pub struct CommandOutput<T> {
    slot: Arc<Mutex<Option<T>>>,
}

impl<T> CommandOutput<T> {
    /// Creates an empty slot.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slot: Arc::new(Mutex::new(None)),
        }
    }

    /// Stores a value, replacing any previous one.
    pub fn set(&self, value: T) {
        *self.slot.lock() = Some(value);
    }

    /// Takes the value out, leaving the slot empty.
    pub fn take(&self) -> Option<T> {
        self.slot.lock().take()
    }

    /// Returns true once the producing command has run.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.slot.lock().is_some()
    }

    /// Runs `f` on the stored value without taking it.
    pub fn with<R>(&self, f: impl FnOnce(Option<&T>) -> R) -> R {
        f(self.slot.lock().as_ref())
    }
}

impl<T: Clone> CommandOutput<T> {
    /// Clones the stored value.
    #[must_use]
    pub fn get(&self) -> Option<T> {
        self.slot.lock().clone()
    }
}

impl<T> Clone for CommandOutput<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<T> Default for CommandOutput<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug> fmt::Debug for CommandOutput<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CommandOutput").field(&*self.slot.lock()).finish()
    }
}
