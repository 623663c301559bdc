//! # Scoped Batch Queue
//!
//! A private queue that executes when it goes out of scope, on every exit
//! path. Related calls submitted to one batch run back to back, in order,
//! and can never be left behind in a queue nobody drains.
//!
//! ```rust,ignore
//! {
//!     let mut batch = render.batch();
//!     batch
//!         .submit(CreateFramebuffersCommand::new(1).into_output(&fb))
//!         .submit(CreateTexturesCommand::new(1, desc).into_output(&color));
//! } // <- executed here
//! ```

use crate::commands::{CommandQueue, RenderCommand};
use crate::device::GraphicsDevice;

/// Queue that drains into `device` on drop.
pub struct ScopedBatchQueue<'a> {
    device: &'a mut dyn GraphicsDevice,
    queue: CommandQueue,
}

impl<'a> ScopedBatchQueue<'a> {
    /// Opens an empty batch against `device`.
    pub fn new(device: &'a mut dyn GraphicsDevice) -> Self {
        Self {
            device,
            queue: CommandQueue::new(),
        }
    }

    /// Adds a command to the batch.
    pub fn submit<C: RenderCommand>(&mut self, command: C) -> &mut Self {
        self.queue.submit(command);
        self
    }

    /// Commands waiting for scope exit.
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Returns true if nothing was submitted yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

impl Drop for ScopedBatchQueue<'_> {
    fn drop(&mut self) {
        let executed = self.queue.execute(self.device);
        tracing::trace!("scoped batch executed {} commands", executed);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;
    use crate::commands::{ClearCommand, CommandOutput, CreateBuffersCommand};
    use crate::device::{DeviceCall, HeadlessDevice};

    #[test]
    fn test_executes_on_scope_exit() {
        let runs = Arc::new(Mutex::new(0u32));
        let mut device = HeadlessDevice::new();
        {
            let first = Arc::clone(&runs);
            let second = Arc::clone(&runs);
            let mut batch = ScopedBatchQueue::new(&mut device);
            batch
                .submit(move |_: &mut dyn GraphicsDevice| *first.lock() += 1)
                .submit(move |_: &mut dyn GraphicsDevice| *second.lock() += 1);
            assert_eq!(batch.len(), 2);
            assert_eq!(*runs.lock(), 0);
        }
        assert_eq!(*runs.lock(), 2);
    }

    #[test]
    fn test_executes_on_early_return() {
        fn build(device: &mut HeadlessDevice, bail: bool) -> Option<()> {
            let mut batch = ScopedBatchQueue::new(device);
            batch.submit(ClearCommand::new(0.0, 0.0, 1.0, 1.0));
            if bail {
                return None;
            }
            batch.submit(ClearCommand::new(1.0, 0.0, 0.0, 1.0));
            Some(())
        }

        let mut device = HeadlessDevice::new();
        assert!(build(&mut device, true).is_none());
        assert_eq!(device.calls(), &[DeviceCall::Clear([0.0, 0.0, 1.0, 1.0])]);
    }

    #[test]
    fn test_outputs_ready_after_scope() {
        let mut device = HeadlessDevice::new();
        let out = CommandOutput::new();
        {
            let mut batch = ScopedBatchQueue::new(&mut device);
            batch.submit(CreateBuffersCommand::new(2).into_output(&out));
            assert!(!out.is_ready());
        }
        assert_eq!(out.take().map(|ids| ids.len()), Some(2));
    }
}
