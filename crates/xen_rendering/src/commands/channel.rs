//! # Cross-Thread Submission
//!
//! The only sanctioned way for a non-context thread to cause GPU work:
//!
//! ```text
//! sim thread ──CommandSender::submit──> [bounded MPSC channel]
//!                                              │
//! context thread: RenderSystem::execute ──drain──> CommandQueue ──> device
//! ```
//!
//! The channel is lock-free on the submit side. Submitting from inside a
//! command that is currently being drained on the same thread is rejected
//! with [`QueueError::ReentrantSubmission`].

use std::sync::Arc;
use std::thread::{self, ThreadId};

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::Mutex;

use super::command::RenderCommand;
use super::queue::{erase, CommandQueue, QueuedCommand};
use crate::error::QueueError;

/// Which thread (if any) is draining the receiving queue right now.
#[derive(Debug, Default)]
struct DrainState {
    drainer: Mutex<Option<ThreadId>>,
}

impl DrainState {
    fn is_draining_on(&self, thread: ThreadId) -> bool {
        *self.drainer.lock() == Some(thread)
    }
}

/// Creates a connected sender/receiver pair holding at most `capacity`
/// pending commands.
#[must_use]
pub fn command_channel(capacity: usize) -> (CommandSender, CommandReceiver) {
    let (tx, rx) = bounded(capacity);
    let drain = Arc::new(DrainState::default());
    (
        CommandSender {
            tx,
            capacity,
            drain: Arc::clone(&drain),
        },
        CommandReceiver { rx, drain },
    )
}

/// Producer handle. Cheap to clone, `Send`, usable from any thread.
#[derive(Clone, Debug)]
pub struct CommandSender {
    tx: Sender<QueuedCommand>,
    capacity: usize,
    drain: Arc<DrainState>,
}

impl CommandSender {
    /// Queues a command for the next `RenderSystem::execute` (non-blocking).
    ///
    /// # Errors
    ///
    /// - [`QueueError::ReentrantSubmission`] if called from a command being
    ///   drained on this thread
    /// - [`QueueError::Full`] if the channel is at capacity
    /// - [`QueueError::Disconnected`] if the render system is gone
    pub fn submit<C: RenderCommand>(&self, command: C) -> Result<&Self, QueueError> {
        if self.drain.is_draining_on(thread::current().id()) {
            return Err(QueueError::ReentrantSubmission);
        }
        match self.tx.try_send(erase(command)) {
            Ok(()) => Ok(self),
            Err(TrySendError::Full(_)) => Err(QueueError::Full {
                capacity: self.capacity,
            }),
            Err(TrySendError::Disconnected(_)) => Err(QueueError::Disconnected),
        }
    }

    /// Commands waiting in the channel.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.tx.len()
    }
}

/// Consumer handle. Owned by the render system on the context thread.
pub struct CommandReceiver {
    rx: Receiver<QueuedCommand>,
    drain: Arc<DrainState>,
}

impl CommandReceiver {
    /// Moves everything pending in the channel to the back of `queue`.
    ///
    /// # Returns
    ///
    /// Number of commands moved.
    pub fn drain_into(&self, queue: &mut CommandQueue) -> usize {
        let mut moved = 0;
        while let Ok(command) = self.rx.try_recv() {
            queue.push_erased(command);
            moved += 1;
        }
        moved
    }

    /// Discards everything pending in the channel.
    pub fn discard(&self) -> usize {
        self.rx.try_iter().count()
    }

    /// Marks the calling thread as draining until the guard drops.
    #[must_use]
    pub fn begin_drain(&self) -> DrainGuard<'_> {
        *self.drain.drainer.lock() = Some(thread::current().id());
        DrainGuard { state: &self.drain }
    }
}

/// Clears the draining mark on drop.
pub struct DrainGuard<'a> {
    state: &'a DrainState,
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        *self.state.drainer.lock() = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::ClearCommand;
    use crate::device::{DeviceCall, GraphicsDevice, HeadlessDevice};

    #[test]
    fn test_submit_from_other_thread() {
        let (sender, receiver) = command_channel(16);
        let remote = sender.clone();
        thread::spawn(move || {
            remote.submit(ClearCommand::new(1.0, 0.0, 0.0, 1.0)).unwrap();
        })
        .join()
        .unwrap();

        let mut queue = CommandQueue::new();
        assert_eq!(receiver.drain_into(&mut queue), 1);
        let mut device = HeadlessDevice::new();
        queue.execute(&mut device);
        assert_eq!(device.calls(), &[DeviceCall::Clear([1.0, 0.0, 0.0, 1.0])]);
    }

    #[test]
    fn test_full_channel_is_reported() {
        let (sender, _receiver) = command_channel(1);
        sender.submit(ClearCommand::new(0.0, 0.0, 0.0, 0.0)).unwrap();
        assert_eq!(
            sender.submit(ClearCommand::new(0.0, 0.0, 0.0, 0.0)).err(),
            Some(QueueError::Full { capacity: 1 })
        );
    }

    #[test]
    fn test_disconnected_is_reported() {
        let (sender, receiver) = command_channel(4);
        drop(receiver);
        assert_eq!(
            sender.submit(ClearCommand::new(0.0, 0.0, 0.0, 0.0)).err(),
            Some(QueueError::Disconnected)
        );
    }

    #[test]
    fn test_reentrant_submission_is_rejected() {
        let (sender, receiver) = command_channel(4);
        let inner = sender.clone();
        let result = Arc::new(Mutex::new(None));
        let seen = Arc::clone(&result);
        sender
            .submit(move |_: &mut dyn GraphicsDevice| {
                *seen.lock() = Some(inner.submit(ClearCommand::new(0.0, 0.0, 0.0, 0.0)).err());
            })
            .unwrap();

        let mut queue = CommandQueue::new();
        receiver.drain_into(&mut queue);
        let mut device = HeadlessDevice::new();
        {
            let _draining = receiver.begin_drain();
            queue.execute(&mut device);
        }
        assert_eq!(*result.lock(), Some(Some(QueueError::ReentrantSubmission)));
        assert_eq!(receiver.discard(), 0);

        // Outside the drain the same sender works again.
        assert!(sender.submit(ClearCommand::new(0.0, 0.0, 0.0, 0.0)).is_ok());
    }
}
