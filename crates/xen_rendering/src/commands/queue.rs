//! # Command Queue
//!
//! ```text
//!   Idle ──submit──> Accumulating ──execute──> Draining ──> Idle
//!     ▲                   │
//!     └──────clear────────┘
//! ```
//!
//! Draining is strictly FIFO and every entry runs exactly once. Both
//! `submit` and `execute` take `&mut self`, so a command can never reach the
//! queue that is running it; cross-thread producers go through
//! [`CommandSender`](super::CommandSender) instead.

use std::collections::VecDeque;
use std::fmt;

use super::command::RenderCommand;
use crate::device::GraphicsDevice;

/// A type-erased queued command.
pub(crate) type QueuedCommand = Box<dyn FnOnce(&mut dyn GraphicsDevice) + Send>;

/// Erases a command's type (and output) for queueing.
pub(crate) fn erase<C: RenderCommand>(command: C) -> QueuedCommand {
    Box::new(move |device: &mut dyn GraphicsDevice| {
        // Queued commands report results through `CommandOutput`s.
        let _ = command.execute(device);
    })
}

/// Where a queue is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QueueState {
    /// Nothing pending.
    Idle,
    /// Commands pending.
    Accumulating,
    /// `execute()` in progress.
    Draining,
}

/// Ordered list of deferred GPU operations.
#[derive(Default)]
pub struct CommandQueue {
    commands: VecDeque<QueuedCommand>,
    draining: bool,
    /// Commands executed over the queue's lifetime.
    executed_total: u64,
}

impl CommandQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a command. Returns the queue for chaining.
    ///
    /// ```rust,ignore
    /// queue
    ///     .submit(BindFramebufferCommand(Some(fb)))
    ///     .submit(ClearCommand::new(0.0, 0.0, 0.0, 1.0));
    /// ```
    pub fn submit<C: RenderCommand>(&mut self, command: C) -> &mut Self {
        self.commands.push_back(erase(command));
        self
    }

    pub(crate) fn push_erased(&mut self, command: QueuedCommand) {
        self.commands.push_back(command);
    }

    /// Number of pending commands.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Returns true if nothing is pending.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> QueueState {
        if self.draining {
            QueueState::Draining
        } else if self.commands.is_empty() {
            QueueState::Idle
        } else {
            QueueState::Accumulating
        }
    }

    /// Commands executed since the queue was created.
    #[must_use]
    pub fn executed_total(&self) -> u64 {
        self.executed_total
    }

    /// Runs every pending command front to back, then leaves the queue empty.
    ///
    /// After each command the device is checked for errors; errors are
    /// logged and draining continues. Must run on the context thread (the
    /// device reference proves it).
    ///
    /// # Returns
    ///
    /// Number of commands executed.
    pub fn execute(&mut self, device: &mut dyn GraphicsDevice) -> usize {
        if self.commands.is_empty() {
            return 0;
        }

        self.draining = true;
        let mut executed = 0usize;
        while let Some(command) = self.commands.pop_front() {
            command(device);
            executed += 1;
            if let Some(error) = device.check_error() {
                tracing::error!(
                    "GPU error after queued command {} on {}: {}",
                    executed,
                    device.name(),
                    error
                );
            }
        }
        self.draining = false;
        self.executed_total += executed as u64;

        tracing::trace!("command queue drained: {} commands", executed);
        executed
    }

    /// Drops every pending command without running it.
    ///
    /// # Returns
    ///
    /// Number of commands discarded.
    pub fn clear(&mut self) -> usize {
        let discarded = self.commands.len();
        self.commands.clear();
        discarded
    }
}

impl fmt::Debug for CommandQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandQueue")
            .field("pending", &self.commands.len())
            .field("state", &self.state())
            .field("executed_total", &self.executed_total)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;
    use crate::commands::ClearCommand;
    use crate::device::{DeviceCall, HeadlessDevice};
    use crate::error::DeviceError;

    fn tagger(log: &Arc<Mutex<Vec<char>>>, tag: char) -> impl FnOnce(&mut dyn GraphicsDevice) + Send + 'static {
        let log = Arc::clone(log);
        move |_: &mut dyn GraphicsDevice| log.lock().push(tag)
    }

    #[test]
    fn test_fifo_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut queue = CommandQueue::new();
        queue
            .submit(tagger(&log, 'A'))
            .submit(tagger(&log, 'B'))
            .submit(tagger(&log, 'C'));
        assert_eq!(queue.state(), QueueState::Accumulating);

        let mut device = HeadlessDevice::new();
        assert_eq!(queue.execute(&mut device), 3);
        assert_eq!(*log.lock(), vec!['A', 'B', 'C']);
        assert_eq!(queue.state(), QueueState::Idle);
    }

    #[test]
    fn test_execute_empty_is_noop() {
        let mut queue = CommandQueue::new();
        let mut device = HeadlessDevice::new();
        assert_eq!(queue.execute(&mut device), 0);
        assert!(device.calls().is_empty());
    }

    #[test]
    fn test_each_command_runs_once() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut queue = CommandQueue::new();
        queue.submit(tagger(&log, 'A'));

        let mut device = HeadlessDevice::new();
        queue.execute(&mut device);
        queue.execute(&mut device);
        assert_eq!(*log.lock(), vec!['A']);
        assert_eq!(queue.executed_total(), 1);
    }

    #[test]
    fn test_clear_discards_pending() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut queue = CommandQueue::new();
        queue.submit(tagger(&log, 'A')).submit(tagger(&log, 'B'));
        assert_eq!(queue.clear(), 2);

        let mut device = HeadlessDevice::new();
        assert_eq!(queue.execute(&mut device), 0);
        assert!(log.lock().is_empty());
    }

    #[test]
    fn test_device_errors_do_not_stop_draining() {
        let mut queue = CommandQueue::new();
        queue
            .submit(|d: &mut dyn GraphicsDevice| {
                d.bind_framebuffer(Some(xen_core::FramebufferId(77)));
            })
            .submit(ClearCommand::new(0.0, 0.0, 0.0, 1.0));

        let mut device = HeadlessDevice::new();
        device.inject_error(DeviceError::Backend("stale".into()));
        assert_eq!(queue.execute(&mut device), 2);
        assert_eq!(device.calls().last(), Some(&DeviceCall::Clear([0.0, 0.0, 0.0, 1.0])));
        // Errors were consumed by the per-command check.
        assert!(device.check_error().is_none());
    }
}
