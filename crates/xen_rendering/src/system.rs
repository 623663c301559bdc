//! # Render System
//!
//! Owns the graphics device and everything that must only ever touch it from
//! the context thread:
//!
//! ```text
//! ┌──────────────────── RenderSystem (context thread) ───────────────────┐
//! │  CommandReceiver ──drain──┐                                          │
//! │  submit() ────────────────┴──> CommandQueue ──execute──> device      │
//! │  execute_immediate() ───────────────────────────────────> device     │
//! │  batch() ──> ScopedBatchQueue ──(drop)──────────────────> device     │
//! │  notify_resize() ──> volatiles (weak)                                │
//! └──────────────────────────────────────────────────────────────────────┘
//!            ▲
//!   CommandSender (any thread)
//! ```
//!
//! `RenderSystem` is `!Send`: once created on the context thread it stays
//! there.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use xen_core::StateBuffer;

use crate::batch::ScopedBatchQueue;
use crate::commands::{command_channel, CommandQueue, CommandReceiver, CommandSender, RenderCommand};
use crate::device::{GraphicsDevice, Viewport};
use crate::error::RenderResult;
use crate::volatile::Volatile;

/// Pending cross-thread commands held before `submit` starts failing.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 4096;

/// Context-thread owner of the device and its queues.
pub struct RenderSystem {
    device: Box<dyn GraphicsDevice>,
    queue: CommandQueue,
    receiver: CommandReceiver,
    sender: CommandSender,
    volatiles: Vec<Weak<RefCell<dyn Volatile>>>,
    width: u32,
    height: u32,
}

impl RenderSystem {
    /// Takes ownership of `device` for a `width` x `height` framebuffer.
    pub fn new(device: Box<dyn GraphicsDevice>, width: u32, height: u32) -> Self {
        Self::with_channel_capacity(device, width, height, DEFAULT_CHANNEL_CAPACITY)
    }

    /// Like [`new`](Self::new) with an explicit cross-thread channel size.
    pub fn with_channel_capacity(
        device: Box<dyn GraphicsDevice>,
        width: u32,
        height: u32,
        capacity: usize,
    ) -> Self {
        let (sender, receiver) = command_channel(capacity);
        tracing::info!(
            "render system up on {} ({}x{}, channel capacity {})",
            device.name(),
            width,
            height,
            capacity
        );
        Self {
            device,
            queue: CommandQueue::new(),
            receiver,
            sender,
            volatiles: Vec::new(),
            width,
            height,
        }
    }

    // =========================================================================
    // COMMANDS
    // =========================================================================

    /// Defers `command` to the next [`execute`](Self::execute).
    ///
    /// Returns the queue so further submissions can be chained.
    pub fn submit<C: RenderCommand>(&mut self, command: C) -> &mut CommandQueue {
        self.queue.submit(command)
    }

    /// Runs `command` now, bypassing the queue.
    ///
    /// # Errors
    ///
    /// Returns the first device error raised by the command.
    pub fn execute_immediate<C: RenderCommand>(&mut self, command: C) -> RenderResult<C::Output> {
        if let Some(stale) = self.device.check_error() {
            tracing::warn!("discarding earlier device error before immediate command: {}", stale);
        }
        let output = command.execute(self.device.as_mut());
        match self.device.check_error() {
            Some(error) => Err(error.into()),
            None => Ok(output),
        }
    }

    /// Pulls commands sent from other threads, then drains the queue front
    /// to back.
    ///
    /// # Returns
    ///
    /// Number of commands executed.
    pub fn execute(&mut self) -> usize {
        let received = self.receiver.drain_into(&mut self.queue);
        if received > 0 {
            tracing::trace!("{} commands received from other threads", received);
        }
        let _draining = self.receiver.begin_drain();
        self.queue.execute(self.device.as_mut())
    }

    /// Drops all pending commands, queued and in flight from other threads.
    ///
    /// # Returns
    ///
    /// Number of commands discarded.
    pub fn clear(&mut self) -> usize {
        self.queue.clear() + self.receiver.discard()
    }

    /// Opens a batch that executes when it goes out of scope.
    pub fn batch(&mut self) -> ScopedBatchQueue<'_> {
        ScopedBatchQueue::new(self.device.as_mut())
    }

    /// A handle other threads can submit through.
    #[must_use]
    pub fn sender(&self) -> CommandSender {
        self.sender.clone()
    }

    /// Commands waiting in the local queue.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    // =========================================================================
    // VOLATILES
    // =========================================================================

    /// Registers `volatile` for resize notifications. Only a weak reference
    /// is kept.
    pub fn register_volatile<V: Volatile + 'static>(&mut self, volatile: &Rc<RefCell<V>>) {
        let strong: Rc<RefCell<dyn Volatile>> = volatile.clone();
        self.volatiles.push(Rc::downgrade(&strong));
    }

    /// Number of registered volatiles still alive.
    #[must_use]
    pub fn volatile_count(&self) -> usize {
        self.volatiles.iter().filter(|v| v.strong_count() > 0).count()
    }

    /// Records the new framebuffer size, resets the viewport and tells every
    /// live volatile. Dead registrations are pruned.
    ///
    /// # Returns
    ///
    /// Number of volatiles notified.
    pub fn notify_resize(&mut self, width: u32, height: u32) -> usize {
        self.width = width;
        self.height = height;
        self.device.set_viewport(Viewport::full(width, height));

        let registered = std::mem::take(&mut self.volatiles);
        let mut alive = Vec::with_capacity(registered.len());
        let mut notified = 0;
        for weak in registered {
            let Some(volatile) = weak.upgrade() else {
                continue;
            };
            match volatile.try_borrow_mut() {
                Ok(mut volatile) => {
                    volatile.on_resize(width, height, self);
                    notified += 1;
                }
                Err(_) => tracing::warn!("volatile borrowed during resize; skipped"),
            }
            alive.push(weak);
        }
        // Registrations made from inside `on_resize` land after the old ones.
        alive.append(&mut self.volatiles);
        self.volatiles = alive;

        tracing::debug!("resize to {}x{} notified {} volatiles", width, height, notified);
        notified
    }

    // =========================================================================
    // ACCESS
    // =========================================================================

    /// Current framebuffer size.
    #[must_use]
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// The device.
    #[must_use]
    pub fn device(&self) -> &dyn GraphicsDevice {
        self.device.as_ref()
    }

    /// The device, for direct calls.
    pub fn device_mut(&mut self) -> &mut dyn GraphicsDevice {
        self.device.as_mut()
    }

    /// Releases every GPU object held by `state`'s slots through this
    /// device. Context thread only, which `&mut self` guarantees.
    ///
    /// # Returns
    ///
    /// Number of objects released.
    pub fn release_state(&mut self, state: &mut StateBuffer) -> usize {
        let released = state.cleanup(self.device.as_mut());
        if let Some(error) = self.device.check_error() {
            tracing::error!("device error while releasing state: {}", error);
        }
        released
    }
}

impl fmt::Debug for RenderSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderSystem")
            .field("device", &self.device.name())
            .field("queue", &self.queue)
            .field("volatiles", &self.volatiles.len())
            .field("size", &(self.width, self.height))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use xen_core::{BufferId, GameState, Material, MeshHandle, RenderComponent};

    use super::*;
    use crate::commands::{ClearCommand, CreateBuffersCommand};
    use crate::device::HeadlessDevice;
    use crate::error::{DeviceError, RenderError};

    fn headless() -> RenderSystem {
        RenderSystem::new(Box::new(HeadlessDevice::new()), 640, 480)
    }

    #[derive(Default)]
    struct ResizeLog(Vec<(u32, u32)>);

    impl Volatile for ResizeLog {
        fn on_resize(&mut self, width: u32, height: u32, _render: &mut RenderSystem) {
            self.0.push((width, height));
        }
    }

    #[test]
    fn test_execute_immediate_returns_output() {
        let mut render = headless();
        let ids = render.execute_immediate(CreateBuffersCommand::new(2)).unwrap();
        assert_eq!(ids.len(), 2);
        assert_eq!(render.pending(), 0);
    }

    #[test]
    fn test_execute_immediate_reports_device_error() {
        let mut render = headless();
        let result = render.execute_immediate(|d: &mut dyn GraphicsDevice| {
            d.upload_buffer(BufferId(42), &[0; 4]);
        });
        assert_eq!(
            result,
            Err(RenderError::Device(DeviceError::InvalidHandle {
                kind: "buffer",
                name: 42
            }))
        );
    }

    #[test]
    fn test_submit_defers_until_execute() {
        let mut render = headless();
        render
            .submit(ClearCommand::new(0.0, 0.0, 0.0, 1.0))
            .submit(ClearCommand::new(1.0, 1.0, 1.0, 1.0));
        assert_eq!(render.pending(), 2);
        assert_eq!(render.execute(), 2);
        assert_eq!(render.pending(), 0);
    }

    #[test]
    fn test_execute_pulls_cross_thread_commands_after_local_ones() {
        let mut render = headless();
        render.submit(ClearCommand::new(0.0, 0.0, 0.0, 1.0));
        let sender = render.sender();
        thread::spawn(move || {
            sender.submit(ClearCommand::new(1.0, 0.0, 0.0, 1.0)).unwrap();
        })
        .join()
        .unwrap();

        assert_eq!(render.execute(), 2);
    }

    #[test]
    fn test_clear_discards_both_sources() {
        let mut render = headless();
        render.submit(ClearCommand::new(0.0, 0.0, 0.0, 1.0));
        render.sender().submit(ClearCommand::new(0.0, 0.0, 0.0, 1.0)).unwrap();
        assert_eq!(render.clear(), 2);
        assert_eq!(render.execute(), 0);
    }

    #[test]
    fn test_volatiles_are_weak() {
        let mut render = headless();
        let kept = Rc::new(RefCell::new(ResizeLog::default()));
        let dropped = Rc::new(RefCell::new(ResizeLog::default()));
        render.register_volatile(&kept);
        render.register_volatile(&dropped);
        assert_eq!(render.volatile_count(), 2);

        drop(dropped);
        assert_eq!(render.notify_resize(800, 600), 1);
        assert_eq!(kept.borrow().0, vec![(800, 600)]);
        assert_eq!(render.volatile_count(), 1);
        assert_eq!(render.size(), (800, 600));
    }

    #[test]
    fn test_release_state_frees_each_handle_once() {
        let mut render = headless();
        let ids = render.execute_immediate(CreateBuffersCommand::new(2)).unwrap();

        let mut initial = GameState::new();
        let ship = initial.create_entity();
        initial.add_component(
            ship,
            RenderComponent::new(
                MeshHandle {
                    vertex_buffer: ids[0],
                    index_buffer: ids[1],
                    index_count: 36,
                },
                Material::default(),
            ),
        );
        let mut state = StateBuffer::new();
        state.init(&initial).unwrap();

        assert_eq!(render.device().stats().buffers, 2);
        assert_eq!(render.release_state(&mut state), 2);
        assert_eq!(render.device().stats().buffers, 0);
    }
}
