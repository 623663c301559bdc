//! End-to-end command flow through the render system on the headless device.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;
use xen_rendering::{
    BindFramebufferCommand, ClearCommand, CommandOutput, CreateBuffersCommand, DrawElementsCommand,
    GraphicsDevice, HeadlessDevice, QueueError, RenderCommand, RenderSystem, RenderTarget,
    UploadBufferCommand,
};

fn render_system() -> RenderSystem {
    RenderSystem::new(Box::new(HeadlessDevice::new()), 320, 240)
}

#[test]
fn queued_commands_run_in_submission_order() {
    let mut render = render_system();
    let log = Arc::new(Mutex::new(Vec::new()));
    for tag in ['A', 'B', 'C'] {
        let log = Arc::clone(&log);
        render.submit(move |_: &mut dyn GraphicsDevice| log.lock().push(tag));
    }
    assert!(log.lock().is_empty());
    assert_eq!(render.execute(), 3);
    assert_eq!(*log.lock(), vec!['A', 'B', 'C']);
    assert_eq!(render.execute(), 0);
}

#[test]
fn outputs_flow_between_queued_commands() {
    let mut render = render_system();
    let buffers = CommandOutput::new();
    let vertices = [0.0f32, 1.0, 0.0, -1.0, -1.0, 0.0, 1.0, -1.0, 0.0];

    render.submit(CreateBuffersCommand::new(1).into_output(&buffers));
    let ids = buffers.clone();
    render.submit(move |device: &mut dyn GraphicsDevice| {
        if let Some(buffer) = ids.with(|ids| ids.and_then(|ids| ids.first().copied())) {
            UploadBufferCommand::from_pod(buffer, &vertices).execute(device);
        }
    });
    render.execute();

    assert_eq!(buffers.get().map(|ids| ids.len()), Some(1));
    assert!(render.device_mut().check_error().is_none());
}

#[test]
fn scoped_batch_executes_both_commands_on_exit() {
    let mut render = render_system();
    let runs = Arc::new(Mutex::new(Vec::new()));
    {
        let (first, second) = (Arc::clone(&runs), Arc::clone(&runs));
        let mut batch = render.batch();
        batch
            .submit(move |_: &mut dyn GraphicsDevice| first.lock().push(1))
            .submit(move |_: &mut dyn GraphicsDevice| second.lock().push(2));
    }
    assert_eq!(*runs.lock(), vec![1, 2]);
    // The batch never touched the system's own queue.
    assert_eq!(render.pending(), 0);
}

#[test]
fn other_threads_submit_through_sender() {
    let mut render = render_system();
    let target = RenderTarget::new(&mut render, 320, 240).unwrap();
    let framebuffer = target.framebuffer();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let sender = render.sender();
            thread::spawn(move || {
                sender
                    .submit(BindFramebufferCommand(Some(framebuffer)))
                    .and_then(|s| s.submit(ClearCommand::new(0.1, 0.1, 0.1, 1.0)))
                    .and_then(|s| s.submit(DrawElementsCommand::triangles(36)))
                    .map(|_| ())
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap().unwrap();
    }

    assert_eq!(render.execute(), 12);
    assert_eq!(render.device().stats().draw_calls, 4);
}

#[test]
fn reentrant_submission_is_a_reported_error() {
    let mut render = render_system();
    let sender = render.sender();
    let outcome = Arc::new(Mutex::new(None));
    let seen = Arc::clone(&outcome);

    render.submit(move |_: &mut dyn GraphicsDevice| {
        *seen.lock() = Some(sender.submit(ClearCommand::new(0.0, 0.0, 0.0, 1.0)).err());
    });
    render.execute();

    assert_eq!(*outcome.lock(), Some(Some(QueueError::ReentrantSubmission)));
    assert_eq!(render.execute(), 0);
}

#[test]
fn full_channel_applies_backpressure() {
    let mut render = RenderSystem::with_channel_capacity(Box::new(HeadlessDevice::new()), 8, 8, 2);
    let sender = render.sender();
    sender.submit(ClearCommand::new(0.0, 0.0, 0.0, 1.0)).unwrap();
    sender.submit(ClearCommand::new(0.0, 0.0, 0.0, 1.0)).unwrap();
    assert_eq!(
        sender.submit(ClearCommand::new(0.0, 0.0, 0.0, 1.0)).err(),
        Some(QueueError::Full { capacity: 2 })
    );
    assert_eq!(render.execute(), 2);
    assert!(sender.submit(ClearCommand::new(0.0, 0.0, 0.0, 1.0)).is_ok());
}

#[test]
fn resize_rebuilds_registered_targets_until_dropped() {
    let mut render = render_system();
    let target = Rc::new(RefCell::new(RenderTarget::new(&mut render, 320, 240).unwrap()));
    render.register_volatile(&target);

    assert_eq!(render.notify_resize(640, 480), 1);
    assert_eq!(target.borrow().size(), (640, 480));
    assert_eq!(render.device().stats().live_objects(), 3);

    let released = Rc::try_unwrap(target).ok().map(RefCell::into_inner);
    if let Some(target) = released {
        target.release(&mut render);
    }
    render.execute();
    assert_eq!(render.notify_resize(800, 600), 0);
    assert_eq!(render.volatile_count(), 0);
    assert_eq!(render.device().stats().live_objects(), 0);
}
