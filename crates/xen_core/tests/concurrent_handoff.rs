//! Concurrency stress test for the triple buffer.
//!
//! The writer stamps every snapshot three times (start of tick, inside the
//! component table, end of tick). If the reader ever observed a slot the
//! writer was still filling, the stamps would disagree.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use glam::Vec3;
use xen_core::{GameState, StateBuffer, SwapOutcome, TransformComponent};

const TICKS: u64 = 20_000;

#[test]
fn test_reader_never_sees_torn_snapshot() {
    let mut initial = GameState::new();
    let head = initial.create_entity();
    let tail = initial.create_entity();
    initial.add_component(head, TransformComponent::default());
    initial.add_component(tail, TransformComponent::default());

    let mut buffer = StateBuffer::new();
    buffer.init(&initial).unwrap();
    let done = AtomicBool::new(false);

    let frames = thread::scope(|s| {
        s.spawn(|| {
            for tick in 1..=TICKS {
                let mut write = buffer.write_buffer().unwrap();
                let stamp = tick as f32;

                write.get_mut::<TransformComponent>(head).unwrap().position = Vec3::splat(stamp);
                // Some churn between the stamps.
                let scratch = write.create_entity();
                write.add_component(scratch, TransformComponent::from_position(Vec3::X));
                write.destroy_entity(scratch);
                write.get_mut::<TransformComponent>(tail).unwrap().position = Vec3::splat(stamp);
                write.set_tick(tick);

                write.publish();
            }
            done.store(true, Ordering::Release);
        });

        let mut frames = 0u64;
        let mut last_tick = 0u64;
        loop {
            let finished = done.load(Ordering::Acquire);
            buffer.swap_read_buffer().unwrap();
            {
                let read = buffer.read_buffer().unwrap();
                let tick = read.tick();
                let h = read.get::<TransformComponent>(head).unwrap().position;
                let t = read.get::<TransformComponent>(tail).unwrap().position;

                assert_eq!(h, t, "torn snapshot at tick {tick}");
                if tick > 0 {
                    assert_eq!(h.x, tick as f32, "stamp/tick mismatch");
                }
                assert!(tick >= last_tick, "reader went back in time");
                assert_eq!(read.entity_count(), 2);
                last_tick = tick;
            }
            frames += 1;
            if finished {
                break;
            }
        }
        // The final swap after `done` always sees the last tick.
        assert_eq!(last_tick, TICKS);
        frames
    });

    assert!(frames > 0);
    let stats = buffer.stats();
    assert_eq!(stats.published(), TICKS);
    assert!(stats.fresh_reads() + stats.stale_reads() == frames);
}

#[test]
fn test_writer_is_never_blocked_by_slow_reader() {
    let mut buffer = StateBuffer::new();
    buffer.init(&GameState::new()).unwrap();

    // Reader pins its slot for the whole run.
    let read = buffer.read_buffer().unwrap();
    let pinned = read.slot_index();

    for tick in 1..=1000 {
        let mut write = buffer.write_buffer().unwrap();
        assert_ne!(write.slot_index(), pinned);
        write.set_tick(tick);
        let outcome = write.publish();
        assert!(matches!(outcome, SwapOutcome::Swapped | SwapOutcome::Superseded));
    }
    assert_eq!(read.tick(), 0);
    drop(read);

    buffer.swap_read_buffer().unwrap();
    assert_eq!(buffer.read_buffer().unwrap().tick(), 1000);
}
