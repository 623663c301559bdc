//! # Triple-Buffered Game State
//!
//! Hands snapshots from the simulation thread to the render thread without
//! either side waiting on the other.
//!
//! ## Safety Note
//!
//! The slots live in `UnsafeCell`s. Exclusive access to a slot is granted by
//! the role flags plus the index protocol below, not by a per-slot lock.

#![allow(unsafe_code)]
//!
//! ## Architecture
//!
//! ```text
//!            ┌───────────────────────────────────────────┐
//!            │                StateBuffer                │
//!            │                                           │
//!            │   ┌────────┐   ┌────────┐   ┌────────┐    │
//!            │   │ slot 0 │   │ slot 1 │   │ slot 2 │    │
//!            │   └────────┘   └────────┘   └────────┘    │
//!            │       ▲            ▲            ▲         │
//!            │     write        ready         read       │
//!            │  (sim thread)  (handoff)  (render thread) │
//!            │                                           │
//!            │   Mutex<SlotIndices>  ← swaps only        │
//!            └───────────────────────────────────────────┘
//!
//!  swap_write_buffer:  write <-> ready, fresh = true
//!                      then seed new write slot from the completed one
//!  swap_read_buffer:   if fresh { read <-> ready, fresh = false }
//! ```
//!
//! The three roles always name three distinct slots, so the writer never
//! advances into the pinned read slot and the reader never picks up the slot
//! being written. Neither swap waits on the other side.
//!
//! ## Backpressure
//!
//! - Reader faster than writer: `swap_read_buffer` finds nothing fresh and
//!   the reader keeps its snapshot ([`SwapOutcome::Stale`]).
//! - Writer faster than reader: the unread ready snapshot is replaced by the
//!   newer one ([`SwapOutcome::Superseded`]).
//!
//! Both are counted in [`SwapStats`], neither is an error.

use std::cell::UnsafeCell;
use std::collections::BTreeSet;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use parking_lot::Mutex;

use crate::error::{StateBufferError, StateBufferResult};
use crate::gpu::{GpuResource, ResourceReleaser};
use crate::state::GameState;

/// Number of snapshot slots.
pub const SLOT_COUNT: usize = 3;

const INITIAL_WRITE: usize = 0;
const INITIAL_READ: usize = 1;
const INITIAL_READY: usize = 2;

/// Slot roles. Only touched under the swap mutex.
#[derive(Clone, Copy, Debug)]
struct SlotIndices {
    write: usize,
    read: usize,
    ready: usize,
    /// `ready` holds a snapshot the reader has not picked up yet.
    fresh: bool,
}

impl SlotIndices {
    const fn initial() -> Self {
        Self {
            write: INITIAL_WRITE,
            read: INITIAL_READ,
            ready: INITIAL_READY,
            fresh: false,
        }
    }
}

/// Result of a swap. Informational only.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SwapOutcome {
    /// The index moved onto a newly completed snapshot.
    Swapped,
    /// Reader: nothing newer was published; keep rendering the current slot.
    Stale,
    /// Writer: the previous snapshot was never picked up and got replaced.
    Superseded,
}

/// Lock-free swap counters.
#[derive(Debug, Default)]
pub struct SwapStats {
    published: AtomicU64,
    superseded: AtomicU64,
    fresh_reads: AtomicU64,
    stale_reads: AtomicU64,
}

impl SwapStats {
    /// Snapshots published by the writer.
    #[must_use]
    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    /// Published snapshots that were replaced before the reader saw them.
    #[must_use]
    pub fn superseded(&self) -> u64 {
        self.superseded.load(Ordering::Relaxed)
    }

    /// Read swaps that picked up a new snapshot.
    #[must_use]
    pub fn fresh_reads(&self) -> u64 {
        self.fresh_reads.load(Ordering::Relaxed)
    }

    /// Read swaps that found nothing new.
    #[must_use]
    pub fn stale_reads(&self) -> u64 {
        self.stale_reads.load(Ordering::Relaxed)
    }

    fn reset(&self) {
        self.published.store(0, Ordering::Relaxed);
        self.superseded.store(0, Ordering::Relaxed);
        self.fresh_reads.store(0, Ordering::Relaxed);
        self.stale_reads.store(0, Ordering::Relaxed);
    }
}

/// Triple-buffered [`GameState`] shared by one writer and one reader.
///
/// ## Usage
///
/// ```rust,ignore
/// let mut buffer = StateBuffer::new();
/// buffer.init(&initial_state)?;
///
/// std::thread::scope(|s| {
///     // Simulation thread
///     s.spawn(|| {
///         let mut write = buffer.write_buffer()?;
///         write.create_entity();
///         write.publish();
///     });
///
///     // Render thread
///     buffer.swap_read_buffer()?;
///     let read = buffer.read_buffer()?;
///     draw(&read);
/// });
///
/// buffer.cleanup(&mut device);
/// ```
pub struct StateBuffer {
    /// The three snapshots.
    slots: [UnsafeCell<GameState>; SLOT_COUNT],

    /// Role assignment. Held only for O(1) index exchanges.
    indices: Mutex<SlotIndices>,

    /// Mirrors of the write/read roles for the lock-free accessors.
    write_index: AtomicUsize,
    read_index: AtomicUsize,

    /// Set by `init()`, cleared by `cleanup()`.
    initialized: bool,

    /// Write side claimed (live guard or swap in progress).
    writer_claimed: AtomicBool,

    /// Read side claimed (live guard or swap in progress).
    reader_claimed: AtomicBool,

    stats: SwapStats,
}

// SAFETY: Slot access is partitioned by the role flags. The write slot is
// only reachable through the claimed write side, the read slot only through
// the claimed read side, and the swap protocol keeps those slots distinct.
unsafe impl Sync for StateBuffer {}

impl Default for StateBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl StateBuffer {
    /// Creates an uninitialized buffer. Call [`init`](Self::init) before use.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: [
                UnsafeCell::new(GameState::new()),
                UnsafeCell::new(GameState::new()),
                UnsafeCell::new(GameState::new()),
            ],
            indices: Mutex::new(SlotIndices::initial()),
            write_index: AtomicUsize::new(INITIAL_WRITE),
            read_index: AtomicUsize::new(INITIAL_READ),
            initialized: false,
            writer_claimed: AtomicBool::new(false),
            reader_claimed: AtomicBool::new(false),
            stats: SwapStats::default(),
        }
    }

    /// Seeds all three slots with clones of `initial` and resets the roles.
    ///
    /// Takes `&mut self`: no thread can be touching the buffer while this runs.
    ///
    /// # Errors
    ///
    /// [`StateBufferError::AlreadyInitialized`] if called twice without an
    /// intervening [`cleanup`](Self::cleanup).
    pub fn init(&mut self, initial: &GameState) -> StateBufferResult<()> {
        if self.initialized {
            return Err(StateBufferError::AlreadyInitialized);
        }

        for slot in &mut self.slots {
            slot.get_mut().clone_from(initial);
        }
        self.reset_roles();
        self.initialized = true;

        tracing::info!(
            "StateBuffer initialized: {} slots, {} entities per slot",
            SLOT_COUNT,
            initial.entity_count()
        );
        Ok(())
    }

    /// Returns whether `init()` has run (and `cleanup()` has not).
    #[inline]
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Slot currently owned by the writer.
    #[inline]
    #[must_use]
    pub fn write_index(&self) -> usize {
        self.write_index.load(Ordering::Acquire)
    }

    /// Slot currently pinned by the reader.
    #[inline]
    #[must_use]
    pub fn read_index(&self) -> usize {
        self.read_index.load(Ordering::Acquire)
    }

    /// Swap counters.
    #[inline]
    #[must_use]
    pub fn stats(&self) -> &SwapStats {
        &self.stats
    }

    /// Claims the write slot for the simulation thread.
    ///
    /// Lock-free: a single compare-exchange on the writer flag.
    ///
    /// # Errors
    ///
    /// - [`StateBufferError::NotInitialized`] before `init()`
    /// - [`StateBufferError::WriterBusy`] if another write guard is alive
    pub fn write_buffer(&self) -> StateBufferResult<WriteGuard<'_>> {
        self.claim_writer()?;
        Ok(WriteGuard {
            buffer: self,
            index: self.write_index(),
        })
    }

    /// Claims the read slot for the render thread.
    ///
    /// # Errors
    ///
    /// - [`StateBufferError::NotInitialized`] before `init()`
    /// - [`StateBufferError::ReaderBusy`] if another read guard is alive
    pub fn read_buffer(&self) -> StateBufferResult<ReadGuard<'_>> {
        self.claim_reader()?;
        Ok(ReadGuard {
            buffer: self,
            index: self.read_index(),
        })
    }

    /// Publishes the write slot and moves the writer onto the free slot.
    ///
    /// Call once per tick, after the tick's mutations. The new write slot is
    /// seeded with a copy of the snapshot just published, so the next tick
    /// continues from the latest state.
    ///
    /// # Errors
    ///
    /// - [`StateBufferError::NotInitialized`] before `init()`
    /// - [`StateBufferError::WriterBusy`] while a write guard is alive
    ///   (use [`WriteGuard::publish`] instead)
    pub fn swap_write_buffer(&self) -> StateBufferResult<SwapOutcome> {
        self.claim_writer()?;
        let outcome = self.advance_writer();
        self.writer_claimed.store(false, Ordering::Release);
        Ok(outcome)
    }

    /// Moves the reader onto the latest published snapshot, if there is one.
    ///
    /// Call once per frame, before reading. When nothing new was published the
    /// reader keeps its slot and [`SwapOutcome::Stale`] is returned.
    ///
    /// # Errors
    ///
    /// - [`StateBufferError::NotInitialized`] before `init()`
    /// - [`StateBufferError::ReaderBusy`] while a read guard is alive
    pub fn swap_read_buffer(&self) -> StateBufferResult<SwapOutcome> {
        self.claim_reader()?;

        let outcome = {
            let mut idx = self.indices.lock();
            if idx.fresh {
                let SlotIndices { read, ready, .. } = *idx;
                idx.read = ready;
                idx.ready = read;
                idx.fresh = false;
                self.read_index.store(idx.read, Ordering::Release);
                SwapOutcome::Swapped
            } else {
                SwapOutcome::Stale
            }
        };

        match outcome {
            SwapOutcome::Stale => {
                self.stats.stale_reads.fetch_add(1, Ordering::Relaxed);
                tracing::trace!("swap_read_buffer: no new snapshot, re-reading slot {}", self.read_index());
            }
            _ => {
                self.stats.fresh_reads.fetch_add(1, Ordering::Relaxed);
            }
        }

        self.reader_claimed.store(false, Ordering::Release);
        Ok(outcome)
    }

    /// Releases every GPU object held by any slot, then resets all slots to
    /// empty states and the roles to their initial layout.
    ///
    /// Handles shared between slots (slots are clones of each other) are
    /// released exactly once. Must run on the GPU-context-owning thread.
    ///
    /// # Returns
    ///
    /// Number of distinct GPU objects released.
    pub fn cleanup<R: ResourceReleaser + ?Sized>(&mut self, releaser: &mut R) -> usize {
        let mut unique = BTreeSet::new();
        for slot in &mut self.slots {
            unique.extend(slot.get_mut().gpu_resources());
        }

        for &resource in &unique {
            releaser.release(resource);
        }

        for slot in &mut self.slots {
            *slot.get_mut() = GameState::new();
        }
        self.reset_roles();
        self.stats.reset();
        let was_initialized = std::mem::replace(&mut self.initialized, false);

        tracing::info!(
            "StateBuffer cleanup: released {} GPU objects (initialized: {})",
            unique.len(),
            was_initialized
        );
        unique.len()
    }

    // =========================================================================
    // INTERNALS
    // =========================================================================

    fn claim_writer(&self) -> StateBufferResult<()> {
        if !self.initialized {
            return Err(StateBufferError::NotInitialized);
        }
        self.writer_claimed
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .map(|_| ())
            .map_err(|_| StateBufferError::WriterBusy)
    }

    fn claim_reader(&self) -> StateBufferResult<()> {
        if !self.initialized {
            return Err(StateBufferError::NotInitialized);
        }
        self.reader_claimed
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .map(|_| ())
            .map_err(|_| StateBufferError::ReaderBusy)
    }

    /// Exchanges write and ready, then seeds the new write slot.
    /// Caller must hold the writer claim.
    fn advance_writer(&self) -> SwapOutcome {
        let (completed, next, superseded) = {
            let mut idx = self.indices.lock();
            let SlotIndices { write, ready, fresh, .. } = *idx;
            idx.write = ready;
            idx.ready = write;
            idx.fresh = true;
            self.write_index.store(idx.write, Ordering::Release);
            (write, ready, fresh)
        };

        // SAFETY: We hold the writer claim, so `next` (the old ready slot) is
        // reachable by nobody else: the reader only ever touches `read`, which
        // the protocol keeps distinct from both `next` and `completed`.
        // `completed` may be picked up by the reader concurrently, but both
        // sides only read it from here on.
        unsafe {
            let source = self.slot(completed);
            self.slot_mut(next).clone_from(source);
        }

        self.stats.published.fetch_add(1, Ordering::Relaxed);
        if superseded {
            self.stats.superseded.fetch_add(1, Ordering::Relaxed);
            tracing::trace!("swap_write_buffer: unread snapshot in slot {} replaced", completed);
            SwapOutcome::Superseded
        } else {
            SwapOutcome::Swapped
        }
    }

    fn reset_roles(&mut self) {
        *self.indices.get_mut() = SlotIndices::initial();
        *self.write_index.get_mut() = INITIAL_WRITE;
        *self.read_index.get_mut() = INITIAL_READ;
        *self.writer_claimed.get_mut() = false;
        *self.reader_claimed.get_mut() = false;
    }

    /// # Safety
    ///
    /// No `&mut` to the same slot may be live.
    #[inline]
    unsafe fn slot(&self, index: usize) -> &GameState {
        &*self.slots[index].get()
    }

    /// # Safety
    ///
    /// Caller must have exclusive access to the slot.
    #[inline]
    #[allow(clippy::mut_from_ref)]
    unsafe fn slot_mut(&self, index: usize) -> &mut GameState {
        &mut *self.slots[index].get()
    }
}

impl fmt::Debug for StateBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateBuffer")
            .field("initialized", &self.initialized)
            .field("write_index", &self.write_index())
            .field("read_index", &self.read_index())
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl Drop for StateBuffer {
    fn drop(&mut self) {
        if !self.initialized {
            return;
        }
        let leaked: BTreeSet<GpuResource> = self
            .slots
            .iter_mut()
            .flat_map(|slot| slot.get_mut().gpu_resources())
            .collect();
        if !leaked.is_empty() {
            tracing::warn!(
                "StateBuffer dropped without cleanup(): {} GPU objects never released",
                leaked.len()
            );
        }
    }
}

// =============================================================================
// GUARDS
// =============================================================================

/// Exclusive access to the write slot.
///
/// Dropping the guard releases the claim without publishing. Use
/// [`publish`](Self::publish) to hand the snapshot to the reader.
pub struct WriteGuard<'a> {
    buffer: &'a StateBuffer,
    index: usize,
}

impl WriteGuard<'_> {
    /// Slot this guard writes to (for debugging).
    #[inline]
    #[must_use]
    pub fn slot_index(&self) -> usize {
        self.index
    }

    /// Publishes the snapshot and releases the write claim.
    ///
    /// Same as dropping the guard and calling
    /// [`StateBuffer::swap_write_buffer`], without the gap in between.
    pub fn publish(self) -> SwapOutcome {
        self.buffer.advance_writer()
    }
}

impl Deref for WriteGuard<'_> {
    type Target = GameState;

    #[inline]
    fn deref(&self) -> &Self::Target {
        // SAFETY: The writer claim gives this guard sole access to its slot.
        unsafe { self.buffer.slot(self.index) }
    }
}

impl DerefMut for WriteGuard<'_> {
    #[inline]
    fn deref_mut(&mut self) -> &mut Self::Target {
        // SAFETY: The writer claim gives this guard sole access to its slot.
        unsafe { self.buffer.slot_mut(self.index) }
    }
}

impl Drop for WriteGuard<'_> {
    fn drop(&mut self) {
        self.buffer.writer_claimed.store(false, Ordering::Release);
    }
}

/// Shared access to the read slot.
pub struct ReadGuard<'a> {
    buffer: &'a StateBuffer,
    index: usize,
}

impl ReadGuard<'_> {
    /// Slot this guard reads from (for debugging).
    #[inline]
    #[must_use]
    pub fn slot_index(&self) -> usize {
        self.index
    }
}

impl Deref for ReadGuard<'_> {
    type Target = GameState;

    #[inline]
    fn deref(&self) -> &Self::Target {
        // SAFETY: The reader claim pins this slot; the writer never enters it.
        unsafe { self.buffer.slot(self.index) }
    }
}

impl Drop for ReadGuard<'_> {
    fn drop(&mut self) {
        self.buffer.reader_claimed.store(false, Ordering::Release);
    }
}
