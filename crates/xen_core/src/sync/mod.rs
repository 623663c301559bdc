//! # Simulation -> Render Handoff
//!
//! ## The Problem
//!
//! ```text
//! Thread 1 (Simulation):  WRITE snapshot, tick after tick
//! Thread 2 (Render):      READ the newest complete snapshot, frame after frame
//!
//! Without synchronization: render sees half-written state
//! With one Mutex:          each side stalls for the other's whole tick/frame
//! With two buffers:        writer must wait until the reader lets go
//! ```
//!
//! ## The Solution: Triple Buffering
//!
//! ```text
//! write slot  -> being filled by the simulation
//! ready slot  -> last completed snapshot, waiting for pickup
//! read slot   -> being drawn by the renderer
//! ```
//!
//! Swaps exchange two indices under a mutex held for a handful of
//! instructions. Accessors take no lock at all.

mod state_buffer;

pub use state_buffer::{ReadGuard, StateBuffer, SwapOutcome, SwapStats, WriteGuard, SLOT_COUNT};
