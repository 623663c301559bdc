//! # Xen Core
//!
//! Simulation-side state model for the Xen engine:
//! - [`GameState`] snapshots built from dense component tables
//! - [`StateBuffer`], the triple buffer that hands snapshots from the
//!   simulation thread to the render thread
//! - [`Clock`] for delta time and frame time
//!
//! ## Threading Rules
//!
//! 1. **One writer, one reader** - the simulation thread owns the write slot,
//!    the render thread owns the read slot
//! 2. **Index swaps only under the lock** - the lock never wraps GPU work
//! 3. **No GPU calls** - GPU objects are referenced by id; releasing them is
//!    delegated to a [`ResourceReleaser`] on the context thread
//!
//! ## Example
//!
//! ```rust,ignore
//! use xen_core::{GameState, StateBuffer};
//!
//! let mut buffer = StateBuffer::new();
//! buffer.init(&GameState::new())?;
//!
//! // Simulation thread
//! let mut write = buffer.write_buffer()?;
//! write.create_entity();
//! write.publish();
//!
//! // Render thread
//! buffer.swap_read_buffer()?;
//! let read = buffer.read_buffer()?;
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod clock;
pub mod ecs;
pub mod error;
pub mod gpu;
pub mod state;
pub mod sync;

pub use clock::Clock;
pub use ecs::{
    Component, ComponentTable, EntityAllocator, EntityId, Hierarchy, Material, MeshHandle,
    PbrTextures, RenderComponent, TransformComponent,
};
pub use error::{StateBufferError, StateBufferResult};
pub use gpu::{BufferId, FramebufferId, GpuResource, ResourceReleaser, TextureId};
pub use state::{CameraState, DirectionalLight, GameState, Light, LightingState, PointLight};
pub use sync::{ReadGuard, StateBuffer, SwapOutcome, SwapStats, WriteGuard};
