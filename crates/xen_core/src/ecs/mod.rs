//! # Entity Component System
//!
//! Small, snapshot-friendly ECS:
//! - **Entities**: 64-bit ids from a counter, never reused
//! - **Components**: dense tables with an entity -> slot side index
//! - **Hierarchy**: id-based parent links, owned child lists
//!
//! Everything here is `Clone` with value semantics; a cloned state never
//! aliases the original.

pub mod component;
pub mod entity;
pub mod hierarchy;
pub mod table;

pub use component::{
    Component, Material, MeshHandle, PbrTextures, RenderComponent, TransformComponent,
};
pub use entity::{EntityAllocator, EntityId};
pub use hierarchy::Hierarchy;
pub use table::ComponentTable;
