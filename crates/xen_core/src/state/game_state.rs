//! # Game State Snapshot
//!
//! One complete, self-contained copy of the simulation: entities, component
//! tables, hierarchy, camera and lighting. The triple buffer holds three of
//! these.
//!
//! ## Value Semantics
//!
//! `clone()` is a full deep copy. Two snapshots never share storage, so
//! mutating one slot can never leak into another. GPU objects are referenced
//! by id only; releasing them is explicit ([`GameState::release_all_resources`]),
//! never a side effect of `Drop`.

use std::collections::HashSet;

use glam::{Mat4, Vec3};

use crate::ecs::{
    Component, ComponentTable, EntityAllocator, EntityId, Hierarchy, RenderComponent,
    TransformComponent,
};
use crate::gpu::{GpuResource, ResourceReleaser};
use crate::state::{CameraState, LightingState};

/// A full simulation snapshot.
#[derive(Debug, Default)]
pub struct GameState {
    /// Entity id source.
    allocator: EntityAllocator,
    /// Live entities.
    alive: HashSet<EntityId>,
    /// Transform table.
    transforms: ComponentTable<TransformComponent>,
    /// Render table.
    renderables: ComponentTable<RenderComponent>,
    /// Parent/child links.
    hierarchy: Hierarchy,
    /// Camera singleton.
    camera: CameraState,
    /// Lighting singleton.
    lighting: LightingState,
    /// Simulation tick that produced this snapshot.
    tick: u64,
}

impl Clone for GameState {
    fn clone(&self) -> Self {
        Self {
            allocator: self.allocator.clone(),
            alive: self.alive.clone(),
            transforms: self.transforms.clone(),
            renderables: self.renderables.clone(),
            hierarchy: self.hierarchy.clone(),
            camera: self.camera,
            lighting: self.lighting.clone(),
            tick: self.tick,
        }
    }

    fn clone_from(&mut self, source: &Self) {
        self.allocator.clone_from(&source.allocator);
        self.alive.clone_from(&source.alive);
        self.transforms.clone_from(&source.transforms);
        self.renderables.clone_from(&source.renderables);
        self.hierarchy.clone_from(&source.hierarchy);
        self.camera = source.camera;
        self.lighting.clone_from(&source.lighting);
        self.tick = source.tick;
    }
}

impl Component for TransformComponent {
    const NAME: &'static str = "Transform";

    fn table(state: &GameState) -> &ComponentTable<Self> {
        &state.transforms
    }

    fn table_mut(state: &mut GameState) -> &mut ComponentTable<Self> {
        &mut state.transforms
    }
}

impl Component for RenderComponent {
    const NAME: &'static str = "Render";

    fn table(state: &GameState) -> &ComponentTable<Self> {
        &state.renderables
    }

    fn table_mut(state: &mut GameState) -> &mut ComponentTable<Self> {
        &mut state.renderables
    }
}

impl GameState {
    /// Creates an empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // ENTITIES
    // =========================================================================

    /// Creates a new entity with no components.
    pub fn create_entity(&mut self) -> EntityId {
        let entity = self.allocator.allocate();
        self.alive.insert(entity);
        entity
    }

    /// Destroys `entity`: removes all its component records and hierarchy links.
    ///
    /// Children of a destroyed entity become roots. GPU objects referenced by
    /// its render component are NOT released; release them first if this
    /// snapshot owns them.
    ///
    /// # Returns
    ///
    /// `false` if the entity was not alive.
    pub fn destroy_entity(&mut self, entity: EntityId) -> bool {
        if !self.alive.remove(&entity) {
            return false;
        }
        self.transforms.remove(entity);
        self.renderables.remove(entity);
        self.hierarchy.remove(entity);
        true
    }

    /// Returns true if `entity` exists in this snapshot.
    #[inline]
    #[must_use]
    pub fn is_alive(&self, entity: EntityId) -> bool {
        self.alive.contains(&entity)
    }

    /// Number of live entities.
    #[inline]
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.alive.len()
    }

    /// Live entities in no particular order.
    pub fn entities(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.alive.iter().copied()
    }

    // =========================================================================
    // COMPONENTS
    // =========================================================================

    /// Adds (or replaces) a component on a live entity.
    ///
    /// # Returns
    ///
    /// `false` if the entity is not alive.
    pub fn add_component<C: Component>(&mut self, entity: EntityId, component: C) -> bool {
        if !self.is_alive(entity) {
            tracing::warn!("add_component::<{}> on dead {}", C::NAME, entity);
            return false;
        }
        C::table_mut(self).insert(entity, component);
        true
    }

    /// Removes a component from an entity.
    pub fn remove_component<C: Component>(&mut self, entity: EntityId) -> Option<C> {
        C::table_mut(self).remove(entity)
    }

    /// Gets a component.
    #[inline]
    #[must_use]
    pub fn get<C: Component>(&self, entity: EntityId) -> Option<&C> {
        C::table(self).get(entity)
    }

    /// Gets a component mutably.
    #[inline]
    pub fn get_mut<C: Component>(&mut self, entity: EntityId) -> Option<&mut C> {
        C::table_mut(self).get_mut(entity)
    }

    /// Returns true if `entity` has a `C`.
    #[inline]
    #[must_use]
    pub fn has<C: Component>(&self, entity: EntityId) -> bool {
        C::table(self).contains(entity)
    }

    /// The whole table for `C`.
    #[inline]
    #[must_use]
    pub fn components<C: Component>(&self) -> &ComponentTable<C> {
        C::table(self)
    }

    /// The whole table for `C`, mutably.
    #[inline]
    pub fn components_mut<C: Component>(&mut self) -> &mut ComponentTable<C> {
        C::table_mut(self)
    }

    // =========================================================================
    // HIERARCHY
    // =========================================================================

    /// Attaches `child` under `parent` (or detaches it with `None`).
    ///
    /// # Returns
    ///
    /// `false` if either entity is dead or the link would form a cycle.
    pub fn set_parent(&mut self, child: EntityId, parent: Option<EntityId>) -> bool {
        if !self.is_alive(child) || parent.is_some_and(|p| !self.is_alive(p)) {
            return false;
        }
        self.hierarchy.set_parent(child, parent)
    }

    /// Parent of `entity`.
    #[must_use]
    pub fn parent_of(&self, entity: EntityId) -> Option<EntityId> {
        self.hierarchy.parent_of(entity)
    }

    /// Direct children of `entity`.
    #[must_use]
    pub fn children_of(&self, entity: EntityId) -> &[EntityId] {
        self.hierarchy.children_of(entity)
    }

    /// The hierarchy itself.
    #[must_use]
    pub fn hierarchy(&self) -> &Hierarchy {
        &self.hierarchy
    }

    /// World matrix of `entity`: its local transform composed with every
    /// ancestor's. Entities without a transform contribute identity.
    #[must_use]
    pub fn world_matrix(&self, entity: EntityId) -> Mat4 {
        let local = |e: EntityId| {
            self.transforms
                .get(e)
                .map_or(Mat4::IDENTITY, TransformComponent::matrix)
        };
        self.hierarchy
            .ancestors(entity)
            .fold(local(entity), |acc, ancestor| local(ancestor) * acc)
    }

    // =========================================================================
    // SINGLETONS
    // =========================================================================

    /// Camera state.
    #[inline]
    #[must_use]
    pub fn camera(&self) -> &CameraState {
        &self.camera
    }

    /// Camera state, mutably.
    #[inline]
    pub fn camera_mut(&mut self) -> &mut CameraState {
        &mut self.camera
    }

    /// Replaces the camera matrices and eye position in one go.
    pub fn update_camera_state(&mut self, view: Mat4, projection: Mat4, position: Vec3) {
        self.camera = CameraState {
            view,
            projection,
            position,
        };
    }

    /// Lighting state.
    #[inline]
    #[must_use]
    pub fn lighting(&self) -> &LightingState {
        &self.lighting
    }

    /// Lighting state, mutably.
    #[inline]
    pub fn lighting_mut(&mut self) -> &mut LightingState {
        &mut self.lighting
    }

    /// Simulation tick stamped on this snapshot.
    #[inline]
    #[must_use]
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Stamps the simulation tick.
    #[inline]
    pub fn set_tick(&mut self, tick: u64) {
        self.tick = tick;
    }

    // =========================================================================
    // GPU RESOURCES
    // =========================================================================

    /// Every GPU object referenced by render components, in table order.
    #[must_use]
    pub fn gpu_resources(&self) -> Vec<GpuResource> {
        let mut out = Vec::new();
        for render in self.renderables.as_slice() {
            render.collect_resources(&mut out);
        }
        out
    }

    /// Releases every GPU object held by render components and clears the
    /// handles. Must run on the context-owning thread.
    ///
    /// # Returns
    ///
    /// Number of objects released.
    pub fn release_all_resources<R: ResourceReleaser + ?Sized>(&mut self, releaser: &mut R) -> usize {
        self.renderables
            .as_mut_slice()
            .iter_mut()
            .map(|render| render.release(releaser))
            .sum()
    }

    /// Resets to an empty state (fresh allocator included).
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::{Material, MeshHandle};
    use crate::gpu::BufferId;

    fn mesh(a: u32, b: u32) -> MeshHandle {
        MeshHandle {
            vertex_buffer: BufferId(a),
            index_buffer: BufferId(b),
            index_count: 6,
        }
    }

    #[test]
    fn test_entity_lifecycle() {
        let mut state = GameState::new();
        let a = state.create_entity();
        let b = state.create_entity();
        assert_eq!(a.raw(), 1);
        assert_eq!(b.raw(), 2);
        assert_eq!(state.entity_count(), 2);

        assert!(state.destroy_entity(a));
        assert!(!state.is_alive(a));
        assert!(!state.destroy_entity(a));

        // Ids are not reused.
        let c = state.create_entity();
        assert_eq!(c.raw(), 3);
    }

    #[test]
    fn test_destroy_removes_all_components() {
        let mut state = GameState::new();
        let e = state.create_entity();
        state.add_component(e, TransformComponent::default());
        state.add_component(e, RenderComponent::default());

        state.destroy_entity(e);
        assert!(!state.has::<TransformComponent>(e));
        assert!(!state.has::<RenderComponent>(e));
        assert!(state.components::<TransformComponent>().is_empty());
    }

    #[test]
    fn test_add_component_requires_live_entity() {
        let mut state = GameState::new();
        let ghost = EntityId::from_raw(42);
        assert!(!state.add_component(ghost, TransformComponent::default()));
        assert!(state.components::<TransformComponent>().is_empty());
    }

    #[test]
    fn test_clone_is_independent() {
        let mut original = GameState::new();
        let e = original.create_entity();
        original.add_component(e, TransformComponent::from_position(Vec3::X));

        let mut copy = original.clone();
        copy.get_mut::<TransformComponent>(e).unwrap().translate(Vec3::Y);
        let extra = copy.create_entity();
        copy.add_component(extra, TransformComponent::default());

        assert_eq!(
            original.get::<TransformComponent>(e).unwrap().position,
            Vec3::X
        );
        assert_eq!(original.components::<TransformComponent>().len(), 1);
        assert!(!original.is_alive(extra));
    }

    #[test]
    fn test_clone_from_matches_clone() {
        let mut source = GameState::new();
        let e = source.create_entity();
        source.add_component(e, TransformComponent::default());
        source.set_tick(9);

        let mut dest = GameState::new();
        dest.create_entity();
        dest.create_entity();
        dest.clone_from(&source);

        assert_eq!(dest.tick(), 9);
        assert_eq!(dest.entity_count(), 1);
        assert!(dest.has::<TransformComponent>(e));
        // The allocator came along too.
        assert_eq!(dest.create_entity().raw(), 2);
    }

    #[test]
    fn test_world_matrix_composes_parents() {
        let mut state = GameState::new();
        let parent = state.create_entity();
        let child = state.create_entity();
        state.add_component(parent, TransformComponent::from_position(Vec3::new(10.0, 0.0, 0.0)));
        state.add_component(child, TransformComponent::from_position(Vec3::new(0.0, 1.0, 0.0)));
        assert!(state.set_parent(child, Some(parent)));

        let world = state.world_matrix(child).transform_point3(Vec3::ZERO);
        assert!((world - Vec3::new(10.0, 1.0, 0.0)).length() < 1e-5);
    }

    #[test]
    fn test_destroy_parent_orphans_children() {
        let mut state = GameState::new();
        let parent = state.create_entity();
        let child = state.create_entity();
        state.set_parent(child, Some(parent));

        state.destroy_entity(parent);
        assert_eq!(state.parent_of(child), None);
        assert!(state.is_alive(child));
    }

    #[test]
    fn test_update_camera_state() {
        let mut state = GameState::new();
        let view = Mat4::from_translation(Vec3::new(0.0, 0.0, -5.0));
        state.update_camera_state(view, Mat4::IDENTITY, Vec3::new(0.0, 0.0, 5.0));
        assert_eq!(state.camera().view, view);
        assert_eq!(state.camera().position.z, 5.0);
    }

    #[test]
    fn test_release_all_resources() {
        let mut state = GameState::new();
        for i in 0..3 {
            let e = state.create_entity();
            state.add_component(e, RenderComponent::new(mesh(i * 2, i * 2 + 1), Material::default()));
        }
        assert_eq!(state.gpu_resources().len(), 6);

        let mut released: Vec<GpuResource> = Vec::new();
        assert_eq!(state.release_all_resources(&mut released), 6);
        assert!(state.gpu_resources().is_empty());
        assert_eq!(released.len(), 6);
    }
}
