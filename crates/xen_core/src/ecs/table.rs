//! # Component Tables
//!
//! Dense, indexed storage for one component kind.
//!
//! ```text
//! components: [ T0 | T1 | T2 | T3 ]     <- contiguous, iteration order
//! entities:   [ e4 | e1 | e9 | e2 ]     <- dense index -> entity
//! index:      { e1:1, e2:3, e4:0, e9:2 } <- entity -> dense index
//! ```
//!
//! Add, lookup and remove are all O(1). Removal swaps the last record into
//! the hole and patches its side-index entry.

use std::collections::HashMap;

use super::entity::EntityId;

/// Dense component array keyed by entity id.
///
/// Invariant: an entity has at most one record in a table.
#[derive(Debug)]
pub struct ComponentTable<T> {
    components: Vec<T>,
    entities: Vec<EntityId>,
    index: HashMap<EntityId, usize>,
}

impl<T> Default for ComponentTable<T> {
    fn default() -> Self {
        Self {
            components: Vec::new(),
            entities: Vec::new(),
            index: HashMap::new(),
        }
    }
}

// Manual impl so `clone_from` reuses the destination's allocations; the
// triple buffer re-seeds a slot from its neighbour every tick.
impl<T: Clone> Clone for ComponentTable<T> {
    fn clone(&self) -> Self {
        Self {
            components: self.components.clone(),
            entities: self.entities.clone(),
            index: self.index.clone(),
        }
    }

    fn clone_from(&mut self, source: &Self) {
        self.components.clone_from(&source.components);
        self.entities.clone_from(&source.entities);
        self.index.clone_from(&source.index);
    }
}

impl<T> ComponentTable<T> {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Returns true if the table holds no records.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Returns true if `entity` has a record.
    #[inline]
    #[must_use]
    pub fn contains(&self, entity: EntityId) -> bool {
        self.index.contains_key(&entity)
    }

    /// Inserts or replaces the record for `entity`.
    ///
    /// # Returns
    ///
    /// The previous record, if the entity already had one.
    pub fn insert(&mut self, entity: EntityId, component: T) -> Option<T> {
        if let Some(&slot) = self.index.get(&entity) {
            return Some(std::mem::replace(&mut self.components[slot], component));
        }
        self.index.insert(entity, self.components.len());
        self.components.push(component);
        self.entities.push(entity);
        None
    }

    /// Removes the record for `entity` by swapping the last record into its place.
    pub fn remove(&mut self, entity: EntityId) -> Option<T> {
        let slot = self.index.remove(&entity)?;
        let removed = self.components.swap_remove(slot);
        self.entities.swap_remove(slot);

        // Patch the record that moved into the hole.
        if let Some(&moved) = self.entities.get(slot) {
            self.index.insert(moved, slot);
        }
        Some(removed)
    }

    /// Gets the record for `entity`.
    #[inline]
    #[must_use]
    pub fn get(&self, entity: EntityId) -> Option<&T> {
        self.index.get(&entity).map(|&slot| &self.components[slot])
    }

    /// Gets the record for `entity` mutably.
    #[inline]
    pub fn get_mut(&mut self, entity: EntityId) -> Option<&mut T> {
        let slot = *self.index.get(&entity)?;
        Some(&mut self.components[slot])
    }

    /// Entity owning the record at dense position `slot`.
    #[inline]
    #[must_use]
    pub fn entity_at(&self, slot: usize) -> Option<EntityId> {
        self.entities.get(slot).copied()
    }

    /// All entities with a record, in dense order.
    #[inline]
    #[must_use]
    pub fn entities(&self) -> &[EntityId] {
        &self.entities
    }

    /// All records, in dense order.
    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[T] {
        &self.components
    }

    /// All records mutably, in dense order.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.components
    }

    /// Iterates `(entity, record)` pairs in dense order.
    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &T)> + '_ {
        self.entities.iter().copied().zip(self.components.iter())
    }

    /// Iterates `(entity, record)` pairs mutably in dense order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (EntityId, &mut T)> + '_ {
        self.entities.iter().copied().zip(self.components.iter_mut())
    }

    /// Removes every record.
    pub fn clear(&mut self) {
        self.components.clear();
        self.entities.clear();
        self.index.clear();
    }
}
