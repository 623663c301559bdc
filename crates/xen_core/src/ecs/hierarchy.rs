//! # Scene Hierarchy
//!
//! Parent links are ids (non-owning), child lists are owned vectors:
//!
//! ```text
//! parents:  { child -> parent }          lookup only, never owns
//! children: { parent -> [child, ...] }   ownership flows downward
//! ```
//!
//! No reference cycles are possible, and tearing down a node is
//! order-independent.

use std::collections::HashMap;

use super::entity::EntityId;

/// Parent/child relations between entities.
#[derive(Clone, Debug, Default)]
pub struct Hierarchy {
    parents: HashMap<EntityId, EntityId>,
    children: HashMap<EntityId, Vec<EntityId>>,
}

impl Hierarchy {
    /// Creates an empty hierarchy.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parent of `entity`, if attached.
    #[inline]
    #[must_use]
    pub fn parent_of(&self, entity: EntityId) -> Option<EntityId> {
        self.parents.get(&entity).copied()
    }

    /// Direct children of `entity`, in attach order.
    #[must_use]
    pub fn children_of(&self, entity: EntityId) -> &[EntityId] {
        self.children.get(&entity).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Walks from `entity`'s parent up to the root.
    pub fn ancestors(&self, entity: EntityId) -> impl Iterator<Item = EntityId> + '_ {
        std::iter::successors(self.parent_of(entity), move |&e| self.parent_of(e))
    }

    /// Attaches `child` under `parent`, or detaches it when `parent` is `None`.
    ///
    /// # Returns
    ///
    /// `false` (and no change) if the link would create a cycle.
    pub fn set_parent(&mut self, child: EntityId, parent: Option<EntityId>) -> bool {
        if let Some(parent) = parent {
            if parent == child || self.ancestors(parent).any(|a| a == child) {
                return false;
            }
        }

        self.detach(child);
        if let Some(parent) = parent {
            self.parents.insert(child, parent);
            self.children.entry(parent).or_default().push(child);
        }
        true
    }

    /// Drops every relation involving `entity`. Its children become roots.
    pub fn remove(&mut self, entity: EntityId) {
        self.detach(entity);
        if let Some(orphans) = self.children.remove(&entity) {
            for orphan in orphans {
                self.parents.remove(&orphan);
            }
        }
    }

    /// Number of entities that have a parent.
    #[must_use]
    pub fn link_count(&self) -> usize {
        self.parents.len()
    }

    /// Removes all relations.
    pub fn clear(&mut self) {
        self.parents.clear();
        self.children.clear();
    }

    fn detach(&mut self, child: EntityId) {
        let Some(old) = self.parents.remove(&child) else {
            return;
        };
        if let Some(siblings) = self.children.get_mut(&old) {
            siblings.retain(|&c| c != child);
            if siblings.is_empty() {
                self.children.remove(&old);
            }
        }
    }
}
