//! # Entity Management
//!
//! Entities are opaque 64-bit ids handed out by a monotonically increasing
//! counter. Ids are never reused within a run, so there is no generation
//! tag to check.

use std::fmt;

/// Unique identifier for an entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct EntityId(u64);

impl EntityId {
    /// Null/invalid entity ID. Never handed out by an allocator.
    pub const NULL: Self = Self(u64::MAX);

    /// Wraps a raw id.
    #[inline]
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw id.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Checks if this entity ID is null/invalid.
    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == u64::MAX
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::NULL
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            f.write_str("Entity(null)")
        } else {
            write!(f, "Entity({})", self.0)
        }
    }
}

/// Hands out entity ids starting at 1.
///
/// Part of the snapshot: cloning a [`GameState`](crate::GameState) clones the
/// counter too, so every slot continues from the same next id.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EntityAllocator {
    last: u64,
}

impl EntityAllocator {
    /// Creates an allocator whose first id is 1.
    #[must_use]
    pub const fn new() -> Self {
        Self { last: 0 }
    }

    /// Allocates the next id.
    #[inline]
    pub fn allocate(&mut self) -> EntityId {
        self.last += 1;
        debug_assert!(self.last != u64::MAX, "entity id space exhausted");
        EntityId(self.last)
    }

    /// Total number of ids handed out so far.
    #[inline]
    #[must_use]
    pub const fn issued(&self) -> u64 {
        self.last
    }
}
