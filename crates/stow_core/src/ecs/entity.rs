//! Entity handle with generational index
//!
//! Entities are lightweight handles (8 bytes) that reference data in the World.
//! The generation counter prevents a recycled slot from answering for a
//! handle of an earlier lifetime.

use std::fmt;

/// Entity handle (generation-indexed for safety)
///
/// Format: [32-bit index | 32-bit generation]
/// - Index: Position in the entity table
/// - Generation: Incremented when the slot is freed
///
/// Example:
/// ```ignore
/// let entity = manager.spawn(Some("crate"), MapCoordinates::NULLSPACE, None)?;
/// manager.delete(entity);
/// assert!(!manager.exists(entity)); // generation mismatch
/// ```
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Entity {
    index: u32,
    generation: u32,
}

impl Entity {
    pub(crate) const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Serialize to 64-bit integer (for logs and external session tables)
    pub fn to_bits(&self) -> u64 {
        ((self.generation as u64) << 32) | (self.index as u64)
    }

    /// Deserialize from 64-bit integer
    pub fn from_bits(bits: u64) -> Self {
        Self {
            index: bits as u32,
            generation: (bits >> 32) as u32,
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}
