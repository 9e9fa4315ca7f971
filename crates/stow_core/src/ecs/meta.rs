//! Per-entity metadata: prototype, lifecycle stage and cached flags.
//!
//! The entity table owns slot allocation. A slot holds metadata only while
//! its entity is alive; freeing a slot bumps the generation so stale handles
//! stop resolving.

use crate::ecs::Entity;

/// Lifecycle stage of an entity.
///
/// Stages only ever move forward.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EntityStage {
    /// Allocated with components attached, not yet part of the simulation.
    PreInit,
    Initializing,
    Initialized,
    Starting,
    /// Fully started and observable by the rest of the simulation.
    Started,
    Terminating,
    Deleted,
}

/// Bit flags cached on the entity metadata.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct MetaFlags(u8);

impl MetaFlags {
    pub const NONE: MetaFlags = MetaFlags(0);
    /// Mirrors container membership. The container registry is ground truth.
    pub const IN_CONTAINER: MetaFlags = MetaFlags(1 << 0);

    #[inline]
    pub fn contains(self, other: MetaFlags) -> bool {
        self.0 & other.0 == other.0
    }

    #[inline]
    pub fn insert(&mut self, other: MetaFlags) {
        self.0 |= other.0;
    }

    #[inline]
    pub fn remove(&mut self, other: MetaFlags) {
        self.0 &= !other.0;
    }

    #[inline]
    pub fn bits(self) -> u8 {
        self.0
    }
}

/// Metadata kept for every live entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityMeta {
    pub prototype: Option<String>,
    pub stage: EntityStage,
    pub flags: MetaFlags,
}

impl EntityMeta {
    pub fn new(prototype: Option<String>) -> Self {
        Self {
            prototype,
            stage: EntityStage::PreInit,
            flags: MetaFlags::NONE,
        }
    }

    #[inline]
    pub fn in_container(&self) -> bool {
        self.flags.contains(MetaFlags::IN_CONTAINER)
    }

    #[inline]
    pub fn is_terminating(&self) -> bool {
        self.stage >= EntityStage::Terminating
    }
}

struct Slot {
    generation: u32,
    meta: Option<EntityMeta>,
}

/// Slot allocator plus metadata storage for every entity.
#[derive(Default)]
pub struct EntityTable {
    slots: Vec<Slot>,
    free: Vec<u32>,
    alive: usize,
}

impl EntityTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh handle (reuses freed slots with a bumped generation).
    pub fn allocate(&mut self, meta: EntityMeta) -> Entity {
        self.alive += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.meta = Some(meta);
            return Entity::new(index, slot.generation);
        }

        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            meta: Some(meta),
        });
        Entity::new(index, 0)
    }

    /// Release a slot. Returns false if the handle was already stale.
    pub fn free(&mut self, entity: Entity) -> bool {
        let Some(slot) = self.slots.get_mut(entity.index() as usize) else {
            return false;
        };
        if slot.generation != entity.generation() || slot.meta.is_none() {
            return false;
        }
        slot.meta = None;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(entity.index());
        self.alive -= 1;
        true
    }

    pub fn get(&self, entity: Entity) -> Option<&EntityMeta> {
        let slot = self.slots.get(entity.index() as usize)?;
        if slot.generation != entity.generation() {
            return None;
        }
        slot.meta.as_ref()
    }

    pub fn get_mut(&mut self, entity: Entity) -> Option<&mut EntityMeta> {
        let slot = self.slots.get_mut(entity.index() as usize)?;
        if slot.generation != entity.generation() {
            return None;
        }
        slot.meta.as_mut()
    }

    #[inline]
    pub fn contains(&self, entity: Entity) -> bool {
        self.get(entity).is_some()
    }

    /// Number of live entities.
    #[inline]
    pub fn len(&self) -> usize {
        self.alive
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.alive == 0
    }

    /// Iterate over live entities in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (Entity, &EntityMeta)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.meta
                .as_ref()
                .map(|meta| (Entity::new(index as u32, slot.generation), meta))
        })
    }
}
