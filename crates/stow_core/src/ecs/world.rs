// world.rs - Entity table, component store, spatial hierarchy and containers
//
// The world is pure storage: it never runs hooks or raises events. The
// entity manager layers lifecycle semantics on top of it.

use crate::container::{Container, ContainerRegistry, ContainerSpec};
use crate::ecs::{
    Component, ComponentStore, Entity, EntityCoordinates, EntityMeta, EntityTable, MapId,
};
use crate::error::InsertionRejected;
use crate::transform::{SpatialHierarchy, TransformTree};
use glam::Vec2;

/// The main ECS world containing all entities and components.
pub struct World {
    entities: EntityTable,
    components: ComponentStore,
    spatial: Box<dyn SpatialHierarchy>,
    containers: ContainerRegistry,
    next_map: u32,
}

impl World {
    /// Create an empty world backed by the given spatial hierarchy.
    pub fn new(spatial: Box<dyn SpatialHierarchy>) -> Self {
        Self {
            entities: EntityTable::new(),
            components: ComponentStore::new(),
            spatial,
            containers: ContainerRegistry::new(),
            next_map: 0,
        }
    }

    pub(crate) fn allocate(&mut self, meta: EntityMeta) -> Entity {
        let entity = self.entities.allocate(meta);
        self.spatial.insert(entity);
        entity
    }

    pub(crate) fn free(&mut self, entity: Entity) -> bool {
        self.spatial.remove(entity);
        self.entities.free(entity)
    }

    pub fn entities(&self) -> &EntityTable {
        &self.entities
    }

    pub(crate) fn entities_mut(&mut self) -> &mut EntityTable {
        &mut self.entities
    }

    pub fn components(&self) -> &ComponentStore {
        &self.components
    }

    pub(crate) fn components_mut(&mut self) -> &mut ComponentStore {
        &mut self.components
    }

    pub fn spatial(&self) -> &dyn SpatialHierarchy {
        self.spatial.as_ref()
    }

    pub(crate) fn spatial_mut(&mut self) -> &mut dyn SpatialHierarchy {
        self.spatial.as_mut()
    }

    pub fn containers(&self) -> &ContainerRegistry {
        &self.containers
    }

    pub fn meta(&self, entity: Entity) -> Option<&EntityMeta> {
        self.entities.get(entity)
    }

    /// Whether the handle refers to a live (possibly terminating) entity.
    #[inline]
    pub fn exists(&self, entity: Entity) -> bool {
        self.entities.contains(entity)
    }

    /// True once deletion has begun. Unknown handles count as terminating.
    pub fn is_terminating(&self, entity: Entity) -> bool {
        self.entities
            .get(entity)
            .map_or(true, EntityMeta::is_terminating)
    }

    pub fn get<T: Component>(&self, entity: Entity) -> Option<&T> {
        self.components.get::<T>(entity)
    }

    pub fn get_mut<T: Component>(&mut self, entity: Entity) -> Option<&mut T> {
        self.components.get_mut::<T>(entity)
    }

    pub fn has<T: Component>(&self, entity: Entity) -> bool {
        self.components.has::<T>(entity)
    }

    /// Map an entity lives on; `None` for nullspace.
    pub fn map_of(&self, entity: Entity) -> Option<MapId> {
        self.spatial.map_id(entity)
    }

    pub fn map_exists(&self, map: MapId) -> bool {
        map.is_nullspace() || self.spatial.map_root(map).is_some()
    }

    /// Entity-relative coordinates are valid while the anchor is alive and
    /// attached to a map.
    pub fn coordinates_valid(&self, coords: &EntityCoordinates) -> bool {
        self.entities
            .get(coords.anchor)
            .is_some_and(|meta| !meta.is_terminating())
            && self.spatial.map_id(coords.anchor).is_some()
    }

    pub(crate) fn ensure_container(&mut self, owner: Entity, name: &str, spec: ContainerSpec) {
        self.containers.ensure(owner, name, spec);
    }

    pub fn container(&self, owner: Entity, name: &str) -> Option<&Container> {
        self.containers.get(owner, name)
    }

    pub(crate) fn insert_into_container(
        &mut self,
        owner: Entity,
        name: &str,
        member: Entity,
    ) -> Result<(), InsertionRejected> {
        self.containers.insert(
            &mut self.entities,
            self.spatial.as_mut(),
            owner,
            name,
            member,
        )
    }

    /// Take `member` out of its container and drop it next to the owner.
    pub(crate) fn remove_from_container(
        &mut self,
        member: Entity,
        drop_offset: Vec2,
    ) -> Option<(Entity, String)> {
        let (owner, name) = self.containers.remove(&mut self.entities, member)?;
        self.drop_next_to(member, owner, drop_offset);
        Some((owner, name))
    }

    pub(crate) fn next_map_id(&mut self) -> MapId {
        self.next_map += 1;
        MapId(self.next_map)
    }

    /// Drop container membership without re-placing the entity.
    pub(crate) fn leave_container(&mut self, member: Entity) -> Option<(Entity, String)> {
        self.containers.remove(&mut self.entities, member)
    }

    pub(crate) fn remove_owned_containers(&mut self, owner: Entity) -> Vec<Entity> {
        self.containers.remove_owner(&mut self.entities, owner)
    }

    /// Place `entity` in free space next to `target`.
    ///
    /// A contained target is never used as the anchor directly: the walk
    /// climbs to the outermost container owner so the dropped entity does
    /// not end up parented to an owner without being a member. Returns
    /// false (entity left in nullspace) when the anchor has no parent.
    pub(crate) fn drop_next_to(&mut self, entity: Entity, target: Entity, offset: Vec2) -> bool {
        if self.containers.is_member(entity) {
            self.containers.remove(&mut self.entities, entity);
        }
        let mut anchor = target;
        while let Some(container) = self.containers.container_of(anchor) {
            anchor = container.owner();
        }
        if self.spatial.drop_next_to(entity, anchor, offset) {
            return true;
        }
        self.spatial.detach_to_nullspace(entity);
        false
    }

    /// Entities whose InContainer flag disagrees with the registry.
    pub fn verify_container_flags(&self) -> Vec<Entity> {
        self.containers.flag_mismatches(&self.entities)
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new(Box::new(TransformTree::new()))
    }
}
