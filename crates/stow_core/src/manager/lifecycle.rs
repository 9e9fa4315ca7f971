//! Entity creation, two-phase start-up and deletion.
//!
//! Every precondition of a spawn (prototype, component data, coordinates)
//! is checked before an id is allocated, so a failed spawn never leaves an
//! entity behind.

use super::hooks::Phase;
use super::EntityManager;
use crate::ecs::{
    Coordinates, Entity, EntityCoordinates, EntityMeta, EntityStage, MapCoordinates, MapId,
};
use crate::error::{BatchSpawnError, LifecycleError};
use crate::prototype::{resolve, ComponentOverrides, ResolvedTemplate};
use stow_metrics::metrics;
use tracing::{debug, trace, warn};

impl EntityManager {
    /// Allocate an entity from a prototype and place it, without running
    /// any initialization logic.
    pub fn create_uninitialized(
        &mut self,
        prototype: Option<&str>,
        coords: impl Into<Coordinates>,
        overrides: Option<&ComponentOverrides>,
    ) -> Result<Entity, LifecycleError> {
        let coords = coords.into();
        self.check_coordinates(&coords)?;
        let template = self.resolve_template(prototype, overrides)?;

        let entity = self
            .world
            .allocate(EntityMeta::new(prototype.map(str::to_string)));
        for component in template.components {
            self.world.components_mut().insert_boxed(entity, component);
        }
        for (name, spec) in template.containers {
            self.world.ensure_container(entity, &name, spec);
        }

        let placed = match coords {
            Coordinates::Map(map_coords) => self.world.spatial_mut().place_on_map(entity, map_coords),
            Coordinates::Entity(entity_coords) => {
                self.world.spatial_mut().set_parent(entity, entity_coords)
            }
        };
        if !placed {
            warn!(%entity, ?coords, "spatial hierarchy refused placement; discarding entity");
            self.delete(entity);
            return Err(match coords {
                Coordinates::Map(map_coords) => LifecycleError::MapNotFound { map: map_coords.map },
                Coordinates::Entity(entity_coords) => LifecycleError::InvalidPlacement {
                    anchor: entity_coords.anchor,
                },
            });
        }

        trace!(%entity, prototype = prototype.unwrap_or("<none>"), "entity created");
        Ok(entity)
    }

    /// Run initialize hooks, then startup hooks, exactly once.
    ///
    /// `map` is the map the entity is being started into (`None` for
    /// nullspace); it must exist.
    pub fn initialize_and_start(
        &mut self,
        entity: Entity,
        map: Option<MapId>,
    ) -> Result<(), LifecycleError> {
        let stage = self
            .world
            .meta(entity)
            .map(|meta| meta.stage)
            .ok_or(LifecycleError::EntityNotFound { entity })?;
        if stage != EntityStage::PreInit {
            return Err(LifecycleError::InvalidStage {
                entity,
                stage: format!("{stage:?}"),
            });
        }
        if let Some(map) = map {
            if !self.world.map_exists(map) {
                return Err(LifecycleError::MapNotFound { map });
            }
        }

        self.advance_stage(entity, EntityStage::Initializing)?;
        self.run_hooks(entity, Phase::Init);
        self.advance_stage(entity, EntityStage::Initialized)?;
        self.advance_stage(entity, EntityStage::Starting)?;
        self.run_hooks(entity, Phase::Startup);
        self.advance_stage(entity, EntityStage::Started)?;

        debug!(%entity, map = %map.unwrap_or(MapId::NULLSPACE), "entity started");
        Ok(())
    }

    /// Create and start an entity at map coordinates.
    pub fn spawn(
        &mut self,
        prototype: Option<&str>,
        coords: MapCoordinates,
        overrides: Option<&ComponentOverrides>,
    ) -> Result<Entity, LifecycleError> {
        let entity = self.create_uninitialized(prototype, coords, overrides)?;
        let map = Some(coords.map).filter(|map| !map.is_nullspace());
        self.initialize_and_start(entity, map)?;
        metrics! { self.counters.increment("spawned", 1); }
        Ok(entity)
    }

    /// Create and start an entity relative to an anchor entity.
    ///
    /// Fails with `InvalidPlacement` before allocating anything when the
    /// anchor is gone or not on a map.
    pub fn spawn_attached_to(
        &mut self,
        prototype: Option<&str>,
        coords: EntityCoordinates,
        overrides: Option<&ComponentOverrides>,
    ) -> Result<Entity, LifecycleError> {
        let entity = self.create_uninitialized(prototype, coords, overrides)?;
        let map = self.world.map_of(entity);
        self.initialize_and_start(entity, map)?;
        metrics! { self.counters.increment("spawned", 1); }
        Ok(entity)
    }

    /// Spawn one entity per prototype, in order.
    ///
    /// A failure stops the batch; entities spawned before it stay in the
    /// world and are reported in the error.
    pub fn spawn_many<I, S>(
        &mut self,
        prototypes: I,
        coords: MapCoordinates,
    ) -> Result<Vec<Entity>, BatchSpawnError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.spawn_batch(prototypes, |manager, prototype| {
            manager.spawn(Some(prototype), coords, None)
        })
    }

    /// Batch form of [`spawn_attached_to`](Self::spawn_attached_to).
    pub fn spawn_many_attached_to<I, S>(
        &mut self,
        prototypes: I,
        coords: EntityCoordinates,
    ) -> Result<Vec<Entity>, BatchSpawnError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.spawn_batch(prototypes, |manager, prototype| {
            manager.spawn_attached_to(Some(prototype), coords, None)
        })
    }

    fn spawn_batch<I, S, F>(&mut self, prototypes: I, mut spawn_one: F) -> Result<Vec<Entity>, BatchSpawnError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
        F: FnMut(&mut EntityManager, &str) -> Result<Entity, LifecycleError>,
    {
        let mut spawned = Vec::new();
        for (index, prototype) in prototypes.into_iter().enumerate() {
            match spawn_one(self, prototype.as_ref()) {
                Ok(entity) => spawned.push(entity),
                Err(source) => {
                    warn!(index, prototype = prototype.as_ref(), %source, kept = spawned.len(), "batch spawn stopped");
                    return Err(BatchSpawnError {
                        spawned,
                        index,
                        source,
                    });
                }
            }
        }
        Ok(spawned)
    }

    /// Tear an entity down. Deleting an unknown or already deleted entity is
    /// a no-op.
    ///
    /// Order: container contents and spatial children are deleted first,
    /// then the entity leaves its own container, its components are removed
    /// in id order (running shutdown hooks if it was initialized), its
    /// containers and transform node are dropped and the slot is freed.
    pub fn delete(&mut self, entity: Entity) {
        let Some(meta) = self.world.meta(entity) else {
            trace!(%entity, "delete of unknown entity ignored");
            return;
        };
        if meta.is_terminating() {
            return;
        }
        let initialized = meta.stage >= EntityStage::Initialized;
        if let Some(meta) = self.world.entities_mut().get_mut(entity) {
            meta.stage = EntityStage::Terminating;
        }

        let contents: Vec<Entity> = self
            .world
            .containers()
            .containers_of(entity)
            .flat_map(|container| container.members().iter().copied())
            .collect();
        for member in contents {
            self.delete(member);
        }
        let children = self.world.spatial().children(entity);
        for child in children {
            self.delete(child);
        }

        if let Some((owner, name)) = self.world.leave_container(entity) {
            trace!(%entity, %owner, container = %name, "left container on delete");
        }
        let components = self.world.components().component_ids(entity);
        for id in components {
            self.remove_component_by_id(entity, id, initialized);
        }
        for orphan in self.world.remove_owned_containers(entity) {
            warn!(%entity, %orphan, "container still held a member during delete");
        }

        if let Some(meta) = self.world.entities_mut().get_mut(entity) {
            meta.stage = EntityStage::Deleted;
        }
        self.world.free(entity);
        self.check_container_flags();
        metrics! { self.counters.increment("deleted", 1); }
        debug!(%entity, "entity deleted");
    }

    pub fn exists(&self, entity: Entity) -> bool {
        self.world.exists(entity)
    }

    pub fn is_terminating(&self, entity: Entity) -> bool {
        self.world.is_terminating(entity)
    }

    pub fn stage(&self, entity: Entity) -> Option<EntityStage> {
        self.world.meta(entity).map(|meta| meta.stage)
    }

    /// Create a map and its root entity. The root is started immediately.
    pub fn create_map(&mut self) -> (MapId, Entity) {
        let map = self.world.next_map_id();
        let root = self.world.allocate(EntityMeta::new(None));
        self.world.spatial_mut().register_map(map, root);
        if let Some(meta) = self.world.entities_mut().get_mut(root) {
            meta.stage = EntityStage::Started;
        }
        debug!(%map, %root, "map created");
        (map, root)
    }

    fn check_coordinates(&self, coords: &Coordinates) -> Result<(), LifecycleError> {
        match coords {
            Coordinates::Map(map_coords) if !self.world.map_exists(map_coords.map) => {
                Err(LifecycleError::MapNotFound { map: map_coords.map })
            }
            Coordinates::Entity(entity_coords) if !self.world.coordinates_valid(entity_coords) => {
                Err(LifecycleError::InvalidPlacement {
                    anchor: entity_coords.anchor,
                })
            }
            _ => Ok(()),
        }
    }

    fn resolve_template(
        &self,
        prototype: Option<&str>,
        overrides: Option<&ComponentOverrides>,
    ) -> Result<ResolvedTemplate, LifecycleError> {
        let found = match prototype {
            Some(id) => Some(self.prototypes.index(id).ok_or_else(|| {
                LifecycleError::UnknownPrototype { id: id.to_string() }
            })?),
            None => None,
        };
        resolve(found, overrides)
    }

    /// Move the entity to `stage`, failing if a hook deleted it meanwhile.
    fn advance_stage(&mut self, entity: Entity, stage: EntityStage) -> Result<(), LifecycleError> {
        match self.world.entities_mut().get_mut(entity) {
            Some(meta) if !meta.is_terminating() => {
                meta.stage = stage;
                Ok(())
            }
            _ => Err(LifecycleError::EntityNotFound { entity }),
        }
    }
}
