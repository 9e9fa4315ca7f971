//! Container-aware spawning relative to a target entity.
//!
//! The `try_*` forms either leave a placed entity behind or nothing at all:
//! an entity that was created but could not be inserted is deleted before
//! the error is returned. The `*_or_drop` forms always produce an entity,
//! falling back to free space next to the target, or nullspace.

use super::EntityManager;
use crate::ecs::{Entity, EntityCoordinates, MapCoordinates};
use crate::error::{LifecycleError, SpawnError};
use crate::prototype::ComponentOverrides;
use stow_metrics::metrics;
use tracing::{debug, error, warn};

impl EntityManager {
    /// Spawn next to `target`: as a sibling in free space, or into the same
    /// container if the target is contained.
    pub fn try_spawn_next_to(
        &mut self,
        prototype: Option<&str>,
        target: Entity,
        overrides: Option<&ComponentOverrides>,
    ) -> Result<Entity, SpawnError> {
        let Some(target_coords) = self.target_coordinates(target) else {
            return Err(SpawnError::NoSpatialParent { target });
        };
        let owner = target_coords.anchor;

        if !self.target_in_container(target) {
            return Ok(self.spawn_attached_to(prototype, target_coords, overrides)?);
        }

        let Some(name) = self
            .world
            .containers()
            .find_in_owner(owner, target)
            .map(|container| container.name().to_string())
        else {
            error!(%target, %owner, "target flagged as contained but no container of its parent holds it");
            return Err(SpawnError::MembershipInconsistent { target, owner });
        };

        self.spawn_and_insert(prototype, owner, &name, overrides)
    }

    /// Spawn directly into `owner`'s container `name`.
    pub fn try_spawn_in_container(
        &mut self,
        prototype: Option<&str>,
        owner: Entity,
        name: &str,
        overrides: Option<&ComponentOverrides>,
    ) -> Result<Entity, SpawnError> {
        if self.world.container(owner, name).is_none() {
            return Err(SpawnError::ContainerNotFound {
                owner,
                name: name.to_string(),
            });
        }
        self.spawn_and_insert(prototype, owner, name, overrides)
    }

    /// Like [`try_spawn_next_to`](Self::try_spawn_next_to) but never fails
    /// on placement. Errors only when the prototype itself cannot be built.
    pub fn spawn_next_to_or_drop(
        &mut self,
        prototype: Option<&str>,
        target: Entity,
        overrides: Option<&ComponentOverrides>,
    ) -> Result<Entity, LifecycleError> {
        let Some(target_coords) = self.target_coordinates(target) else {
            return self.spawn(prototype, MapCoordinates::NULLSPACE, overrides);
        };

        if !self.target_in_container(target) {
            match self.spawn_attached_to(prototype, target_coords, overrides) {
                Ok(entity) => return Ok(entity),
                Err(LifecycleError::InvalidPlacement { .. }) => {}
                Err(err) => return Err(err),
            }
            let entity = self.spawn(prototype, MapCoordinates::NULLSPACE, overrides)?;
            self.drop_fallback(entity, target);
            return Ok(entity);
        }

        let entity = self.spawn(prototype, MapCoordinates::NULLSPACE, overrides)?;
        let owner = target_coords.anchor;
        let name = self
            .world
            .containers()
            .find_in_owner(owner, target)
            .map(|container| container.name().to_string());
        match name {
            Some(name) => match self.insert_into_container(owner, &name, entity) {
                Ok(()) => return Ok(entity),
                Err(reason) => debug!(%entity, %owner, container = %name, %reason, "insert failed, dropping instead"),
            },
            None => error!(%target, %owner, "target flagged as contained but no container of its parent holds it"),
        }
        self.drop_fallback(entity, target);
        Ok(entity)
    }

    /// Like [`try_spawn_in_container`](Self::try_spawn_in_container) but
    /// never fails on placement. A missing container or a refused insertion
    /// drops the entity next to `owner` (or leaves it in nullspace).
    pub fn spawn_in_container_or_drop(
        &mut self,
        prototype: Option<&str>,
        owner: Entity,
        name: &str,
        overrides: Option<&ComponentOverrides>,
    ) -> Result<Entity, LifecycleError> {
        let entity = self.spawn(prototype, MapCoordinates::NULLSPACE, overrides)?;
        if self.world.container(owner, name).is_some() {
            match self.insert_into_container(owner, name, entity) {
                Ok(()) => return Ok(entity),
                Err(reason) => debug!(%entity, %owner, container = name, %reason, "insert failed, dropping instead"),
            }
        }
        self.drop_fallback(entity, owner);
        Ok(entity)
    }

    /// Spawn untethered, then insert; the spawned entity is deleted if the
    /// container refuses it.
    fn spawn_and_insert(
        &mut self,
        prototype: Option<&str>,
        owner: Entity,
        name: &str,
        overrides: Option<&ComponentOverrides>,
    ) -> Result<Entity, SpawnError> {
        let entity = self.spawn(prototype, MapCoordinates::NULLSPACE, overrides)?;
        if let Err(reason) = self.insert_into_container(owner, name, entity) {
            debug!(%entity, %owner, container = name, %reason, "rolling back spawn");
            self.delete(entity);
            metrics! { self.counters.increment("insert_rollback", 1); }
            return Err(SpawnError::InsertionRejected(reason));
        }
        Ok(entity)
    }

    /// Drop next to `target` if it has a spatial parent, else stay in nullspace.
    fn drop_fallback(&mut self, entity: Entity, target: Entity) {
        let offset = self.config.drop_offset;
        if !self.world.drop_next_to(entity, target, offset) {
            warn!(%entity, %target, "nothing to drop next to; left in nullspace");
        }
        metrics! { self.counters.increment("drop_fallback", 1); }
    }

    fn target_coordinates(&self, target: Entity) -> Option<EntityCoordinates> {
        if !self.world.exists(target) {
            return None;
        }
        self.world.spatial().coordinates(target)
    }

    fn target_in_container(&self, target: Entity) -> bool {
        self.world
            .meta(target)
            .is_some_and(|meta| meta.in_container())
    }
}
