//! Named, owner-scoped containers with exclusive membership.
//!
//! The registry is ground truth for membership. It also owns the
//! `IN_CONTAINER` flag on entity metadata and the member's spatial parent:
//! both are updated here, in the same call that changes membership, so
//! callers never touch the cache directly.

use crate::ecs::{Entity, EntityCoordinates, EntityTable, MetaFlags};
use crate::error::InsertionRejected;
use crate::transform::SpatialHierarchy;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Declarative container settings, as found in prototype documents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerSpec {
    /// Maximum number of members; `None` means unbounded.
    pub capacity: Option<usize>,
    /// Prototype ids accepted by this container; `None` accepts anything.
    pub whitelist: Option<Vec<String>>,
}

/// A single named container on an owner entity.
#[derive(Debug, Clone)]
pub struct Container {
    name: String,
    owner: Entity,
    spec: ContainerSpec,
    members: Vec<Entity>,
}

impl Container {
    fn new(owner: Entity, name: String, spec: ContainerSpec) -> Self {
        Self {
            name,
            owner,
            spec,
            members: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn owner(&self) -> Entity {
        self.owner
    }

    pub fn spec(&self) -> &ContainerSpec {
        &self.spec
    }

    /// Members in insertion order.
    pub fn members(&self) -> &[Entity] {
        &self.members
    }

    pub fn contains(&self, entity: Entity) -> bool {
        self.members.contains(&entity)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.spec
            .capacity
            .is_some_and(|capacity| self.members.len() >= capacity)
    }

    fn accepts(&self, prototype: Option<&str>) -> bool {
        match &self.spec.whitelist {
            None => true,
            Some(allowed) => prototype.is_some_and(|id| allowed.iter().any(|a| a == id)),
        }
    }
}

/// All containers in the world, indexed by owner and by member.
#[derive(Debug, Default)]
pub struct ContainerRegistry {
    owners: HashMap<Entity, BTreeMap<String, Container>>,
    membership: HashMap<Entity, (Entity, String)>,
}

impl ContainerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a container if the owner does not have one with this name.
    /// An existing container keeps its spec and members.
    pub fn ensure(&mut self, owner: Entity, name: &str, spec: ContainerSpec) -> &Container {
        self.owners
            .entry(owner)
            .or_default()
            .entry(name.to_string())
            .or_insert_with(|| Container::new(owner, name.to_string(), spec))
    }

    pub fn get(&self, owner: Entity, name: &str) -> Option<&Container> {
        self.owners.get(&owner)?.get(name)
    }

    /// Containers of an owner, ordered by name.
    pub fn containers_of(&self, owner: Entity) -> impl Iterator<Item = &Container> {
        self.owners
            .get(&owner)
            .into_iter()
            .flat_map(|containers| containers.values())
    }

    /// Scan the owner's containers for the one holding `member`.
    pub fn find_in_owner(&self, owner: Entity, member: Entity) -> Option<&Container> {
        self.containers_of(owner).find(|container| container.contains(member))
    }

    /// Container currently holding `member`, anywhere in the world.
    pub fn container_of(&self, member: Entity) -> Option<&Container> {
        let (owner, name) = self.membership.get(&member)?;
        self.get(*owner, name)
    }

    #[inline]
    pub fn is_member(&self, entity: Entity) -> bool {
        self.membership.contains_key(&entity)
    }

    /// Insert `member` into `owner`'s container `name`.
    ///
    /// On success the member's flag is set and its spatial parent becomes
    /// the owner. On failure nothing changes.
    pub fn insert(
        &mut self,
        entities: &mut EntityTable,
        spatial: &mut dyn SpatialHierarchy,
        owner: Entity,
        name: &str,
        member: Entity,
    ) -> Result<(), InsertionRejected> {
        let prototype = match entities.get(member) {
            Some(meta) if !meta.is_terminating() => meta.prototype.clone(),
            _ => return Err(InsertionRejected::EntityMissing),
        };
        if !entities.get(owner).is_some_and(|meta| !meta.is_terminating()) {
            return Err(InsertionRejected::ContainerMissing);
        }
        if member == owner {
            return Err(InsertionRejected::SelfInsertion);
        }
        if self.membership.contains_key(&member) {
            return Err(InsertionRejected::AlreadyContained);
        }
        let mut cursor = spatial.parent(owner);
        while let Some(ancestor) = cursor {
            if ancestor == member {
                return Err(InsertionRejected::WouldCycle);
            }
            cursor = spatial.parent(ancestor);
        }

        let container = self
            .owners
            .get_mut(&owner)
            .and_then(|containers| containers.get_mut(name))
            .ok_or(InsertionRejected::ContainerMissing)?;
        if container.is_full() {
            return Err(InsertionRejected::Full);
        }
        if !container.accepts(prototype.as_deref()) {
            return Err(InsertionRejected::Filtered);
        }
        if !spatial.set_parent(member, EntityCoordinates::at(owner)) {
            return Err(InsertionRejected::WouldCycle);
        }

        container.members.push(member);
        self.membership.insert(member, (owner, name.to_string()));
        if let Some(meta) = entities.get_mut(member) {
            meta.flags.insert(MetaFlags::IN_CONTAINER);
        }
        Ok(())
    }

    /// Remove `member` from whatever container holds it, clearing the flag.
    ///
    /// The member keeps the owner as spatial parent; the caller decides
    /// where it goes next. Returns the former owner and container name.
    pub fn remove(&mut self, entities: &mut EntityTable, member: Entity) -> Option<(Entity, String)> {
        let (owner, name) = self.membership.remove(&member)?;
        if let Some(container) = self
            .owners
            .get_mut(&owner)
            .and_then(|containers| containers.get_mut(&name))
        {
            container.members.retain(|&m| m != member);
        }
        if let Some(meta) = entities.get_mut(member) {
            meta.flags.remove(MetaFlags::IN_CONTAINER);
        }
        Some((owner, name))
    }

    /// Forget every container owned by `owner`, returning members that were
    /// still inside (their flags are cleared).
    pub fn remove_owner(&mut self, entities: &mut EntityTable, owner: Entity) -> Vec<Entity> {
        let Some(containers) = self.owners.remove(&owner) else {
            return Vec::new();
        };
        let mut orphans = Vec::new();
        for container in containers.into_values() {
            for member in container.members {
                self.membership.remove(&member);
                if let Some(meta) = entities.get_mut(member) {
                    meta.flags.remove(MetaFlags::IN_CONTAINER);
                }
                orphans.push(member);
            }
        }
        orphans
    }

    /// Entities whose cached flag disagrees with the registry.
    pub fn flag_mismatches(&self, entities: &EntityTable) -> Vec<Entity> {
        let mut mismatched: Vec<Entity> = entities
            .iter()
            .filter(|(entity, meta)| meta.in_container() != self.membership.contains_key(entity))
            .map(|(entity, _)| entity)
            .collect();
        mismatched.extend(
            self.membership
                .keys()
                .filter(|member| !entities.contains(**member))
                .copied(),
        );
        mismatched
    }
}
