//! Spatial hierarchy: parent/child links, local offsets and map roots.
//!
//! The entity manager only talks to the hierarchy through
//! [`SpatialHierarchy`], so a host engine can plug in its own transform
//! system. [`TransformTree`] is the in-process implementation.

use crate::ecs::{Entity, EntityCoordinates, MapCoordinates, MapId};
use glam::Vec2;
use std::collections::HashMap;

/// Contract consumed from the transform system.
pub trait SpatialHierarchy: Send + Sync {
    /// Register `root` as the root entity of `map`.
    fn register_map(&mut self, map: MapId, root: Entity);

    /// Root entity of a map, if the map exists.
    fn map_root(&self, map: MapId) -> Option<Entity>;

    /// Start tracking an entity (placed in nullspace).
    fn insert(&mut self, entity: Entity);

    /// Stop tracking an entity. Its children become parentless and a map
    /// rooted at it is unregistered.
    fn remove(&mut self, entity: Entity);

    fn parent(&self, entity: Entity) -> Option<Entity>;

    fn children(&self, entity: Entity) -> Vec<Entity>;

    /// Map the entity lives on; `None` for nullspace or unknown entities.
    fn map_id(&self, entity: Entity) -> Option<MapId>;

    /// Parent plus local offset; `None` when the entity has no parent.
    fn coordinates(&self, entity: Entity) -> Option<EntityCoordinates>;

    /// Sum of local offsets from the map root down to the entity.
    fn world_position(&self, entity: Entity) -> Option<Vec2>;

    /// Re-parent an entity. Fails when either side is unknown or the move
    /// would create a cycle.
    fn set_parent(&mut self, entity: Entity, coords: EntityCoordinates) -> bool;

    /// Detach an entity from its parent, leaving it in nullspace.
    fn detach_to_nullspace(&mut self, entity: Entity);

    /// Place `entity` as a sibling of `target`, at the target's local
    /// offset plus `offset`. Fails when the target has no parent.
    fn drop_next_to(&mut self, entity: Entity, target: Entity, offset: Vec2) -> bool {
        match self.coordinates(target) {
            Some(coords) => self.set_parent(
                entity,
                EntityCoordinates::new(coords.anchor, coords.offset + offset),
            ),
            None => false,
        }
    }

    /// Place on a map at an absolute position; nullspace detaches.
    fn place_on_map(&mut self, entity: Entity, coords: MapCoordinates) -> bool {
        if coords.map.is_nullspace() {
            self.detach_to_nullspace(entity);
            return true;
        }
        match self.map_root(coords.map) {
            Some(root) => self.set_parent(entity, EntityCoordinates::new(root, coords.position)),
            None => false,
        }
    }
}

#[derive(Debug, Default)]
struct Node {
    parent: Option<Entity>,
    local: Vec2,
    children: Vec<Entity>,
}

/// Parent/child transform tree keyed by entity.
#[derive(Debug, Default)]
pub struct TransformTree {
    nodes: HashMap<Entity, Node>,
    maps: HashMap<MapId, Entity>,
    roots: HashMap<Entity, MapId>,
}

impl TransformTree {
    pub fn new() -> Self {
        Self::default()
    }

    fn unlink(&mut self, entity: Entity) {
        let parent = match self.nodes.get_mut(&entity) {
            Some(node) => node.parent.take(),
            None => return,
        };
        if let Some(parent) = parent {
            if let Some(parent_node) = self.nodes.get_mut(&parent) {
                parent_node.children.retain(|&child| child != entity);
            }
        }
    }

    fn is_ancestor_or_self(&self, candidate: Entity, of: Entity) -> bool {
        let mut cursor = Some(of);
        while let Some(current) = cursor {
            if current == candidate {
                return true;
            }
            cursor = self.nodes.get(&current).and_then(|node| node.parent);
        }
        false
    }

    fn root_of(&self, entity: Entity) -> Option<Entity> {
        let mut current = entity;
        let mut node = self.nodes.get(&current)?;
        while let Some(parent) = node.parent {
            current = parent;
            node = self.nodes.get(&current)?;
        }
        Some(current)
    }
}

impl SpatialHierarchy for TransformTree {
    fn register_map(&mut self, map: MapId, root: Entity) {
        self.nodes.entry(root).or_default();
        self.unlink(root);
        self.maps.insert(map, root);
        self.roots.insert(root, map);
    }

    fn map_root(&self, map: MapId) -> Option<Entity> {
        self.maps.get(&map).copied()
    }

    fn insert(&mut self, entity: Entity) {
        self.nodes.entry(entity).or_default();
    }

    fn remove(&mut self, entity: Entity) {
        self.unlink(entity);
        if let Some(node) = self.nodes.remove(&entity) {
            for child in node.children {
                if let Some(child_node) = self.nodes.get_mut(&child) {
                    child_node.parent = None;
                }
            }
        }
        if let Some(map) = self.roots.remove(&entity) {
            self.maps.remove(&map);
        }
    }

    fn parent(&self, entity: Entity) -> Option<Entity> {
        self.nodes.get(&entity)?.parent
    }

    fn children(&self, entity: Entity) -> Vec<Entity> {
        self.nodes
            .get(&entity)
            .map(|node| node.children.clone())
            .unwrap_or_default()
    }

    fn map_id(&self, entity: Entity) -> Option<MapId> {
        let root = self.root_of(entity)?;
        self.roots.get(&root).copied()
    }

    fn coordinates(&self, entity: Entity) -> Option<EntityCoordinates> {
        let node = self.nodes.get(&entity)?;
        node.parent
            .map(|parent| EntityCoordinates::new(parent, node.local))
    }

    fn world_position(&self, entity: Entity) -> Option<Vec2> {
        let mut node = self.nodes.get(&entity)?;
        let mut position = node.local;
        while let Some(parent) = node.parent {
            node = self.nodes.get(&parent)?;
            position += node.local;
        }
        Some(position)
    }

    fn set_parent(&mut self, entity: Entity, coords: EntityCoordinates) -> bool {
        if !self.nodes.contains_key(&entity) || !self.nodes.contains_key(&coords.anchor) {
            return false;
        }
        if self.roots.contains_key(&entity) || self.is_ancestor_or_self(entity, coords.anchor) {
            return false;
        }
        self.unlink(entity);
        if let Some(node) = self.nodes.get_mut(&entity) {
            node.parent = Some(coords.anchor);
            node.local = coords.offset;
        }
        if let Some(parent) = self.nodes.get_mut(&coords.anchor) {
            parent.children.push(entity);
        }
        true
    }

    fn detach_to_nullspace(&mut self, entity: Entity) {
        self.unlink(entity);
        if let Some(node) = self.nodes.get_mut(&entity) {
            node.local = Vec2::ZERO;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn e(index: u32) -> Entity {
        Entity::new(index, 0)
    }

    fn tree_with_map() -> TransformTree {
        let mut tree = TransformTree::new();
        tree.register_map(MapId(1), e(0));
        for i in 1..5 {
            tree.insert(e(i));
        }
        tree
    }

    #[test]
    fn map_membership_follows_parent_chain() {
        let mut tree = tree_with_map();
        assert_eq!(tree.map_id(e(0)), Some(MapId(1)));
        assert_eq!(tree.map_id(e(1)), None);

        assert!(tree.place_on_map(e(1), MapCoordinates::new(MapId(1), Vec2::new(2.0, 3.0))));
        assert!(tree.set_parent(e(2), EntityCoordinates::new(e(1), Vec2::new(1.0, 0.0))));
        assert_eq!(tree.map_id(e(2)), Some(MapId(1)));
        assert_eq!(tree.world_position(e(2)), Some(Vec2::new(3.0, 3.0)));
        assert_eq!(tree.children(e(1)), vec![e(2)]);
    }

    #[test]
    fn cycles_and_unknown_anchors_are_rejected() {
        let mut tree = tree_with_map();
        assert!(tree.set_parent(e(2), EntityCoordinates::at(e(1))));
        assert!(!tree.set_parent(e(1), EntityCoordinates::at(e(2))));
        assert!(!tree.set_parent(e(1), EntityCoordinates::at(e(1))));
        assert!(!tree.set_parent(e(1), EntityCoordinates::at(e(42))));
        assert!(!tree.set_parent(e(0), EntityCoordinates::at(e(1))));
    }

    #[test]
    fn drop_next_to_makes_a_sibling() {
        let mut tree = tree_with_map();
        tree.place_on_map(e(1), MapCoordinates::new(MapId(1), Vec2::new(5.0, 5.0)));
        assert!(tree.drop_next_to(e(3), e(1), Vec2::new(0.5, 0.0)));
        assert_eq!(tree.parent(e(3)), Some(e(0)));
        assert_eq!(tree.world_position(e(3)), Some(Vec2::new(5.5, 5.0)));

        // Nothing to be adjacent to in nullspace.
        assert!(!tree.drop_next_to(e(4), e(2), Vec2::ZERO));
    }

    #[test]
    fn removing_a_map_root_unregisters_the_map() {
        let mut tree = tree_with_map();
        tree.place_on_map(e(1), MapCoordinates::new(MapId(1), Vec2::ZERO));
        tree.remove(e(0));
        assert_eq!(tree.map_root(MapId(1)), None);
        assert_eq!(tree.parent(e(1)), None);
        assert!(!tree.place_on_map(e(2), MapCoordinates::new(MapId(1), Vec2::ZERO)));
    }
}
