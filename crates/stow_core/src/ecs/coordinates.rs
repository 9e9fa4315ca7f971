//! Map identifiers and the two coordinate forms used for placement.

use crate::ecs::Entity;
use glam::Vec2;
use std::fmt;

/// Identifier of a map. `MapId::NULLSPACE` means "not placed in any map".
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MapId(pub u32);

impl MapId {
    pub const NULLSPACE: MapId = MapId(0);

    #[inline]
    pub fn is_nullspace(self) -> bool {
        self == Self::NULLSPACE
    }
}

impl fmt::Display for MapId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_nullspace() {
            write!(f, "nullspace")
        } else {
            write!(f, "map{}", self.0)
        }
    }
}

/// Absolute position on a map.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct MapCoordinates {
    pub map: MapId,
    pub position: Vec2,
}

impl MapCoordinates {
    pub const NULLSPACE: MapCoordinates = MapCoordinates {
        map: MapId::NULLSPACE,
        position: Vec2::ZERO,
    };

    pub fn new(map: MapId, position: Vec2) -> Self {
        Self { map, position }
    }
}

/// Position relative to an anchor entity.
///
/// Only valid while the anchor exists and is attached to a map.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct EntityCoordinates {
    pub anchor: Entity,
    pub offset: Vec2,
}

impl EntityCoordinates {
    pub fn new(anchor: Entity, offset: Vec2) -> Self {
        Self { anchor, offset }
    }

    /// Coordinates at the anchor's origin.
    pub fn at(anchor: Entity) -> Self {
        Self::new(anchor, Vec2::ZERO)
    }
}

/// Either coordinate form, as accepted by `create_uninitialized`.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Coordinates {
    Map(MapCoordinates),
    Entity(EntityCoordinates),
}

impl From<MapCoordinates> for Coordinates {
    fn from(coords: MapCoordinates) -> Self {
        Coordinates::Map(coords)
    }
}

impl From<EntityCoordinates> for Coordinates {
    fn from(coords: EntityCoordinates) -> Self {
        Coordinates::Entity(coords)
    }
}
