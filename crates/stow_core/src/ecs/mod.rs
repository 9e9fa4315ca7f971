//! Entity Component System core types.
//!
//! Handles, per-entity metadata, the component registry and store, the two
//! coordinate forms, and the `World` that ties storage together. Lifecycle
//! semantics (hooks, events, placement policy) live in `crate::manager`.

mod component;
mod coordinates;
mod entity;
mod meta;
mod store;
mod world;

pub use component::{
    meta_of, meta_of_name, register_component, Component, ComponentFactory, ComponentId,
    ComponentMeta, ErasedComponent,
};
pub use coordinates::{Coordinates, EntityCoordinates, MapCoordinates, MapId};
pub use entity::Entity;
pub use meta::{EntityMeta, EntityStage, EntityTable, MetaFlags};
pub use store::ComponentStore;
pub use world::World;
