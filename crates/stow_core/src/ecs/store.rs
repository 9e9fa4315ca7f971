// store.rs - Typed component storage keyed by entity
//
// One column per component kind. Columns hold boxed components so that
// prototype-built (type-erased) and Rust-typed values share one store.

use crate::ecs::{Component, ComponentId, Entity, ErasedComponent};
use std::collections::HashMap;

type Column = HashMap<Entity, Box<dyn ErasedComponent>>;

/// Storage for every component of every entity.
#[derive(Default)]
pub struct ComponentStore {
    columns: HashMap<ComponentId, Column>,
}

impl ComponentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a type-erased component, returning the value it replaced.
    pub fn insert_boxed(
        &mut self,
        entity: Entity,
        component: Box<dyn ErasedComponent>,
    ) -> Option<Box<dyn ErasedComponent>> {
        self.columns
            .entry(component.component_id())
            .or_default()
            .insert(entity, component)
    }

    /// Insert a typed component, returning the value it replaced.
    pub fn insert<T: Component>(&mut self, entity: Entity, component: T) -> Option<T> {
        self.insert_boxed(entity, Box::new(component))
            .and_then(|prev| prev.into_any().downcast::<T>().ok())
            .map(|prev| *prev)
    }

    /// Remove a component by id.
    pub fn remove_by_id(
        &mut self,
        entity: Entity,
        id: ComponentId,
    ) -> Option<Box<dyn ErasedComponent>> {
        self.columns.get_mut(&id)?.remove(&entity)
    }

    pub fn remove<T: Component>(&mut self, entity: Entity) -> Option<T> {
        self.remove_by_id(entity, T::ID)
            .and_then(|prev| prev.into_any().downcast::<T>().ok())
            .map(|prev| *prev)
    }

    pub fn get<T: Component>(&self, entity: Entity) -> Option<&T> {
        self.columns
            .get(&T::ID)?
            .get(&entity)?
            .as_any()
            .downcast_ref::<T>()
    }

    pub fn get_mut<T: Component>(&mut self, entity: Entity) -> Option<&mut T> {
        self.columns
            .get_mut(&T::ID)?
            .get_mut(&entity)?
            .as_any_mut()
            .downcast_mut::<T>()
    }

    #[inline]
    pub fn has<T: Component>(&self, entity: Entity) -> bool {
        self.has_id(entity, T::ID)
    }

    pub fn has_id(&self, entity: Entity, id: ComponentId) -> bool {
        self.columns
            .get(&id)
            .is_some_and(|column| column.contains_key(&entity))
    }

    /// Ids of every component the entity carries, in ascending order.
    pub fn component_ids(&self, entity: Entity) -> Vec<ComponentId> {
        let mut ids: Vec<ComponentId> = self
            .columns
            .iter()
            .filter(|(_, column)| column.contains_key(&entity))
            .map(|(&id, _)| id)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Entities that carry component `T`.
    pub fn entities_with<T: Component>(&self) -> impl Iterator<Item = Entity> + '_ {
        self.columns
            .get(&T::ID)
            .into_iter()
            .flat_map(|column| column.keys().copied())
    }
}
