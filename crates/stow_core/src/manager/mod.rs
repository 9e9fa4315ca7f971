//! The entity manager: lifecycle, container-aware placement and actor
//! attachment on top of the storage-only [`World`].
//!
//! All operations run synchronously on the caller's thread. Within one call
//! side effects happen in a fixed order (component mutation, container
//! insertion, notification), so listeners always see the final state.

mod actor;
mod events;
mod hooks;
mod lifecycle;
mod placement;

pub use actor::{AttachOutcome, SessionDetach};
pub use events::{ActorEvent, ListenerId};
pub use hooks::{LifecycleHook, ShutdownHook};

use crate::components::{register_builtin, ActorComponent};
use crate::config::CoreConfig;
use crate::container::{Container, ContainerSpec};
use crate::ecs::{Component, ComponentId, Entity, EntityStage, ErasedComponent, World};
use crate::error::{InsertionRejected, LifecycleError};
use crate::prototype::PrototypeIndex;
use crate::session::SessionTable;
use crate::transform::{SpatialHierarchy, TransformTree};
use events::EventBus;
use hooks::{HookTable, Phase};
use std::sync::Arc;
use stow_metrics::Counter;
use tracing::{debug, error};

pub struct EntityManager {
    world: World,
    prototypes: Arc<dyn PrototypeIndex>,
    sessions: SessionTable,
    hooks: HookTable,
    events: EventBus,
    config: CoreConfig,
    counters: Counter,
}

impl EntityManager {
    /// Create a manager with an in-process [`TransformTree`].
    pub fn new(prototypes: Arc<dyn PrototypeIndex>, config: CoreConfig) -> Self {
        Self::with_spatial(prototypes, Box::new(TransformTree::new()), config)
    }

    /// Create a manager backed by a caller-provided spatial hierarchy.
    pub fn with_spatial(
        prototypes: Arc<dyn PrototypeIndex>,
        spatial: Box<dyn SpatialHierarchy>,
        config: CoreConfig,
    ) -> Self {
        register_builtin();
        let mut manager = Self {
            world: World::new(spatial),
            prototypes,
            sessions: SessionTable::new(),
            hooks: HookTable::default(),
            events: EventBus::default(),
            config,
            counters: Counter::new(),
        };
        manager
            .hooks
            .add_shutdown(ActorComponent::ID, actor::actor_shutdown);
        manager
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn sessions(&self) -> &SessionTable {
        &self.sessions
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn counters(&self) -> &Counter {
        &self.counters
    }

    // ------------------------------------------------------------------
    // Hooks and listeners
    // ------------------------------------------------------------------

    /// Run `hook` for every entity carrying `T` when it initializes.
    pub fn on_init<T: Component>(&mut self, hook: LifecycleHook) {
        T::ensure_registered();
        self.hooks.add(Phase::Init, T::ID, hook);
    }

    /// Run `hook` for every entity carrying `T` when it starts.
    pub fn on_startup<T: Component>(&mut self, hook: LifecycleHook) {
        T::ensure_registered();
        self.hooks.add(Phase::Startup, T::ID, hook);
    }

    /// Run `hook` after `T` is removed from an initialized entity.
    pub fn on_shutdown<T: Component>(&mut self, hook: ShutdownHook) {
        T::ensure_registered();
        self.hooks.add_shutdown(T::ID, hook);
    }

    pub fn subscribe<F>(&mut self, listener: F) -> ListenerId
    where
        F: FnMut(&EntityManager, &ActorEvent) + Send + 'static,
    {
        self.events.subscribe(Box::new(listener))
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.events.unsubscribe(id)
    }

    pub fn listener_count(&self) -> usize {
        self.events.len()
    }

    /// Deliver an event to every listener, synchronously and in order.
    pub(crate) fn raise(&mut self, event: ActorEvent) {
        debug!(?event, "actor event");
        let mut listeners = self.events.take();
        for (_, listener) in listeners.iter_mut() {
            listener(self, &event);
        }
        self.events.restore(listeners);
    }

    pub(crate) fn run_hooks(&mut self, entity: Entity, phase: Phase) {
        let components = self.world.components().component_ids(entity);
        for component in components {
            let hooks = self.hooks.lifecycle(phase, component);
            for hook in hooks {
                hook(self, entity);
            }
        }
    }

    // ------------------------------------------------------------------
    // Components
    // ------------------------------------------------------------------

    pub fn get<T: Component>(&self, entity: Entity) -> Option<&T> {
        self.world.get::<T>(entity)
    }

    /// Mutable access to a component. The actor marker is read-only here.
    pub fn get_mut<T: Component>(&mut self, entity: Entity) -> Option<&mut T> {
        if T::ID == ActorComponent::ID {
            return None;
        }
        self.world.get_mut::<T>(entity)
    }

    pub fn has<T: Component>(&self, entity: Entity) -> bool {
        self.world.has::<T>(entity)
    }

    /// Add or replace a component.
    ///
    /// A newly added component on an already initialized entity runs its
    /// init hooks, and its startup hooks too if the entity has started.
    /// Replacing an existing value runs no hooks and returns the old value.
    /// The actor marker is refused; it only changes through attach, detach
    /// and delete.
    pub fn add_component<T: Component>(
        &mut self,
        entity: Entity,
        component: T,
    ) -> Result<Option<T>, LifecycleError> {
        if T::ID == ActorComponent::ID {
            return Err(LifecycleError::ReservedComponent {
                name: T::NAME.to_string(),
            });
        }
        self.insert_component(entity, component)
    }

    pub(crate) fn insert_component<T: Component>(
        &mut self,
        entity: Entity,
        component: T,
    ) -> Result<Option<T>, LifecycleError> {
        let stage = match self.world.meta(entity) {
            Some(meta) if !meta.is_terminating() => meta.stage,
            _ => return Err(LifecycleError::EntityNotFound { entity }),
        };
        if let Some(previous) = self.world.components_mut().insert(entity, component) {
            return Ok(Some(previous));
        }
        if stage >= EntityStage::Initialized {
            let hooks = self.hooks.lifecycle(Phase::Init, T::ID);
            for hook in hooks {
                hook(self, entity);
            }
        }
        if stage >= EntityStage::Started {
            let hooks = self.hooks.lifecycle(Phase::Startup, T::ID);
            for hook in hooks {
                hook(self, entity);
            }
        }
        Ok(None)
    }

    /// Remove a component, running its shutdown hooks afterwards. Returns
    /// `None` for the actor marker, which is left in place.
    pub fn remove_component<T: Component>(&mut self, entity: Entity) -> Option<T> {
        if T::ID == ActorComponent::ID {
            return None;
        }
        self.take_component(entity)
    }

    pub(crate) fn take_component<T: Component>(&mut self, entity: Entity) -> Option<T> {
        let initialized = self
            .world
            .meta(entity)
            .is_some_and(|meta| meta.stage >= EntityStage::Initialized);
        let removed = self.remove_component_by_id(entity, T::ID, initialized)?;
        removed
            .into_any()
            .downcast::<T>()
            .ok()
            .map(|component| *component)
    }

    pub(crate) fn remove_component_by_id(
        &mut self,
        entity: Entity,
        id: ComponentId,
        run_shutdown: bool,
    ) -> Option<Box<dyn ErasedComponent>> {
        let removed = self.world.components_mut().remove_by_id(entity, id)?;
        if run_shutdown {
            let hooks = self.hooks.shutdown(id);
            for hook in hooks {
                hook(self, entity, &*removed);
            }
        }
        Some(removed)
    }

    // ------------------------------------------------------------------
    // Containers
    // ------------------------------------------------------------------

    /// Create a container on `owner` unless one with this name exists.
    pub fn ensure_container(
        &mut self,
        owner: Entity,
        name: &str,
        spec: ContainerSpec,
    ) -> Result<(), LifecycleError> {
        if self.world.is_terminating(owner) {
            return Err(LifecycleError::EntityNotFound { entity: owner });
        }
        self.world.ensure_container(owner, name, spec);
        Ok(())
    }

    pub fn container(&self, owner: Entity, name: &str) -> Option<&Container> {
        self.world.container(owner, name)
    }

    /// Container currently holding `member`.
    pub fn container_of(&self, member: Entity) -> Option<&Container> {
        self.world.containers().container_of(member)
    }

    pub fn insert_into_container(
        &mut self,
        owner: Entity,
        name: &str,
        member: Entity,
    ) -> Result<(), InsertionRejected> {
        let result = self.world.insert_into_container(owner, name, member);
        match &result {
            Ok(()) => debug!(%owner, container = name, %member, "inserted into container"),
            Err(reason) => debug!(%owner, container = name, %member, %reason, "insertion rejected"),
        }
        self.check_container_flags();
        result
    }

    /// Take `member` out of its container and drop it next to the owner.
    pub fn remove_from_container(&mut self, member: Entity) -> bool {
        let removed = self
            .world
            .remove_from_container(member, self.config.drop_offset);
        if let Some((owner, name)) = &removed {
            debug!(%owner, container = %name, %member, "removed from container");
        }
        self.check_container_flags();
        removed.is_some()
    }

    /// Entities whose InContainer flag disagrees with the container registry.
    pub fn verify_container_flags(&self) -> Vec<Entity> {
        self.world.verify_container_flags()
    }

    fn check_container_flags(&self) {
        if !self.config.verify_container_flags {
            return;
        }
        for entity in self.world.verify_container_flags() {
            error!(%entity, "InContainer flag disagrees with container registry");
        }
    }
}
