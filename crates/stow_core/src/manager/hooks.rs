//! Per-component lifecycle hooks.
//!
//! Hooks are plain function pointers that receive the whole manager.
//! Within a phase, hooks run in ascending component id order, then in
//! registration order.

use crate::ecs::{ComponentId, Entity, ErasedComponent};
use crate::manager::EntityManager;
use std::collections::HashMap;

/// Runs during the initialize or start phase of an entity.
pub type LifecycleHook = fn(&mut EntityManager, Entity);

/// Runs after a component has been removed; receives the removed value.
pub type ShutdownHook = fn(&mut EntityManager, Entity, &dyn ErasedComponent);

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum Phase {
    Init,
    Startup,
}

#[derive(Default)]
pub(crate) struct HookTable {
    init: HashMap<ComponentId, Vec<LifecycleHook>>,
    startup: HashMap<ComponentId, Vec<LifecycleHook>>,
    shutdown: HashMap<ComponentId, Vec<ShutdownHook>>,
}

impl HookTable {
    pub fn add(&mut self, phase: Phase, component: ComponentId, hook: LifecycleHook) {
        let table = match phase {
            Phase::Init => &mut self.init,
            Phase::Startup => &mut self.startup,
        };
        table.entry(component).or_default().push(hook);
    }

    pub fn add_shutdown(&mut self, component: ComponentId, hook: ShutdownHook) {
        self.shutdown.entry(component).or_default().push(hook);
    }

    /// Copy of the hooks for one phase and component.
    pub fn lifecycle(&self, phase: Phase, component: ComponentId) -> Vec<LifecycleHook> {
        let table = match phase {
            Phase::Init => &self.init,
            Phase::Startup => &self.startup,
        };
        table.get(&component).cloned().unwrap_or_default()
    }

    pub fn shutdown(&self, component: ComponentId) -> Vec<ShutdownHook> {
        self.shutdown.get(&component).cloned().unwrap_or_default()
    }
}
