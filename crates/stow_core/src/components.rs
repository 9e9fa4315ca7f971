//! Components the core itself attaches.

use crate::define_component;
use crate::ecs::Component;
use crate::session::SessionId;
use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Marks an entity as controlled by a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorComponent {
    pub session: SessionId,
}
define_component!(ActorComponent, 1, "Actor");

/// What an attached session observes through.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EyeComponent {
    pub draw_fov: bool,
    pub zoom: Vec2,
}
define_component!(EyeComponent, 2, "Eye");

impl Default for EyeComponent {
    fn default() -> Self {
        Self {
            draw_fov: true,
            zoom: Vec2::ONE,
        }
    }
}

/// Register the built-in components with the global registry.
pub fn register_builtin() {
    ActorComponent::ensure_registered();
    EyeComponent::ensure_registered();
}
