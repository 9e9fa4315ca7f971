//! Tunables for the entity manager.

use crate::components::EyeComponent;
use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Defaults for the eye ensured on attach.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EyeDefaults {
    pub draw_fov: bool,
    pub zoom: Vec2,
}

impl Default for EyeDefaults {
    fn default() -> Self {
        let eye = EyeComponent::default();
        Self {
            draw_fov: eye.draw_fov,
            zoom: eye.zoom,
        }
    }
}

impl From<EyeDefaults> for EyeComponent {
    fn from(defaults: EyeDefaults) -> Self {
        Self {
            draw_fov: defaults.draw_fov,
            zoom: defaults.zoom,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub eye: EyeDefaults,
    /// Local offset applied when an entity is dropped next to another.
    pub drop_offset: Vec2,
    /// Re-check the InContainer cache after every container mutation.
    pub verify_container_flags: bool,
}
