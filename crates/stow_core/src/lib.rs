//! Stow Core
//!
//! Entity lifecycle and placement for a shared simulation world:
//! - Entity Component System storage (`ecs`)
//! - Spatial hierarchy and named containers
//! - Prototype-driven spawning with container-aware fallbacks
//! - Session to actor attachment

pub mod components;
pub mod config;
pub mod container;
pub mod ecs;
pub mod error;
pub mod manager;
pub mod prototype;
pub mod session;
pub mod transform;

pub use components::{ActorComponent, EyeComponent};
pub use config::{CoreConfig, EyeDefaults};
pub use container::{Container, ContainerRegistry, ContainerSpec};
pub use ecs::{Entity, EntityCoordinates, EntityStage, MapCoordinates, MapId};
pub use error::{AttachError, BatchSpawnError, InsertionRejected, LifecycleError, PrototypeError, SpawnError};
pub use manager::{ActorEvent, AttachOutcome, EntityManager, ListenerId, SessionDetach};
pub use prototype::{ComponentOverrides, Prototype, PrototypeIndex, PrototypeSet};
pub use session::{Session, SessionId, SessionTable, UserId};
pub use transform::{SpatialHierarchy, TransformTree};

pub use glam;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
