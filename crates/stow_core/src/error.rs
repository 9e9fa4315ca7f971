use crate::ecs::{Entity, MapId};
use crate::session::SessionId;
use thiserror::Error;

/// Errors raised while creating, starting or placing entities.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LifecycleError {
    #[error("prototype '{id}' is not registered")]
    UnknownPrototype { id: String },

    #[error("component '{name}' is not registered")]
    UnknownComponent { name: String },

    #[error("component '{name}' is managed by the core and cannot be set directly")]
    ReservedComponent { name: String },

    #[error("component '{name}' could not be built: {reason}")]
    InvalidComponentData { name: String, reason: String },

    #[error("coordinates anchored on {anchor} are not attached to a map")]
    InvalidPlacement { anchor: Entity },

    #[error("{map} does not exist")]
    MapNotFound { map: MapId },

    #[error("entity {entity} does not exist")]
    EntityNotFound { entity: Entity },

    #[error("entity {entity} cannot be started from stage {stage}")]
    InvalidStage { entity: Entity, stage: String },
}

/// A batch spawn stopped part-way. Entities spawned before the failure are
/// left in the world.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("batch spawn failed at index {index}: {source}")]
pub struct BatchSpawnError {
    pub spawned: Vec<Entity>,
    pub index: usize,
    pub source: LifecycleError,
}

/// Reasons a container refuses a member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InsertionRejected {
    #[error("entity is already inside a container")]
    AlreadyContained,
    #[error("container is full")]
    Full,
    #[error("container does not accept this prototype")]
    Filtered,
    #[error("an entity cannot be inserted into its own container")]
    SelfInsertion,
    #[error("insertion would place an entity inside its own descendant")]
    WouldCycle,
    #[error("entity to insert does not exist or is terminating")]
    EntityMissing,
    #[error("container does not exist")]
    ContainerMissing,
}

/// Failures of the container-aware `try_spawn_*` family. No entity survives
/// any of these.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SpawnError {
    #[error("target {target} has no spatial parent")]
    NoSpatialParent { target: Entity },

    #[error("{owner} has no container named '{name}'")]
    ContainerNotFound { owner: Entity, name: String },

    #[error("{target} is flagged as contained but no container of {owner} holds it")]
    MembershipInconsistent { target: Entity, owner: Entity },

    #[error("container rejected the spawned entity: {0}")]
    InsertionRejected(#[from] InsertionRejected),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}

/// Reasons an actor attach is refused. No state changes on any of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AttachError {
    #[error("session {session} is not registered")]
    UnknownSession { session: SessionId },

    #[error("entity {entity} does not exist")]
    EntityNotFound { entity: Entity },

    #[error("entity {entity} is terminating")]
    TerminatingEntity { entity: Entity },

    #[error("entity {entity} has not been started")]
    NotStarted { entity: Entity },

    #[error("entity {entity} is already occupied by session {current}")]
    AlreadyOccupied { entity: Entity, current: SessionId },
}

/// Errors while loading prototype documents.
#[derive(Debug, Error)]
pub enum PrototypeError {
    #[error("failed to parse prototype document: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("prototype '{id}' is defined twice")]
    Duplicate { id: String },
}
