//! Player sessions as seen by the actor attachment coordinator.
//!
//! Connection handling lives elsewhere; this table only records which
//! sessions exist and the entity each one is attached to.

use crate::ecs::Entity;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Handle of a registered session.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(pub u32);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

/// External, stable identifier of the user behind a session.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "user:{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    id: SessionId,
    user_id: UserId,
    name: String,
    attached: Option<Entity>,
}

impl Session {
    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Entity this session currently controls.
    pub fn attached_entity(&self) -> Option<Entity> {
        self.attached
    }
}

#[derive(Debug, Default)]
pub struct SessionTable {
    next_id: u32,
    sessions: HashMap<SessionId, Session>,
    by_user: HashMap<UserId, SessionId>,
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session for `user_id`. A user has at most one session;
    /// registering again returns the existing one.
    pub fn register(&mut self, user_id: UserId, name: impl Into<String>) -> SessionId {
        if let Some(&existing) = self.by_user.get(&user_id) {
            return existing;
        }
        self.next_id += 1;
        let id = SessionId(self.next_id);
        self.sessions.insert(
            id,
            Session {
                id,
                user_id,
                name: name.into(),
                attached: None,
            },
        );
        self.by_user.insert(user_id, id);
        id
    }

    /// Forget a session. Callers detach it first.
    pub fn unregister(&mut self, id: SessionId) -> Option<Session> {
        let session = self.sessions.remove(&id)?;
        self.by_user.remove(&session.user_id);
        Some(session)
    }

    pub fn get(&self, id: SessionId) -> Option<&Session> {
        self.sessions.get(&id)
    }

    pub fn by_user(&self, user_id: UserId) -> Option<&Session> {
        self.by_user.get(&user_id).and_then(|id| self.sessions.get(id))
    }

    pub(crate) fn set_attached(&mut self, id: SessionId, entity: Option<Entity>) {
        if let Some(session) = self.sessions.get_mut(&id) {
            session.attached = entity;
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
