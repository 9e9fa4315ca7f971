//! Synchronous actor notifications.
//!
//! Listeners run in subscription order, on the caller's thread, inside the
//! operation that raised the event. They receive a shared reference to the
//! manager, so they observe fully-updated state but cannot mutate it.

use crate::ecs::Entity;
use crate::manager::EntityManager;
use crate::session::SessionId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorEvent {
    Attached {
        entity: Entity,
        session: SessionId,
        kicked: Option<SessionId>,
    },
    Detached {
        entity: Entity,
        session: SessionId,
    },
}

impl ActorEvent {
    pub fn entity(&self) -> Entity {
        match *self {
            ActorEvent::Attached { entity, .. } | ActorEvent::Detached { entity, .. } => entity,
        }
    }

    pub fn session(&self) -> SessionId {
        match *self {
            ActorEvent::Attached { session, .. } | ActorEvent::Detached { session, .. } => session,
        }
    }
}

/// Handle returned by `subscribe`, used to unsubscribe.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

pub(crate) type Listener = Box<dyn FnMut(&EntityManager, &ActorEvent) + Send>;

#[derive(Default)]
pub(crate) struct EventBus {
    next_id: u64,
    listeners: Vec<(ListenerId, Listener)>,
}

impl EventBus {
    pub fn subscribe(&mut self, listener: Listener) -> ListenerId {
        self.next_id += 1;
        let id = ListenerId(self.next_id);
        self.listeners.push((id, listener));
        id
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(existing, _)| *existing != id);
        self.listeners.len() != before
    }

    pub fn take(&mut self) -> Vec<(ListenerId, Listener)> {
        std::mem::take(&mut self.listeners)
    }

    pub fn restore(&mut self, listeners: Vec<(ListenerId, Listener)>) {
        self.listeners = listeners;
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsubscribe_removes_only_that_listener() {
        let mut bus = EventBus::default();
        let first = bus.subscribe(Box::new(|_, _| {}));
        let second = bus.subscribe(Box::new(|_, _| {}));
        assert_ne!(first, second);

        assert!(bus.unsubscribe(first));
        assert!(!bus.unsubscribe(first));
        assert_eq!(bus.len(), 1);

        let taken = bus.take();
        assert_eq!(bus.len(), 0);
        bus.restore(taken);
        assert_eq!(bus.len(), 1);
    }
}
