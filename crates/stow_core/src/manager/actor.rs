//! Actor attachment: binding a session to at most one entity and an entity
//! to at most one session.
//!
//! The `ActorComponent` marker is the single source of truth. Attaching
//! adds it; any removal of it (explicit detach, forced takeover, entity
//! deletion) goes through the shutdown hook, which clears the session's
//! back-reference and raises `Detached` once the marker is gone.

use super::events::ActorEvent;
use super::EntityManager;
use crate::components::{ActorComponent, EyeComponent};
use crate::ecs::{Entity, EntityStage, ErasedComponent};
use crate::error::AttachError;
use crate::session::{Session, SessionId, UserId};
use stow_metrics::metrics;
use tracing::{debug, error, warn};

/// Result of a successful attach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AttachOutcome {
    /// Session forcibly detached from the target entity, if any.
    pub kicked: Option<SessionId>,
}

/// What `detach_session_outcome` found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionDetach {
    /// The session was not attached to anything.
    NotAttached,
    /// The session pointed at an entity that no longer carries its marker;
    /// the back-reference was cleared without notifications.
    Stale(Entity),
    /// The session was detached from this entity.
    Detached(Entity),
}

impl EntityManager {
    pub fn register_session(&mut self, user_id: UserId, name: impl Into<String>) -> SessionId {
        let session = self.sessions.register(user_id, name);
        debug!(%session, %user_id, "session registered");
        session
    }

    /// Detach a session and forget it.
    pub fn disconnect_session(&mut self, session: SessionId) -> Option<Session> {
        self.detach_session_outcome(session)?;
        let removed = self.sessions.unregister(session);
        debug!(%session, "session disconnected");
        removed
    }

    /// Bind `session` to `entity`, or detach it when `entity` is `None`.
    ///
    /// With `force`, a session already attached to the entity is kicked
    /// first; its `Detached` notification precedes this attach's `Attached`.
    pub fn attach(
        &mut self,
        entity: Option<Entity>,
        session: SessionId,
        force: bool,
    ) -> Result<AttachOutcome, AttachError> {
        let current = self
            .sessions
            .get(session)
            .ok_or(AttachError::UnknownSession { session })?
            .attached_entity();
        if current == entity {
            return Ok(AttachOutcome::default());
        }
        let Some(entity) = entity else {
            self.detach_session(session);
            return Ok(AttachOutcome::default());
        };

        let stage = self
            .world
            .meta(entity)
            .map(|meta| meta.stage)
            .ok_or(AttachError::EntityNotFound { entity })?;
        if stage >= EntityStage::Terminating {
            return Err(AttachError::TerminatingEntity { entity });
        }
        if stage != EntityStage::Started {
            return Err(AttachError::NotStarted { entity });
        }

        let occupant = self
            .world
            .get::<ActorComponent>(entity)
            .map(|actor| actor.session)
            .filter(|&occupant| occupant != session);
        let mut kicked = None;
        if let Some(occupant) = occupant {
            if !force {
                return Err(AttachError::AlreadyOccupied {
                    entity,
                    current: occupant,
                });
            }
            self.take_component::<ActorComponent>(entity);
            if let Some(stale) = self
                .sessions
                .get(occupant)
                .and_then(Session::attached_entity)
            {
                error!(session = %occupant, entity = %stale, "kicked session still attached after marker removal");
                self.sessions.set_attached(occupant, None);
            }
            metrics! { self.counters.increment("kicked", 1); }
            kicked = Some(occupant);
        }

        self.detach_session(session);

        self.insert_component(entity, ActorComponent { session })
            .map_err(|_| AttachError::EntityNotFound { entity })?;
        if !self.world.has::<EyeComponent>(entity) {
            let eye = EyeComponent::from(self.config.eye);
            if let Err(err) = self.add_component(entity, eye) {
                warn!(%entity, %err, "could not add eye to attached entity");
            }
        }
        self.sessions.set_attached(session, Some(entity));
        metrics! { self.counters.increment("attached", 1); }
        debug!(%entity, %session, kicked = ?kicked, "session attached");

        self.raise(ActorEvent::Attached {
            entity,
            session,
            kicked,
        });
        Ok(AttachOutcome { kicked })
    }

    /// Non-forcing attach that reports plain success.
    pub fn try_attach(&mut self, entity: Entity, session: SessionId) -> bool {
        self.attach(Some(entity), session, false).is_ok()
    }

    /// Remove the actor marker from `entity`. Returns the session that was
    /// attached; `None` means nothing was attached, which is not an error.
    pub fn detach_entity(&mut self, entity: Entity) -> Option<SessionId> {
        self.take_component::<ActorComponent>(entity)
            .map(|actor| actor.session)
    }

    /// Detach `session` from whatever it controls.
    ///
    /// Returns true whether or not anything was attached, including when the
    /// attached entity had already lost its marker; false only for an
    /// unknown session. [`detach_session_outcome`](Self::detach_session_outcome)
    /// tells those cases apart.
    pub fn detach_session(&mut self, session: SessionId) -> bool {
        self.detach_session_outcome(session).is_some()
    }

    /// Detach `session`, reporting which case applied. `None` for an
    /// unknown session.
    pub fn detach_session_outcome(&mut self, session: SessionId) -> Option<SessionDetach> {
        let attached = self.sessions.get(session)?.attached_entity();
        let Some(entity) = attached else {
            return Some(SessionDetach::NotAttached);
        };

        let owns_marker = self
            .world
            .get::<ActorComponent>(entity)
            .is_some_and(|actor| actor.session == session);
        if !owns_marker {
            warn!(%session, %entity, "session pointed at an entity without its actor marker");
            self.sessions.set_attached(session, None);
            return Some(SessionDetach::Stale(entity));
        }

        self.take_component::<ActorComponent>(entity);
        Some(SessionDetach::Detached(entity))
    }

    /// Session of `user_id` and the entity it is attached to.
    pub fn try_get_actor_from_user_id(&self, user_id: UserId) -> Option<(&Session, Option<Entity>)> {
        let session = self.sessions.by_user(user_id)?;
        Some((session, session.attached_entity()))
    }

    /// Session attached to `entity`, if any.
    pub fn attached_session(&self, entity: Entity) -> Option<SessionId> {
        self.world
            .get::<ActorComponent>(entity)
            .map(|actor| actor.session)
    }
}

/// Shutdown hook for the actor marker.
pub(super) fn actor_shutdown(manager: &mut EntityManager, entity: Entity, component: &dyn ErasedComponent) {
    let Some(actor) = component.downcast_ref::<ActorComponent>() else {
        return;
    };
    let session = actor.session;
    let points_here = manager
        .sessions
        .get(session)
        .is_some_and(|s| s.attached_entity() == Some(entity));
    if points_here {
        manager.sessions.set_attached(session, None);
    }
    metrics! { manager.counters.increment("detached", 1); }
    debug!(%entity, %session, "session detached");
    manager.raise(ActorEvent::Detached { entity, session });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LifecycleError;
    use crate::manager::testing::{at, manager_with_map, Health};
    use crate::prototype::ComponentOverrides;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    fn record(manager: &mut EntityManager) -> Arc<Mutex<Vec<ActorEvent>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        manager.subscribe(move |_, event| sink.lock().unwrap().push(*event));
        seen
    }

    #[test]
    fn attach_adds_marker_and_eye() {
        let (mut manager, map, _) = manager_with_map();
        let mob = manager.spawn(Some("mob"), at(map, 1.0, 1.0), None).unwrap();
        let session = manager.register_session(UserId(7), "alice");
        let events = record(&mut manager);

        let outcome = manager.attach(Some(mob), session, false).unwrap();
        assert_eq!(outcome.kicked, None);
        assert_eq!(manager.attached_session(mob), Some(session));
        assert!(manager.has::<EyeComponent>(mob));
        assert_eq!(
            manager.sessions().get(session).and_then(Session::attached_entity),
            Some(mob)
        );
        assert_eq!(
            *events.lock().unwrap(),
            vec![ActorEvent::Attached { entity: mob, session, kicked: None }]
        );
        if cfg!(feature = "metrics") {
            assert_eq!(manager.counters().get("attached"), 1);
        }
    }

    #[test]
    fn reattaching_to_the_same_entity_is_silent() {
        let (mut manager, map, _) = manager_with_map();
        let mob = manager.spawn(Some("mob"), at(map, 0.0, 0.0), None).unwrap();
        let session = manager.register_session(UserId(1), "a");
        manager.attach(Some(mob), session, false).unwrap();
        let events = record(&mut manager);

        manager.attach(Some(mob), session, false).unwrap();
        assert!(events.lock().unwrap().is_empty());
    }

    #[test]
    fn moving_a_session_releases_its_previous_entity() {
        let (mut manager, map, _) = manager_with_map();
        let first = manager.spawn(Some("mob"), at(map, 0.0, 0.0), None).unwrap();
        let second = manager.spawn(Some("mob"), at(map, 2.0, 0.0), None).unwrap();
        let session = manager.register_session(UserId(1), "a");
        manager.attach(Some(first), session, false).unwrap();
        let events = record(&mut manager);

        manager.attach(Some(second), session, false).unwrap();
        assert!(!manager.has::<ActorComponent>(first));
        assert_eq!(manager.attached_session(second), Some(session));
        assert_eq!(
            *events.lock().unwrap(),
            vec![
                ActorEvent::Detached { entity: first, session },
                ActorEvent::Attached { entity: second, session, kicked: None },
            ]
        );
    }

    #[test]
    fn occupied_entity_requires_force() {
        let (mut manager, map, _) = manager_with_map();
        let mob = manager.spawn(Some("mob"), at(map, 0.0, 0.0), None).unwrap();
        let s1 = manager.register_session(UserId(1), "one");
        let s2 = manager.register_session(UserId(2), "two");
        manager.attach(Some(mob), s1, false).unwrap();

        assert_eq!(
            manager.attach(Some(mob), s2, false),
            Err(AttachError::AlreadyOccupied { entity: mob, current: s1 })
        );
        assert!(!manager.try_attach(mob, s2));

        let events = record(&mut manager);
        let outcome = manager.attach(Some(mob), s2, true).unwrap();
        assert_eq!(outcome.kicked, Some(s1));
        assert_eq!(manager.attached_session(mob), Some(s2));
        assert_eq!(manager.sessions().get(s1).and_then(Session::attached_entity), None);
        assert_eq!(
            *events.lock().unwrap(),
            vec![
                ActorEvent::Detached { entity: mob, session: s1 },
                ActorEvent::Attached { entity: mob, session: s2, kicked: Some(s1) },
            ]
        );
    }

    #[test]
    fn attach_rejects_unusable_targets() {
        let (mut manager, map, _) = manager_with_map();
        let session = manager.register_session(UserId(1), "a");
        let pending = manager.create_uninitialized(Some("mob"), at(map, 0.0, 0.0), None).unwrap();
        assert_eq!(
            manager.attach(Some(pending), session, false),
            Err(AttachError::NotStarted { entity: pending })
        );

        let gone = manager.spawn(Some("mob"), at(map, 0.0, 0.0), None).unwrap();
        manager.delete(gone);
        assert_eq!(
            manager.attach(Some(gone), session, false),
            Err(AttachError::EntityNotFound { entity: gone })
        );

        let unknown = SessionId(99);
        assert_eq!(
            manager.attach(Some(pending), unknown, false),
            Err(AttachError::UnknownSession { session: unknown })
        );
    }

    #[test]
    fn detach_is_idempotent() {
        let (mut manager, map, _) = manager_with_map();
        let mob = manager.spawn(Some("mob"), at(map, 0.0, 0.0), None).unwrap();
        let session = manager.register_session(UserId(1), "a");
        manager.attach(Some(mob), session, false).unwrap();
        let events = record(&mut manager);

        assert_eq!(manager.detach_entity(mob), Some(session));
        assert_eq!(manager.detach_entity(mob), None);
        assert_eq!(manager.detach_session_outcome(session), Some(SessionDetach::NotAttached));
        assert!(manager.detach_session(session));
        assert!(!manager.detach_session(SessionId(42)));
        assert_eq!(events.lock().unwrap().len(), 1);
    }

    #[test]
    fn deleting_an_actor_detaches_its_session() {
        let (mut manager, map, _) = manager_with_map();
        let mob = manager.spawn(Some("mob"), at(map, 0.0, 0.0), None).unwrap();
        let session = manager.register_session(UserId(3), "c");
        manager.attach(Some(mob), session, false).unwrap();
        let events = record(&mut manager);

        manager.delete(mob);
        assert_eq!(manager.sessions().get(session).and_then(Session::attached_entity), None);
        assert_eq!(
            *events.lock().unwrap(),
            vec![ActorEvent::Detached { entity: mob, session }]
        );
    }

    #[test]
    fn user_lookup_and_disconnect() {
        let (mut manager, map, _) = manager_with_map();
        let mob = manager.spawn(Some("mob"), at(map, 0.0, 0.0), None).unwrap();
        let session = manager.register_session(UserId(5), "eve");
        assert_eq!(manager.register_session(UserId(5), "eve again"), session);
        manager.attach(Some(mob), session, false).unwrap();

        let (found, entity) = manager.try_get_actor_from_user_id(UserId(5)).unwrap();
        assert_eq!(found.id(), session);
        assert_eq!(entity, Some(mob));
        assert!(manager.try_get_actor_from_user_id(UserId(6)).is_none());

        let removed = manager.disconnect_session(session).unwrap();
        assert_eq!(removed.name(), "eve");
        assert!(!manager.has::<ActorComponent>(mob));
        assert!(manager.try_get_actor_from_user_id(UserId(5)).is_none());
        assert!(manager.disconnect_session(session).is_none());
    }

    #[test]
    fn marker_cannot_be_spawned_from_a_template() {
        let (mut manager, map, _) = manager_with_map();
        let session = manager.register_session(UserId(1), "a");
        let alive = manager.world().entities().len();

        assert_eq!(
            manager.spawn(Some("puppet"), at(map, 0.0, 0.0), None),
            Err(LifecycleError::ReservedComponent { name: "Actor".into() })
        );
        let overrides = ComponentOverrides::from([(
            "Actor".to_string(),
            serde_json::json!({ "session": session.0 }),
        )]);
        assert_eq!(
            manager.spawn(Some("mob"), at(map, 0.0, 0.0), Some(&overrides)),
            Err(LifecycleError::ReservedComponent { name: "Actor".into() })
        );
        assert_eq!(manager.world().entities().len(), alive);
    }

    #[test]
    fn marker_only_changes_through_attach_and_detach() {
        let (mut manager, map, _) = manager_with_map();
        let mob = manager.spawn(Some("mob"), at(map, 0.0, 0.0), None).unwrap();
        let s1 = manager.register_session(UserId(1), "a");
        let s2 = manager.register_session(UserId(2), "b");
        let events = record(&mut manager);

        assert_eq!(
            manager.add_component(mob, ActorComponent { session: s1 }),
            Err(LifecycleError::ReservedComponent { name: "Actor".into() })
        );
        assert_eq!(manager.attached_session(mob), None);
        assert!(manager.try_attach(mob, s2));

        assert_eq!(manager.remove_component::<ActorComponent>(mob), None);
        assert!(manager.get_mut::<ActorComponent>(mob).is_none());
        assert_eq!(manager.attached_session(mob), Some(s2));

        assert_eq!(manager.detach_entity(mob), Some(s2));
        assert_eq!(
            *events.lock().unwrap(),
            vec![
                ActorEvent::Attached { entity: mob, session: s2, kicked: None },
                ActorEvent::Detached { entity: mob, session: s2 },
            ]
        );
    }

    static TEARDOWN_ATTACH_TRIED: AtomicBool = AtomicBool::new(false);

    fn attach_during_teardown(manager: &mut EntityManager, entity: Entity, _: &dyn ErasedComponent) {
        let session = manager.sessions().by_user(UserId(1)).map(Session::id);
        if let Some(session) = session {
            assert_eq!(
                manager.attach(Some(entity), session, true),
                Err(AttachError::TerminatingEntity { entity })
            );
            TEARDOWN_ATTACH_TRIED.store(true, Ordering::SeqCst);
        }
    }

    #[test]
    fn terminating_entities_cannot_be_attached() {
        let (mut manager, map, _) = manager_with_map();
        manager.on_shutdown::<Health>(attach_during_teardown);
        let mob = manager.spawn(Some("mob"), at(map, 0.0, 0.0), None).unwrap();
        manager.register_session(UserId(1), "late");

        manager.delete(mob);
        assert!(TEARDOWN_ATTACH_TRIED.load(Ordering::SeqCst));
        assert!(!manager.exists(mob));
    }
}
