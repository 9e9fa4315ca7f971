//! End-to-end scenarios across spawning, containers and actor attachment.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use stow_core::ecs::Component;
use stow_core::glam::Vec2;
use stow_core::{
    define_component, ActorComponent, ActorEvent, CoreConfig, EntityCoordinates, EntityManager,
    EyeComponent, InsertionRejected, LifecycleError, MapCoordinates, MapId, PrototypeSet,
    SpawnError, UserId,
};

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
struct Item {
    weight: u32,
}
define_component!(Item, 950, "Item");

const PROTOTYPES: &str = r#"[
    { "id": "player", "containers": { "hands": { "capacity": 1 }, "backpack": {} } },
    { "id": "apple", "components": { "Item": { "weight": 1 } } },
    { "id": "anvil", "components": { "Item": { "weight": 90 } } },
    { "id": "locker", "containers": { "shelf": { "capacity": 1, "whitelist": ["apple"] } } }
]"#;

fn setup(config: CoreConfig) -> (EntityManager, MapId) {
    Item::ensure_registered();
    let prototypes = PrototypeSet::from_json_str(PROTOTYPES).unwrap();
    let mut manager = EntityManager::new(Arc::new(prototypes), config);
    let (map, _) = manager.create_map();
    (manager, map)
}

fn at(map: MapId, x: f32, y: f32) -> MapCoordinates {
    MapCoordinates::new(map, Vec2::new(x, y))
}

#[test]
fn failed_try_insertion_leaves_nothing_behind() {
    let (mut manager, map) = setup(CoreConfig::default());
    let player = manager.spawn(Some("player"), at(map, 0.0, 0.0), None).unwrap();
    let held = manager
        .try_spawn_in_container(Some("apple"), player, "hands", None)
        .unwrap();
    let alive = manager.world().entities().len();

    let result = manager.try_spawn_next_to(Some("anvil"), held, None);
    assert_eq!(result, Err(SpawnError::InsertionRejected(InsertionRejected::Full)));
    assert_eq!(manager.world().entities().len(), alive);
    assert_eq!(manager.container(player, "hands").unwrap().members(), &[held]);
    assert!(manager.verify_container_flags().is_empty());
}

#[test]
fn spawn_in_missing_container_is_reported_or_dropped() {
    let (mut manager, map) = setup(CoreConfig {
        drop_offset: Vec2::new(1.0, 0.0),
        verify_container_flags: true,
        ..CoreConfig::default()
    });
    let player = manager.spawn(Some("player"), at(map, 10.0, 5.0), None).unwrap();
    let alive = manager.world().entities().len();

    assert!(matches!(
        manager.try_spawn_in_container(Some("apple"), player, "saddlebag", None),
        Err(SpawnError::ContainerNotFound { .. })
    ));
    assert_eq!(manager.world().entities().len(), alive);

    let apple = manager
        .spawn_in_container_or_drop(Some("apple"), player, "saddlebag", None)
        .unwrap();
    let spatial = manager.world().spatial();
    assert_eq!(spatial.parent(apple), spatial.parent(player));
    assert_eq!(spatial.world_position(apple), Some(Vec2::new(11.0, 5.0)));
    assert!(manager.container_of(apple).is_none());
}

#[test]
fn whitelisted_container_drops_what_it_refuses() {
    let (mut manager, map) = setup(CoreConfig::default());
    let locker = manager.spawn(Some("locker"), at(map, 2.0, 2.0), None).unwrap();

    let anvil = manager
        .spawn_in_container_or_drop(Some("anvil"), locker, "shelf", None)
        .unwrap();
    assert!(manager.container_of(anvil).is_none());
    assert_eq!(manager.world().map_of(anvil), Some(map));

    let apple = manager
        .spawn_in_container_or_drop(Some("apple"), locker, "shelf", None)
        .unwrap();
    assert_eq!(manager.container_of(apple).map(|c| c.owner()), Some(locker));
}

#[test]
fn forced_takeover_notifies_in_order_with_settled_state() {
    let (mut manager, _) = setup(CoreConfig::default());
    let player = manager.spawn(Some("player"), MapCoordinates::NULLSPACE, None).unwrap();
    assert_eq!(manager.world().spatial().parent(player), None);
    let s1 = manager.register_session(UserId(1), "first");
    let s2 = manager.register_session(UserId(2), "second");
    manager.attach(Some(player), s1, false).unwrap();
    assert!(manager.attach(Some(player), s2, false).is_err());
    assert_eq!(manager.attached_session(player), Some(s1));

    // Each entry: the event and who the entity's marker names at that moment.
    let log = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&log);
    manager.subscribe(move |manager, event| {
        let marker = manager.get::<ActorComponent>(event.entity()).map(|a| a.session);
        sink.lock().unwrap().push((*event, marker));
    });

    let outcome = manager.attach(Some(player), s2, true).unwrap();
    assert_eq!(outcome.kicked, Some(s1));
    assert_eq!(
        *log.lock().unwrap(),
        vec![
            (ActorEvent::Detached { entity: player, session: s1 }, None),
            (
                ActorEvent::Attached { entity: player, session: s2, kicked: Some(s1) },
                Some(s2)
            ),
        ]
    );
    assert!(manager.has::<EyeComponent>(player));
    assert_eq!(manager.attached_session(player), Some(s2));
}

#[test]
fn one_session_per_entity_one_entity_per_session() {
    let (mut manager, map) = setup(CoreConfig::default());
    let a = manager.spawn(Some("player"), at(map, 0.0, 0.0), None).unwrap();
    let b = manager.spawn(Some("player"), at(map, 5.0, 0.0), None).unwrap();
    let s1 = manager.register_session(UserId(1), "first");
    let s2 = manager.register_session(UserId(2), "second");

    manager.attach(Some(a), s1, false).unwrap();
    manager.attach(Some(b), s2, false).unwrap();
    assert!(manager.attach(Some(a), s2, false).is_err());
    manager.attach(Some(b), s1, true).unwrap();

    assert_eq!(manager.attached_session(a), None);
    assert_eq!(manager.attached_session(b), Some(s1));
    assert_eq!(manager.sessions().get(s2).unwrap().attached_entity(), None);
    assert_eq!(manager.sessions().get(s1).unwrap().attached_entity(), Some(b));
}

#[test]
fn detaching_twice_raises_a_single_event() {
    let (mut manager, map) = setup(CoreConfig::default());
    let player = manager.spawn(Some("player"), at(map, 0.0, 0.0), None).unwrap();
    let session = manager.register_session(UserId(9), "solo");
    manager.attach(Some(player), session, false).unwrap();

    let count = Arc::new(Mutex::new(0));
    let sink = Arc::clone(&count);
    manager.subscribe(move |_, _| *sink.lock().unwrap() += 1);

    assert!(manager.detach_session(session));
    assert!(manager.detach_session(session));
    assert_eq!(manager.detach_entity(player), None);
    manager.attach(None, session, false).unwrap();
    assert_eq!(*count.lock().unwrap(), 1);
}

#[test]
fn deleting_a_player_takes_its_inventory_and_frees_the_session() {
    let (mut manager, map) = setup(CoreConfig::default());
    let player = manager.spawn(Some("player"), at(map, 0.0, 0.0), None).unwrap();
    let apple = manager
        .try_spawn_in_container(Some("apple"), player, "backpack", None)
        .unwrap();
    let session = manager.register_session(UserId(4), "doomed");
    manager.attach(Some(player), session, false).unwrap();

    manager.delete(player);
    manager.delete(player);

    assert!(!manager.exists(player));
    assert!(!manager.exists(apple));
    assert_eq!(manager.sessions().get(session).unwrap().attached_entity(), None);
    assert!(manager.attach(Some(player), session, false).is_err());
    assert!(manager.verify_container_flags().is_empty());
}

#[test]
fn batch_spawn_stops_at_the_first_failure() {
    let (mut manager, map) = setup(CoreConfig::default());
    let anchor = manager.spawn(Some("player"), at(map, 0.0, 0.0), None).unwrap();

    let err = manager
        .spawn_many_attached_to(
            ["apple", "apple", "unicorn"],
            EntityCoordinates::new(anchor, Vec2::Y),
        )
        .unwrap_err();
    assert_eq!(err.index, 2);
    assert_eq!(err.source, LifecycleError::UnknownPrototype { id: "unicorn".into() });
    for entity in &err.spawned {
        assert_eq!(manager.world().spatial().parent(*entity), Some(anchor));
    }
}

#[test]
fn placement_is_checked_before_allocation() {
    let (mut manager, map) = setup(CoreConfig::default());
    let anchor = manager.spawn(Some("apple"), at(map, 0.0, 0.0), None).unwrap();
    manager.delete(anchor);
    let alive = manager.world().entities().len();

    assert_eq!(
        manager.spawn_attached_to(Some("apple"), EntityCoordinates::at(anchor), None),
        Err(LifecycleError::InvalidPlacement { anchor })
    );
    assert_eq!(manager.world().entities().len(), alive);
}
