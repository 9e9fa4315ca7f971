//! Stow Runtime
//!
//! Minimal binary that loads settings, builds an entity manager and walks
//! through spawning, container placement and actor attachment.
//!
//! Usage: `stow [settings.json]`

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use stow_core::glam::Vec2;
use stow_core::{ActorEvent, EntityManager, MapCoordinates, PrototypeSet, UserId};
use tracing::{info, warn, Level};

const PROTOTYPES: &str = r#"[
    { "id": "player", "containers": { "hands": { "capacity": 1 }, "backpack": { "capacity": 8 } } },
    { "id": "crate", "containers": { "contents": { "capacity": 2 } } },
    { "id": "pouch", "containers": { "coins": { "whitelist": ["coin"] } } },
    { "id": "coin" },
    { "id": "rock" }
]"#;

fn main() -> Result<()> {
    let path = std::env::args().nth(1).map(PathBuf::from);
    let settings = stow_services::load_settings(path.as_deref()).with_context(|| match &path {
        Some(path) => format!("loading settings from {}", path.display()),
        None => "loading default settings".to_string(),
    })?;

    let level: Level = settings
        .logging
        .level
        .parse()
        .with_context(|| format!("invalid log level '{}'", settings.logging.level))?;
    tracing_subscriber::fmt().with_max_level(level).init();

    info!("Stow v{}", stow_core::VERSION);
    stow_services::init_services(&settings);

    let prototypes = PrototypeSet::from_json_str(PROTOTYPES).context("parsing built-in prototypes")?;
    let mut manager = EntityManager::new(Arc::new(prototypes), settings.core);
    manager.subscribe(|manager, event| match *event {
        ActorEvent::Attached { entity, session, kicked } => {
            info!(%entity, %session, ?kicked, stage = ?manager.stage(entity), "actor attached")
        }
        ActorEvent::Detached { entity, session } => info!(%entity, %session, "actor detached"),
    });

    let (map, _) = manager.create_map();
    let at = |x: f32, y: f32| MapCoordinates::new(map, Vec2::new(x, y));

    // Containers
    let player = manager.spawn(Some("player"), at(0.0, 0.0), None)?;
    let crate_ = manager.spawn(Some("crate"), at(4.0, 0.0), None)?;
    let held = manager.try_spawn_in_container(Some("rock"), player, "hands", None)?;
    if let Err(err) = manager.try_spawn_next_to(Some("rock"), held, None) {
        info!(%err, "hands are full");
    }
    for _ in 0..3 {
        let rock = manager.spawn_in_container_or_drop(Some("rock"), crate_, "contents", None)?;
        match manager.container_of(rock) {
            Some(container) => info!(%rock, container = container.name(), "stored"),
            None => info!(%rock, position = ?manager.world().spatial().world_position(rock), "dropped"),
        }
    }
    let pouch = manager.try_spawn_in_container(Some("pouch"), player, "backpack", None)?;
    let coins = manager.spawn_many(["coin", "coin", "coin"], at(1.0, 1.0))?;
    for coin in &coins {
        manager.insert_into_container(pouch, "coins", *coin)?;
    }
    if let Err(err) = manager.try_spawn_in_container(Some("rock"), pouch, "coins", None) {
        info!(%err, "pouch refused");
    }

    // Actors
    let alice = manager.register_session(UserId(1), "alice");
    let bob = manager.register_session(UserId(2), "bob");
    manager.attach(Some(player), alice, false)?;
    if let Err(err) = manager.attach(Some(player), bob, false) {
        info!(%err, "bob must force");
    }
    let outcome = manager.attach(Some(player), bob, true)?;
    info!(kicked = ?outcome.kicked, "bob took over");
    manager.disconnect_session(bob);

    manager.delete(crate_);
    manager.delete(player);

    let mismatched = manager.verify_container_flags();
    if !mismatched.is_empty() {
        warn!(?mismatched, "container flags out of sync");
    }

    info!(entities = manager.world().entities().len(), "demo finished");
    for (name, value) in manager.counters().snapshot() {
        info!(counter = name, value, "metrics");
    }
    Ok(())
}
