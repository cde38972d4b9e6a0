//! Object placement game for Playdeck
//!
//! Players point at the floor and drop coloured objects until the object
//! limit is reached. This is the reference game for the plugin lifecycle:
//! it shows an engine built on `EngineCore`, a presentation that only talks
//! to the engine through actions and events, and a descriptor whose factory
//! wires both through `HostServices`.
//!
//! # Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use engine_core::headless::HeadlessServices;
//! use engine_core::GameRegistry;
//!
//! let mut registry = GameRegistry::new();
//! registry
//!     .register_game(games_placement::descriptor(Arc::new(HeadlessServices::default())))
//!     .unwrap();
//! assert!(registry.get_game("placement").unwrap().can_create());
//! ```

use std::sync::Arc;
use std::time::Duration;

use engine_core::{
    factory_fn, share_engine, Difficulty, GameDescriptor, GameParts, HostServices,
    SessionInterface, SharedEngine,
};

pub mod engine;
pub mod presentation;

pub use engine::{
    PlacedObject, PlacementConfig, PlacementEngine, DEFAULT_MAX_OBJECTS, DEFAULT_SEED, GAME_ID,
};
pub use presentation::{PlacementPresentation, DEFAULT_FLOOR_RADIUS};

/// Build a fresh engine and bound interface from the host's services.
pub fn create_parts(services: &dyn HostServices) -> GameParts {
    let engine: SharedEngine = share_engine(PlacementEngine::new());
    let interface = SessionInterface::new(
        Arc::clone(&engine),
        Box::new(PlacementPresentation::default()),
        services.session_resource(),
        services.presenter(),
        services.interface_config(GAME_ID),
    );
    GameParts { engine, interface }
}

/// Catalog entry for the placement game.
pub fn descriptor(services: Arc<dyn HostServices>) -> GameDescriptor {
    GameDescriptor::new(GAME_ID, "Object Placement")
        .with_description("Point at the floor to place objects; squeeze to undo")
        .with_players(1, 1)
        .with_difficulty(Difficulty::Easy)
        .with_duration(Duration::from_secs(5 * 60))
        .with_category("creative")
        .with_factory(factory_fn(move || {
            let services = Arc::clone(&services);
            async move { Ok(Some(create_parts(services.as_ref()))) }
        }))
}
