//! Game catalog for Playdeck
//!
//! This crate provides a single initialization point for registering every
//! known game with a [`GameRegistry`].
//!
//! # Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use engine_core::headless::HeadlessServices;
//! use engine_core::GameRegistry;
//! use engine_games::register_all_games;
//!
//! let mut registry = GameRegistry::new();
//! register_all_games(&mut registry, Arc::new(HeadlessServices::default()));
//! assert!(registry.is_registered("placement"));
//! ```

use std::sync::Arc;
use std::time::Duration;

use engine_core::{Difficulty, GameDescriptor, GameRegistry, HostServices};
use tracing::debug;

/// Register all known games with `registry`.
///
/// Games already present are left untouched, so calling this more than once
/// is harmless.
///
/// Currently registers:
/// - Object Placement (`"placement"`, playable)
/// - Ring Toss (`"ring-toss"`, catalog only)
/// - Block Stack (`"block-stack"`, catalog only)
pub fn register_all_games(registry: &mut GameRegistry, services: Arc<dyn HostServices>) {
    for descriptor in catalog(services) {
        let id = descriptor.id.clone();
        if let Err(e) = registry.register_game(descriptor) {
            debug!(game_id = %id, error = %e, "Skipped game registration");
        }
    }
}

/// Every known descriptor, in menu order.
pub fn catalog(services: Arc<dyn HostServices>) -> Vec<GameDescriptor> {
    vec![
        games_placement::descriptor(services),
        GameDescriptor::new("ring-toss", "Ring Toss")
            .with_description("Throw rings onto pegs at different distances")
            .with_players(1, 2)
            .with_difficulty(Difficulty::Medium)
            .with_duration(Duration::from_secs(10 * 60))
            .with_category("arcade"),
        GameDescriptor::new("block-stack", "Block Stack")
            .with_description("Stack blocks as high as you can before they fall")
            .with_players(1, 1)
            .with_difficulty(Difficulty::Hard)
            .with_duration(Duration::from_secs(15 * 60))
            .with_category("physics"),
    ]
}

// Re-export individual descriptors for advanced use cases
pub use games_placement::descriptor as placement_descriptor;
