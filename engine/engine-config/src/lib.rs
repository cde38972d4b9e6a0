//! Centralized configuration loading from config.toml.
//!
//! This crate provides configuration structs and loading logic shared
//! across the Playdeck components (game crates, host).
//!
//! # Configuration Priority
//!
//! Settings are loaded with the following priority (highest to lowest):
//! 1. Environment variables (`PLAYDECK_<SECTION>_<KEY>`)
//! 2. config.toml file
//! 3. Built-in defaults
//!
//! # Environment Variable Override Pattern
//!
//! ```text
//! PLAYDECK_<SECTION>_<KEY>=value
//!
//! Examples:
//!     PLAYDECK_COMMON_DEFAULT_GAME=placement
//!     PLAYDECK_COMMON_LOG_LEVEL=debug
//!     PLAYDECK_INTERFACE_EXIT_RADIUS=0.2
//!     PLAYDECK_PLACEMENT_MAX_OBJECTS=20
//!     PLAYDECK_SESSION_REQUIRED_FEATURES=local-floor,hit-test
//! ```

mod defaults;
mod loader;
mod structs;

pub use defaults::*;
pub use loader::{apply_env_overrides, load_config, load_from_path, CONFIG_SEARCH_PATHS};
pub use structs::*;
