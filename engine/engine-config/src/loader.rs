//! Configuration loading logic.
//!
//! Handles loading config from files and applying environment variable overrides.

use crate::CentralConfig;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Standard locations to search for config.toml
pub const CONFIG_SEARCH_PATHS: &[&str] = &[
    "config.toml",      // Current directory
    "../config.toml",   // Parent directory (when running from subdirectory)
    "/app/config.toml", // Docker container
];

/// Load the central configuration from config.toml.
///
/// Searches for config.toml in the following order:
/// 1. Path specified by PLAYDECK_CONFIG environment variable
/// 2. Current directory (config.toml)
/// 3. Parent directory (../config.toml)
/// 4. Docker container path (/app/config.toml)
///
/// After loading, environment variable overrides are applied.
pub fn load_config() -> CentralConfig {
    if let Ok(path) = std::env::var("PLAYDECK_CONFIG") {
        let path = PathBuf::from(&path);
        if path.exists() {
            info!("Loading config from PLAYDECK_CONFIG: {}", path.display());
            return load_from_path(&path);
        }
        warn!(
            "PLAYDECK_CONFIG={} not found, searching defaults",
            path.display()
        );
    }

    for path_str in CONFIG_SEARCH_PATHS {
        let path = PathBuf::from(path_str);
        if path.exists() {
            info!("Loading config from {}", path.display());
            return load_from_path(&path);
        }
    }

    debug!("No config.toml found, using built-in defaults");
    apply_env_overrides(CentralConfig::default())
}

/// Load configuration from a specific path.
pub fn load_from_path(path: &PathBuf) -> CentralConfig {
    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => apply_env_overrides(config),
            Err(e) => {
                warn!("Failed to parse {}: {}, using defaults", path.display(), e);
                apply_env_overrides(CentralConfig::default())
            }
        },
        Err(e) => {
            warn!("Failed to read {}: {}, using defaults", path.display(), e);
            apply_env_overrides(CentralConfig::default())
        }
    }
}

/// Macro to reduce env override boilerplate
macro_rules! env_override {
    // String field
    ($config:expr, $section:ident . $field:ident, $key:expr) => {
        if let Ok(v) = std::env::var($key) {
            $config.$section.$field = v;
        }
    };
    // Parseable field (u32, u64, f32, etc.)
    ($config:expr, $section:ident . $field:ident, $key:expr, parse) => {
        if let Ok(v) =
            std::env::var($key).and_then(|s| s.parse().map_err(|_| std::env::VarError::NotPresent))
        {
            $config.$section.$field = v;
        }
    };
    // Optional string field
    ($config:expr, $section:ident . $field:ident, $key:expr, optional) => {
        if let Ok(v) = std::env::var($key) {
            $config.$section.$field = Some(v);
        }
    };
    // Comma separated list
    ($config:expr, $section:ident . $field:ident, $key:expr, list) => {
        if let Ok(v) = std::env::var($key) {
            $config.$section.$field = parse_list(&v);
        }
    };
    // Three comma separated floats
    ($config:expr, $section:ident . $field:ident, $key:expr, vec3) => {
        if let Some(v) = std::env::var($key).ok().and_then(|s| parse_vec3(&s)) {
            $config.$section.$field = v;
        }
    };
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn parse_vec3(raw: &str) -> Option<[f32; 3]> {
    let parts: Vec<f32> = raw
        .split(',')
        .map(|s| s.trim().parse::<f32>())
        .collect::<Result<_, _>>()
        .ok()?;
    match parts.as_slice() {
        [x, y, z] => Some([*x, *y, *z]),
        _ => None,
    }
}

/// Apply environment variable overrides to a configuration.
///
/// Environment variables follow the pattern: PLAYDECK_<SECTION>_<KEY>
pub fn apply_env_overrides(mut config: CentralConfig) -> CentralConfig {
    // Common
    env_override!(config, common.log_level, "PLAYDECK_COMMON_LOG_LEVEL");
    env_override!(config, common.default_game, "PLAYDECK_COMMON_DEFAULT_GAME");

    // Session
    env_override!(
        config,
        session.required_features,
        "PLAYDECK_SESSION_REQUIRED_FEATURES",
        list
    );
    env_override!(
        config,
        session.optional_features,
        "PLAYDECK_SESSION_OPTIONAL_FEATURES",
        list
    );
    env_override!(
        config,
        session.overlay_target,
        "PLAYDECK_SESSION_OVERLAY_TARGET",
        optional
    );

    // Interface
    env_override!(config, interface.local_player, "PLAYDECK_INTERFACE_LOCAL_PLAYER");
    env_override!(
        config,
        interface.root_origin,
        "PLAYDECK_INTERFACE_ROOT_ORIGIN",
        vec3
    );
    env_override!(
        config,
        interface.exit_offset,
        "PLAYDECK_INTERFACE_EXIT_OFFSET",
        vec3
    );
    env_override!(
        config,
        interface.exit_radius,
        "PLAYDECK_INTERFACE_EXIT_RADIUS",
        parse
    );

    // Placement
    env_override!(
        config,
        placement.max_objects,
        "PLAYDECK_PLACEMENT_MAX_OBJECTS",
        parse
    );
    env_override!(config, placement.seed, "PLAYDECK_PLACEMENT_SEED", parse);

    // Host
    env_override!(
        config,
        host.frame_rate_hz,
        "PLAYDECK_HOST_FRAME_RATE_HZ",
        parse
    );
    env_override!(config, host.max_frames, "PLAYDECK_HOST_MAX_FRAMES", parse);
    env_override!(
        config,
        host.interaction_every,
        "PLAYDECK_HOST_INTERACTION_EVERY",
        parse
    );

    config
}
