//! Default configuration values loaded from config.defaults.toml.
//!
//! The defaults file lives at the workspace root and is embedded at compile
//! time, so every binary ships with the same baseline.

use once_cell::sync::Lazy;
use serde::Deserialize;

/// The embedded defaults TOML file (loaded at compile time)
const DEFAULTS_TOML: &str = include_str!("../../../config.defaults.toml");

/// Parsed defaults structure (parsed once at first use)
static DEFAULTS: Lazy<DefaultsConfig> = Lazy::new(|| {
    toml::from_str(DEFAULTS_TOML).expect("config.defaults.toml should be valid TOML")
});

// ============================================================================
// Internal structs for parsing config.defaults.toml
// ============================================================================

#[derive(Debug, Deserialize)]
struct DefaultsConfig {
    common: CommonDefaults,
    session: SessionDefaults,
    interface: InterfaceDefaults,
    placement: PlacementDefaults,
    host: HostDefaults,
}

#[derive(Debug, Deserialize)]
struct CommonDefaults {
    log_level: String,
    default_game: String,
}

#[derive(Debug, Deserialize)]
struct SessionDefaults {
    required_features: Vec<String>,
    optional_features: Vec<String>,
    overlay_target: String,
}

#[derive(Debug, Deserialize)]
struct InterfaceDefaults {
    local_player: String,
    root_origin: [f32; 3],
    exit_offset: [f32; 3],
    exit_radius: f32,
}

#[derive(Debug, Deserialize)]
struct PlacementDefaults {
    max_objects: usize,
    seed: u64,
}

#[derive(Debug, Deserialize)]
struct HostDefaults {
    frame_rate_hz: u32,
    max_frames: u64,
    interaction_every: u64,
}

// ============================================================================
// Public accessor functions
// ============================================================================

// Common
pub fn log_level() -> &'static str {
    &DEFAULTS.common.log_level
}
pub fn default_game() -> &'static str {
    &DEFAULTS.common.default_game
}

// Session
pub fn required_features() -> &'static [String] {
    &DEFAULTS.session.required_features
}
pub fn optional_features() -> &'static [String] {
    &DEFAULTS.session.optional_features
}
pub fn overlay_target() -> &'static str {
    &DEFAULTS.session.overlay_target
}

// Interface
pub fn local_player() -> &'static str {
    &DEFAULTS.interface.local_player
}
pub fn root_origin() -> [f32; 3] {
    DEFAULTS.interface.root_origin
}
pub fn exit_offset() -> [f32; 3] {
    DEFAULTS.interface.exit_offset
}
pub fn exit_radius() -> f32 {
    DEFAULTS.interface.exit_radius
}

// Placement
pub fn max_objects() -> usize {
    DEFAULTS.placement.max_objects
}
pub fn placement_seed() -> u64 {
    DEFAULTS.placement.seed
}

// Host
pub fn frame_rate_hz() -> u32 {
    DEFAULTS.host.frame_rate_hz
}
pub fn max_frames() -> u64 {
    DEFAULTS.host.max_frames
}
pub fn interaction_every() -> u64 {
    DEFAULTS.host.interaction_every
}
