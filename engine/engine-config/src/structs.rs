//! Configuration struct definitions.
//!
//! All config structs with serde deserialization support and default values.

use crate::defaults;
use serde::Deserialize;

// ============================================================================
// Serde default functions (required for #[serde(default = "...")])
// These call the accessor functions from defaults module
// ============================================================================

fn d_log_level() -> String {
    defaults::log_level().into()
}
fn d_default_game() -> String {
    defaults::default_game().into()
}
fn d_required_features() -> Vec<String> {
    defaults::required_features().to_vec()
}
fn d_optional_features() -> Vec<String> {
    defaults::optional_features().to_vec()
}
fn d_overlay_target() -> Option<String> {
    Some(defaults::overlay_target().into())
}
fn d_local_player() -> String {
    defaults::local_player().into()
}
fn d_root_origin() -> [f32; 3] {
    defaults::root_origin()
}
fn d_exit_offset() -> [f32; 3] {
    defaults::exit_offset()
}
fn d_exit_radius() -> f32 {
    defaults::exit_radius()
}
fn d_max_objects() -> usize {
    defaults::max_objects()
}
fn d_seed() -> u64 {
    defaults::placement_seed()
}
fn d_frame_rate() -> u32 {
    defaults::frame_rate_hz()
}
fn d_max_frames() -> u64 {
    defaults::max_frames()
}
fn d_interaction_every() -> u64 {
    defaults::interaction_every()
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Root configuration structure matching config.toml
#[derive(Debug, Deserialize, Default, Clone)]
pub struct CentralConfig {
    #[serde(default)]
    pub common: CommonConfig,
    #[serde(default)]
    pub session: SessionSettings,
    #[serde(default)]
    pub interface: InterfaceSettings,
    #[serde(default)]
    pub placement: PlacementSettings,
    #[serde(default)]
    pub host: HostSettings,
}

/// Common configuration shared by all components
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CommonConfig {
    #[serde(default = "d_log_level")]
    pub log_level: String,
    /// Game selected at startup when the host is not told otherwise
    #[serde(default = "d_default_game")]
    pub default_game: String,
}

impl Default for CommonConfig {
    fn default() -> Self {
        Self {
            log_level: defaults::log_level().into(),
            default_game: defaults::default_game().into(),
        }
    }
}

/// Capabilities requested from the immersive session device
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SessionSettings {
    /// Acquisition fails when any of these is unavailable
    #[serde(default = "d_required_features")]
    pub required_features: Vec<String>,
    /// Requested when available, silently dropped otherwise
    #[serde(default = "d_optional_features")]
    pub optional_features: Vec<String>,
    #[serde(default = "d_overlay_target")]
    pub overlay_target: Option<String>,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            required_features: d_required_features(),
            optional_features: d_optional_features(),
            overlay_target: d_overlay_target(),
        }
    }
}

/// Presentation-side settings shared by every session interface
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct InterfaceSettings {
    /// Player id the interface acts as when forwarding interactions
    #[serde(default = "d_local_player")]
    pub local_player: String,
    /// World position of the presentation root
    #[serde(default = "d_root_origin")]
    pub root_origin: [f32; 3],
    /// Exit button position relative to the presentation root
    #[serde(default = "d_exit_offset")]
    pub exit_offset: [f32; 3],
    #[serde(default = "d_exit_radius")]
    pub exit_radius: f32,
}

impl Default for InterfaceSettings {
    fn default() -> Self {
        Self {
            local_player: defaults::local_player().into(),
            root_origin: defaults::root_origin(),
            exit_offset: defaults::exit_offset(),
            exit_radius: defaults::exit_radius(),
        }
    }
}

/// Settings for the object placement game
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PlacementSettings {
    #[serde(default = "d_max_objects")]
    pub max_objects: usize,
    #[serde(default = "d_seed")]
    pub seed: u64,
}

impl Default for PlacementSettings {
    fn default() -> Self {
        Self {
            max_objects: defaults::max_objects(),
            seed: defaults::placement_seed(),
        }
    }
}

/// Headless host loop settings
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HostSettings {
    #[serde(default = "d_frame_rate")]
    pub frame_rate_hz: u32,
    /// Frames to run before ending the session (0 = until interrupted)
    #[serde(default = "d_max_frames")]
    pub max_frames: u64,
    /// Scripted select interaction period in frames (0 = never)
    #[serde(default = "d_interaction_every")]
    pub interaction_every: u64,
}

impl Default for HostSettings {
    fn default() -> Self {
        Self {
            frame_rate_hz: defaults::frame_rate_hz(),
            max_frames: defaults::max_frames(),
            interaction_every: defaults::interaction_every(),
        }
    }
}
