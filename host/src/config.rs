//! Configuration for the host
//!
//! Configuration is loaded from config.toml with environment variable overrides.
//! CLI arguments take highest priority, followed by env vars, then config.toml.

use anyhow::{anyhow, Result};
use clap::Parser;
use engine_config::{load_config, CentralConfig};
use engine_core::{ExitAffordance, InterfaceConfig, SessionConfig};
use glam::Vec3;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::level_filters::LevelFilter;

// Load central config once at startup
pub static CENTRAL_CONFIG: Lazy<CentralConfig> = Lazy::new(load_config);

fn default_game() -> String {
    CENTRAL_CONFIG.common.default_game.clone()
}

fn default_log_level() -> String {
    CENTRAL_CONFIG.common.log_level.clone()
}

fn default_max_frames() -> u64 {
    CENTRAL_CONFIG.host.max_frames
}

fn default_frame_rate() -> u32 {
    CENTRAL_CONFIG.host.frame_rate_hz
}

fn default_interaction_every() -> u64 {
    CENTRAL_CONFIG.host.interaction_every
}

#[derive(Parser, Debug, Clone, Serialize, Deserialize)]
#[command(name = "playdeck-host")]
#[command(about = "Playdeck host - runs one game session on a headless device")]
#[command(
    long_about = "Host that registers the game catalog, starts the selected game on a
simulated immersive device and drives it with scripted interactions.

Configuration is loaded from config.toml with environment variable overrides.
CLI arguments take highest priority."
)]
pub struct Config {
    /// Game to select and start (e.g., placement)
    #[arg(long, default_value_t = default_game())]
    pub game: String,

    /// Frames to run before ending the session (0 for unlimited)
    #[arg(long, default_value_t = default_max_frames())]
    pub frames: u64,

    /// Render tick rate
    #[arg(long, default_value_t = default_frame_rate())]
    pub frame_rate_hz: u32,

    /// Issue a scripted interaction every N frames (0 to disable)
    #[arg(long, default_value_t = default_interaction_every())]
    pub interaction_every: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value_t = default_log_level())]
    pub log_level: String,

    /// Make the simulated device refuse the session request
    #[arg(long, default_value_t = false)]
    pub deny_session: bool,
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.game.is_empty() {
            return Err(anyhow!("game cannot be empty"));
        }

        if self.frame_rate_hz == 0 {
            return Err(anyhow!("frame_rate_hz must be greater than 0"));
        }

        if self.log_level.parse::<LevelFilter>().is_err() {
            return Err(anyhow!(
                "invalid log level '{}', expected one of trace, debug, info, warn, error",
                self.log_level
            ));
        }

        Ok(())
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.frame_rate_hz))
    }
}

/// Session and interface settings for `game_id` from the central config.
pub fn interface_config(central: &CentralConfig, game_id: &str) -> InterfaceConfig {
    let interface = &central.interface;
    InterfaceConfig {
        session: SessionConfig {
            required_features: central.session.required_features.clone(),
            optional_features: central.session.optional_features.clone(),
            overlay_target: central.session.overlay_target.clone(),
        },
        local_player: interface.local_player.clone(),
        root_origin: Vec3::from_array(interface.root_origin),
        exit: ExitAffordance {
            offset: Vec3::from_array(interface.exit_offset),
            radius: interface.exit_radius,
        },
        game_config: game_config(central, game_id),
    }
}

fn game_config(central: &CentralConfig, game_id: &str) -> Value {
    match game_id {
        "placement" => json!({
            "players": [central.interface.local_player],
            "maxObjects": central.placement.max_objects,
            "seed": central.placement.seed,
        }),
        _ => Value::Null,
    }
}
