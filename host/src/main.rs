//! Playdeck host - runs one game session against a simulated device
//!
//! A short-lived process that:
//! 1. Registers the game catalog with a fresh `GameRegistry`
//! 2. Selects the configured game, creates it and starts its session
//! 3. Ticks the session at the configured frame rate, issuing scripted input
//! 4. Ends and cleans up the game on frame budget, device end or ctrl+c

use anyhow::Result;
use clap::Parser;
use engine_core::headless::{HeadlessDevice, HeadlessPresenter, HeadlessServices};
use engine_core::{GameRegistry, InterfaceConfig};
use serde_json::Value;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::Notify;
use tracing::{error, info};

mod config;
mod runner;

use crate::config::{interface_config, Config, CENTRAL_CONFIG};
use crate::runner::Host;

fn init_tracing(level: &str) -> Result<()> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    Ok(())
}

fn build_services(config: &Config) -> HeadlessServices {
    let device = HeadlessDevice::default();
    if config.deny_session {
        device.deny("denied by --deny-session");
    }
    let selected = interface_config(&CENTRAL_CONFIG, &config.game);
    let game_config = selected.game_config.clone();
    let base = InterfaceConfig {
        game_config: Value::Null,
        ..selected
    };
    HeadlessServices::new(device, HeadlessPresenter::new(), base)
        .with_game_config(config.game.clone(), game_config)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Parse configuration
    let config = Config::parse();
    config.validate()?;

    init_tracing(&config.log_level)?;
    info!(log_level = %config.log_level, "Tracing initialized");
    info!(
        game = %config.game,
        frames = config.frames,
        frame_rate_hz = config.frame_rate_hz,
        "Starting host"
    );

    let services = build_services(&config);
    let mut registry = GameRegistry::new();
    engine_games::register_all_games(&mut registry, Arc::new(services));
    for game in registry.list_games() {
        info!(game_id = %game.id, playable = game.can_create(), "Catalog entry");
    }

    // Setup graceful shutdown
    let shutdown = Arc::new(Notify::new());
    let shutdown_signal = Arc::clone(&shutdown);
    let shutdown_handle = tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutdown signal received, ending session...");
                shutdown_signal.notify_one();
            }
            Err(e) => error!("Failed to listen for ctrl+c: {}", e),
        }
    });

    let mut host = Host::new(config, registry);
    let run_result = host.run(shutdown).await;

    shutdown_handle.abort();

    match run_result {
        Ok(summary) => {
            info!(
                frames = summary.frames,
                accepted = summary.accepted,
                ended_early = summary.ended_early,
                "Host completed successfully"
            );
            Ok(())
        }
        Err(e) => {
            error!("Host failed: {}", e);
            Err(e)
        }
    }
}
