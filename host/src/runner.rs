//! The host loop: start the selected game, tick it, script a player, tear down.

use std::f32::consts::TAU;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use engine_core::{
    FrameContext, GameRegistry, Interaction, LifecycleEvent, LifecycleKind, Ray, SessionState,
    SubscriptionToken,
};
use glam::Vec3;
use tokio::sync::Notify;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::Config;

/// Eye height of the scripted player above the presentation root
const EYE_HEIGHT: f32 = 1.6;

/// What one run did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub frames: u64,
    pub interactions: u64,
    pub accepted: u64,
    /// True when something other than the frame budget ended the session
    pub ended_early: bool,
}

pub struct Host {
    config: Config,
    registry: GameRegistry,
    lifecycle_log: Option<SubscriptionToken>,
}

impl Host {
    pub fn new(config: Config, registry: GameRegistry) -> Self {
        Self {
            config,
            registry,
            lifecycle_log: None,
        }
    }

    #[cfg(test)]
    pub fn registry(&self) -> &GameRegistry {
        &self.registry
    }

    fn log_lifecycle(&mut self) {
        if self.lifecycle_log.is_some() {
            return;
        }
        let token = self.registry.lifecycle().subscribe(|event: &LifecycleEvent| {
            let game_id = event.game_id.as_deref().unwrap_or("-");
            match &event.kind {
                LifecycleKind::GameSelected { previous } => {
                    info!(game_id, previous = ?previous, "gameSelected")
                }
                LifecycleKind::SessionEnded { reason } => {
                    info!(game_id, ?reason, "sessionEnded")
                }
                kind => info!(game_id, "{}", kind.as_str()),
            }
            Ok(())
        });
        self.lifecycle_log = Some(token);
    }

    /// Run one session of the configured game until the frame budget is
    /// spent, the session ends on its own, or `shutdown` is notified.
    pub async fn run(&mut self, shutdown: Arc<Notify>) -> Result<RunSummary> {
        self.log_lifecycle();
        let game = self.config.game.clone();

        self.registry.select_game(&game)?;
        self.registry.create_game_instance(None).await?;
        if let Err(e) = self.registry.start_active_game_session().await {
            self.registry.cleanup_active_game().await;
            return Err(anyhow!("failed to start {game}: {e}"));
        }

        let summary = self.frame_loop(&shutdown).await;

        if self.registry.end_active_game_session().await {
            debug!(game_id = %game, "Session ended by host");
        }
        self.registry.cleanup_active_game().await;
        info!(
            game_id = %game,
            frames = summary.frames,
            interactions = summary.interactions,
            accepted = summary.accepted,
            "Run finished"
        );
        Ok(summary)
    }

    async fn frame_loop(&mut self, shutdown: &Notify) -> RunSummary {
        let mut summary = RunSummary::default();
        let mut ticker = interval(self.config.frame_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let started = Instant::now();
        let mut last_ms = 0.0;

        loop {
            if self.config.frames > 0 && summary.frames >= self.config.frames {
                break;
            }
            tokio::select! {
                biased;
                _ = shutdown.notified() => {
                    info!("Shutdown requested");
                    summary.ended_early = true;
                    break;
                }
                _ = ticker.tick() => {}
            }

            summary.frames += 1;
            let time_ms = started.elapsed().as_secs_f64() * 1000.0;
            self.registry.on_frame(&FrameContext {
                frame: summary.frames,
                time_ms,
                delta_ms: time_ms - last_ms,
            })
            .await;
            last_ms = time_ms;

            let every = self.config.interaction_every;
            if every > 0 && summary.frames % every == 0 {
                let interaction = self.scripted_interaction(summary.interactions);
                summary.interactions += 1;
                if self.registry.handle_interaction(&interaction).await {
                    summary.accepted += 1;
                }
            }

            if !self.session_active() {
                warn!(frame = summary.frames, "Session ended outside the host");
                summary.ended_early = true;
                break;
            }
        }
        summary
    }

    fn session_active(&self) -> bool {
        self.registry
            .active_instance()
            .is_some_and(|i| i.interface().state() == SessionState::Active)
    }

    /// The n-th scripted input: floor selects along a spiral, with a
    /// squeeze (undo) every fifth input.
    fn scripted_interaction(&self, n: u64) -> Interaction {
        if n % 5 == 4 {
            return Interaction::Squeeze;
        }
        let origin = self
            .registry
            .active_instance()
            .map(|i| i.interface().config().root_origin)
            .unwrap_or(Vec3::ZERO);
        let angle = (n % 12) as f32 / 12.0 * TAU;
        let radius = 0.3 + 0.1 * (n % 10) as f32;
        let target = origin + Vec3::new(radius * angle.cos(), 0.0, radius * angle.sin());
        let eye = origin + Vec3::new(0.0, EYE_HEIGHT, 0.5);
        Interaction::Select {
            ray: Ray::towards(eye, target),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine_core::headless::{HeadlessDevice, HeadlessPresenter, HeadlessServices};
    use engine_core::InterfaceConfig;
    use serde_json::json;

    fn config(frames: u64) -> Config {
        Config {
            game: "placement".into(),
            frames,
            frame_rate_hz: 100,
            interaction_every: 2,
            log_level: "info".into(),
            deny_session: false,
        }
    }

    fn host(config: Config, services: &HeadlessServices) -> Host {
        let mut registry = GameRegistry::new();
        engine_games::register_all_games(&mut registry, Arc::new(services.clone()));
        Host::new(config, registry)
    }

    fn services() -> HeadlessServices {
        HeadlessServices::new(
            HeadlessDevice::default(),
            HeadlessPresenter::new(),
            InterfaceConfig::default(),
        )
        .with_game_config("placement", json!({ "maxObjects": 50 }))
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_places_objects_and_cleans_up() {
        let services = services();
        let mut host = host(config(20), &services);

        let summary = host.run(Arc::new(Notify::new())).await.unwrap();

        assert_eq!(summary.frames, 20);
        assert_eq!(summary.interactions, 10);
        assert!(summary.accepted >= 8);
        assert!(!summary.ended_early);
        assert!(!host.registry().has_active_instance());
        assert_eq!(services.ledger().live_nodes(), 0);
        assert_eq!(services.device().release_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_denied_session_fails_run() {
        let services = services();
        services.device().deny("no headset");
        let mut host = host(config(5), &services);

        let err = host.run(Arc::new(Notify::new())).await.unwrap_err();

        assert!(err.to_string().contains("failed to start placement"));
        assert!(!host.registry().has_active_instance());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_game_fails_run() {
        let services = services();
        let mut cfg = config(5);
        cfg.game = "chess".into();
        let mut host = host(cfg, &services);

        assert!(host.run(Arc::new(Notify::new())).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_loop() {
        let services = services();
        let mut host = host(config(0), &services);
        let shutdown = Arc::new(Notify::new());
        shutdown.notify_one();

        let summary = host.run(Arc::clone(&shutdown)).await.unwrap();

        assert!(summary.ended_early);
        assert!(!host.registry().has_active_instance());
    }

    #[tokio::test(start_paused = true)]
    async fn test_device_end_stops_loop() {
        let services = services();
        let device = services.device().clone();
        let mut host = host(config(0), &services);
        let shutdown = Arc::new(Notify::new());

        let ender = tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(55)).await;
            device.end_remote_session();
        });
        let summary = host.run(shutdown).await.unwrap();
        ender.await.unwrap();

        assert!(summary.ended_early);
        assert!(summary.frames >= 5);
        assert_eq!(services.device().release_count(), 0);
        assert_eq!(services.ledger().live_nodes(), 0);
    }
}
