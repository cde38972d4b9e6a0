//! Shared fixtures for engine-core tests

use std::sync::{Arc, Mutex};

use glam::Vec3;
use serde_json::{json, Value};

use crate::bus::EventBus;
use crate::descriptor::{factory_fn, GameFactory, GameParts};
use crate::device::{HostServices, NodeSpec};
use crate::engine::{
    share_engine, ActionRejected, EngineCore, EngineError, EngineState, GameEndResult, GameEngine,
    SharedEngine,
};
use crate::event::{EventName, GameEvent};
use crate::headless::HeadlessServices;
use crate::interaction::{EngineAction, Interaction};
use crate::scene::Scene;
use crate::session::{GamePresentation, SessionInterface};
use crate::snapshot::{GameSnapshot, SnapshotError};

/// Collect every event published on `bus`.
pub fn record_events<E>(bus: &Arc<EventBus<E>>) -> Arc<Mutex<Vec<E>>>
where
    E: Clone + Send + 'static,
{
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    bus.subscribe(move |event: &E| {
        sink.lock().unwrap().push(event.clone());
        Ok(())
    });
    events
}

/// Minimal engine: players increment a shared counter.
#[derive(Debug)]
pub struct CounterEngine {
    core: EngineCore,
    count: u64,
}

impl CounterEngine {
    pub fn new(game_id: &str) -> Self {
        Self {
            core: EngineCore::new(game_id),
            count: 0,
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }
}

impl GameEngine for CounterEngine {
    fn core(&self) -> &EngineCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut EngineCore {
        &mut self.core
    }

    fn initialize_game(&mut self, config: &Value) -> Result<(), EngineError> {
        if self.core.is_inert() {
            return Err(EngineError::EngineInert);
        }
        if self.core.state() != EngineState::Initialized {
            return Err(EngineError::AlreadyInitialized(self.core.state()));
        }
        let players: Vec<String> = match config.get("players") {
            Some(Value::Array(ids)) => ids
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
            Some(_) => return Err(EngineError::InvalidConfig("players must be a list".into())),
            None => vec!["local".to_string()],
        };
        for id in &players {
            self.core.add_player(id, Value::Null);
        }
        self.core.set_state(EngineState::Playing);
        Ok(())
    }

    fn apply_action(
        &mut self,
        player_id: &str,
        action: &str,
        _data: &Value,
    ) -> Result<(), ActionRejected> {
        self.core.require_state(EngineState::Playing)?;
        self.core.require_player(player_id)?;
        match action {
            "increment" => {
                self.count += 1;
                self.core
                    .game_data_mut()
                    .insert("count".to_string(), json!(self.count));
                self.core.publish(
                    EventName::custom("incremented"),
                    json!({ "playerId": player_id, "count": self.count }),
                );
                Ok(())
            }
            other => Err(ActionRejected::UnknownAction(other.to_string())),
        }
    }

    fn check_game_end(&self) -> Option<GameEndResult> {
        None
    }

    fn get_valid_actions(&self, player_id: &str) -> Vec<String> {
        if self.core.validate_state(EngineState::Playing) && self.core.has_player(player_id) {
            vec!["increment".to_string()]
        } else {
            Vec::new()
        }
    }

    fn serialize_state(&self) -> GameSnapshot {
        self.core.snapshot()
    }

    fn deserialize_state(&mut self, snapshot: &GameSnapshot) -> Result<(), SnapshotError> {
        self.core.restore(snapshot)?;
        self.count = self
            .core
            .game_data()
            .get("count")
            .and_then(Value::as_u64)
            .unwrap_or(0);
        Ok(())
    }

    fn release_game_data(&mut self) {
        self.count = 0;
    }
}

/// What a [`RecordingPresentation`] saw.
#[derive(Debug, Default)]
pub struct PresentationLog {
    pub created: usize,
    pub events: Vec<String>,
    pub frames: u64,
    pub released: usize,
}

/// Presentation that spawns one node per increment and logs every hook.
pub struct RecordingPresentation {
    log: Arc<Mutex<PresentationLog>>,
    fail_create: bool,
}

impl RecordingPresentation {
    pub fn new() -> (Self, Arc<Mutex<PresentationLog>>) {
        let log = Arc::new(Mutex::new(PresentationLog::default()));
        let presentation = Self {
            log: Arc::clone(&log),
            fail_create: false,
        };
        (presentation, log)
    }

    /// A presentation whose `create_game_objects` always fails.
    pub fn failing() -> (Self, Arc<Mutex<PresentationLog>>) {
        let (mut presentation, log) = Self::new();
        presentation.fail_create = true;
        (presentation, log)
    }
}

impl GamePresentation for RecordingPresentation {
    fn create_game_objects(&mut self, scene: &mut Scene) -> anyhow::Result<()> {
        if self.fail_create {
            anyhow::bail!("asset load failed");
        }
        scene.spawn(&NodeSpec::new("counter-display", Vec3::ZERO));
        self.log.lock().unwrap().created += 1;
        Ok(())
    }

    fn handle_game_interaction(
        &mut self,
        interaction: &Interaction,
        _scene: &Scene,
    ) -> Vec<EngineAction> {
        match interaction {
            Interaction::Select { .. } => vec![EngineAction::new("increment", Value::Null)],
            Interaction::Command { name, data } => vec![EngineAction::new(name.clone(), data.clone())],
            Interaction::Squeeze => Vec::new(),
        }
    }

    fn update_game_visualization(&mut self, event: &GameEvent, scene: &mut Scene) {
        self.log.lock().unwrap().events.push(event.name.to_string());
        if event.name.is("incremented") {
            scene.spawn(&NodeSpec::new("tick", Vec3::Y));
        }
    }

    fn on_frame(&mut self, _frame: &crate::interaction::FrameContext, _scene: &mut Scene) {
        self.log.lock().unwrap().frames += 1;
    }

    fn release_game_objects(&mut self) {
        self.log.lock().unwrap().released += 1;
    }
}

/// A counter engine bound to a recording presentation through `services`.
pub fn counter_parts(
    game_id: &str,
    services: &HeadlessServices,
) -> (GameParts, Arc<Mutex<PresentationLog>>) {
    let engine: SharedEngine = share_engine(CounterEngine::new(game_id));
    let (presentation, log) = RecordingPresentation::new();
    let interface = SessionInterface::new(
        Arc::clone(&engine),
        Box::new(presentation),
        services.session_resource(),
        services.presenter(),
        services.interface_config(game_id),
    );
    (GameParts { engine, interface }, log)
}

/// Factory producing [`counter_parts`] for `game_id`.
pub fn counter_factory(game_id: &str, services: HeadlessServices) -> Arc<dyn GameFactory> {
    let game_id = game_id.to_string();
    factory_fn(move || {
        let services = services.clone();
        let game_id = game_id.clone();
        async move { Ok(Some(counter_parts(&game_id, &services).0)) }
    })
}
