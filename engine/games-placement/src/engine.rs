//! Placement rules: players drop coloured objects on the floor until the
//! object limit is reached.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use engine_core::{
    ActionRejected, EngineCore, EngineError, EngineState, EventName, GameEndResult, GameEngine,
    GameSnapshot, SnapshotError,
};

pub const GAME_ID: &str = "placement";
pub const DEFAULT_MAX_OBJECTS: usize = 50;
pub const DEFAULT_SEED: u64 = 7;

/// Colours handed out to new objects, 0xRRGGBB
pub const PALETTE: [u32; 6] = [0xE6_4A_19, 0x43_A0_47, 0x1E_88_E5, 0xFD_D8_35, 0x8E_24_AA, 0x00_AC_C1];

pub const OBJECT_PLACED: &str = "objectPlaced";
pub const OBJECT_REMOVED: &str = "objectRemoved";
pub const OBJECTS_CLEARED: &str = "objectsCleared";
pub const GAME_INITIALIZED: &str = "gameInitialized";
pub const GAME_ENDED: &str = "gameEnded";

const END_REASON: &str = "maxObjectsReached";

/// One object on the floor. `position` is relative to the presentation root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacedObject {
    pub id: u64,
    pub owner: String,
    pub position: [f32; 3],
    pub color: u32,
}

/// Options read by `initialize_game`. Missing keys take the defaults.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlacementConfig {
    pub players: Vec<String>,
    pub max_objects: usize,
    pub seed: u64,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            players: vec!["local".to_string()],
            max_objects: DEFAULT_MAX_OBJECTS,
            seed: DEFAULT_SEED,
        }
    }
}

#[derive(Deserialize)]
struct PlacePayload {
    position: [f32; 3],
}

#[derive(Debug)]
pub struct PlacementEngine {
    core: EngineCore,
    objects: Vec<PlacedObject>,
    next_object_id: u64,
    max_objects: usize,
    rng: ChaCha20Rng,
}

impl PlacementEngine {
    pub fn new() -> Self {
        Self {
            core: EngineCore::new(GAME_ID),
            objects: Vec::new(),
            next_object_id: 1,
            max_objects: DEFAULT_MAX_OBJECTS,
            rng: ChaCha20Rng::seed_from_u64(DEFAULT_SEED),
        }
    }

    pub fn objects(&self) -> &[PlacedObject] {
        &self.objects
    }

    pub fn max_objects(&self) -> usize {
        self.max_objects
    }

    fn is_full(&self) -> bool {
        self.objects.len() >= self.max_objects
    }

    /// Mirror the object list into the engine's game data.
    fn sync_game_data(&mut self) {
        let objects = serde_json::to_value(&self.objects).unwrap_or_else(|_| json!([]));
        let data = self.core.game_data_mut();
        data.insert("placedObjects".to_string(), objects);
        data.insert("nextObjectId".to_string(), json!(self.next_object_id));
        data.insert("maxObjects".to_string(), json!(self.max_objects));
    }

    fn place(&mut self, player_id: &str, data: &Value) -> Result<(), ActionRejected> {
        let payload: PlacePayload = serde_json::from_value(data.clone())
            .map_err(|e| ActionRejected::Malformed(e.to_string()))?;
        if payload.position.iter().any(|c| !c.is_finite()) {
            return Err(ActionRejected::Malformed("position must be finite".to_string()));
        }
        if self.is_full() {
            return Err(ActionRejected::LimitReached(format!(
                "{} objects placed",
                self.max_objects
            )));
        }

        let object = PlacedObject {
            id: self.next_object_id,
            owner: player_id.to_string(),
            position: payload.position,
            color: PALETTE[self.rng.gen_range(0..PALETTE.len())],
        };
        self.next_object_id += 1;
        self.objects.push(object.clone());
        self.sync_game_data();
        self.core.publish(
            EventName::custom(OBJECT_PLACED),
            json!({ "object": object, "count": self.objects.len() }),
        );

        if self.is_full() {
            debug!(count = self.objects.len(), "Object limit reached");
            self.core.set_state(EngineState::Stopped);
            self.core.publish(
                EventName::custom(GAME_ENDED),
                json!({ "reason": END_REASON, "count": self.objects.len() }),
            );
        }
        Ok(())
    }

    fn undo(&mut self, player_id: &str) -> Result<(), ActionRejected> {
        let index = self
            .objects
            .iter()
            .rposition(|o| o.owner == player_id)
            .ok_or_else(|| ActionRejected::Malformed(format!("{player_id} has nothing to undo")))?;
        let object = self.objects.remove(index);
        self.sync_game_data();
        self.core.publish(
            EventName::custom(OBJECT_REMOVED),
            json!({ "object": object, "count": self.objects.len() }),
        );
        Ok(())
    }

    fn clear(&mut self) {
        let removed = self.objects.len();
        self.objects.clear();
        self.sync_game_data();
        self.core
            .publish(EventName::custom(OBJECTS_CLEARED), json!({ "removed": removed }));
    }
}

impl Default for PlacementEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl GameEngine for PlacementEngine {
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
        let config: PlacementConfig = if config.is_null() {
            PlacementConfig::default()
        } else {
            serde_json::from_value(config.clone())
                .map_err(|e| EngineError::InvalidConfig(e.to_string()))?
        };
        if config.max_objects == 0 {
            return Err(EngineError::InvalidConfig("maxObjects must be positive".to_string()));
        }
        if config.players.is_empty() {
            return Err(EngineError::InvalidConfig("at least one player required".to_string()));
        }

        self.max_objects = config.max_objects;
        self.rng = ChaCha20Rng::seed_from_u64(config.seed);
        for player in &config.players {
            self.core.add_player(player, Value::Null);
        }
        self.sync_game_data();
        self.core.set_state(EngineState::Playing);
        self.core.publish(
            EventName::custom(GAME_INITIALIZED),
            json!({ "players": config.players, "maxObjects": self.max_objects }),
        );
        Ok(())
    }

    fn apply_action(
        &mut self,
        player_id: &str,
        action: &str,
        data: &Value,
    ) -> Result<(), ActionRejected> {
        self.core.require_state(EngineState::Playing)?;
        self.core.require_player(player_id)?;
        match action {
            "place" => self.place(player_id, data),
            "undo" => self.undo(player_id),
            "clear" => {
                self.clear();
                Ok(())
            }
            other => Err(ActionRejected::UnknownAction(other.to_string())),
        }
    }

    fn check_game_end(&self) -> Option<GameEndResult> {
        self.is_full().then(|| GameEndResult {
            winner: None,
            reason: END_REASON.to_string(),
            summary: json!({ "placed": self.objects.len() }),
        })
    }

    fn get_valid_actions(&self, player_id: &str) -> Vec<String> {
        if !self.core.validate_state(EngineState::Playing) || !self.core.has_player(player_id) {
            return Vec::new();
        }
        let mut actions = Vec::new();
        if !self.is_full() {
            actions.push("place".to_string());
        }
        if self.objects.iter().any(|o| o.owner == player_id) {
            actions.push("undo".to_string());
        }
        if !self.objects.is_empty() {
            actions.push("clear".to_string());
        }
        actions
    }

    fn serialize_state(&self) -> GameSnapshot {
        self.core.snapshot()
    }

    fn deserialize_state(&mut self, snapshot: &GameSnapshot) -> Result<(), SnapshotError> {
        let data = &snapshot.game_data;
        let objects: Vec<PlacedObject> = match data.get("placedObjects") {
            Some(value) => serde_json::from_value(value.clone())
                .map_err(|e| SnapshotError::InvalidGameData(format!("placedObjects: {e}")))?,
            None => Vec::new(),
        };
        let next_object_id = data
            .get("nextObjectId")
            .and_then(Value::as_u64)
            .unwrap_or_else(|| objects.iter().map(|o| o.id + 1).max().unwrap_or(1));
        let max_objects = data
            .get("maxObjects")
            .and_then(Value::as_u64)
            .map(|n| n as usize)
            .unwrap_or(DEFAULT_MAX_OBJECTS);
        if max_objects == 0 {
            return Err(SnapshotError::InvalidGameData(
                "maxObjects must be positive".to_string(),
            ));
        }

        self.core.restore(snapshot)?;
        self.objects = objects;
        self.next_object_id = next_object_id;
        self.max_objects = max_objects;
        Ok(())
    }

    fn release_game_data(&mut self) {
        self.objects.clear();
        self.next_object_id = 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn names(engine: &PlacementEngine) -> Arc<Mutex<Vec<String>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        engine.bus().subscribe(move |event: &engine_core::GameEvent| {
            sink.lock().unwrap().push(event.name.to_string());
            Ok(())
        });
        seen
    }

    fn started(config: Value) -> PlacementEngine {
        let mut engine = PlacementEngine::new();
        engine.initialize_game(&config).unwrap();
        engine
    }

    fn at(x: f32, z: f32) -> Value {
        json!({ "position": [x, 0.0, z] })
    }

    #[test]
    fn test_initialize_defaults() {
        let engine = started(Value::Null);
        assert_eq!(engine.state(), EngineState::Playing);
        assert!(engine.has_player("local"));
        assert_eq!(engine.max_objects(), DEFAULT_MAX_OBJECTS);
        assert_eq!(
            engine.core().game_data().get("maxObjects"),
            Some(&json!(DEFAULT_MAX_OBJECTS))
        );
    }

    #[test]
    fn test_initialize_rejects_bad_config() {
        let mut engine = PlacementEngine::new();
        assert!(matches!(
            engine.initialize_game(&json!({ "maxObjects": 0 })),
            Err(EngineError::InvalidConfig(_))
        ));
        assert!(matches!(
            engine.initialize_game(&json!({ "players": "alice" })),
            Err(EngineError::InvalidConfig(_))
        ));
        assert_eq!(engine.state(), EngineState::Initialized);

        engine.initialize_game(&Value::Null).unwrap();
        assert!(matches!(
            engine.initialize_game(&Value::Null),
            Err(EngineError::AlreadyInitialized(EngineState::Playing))
        ));
    }

    #[test]
    fn test_place_publishes_object() {
        let mut engine = started(json!({ "players": ["alice"] }));
        let events = names(&engine);

        assert!(engine.process_action("alice", "place", &at(0.5, -0.5)));

        let object = &engine.objects()[0];
        assert_eq!(object.id, 1);
        assert_eq!(object.owner, "alice");
        assert!(PALETTE.contains(&object.color));
        assert_eq!(*events.lock().unwrap(), vec![OBJECT_PLACED]);
    }

    #[test]
    fn test_place_rejects_malformed_and_unknown() {
        let mut engine = started(Value::Null);
        assert!(!engine.process_action("local", "place", &json!({ "position": [1.0] })));
        assert!(!engine.process_action("local", "place", &Value::Null));
        assert!(!engine.process_action("ghost", "place", &at(0.0, 0.0)));
        assert!(!engine.process_action("local", "rotate", &Value::Null));
        assert!(engine.objects().is_empty());
    }

    #[test]
    fn test_limit_stops_the_game() {
        let mut engine = started(json!({ "maxObjects": 2 }));
        let events = names(&engine);

        assert!(engine.process_action("local", "place", &at(0.0, 0.0)));
        assert!(engine.check_game_end().is_none());
        assert!(engine.process_action("local", "place", &at(1.0, 0.0)));

        assert_eq!(engine.state(), EngineState::Stopped);
        let end = engine.check_game_end().unwrap();
        assert_eq!(end.reason, "maxObjectsReached");
        assert!(!engine.process_action("local", "place", &at(0.0, 1.0)));
        assert!(engine.get_valid_actions("local").is_empty());
        assert_eq!(
            *events.lock().unwrap(),
            vec![OBJECT_PLACED, OBJECT_PLACED, "stateChanged", GAME_ENDED]
        );
    }

    #[test]
    fn test_undo_removes_own_latest_object() {
        let mut engine = started(json!({ "players": ["a", "b"] }));
        engine.process_action("a", "place", &at(0.0, 0.0));
        engine.process_action("b", "place", &at(1.0, 0.0));
        engine.process_action("a", "place", &at(2.0, 0.0));

        assert!(engine.process_action("a", "undo", &Value::Null));
        let ids: Vec<u64> = engine.objects().iter().map(|o| o.id).collect();
        assert_eq!(ids, vec![1, 2]);

        assert!(engine.process_action("a", "undo", &Value::Null));
        assert!(!engine.process_action("a", "undo", &Value::Null));
        assert_eq!(engine.objects().len(), 1);
    }

    #[test]
    fn test_valid_actions_follow_ownership() {
        let mut engine = started(json!({ "players": ["a", "b"] }));
        assert_eq!(engine.get_valid_actions("a"), vec!["place"]);
        assert!(engine.get_valid_actions("zz").is_empty());

        engine.process_action("b", "place", &at(0.0, 0.0));
        assert_eq!(engine.get_valid_actions("a"), vec!["place", "clear"]);
        assert_eq!(engine.get_valid_actions("b"), vec!["place", "undo", "clear"]);

        assert!(engine.process_action("a", "clear", &Value::Null));
        assert!(engine.objects().is_empty());
    }

    #[test]
    fn test_same_seed_same_colours() {
        let colours = |seed: u64| {
            let mut engine = started(json!({ "seed": seed }));
            for i in 0..8 {
                engine.process_action("local", "place", &at(i as f32, 0.0));
            }
            engine.objects().iter().map(|o| o.color).collect::<Vec<_>>()
        };
        assert_eq!(colours(3), colours(3));
    }

    #[test]
    fn test_snapshot_round_trip() {
        let mut engine = started(json!({ "players": ["a", "b"], "maxObjects": 10 }));
        engine.process_action("a", "place", &at(0.0, 0.0));
        engine.process_action("b", "place", &at(1.0, 0.5));
        engine.process_action("a", "undo", &Value::Null);

        let json = engine.serialize_state().to_json().unwrap();
        let mut restored = PlacementEngine::new();
        restored
            .deserialize_state(&GameSnapshot::from_json(&json).unwrap())
            .unwrap();

        assert_eq!(restored.objects(), engine.objects());
        assert_eq!(restored.core().players(), engine.core().players());
        assert_eq!(restored.core().game_data(), engine.core().game_data());
        assert_eq!(restored.max_objects(), 10);
        assert_eq!(restored.state(), EngineState::Playing);

        // Ids keep counting from where the snapshot left off
        assert!(restored.process_action("b", "place", &at(2.0, 0.0)));
        assert_eq!(restored.objects().last().unwrap().id, 3);
    }

    #[test]
    fn test_snapshot_with_bad_objects_is_rejected() {
        let engine = started(Value::Null);
        let mut snapshot = engine.serialize_state();
        snapshot
            .game_data
            .insert("placedObjects".to_string(), json!("not a list"));

        let mut restored = PlacementEngine::new();
        assert!(matches!(
            restored.deserialize_state(&snapshot),
            Err(SnapshotError::InvalidGameData(_))
        ));
        assert_eq!(restored.state(), EngineState::Initialized);
    }

    #[test]
    fn test_cleanup_releases_objects() {
        let mut engine = started(Value::Null);
        engine.process_action("local", "place", &at(0.0, 0.0));
        engine.cleanup();

        assert!(engine.objects().is_empty());
        assert!(engine.is_inert());
        assert!(!engine.process_action("local", "place", &at(0.0, 0.0)));
    }
}
