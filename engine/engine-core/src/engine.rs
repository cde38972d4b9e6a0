//! Game engine trait and the shared scaffolding every engine is built on
//!
//! A concrete game embeds an [`EngineCore`] and implements the game-specific
//! half of [`GameEngine`]. The roster, the state machine, event publishing
//! and cleanup come from the core through the trait's provided methods, so
//! every game gets the same ordering guarantees.

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, trace};

use crate::bus::EventBus;
use crate::event::{now_millis, EventName, GameEvent};
use crate::snapshot::{GameSnapshot, SnapshotError, SNAPSHOT_SCHEMA_VERSION};

/// Engine lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineState {
    Initialized,
    Playing,
    Stopped,
    Cleanup,
}

impl EngineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineState::Initialized => "initialized",
            EngineState::Playing => "playing",
            EngineState::Stopped => "stopped",
            EngineState::Cleanup => "cleanup",
        }
    }
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EngineState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "initialized" => Ok(EngineState::Initialized),
            "playing" => Ok(EngineState::Playing),
            "stopped" => Ok(EngineState::Stopped),
            "cleanup" => Ok(EngineState::Cleanup),
            other => Err(format!("unknown engine state '{other}'")),
        }
    }
}

/// A participant known to one engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: String,
    #[serde(default)]
    pub data: Value,
    /// Unix millis
    pub joined_at: u64,
}

/// Outcome reported by [`GameEngine::check_game_end`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameEndResult {
    pub winner: Option<String>,
    pub reason: String,
    #[serde(default)]
    pub summary: Value,
}

/// Why an action was not applied.
///
/// These are ordinary gameplay outcomes, not failures of the engine.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ActionRejected {
    #[error("Engine has been cleaned up")]
    EngineInert,
    #[error("Unknown player: {0}")]
    UnknownPlayer(String),
    #[error("Engine is {actual}, action requires {expected}")]
    WrongState {
        expected: EngineState,
        actual: EngineState,
    },
    #[error("Unknown action: {0}")]
    UnknownAction(String),
    #[error("Malformed payload: {0}")]
    Malformed(String),
    #[error("Limit reached: {0}")]
    LimitReached(String),
}

/// Error type for `initialize_game`
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Invalid game config: {0}")]
    InvalidConfig(String),
    #[error("Engine already initialized (state: {0})")]
    AlreadyInitialized(EngineState),
    #[error("Engine has been cleaned up")]
    EngineInert,
}

/// Engine shared between the registry (owner) and its session interface.
pub type SharedEngine = Arc<Mutex<dyn GameEngine>>;

/// Wrap a concrete engine for sharing.
pub fn share_engine<E: GameEngine + 'static>(engine: E) -> SharedEngine {
    Arc::new(Mutex::new(engine))
}

/// Lock a shared engine, recovering from poisoning.
pub fn lock_engine(engine: &SharedEngine) -> MutexGuard<'_, dyn GameEngine + 'static> {
    engine.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Roster, state machine, game-data bag and event bus of one engine.
#[derive(Debug)]
pub struct EngineCore {
    game_id: String,
    state: EngineState,
    players: Vec<Player>,
    game_data: Map<String, Value>,
    bus: Arc<EventBus<GameEvent>>,
    inert: bool,
}

impl EngineCore {
    pub fn new(game_id: impl Into<String>) -> Self {
        let game_id = game_id.into();
        let bus = Arc::new(EventBus::new(format!("engine:{game_id}")));
        Self {
            game_id,
            state: EngineState::Initialized,
            players: Vec::new(),
            game_data: Map::new(),
            bus,
            inert: false,
        }
    }

    pub fn game_id(&self) -> &str {
        &self.game_id
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    /// True once `cleanup` has run. An inert core publishes nothing.
    pub fn is_inert(&self) -> bool {
        self.inert
    }

    /// The engine's bus, for observers to subscribe to.
    pub fn bus(&self) -> Arc<EventBus<GameEvent>> {
        Arc::clone(&self.bus)
    }

    /// Publish `name` with `payload` to every observer.
    pub fn publish(&self, name: EventName, payload: Value) {
        if self.inert {
            trace!(game_id = %self.game_id, event = %name, "Dropping event from inert engine");
            return;
        }
        let event = GameEvent {
            game_id: self.game_id.clone(),
            name,
            timestamp: now_millis(),
            current_state: self.state,
            payload,
        };
        self.bus.publish(&event);
    }

    /// Move to `next` and publish `stateChanged`, even if the state is unchanged.
    pub fn set_state(&mut self, next: EngineState) {
        if self.inert {
            return;
        }
        let previous = self.state;
        self.state = next;
        debug!(game_id = %self.game_id, %previous, new = %next, "Engine state changed");
        self.publish(
            EventName::StateChanged,
            json!({ "previousState": previous.as_str(), "newState": next.as_str() }),
        );
    }

    pub fn validate_state(&self, expected: EngineState) -> bool {
        !self.inert && self.state == expected
    }

    /// `Ok` when the engine is live and in `expected`.
    pub fn require_state(&self, expected: EngineState) -> Result<(), ActionRejected> {
        if self.inert {
            return Err(ActionRejected::EngineInert);
        }
        if self.state != expected {
            return Err(ActionRejected::WrongState {
                expected,
                actual: self.state,
            });
        }
        Ok(())
    }

    pub fn require_player(&self, player_id: &str) -> Result<(), ActionRejected> {
        if self.has_player(player_id) {
            Ok(())
        } else {
            Err(ActionRejected::UnknownPlayer(player_id.to_string()))
        }
    }

    // Roster

    /// Add a player. Duplicate ids are rejected without publishing.
    pub fn add_player(&mut self, player_id: &str, data: Value) -> bool {
        if self.inert || self.has_player(player_id) {
            return false;
        }
        let player = Player {
            id: player_id.to_string(),
            data,
            joined_at: now_millis(),
        };
        let payload = json!({ "playerId": player.id, "player": player });
        self.players.push(player);
        self.publish(EventName::PlayerAdded, payload);
        true
    }

    /// Remove a player. Unknown ids are rejected without publishing.
    pub fn remove_player(&mut self, player_id: &str) -> bool {
        if self.inert {
            return false;
        }
        let Some(index) = self.players.iter().position(|p| p.id == player_id) else {
            return false;
        };
        let player = self.players.remove(index);
        self.publish(
            EventName::PlayerRemoved,
            json!({ "playerId": player.id, "player": player }),
        );
        true
    }

    pub fn get_player(&self, player_id: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.id == player_id)
    }

    pub fn has_player(&self, player_id: &str) -> bool {
        self.get_player(player_id).is_some()
    }

    /// Round-robin over join order. `None` or an unknown id yields the first player.
    pub fn next_player(&self, current: Option<&str>) -> Option<&Player> {
        if self.players.is_empty() {
            return None;
        }
        let next = current
            .and_then(|id| self.players.iter().position(|p| p.id == id))
            .map(|index| (index + 1) % self.players.len())
            .unwrap_or(0);
        self.players.get(next)
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    // Game data

    pub fn game_data(&self) -> &Map<String, Value> {
        &self.game_data
    }

    pub fn game_data_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.game_data
    }

    // Snapshots

    /// Roster, state and game data as a snapshot; games add their own keys.
    pub fn snapshot(&self) -> GameSnapshot {
        GameSnapshot {
            schema_version: SNAPSHOT_SCHEMA_VERSION,
            game_id: self.game_id.clone(),
            state: self.state,
            players: self.players.clone(),
            game_data: self.game_data.clone(),
        }
    }

    /// Replace roster, game data and state with the snapshot's.
    ///
    /// Publishes `stateChanged` when the restored state differs.
    pub fn restore(&mut self, snapshot: &GameSnapshot) -> Result<(), SnapshotError> {
        if self.inert {
            return Err(SnapshotError::EngineInert);
        }
        if snapshot.game_id != self.game_id {
            return Err(SnapshotError::GameMismatch {
                expected: self.game_id.clone(),
                found: snapshot.game_id.clone(),
            });
        }
        if snapshot.schema_version > SNAPSHOT_SCHEMA_VERSION {
            return Err(SnapshotError::UnsupportedVersion {
                version: snapshot.schema_version,
            });
        }
        if snapshot.state == EngineState::Cleanup {
            return Err(SnapshotError::InvalidGameData(
                "cannot restore a cleaned-up engine".to_string(),
            ));
        }

        self.players = snapshot.players.clone();
        self.game_data = snapshot.game_data.clone();
        if snapshot.state != self.state {
            self.set_state(snapshot.state);
        }
        Ok(())
    }

    /// Clear roster and game data, enter `cleanup`, publish the final
    /// `cleanup` event, then drop every observer. Idempotent.
    pub fn cleanup(&mut self) {
        if self.inert {
            return;
        }
        self.players.clear();
        self.game_data.clear();
        self.set_state(EngineState::Cleanup);
        self.publish(EventName::Cleanup, Value::Null);
        self.inert = true;
        self.bus.clear();
        debug!(game_id = %self.game_id, "Engine cleaned up");
    }
}

/// Logic engine of one game.
///
/// Implementors supply the game-specific methods; everything else is
/// provided on top of [`EngineCore`].
pub trait GameEngine: Send + fmt::Debug {
    fn core(&self) -> &EngineCore;

    fn core_mut(&mut self) -> &mut EngineCore;

    /// Set up a fresh game from `config` and normally enter `Playing`.
    fn initialize_game(&mut self, config: &Value) -> Result<(), EngineError>;

    /// Validate and apply one action. Called only while the engine is live.
    fn apply_action(
        &mut self,
        player_id: &str,
        action: &str,
        data: &Value,
    ) -> Result<(), ActionRejected>;

    fn check_game_end(&self) -> Option<GameEndResult>;

    fn get_valid_actions(&self, player_id: &str) -> Vec<String>;

    fn serialize_state(&self) -> GameSnapshot;

    fn deserialize_state(&mut self, snapshot: &GameSnapshot) -> Result<(), SnapshotError>;

    /// Drop game-owned data before the core is cleaned up.
    fn release_game_data(&mut self) {}

    fn game_id(&self) -> &str {
        self.core().game_id()
    }

    fn state(&self) -> EngineState {
        self.core().state()
    }

    fn is_inert(&self) -> bool {
        self.core().is_inert()
    }

    fn bus(&self) -> Arc<EventBus<GameEvent>> {
        self.core().bus()
    }

    fn set_state(&mut self, next: EngineState) {
        self.core_mut().set_state(next);
    }

    fn validate_state(&self, expected: EngineState) -> bool {
        self.core().validate_state(expected)
    }

    fn add_player(&mut self, player_id: &str, data: Value) -> bool {
        self.core_mut().add_player(player_id, data)
    }

    fn remove_player(&mut self, player_id: &str) -> bool {
        self.core_mut().remove_player(player_id)
    }

    fn get_player(&self, player_id: &str) -> Option<&Player> {
        self.core().get_player(player_id)
    }

    fn has_player(&self, player_id: &str) -> bool {
        self.core().has_player(player_id)
    }

    fn next_player(&self, current: Option<&str>) -> Option<&Player> {
        self.core().next_player(current)
    }

    /// Apply an action, reporting only whether it was accepted.
    ///
    /// Always `false` once the engine has been cleaned up.
    fn process_action(&mut self, player_id: &str, action: &str, data: &Value) -> bool {
        if self.is_inert() {
            debug!(game_id = %self.game_id(), action, "Action on inert engine ignored");
            return false;
        }
        match self.apply_action(player_id, action, data) {
            Ok(()) => true,
            Err(reason) => {
                debug!(game_id = %self.game_id(), player_id, action, %reason, "Action rejected");
                false
            }
        }
    }

    fn cleanup(&mut self) {
        if self.is_inert() {
            return;
        }
        self.release_game_data();
        self.core_mut().cleanup();
    }
}
