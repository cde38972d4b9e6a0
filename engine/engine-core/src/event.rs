//! Event payloads delivered over the engine and lifecycle buses.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::{Map, Value};

use crate::engine::EngineState;

/// Milliseconds since the unix epoch, saturating to 0 if the clock is before it.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// Name of an engine event.
///
/// The four base names are produced by the engine scaffolding itself; games
/// publish anything else through `Custom`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventName {
    StateChanged,
    PlayerAdded,
    PlayerRemoved,
    Cleanup,
    Custom(String),
}

impl EventName {
    pub fn custom(name: impl Into<String>) -> Self {
        Self::Custom(name.into())
    }

    pub fn as_str(&self) -> &str {
        match self {
            EventName::StateChanged => "stateChanged",
            EventName::PlayerAdded => "playerAdded",
            EventName::PlayerRemoved => "playerRemoved",
            EventName::Cleanup => "cleanup",
            EventName::Custom(name) => name,
        }
    }

    /// True when this is the game-specific event `name`.
    pub fn is(&self, name: &str) -> bool {
        self.as_str() == name
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An event published by a game engine to its observers.
#[derive(Debug, Clone, PartialEq)]
pub struct GameEvent {
    pub game_id: String,
    pub name: EventName,
    /// Unix millis at publish time
    pub timestamp: u64,
    /// Engine state at publish time
    pub current_state: EngineState,
    /// Event-specific data; usually a JSON object
    pub payload: Value,
}

impl GameEvent {
    /// The flattened `{gameId, eventName, timestamp, currentState, ...payload}` view.
    ///
    /// Payload keys never overwrite the four envelope keys. Non-object payloads
    /// are carried under `data`.
    pub fn merged_payload(&self) -> Value {
        let mut merged = Map::new();
        match &self.payload {
            Value::Object(fields) => {
                for (key, value) in fields {
                    merged.insert(key.clone(), value.clone());
                }
            }
            Value::Null => {}
            other => {
                merged.insert("data".to_string(), other.clone());
            }
        }
        merged.insert("gameId".to_string(), Value::from(self.game_id.clone()));
        merged.insert("eventName".to_string(), Value::from(self.name.as_str()));
        merged.insert("timestamp".to_string(), Value::from(self.timestamp));
        merged.insert(
            "currentState".to_string(),
            Value::from(self.current_state.as_str()),
        );
        Value::Object(merged)
    }

    /// `(previous, new)` for a `stateChanged` event.
    pub fn state_transition(&self) -> Option<(EngineState, EngineState)> {
        if self.name != EventName::StateChanged {
            return None;
        }
        let previous = self.payload.get("previousState")?.as_str()?.parse().ok()?;
        let next = self.payload.get("newState")?.as_str()?.parse().ok()?;
        Some((previous, next))
    }
}

/// Why an interface session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    /// `end_session()` was called, directly or through the registry
    Requested,
    /// The exit affordance was selected
    ExitSelected,
    /// The device ended the session on its own
    DeviceEnded,
    /// Ended by a `SessionCanceller`
    Cancelled,
}

/// Registry-level notification kinds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleKind {
    GameSelected { previous: Option<String> },
    GameInstanceCreated,
    GameSessionStarted,
    GameSessionEnded,
    GameInstanceCleaned,
    /// Emitted by a session interface when its own teardown completes
    SessionEnded { reason: EndReason },
}

impl LifecycleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleKind::GameSelected { .. } => "gameSelected",
            LifecycleKind::GameInstanceCreated => "gameInstanceCreated",
            LifecycleKind::GameSessionStarted => "gameSessionStarted",
            LifecycleKind::GameSessionEnded => "gameSessionEnded",
            LifecycleKind::GameInstanceCleaned => "gameInstanceCleaned",
            LifecycleKind::SessionEnded { .. } => "sessionEnded",
        }
    }
}

/// One-shot notification published on the registry's lifecycle bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleEvent {
    pub kind: LifecycleKind,
    pub game_id: Option<String>,
    pub timestamp: u64,
}

impl LifecycleEvent {
    pub fn new(kind: LifecycleKind, game_id: Option<String>) -> Self {
        Self {
            kind,
            game_id,
            timestamp: now_millis(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(name: EventName, payload: Value) -> GameEvent {
        GameEvent {
            game_id: "demo".to_string(),
            name,
            timestamp: 1234,
            current_state: EngineState::Playing,
            payload,
        }
    }

    #[test]
    fn test_event_names() {
        assert_eq!(EventName::StateChanged.as_str(), "stateChanged");
        assert_eq!(EventName::PlayerAdded.as_str(), "playerAdded");
        assert_eq!(EventName::PlayerRemoved.as_str(), "playerRemoved");
        assert_eq!(EventName::Cleanup.as_str(), "cleanup");
        assert_eq!(EventName::custom("objectPlaced").to_string(), "objectPlaced");
        assert!(EventName::custom("objectPlaced").is("objectPlaced"));
    }

    #[test]
    fn test_merged_payload_keeps_envelope() {
        let merged = event(
            EventName::custom("scored"),
            json!({"points": 3, "gameId": "spoofed"}),
        )
        .merged_payload();

        assert_eq!(merged["gameId"], "demo");
        assert_eq!(merged["eventName"], "scored");
        assert_eq!(merged["timestamp"], 1234);
        assert_eq!(merged["currentState"], "playing");
        assert_eq!(merged["points"], 3);
    }

    #[test]
    fn test_merged_payload_wraps_scalars() {
        let merged = event(EventName::custom("tick"), json!(7)).merged_payload();
        assert_eq!(merged["data"], 7);
    }

    #[test]
    fn test_state_transition() {
        let changed = event(
            EventName::StateChanged,
            json!({"previousState": "initialized", "newState": "playing"}),
        );
        assert_eq!(
            changed.state_transition(),
            Some((EngineState::Initialized, EngineState::Playing))
        );

        let other = event(EventName::PlayerAdded, json!({}));
        assert_eq!(other.state_transition(), None);
    }

    #[test]
    fn test_lifecycle_names() {
        let selected = LifecycleKind::GameSelected { previous: None };
        assert_eq!(selected.as_str(), "gameSelected");
        assert_eq!(LifecycleKind::GameInstanceCleaned.as_str(), "gameInstanceCleaned");
        let ended = LifecycleEvent::new(
            LifecycleKind::SessionEnded {
                reason: EndReason::DeviceEnded,
            },
            Some("demo".into()),
        );
        assert_eq!(ended.kind.as_str(), "sessionEnded");
        assert!(ended.timestamp > 0);
    }
}
