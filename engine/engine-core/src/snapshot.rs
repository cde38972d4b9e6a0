//! Serializable engine snapshots
//!
//! A snapshot carries the roster, the engine state and the game-data bag.
//! Concrete games put whatever else they need to restore themselves into
//! `game_data`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::engine::{EngineState, Player};

/// Snapshot layout version written by this build.
pub const SNAPSHOT_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameSnapshot {
    pub schema_version: u32,
    pub game_id: String,
    pub state: EngineState,
    pub players: Vec<Player>,
    #[serde(default)]
    pub game_data: Map<String, Value>,
}

impl GameSnapshot {
    pub fn to_json(&self) -> Result<String, SnapshotError> {
        serde_json::to_string(self).map_err(SnapshotError::Malformed)
    }

    pub fn from_json(raw: &str) -> Result<Self, SnapshotError> {
        serde_json::from_str(raw).map_err(SnapshotError::Malformed)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("Snapshot belongs to game '{found}', expected '{expected}'")]
    GameMismatch { expected: String, found: String },
    #[error("Unsupported snapshot version: {version}")]
    UnsupportedVersion { version: u32 },
    #[error("Malformed snapshot: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("Invalid game data: {0}")]
    InvalidGameData(String),
    #[error("Engine has been cleaned up")]
    EngineInert,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_field_names() {
        let snapshot = GameSnapshot {
            schema_version: SNAPSHOT_SCHEMA_VERSION,
            game_id: "demo".into(),
            state: EngineState::Stopped,
            players: vec![Player {
                id: "p1".into(),
                data: json!({"colour": "red"}),
                joined_at: 10,
            }],
            game_data: Map::new(),
        };

        let value: Value = serde_json::from_str(&snapshot.to_json().unwrap()).unwrap();
        assert_eq!(value["schemaVersion"], 1);
        assert_eq!(value["gameId"], "demo");
        assert_eq!(value["state"], "stopped");
        assert_eq!(value["players"][0]["joinedAt"], 10);
    }

    #[test]
    fn test_missing_game_data_defaults_to_empty() {
        let raw = r#"{"schemaVersion":1,"gameId":"demo","state":"playing","players":[]}"#;
        let snapshot = GameSnapshot::from_json(raw).unwrap();
        assert!(snapshot.game_data.is_empty());
        assert_eq!(snapshot.state, EngineState::Playing);
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(matches!(
            GameSnapshot::from_json("{not json"),
            Err(SnapshotError::Malformed(_))
        ));
    }
}
