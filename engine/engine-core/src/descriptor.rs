//! Game descriptors: catalog metadata plus the factory that builds a game
//!
//! Descriptors are what pickers and menus list. Only playable descriptors
//! with a factory can be turned into a running instance.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::engine::SharedEngine;
use crate::session::SessionInterface;

/// Supported number of simultaneous players
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerRange {
    pub min: usize,
    pub max: usize,
}

impl PlayerRange {
    pub fn new(min: usize, max: usize) -> Self {
        Self {
            min: min.min(max),
            max: max.max(min),
        }
    }

    pub fn single() -> Self {
        Self::new(1, 1)
    }

    pub fn contains(&self, count: usize) -> bool {
        (self.min..=self.max).contains(&count)
    }
}

impl Default for PlayerRange {
    fn default() -> Self {
        Self::single()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    #[default]
    Easy,
    Medium,
    Hard,
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        };
        f.write_str(s)
    }
}

/// The two halves a factory produces. The interface must already be bound
/// to `engine`.
pub struct GameParts {
    pub engine: SharedEngine,
    pub interface: SessionInterface,
}

/// Builds a fresh engine/interface pair for one descriptor.
///
/// `Ok(None)` means the game could not be produced right now; `Err` is a
/// failure worth logging. Both leave the registry without an instance.
#[async_trait]
pub trait GameFactory: Send + Sync {
    async fn create(&self, descriptor: &GameDescriptor) -> anyhow::Result<Option<GameParts>>;
}

struct FnFactory<F>(F);

#[async_trait]
impl<F, Fut> GameFactory for FnFactory<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Option<GameParts>>> + Send,
{
    async fn create(&self, _descriptor: &GameDescriptor) -> anyhow::Result<Option<GameParts>> {
        (self.0)().await
    }
}

/// Wrap an async closure as a [`GameFactory`].
pub fn factory_fn<F, Fut>(factory: F) -> Arc<dyn GameFactory>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Option<GameParts>>> + Send + 'static,
{
    Arc::new(FnFactory(factory))
}

/// Catalog entry for one game
#[derive(Clone)]
pub struct GameDescriptor {
    /// Unique identifier (e.g., "placement")
    pub id: String,

    /// Human-readable name shown by pickers
    pub name: String,

    pub description: String,

    /// Whether pickers may offer this game. A playable descriptor without a
    /// factory still cannot be created.
    pub is_playable: bool,

    pub player_range: PlayerRange,

    pub difficulty: Difficulty,

    pub estimated_duration: Option<Duration>,

    /// Free-form grouping for menus (e.g., "creative", "arcade")
    pub category: String,

    factory: Option<Arc<dyn GameFactory>>,
}

impl GameDescriptor {
    /// A catalog-only descriptor. Add a factory to make it playable.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            is_playable: false,
            player_range: PlayerRange::default(),
            difficulty: Difficulty::default(),
            estimated_duration: None,
            category: String::new(),
            factory: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_players(mut self, min: usize, max: usize) -> Self {
        self.player_range = PlayerRange::new(min, max);
        self
    }

    pub fn with_difficulty(mut self, difficulty: Difficulty) -> Self {
        self.difficulty = difficulty;
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.estimated_duration = Some(duration);
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    /// Attach a factory and mark the descriptor playable.
    pub fn with_factory(mut self, factory: Arc<dyn GameFactory>) -> Self {
        self.factory = Some(factory);
        self.is_playable = true;
        self
    }

    /// Keep the descriptor in the catalog but refuse to create it.
    pub fn not_playable(mut self) -> Self {
        self.is_playable = false;
        self
    }

    pub fn factory(&self) -> Option<&Arc<dyn GameFactory>> {
        self.factory.as_ref()
    }

    /// Playable and backed by a factory.
    pub fn can_create(&self) -> bool {
        self.is_playable && self.factory.is_some()
    }

    pub fn summary(&self) -> DescriptorSummary {
        DescriptorSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            is_playable: self.can_create(),
            player_range: self.player_range,
            difficulty: self.difficulty,
            estimated_duration_secs: self.estimated_duration.map(|d| d.as_secs()),
            category: self.category.clone(),
        }
    }
}

impl fmt::Debug for GameDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GameDescriptor")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("is_playable", &self.is_playable)
            .field("player_range", &self.player_range)
            .field("difficulty", &self.difficulty)
            .field("estimated_duration", &self.estimated_duration)
            .field("category", &self.category)
            .field("has_factory", &self.factory.is_some())
            .finish()
    }
}

/// Serializable view of a descriptor for menus and logs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DescriptorSummary {
    pub id: String,
    pub name: String,
    pub description: String,
    pub is_playable: bool,
    pub player_range: PlayerRange,
    pub difficulty: Difficulty,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_duration_secs: Option<u64>,
    pub category: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_factory() -> Arc<dyn GameFactory> {
        factory_fn(|| async { Ok(None) })
    }

    #[test]
    fn test_builder_defaults() {
        let descriptor = GameDescriptor::new("ring-toss", "Ring Toss");
        assert!(!descriptor.is_playable);
        assert!(!descriptor.can_create());
        assert_eq!(descriptor.player_range, PlayerRange::single());
        assert_eq!(descriptor.difficulty, Difficulty::Easy);
        assert!(descriptor.estimated_duration.is_none());
    }

    #[test]
    fn test_factory_makes_playable_until_opted_out() {
        let descriptor = GameDescriptor::new("placement", "Placement").with_factory(empty_factory());
        assert!(descriptor.can_create());

        let parked = descriptor.clone().not_playable();
        assert!(parked.factory().is_some());
        assert!(!parked.can_create());
    }

    #[test]
    fn test_playable_flag_without_factory_cannot_create() {
        let mut descriptor = GameDescriptor::new("placement", "Placement");
        descriptor.is_playable = true;
        assert!(!descriptor.can_create());
        assert!(!descriptor.summary().is_playable);
    }

    #[test]
    fn test_player_range_normalises_bounds() {
        let range = PlayerRange::new(4, 2);
        assert_eq!(range, PlayerRange { min: 2, max: 4 });
        assert!(range.contains(3));
        assert!(!range.contains(1));
    }

    #[test]
    fn test_summary_serialization() {
        let descriptor = GameDescriptor::new("block-stack", "Block Stack")
            .with_description("Stack blocks as high as you can")
            .with_players(1, 2)
            .with_difficulty(Difficulty::Medium)
            .with_duration(Duration::from_secs(300))
            .with_category("arcade");

        let json = serde_json::to_value(descriptor.summary()).unwrap();
        assert_eq!(json["id"], "block-stack");
        assert_eq!(json["isPlayable"], false);
        assert_eq!(json["playerRange"]["max"], 2);
        assert_eq!(json["difficulty"], "medium");
        assert_eq!(json["estimatedDurationSecs"], 300);

        let back: DescriptorSummary = serde_json::from_value(json).unwrap();
        assert_eq!(back, descriptor.summary());
    }

    #[tokio::test]
    async fn test_factory_fn_is_invoked() {
        let descriptor = GameDescriptor::new("x", "X").with_factory(empty_factory());
        let factory = descriptor.factory().unwrap();
        assert!(factory.create(&descriptor).await.unwrap().is_none());
    }
}
