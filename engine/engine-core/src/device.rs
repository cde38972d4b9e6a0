//! Contracts for the collaborators the core drives but does not implement:
//! the immersive session device and the rendering layer.

use async_trait::async_trait;
use glam::Vec3;

use crate::interaction::ExitAffordance;

/// Options passed to [`SessionResource::acquire`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionConfig {
    /// Acquisition fails if any of these is unavailable
    pub required_features: Vec<String>,
    /// Granted when available, silently dropped otherwise
    pub optional_features: Vec<String>,
    /// Element the device overlays UI onto, if any
    pub overlay_target: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeviceError {
    #[error("Immersive sessions are not supported on this device")]
    Unsupported,
    #[error("Session request denied: {0}")]
    Denied(String),
    #[error("Required feature unavailable: {0}")]
    MissingFeature(String),
    #[error("Session release failed: {0}")]
    ReleaseFailed(String),
}

/// Source of immersive sessions.
#[async_trait]
pub trait SessionResource: Send + Sync {
    fn is_supported(&self) -> bool;

    /// Request a session. Resolves once the device reports it ready.
    async fn acquire(&self, config: &SessionConfig) -> Result<Box<dyn SessionHandle>, DeviceError>;
}

/// A live session obtained from a [`SessionResource`].
#[async_trait]
pub trait SessionHandle: Send + Sync {
    /// Required plus whichever optional features the device granted
    fn granted_features(&self) -> &[String];

    async fn release(&mut self) -> Result<(), DeviceError>;

    /// Register the callback run when the device ends the session itself.
    fn on_end(&mut self, callback: Box<dyn FnOnce() + Send>);
}

/// Opaque handle to a node owned by the rendering layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeHandle(pub u64);

/// What to create under a parent node.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeSpec {
    pub label: String,
    /// Position relative to the parent
    pub position: Vec3,
    pub scale: f32,
    /// 0xRRGGBB
    pub color: u32,
}

impl NodeSpec {
    pub fn new(label: impl Into<String>, position: Vec3) -> Self {
        Self {
            label: label.into(),
            position,
            scale: 1.0,
            color: 0xFFFFFF,
        }
    }

    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_color(mut self, color: u32) -> Self {
        self.color = color;
        self
    }
}

/// Rendering layer. Handles are never inspected by the core.
pub trait Presenter: Send {
    fn create_presentation_root(&mut self) -> NodeHandle;

    fn create_node(&mut self, parent: NodeHandle, spec: &NodeSpec) -> NodeHandle;

    fn dispose(&mut self, node: NodeHandle);
}

/// Per-game settings for a session interface.
#[derive(Debug, Clone, PartialEq)]
pub struct InterfaceConfig {
    pub session: SessionConfig,
    /// Player id used when forwarding interactions to the engine
    pub local_player: String,
    /// World position of the presentation root
    pub root_origin: Vec3,
    pub exit: ExitAffordance,
    /// Passed to `GameEngine::initialize_game` on first activation
    pub game_config: serde_json::Value,
}

impl Default for InterfaceConfig {
    fn default() -> Self {
        Self {
            session: SessionConfig::default(),
            local_player: "local".to_string(),
            root_origin: Vec3::ZERO,
            exit: ExitAffordance::default(),
            game_config: serde_json::Value::Null,
        }
    }
}

/// Injection point through which game factories reach the host's device
/// and rendering layer.
pub trait HostServices: Send + Sync {
    fn session_resource(&self) -> Box<dyn SessionResource>;

    fn presenter(&self) -> Box<dyn Presenter>;

    fn interface_config(&self, game_id: &str) -> InterfaceConfig;
}
