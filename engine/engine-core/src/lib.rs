//! Core traits and types for Playdeck game plugins
//!
//! This crate provides the lifecycle plumbing every immersive game shares:
//! - `EventBus`: Synchronous observer bus with failure isolation
//! - `GameEngine`: Trait for game logic, with roster/state/cleanup scaffolding
//! - `SessionInterface`: Binds an engine to a device session and a scene
//! - `GamePresentation`: The game-specific hooks a session interface drives
//! - `GameRegistry`: Catalog, selection and the single active instance
//! - `headless`: In-process device and renderer for hosts and tests

pub mod bus;
pub mod descriptor;
pub mod device;
pub mod engine;
pub mod event;
pub mod headless;
pub mod interaction;
pub mod registry;
pub mod scene;
pub mod session;
pub mod snapshot;

// Re-export main types for convenience
pub use bus::{EventBus, SubscriptionToken};
pub use descriptor::{
    factory_fn, DescriptorSummary, Difficulty, GameDescriptor, GameFactory, GameParts, PlayerRange,
};
pub use device::{
    DeviceError, HostServices, InterfaceConfig, NodeHandle, NodeSpec, Presenter, SessionConfig,
    SessionHandle, SessionResource,
};
pub use engine::{
    lock_engine, share_engine, ActionRejected, EngineCore, EngineError, EngineState,
    GameEndResult, GameEngine, Player, SharedEngine,
};
pub use event::{now_millis, EndReason, EventName, GameEvent, LifecycleEvent, LifecycleKind};
pub use interaction::{EngineAction, ExitAffordance, FrameContext, Interaction, Ray};
pub use registry::{GameInstance, GameRegistry, RegistryError};
pub use scene::Scene;
pub use session::{
    GamePresentation, SessionCanceller, SessionError, SessionInterface, SessionState,
    EXIT_NODE_LABEL,
};
pub use snapshot::{GameSnapshot, SnapshotError, SNAPSHOT_SCHEMA_VERSION};

/// Test utilities (internal use only)
#[cfg(test)]
pub(crate) mod test_utils;
