//! Game registry: catalog, selection and the single active instance
//!
//! The registry is constructed once by the host and passed by reference to
//! whatever needs it. Collaborators that only need to react (pickers, status
//! displays) subscribe to [`GameRegistry::lifecycle`] instead of holding the
//! registry.
//!
//! Every mutating method takes `&mut self`, so a second create or start can
//! never be issued while one is still awaiting its factory or device.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::bus::EventBus;
use crate::descriptor::{GameDescriptor, GameParts};
use crate::engine::{lock_engine, SharedEngine};
use crate::event::{now_millis, LifecycleEvent, LifecycleKind};
use crate::interaction::{FrameContext, Interaction};
use crate::session::{SessionError, SessionInterface, SessionState};

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Invalid descriptor: {0}")]
    InvalidDescriptor(String),
    #[error("Game already registered: {0}")]
    DuplicateGame(String),
    #[error("Unknown game: {0}")]
    UnknownGame(String),
    #[error("No game selected")]
    NoSelection,
    #[error("Game is not playable: {0}")]
    NotPlayable(String),
    #[error("Factory for {game_id} failed: {message}")]
    FactoryFailed { game_id: String, message: String },
    #[error("Factory for {0} produced no game")]
    FactoryReturnedNothing(String),
    #[error("No active game instance")]
    NoActiveInstance,
    #[error("Session failed to start: {0}")]
    Session(#[from] SessionError),
}

struct RegisteredGame {
    descriptor: Arc<GameDescriptor>,
    /// Unix millis
    registered_at: u64,
}

/// The running game: one engine and the interface bound to it.
#[derive(Debug)]
pub struct GameInstance {
    game_id: String,
    descriptor: Arc<GameDescriptor>,
    engine: SharedEngine,
    interface: SessionInterface,
    created_at: u64,
}

impl GameInstance {
    pub fn game_id(&self) -> &str {
        &self.game_id
    }

    pub fn descriptor(&self) -> &GameDescriptor {
        &self.descriptor
    }

    pub fn engine(&self) -> &SharedEngine {
        &self.engine
    }

    pub fn interface(&self) -> &SessionInterface {
        &self.interface
    }

    pub fn interface_mut(&mut self) -> &mut SessionInterface {
        &mut self.interface
    }

    pub fn created_at(&self) -> u64 {
        self.created_at
    }
}

pub struct GameRegistry {
    games: Vec<RegisteredGame>,
    selected: Option<String>,
    active: Option<GameInstance>,
    lifecycle: Arc<EventBus<LifecycleEvent>>,
}

impl GameRegistry {
    pub fn new() -> Self {
        Self::with_lifecycle(Arc::new(EventBus::new("lifecycle")))
    }

    /// Publish lifecycle notifications on an existing bus.
    pub fn with_lifecycle(lifecycle: Arc<EventBus<LifecycleEvent>>) -> Self {
        Self {
            games: Vec::new(),
            selected: None,
            active: None,
            lifecycle,
        }
    }

    pub fn lifecycle(&self) -> Arc<EventBus<LifecycleEvent>> {
        Arc::clone(&self.lifecycle)
    }

    fn notify(&self, kind: LifecycleKind, game_id: Option<&str>) {
        self.lifecycle
            .publish(&LifecycleEvent::new(kind, game_id.map(str::to_string)));
    }

    // Catalog

    /// Add a descriptor. Ids must be unique; the first registration wins.
    pub fn register_game(&mut self, descriptor: GameDescriptor) -> Result<(), RegistryError> {
        if descriptor.id.trim().is_empty() {
            return Err(RegistryError::InvalidDescriptor("missing id".to_string()));
        }
        if descriptor.name.trim().is_empty() {
            return Err(RegistryError::InvalidDescriptor(format!(
                "missing name for {}",
                descriptor.id
            )));
        }
        if self.is_registered(&descriptor.id) {
            warn!(game_id = %descriptor.id, "Rejected duplicate game registration");
            return Err(RegistryError::DuplicateGame(descriptor.id));
        }
        info!(
            game_id = %descriptor.id,
            playable = descriptor.can_create(),
            "Game registered"
        );
        self.games.push(RegisteredGame {
            descriptor: Arc::new(descriptor),
            registered_at: now_millis(),
        });
        Ok(())
    }

    fn entry(&self, game_id: &str) -> Option<&RegisteredGame> {
        self.games.iter().find(|g| g.descriptor.id == game_id)
    }

    /// Descriptors in registration order.
    pub fn list_games(&self) -> Vec<&GameDescriptor> {
        self.games.iter().map(|g| g.descriptor.as_ref()).collect()
    }

    pub fn get_game(&self, game_id: &str) -> Option<&GameDescriptor> {
        self.entry(game_id).map(|g| g.descriptor.as_ref())
    }

    pub fn is_registered(&self, game_id: &str) -> bool {
        self.entry(game_id).is_some()
    }

    pub fn registered_at(&self, game_id: &str) -> Option<u64> {
        self.entry(game_id).map(|g| g.registered_at)
    }

    // Selection

    pub fn select_game(&mut self, game_id: &str) -> Result<(), RegistryError> {
        if !self.is_registered(game_id) {
            debug!(game_id, "Cannot select unknown game");
            return Err(RegistryError::UnknownGame(game_id.to_string()));
        }
        let previous = self.selected.replace(game_id.to_string());
        info!(game_id, ?previous, "Game selected");
        self.notify(LifecycleKind::GameSelected { previous }, Some(game_id));
        Ok(())
    }

    pub fn selected_game_id(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn selected_game(&self) -> Option<&GameDescriptor> {
        self.selected.as_deref().and_then(|id| self.get_game(id))
    }

    // Active instance

    pub fn active_instance(&self) -> Option<&GameInstance> {
        self.active.as_ref()
    }

    pub fn active_instance_mut(&mut self) -> Option<&mut GameInstance> {
        self.active.as_mut()
    }

    pub fn has_active_instance(&self) -> bool {
        self.active.is_some()
    }

    /// Build a new instance of `game_id`, or of the selected game.
    ///
    /// Any existing instance is fully cleaned up before the factory runs.
    /// On failure no instance is active.
    pub async fn create_game_instance(
        &mut self,
        game_id: Option<&str>,
    ) -> Result<&mut GameInstance, RegistryError> {
        let game_id = match game_id {
            Some(id) => id.to_string(),
            None => self.selected.clone().ok_or(RegistryError::NoSelection)?,
        };
        let descriptor = self
            .entry(&game_id)
            .map(|g| Arc::clone(&g.descriptor))
            .ok_or_else(|| RegistryError::UnknownGame(game_id.clone()))?;
        let factory = match descriptor.factory() {
            Some(factory) if descriptor.is_playable => Arc::clone(factory),
            _ => {
                debug!(game_id = %game_id, "Game is not playable");
                return Err(RegistryError::NotPlayable(game_id));
            }
        };

        self.cleanup_active_game().await;

        let parts = match factory.create(&descriptor).await {
            Ok(Some(parts)) => parts,
            Ok(None) => {
                warn!(game_id = %game_id, "Game factory returned nothing");
                return Err(RegistryError::FactoryReturnedNothing(game_id));
            }
            Err(e) => {
                warn!(game_id = %game_id, error = %e, "Game factory failed");
                return Err(RegistryError::FactoryFailed {
                    game_id,
                    message: format!("{e:#}"),
                });
            }
        };
        let GameParts {
            engine,
            mut interface,
        } = parts;
        let bound = interface
            .engine()
            .is_some_and(|bound| Arc::ptr_eq(bound, &engine));
        if !bound {
            warn!(game_id = %game_id, "Factory returned an interface bound to another engine");
            return Err(RegistryError::FactoryFailed {
                game_id,
                message: "interface is not bound to the returned engine".to_string(),
            });
        }

        interface.attach_lifecycle(Arc::clone(&self.lifecycle));
        let instance = self.active.insert(GameInstance {
            game_id: game_id.clone(),
            descriptor,
            engine,
            interface,
            created_at: now_millis(),
        });
        info!(game_id = %game_id, "Game instance created");
        self.lifecycle.publish(&LifecycleEvent::new(
            LifecycleKind::GameInstanceCreated,
            Some(game_id),
        ));
        Ok(instance)
    }

    /// Start the active instance's session.
    ///
    /// On failure the instance stays in place for a retry.
    pub async fn start_active_game_session(&mut self) -> Result<(), RegistryError> {
        let instance = self
            .active
            .as_mut()
            .ok_or(RegistryError::NoActiveInstance)?;
        if let Err(e) = instance.interface.initialize().await {
            warn!(game_id = %instance.game_id, error = %e, "Session failed to start");
            return Err(e.into());
        }
        let game_id = instance.game_id.clone();
        info!(game_id = %game_id, "Game session started");
        self.notify(LifecycleKind::GameSessionStarted, Some(&game_id));
        Ok(())
    }

    /// End the active instance's session. No-op without an instance.
    ///
    /// The instance stays in place with its interface `Ended`.
    pub async fn end_active_game_session(&mut self) -> bool {
        let Some(instance) = self.active.as_mut() else {
            return false;
        };
        if let Err(e) = instance.interface.end_session().await {
            debug!(game_id = %instance.game_id, error = %e, "No session to end");
            return false;
        }
        let game_id = instance.game_id.clone();
        self.notify(LifecycleKind::GameSessionEnded, Some(&game_id));
        true
    }

    /// Tear the active instance down: end its session if still live, clean
    /// the interface, then the engine, then free the slot.
    ///
    /// Returns false when there was nothing to clean up.
    pub async fn cleanup_active_game(&mut self) -> bool {
        let Some(mut instance) = self.active.take() else {
            return false;
        };
        let game_id = instance.game_id.clone();

        if matches!(
            instance.interface.state(),
            SessionState::Active | SessionState::Acquiring
        ) && instance.interface.end_session().await.is_ok()
        {
            self.notify(LifecycleKind::GameSessionEnded, Some(&game_id));
        }
        instance.interface.cleanup().await;
        lock_engine(&instance.engine).cleanup();
        drop(instance);

        info!(game_id = %game_id, "Game instance cleaned up");
        self.notify(LifecycleKind::GameInstanceCleaned, Some(&game_id));
        true
    }

    // Host loop

    /// Forward a render tick to the active interface, then finish any end
    /// raised from outside it since the last tick.
    pub async fn on_frame(&mut self, frame: &FrameContext) {
        let Some(instance) = self.active.as_mut() else {
            return;
        };
        let was_active = instance.interface.is_active();
        instance.interface.on_frame(frame);
        instance.interface.settle_pending_end().await;
        if was_active && instance.interface.state() == SessionState::Ended {
            let game_id = instance.game_id.clone();
            self.notify(LifecycleKind::GameSessionEnded, Some(&game_id));
        }
    }

    /// Forward one interaction to the active interface.
    pub async fn handle_interaction(&mut self, interaction: &Interaction) -> bool {
        let Some(instance) = self.active.as_mut() else {
            return false;
        };
        let was_active = instance.interface.is_active();
        let handled = instance.interface.handle_interaction(interaction).await;
        if was_active && instance.interface.state() == SessionState::Ended {
            let game_id = instance.game_id.clone();
            self.notify(LifecycleKind::GameSessionEnded, Some(&game_id));
        }
        handled
    }
}

impl Default for GameRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for GameRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameRegistry")
            .field("games", &self.games.len())
            .field("selected", &self.selected)
            .field("active", &self.active.as_ref().map(|i| &i.game_id))
            .finish()
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
