//! Session interface: binds one engine to one immersive session
//!
//! `SessionInterface` is the shared plumbing: it acquires and releases
//! the device session, subscribes to the engine's bus, owns the
//! presentation scene, routes interactions and runs teardown in a fixed
//! order. Everything game-specific lives behind [`GamePresentation`].
//!
//! State machine:
//!
//! ```text
//! Idle --initialize--> Acquiring --device ready--> Active
//! Active --end_session / device end / exit--> Ending --> Ended
//! Acquiring --end_session / cancel--> Ending --> Ended
//! Ended --initialize--> Acquiring
//! any --cleanup--> Idle (detached)
//! ```

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;
use tracing::{debug, info, warn};

use crate::bus::{EventBus, SubscriptionToken};
use crate::device::{
    DeviceError, InterfaceConfig, NodeSpec, Presenter, SessionHandle, SessionResource,
};
use crate::engine::{lock_engine, EngineError, EngineState, SharedEngine};
use crate::event::{EndReason, GameEvent, LifecycleEvent, LifecycleKind};
use crate::interaction::{EngineAction, FrameContext, Interaction};
use crate::scene::Scene;

/// Label of the exit button node the interface creates on activation.
pub const EXIT_NODE_LABEL: &str = "exit-button";

const EXIT_NODE_COLOR: u32 = 0xD9_3A_3A;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Idle,
    Acquiring,
    Active,
    Ending,
    Ended,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Acquiring => "acquiring",
            SessionState::Active => "active",
            SessionState::Ending => "ending",
            SessionState::Ended => "ended",
        }
    }

    /// `Idle` and `Ended` are the two rest states.
    pub fn is_rest(&self) -> bool {
        matches!(self, SessionState::Idle | SessionState::Ended)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Cannot {operation} while {from}")]
    InvalidTransition {
        from: SessionState,
        operation: &'static str,
    },
    #[error("Interface has been cleaned up")]
    Detached,
    #[error(transparent)]
    Device(#[from] DeviceError),
    #[error("Session acquisition cancelled")]
    Cancelled,
    #[error("Presentation setup failed: {0}")]
    Presentation(String),
    #[error("Engine initialization failed: {0}")]
    Engine(#[from] EngineError),
}

/// Game-specific presentation hooks.
///
/// Hooks never touch the engine directly: interactions are translated
/// into [`EngineAction`]s that the interface applies, and engine changes
/// arrive through `update_game_visualization`.
pub trait GamePresentation: Send {
    /// Build the game's presentation under a freshly opened scene.
    fn create_game_objects(&mut self, scene: &mut Scene) -> anyhow::Result<()>;

    /// Translate one interaction into engine actions for the local player.
    fn handle_game_interaction(
        &mut self,
        interaction: &Interaction,
        scene: &Scene,
    ) -> Vec<EngineAction>;

    /// Reflect one engine event into the scene.
    fn update_game_visualization(&mut self, event: &GameEvent, scene: &mut Scene);

    /// Per-frame animation. Runs on the render tick and must stay cheap.
    fn on_frame(&mut self, _frame: &FrameContext, _scene: &mut Scene) {}

    /// Forget node handles and game data after the scene was disposed.
    fn release_game_objects(&mut self) {}
}

struct Stage {
    hooks: Box<dyn GamePresentation>,
    scene: Scene,
}

impl Stage {
    fn update_visualization(&mut self, event: &GameEvent) {
        let Stage { hooks, scene } = self;
        hooks.update_game_visualization(event, scene);
    }

    fn dispose(&mut self) {
        self.scene.dispose_all();
        self.hooks.release_game_objects();
    }
}

fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Raised by the device's end callback or by a [`SessionCanceller`].
#[derive(Default)]
struct EndSignal {
    raised: AtomicBool,
    reason: Mutex<Option<EndReason>>,
    notify: Notify,
}

impl EndSignal {
    fn raise(&self, reason: EndReason) {
        lock(&self.reason).get_or_insert(reason);
        self.raised.store(true, Ordering::SeqCst);
        self.notify.notify_one();
    }

    fn is_raised(&self) -> bool {
        self.raised.load(Ordering::SeqCst)
    }

    fn reason(&self) -> Option<EndReason> {
        *lock(&self.reason)
    }

    fn reset(&self) {
        self.raised.store(false, Ordering::SeqCst);
        *lock(&self.reason) = None;
    }

    async fn wait(&self) {
        loop {
            if self.is_raised() {
                return;
            }
            self.notify.notified().await;
        }
    }
}

/// Ends a session from outside the interface.
///
/// While acquiring, this aborts the acquisition and the interface reaches
/// `Ended`. While active, the end is pending until
/// [`SessionInterface::settle_pending_end`] or the next interaction releases
/// the device session.
#[derive(Clone)]
pub struct SessionCanceller {
    signal: Arc<EndSignal>,
}

impl SessionCanceller {
    pub fn cancel(&self) {
        self.signal.raise(EndReason::Cancelled);
    }
}

pub struct SessionInterface {
    game_id: String,
    state: SessionState,
    config: InterfaceConfig,
    engine: Option<SharedEngine>,
    engine_bus: Arc<EventBus<GameEvent>>,
    subscription: Option<SubscriptionToken>,
    stage: Arc<Mutex<Stage>>,
    resource: Box<dyn SessionResource>,
    handle: Option<Box<dyn SessionHandle>>,
    granted_features: Vec<String>,
    end_signal: Arc<EndSignal>,
    lifecycle: Option<Arc<EventBus<LifecycleEvent>>>,
}

impl SessionInterface {
    /// Bind `hooks` to `engine` and subscribe to the engine's events.
    pub fn new(
        engine: SharedEngine,
        hooks: Box<dyn GamePresentation>,
        resource: Box<dyn SessionResource>,
        presenter: Box<dyn Presenter>,
        config: InterfaceConfig,
    ) -> Self {
        let (game_id, engine_bus) = {
            let engine = lock_engine(&engine);
            (engine.game_id().to_string(), engine.bus())
        };
        let mut interface = Self {
            game_id,
            state: SessionState::Idle,
            config,
            engine: Some(engine),
            engine_bus,
            subscription: None,
            stage: Arc::new(Mutex::new(Stage {
                hooks,
                scene: Scene::new(presenter),
            })),
            resource,
            handle: None,
            granted_features: Vec::new(),
            end_signal: Arc::new(EndSignal::default()),
            lifecycle: None,
        };
        interface.subscribe();
        interface
    }

    pub fn game_id(&self) -> &str {
        &self.game_id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == SessionState::Active
    }

    pub fn config(&self) -> &InterfaceConfig {
        &self.config
    }

    /// The bound engine; `None` after `cleanup`.
    pub fn engine(&self) -> Option<&SharedEngine> {
        self.engine.as_ref()
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscription
            .is_some_and(|token| self.engine_bus.is_subscribed(token))
    }

    /// Features granted by the device for the current session.
    pub fn granted_features(&self) -> &[String] {
        &self.granted_features
    }

    pub fn has_feature(&self, feature: &str) -> bool {
        self.granted_features.iter().any(|f| f == feature)
    }

    /// Nodes currently spawned in the scene, root excluded.
    pub fn scene_node_count(&self) -> usize {
        lock(&self.stage).scene.node_count()
    }

    pub fn canceller(&self) -> SessionCanceller {
        SessionCanceller {
            signal: Arc::clone(&self.end_signal),
        }
    }

    /// Route this interface's own notifications to `bus`.
    pub fn attach_lifecycle(&mut self, bus: Arc<EventBus<LifecycleEvent>>) {
        self.lifecycle = Some(bus);
    }

    fn set_state(&mut self, next: SessionState) {
        if self.state != next {
            debug!(game_id = %self.game_id, from = %self.state, to = %next, "Session state changed");
            self.state = next;
        }
    }

    fn subscribe(&mut self) {
        if self.subscription.is_some() {
            return;
        }
        let stage = Arc::downgrade(&self.stage);
        let token = self.engine_bus.subscribe(move |event: &GameEvent| {
            if let Some(stage) = stage.upgrade() {
                lock(&stage).update_visualization(event);
            }
            Ok(())
        });
        self.subscription = Some(token);
    }

    fn unsubscribe(&mut self) {
        if let Some(token) = self.subscription.take() {
            self.engine_bus.unsubscribe(token);
        }
    }

    /// Acquire the device session, build the presentation and start the game.
    ///
    /// Only valid from a rest state. On failure the interface is left in the
    /// rest state it started from.
    pub async fn initialize(&mut self) -> Result<(), SessionError> {
        if !self.state.is_rest() {
            return Err(SessionError::InvalidTransition {
                from: self.state,
                operation: "initialize",
            });
        }
        let Some(engine) = self.engine.clone() else {
            return Err(SessionError::Detached);
        };
        if !self.resource.is_supported() {
            warn!(game_id = %self.game_id, "Immersive session not supported");
            return Err(DeviceError::Unsupported.into());
        }

        let rest_state = self.state;
        let was_subscribed = self.subscription.is_some();
        self.end_signal.reset();
        self.set_state(SessionState::Acquiring);

        let signal = Arc::clone(&self.end_signal);
        let acquired = tokio::select! {
            result = self.resource.acquire(&self.config.session) => Some(result),
            _ = signal.wait() => None,
        };

        let mut handle = match acquired {
            Some(Ok(mut handle)) if self.end_signal.is_raised() => {
                // Cancelled while the device was already answering
                info!(game_id = %self.game_id, "Session acquisition cancelled");
                if let Err(e) = handle.release().await {
                    warn!(game_id = %self.game_id, error = %e, "Failed to release session");
                }
                self.finish_teardown(EndReason::Cancelled);
                return Err(SessionError::Cancelled);
            }
            Some(Ok(handle)) => handle,
            Some(Err(e)) => {
                warn!(game_id = %self.game_id, error = %e, "Session acquisition failed");
                self.set_state(rest_state);
                return Err(e.into());
            }
            None => {
                info!(game_id = %self.game_id, "Session acquisition cancelled");
                self.finish_teardown(EndReason::Cancelled);
                return Err(SessionError::Cancelled);
            }
        };

        let signal = Arc::clone(&self.end_signal);
        handle.on_end(Box::new(move || signal.raise(EndReason::DeviceEnded)));
        self.granted_features = handle.granted_features().to_vec();
        self.subscribe();

        if let Err(e) = self.build_scene() {
            warn!(game_id = %self.game_id, error = %e, "Failed to create game objects");
            self.abort_activation(handle, rest_state, was_subscribed)
                .await;
            return Err(SessionError::Presentation(e.to_string()));
        }

        let started = {
            let mut engine = lock_engine(&engine);
            if engine.state() == EngineState::Initialized {
                engine.initialize_game(&self.config.game_config)
            } else {
                Ok(())
            }
        };
        if let Err(e) = started {
            warn!(game_id = %self.game_id, error = %e, "Engine failed to start");
            self.abort_activation(handle, rest_state, was_subscribed)
                .await;
            return Err(e.into());
        }

        self.handle = Some(handle);
        self.set_state(SessionState::Active);
        info!(
            game_id = %self.game_id,
            features = ?self.granted_features,
            "Session active"
        );
        Ok(())
    }

    fn build_scene(&mut self) -> anyhow::Result<()> {
        let mut stage = lock(&self.stage);
        let Stage { hooks, scene } = &mut *stage;
        scene.open(self.config.root_origin);
        let exit = NodeSpec::new(EXIT_NODE_LABEL, self.config.exit.offset)
            .with_scale(self.config.exit.radius)
            .with_color(EXIT_NODE_COLOR);
        scene.spawn(&exit);
        hooks.create_game_objects(scene)
    }

    async fn abort_activation(
        &mut self,
        mut handle: Box<dyn SessionHandle>,
        rest_state: SessionState,
        was_subscribed: bool,
    ) {
        if let Err(e) = handle.release().await {
            warn!(game_id = %self.game_id, error = %e, "Failed to release session");
        }
        lock(&self.stage).dispose();
        if !was_subscribed {
            self.unsubscribe();
        }
        self.granted_features.clear();
        self.set_state(rest_state);
    }

    /// End the current session. Valid while active or acquiring.
    pub async fn end_session(&mut self) -> Result<(), SessionError> {
        match self.state {
            SessionState::Active | SessionState::Acquiring => {
                self.end_with(EndReason::Requested).await;
                Ok(())
            }
            other => Err(SessionError::InvalidTransition {
                from: other,
                operation: "end_session",
            }),
        }
    }

    async fn end_with(&mut self, reason: EndReason) {
        self.set_state(SessionState::Ending);
        let device_ended = self.end_signal.reason() == Some(EndReason::DeviceEnded);
        if let Some(mut handle) = self.handle.take().filter(|_| !device_ended) {
            if let Err(e) = handle.release().await {
                warn!(game_id = %self.game_id, error = %e, "Failed to release session");
            }
        }
        self.finish_teardown(reason);
    }

    /// Dispose presentation, unsubscribe, mark ended, notify.
    fn finish_teardown(&mut self, reason: EndReason) {
        self.set_state(SessionState::Ending);
        self.handle = None;
        lock(&self.stage).dispose();
        self.unsubscribe();
        self.granted_features.clear();
        self.set_state(SessionState::Ended);
        info!(game_id = %self.game_id, ?reason, "Session ended");

        if let Some(lifecycle) = &self.lifecycle {
            lifecycle.publish(&LifecycleEvent::new(
                LifecycleKind::SessionEnded { reason },
                Some(self.game_id.clone()),
            ));
        }
    }

    /// True while active with an end raised that still needs the device
    /// session released.
    pub fn has_pending_end(&self) -> bool {
        self.state == SessionState::Active && self.end_signal.is_raised()
    }

    /// Finish an end raised from outside while active.
    ///
    /// A device-ended session only needs teardown; a cancelled one is
    /// released first. Returns false when nothing was pending.
    pub async fn settle_pending_end(&mut self) -> bool {
        if !self.has_pending_end() {
            return false;
        }
        match self.end_signal.reason().unwrap_or(EndReason::DeviceEnded) {
            EndReason::DeviceEnded => self.finish_teardown(EndReason::DeviceEnded),
            reason => self.end_with(reason).await,
        }
        true
    }

    /// Per-frame hook, called once per host render tick.
    ///
    /// Never awaits. If the device ended the session since the last tick,
    /// this runs teardown instead of the game's frame hook. A cancel raised
    /// while active skips the frame and stays pending for
    /// [`settle_pending_end`](Self::settle_pending_end).
    pub fn on_frame(&mut self, frame: &FrameContext) {
        if self.state != SessionState::Active {
            return;
        }
        if self.end_signal.is_raised() {
            if self.end_signal.reason() == Some(EndReason::DeviceEnded) {
                // The device has no session left to release
                self.finish_teardown(EndReason::DeviceEnded);
            }
            return;
        }
        let mut stage = lock(&self.stage);
        let Stage { hooks, scene } = &mut *stage;
        hooks.on_frame(frame, scene);
    }

    /// Route one interaction.
    ///
    /// A select hitting the exit button ends the session; anything else is
    /// translated by the game and applied to the engine. Returns whether the
    /// interaction had an effect.
    pub async fn handle_interaction(&mut self, interaction: &Interaction) -> bool {
        if self.state != SessionState::Active {
            debug!(game_id = %self.game_id, state = %self.state, "Interaction ignored");
            return false;
        }
        if self.settle_pending_end().await {
            debug!(game_id = %self.game_id, "Interaction dropped, session already ended");
            return false;
        }

        if let Interaction::Select { ray } = interaction {
            let origin = lock(&self.stage).scene.origin();
            if self.config.exit.is_hit(origin, ray) {
                info!(game_id = %self.game_id, "Exit selected");
                self.end_with(EndReason::ExitSelected).await;
                return true;
            }
        }

        let actions = {
            let mut stage = lock(&self.stage);
            let Stage { hooks, scene } = &mut *stage;
            hooks.handle_game_interaction(interaction, scene)
        };
        self.dispatch(&actions)
    }

    /// Apply one action as the local player.
    ///
    /// Rejected once an end has been raised, even before it is settled.
    pub fn dispatch_action(&self, action: &str, data: &serde_json::Value) -> bool {
        if self.end_signal.is_raised() {
            return false;
        }
        self.dispatch(&[EngineAction::new(action, data.clone())])
    }

    fn dispatch(&self, actions: &[EngineAction]) -> bool {
        let Some(engine) = &self.engine else {
            return false;
        };
        let mut engine = lock_engine(engine);
        let mut accepted = false;
        for action in actions {
            accepted |= engine.process_action(&self.config.local_player, &action.action, &action.data);
        }
        accepted
    }

    /// End any live session, release everything and drop the engine. Idempotent.
    pub async fn cleanup(&mut self) {
        match self.state {
            SessionState::Active | SessionState::Acquiring => {
                self.end_with(EndReason::Requested).await;
            }
            SessionState::Ending => self.finish_teardown(EndReason::Requested),
            SessionState::Idle | SessionState::Ended => {}
        }

        lock(&self.stage).dispose();
        self.unsubscribe();
        self.handle = None;
        if self.engine.take().is_some() {
            debug!(game_id = %self.game_id, "Interface detached from engine");
        }
        self.lifecycle = None;
        self.set_state(SessionState::Idle);
    }
}

impl fmt::Debug for SessionInterface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionInterface")
            .field("game_id", &self.game_id)
            .field("state", &self.state)
            .field("subscription", &self.subscription)
            .field("attached", &self.engine.is_some())
            .field("granted_features", &self.granted_features)
            .finish()
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
