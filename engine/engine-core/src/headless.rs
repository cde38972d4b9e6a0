//! In-process device and rendering layer
//!
//! Used by the host binary when no real headset is attached, and by tests
//! to script device behaviour: denial, missing features, slow acquisition
//! and sessions ended by the device itself.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use glam::Vec3;
use serde_json::Value;
use tracing::{debug, trace};

use crate::device::{
    DeviceError, HostServices, InterfaceConfig, NodeHandle, NodeSpec, Presenter, SessionConfig,
    SessionHandle, SessionResource,
};

fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

type EndCallback = Box<dyn FnOnce() + Send>;

struct DeviceInner {
    supported: AtomicBool,
    denial: Mutex<Option<String>>,
    features: Mutex<Vec<String>>,
    acquire_delay: Mutex<Option<Duration>>,
    acquired: AtomicUsize,
    released: AtomicUsize,
    session_live: AtomicBool,
    end_callback: Mutex<Option<EndCallback>>,
}

/// Scriptable session source. Clones share one device.
#[derive(Clone)]
pub struct HeadlessDevice {
    inner: Arc<DeviceInner>,
}

impl HeadlessDevice {
    /// A supported device offering `features`.
    pub fn new<I, S>(features: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            inner: Arc::new(DeviceInner {
                supported: AtomicBool::new(true),
                denial: Mutex::new(None),
                features: Mutex::new(features.into_iter().map(Into::into).collect()),
                acquire_delay: Mutex::new(None),
                acquired: AtomicUsize::new(0),
                released: AtomicUsize::new(0),
                session_live: AtomicBool::new(false),
                end_callback: Mutex::new(None),
            }),
        }
    }

    pub fn unsupported() -> Self {
        let device = Self::new(std::iter::empty::<String>());
        device.set_supported(false);
        device
    }

    pub fn set_supported(&self, supported: bool) {
        self.inner.supported.store(supported, Ordering::SeqCst);
    }

    /// Make every following acquisition fail with `reason`.
    pub fn deny(&self, reason: impl Into<String>) {
        *lock(&self.inner.denial) = Some(reason.into());
    }

    pub fn allow(&self) {
        *lock(&self.inner.denial) = None;
    }

    pub fn set_features<I, S>(&self, features: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        *lock(&self.inner.features) = features.into_iter().map(Into::into).collect();
    }

    /// Hold every acquisition for `delay` before answering.
    pub fn set_acquire_delay(&self, delay: Option<Duration>) {
        *lock(&self.inner.acquire_delay) = delay;
    }

    pub fn acquire_count(&self) -> usize {
        self.inner.acquired.load(Ordering::SeqCst)
    }

    pub fn release_count(&self) -> usize {
        self.inner.released.load(Ordering::SeqCst)
    }

    pub fn is_session_live(&self) -> bool {
        self.inner.session_live.load(Ordering::SeqCst)
    }

    /// End the live session from the device side, as a headset removal would.
    ///
    /// Returns false when no session registered an end callback.
    pub fn end_remote_session(&self) -> bool {
        let callback = lock(&self.inner.end_callback).take();
        match callback {
            Some(callback) => {
                self.inner.session_live.store(false, Ordering::SeqCst);
                debug!("Device ended the session");
                callback();
                true
            }
            None => false,
        }
    }

    fn grant(&self, config: &SessionConfig) -> Result<Vec<String>, DeviceError> {
        let available = lock(&self.inner.features);
        if let Some(missing) = config
            .required_features
            .iter()
            .find(|f| !available.contains(f))
        {
            return Err(DeviceError::MissingFeature(missing.clone()));
        }
        let mut granted = config.required_features.clone();
        granted.extend(
            config
                .optional_features
                .iter()
                .filter(|f| available.contains(f))
                .cloned(),
        );
        Ok(granted)
    }
}

impl Default for HeadlessDevice {
    fn default() -> Self {
        Self::new(["local-floor", "hit-test"])
    }
}

#[async_trait]
impl SessionResource for HeadlessDevice {
    fn is_supported(&self) -> bool {
        self.inner.supported.load(Ordering::SeqCst)
    }

    async fn acquire(&self, config: &SessionConfig) -> Result<Box<dyn SessionHandle>, DeviceError> {
        if !self.is_supported() {
            return Err(DeviceError::Unsupported);
        }
        let delay = *lock(&self.inner.acquire_delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let denial = lock(&self.inner.denial).clone();
        if let Some(reason) = denial {
            return Err(DeviceError::Denied(reason));
        }

        let granted = self.grant(config)?;
        self.inner.acquired.fetch_add(1, Ordering::SeqCst);
        self.inner.session_live.store(true, Ordering::SeqCst);
        debug!(features = ?granted, "Headless session acquired");
        Ok(Box::new(HeadlessSession {
            device: self.clone(),
            granted,
            released: false,
        }))
    }
}

struct HeadlessSession {
    device: HeadlessDevice,
    granted: Vec<String>,
    released: bool,
}

#[async_trait]
impl SessionHandle for HeadlessSession {
    fn granted_features(&self) -> &[String] {
        &self.granted
    }

    async fn release(&mut self) -> Result<(), DeviceError> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        let inner = &self.device.inner;
        inner.released.fetch_add(1, Ordering::SeqCst);
        inner.session_live.store(false, Ordering::SeqCst);
        // A released session can no longer be ended by the device.
        lock(&inner.end_callback).take();
        debug!("Headless session released");
        Ok(())
    }

    fn on_end(&mut self, callback: Box<dyn FnOnce() + Send>) {
        *lock(&self.device.inner.end_callback) = Some(callback);
    }
}

/// A node as recorded by [`HeadlessPresenter`].
#[derive(Debug, Clone, PartialEq)]
pub struct NodeRecord {
    pub label: String,
    pub parent: Option<NodeHandle>,
    pub position: Vec3,
    pub color: u32,
}

#[derive(Default)]
struct SceneLedger {
    next_id: u64,
    live: BTreeMap<NodeHandle, NodeRecord>,
    disposed: usize,
}

/// Rendering layer that only keeps a ledger. Clones share the ledger.
#[derive(Clone, Default)]
pub struct HeadlessPresenter {
    ledger: Arc<Mutex<SceneLedger>>,
}

impl HeadlessPresenter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn live_nodes(&self) -> usize {
        lock(&self.ledger).live.len()
    }

    pub fn disposed_nodes(&self) -> usize {
        lock(&self.ledger).disposed
    }

    /// Labels of live nodes in creation order.
    pub fn labels(&self) -> Vec<String> {
        lock(&self.ledger)
            .live
            .values()
            .map(|record| record.label.clone())
            .collect()
    }

    pub fn count_labelled(&self, prefix: &str) -> usize {
        lock(&self.ledger)
            .live
            .values()
            .filter(|record| record.label.starts_with(prefix))
            .count()
    }

    pub fn node(&self, node: NodeHandle) -> Option<NodeRecord> {
        lock(&self.ledger).live.get(&node).cloned()
    }

    fn record(&self, record: NodeRecord) -> NodeHandle {
        let mut ledger = lock(&self.ledger);
        ledger.next_id += 1;
        let node = NodeHandle(ledger.next_id);
        trace!(node = node.0, label = %record.label, "Node created");
        ledger.live.insert(node, record);
        node
    }
}

impl Presenter for HeadlessPresenter {
    fn create_presentation_root(&mut self) -> NodeHandle {
        self.record(NodeRecord {
            label: "root".to_string(),
            parent: None,
            position: Vec3::ZERO,
            color: 0,
        })
    }

    fn create_node(&mut self, parent: NodeHandle, spec: &NodeSpec) -> NodeHandle {
        self.record(NodeRecord {
            label: spec.label.clone(),
            parent: Some(parent),
            position: spec.position,
            color: spec.color,
        })
    }

    fn dispose(&mut self, node: NodeHandle) {
        let mut ledger = lock(&self.ledger);
        if ledger.live.remove(&node).is_some() {
            ledger.disposed += 1;
        } else {
            trace!(node = node.0, "Dispose of unknown node ignored");
        }
    }
}

/// [`HostServices`] backed by one headless device and presenter.
#[derive(Clone, Default)]
pub struct HeadlessServices {
    device: HeadlessDevice,
    presenter: HeadlessPresenter,
    config: InterfaceConfig,
    game_configs: HashMap<String, Value>,
}

impl HeadlessServices {
    pub fn new(device: HeadlessDevice, presenter: HeadlessPresenter, config: InterfaceConfig) -> Self {
        Self {
            device,
            presenter,
            config,
            game_configs: HashMap::new(),
        }
    }

    /// Per-game value for `InterfaceConfig::game_config`.
    pub fn with_game_config(mut self, game_id: impl Into<String>, config: Value) -> Self {
        self.game_configs.insert(game_id.into(), config);
        self
    }

    pub fn device(&self) -> &HeadlessDevice {
        &self.device
    }

    /// The shared ledger behind every presenter handed out.
    pub fn ledger(&self) -> &HeadlessPresenter {
        &self.presenter
    }
}

impl HostServices for HeadlessServices {
    fn session_resource(&self) -> Box<dyn SessionResource> {
        Box::new(self.device.clone())
    }

    fn presenter(&self) -> Box<dyn Presenter> {
        Box::new(self.presenter.clone())
    }

    fn interface_config(&self, game_id: &str) -> InterfaceConfig {
        let mut config = self.config.clone();
        if let Some(game_config) = self.game_configs.get(game_id) {
            config.game_config = game_config.clone();
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(required: &[&str], optional: &[&str]) -> SessionConfig {
        SessionConfig {
            required_features: required.iter().map(|s| s.to_string()).collect(),
            optional_features: optional.iter().map(|s| s.to_string()).collect(),
            overlay_target: None,
        }
    }

    #[tokio::test]
    async fn test_acquire_grants_required_and_available_optional() {
        let device = HeadlessDevice::new(["local-floor", "hit-test"]);
        let handle = device
            .acquire(&config(&["local-floor"], &["hit-test", "dom-overlay"]))
            .await
            .unwrap();

        assert_eq!(handle.granted_features(), ["local-floor", "hit-test"]);
        assert_eq!(device.acquire_count(), 1);
        assert!(device.is_session_live());
    }

    #[tokio::test]
    async fn test_acquire_fails_on_missing_required_feature() {
        let device = HeadlessDevice::new(["hit-test"]);
        let err = device
            .acquire(&config(&["local-floor"], &[]))
            .await
            .err()
            .unwrap();
        assert_eq!(err, DeviceError::MissingFeature("local-floor".into()));
        assert_eq!(device.acquire_count(), 0);
    }

    #[tokio::test]
    async fn test_denied_and_unsupported() {
        let device = HeadlessDevice::default();
        device.deny("user declined");
        let err = device.acquire(&config(&[], &[])).await.err().unwrap();
        assert_eq!(err, DeviceError::Denied("user declined".into()));

        let device = HeadlessDevice::unsupported();
        assert!(!device.is_supported());
        let err = device.acquire(&config(&[], &[])).await.err().unwrap();
        assert_eq!(err, DeviceError::Unsupported);
    }

    #[tokio::test]
    async fn test_release_is_idempotent_and_drops_end_callback() {
        let device = HeadlessDevice::default();
        let mut handle = device.acquire(&config(&[], &[])).await.unwrap();
        handle.on_end(Box::new(|| {}));

        handle.release().await.unwrap();
        handle.release().await.unwrap();

        assert_eq!(device.release_count(), 1);
        assert!(!device.is_session_live());
        assert!(!device.end_remote_session());
    }

    #[tokio::test]
    async fn test_end_remote_session_fires_callback_once() {
        let device = HeadlessDevice::default();
        let mut handle = device.acquire(&config(&[], &[])).await.unwrap();
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        handle.on_end(Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        assert!(device.end_remote_session());
        assert!(!device.end_remote_session());
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_presenter_ledger_is_shared_between_clones() {
        let presenter = HeadlessPresenter::new();
        let mut renderer: Box<dyn Presenter> = Box::new(presenter.clone());
        let root = renderer.create_presentation_root();
        let node = renderer.create_node(root, &NodeSpec::new("ring-1", Vec3::X));

        assert_eq!(presenter.labels(), ["root", "ring-1"]);
        assert_eq!(presenter.node(node).unwrap().parent, Some(root));

        renderer.dispose(node);
        renderer.dispose(node);
        assert_eq!(presenter.live_nodes(), 1);
        assert_eq!(presenter.disposed_nodes(), 1);
    }

    #[test]
    fn test_services_apply_game_config() {
        let services = HeadlessServices::default()
            .with_game_config("placement", serde_json::json!({ "maxObjects": 3 }));
        assert_eq!(
            services.interface_config("placement").game_config,
            serde_json::json!({ "maxObjects": 3 })
        );
        assert_eq!(services.interface_config("other").game_config, Value::Null);
    }
}
