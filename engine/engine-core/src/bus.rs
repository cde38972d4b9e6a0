//! Synchronous observer bus with per-subscriber failure isolation
//!
//! Every engine owns one `EventBus<GameEvent>` and the registry owns one
//! `EventBus<LifecycleEvent>`. `publish` runs each subscriber in
//! subscription order on the caller's thread and returns only after all of
//! them have run.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{trace, warn};

/// Handle returned by [`EventBus::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionToken(pub u64);

/// Subscriber callback. An `Err` is logged and swallowed by the bus.
pub type Subscriber<E> = Arc<dyn Fn(&E) -> anyhow::Result<()> + Send + Sync>;

pub struct EventBus<E> {
    label: String,
    subscribers: Mutex<Vec<(SubscriptionToken, Subscriber<E>)>>,
    next_token: AtomicU64,
}

impl<E> EventBus<E> {
    /// Create an empty bus. `label` only appears in logs.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            subscribers: Mutex::new(Vec::new()),
            next_token: AtomicU64::new(1),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    fn entries(&self) -> MutexGuard<'_, Vec<(SubscriptionToken, Subscriber<E>)>> {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn subscribe<F>(&self, callback: F) -> SubscriptionToken
    where
        F: Fn(&E) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let token = SubscriptionToken(self.next_token.fetch_add(1, Ordering::Relaxed));
        self.entries().push((token, Arc::new(callback)));
        trace!(bus = %self.label, token = token.0, "Subscriber added");
        token
    }

    /// Remove a subscriber. Unknown or already-removed tokens are ignored.
    ///
    /// Returns whether a subscriber was actually removed.
    pub fn unsubscribe(&self, token: SubscriptionToken) -> bool {
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|(t, _)| *t != token);
        let removed = entries.len() != before;
        if removed {
            trace!(bus = %self.label, token = token.0, "Subscriber removed");
        }
        removed
    }

    pub fn is_subscribed(&self, token: SubscriptionToken) -> bool {
        self.entries().iter().any(|(t, _)| *t == token)
    }

    pub fn subscriber_count(&self) -> usize {
        self.entries().len()
    }

    /// Drop every subscriber.
    pub fn clear(&self) {
        self.entries().clear();
    }

    /// Deliver `event` to every current subscriber, in subscription order.
    ///
    /// The subscriber list is snapshotted first, so callbacks may subscribe,
    /// unsubscribe or publish on this bus. A subscriber that returns `Err` or
    /// panics is logged and skipped; the remaining subscribers still run.
    pub fn publish(&self, event: &E) {
        let snapshot: Vec<(SubscriptionToken, Subscriber<E>)> = self
            .entries()
            .iter()
            .map(|(token, callback)| (*token, Arc::clone(callback)))
            .collect();

        for (token, callback) in snapshot {
            match catch_unwind(AssertUnwindSafe(|| callback(event))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!(bus = %self.label, token = token.0, error = %e, "Subscriber failed");
                }
                Err(panic) => {
                    let message = panic
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| panic.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "non-string panic".to_string());
                    warn!(bus = %self.label, token = token.0, panic = %message, "Subscriber panicked");
                }
            }
        }
    }
}

impl<E> fmt::Debug for EventBus<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("label", &self.label)
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
