//! Engine events and observer registration.
//!
//! Callbacks are always invoked outside the sync core lock, so an observer
//! may call back into the engine (for example to read the view model).

use crate::transaction::PurchaseKind;
use crate::SyncError;
use std::sync::{Arc, RwLock};
use streampass_lib::{Plan, SubscriptionStatus};

/// Notifications emitted by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// The visible status changed (tick excluded).
    StatusChanged(SubscriptionStatus),
    /// The countdown reached zero.
    Expired,
    /// A status or plan fetch failed; state was left untouched.
    SyncFailed(SyncError),
    /// A transaction was confirmed with the server's value.
    TransactionConfirmed {
        kind: PurchaseKind,
        plan_id: String,
        status: SubscriptionStatus,
    },
    /// A transaction failed and its snapshot was restored.
    TransactionRolledBack {
        kind: PurchaseKind,
        plan_id: String,
        error: SyncError,
    },
    /// The plan catalog was replaced.
    PlansUpdated(Vec<Plan>),
    /// The engine was torn down.
    Disposed,
}

/// Callback for engine events.
pub type EventCallback = Arc<dyn Fn(&EngineEvent) + Send + Sync>;

/// Registered observers.
#[derive(Default)]
pub struct EventBus {
    callbacks: RwLock<Vec<EventCallback>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback.
    pub fn subscribe(&self, callback: EventCallback) {
        let mut callbacks = self.callbacks.write().unwrap_or_else(|e| e.into_inner());
        callbacks.push(callback);
    }

    /// Deliver an event to every callback.
    pub fn emit(&self, event: &EngineEvent) {
        // Clone the list so a callback may subscribe without deadlocking.
        let callbacks: Vec<EventCallback> = self
            .callbacks
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        for callback in callbacks {
            callback(event);
        }
    }

    /// Deliver a batch of events in order.
    pub fn emit_all(&self, events: impl IntoIterator<Item = EngineEvent>) {
        for event in events {
            self.emit(&event);
        }
    }

    /// Drop every callback.
    pub fn clear(&self) {
        self.callbacks
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    /// Number of registered callbacks.
    pub fn len(&self) -> usize {
        self.callbacks.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("callbacks", &self.len())
            .finish()
    }
}
