use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, PoisonError, RwLock},
};

use tracing::{debug, warn};
use uuid::Uuid;
use webotp_core::RawNotification;

/// Identifier of one hub registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Receiving end of a hub registration.
pub trait NotificationSink: Send + Sync {
    fn deliver(&self, notification: RawNotification);
}

/// Platform notification registry.
///
/// Registration is assumed to always succeed.
pub trait NotificationHub: Send + Sync {
    fn register(&self, action: &str, sink: Arc<dyn NotificationSink>) -> SubscriptionId;

    fn unregister(&self, id: SubscriptionId);
}

struct Registration {
    action: String,
    sink: Arc<dyn NotificationSink>,
}

#[derive(Default)]
struct HubState {
    subscriptions: HashMap<SubscriptionId, Registration>,
    registrations: usize,
    unregistrations: usize,
}

/// In-process hub delivering notifications to sinks registered for their action.
#[derive(Clone, Default)]
pub struct LocalNotificationHub {
    state: Arc<RwLock<HubState>>,
}

impl LocalNotificationHub {
    /// Deliver `notification` to every sink registered for its action.
    /// Returns the number of sinks reached.
    pub fn broadcast(&self, notification: RawNotification) -> usize {
        let sinks: Vec<_> = self
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .subscriptions
            .values()
            .filter(|registration| registration.action == notification.action)
            .map(|registration| Arc::clone(&registration.sink))
            .collect();

        for sink in &sinks {
            sink.deliver(notification.clone());
        }
        debug!(action = %notification.action, sinks = sinks.len(), "notification broadcast");
        sinks.len()
    }

    pub fn active_subscriptions(&self) -> usize {
        self.read(|state| state.subscriptions.len())
    }

    /// Total successful `register` calls.
    pub fn registrations(&self) -> usize {
        self.read(|state| state.registrations)
    }

    /// Total `unregister` calls that removed a registration.
    pub fn unregistrations(&self) -> usize {
        self.read(|state| state.unregistrations)
    }

    fn read<T>(&self, f: impl FnOnce(&HubState) -> T) -> T {
        f(&self.state.read().unwrap_or_else(PoisonError::into_inner))
    }
}

impl NotificationHub for LocalNotificationHub {
    fn register(&self, action: &str, sink: Arc<dyn NotificationSink>) -> SubscriptionId {
        let id = SubscriptionId::new();
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.subscriptions.insert(
            id,
            Registration {
                action: action.to_owned(),
                sink,
            },
        );
        state.registrations += 1;
        debug!(%id, action, "notification sink registered");
        id
    }

    fn unregister(&self, id: SubscriptionId) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if state.subscriptions.remove(&id).is_some() {
            state.unregistrations += 1;
            debug!(%id, "notification sink unregistered");
        } else {
            warn!(%id, "unregister for unknown subscription");
        }
    }
}
