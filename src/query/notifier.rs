//! Injected notification capability.
//!
//! Mutations report their outcome through a [`Notifier`] instead of a global
//! toast facility, so the engine does not depend on how events are shown.

use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::domain::events::NotificationEvent;

pub trait Notifier: Send + Sync {
    fn notify(&self, event: NotificationEvent);
}

/// Publishes events on a broadcast bus. Events sent while nobody listens are dropped.
#[derive(Debug, Clone)]
pub struct BroadcastNotifier {
    event_bus: broadcast::Sender<NotificationEvent>,
}

impl BroadcastNotifier {
    #[must_use]
    pub const fn new(event_bus: broadcast::Sender<NotificationEvent>) -> Self {
        Self { event_bus }
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (event_bus, _) = broadcast::channel(capacity.max(1));
        Self { event_bus }
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<NotificationEvent> {
        self.event_bus.subscribe()
    }
}

impl Notifier for BroadcastNotifier {
    fn notify(&self, event: NotificationEvent) {
        let _ = self.event_bus.send(event);
    }
}

/// Writes events to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, event: NotificationEvent) {
        if event.is_error() {
            warn!(event = ?event, "{}", event.message());
        } else {
            info!(event = ?event, "{}", event.message());
        }
    }
}
