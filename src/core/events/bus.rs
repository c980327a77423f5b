use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;

use super::base::Event;

pub type EventHandler = Arc<dyn Fn(Event) + Send + Sync>;

/// Routes cascade lifecycle events to observers keyed by event type.
/// Handlers run on spawned tasks, so publishing never waits on an observer.
#[derive(Default)]
pub struct EventBus {
    observers: Arc<RwLock<HashMap<String, Vec<EventHandler>>>>,
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, event_type: &str, handler: EventHandler) {
        self.observers
            .write()
            .await
            .entry(event_type.to_string())
            .or_default()
            .push(handler);
        debug!("Observer registered for {}", event_type);
    }

    pub async fn handler_count(&self, event_type: &str) -> usize {
        self.observers
            .read()
            .await
            .get(event_type)
            .map_or(0, Vec::len)
    }

    /// Dispatches `event` to every observer of its type and returns how many
    /// were scheduled.
    pub async fn emit(&self, event: Event) -> usize {
        let observers = self.observers.read().await;
        let Some(targets) = observers.get(&event.event_type) else {
            debug!("{} {} has no observers", event.event_type, event.event_id);
            return 0;
        };

        for handler in targets {
            let handler = Arc::clone(handler);
            let event = event.clone();
            tokio::spawn(async move { handler(event) });
        }
        targets.len()
    }
}
