use crate::application::ports::event_bus::{
    EventBus, Subscription, SyncEvent, SyncEventHandler, SyncEventKind,
};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::trace;

/// Process-local event bus. Handlers run inline on the publishing task,
/// so they are expected to be cheap; anything slow should hand off to
/// its own channel.
#[derive(Default)]
pub struct InMemoryEventBus {
    handlers: RwLock<HashMap<Subscription, (Option<SyncEventKind>, SyncEventHandler)>>,
}

impl InMemoryEventBus {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EventBus for InMemoryEventBus {
    async fn publish(&self, event: SyncEvent) {
        let handlers = self.handlers.read().await;
        trace!(kind = ?event.kind(), subscribers = handlers.len(), "publishing event");
        for (filter, handler) in handlers.values() {
            match filter {
                Some(kind) if *kind != event.kind() => continue,
                _ => handler(event.clone()),
            }
        }
    }

    async fn subscribe(&self, kind: SyncEventKind, handler: SyncEventHandler) -> Subscription {
        let subscription = Subscription::new();
        self.handlers
            .write()
            .await
            .insert(subscription.clone(), (Some(kind), handler));
        subscription
    }

    async fn subscribe_all(&self, handler: SyncEventHandler) -> Subscription {
        let subscription = Subscription::new();
        self.handlers
            .write()
            .await
            .insert(subscription.clone(), (None, handler));
        subscription
    }

    async fn unsubscribe(&self, subscription: &Subscription) {
        self.handlers.write().await.remove(subscription);
    }

    async fn clear_all(&self) {
        self.handlers.write().await.clear();
    }
}
