use super::types::{EventReceiver, EventSender, WorkflowEvent, create_event_channel};

use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// A component reacting to workflow events.
pub trait EventSubscriber: Send + Sync {
    fn name(&self) -> &'static str;

    fn on_event(&self, event: &WorkflowEvent);
}

/// In-process publish/subscribe channel for workflow events.
///
/// Publishing never blocks: events are queued on an unbounded channel and
/// handed to the subscribers, in subscription order, by a single dispatcher
/// task. Events from one publisher are therefore observed in the order they
/// were published.
pub struct EventBus {
    sender: EventSender,
    /// Taken by the dispatcher task on `start`.
    receiver: Mutex<Option<EventReceiver>>,
    subscribers: RwLock<Vec<Arc<dyn EventSubscriber>>>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, receiver) = create_event_channel();
        Self {
            sender,
            receiver: Mutex::new(Some(receiver)),
            subscribers: RwLock::new(Vec::new()),
        }
    }

    pub fn subscribe(&self, subscriber: Arc<dyn EventSubscriber>) {
        tracing::info!("Subscriber {} added to event bus", subscriber.name());
        self.subscribers.write().push(subscriber);
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    pub fn publish(&self, event: WorkflowEvent) {
        tracing::debug!("Publishing {} for domain {}", event.kind(), event.domain());
        if let Err(e) = self.sender.send(event) {
            tracing::warn!("Event dispatcher gone, dropping {}", e.0.kind());
        }
    }

    /// Hands one event to every subscriber on the calling task.
    pub fn deliver(&self, event: &WorkflowEvent) {
        let subscribers: Vec<Arc<dyn EventSubscriber>> = self.subscribers.read().clone();
        for subscriber in subscribers {
            tracing::trace!("Delivering {} to {}", event.kind(), subscriber.name());
            subscriber.on_event(event);
        }
    }

    /// Spawns the dispatcher task.
    ///
    /// Returns `None` when the dispatcher is already running.
    pub fn start(self: Arc<Self>) -> Option<JoinHandle<()>> {
        let mut receiver = self.receiver.lock().take()?;

        tracing::info!("Starting event dispatcher");
        Some(tokio::spawn(async move {
            while let Some(event) = receiver.recv().await {
                self.deliver(&event);
            }
            tracing::info!("Event dispatcher stopped");
        }))
    }

    /// Delivers everything queued so far on the calling task.
    #[cfg(test)]
    pub fn drain(&self) -> usize {
        let mut guard = self.receiver.lock();
        let Some(receiver) = guard.as_mut() else {
            return 0;
        };

        let mut delivered = 0;
        while let Ok(event) = receiver.try_recv() {
            self.deliver(&event);
            delivered += 1;
        }
        delivered
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
