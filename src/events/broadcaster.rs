//! Best-effort fan-out of orchestration events.
//!
//! # Design Decisions
//! - Each subscriber owns a bounded channel; the registry keeps the senders
//! - `publish` never awaits: delivery is `try_send` against a snapshot
//! - A closed or full channel counts as a failed delivery and is pruned
//! - Removal is idempotent (explicit unsubscribe may race with pruning)

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::events::OrchestrationEvent;
use crate::observability::metrics;

/// Identifier of a registered subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(Uuid);

impl SubscriberId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Receiving half of a subscription.
///
/// `recv` yields `None` once the broadcaster has dropped this subscriber.
#[derive(Debug)]
pub struct Subscriber {
    id: SubscriberId,
    rx: mpsc::Receiver<Arc<OrchestrationEvent>>,
}

impl Subscriber {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    pub async fn recv(&mut self) -> Option<Arc<OrchestrationEvent>> {
        self.rx.recv().await
    }

    /// Non-blocking receive, used by tests and draining.
    pub fn try_recv(&mut self) -> Option<Arc<OrchestrationEvent>> {
        self.rx.try_recv().ok()
    }
}

/// Registry of event subscribers.
#[derive(Debug)]
pub struct EventBroadcaster {
    subscribers: DashMap<SubscriberId, mpsc::Sender<Arc<OrchestrationEvent>>>,
    buffer: usize,
}

impl EventBroadcaster {
    /// Create a broadcaster whose subscribers buffer up to `buffer` events.
    pub fn new(buffer: usize) -> Self {
        Self {
            subscribers: DashMap::new(),
            buffer: buffer.max(1),
        }
    }

    /// Register a new subscriber.
    pub fn subscribe(&self) -> Subscriber {
        let (tx, rx) = mpsc::channel(self.buffer);
        let id = SubscriberId::new();
        self.subscribers.insert(id, tx);
        metrics::record_subscribers(self.subscribers.len());
        tracing::debug!(subscriber = %id, total = self.subscribers.len(), "Subscriber registered");
        Subscriber { id, rx }
    }

    /// Remove a subscriber. Returns false if it was already gone.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let removed = self.subscribers.remove(&id).is_some();
        if removed {
            metrics::record_subscribers(self.subscribers.len());
            tracing::debug!(subscriber = %id, "Subscriber removed");
        }
        removed
    }

    /// Deliver an event to every current subscriber.
    ///
    /// Returns the number of successful deliveries.
    pub fn publish(&self, event: OrchestrationEvent) -> usize {
        let event = Arc::new(event);

        // Snapshot first so concurrent subscribe/unsubscribe never race the iteration.
        let snapshot: Vec<(SubscriberId, mpsc::Sender<Arc<OrchestrationEvent>>)> = self
            .subscribers
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();

        let mut delivered = 0;
        let mut failed = Vec::new();
        for (id, tx) in snapshot {
            match tx.try_send(event.clone()) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    tracing::debug!(subscriber = %id, error = %e, "Event delivery failed");
                    failed.push(id);
                }
            }
        }

        for id in failed {
            if self.unsubscribe(id) {
                tracing::info!(subscriber = %id, "Pruned unreachable subscriber");
            }
        }

        delivered
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    pub fn contains(&self, id: SubscriberId) -> bool {
        self.subscribers.contains_key(&id)
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new(64)
    }
}
