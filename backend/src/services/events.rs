//! Domain event delivery
//!
//! Stock-changing operations write their events to the outbox inside the same
//! unit of work as the change. The [`OutboxDispatcher`] publishes committed
//! events on the in-process [`EventBus`]; delivery to subscribers is
//! best-effort and events of rolled-back work are never seen.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::error::AppResult;
use crate::models::OutboxEvent;
use crate::store::InventoryStore;

const BUS_CAPACITY: usize = 1024;

/// Broadcast channel carrying dispatched domain events
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<OutboxEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(BUS_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<OutboxEvent> {
        self.sender.subscribe()
    }

    /// Publish to current subscribers; returns how many received it
    pub fn publish(&self, event: OutboxEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }
}

/// Polls the outbox and publishes undelivered events
#[derive(Clone)]
pub struct OutboxDispatcher {
    store: Arc<dyn InventoryStore>,
    bus: EventBus,
    batch_size: i64,
    poll_interval: Duration,
}

impl OutboxDispatcher {
    pub fn new(
        store: Arc<dyn InventoryStore>,
        bus: EventBus,
        batch_size: i64,
        poll_interval: Duration,
    ) -> Self {
        Self {
            store,
            bus,
            batch_size,
            poll_interval,
        }
    }

    /// Publish one batch of pending events
    /// Returns the number of events marked dispatched
    pub async fn dispatch_pending(&self) -> AppResult<usize> {
        let pending = self.store.pending_events(self.batch_size).await?;
        let mut dispatched = 0;

        for event in pending {
            let id = event.id;
            let name = event.event;
            let receivers = self.bus.publish(event);
            self.store.mark_event_dispatched(id).await?;
            tracing::debug!("Dispatched {} event {} to {} subscribers", name, id, receivers);
            dispatched += 1;
        }

        Ok(dispatched)
    }

    /// Run the polling loop on the current runtime
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.poll_interval);
            loop {
                interval.tick().await;
                if let Err(e) = self.dispatch_pending().await {
                    tracing::error!("Outbox dispatch failed: {}", e);
                }
            }
        })
    }
}
