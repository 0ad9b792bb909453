//! Event channel for brain notifications
//!
//! Handlers are kept per event kind in registration order and are invoked
//! synchronously on the emitting thread. A failing handler is recorded and
//! the remaining handlers still run.

use botbrain_core::{BrainError, BrainEvent, EventHandler, EventKind, SubscriptionId};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

type Handler = Arc<dyn EventHandler>;

/// A handler that returned an error during dispatch
#[derive(Debug)]
pub struct HandlerFailure {
    pub subscription: SubscriptionId,
    pub error: BrainError,
}

/// Outcome of delivering one event
#[derive(Debug, Default)]
pub struct DispatchReport {
    /// Handlers that were invoked
    pub delivered: usize,
    pub failures: Vec<HandlerFailure>,
}

impl DispatchReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Observer registry keyed by event kind
pub struct EventBus {
    handlers: RwLock<HashMap<EventKind, Vec<(SubscriptionId, Handler)>>>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a closure for one event kind
    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: Fn(&BrainEvent) -> botbrain_core::BrainResult<()> + Send + Sync + 'static,
    {
        self.subscribe_handler(kind, Arc::new(handler))
    }

    /// Register a shared handler object for one event kind
    pub fn subscribe_handler(&self, kind: EventKind, handler: Arc<dyn EventHandler>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.handlers
            .write()
            .entry(kind)
            .or_default()
            .push((id, handler));
        debug!("Subscribed {} to {} events", id, kind);
        id
    }

    /// Forward events of one kind into an unbounded channel.
    ///
    /// Once the receiver is dropped every delivery fails; unsubscribe the
    /// returned id when the consumer goes away.
    pub fn subscribe_channel(
        &self,
        kind: EventKind,
    ) -> (SubscriptionId, mpsc::UnboundedReceiver<BrainEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.subscribe(kind, move |event| {
            tx.send(event.clone())
                .map_err(|_| BrainError::Handler("event receiver dropped".into()))
        });
        (id, rx)
    }

    /// Remove a subscription. Returns false if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut handlers = self.handlers.write();
        for list in handlers.values_mut() {
            if let Some(pos) = list.iter().position(|(sub, _)| *sub == id) {
                list.remove(pos);
                debug!("Unsubscribed {}", id);
                return true;
            }
        }
        false
    }

    /// Number of handlers registered for a kind
    pub fn handler_count(&self, kind: EventKind) -> usize {
        self.handlers.read().get(&kind).map_or(0, Vec::len)
    }

    /// Deliver an event to every handler of its kind, in registration order
    pub fn emit(&self, event: &BrainEvent) -> DispatchReport {
        let kind = event.kind();
        // Handlers may subscribe or call back into the brain
        let targets: Vec<(SubscriptionId, Handler)> = self
            .handlers
            .read()
            .get(&kind)
            .cloned()
            .unwrap_or_default();

        let mut report = DispatchReport::default();
        for (id, handler) in targets {
            report.delivered += 1;
            if let Err(error) = handler.handle(event) {
                warn!("Handler {} failed on {} event: {}", id, kind, error);
                report.failures.push(HandlerFailure {
                    subscription: id,
                    error,
                });
            }
        }
        report
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
