//! Event emission.
//!
//! Engine events are pushed to subscribers as JSON-RPC notifications. Each
//! subscriber has an independent buffer; a subscriber that falls more than
//! the bus capacity behind skips the missed events.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tidal_types::events::{Event, EventType, RewardEvent};
use tidal_types::{PoolId, Timestamp};
use tokio::sync::broadcast;

/// Filter for event subscriptions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventFilter {
    /// Only these event types.
    #[serde(default)]
    pub event_types: Option<Vec<EventType>>,
    /// Only events about these pools. Events without a pool always pass.
    #[serde(default)]
    pub pools: Option<Vec<PoolId>>,
}

/// Event bus for broadcasting events to subscribers.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Event>,
    sequence: Arc<AtomicU64>,
    subscriptions: Arc<AtomicU64>,
}

impl EventBus {
    /// Create a new event bus with the given buffer capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            sequence: Arc::new(AtomicU64::new(0)),
            subscriptions: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Emit an event to all subscribers.
    pub fn emit(&self, event: Event) {
        self.sequence.fetch_add(1, Ordering::SeqCst);
        // Ignore send errors (no subscribers)
        let _ = self.sender.send(event);
    }

    /// Stamp and emit a batch of engine events.
    pub fn publish(&self, events: Vec<RewardEvent>, timestamp: Timestamp) {
        for event in events {
            self.emit(event.into_event(timestamp));
        }
    }

    /// Subscribe to events. Returns a receiver.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }

    /// Allocate a subscription id.
    pub fn next_subscription_id(&self) -> String {
        let id = self.subscriptions.fetch_add(1, Ordering::SeqCst) + 1;
        hex::encode(id.to_be_bytes())
    }

    /// Get the current sequence number.
    pub fn sequence(&self) -> u64 {
        self.sequence.load(Ordering::SeqCst)
    }
}

impl EventFilter {
    /// Check if an event matches this filter.
    pub fn matches(&self, event: &Event) -> bool {
        if let Some(ref types) = self.event_types {
            if !types.contains(&event.event_type) {
                return false;
            }
        }

        if let Some(ref pools) = self.pools {
            if let Some(pool) = event.payload.get("pool").and_then(|v| v.as_str()) {
                if !pools.iter().any(|p| p.to_string() == pool) {
                    return false;
                }
            }
        }

        true
    }
}
