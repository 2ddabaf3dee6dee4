//! Registry change events.
//!
//! The registry publishes a `RegistryEvent` on an in-process broadcast
//! channel whenever an agent is registered, removed, or changes status.
//! [`feed`] turns those events into live agent snapshots for observers.

pub mod feed;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::models::agent::AgentStatus;

pub use feed::{AgentFeed, AgentSnapshot, Broadcaster};

const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RegistryEvent {
    #[serde(rename_all = "camelCase")]
    Registered {
        agent_id: String,
        slug: String,
        at: DateTime<Utc>,
    },
    #[serde(rename_all = "camelCase")]
    StatusChanged {
        agent_id: String,
        slug: String,
        previous: AgentStatus,
        current: AgentStatus,
        at: DateTime<Utc>,
    },
    #[serde(rename_all = "camelCase")]
    Removed {
        agent_id: String,
        slug: String,
        at: DateTime<Utc>,
    },
}

impl RegistryEvent {
    pub fn agent_id(&self) -> &str {
        match self {
            Self::Registered { agent_id, .. }
            | Self::StatusChanged { agent_id, .. }
            | Self::Removed { agent_id, .. } => agent_id,
        }
    }
}

/// Fan-out of registry events to every live subscriber.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<RegistryEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish an event. Returns how many subscribers received it.
    pub fn emit(&self, event: RegistryEvent) -> usize {
        // No subscribers is not an error: nobody is watching right now.
        self.tx.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RegistryEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_emit_without_subscribers_is_silent() {
        let bus = EventBus::new();
        let delivered = bus.emit(RegistryEvent::Removed {
            agent_id: "a1".to_string(),
            slug: "translator".to_string(),
            at: Utc::now(),
        });
        assert_eq!(delivered, 0);
    }

    #[tokio::test]
    async fn test_dropped_receiver_is_pruned() {
        let bus = EventBus::new();
        let rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        drop(rx1);
        assert_eq!(bus.subscriber_count(), 1);

        bus.emit(RegistryEvent::Registered {
            agent_id: "a1".to_string(),
            slug: "translator".to_string(),
            at: Utc::now(),
        });
        let event = rx2.recv().await.unwrap();
        assert_eq!(event.agent_id(), "a1");
    }

    #[test]
    fn test_status_changed_serializes_tagged() {
        let event = RegistryEvent::StatusChanged {
            agent_id: "a1".to_string(),
            slug: "translator".to_string(),
            previous: AgentStatus::Pending,
            current: AgentStatus::Ready,
            at: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "statusChanged");
        assert_eq!(json["agentId"], "a1");
        assert_eq!(json["current"], "READY");
    }
}
