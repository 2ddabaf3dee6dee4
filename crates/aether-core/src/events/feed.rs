//! Live agent feed for dashboards.
//!
//! Every subscriber first receives the full agent list, then a fresh full
//! list after each registry event. Snapshots are re-read from the registry,
//! so a subscriber that lagged behind simply gets the current state.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast::{self, error::RecvError};

use super::RegistryEvent;
use crate::error::ServerError;
use crate::models::agent::Agent;
use crate::registry::AgentRegistry;

/// The full agent list at a point in time.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentSnapshot {
    pub agents: Vec<Agent>,
    /// The event that triggered this snapshot; `None` for the initial one
    /// or after a resync.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<RegistryEvent>,
    pub at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct Broadcaster {
    registry: AgentRegistry,
}

impl Broadcaster {
    pub fn new(registry: AgentRegistry) -> Self {
        Self { registry }
    }

    /// Open a new feed. The receiver is attached before the initial
    /// snapshot is read, so no change can fall between the two.
    pub fn subscribe(&self) -> AgentFeed {
        AgentFeed {
            registry: self.registry.clone(),
            rx: self.registry.events().subscribe(),
            primed: false,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.registry.events().subscriber_count()
    }
}

/// One subscriber's view of the registry. Dropping it unsubscribes.
pub struct AgentFeed {
    registry: AgentRegistry,
    rx: broadcast::Receiver<RegistryEvent>,
    primed: bool,
}

impl AgentFeed {
    /// Wait for the next snapshot. `Ok(None)` means the registry is gone.
    pub async fn next(&mut self) -> Result<Option<AgentSnapshot>, ServerError> {
        if !self.primed {
            self.primed = true;
            return self.snapshot(None).await.map(Some);
        }

        match self.rx.recv().await {
            Ok(event) => self.snapshot(Some(event)).await.map(Some),
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!("[Feed] Subscriber lagged by {} events, resyncing", skipped);
                self.snapshot(None).await.map(Some)
            }
            Err(RecvError::Closed) => Ok(None),
        }
    }

    /// Turn the feed into a stream; it ends when the registry goes away
    /// or a snapshot cannot be read.
    pub fn into_stream(self) -> impl tokio_stream::Stream<Item = AgentSnapshot> + Send {
        let mut feed = self;
        async_stream::stream! {
            loop {
                match feed.next().await {
                    Ok(Some(snapshot)) => yield snapshot,
                    Ok(None) => break,
                    Err(e) => {
                        tracing::error!("[Feed] Failed to read agent snapshot: {}", e);
                        break;
                    }
                }
            }
        }
    }

    async fn snapshot(&self, cause: Option<RegistryEvent>) -> Result<AgentSnapshot, ServerError> {
        Ok(AgentSnapshot {
            agents: self.registry.list().await?,
            cause,
            at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::events::EventBus;
    use crate::models::agent::{AgentStatus, NewAgent};
    use crate::store::AgentStore;
    use std::time::Duration;

    async fn setup() -> (AgentRegistry, Broadcaster) {
        setup_with_bus(EventBus::new()).await
    }

    async fn setup_with_bus(bus: EventBus) -> (AgentRegistry, Broadcaster) {
        let db = Database::open_in_memory().unwrap();
        let registry = AgentRegistry::new(AgentStore::new(db), bus);
        for slug in ["summarizer", "translator"] {
            registry
                .register(NewAgent {
                    slug: slug.to_string(),
                    endpoint: format!("http://{}.local", slug),
                    source: None,
                })
                .await
                .unwrap();
        }
        let broadcaster = Broadcaster::new(registry.clone());
        (registry, broadcaster)
    }

    #[tokio::test]
    async fn test_fresh_subscriber_gets_full_snapshot_immediately() {
        let (_registry, broadcaster) = setup().await;
        let mut feed = broadcaster.subscribe();

        let snapshot = tokio::time::timeout(Duration::from_millis(500), feed.next())
            .await
            .expect("initial snapshot should not wait for a change")
            .unwrap()
            .unwrap();
        let slugs: Vec<&str> = snapshot.agents.iter().map(|a| a.slug.as_str()).collect();
        assert_eq!(slugs, vec!["summarizer", "translator"]);
        assert!(snapshot.cause.is_none());
    }

    #[tokio::test]
    async fn test_status_change_pushes_new_snapshot() {
        let (registry, broadcaster) = setup().await;
        let mut feed = broadcaster.subscribe();
        feed.next().await.unwrap();

        let agent = registry.find_by_slug("translator").await.unwrap().unwrap();
        registry.set_status(&agent.id, AgentStatus::Ready).await.unwrap();

        let snapshot = feed.next().await.unwrap().unwrap();
        assert!(matches!(
            snapshot.cause,
            Some(RegistryEvent::StatusChanged { current: AgentStatus::Ready, .. })
        ));
        let updated = snapshot.agents.iter().find(|a| a.id == agent.id).unwrap();
        assert_eq!(updated.status, AgentStatus::Ready);
    }

    #[tokio::test]
    async fn test_dropped_subscriber_does_not_affect_others() {
        let (registry, broadcaster) = setup().await;
        let mut kept = broadcaster.subscribe();
        let gone = broadcaster.subscribe();
        assert_eq!(broadcaster.subscriber_count(), 2);
        drop(gone);
        assert_eq!(broadcaster.subscriber_count(), 1);

        kept.next().await.unwrap();
        let agent = registry.find_by_slug("summarizer").await.unwrap().unwrap();
        registry.set_status(&agent.id, AgentStatus::Unreachable).await.unwrap();
        assert!(kept.next().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_lagged_subscriber_resyncs_to_current_state() {
        let (registry, broadcaster) = setup_with_bus(EventBus::with_capacity(1)).await;
        let mut feed = broadcaster.subscribe();
        feed.next().await.unwrap();

        let agent = registry.find_by_slug("translator").await.unwrap().unwrap();
        for status in [AgentStatus::Ready, AgentStatus::Unreachable, AgentStatus::Ready] {
            assert!(registry.set_status(&agent.id, status).await.unwrap());
        }

        let snapshot = feed.next().await.unwrap().unwrap();
        assert!(snapshot.cause.is_none());
        let current = snapshot.agents.iter().find(|a| a.id == agent.id).unwrap();
        assert_eq!(current.status, AgentStatus::Ready);
    }
}
