//! The authoritative set of known agents and their status.
//!
//! `set_status` is the only path that mutates an agent's status. It is a
//! compare-and-set on the store, so concurrent probes racing on the same
//! agent produce at most one `StatusChanged` event per real transition.

use chrono::Utc;
use uuid::Uuid;

use crate::error::ServerError;
use crate::events::{EventBus, RegistryEvent};
use crate::models::agent::{Agent, AgentStatus, NewAgent};
use crate::store::{AgentStore, StatusUpdate};

#[derive(Clone)]
pub struct AgentRegistry {
    store: AgentStore,
    bus: EventBus,
}

impl AgentRegistry {
    pub fn new(store: AgentStore, bus: EventBus) -> Self {
        Self { store, bus }
    }

    pub fn events(&self) -> &EventBus {
        &self.bus
    }

    /// Register a new agent in `PENDING` state.
    pub async fn register(&self, input: NewAgent) -> Result<Agent, ServerError> {
        let slug = input.slug.trim().to_string();
        validate_slug(&slug).map_err(ServerError::BadRequest)?;
        let endpoint = normalize_endpoint(&input.endpoint).map_err(ServerError::BadRequest)?;
        let source = input
            .source
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let agent = Agent::new(Uuid::new_v4().to_string(), slug, endpoint, source);
        if !self.store.insert(&agent).await? {
            return Err(ServerError::Conflict(format!(
                "Agent slug '{}' is already registered",
                agent.slug
            )));
        }

        tracing::info!(
            "[Registry] Registered agent {} ({}) at {}",
            agent.slug,
            agent.id,
            agent.endpoint
        );
        self.bus.emit(RegistryEvent::Registered {
            agent_id: agent.id.clone(),
            slug: agent.slug.clone(),
            at: Utc::now(),
        });
        Ok(agent)
    }

    pub async fn get(&self, agent_id: &str) -> Result<Agent, ServerError> {
        self.store
            .get(agent_id)
            .await?
            .ok_or_else(|| ServerError::NotFound(format!("Agent {} not found", agent_id)))
    }

    pub async fn find_by_slug(&self, slug: &str) -> Result<Option<Agent>, ServerError> {
        self.store.get_by_slug(slug).await
    }

    pub async fn list(&self) -> Result<Vec<Agent>, ServerError> {
        self.store.list().await
    }

    /// Record a new status for an agent.
    ///
    /// Returns `true` if the stored value changed, in which case exactly one
    /// `StatusChanged` event has been emitted. Events for one agent are
    /// emitted in the order the writes were applied.
    pub async fn set_status(&self, agent_id: &str, status: AgentStatus) -> Result<bool, ServerError> {
        let bus = self.bus.clone();
        let id = agent_id.to_string();
        let update = self
            .store
            .update_status_if_changed(agent_id, status, move |previous, slug| {
                bus.emit(RegistryEvent::StatusChanged {
                    agent_id: id,
                    slug: slug.to_string(),
                    previous,
                    current: status,
                    at: Utc::now(),
                });
            })
            .await?;

        match update {
            StatusUpdate::NotFound => Err(ServerError::NotFound(format!(
                "Agent {} not found",
                agent_id
            ))),
            StatusUpdate::Unchanged => Ok(false),
            StatusUpdate::Changed { previous, slug } => {
                tracing::info!(
                    "[Registry] Agent {} ({}) status {} -> {}",
                    slug,
                    agent_id,
                    previous,
                    status
                );
                Ok(true)
            }
        }
    }

    /// Remove an agent. Its tasks are deleted with it; flow steps that
    /// pointed at those tasks become broken and fail at execution.
    pub async fn remove(&self, agent_id: &str) -> Result<Agent, ServerError> {
        let agent = self.get(agent_id).await?;
        if !self.store.delete(agent_id).await? {
            return Err(ServerError::NotFound(format!("Agent {} not found", agent_id)));
        }

        tracing::info!("[Registry] Removed agent {} ({})", agent.slug, agent.id);
        self.bus.emit(RegistryEvent::Removed {
            agent_id: agent.id.clone(),
            slug: agent.slug.clone(),
            at: Utc::now(),
        });
        Ok(agent)
    }
}

/// Slugs are lowercase ASCII words joined by single dashes.
pub fn validate_slug(slug: &str) -> Result<(), String> {
    if slug.is_empty() {
        return Err("Agent slug must not be empty".to_string());
    }
    if slug.len() > 64 {
        return Err("Agent slug must be at most 64 characters".to_string());
    }
    let valid_chars = slug
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    if !valid_chars || slug.starts_with('-') || slug.ends_with('-') || slug.contains("--") {
        return Err(format!(
            "Invalid agent slug '{}': use lowercase letters, digits and single dashes",
            slug
        ));
    }
    Ok(())
}

/// Parse an agent base endpoint; only absolute http(s) URLs are accepted.
pub fn normalize_endpoint(endpoint: &str) -> Result<String, String> {
    let trimmed = endpoint.trim();
    let url = reqwest::Url::parse(trimmed)
        .map_err(|e| format!("Invalid agent endpoint '{}': {}", trimmed, e))?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(format!(
            "Agent endpoint must be an http(s) URL, got '{}'",
            trimmed
        ));
    }
    Ok(trimmed.to_string())
}
