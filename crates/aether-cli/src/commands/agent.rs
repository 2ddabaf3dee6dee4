//! `aether agent` — Agent registry commands.

use serde_json::{json, Value};

use aether_core::models::NewAgent;
use aether_core::state::AppState;

pub async fn list(state: &AppState) -> Result<Value, String> {
    let agents = state.registry.list().await.map_err(|e| e.to_string())?;
    Ok(json!({ "agents": agents }))
}

pub async fn register(
    state: &AppState,
    slug: &str,
    endpoint: &str,
    source: Option<&str>,
) -> Result<Value, String> {
    let agent = state
        .registry
        .register(NewAgent {
            slug: slug.to_string(),
            endpoint: endpoint.to_string(),
            source: source.map(str::to_string),
        })
        .await
        .map_err(|e| e.to_string())?;
    Ok(json!({ "agent": agent }))
}

pub async fn get(state: &AppState, id_or_slug: &str) -> Result<Value, String> {
    let agent = resolve(state, id_or_slug).await?;
    let tasks = state
        .catalog
        .list_for_agent(&agent.id)
        .await
        .map_err(|e| e.to_string())?;
    Ok(json!({ "agent": agent, "tasks": tasks }))
}

pub async fn remove(state: &AppState, id_or_slug: &str) -> Result<Value, String> {
    let agent = resolve(state, id_or_slug).await?;
    state
        .registry
        .remove(&agent.id)
        .await
        .map_err(|e| e.to_string())?;
    Ok(json!({ "deleted": true, "agentId": agent.id }))
}

/// Run one liveness cycle and report the result.
pub async fn probe(state: &AppState) -> Result<Value, String> {
    let summary = state.prober.run_cycle().await.map_err(|e| e.to_string())?;
    let agents = state.registry.list().await.map_err(|e| e.to_string())?;
    Ok(json!({ "summary": summary, "agents": agents }))
}

/// Accept either an agent id or its slug.
pub(crate) async fn resolve(
    state: &AppState,
    id_or_slug: &str,
) -> Result<aether_core::models::Agent, String> {
    if let Some(agent) = state
        .registry
        .find_by_slug(id_or_slug)
        .await
        .map_err(|e| e.to_string())?
    {
        return Ok(agent);
    }
    state.registry.get(id_or_slug).await.map_err(|e| e.to_string())
}
