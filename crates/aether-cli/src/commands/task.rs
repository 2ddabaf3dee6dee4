//! `aether task` — Task catalog commands.

use serde_json::{json, Value};

use aether_core::models::{NewTask, TaskKind};
use aether_core::state::AppState;

use super::agent::resolve;
use super::parse_json_arg;

/// List one agent's tasks, or every task when no agent is given.
pub async fn list(state: &AppState, agent: Option<&str>) -> Result<Value, String> {
    let tasks = match agent {
        Some(agent) => {
            let agent = resolve(state, agent).await?;
            state.catalog.list_for_agent(&agent.id).await
        }
        None => state.catalog.list().await,
    }
    .map_err(|e| e.to_string())?;
    Ok(json!({ "tasks": tasks }))
}

/// Arguments of `aether task create`.
pub struct CreateArgs<'a> {
    pub agent: &'a str,
    pub name: &'a str,
    pub kind: &'a str,
    pub description: Option<&'a str>,
    pub method: Option<&'a str>,
    pub path: Option<&'a str>,
    pub descriptor: Option<&'a str>,
}

pub async fn create(state: &AppState, args: CreateArgs<'_>) -> Result<Value, String> {
    let kind = TaskKind::from_str(args.kind).ok_or_else(|| {
        format!(
            "Invalid task type '{}': expected endpoint, function or script",
            args.kind
        )
    })?;
    let descriptor = args
        .descriptor
        .map(|raw| parse_json_arg("descriptor", raw))
        .transpose()?;

    let agent = resolve(state, args.agent).await?;
    let task = state
        .catalog
        .create(
            &agent.id,
            NewTask {
                name: args.name.to_string(),
                description: args.description.map(str::to_string),
                kind,
                method: args.method.map(str::to_string),
                path: args.path.map(str::to_string),
                descriptor,
                input_contract: None,
                output_contract: None,
            },
        )
        .await
        .map_err(|e| e.to_string())?;
    Ok(json!({ "task": task }))
}

pub async fn get(state: &AppState, id: &str) -> Result<Value, String> {
    let task = state.catalog.get(id).await.map_err(|e| e.to_string())?;
    Ok(json!({ "task": task }))
}

pub async fn delete(state: &AppState, id: &str) -> Result<Value, String> {
    state.catalog.delete(id).await.map_err(|e| e.to_string())?;
    Ok(json!({ "deleted": true, "taskId": id }))
}
