//! `aether flow` — Flow definitions and local execution.

use serde_json::{json, Value};

use aether_core::models::{NewFlow, NewStep, PayloadEnvelope};
use aether_core::state::AppState;

use super::parse_json_arg;

pub async fn list(state: &AppState) -> Result<Value, String> {
    let flows = state.flow_store.list().await.map_err(|e| e.to_string())?;
    Ok(json!({ "flows": flows }))
}

pub async fn create(
    state: &AppState,
    name: &str,
    description: Option<&str>,
) -> Result<Value, String> {
    let flow = state
        .flow_store
        .create(NewFlow {
            name: name.to_string(),
            description: description.map(str::to_string),
        })
        .await
        .map_err(|e| e.to_string())?;
    Ok(json!({ "flow": flow }))
}

pub async fn show(state: &AppState, id: &str) -> Result<Value, String> {
    let detail = state
        .flow_store
        .detail(id)
        .await
        .map_err(|e| e.to_string())?
        .ok_or_else(|| format!("Flow {} not found", id))?;
    serde_json::to_value(detail).map_err(|e| e.to_string())
}

pub async fn delete(state: &AppState, id: &str) -> Result<Value, String> {
    state.flow_store.delete(id).await.map_err(|e| e.to_string())?;
    Ok(json!({ "deleted": true, "flowId": id }))
}

pub async fn add_step(
    state: &AppState,
    flow_id: &str,
    task_id: &str,
    order: i64,
    config: Option<&str>,
) -> Result<Value, String> {
    let config = config
        .map(|raw| parse_json_arg("config", raw))
        .transpose()?;
    let step = state
        .flow_store
        .add_step(
            flow_id,
            NewStep {
                task_id: task_id.to_string(),
                step_order: order,
                config,
            },
        )
        .await
        .map_err(|e| e.to_string())?;
    Ok(json!({ "step": step }))
}

pub async fn remove_step(state: &AppState, flow_id: &str, step_id: &str) -> Result<Value, String> {
    state
        .flow_store
        .remove_step(flow_id, step_id)
        .await
        .map_err(|e| e.to_string())?;
    Ok(json!({ "deleted": true, "stepId": step_id }))
}

/// Execute a flow in-process, against the agents' live endpoints.
///
/// `payload` is the JSON object handed to the first step. A failed run is
/// reported as an error carrying the structured failure.
pub async fn run(state: &AppState, id: &str, payload: &str) -> Result<Value, String> {
    let payload = parse_json_arg("payload", payload)?;
    let envelope = PayloadEnvelope::from_value(json!({ "payload": payload }))?;

    match state.executor.execute(id, envelope.payload).await {
        Ok(result) => serde_json::to_value(result).map_err(|e| e.to_string()),
        Err(failure) => Err(serde_json::to_string_pretty(&failure.to_json())
            .unwrap_or_else(|_| failure.to_string())),
    }
}
