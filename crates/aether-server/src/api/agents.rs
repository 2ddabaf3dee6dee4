use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};

use aether_core::error::ServerError;
use aether_core::flow::DispatchError;
use aether_core::models::{Agent, NewAgent, NewTask, PayloadEnvelope};
use aether_core::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_agents).post(register_agent))
        .route("/probe", post(probe_now))
        .route("/{id}", get(get_agent).delete(remove_agent))
        .route("/{id}/tasks", get(list_agent_tasks).post(create_agent_task))
        .route("/{id}/tasks/{task_id}/invoke", post(invoke_task))
}

async fn list_agents(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let agents = state.registry.list().await?;
    Ok(Json(serde_json::json!({ "agents": agents })))
}

async fn register_agent(
    State(state): State<AppState>,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let body: NewAgent = serde_json::from_value(body)
        .map_err(|e| ServerError::BadRequest(format!("Invalid request body: {}", e)))?;
    let agent = state.registry.register(body).await?;
    Ok(Json(serde_json::json!({ "agent": agent })))
}

async fn get_agent(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Agent>, ServerError> {
    state.registry.get(&id).await.map(Json)
}

async fn remove_agent(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let agent = state.registry.remove(&id).await?;
    Ok(Json(serde_json::json!({ "deleted": true, "agentId": agent.id })))
}

/// POST /api/agents/probe — run one liveness cycle now.
async fn probe_now(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let summary = state.prober.run_cycle().await?;
    Ok(Json(serde_json::json!({ "summary": summary })))
}

async fn list_agent_tasks(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let tasks = state.catalog.list_for_agent(&id).await?;
    Ok(Json(serde_json::json!({ "tasks": tasks })))
}

async fn create_agent_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let body: NewTask = serde_json::from_value(body)
        .map_err(|e| ServerError::BadRequest(format!("Invalid request body: {}", e)))?;
    let task = state.catalog.create(&id, body).await?;
    Ok(Json(serde_json::json!({ "task": task })))
}

/// POST /api/agents/{id}/tasks/{taskId}/invoke — call one task directly,
/// under the same availability and timeout rules as a flow step.
async fn invoke_task(
    State(state): State<AppState>,
    Path((agent_id, task_id)): Path<(String, String)>,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<serde_json::Value>, DispatchError> {
    let envelope = PayloadEnvelope::from_value(body).map_err(ServerError::BadRequest)?;

    let task = state.catalog.get(&task_id).await?;
    if task.agent_id != agent_id {
        return Err(ServerError::NotFound(format!(
            "Task {} not found for agent {}",
            task_id, agent_id
        ))
        .into());
    }

    let output = state.executor.invoke_task(&task, &envelope.payload).await?;
    Ok(Json(serde_json::json!({
        "success": true,
        "agentId": task.agent_id,
        "taskId": task.id,
        "output": output,
    })))
}
