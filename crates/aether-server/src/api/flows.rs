use axum::{
    extract::{Path, State},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};

use aether_core::error::ServerError;
use aether_core::models::{FlowDetail, NewFlow, NewStep, PayloadEnvelope};
use aether_core::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_flows).post(create_flow))
        .route("/{id}", get(get_flow).delete(delete_flow))
        .route("/{id}/steps", get(list_steps).post(add_step))
        .route("/{id}/steps/{step_id}", delete(remove_step))
        .route("/{id}/execute", post(execute_flow))
}

async fn list_flows(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let flows = state.flow_store.list().await?;
    Ok(Json(serde_json::json!({ "flows": flows })))
}

async fn create_flow(
    State(state): State<AppState>,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let body: NewFlow = serde_json::from_value(body)
        .map_err(|e| ServerError::BadRequest(format!("Invalid request body: {}", e)))?;
    let flow = state.flow_store.create(body).await?;
    Ok(Json(serde_json::json!({ "flow": flow })))
}

/// GET /api/flows/{id} — the flow with its resolved steps and agent chain.
async fn get_flow(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<FlowDetail>, ServerError> {
    state
        .flow_store
        .detail(&id)
        .await?
        .map(Json)
        .ok_or_else(|| ServerError::NotFound(format!("Flow {} not found", id)))
}

async fn delete_flow(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ServerError> {
    state.flow_store.delete(&id).await?;
    Ok(Json(serde_json::json!({ "deleted": true })))
}

async fn list_steps(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ServerError> {
    if state.flow_store.get(&id).await?.is_none() {
        return Err(ServerError::NotFound(format!("Flow {} not found", id)));
    }
    let steps = state.flow_store.steps(&id).await?;
    Ok(Json(serde_json::json!({ "steps": steps })))
}

async fn add_step(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let body: NewStep = serde_json::from_value(body)
        .map_err(|e| ServerError::BadRequest(format!("Invalid request body: {}", e)))?;
    let step = state.flow_store.add_step(&id, body).await?;
    Ok(Json(serde_json::json!({ "step": step })))
}

async fn remove_step(
    State(state): State<AppState>,
    Path((id, step_id)): Path<(String, String)>,
) -> Result<Json<serde_json::Value>, ServerError> {
    state.flow_store.remove_step(&id, &step_id).await?;
    Ok(Json(serde_json::json!({ "deleted": true })))
}

/// POST /api/flows/{id}/execute — run the flow synchronously.
///
/// Body: `{ "payload": { ... } }`. Returns the execution result, or a
/// structured failure naming the step that stopped the flow.
async fn execute_flow(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<serde_json::Value>,
) -> Response {
    let envelope = match PayloadEnvelope::from_value(body) {
        Ok(envelope) => envelope,
        Err(msg) => return ServerError::BadRequest(msg).into_response(),
    };

    match state.executor.execute(&id, envelope.payload).await {
        Ok(result) => Json(result).into_response(),
        Err(failure) => failure.into_response(),
    }
}
