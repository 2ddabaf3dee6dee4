use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};

use aether_core::error::ServerError;
use aether_core::models::Task;
use aether_core::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_tasks))
        .route("/{id}", get(get_task).delete(delete_task))
}

/// GET /api/tasks — every task across all agents.
async fn list_tasks(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let tasks = state.catalog.list().await?;
    Ok(Json(serde_json::json!({ "tasks": tasks })))
}

async fn get_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Task>, ServerError> {
    state.catalog.get(&id).await.map(Json)
}

async fn delete_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ServerError> {
    state.catalog.delete(&id).await?;
    Ok(Json(serde_json::json!({ "deleted": true })))
}
