pub mod agents;
pub mod flows;
pub mod live;
pub mod tasks;

use axum::Router;

use aether_core::state::AppState;

/// Build the complete API router with all sub-routes.
pub fn api_router() -> Router<AppState> {
    Router::new()
        .nest("/api/agents", agents::router().merge(live::router()))
        .nest("/api/tasks", tasks::router())
        .nest("/api/flows", flows::router())
}
