//! AetherFlow Server — HTTP surface for the flow orchestration dashboard.
//!
//! A thin axum adapter over `aether-core`, providing:
//! - REST CRUD for agents, tasks, flows and steps
//! - synchronous flow execution and direct task invocation
//! - a live agent feed over Server-Sent Events
//! - the background liveness prober
//!
//! The crate can run standalone (`start_server`) or share its state with
//! other consumers such as the CLI (`start_server_with_state`).

pub mod api;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use aether_core::state::{AppState, AppStateInner};
use aether_core::{CoreConfig, Database, ExecutorConfig, ProberConfig};

/// Configuration for the AetherFlow backend server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub db_path: String,
    pub prober: ProberConfig,
    pub executor: ExecutorConfig,
    /// Run the liveness prober in the background.
    pub probe_enabled: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            db_path: "aether.db".to_string(),
            prober: ProberConfig::default(),
            executor: ExecutorConfig::default(),
            probe_enabled: true,
        }
    }
}

impl ServerConfig {
    pub fn core_config(&self) -> CoreConfig {
        CoreConfig {
            prober: self.prober.clone(),
            executor: self.executor.clone(),
        }
    }
}

/// Create a shared `AppState` from a database path.
pub async fn create_app_state(db_path: &str, config: CoreConfig) -> Result<AppState, String> {
    let db = Database::open(db_path).map_err(|e| format!("Failed to open database: {}", e))?;
    Ok(Arc::new(AppStateInner::new(db, config)))
}

/// Start the server, initialising tracing and opening the database.
///
/// Returns the actual address the server is listening on.
pub async fn start_server(config: ServerConfig) -> Result<SocketAddr, String> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "aether_core=info,aether_server=info,tower_http=info".into()
            }),
        )
        .try_init()
        .ok();

    tracing::info!(
        "Starting AetherFlow server on {}:{}",
        config.host,
        config.port
    );

    let state = create_app_state(&config.db_path, config.core_config()).await?;
    start_server_with_state(config, state).await
}

/// Build the full application router over a pre-built state.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(api::api_router())
        .route("/api/health", axum::routing::get(health_check))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server with a pre-built `AppState`.
///
/// Spawns the liveness prober when `probe_enabled` is set.
pub async fn start_server_with_state(
    config: ServerConfig,
    state: AppState,
) -> Result<SocketAddr, String> {
    let app = build_router(state.clone());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| format!("Invalid address: {}", e))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| format!("Failed to bind to {}: {}", addr, e))?;

    let local_addr = listener
        .local_addr()
        .map_err(|e| format!("Failed to get local address: {}", e))?;

    if config.probe_enabled {
        state.prober.clone().spawn();
    } else {
        tracing::info!("Liveness prober disabled");
    }

    tracing::info!("AetherFlow server listening on {}", local_addr);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("Server error: {}", e);
        }
    });

    Ok(local_addr)
}

async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "ok",
        "server": "aether-server",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
