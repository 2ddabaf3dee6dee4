//! CLI command implementations.
//!
//! Each submodule corresponds to a top-level CLI command and reuses the
//! aether-core domain logic through `AppState`. Commands return the JSON
//! they want printed; `main` does the printing.

pub mod agent;
pub mod flow;
pub mod server;
pub mod task;

use std::sync::Arc;

use aether_core::state::{AppState, AppStateInner};
use aether_core::{CoreConfig, Database};

/// Initialize a shared `AppState` from the given SQLite database path.
///
/// This mirrors `aether_server::create_app_state` but avoids starting any
/// background work for one-shot commands.
pub fn init_state(db_path: &str, config: CoreConfig) -> Result<AppState, String> {
    let db = Database::open(db_path)
        .map_err(|e| format!("Failed to open database '{}': {}", db_path, e))?;
    Ok(Arc::new(AppStateInner::new(db, config)))
}

/// Pretty-print a JSON value to stdout.
pub fn print_json(value: &serde_json::Value) {
    println!(
        "{}",
        serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
    );
}

/// Parse a JSON argument given on the command line.
pub fn parse_json_arg(name: &str, raw: &str) -> Result<serde_json::Value, String> {
    serde_json::from_str(raw).map_err(|e| format!("--{} is not valid JSON: {}", name, e))
}
