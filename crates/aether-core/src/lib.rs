//! Aether Core — flow orchestration domain for the AetherFlow dashboard.
//!
//! This crate owns everything between the HTTP surface and the remote agent
//! services:
//!
//! - the Agent Registry and its SQLite-backed stores
//! - the Task Catalog and Flow definitions
//! - the Liveness Prober that keeps agent status current
//! - the Flow Executor that threads a payload through a flow's steps
//! - the Event Broadcaster that feeds live agent snapshots to observers
//!
//! It has **no HTTP server dependency** by default, so the same logic backs
//! the axum server (`aether-server`) and the `aether` CLI.
//!
//! # Feature Flags
//!
//! - `axum` — Enables `IntoResponse` impls on `ServerError`, `ExecutionFailure`
//!   and `DispatchError` for use in axum handlers.

pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod flow;
pub mod models;
pub mod prober;
pub mod registry;
pub mod state;
pub mod store;

// Convenience re-exports
pub use config::{CoreConfig, ExecutorConfig, ProberConfig};
pub use db::Database;
pub use error::ServerError;
pub use state::{AppState, AppStateInner};
