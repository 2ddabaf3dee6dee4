//! SQLite persistence for agents, tasks, flows and steps.
//!
//! Uses rusqlite with WAL mode. Every statement runs behind a single
//! connection mutex, so a reader never observes a half-applied write.
//! Async callers go through `with_conn_async`, which hops onto
//! `tokio::task::spawn_blocking`.

use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::error::ServerError;

/// Thread-safe handle to the SQLite database.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) a SQLite database at the given path.
    pub fn open(db_path: &str) -> Result<Self, ServerError> {
        let path = Path::new(db_path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }

        let conn = Connection::open(db_path)
            .map_err(|e| ServerError::Database(format!("Failed to open database: {}", e)))?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
            .map_err(|e| ServerError::Database(format!("Failed to set pragmas: {}", e)))?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.initialize_tables()?;

        tracing::info!("SQLite database opened at: {}", db_path);
        Ok(db)
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self, ServerError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| ServerError::Database(format!("Failed to open in-memory db: {}", e)))?;

        conn.execute_batch("PRAGMA foreign_keys=ON;")
            .map_err(|e| ServerError::Database(format!("Failed to set pragmas: {}", e)))?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.initialize_tables()?;
        Ok(db)
    }

    /// Execute a closure with access to the database connection.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, ServerError>
    where
        F: FnOnce(&Connection) -> Result<T, rusqlite::Error>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| ServerError::Database(format!("Lock poisoned: {}", e)))?;
        f(&conn).map_err(|e| ServerError::Database(e.to_string()))
    }

    /// Execute a closure with access to the database connection (async-friendly).
    pub async fn with_conn_async<F, T>(&self, f: F) -> Result<T, ServerError>
    where
        F: FnOnce(&Connection) -> Result<T, rusqlite::Error> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.clone();
        tokio::task::spawn_blocking(move || db.with_conn(f))
            .await
            .map_err(|e| ServerError::Database(format!("Task join error: {}", e)))?
    }

    /// Create all tables if they don't exist.
    fn initialize_tables(&self) -> Result<(), ServerError> {
        self.with_conn(|conn| {
            conn.execute_batch(
                "
                CREATE TABLE IF NOT EXISTS agents (
                    id              TEXT PRIMARY KEY,
                    slug            TEXT NOT NULL UNIQUE,
                    endpoint        TEXT NOT NULL,
                    status          TEXT NOT NULL DEFAULT 'PENDING',
                    source          TEXT,
                    created_at      INTEGER NOT NULL,
                    updated_at      INTEGER NOT NULL
                );

                CREATE TABLE IF NOT EXISTS agent_tasks (
                    id              TEXT PRIMARY KEY,
                    agent_id        TEXT NOT NULL REFERENCES agents(id) ON DELETE CASCADE,
                    name            TEXT NOT NULL,
                    description     TEXT,
                    task_type       TEXT NOT NULL,
                    method          TEXT,
                    path            TEXT,
                    descriptor      TEXT,
                    input_contract  TEXT,
                    output_contract TEXT,
                    created_at      INTEGER NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_agent_tasks_agent ON agent_tasks(agent_id);

                CREATE TABLE IF NOT EXISTS flows (
                    id              TEXT PRIMARY KEY,
                    name            TEXT NOT NULL,
                    description     TEXT,
                    created_at      INTEGER NOT NULL,
                    updated_at      INTEGER NOT NULL
                );

                -- No foreign key on task_id: a step whose task is gone is
                -- reported as broken at execution time.
                CREATE TABLE IF NOT EXISTS flow_steps (
                    id              TEXT PRIMARY KEY,
                    flow_id         TEXT NOT NULL REFERENCES flows(id) ON DELETE CASCADE,
                    task_id         TEXT NOT NULL,
                    step_order      INTEGER NOT NULL,
                    config          TEXT,
                    created_at      INTEGER NOT NULL,
                    UNIQUE (flow_id, step_order)
                );
                CREATE INDEX IF NOT EXISTS idx_flow_steps_flow ON flow_steps(flow_id);
                CREATE INDEX IF NOT EXISTS idx_flow_steps_task ON flow_steps(task_id);
                ",
            )
        })
    }
}
