use chrono::Utc;
use rusqlite::{OptionalExtension, Row};

use crate::db::Database;
use crate::error::ServerError;
use crate::models::task::{Invocation, Task, TaskKind};

const TASK_COLUMNS: &str = "id, agent_id, name, description, task_type, method, path, descriptor, \
     input_contract, output_contract, created_at";

#[derive(Clone)]
pub struct TaskStore {
    db: Database,
}

impl TaskStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn insert(&self, task: &Task) -> Result<(), ServerError> {
        let t = task.clone();
        self.db
            .with_conn_async(move |conn| {
                let (method, path, descriptor) = match &t.invocation {
                    Invocation::Endpoint { method, path } => {
                        (Some(method.clone()), Some(path.clone()), None)
                    }
                    Invocation::Function { descriptor } | Invocation::Script { descriptor } => {
                        (None, None, Some(descriptor.to_string()))
                    }
                };
                conn.execute(
                    "INSERT INTO agent_tasks (id, agent_id, name, description, task_type, method, path, \
                     descriptor, input_contract, output_contract, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                    rusqlite::params![
                        t.id,
                        t.agent_id,
                        t.name,
                        t.description,
                        t.kind().as_str(),
                        method,
                        path,
                        descriptor,
                        t.input_contract.as_ref().map(|v| v.to_string()),
                        t.output_contract.as_ref().map(|v| v.to_string()),
                        t.created_at.timestamp_millis(),
                    ],
                )?;
                Ok(())
            })
            .await
    }

    pub async fn get(&self, task_id: &str) -> Result<Option<Task>, ServerError> {
        let id = task_id.to_string();
        self.db
            .with_conn_async(move |conn| {
                conn.query_row(
                    &format!("SELECT {} FROM agent_tasks WHERE id = ?1", TASK_COLUMNS),
                    rusqlite::params![id],
                    |row| Ok(row_to_task(row)),
                )
                .optional()
            })
            .await
    }

    /// Every task, ordered by name then id.
    pub async fn list(&self) -> Result<Vec<Task>, ServerError> {
        self.db
            .with_conn_async(|conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM agent_tasks ORDER BY name ASC, id ASC",
                    TASK_COLUMNS
                ))?;
                let rows = stmt
                    .query_map([], |row| Ok(row_to_task(row)))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
    }

    /// Tasks of one agent, ordered by name then id.
    pub async fn list_by_agent(&self, agent_id: &str) -> Result<Vec<Task>, ServerError> {
        let agent_id = agent_id.to_string();
        self.db
            .with_conn_async(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM agent_tasks WHERE agent_id = ?1 ORDER BY name ASC, id ASC",
                    TASK_COLUMNS
                ))?;
                let rows = stmt
                    .query_map(rusqlite::params![agent_id], |row| Ok(row_to_task(row)))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
    }

    pub async fn delete(&self, task_id: &str) -> Result<bool, ServerError> {
        let id = task_id.to_string();
        self.db
            .with_conn_async(move |conn| {
                let n = conn.execute(
                    "DELETE FROM agent_tasks WHERE id = ?1",
                    rusqlite::params![id],
                )?;
                Ok(n > 0)
            })
            .await
    }
}

fn parse_json(raw: Option<String>) -> Option<serde_json::Value> {
    raw.and_then(|s| serde_json::from_str(&s).ok())
}

fn row_to_task(row: &Row<'_>) -> Task {
    let kind = TaskKind::from_str(&row.get::<_, String>(4).unwrap_or_default())
        .unwrap_or(TaskKind::Endpoint);
    let descriptor = parse_json(row.get(7).unwrap_or(None)).unwrap_or(serde_json::Value::Null);
    let invocation = match kind {
        TaskKind::Endpoint => Invocation::Endpoint {
            method: row
                .get::<_, Option<String>>(5)
                .unwrap_or(None)
                .unwrap_or_else(|| "POST".to_string()),
            path: row.get::<_, Option<String>>(6).unwrap_or(None).unwrap_or_default(),
        },
        TaskKind::Function => Invocation::Function { descriptor },
        TaskKind::Script => Invocation::Script { descriptor },
    };
    let created_ms: i64 = row.get(10).unwrap_or(0);

    Task {
        id: row.get(0).unwrap_or_default(),
        agent_id: row.get(1).unwrap_or_default(),
        name: row.get(2).unwrap_or_default(),
        description: row.get(3).unwrap_or(None),
        invocation,
        input_contract: parse_json(row.get(8).unwrap_or(None)),
        output_contract: parse_json(row.get(9).unwrap_or(None)),
        created_at: chrono::DateTime::from_timestamp_millis(created_ms)
            .unwrap_or_else(Utc::now),
    }
}
