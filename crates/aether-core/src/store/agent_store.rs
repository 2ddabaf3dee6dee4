use chrono::Utc;
use rusqlite::{OptionalExtension, Row};

use crate::db::Database;
use crate::error::ServerError;
use crate::models::agent::{Agent, AgentStatus};

const AGENT_COLUMNS: &str = "id, slug, endpoint, status, source, created_at, updated_at";

/// Outcome of a compare-and-set status write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusUpdate {
    NotFound,
    Unchanged,
    Changed { previous: AgentStatus, slug: String },
}

#[derive(Clone)]
pub struct AgentStore {
    db: Database,
}

impl AgentStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Insert a new agent. Returns `false` without writing when the slug is taken.
    pub async fn insert(&self, agent: &Agent) -> Result<bool, ServerError> {
        let a = agent.clone();
        self.db
            .with_conn_async(move |conn| {
                let taken: Option<i64> = conn
                    .query_row(
                        "SELECT 1 FROM agents WHERE slug = ?1",
                        rusqlite::params![a.slug],
                        |row| row.get(0),
                    )
                    .optional()?;
                if taken.is_some() {
                    return Ok(false);
                }

                conn.execute(
                    "INSERT INTO agents (id, slug, endpoint, status, source, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    rusqlite::params![
                        a.id,
                        a.slug,
                        a.endpoint,
                        a.status.as_str(),
                        a.source,
                        a.created_at.timestamp_millis(),
                        a.updated_at.timestamp_millis(),
                    ],
                )?;
                Ok(true)
            })
            .await
    }

    pub async fn get(&self, agent_id: &str) -> Result<Option<Agent>, ServerError> {
        let id = agent_id.to_string();
        self.db
            .with_conn_async(move |conn| {
                conn.query_row(
                    &format!("SELECT {} FROM agents WHERE id = ?1", AGENT_COLUMNS),
                    rusqlite::params![id],
                    |row| Ok(row_to_agent(row)),
                )
                .optional()
            })
            .await
    }

    pub async fn get_by_slug(&self, slug: &str) -> Result<Option<Agent>, ServerError> {
        let slug = slug.to_string();
        self.db
            .with_conn_async(move |conn| {
                conn.query_row(
                    &format!("SELECT {} FROM agents WHERE slug = ?1", AGENT_COLUMNS),
                    rusqlite::params![slug],
                    |row| Ok(row_to_agent(row)),
                )
                .optional()
            })
            .await
    }

    /// All agents, ordered by slug.
    pub async fn list(&self) -> Result<Vec<Agent>, ServerError> {
        self.db
            .with_conn_async(|conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM agents ORDER BY slug ASC",
                    AGENT_COLUMNS
                ))?;
                let rows = stmt
                    .query_map([], |row| Ok(row_to_agent(row)))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
    }

    /// Delete an agent; its tasks go with it through the foreign key cascade.
    pub async fn delete(&self, agent_id: &str) -> Result<bool, ServerError> {
        let id = agent_id.to_string();
        self.db
            .with_conn_async(move |conn| {
                let n = conn.execute("DELETE FROM agents WHERE id = ?1", rusqlite::params![id])?;
                Ok(n > 0)
            })
            .await
    }

    /// Write `status` only if it differs from the stored value.
    ///
    /// Read, write and `on_change` all run under one connection lock, so two
    /// concurrent callers can never both observe the same transition and
    /// `on_change` calls happen in write order.
    pub async fn update_status_if_changed<F>(
        &self,
        agent_id: &str,
        status: AgentStatus,
        on_change: F,
    ) -> Result<StatusUpdate, ServerError>
    where
        F: FnOnce(AgentStatus, &str) + Send + 'static,
    {
        let id = agent_id.to_string();
        let now = Utc::now().timestamp_millis();
        self.db
            .with_conn_async(move |conn| {
                let current: Option<(String, String)> = conn
                    .query_row(
                        "SELECT status, slug FROM agents WHERE id = ?1",
                        rusqlite::params![id],
                        |row| Ok((row.get(0)?, row.get(1)?)),
                    )
                    .optional()?;

                let (current, slug) = match current {
                    Some(found) => found,
                    None => return Ok(StatusUpdate::NotFound),
                };
                let previous = AgentStatus::from_str(&current).unwrap_or(AgentStatus::Pending);
                if previous == status {
                    return Ok(StatusUpdate::Unchanged);
                }

                conn.execute(
                    "UPDATE agents SET status = ?1, updated_at = ?2 WHERE id = ?3",
                    rusqlite::params![status.as_str(), now, id],
                )?;
                on_change(previous, &slug);
                Ok(StatusUpdate::Changed { previous, slug })
            })
            .await
    }
}

fn row_to_agent(row: &Row<'_>) -> Agent {
    let created_ms: i64 = row.get(5).unwrap_or(0);
    let updated_ms: i64 = row.get(6).unwrap_or(0);

    Agent {
        id: row.get(0).unwrap_or_default(),
        slug: row.get(1).unwrap_or_default(),
        endpoint: row.get(2).unwrap_or_default(),
        status: AgentStatus::from_str(&row.get::<_, String>(3).unwrap_or_default())
            .unwrap_or(AgentStatus::Pending),
        source: row.get(4).unwrap_or(None),
        created_at: chrono::DateTime::from_timestamp_millis(created_ms)
            .unwrap_or_else(Utc::now),
        updated_at: chrono::DateTime::from_timestamp_millis(updated_ms)
            .unwrap_or_else(Utc::now),
    }
}
