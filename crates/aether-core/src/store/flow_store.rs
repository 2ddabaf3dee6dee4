use chrono::Utc;
use rusqlite::{OptionalExtension, Row};
use uuid::Uuid;

use crate::db::Database;
use crate::error::ServerError;
use crate::models::flow::{
    Flow, FlowDetail, FlowStep, NewFlow, NewStep, StepView, MISSING_TASK_LABEL,
};

const STEP_COLUMNS: &str = "s.id, s.flow_id, s.task_id, s.step_order, s.config, s.created_at";

enum AddStepOutcome {
    FlowMissing,
    TaskMissing,
    DuplicateOrder,
    Added,
}

/// Flow definitions and their ordered steps.
#[derive(Clone)]
pub struct FlowStore {
    db: Database,
}

impl FlowStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn create(&self, input: NewFlow) -> Result<Flow, ServerError> {
        let name = input.name.trim().to_string();
        if name.is_empty() {
            return Err(ServerError::BadRequest("Flow name must not be empty".to_string()));
        }

        let flow = Flow::new(Uuid::new_v4().to_string(), name, input.description);
        let f = flow.clone();
        self.db
            .with_conn_async(move |conn| {
                conn.execute(
                    "INSERT INTO flows (id, name, description, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    rusqlite::params![
                        f.id,
                        f.name,
                        f.description,
                        f.created_at.timestamp_millis(),
                        f.updated_at.timestamp_millis(),
                    ],
                )?;
                Ok(())
            })
            .await?;

        tracing::info!("[FlowStore] Created flow {} ({})", flow.name, flow.id);
        Ok(flow)
    }

    pub async fn get(&self, flow_id: &str) -> Result<Option<Flow>, ServerError> {
        let id = flow_id.to_string();
        self.db
            .with_conn_async(move |conn| {
                conn.query_row(
                    "SELECT id, name, description, created_at, updated_at FROM flows WHERE id = ?1",
                    rusqlite::params![id],
                    |row| Ok(row_to_flow(row)),
                )
                .optional()
            })
            .await
    }

    /// All flows, ordered by name then id.
    pub async fn list(&self) -> Result<Vec<Flow>, ServerError> {
        self.db
            .with_conn_async(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, name, description, created_at, updated_at
                     FROM flows ORDER BY name ASC, id ASC",
                )?;
                let rows = stmt
                    .query_map([], |row| Ok(row_to_flow(row)))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
    }

    /// Delete a flow and, through the cascade, its steps.
    pub async fn delete(&self, flow_id: &str) -> Result<(), ServerError> {
        let id = flow_id.to_string();
        let removed = self
            .db
            .with_conn_async(move |conn| {
                conn.execute("DELETE FROM flows WHERE id = ?1", rusqlite::params![id])
            })
            .await?;
        if removed == 0 {
            return Err(ServerError::NotFound(format!("Flow {} not found", flow_id)));
        }
        Ok(())
    }

    /// Append a step to a flow.
    ///
    /// The flow and task must exist and `step_order` must be a positive
    /// value not already used in this flow.
    pub async fn add_step(&self, flow_id: &str, input: NewStep) -> Result<FlowStep, ServerError> {
        if input.step_order < 1 || input.step_order > i64::from(u32::MAX) {
            return Err(ServerError::BadRequest(format!(
                "stepOrder must be a positive integer, got {}",
                input.step_order
            )));
        }
        if let Some(config) = &input.config {
            if !config.is_object() && !config.is_null() {
                return Err(ServerError::BadRequest(
                    "Step config must be a JSON object".to_string(),
                ));
            }
        }

        let step = FlowStep {
            id: Uuid::new_v4().to_string(),
            flow_id: flow_id.to_string(),
            task_id: input.task_id,
            step_order: input.step_order as u32,
            config: input.config.filter(|c| !c.is_null()),
            created_at: Utc::now(),
        };

        let s = step.clone();
        let outcome = self
            .db
            .with_conn_async(move |conn| {
                let flow: Option<i64> = conn
                    .query_row(
                        "SELECT 1 FROM flows WHERE id = ?1",
                        rusqlite::params![s.flow_id],
                        |row| row.get(0),
                    )
                    .optional()?;
                if flow.is_none() {
                    return Ok(AddStepOutcome::FlowMissing);
                }

                let task: Option<i64> = conn
                    .query_row(
                        "SELECT 1 FROM agent_tasks WHERE id = ?1",
                        rusqlite::params![s.task_id],
                        |row| row.get(0),
                    )
                    .optional()?;
                if task.is_none() {
                    return Ok(AddStepOutcome::TaskMissing);
                }

                let taken: Option<i64> = conn
                    .query_row(
                        "SELECT 1 FROM flow_steps WHERE flow_id = ?1 AND step_order = ?2",
                        rusqlite::params![s.flow_id, s.step_order],
                        |row| row.get(0),
                    )
                    .optional()?;
                if taken.is_some() {
                    return Ok(AddStepOutcome::DuplicateOrder);
                }

                conn.execute(
                    "INSERT INTO flow_steps (id, flow_id, task_id, step_order, config, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    rusqlite::params![
                        s.id,
                        s.flow_id,
                        s.task_id,
                        s.step_order,
                        s.config.as_ref().map(|c| c.to_string()),
                        s.created_at.timestamp_millis(),
                    ],
                )?;
                conn.execute(
                    "UPDATE flows SET updated_at = ?1 WHERE id = ?2",
                    rusqlite::params![s.created_at.timestamp_millis(), s.flow_id],
                )?;
                Ok(AddStepOutcome::Added)
            })
            .await?;

        match outcome {
            AddStepOutcome::FlowMissing => {
                Err(ServerError::NotFound(format!("Flow {} not found", flow_id)))
            }
            AddStepOutcome::TaskMissing => Err(ServerError::NotFound(format!(
                "Task {} not found",
                step.task_id
            ))),
            AddStepOutcome::DuplicateOrder => Err(ServerError::Conflict(format!(
                "Flow {} already has a step with order {}",
                flow_id, step.step_order
            ))),
            AddStepOutcome::Added => Ok(step),
        }
    }

    /// Steps of a flow in execution order.
    pub async fn steps(&self, flow_id: &str) -> Result<Vec<FlowStep>, ServerError> {
        let id = flow_id.to_string();
        self.db
            .with_conn_async(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM flow_steps s WHERE s.flow_id = ?1 ORDER BY s.step_order ASC",
                    STEP_COLUMNS
                ))?;
                let rows = stmt
                    .query_map(rusqlite::params![id], |row| Ok(row_to_step(row)))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
    }

    pub async fn remove_step(&self, flow_id: &str, step_id: &str) -> Result<(), ServerError> {
        let (fid, sid) = (flow_id.to_string(), step_id.to_string());
        let removed = self
            .db
            .with_conn_async(move |conn| {
                conn.execute(
                    "DELETE FROM flow_steps WHERE id = ?1 AND flow_id = ?2",
                    rusqlite::params![sid, fid],
                )
            })
            .await?;
        if removed == 0 {
            return Err(ServerError::NotFound(format!(
                "Step {} not found in flow {}",
                step_id, flow_id
            )));
        }
        Ok(())
    }

    /// Number of steps, across all flows, bound to a task.
    pub async fn count_steps_for_task(&self, task_id: &str) -> Result<usize, ServerError> {
        let id = task_id.to_string();
        self.db
            .with_conn_async(move |conn| {
                conn.query_row(
                    "SELECT COUNT(*) FROM flow_steps WHERE task_id = ?1",
                    rusqlite::params![id],
                    |row| row.get::<_, i64>(0),
                )
            })
            .await
            .map(|n| n as usize)
    }

    /// A flow with its steps resolved against tasks and agents.
    pub async fn detail(&self, flow_id: &str) -> Result<Option<FlowDetail>, ServerError> {
        let flow = match self.get(flow_id).await? {
            Some(flow) => flow,
            None => return Ok(None),
        };

        let id = flow_id.to_string();
        let steps = self
            .db
            .with_conn_async(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {}, t.name, a.id, a.slug
                     FROM flow_steps s
                     LEFT JOIN agent_tasks t ON t.id = s.task_id
                     LEFT JOIN agents a ON a.id = t.agent_id
                     WHERE s.flow_id = ?1
                     ORDER BY s.step_order ASC",
                    STEP_COLUMNS
                ))?;
                let rows = stmt
                    .query_map(rusqlite::params![id], |row| {
                        let task_name: Option<String> = row.get(6)?;
                        Ok(StepView {
                            step: row_to_step(row),
                            runnable: task_name.is_some(),
                            task_name,
                            agent_id: row.get(7)?,
                            agent_slug: row.get(8)?,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await?;

        let agents_chain = steps
            .iter()
            .map(|s| {
                s.agent_slug
                    .clone()
                    .unwrap_or_else(|| MISSING_TASK_LABEL.to_string())
            })
            .collect();

        Ok(Some(FlowDetail {
            flow,
            steps,
            agents_chain,
        }))
    }
}

fn row_to_flow(row: &Row<'_>) -> Flow {
    let created_ms: i64 = row.get(3).unwrap_or(0);
    let updated_ms: i64 = row.get(4).unwrap_or(0);
    Flow {
        id: row.get(0).unwrap_or_default(),
        name: row.get(1).unwrap_or_default(),
        description: row.get(2).unwrap_or(None),
        created_at: chrono::DateTime::from_timestamp_millis(created_ms)
            .unwrap_or_else(Utc::now),
        updated_at: chrono::DateTime::from_timestamp_millis(updated_ms)
            .unwrap_or_else(Utc::now),
    }
}

fn row_to_step(row: &Row<'_>) -> FlowStep {
    let config: Option<String> = row.get(4).unwrap_or(None);
    let created_ms: i64 = row.get(5).unwrap_or(0);
    FlowStep {
        id: row.get(0).unwrap_or_default(),
        flow_id: row.get(1).unwrap_or_default(),
        task_id: row.get(2).unwrap_or_default(),
        step_order: row.get(3).unwrap_or(0),
        config: config.and_then(|c| serde_json::from_str(&c).ok()),
        created_at: chrono::DateTime::from_timestamp_millis(created_ms)
            .unwrap_or_else(Utc::now),
    }
}
