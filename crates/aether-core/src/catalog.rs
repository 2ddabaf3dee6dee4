//! Task definitions owned by agents.

use chrono::Utc;
use uuid::Uuid;

use crate::error::ServerError;
use crate::models::task::{NewTask, Task};
use crate::store::{AgentStore, FlowStore, TaskStore};

#[derive(Clone)]
pub struct TaskCatalog {
    tasks: TaskStore,
    agents: AgentStore,
    flows: FlowStore,
}

impl TaskCatalog {
    pub fn new(tasks: TaskStore, agents: AgentStore, flows: FlowStore) -> Self {
        Self {
            tasks,
            agents,
            flows,
        }
    }

    /// Create a task under an existing agent.
    pub async fn create(&self, agent_id: &str, input: NewTask) -> Result<Task, ServerError> {
        if self.agents.get(agent_id).await?.is_none() {
            return Err(ServerError::NotFound(format!("Agent {} not found", agent_id)));
        }
        let invocation = input.invocation().map_err(ServerError::BadRequest)?;

        let task = Task {
            id: Uuid::new_v4().to_string(),
            agent_id: agent_id.to_string(),
            name: input.name.trim().to_string(),
            description: input.description,
            invocation,
            input_contract: input.input_contract,
            output_contract: input.output_contract,
            created_at: Utc::now(),
        };
        self.tasks.insert(&task).await?;

        tracing::info!(
            "[Catalog] Created {} task {} ({}) for agent {}",
            task.kind(),
            task.name,
            task.id,
            agent_id
        );
        Ok(task)
    }

    pub async fn get(&self, task_id: &str) -> Result<Task, ServerError> {
        self.tasks
            .get(task_id)
            .await?
            .ok_or_else(|| ServerError::NotFound(format!("Task {} not found", task_id)))
    }

    pub async fn list(&self) -> Result<Vec<Task>, ServerError> {
        self.tasks.list().await
    }

    pub async fn list_for_agent(&self, agent_id: &str) -> Result<Vec<Task>, ServerError> {
        if self.agents.get(agent_id).await?.is_none() {
            return Err(ServerError::NotFound(format!("Agent {} not found", agent_id)));
        }
        self.tasks.list_by_agent(agent_id).await
    }

    /// Delete a task. Steps still bound to it stay in their flows and fail
    /// execution as broken steps until they are removed or rebound.
    pub async fn delete(&self, task_id: &str) -> Result<(), ServerError> {
        if !self.tasks.delete(task_id).await? {
            return Err(ServerError::NotFound(format!("Task {} not found", task_id)));
        }

        let dangling = self.flows.count_steps_for_task(task_id).await?;
        if dangling > 0 {
            tracing::warn!(
                "[Catalog] Deleted task {} is still referenced by {} flow step(s)",
                task_id,
                dangling
            );
        } else {
            tracing::info!("[Catalog] Deleted task {}", task_id);
        }
        Ok(())
    }
}
