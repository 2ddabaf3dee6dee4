//! Runs a flow's steps in order against their agents.
//!
//! The executor:
//! 1. Loads the flow's steps sorted by `step_order`
//! 2. Resolves each step's task and owning agent
//! 3. Refuses to call agents currently marked `UNREACHABLE`
//! 4. Calls the task with the previous step's output as input
//! 5. Stops at the first failure and reports which step failed and why
//!
//! Steps are strictly sequential: step N is not started before step N-1's
//! reply has been fully read. Dropping the `execute` future (for instance
//! when the HTTP client goes away) drops the in-flight call with it.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use serde_json::Value;

use super::error::{DispatchError, ExecutionError, ExecutionFailure, InvokeError};
use super::invoker::{merge_config, InvokerRegistry};
use crate::config::ExecutorConfig;
use crate::error::ServerError;
use crate::models::flow::FlowStep;
use crate::models::task::Task;
use crate::registry::AgentRegistry;
use crate::store::{FlowStore, TaskStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Succeeded,
    Failed,
}

/// What happened at one step.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepOutcome {
    pub step_id: String,
    pub step_order: u32,
    pub task_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    pub status: StepStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub elapsed_ms: u64,
}

impl StepOutcome {
    fn succeeded(step: &FlowStep, task: &Task, output: Value, started: Instant) -> Self {
        Self {
            step_id: step.id.clone(),
            step_order: step.step_order,
            task_id: step.task_id.clone(),
            task_name: Some(task.name.clone()),
            agent_id: Some(task.agent_id.clone()),
            status: StepStatus::Succeeded,
            output: Some(output),
            error: None,
            elapsed_ms: started.elapsed().as_millis() as u64,
        }
    }

    fn failed(step: &FlowStep, task: Option<&Task>, error: String, started: Instant) -> Self {
        Self {
            step_id: step.id.clone(),
            step_order: step.step_order,
            task_id: step.task_id.clone(),
            task_name: task.map(|t| t.name.clone()),
            agent_id: task.map(|t| t.agent_id.clone()),
            status: StepStatus::Failed,
            output: None,
            error: Some(error),
            elapsed_ms: started.elapsed().as_millis() as u64,
        }
    }
}

/// Result of a flow that ran every step successfully.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub success: bool,
    pub flow_id: String,
    pub steps: Vec<StepOutcome>,
    /// The last step's output.
    pub output: Value,
    pub elapsed_ms: u64,
}

#[derive(Clone)]
pub struct FlowExecutor {
    flows: FlowStore,
    tasks: TaskStore,
    registry: AgentRegistry,
    invokers: Arc<InvokerRegistry>,
    config: ExecutorConfig,
}

impl FlowExecutor {
    pub fn new(
        flows: FlowStore,
        tasks: TaskStore,
        registry: AgentRegistry,
        invokers: InvokerRegistry,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            flows,
            tasks,
            registry,
            invokers: Arc::new(invokers),
            config,
        }
    }

    /// Execute a flow, threading `initial_payload` through its steps.
    pub async fn execute(
        &self,
        flow_id: &str,
        initial_payload: Value,
    ) -> Result<ExecutionResult, ExecutionFailure> {
        let started = Instant::now();
        let fail = |error: ExecutionError, steps: Vec<StepOutcome>| {
            ExecutionFailure::new(flow_id, error, steps)
        };

        let flow = match self.flows.get(flow_id).await {
            Ok(Some(flow)) => flow,
            Ok(None) => return Err(fail(ExecutionError::FlowNotFound(flow_id.to_string()), vec![])),
            Err(e) => return Err(fail(e.into(), vec![])),
        };
        let steps = self
            .flows
            .steps(flow_id)
            .await
            .map_err(|e| fail(e.into(), vec![]))?;
        if steps.is_empty() {
            return Err(fail(ExecutionError::EmptyFlow(flow_id.to_string()), vec![]));
        }

        tracing::info!(
            "[Executor] Running flow {} ({}) with {} step(s)",
            flow.name,
            flow.id,
            steps.len()
        );

        let mut current = initial_payload;
        let mut outcomes: Vec<StepOutcome> = Vec::with_capacity(steps.len());

        for step in &steps {
            let step_started = Instant::now();

            let task = match self.tasks.get(&step.task_id).await {
                Ok(Some(task)) => task,
                Ok(None) => {
                    let reason = format!("task {} no longer exists", step.task_id);
                    outcomes.push(StepOutcome::failed(step, None, reason.clone(), step_started));
                    let error = ExecutionError::BrokenStep {
                        step_id: step.id.clone(),
                        reason,
                    };
                    tracing::warn!("[Executor] Flow {} stopped: {}", flow.id, error);
                    return Err(fail(error, outcomes));
                }
                Err(e) => return Err(fail(e.into(), outcomes)),
            };

            let input = merge_config(&current, step.config.as_ref());
            match self.invoke_task(&task, &input).await {
                Ok(output) => {
                    tracing::debug!(
                        "[Executor] Step {} ({}) of flow {} succeeded",
                        step.step_order,
                        task.name,
                        flow.id
                    );
                    outcomes.push(StepOutcome::succeeded(
                        step,
                        &task,
                        output.clone(),
                        step_started,
                    ));
                    current = output;
                }
                Err(err) => {
                    let error = step_error(step, err);
                    outcomes.push(StepOutcome::failed(
                        step,
                        Some(&task),
                        error.to_string(),
                        step_started,
                    ));
                    tracing::warn!(
                        "[Executor] Flow {} stopped at step {}: {}",
                        flow.id,
                        step.step_order,
                        error
                    );
                    return Err(fail(error, outcomes));
                }
            }
        }

        let elapsed_ms = started.elapsed().as_millis() as u64;
        tracing::info!(
            "[Executor] Flow {} completed {} step(s) in {}ms",
            flow.id,
            outcomes.len(),
            elapsed_ms
        );

        Ok(ExecutionResult {
            success: true,
            flow_id: flow.id,
            steps: outcomes,
            output: current,
            elapsed_ms,
        })
    }

    /// Call one task against its owning agent, with the same availability
    /// and timeout rules as a flow step.
    pub async fn invoke_task(&self, task: &Task, payload: &Value) -> Result<Value, DispatchError> {
        let agent = match self.registry.get(&task.agent_id).await {
            Ok(agent) => agent,
            Err(ServerError::NotFound(_)) => {
                return Err(DispatchError::AgentMissing(task.agent_id.clone()))
            }
            Err(e) => return Err(e.into()),
        };
        if !agent.status.is_attemptable() {
            return Err(DispatchError::AgentUnavailable(agent.id));
        }

        let kind = task.kind();
        let invoker = self
            .invokers
            .get(kind)
            .ok_or(InvokeError::Unsupported(kind))?;

        let timeout = self.config.step_timeout;
        match tokio::time::timeout(timeout, invoker.invoke(&agent, task, payload)).await {
            Ok(result) => result.map_err(DispatchError::from),
            Err(_) => Err(InvokeError::Timeout(timeout).into()),
        }
    }
}

fn step_error(step: &FlowStep, err: DispatchError) -> ExecutionError {
    match err {
        DispatchError::AgentMissing(agent_id) => ExecutionError::BrokenStep {
            step_id: step.id.clone(),
            reason: format!("agent {} no longer exists", agent_id),
        },
        DispatchError::AgentUnavailable(agent_id) => ExecutionError::AgentUnavailable {
            step_id: step.id.clone(),
            agent_id,
        },
        DispatchError::Invoke(cause) => ExecutionError::StepExecutionFailed {
            step_id: step.id.clone(),
            cause,
        },
        DispatchError::Store(e) => ExecutionError::Store(e),
    }
}
