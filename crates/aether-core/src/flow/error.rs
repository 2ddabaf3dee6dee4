//! Structured failures of task calls and flow executions.
//!
//! A failed execution always tells the caller *which* step stopped the
//! flow and *why*; it is never flattened into a bare message.

use std::time::Duration;

use serde_json::json;

use super::executor::StepOutcome;
use crate::error::ServerError;
use crate::models::task::TaskKind;

/// Why a single outbound call did not produce a usable payload.
#[derive(Debug, thiserror::Error)]
pub enum InvokeError {
    #[error("call timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("agent returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("agent reported failure: {0}")]
    Rejected(String),

    #[error("invalid agent response: {0}")]
    InvalidResponse(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("no invoker registered for '{0}' tasks")]
    Unsupported(TaskKind),
}

impl InvokeError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Timeout(_) => "timeout",
            Self::Transport(_) => "transport",
            Self::Status { .. } => "status",
            Self::Rejected(_) => "rejected",
            Self::InvalidResponse(_) => "invalidResponse",
            Self::InvalidRequest(_) => "invalidRequest",
            Self::Unsupported(_) => "unsupported",
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        let mut value = json!({
            "kind": self.kind(),
            "message": self.to_string(),
        });
        if let Self::Status { status, .. } = self {
            value["status"] = json!(status);
        }
        value
    }

    fn http_status(&self) -> u16 {
        match self {
            Self::Timeout(_) => 504,
            Self::Unsupported(_) => 501,
            _ => 502,
        }
    }
}

/// Failure to call one task outside of a flow.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Agent {0} no longer exists")]
    AgentMissing(String),

    #[error("Agent {0} is unreachable")]
    AgentUnavailable(String),

    #[error(transparent)]
    Invoke(#[from] InvokeError),

    #[error(transparent)]
    Store(#[from] ServerError),
}

impl DispatchError {
    pub fn http_status(&self) -> u16 {
        match self {
            Self::AgentMissing(_) => 404,
            Self::AgentUnavailable(_) => 503,
            Self::Invoke(cause) => cause.http_status(),
            Self::Store(e) => e.http_status(),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        let mut body = json!({
            "success": false,
            "error": self.to_string(),
        });
        match self {
            Self::AgentMissing(agent_id) | Self::AgentUnavailable(agent_id) => {
                body["agentId"] = json!(agent_id);
            }
            Self::Invoke(cause) => body["cause"] = cause.to_json(),
            Self::Store(_) => {}
        }
        body
    }
}

/// Why a flow execution stopped.
#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    #[error("Flow {0} not found")]
    FlowNotFound(String),

    #[error("Flow {0} has no steps")]
    EmptyFlow(String),

    #[error("Step {step_id} is broken: {reason}")]
    BrokenStep { step_id: String, reason: String },

    #[error("Step {step_id}: agent {agent_id} is unreachable")]
    AgentUnavailable { step_id: String, agent_id: String },

    #[error("Step {step_id} failed: {cause}")]
    StepExecutionFailed {
        step_id: String,
        #[source]
        cause: InvokeError,
    },

    #[error(transparent)]
    Store(#[from] ServerError),
}

impl ExecutionError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::FlowNotFound(_) => "flowNotFound",
            Self::EmptyFlow(_) => "emptyFlow",
            Self::BrokenStep { .. } => "brokenStep",
            Self::AgentUnavailable { .. } => "agentUnavailable",
            Self::StepExecutionFailed { .. } => "stepExecutionFailed",
            Self::Store(_) => "store",
        }
    }

    /// The step that stopped the flow, if the failure is tied to one.
    pub fn step_id(&self) -> Option<&str> {
        match self {
            Self::BrokenStep { step_id, .. }
            | Self::AgentUnavailable { step_id, .. }
            | Self::StepExecutionFailed { step_id, .. } => Some(step_id),
            _ => None,
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            Self::FlowNotFound(_) => 404,
            Self::EmptyFlow(_) | Self::BrokenStep { .. } => 422,
            Self::AgentUnavailable { .. } => 503,
            Self::StepExecutionFailed { .. } => 502,
            Self::Store(e) => e.http_status(),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        let mut value = json!({
            "kind": self.kind(),
            "message": self.to_string(),
        });
        if let Some(step_id) = self.step_id() {
            value["stepId"] = json!(step_id);
        }
        match self {
            Self::AgentUnavailable { agent_id, .. } => value["agentId"] = json!(agent_id),
            Self::StepExecutionFailed { cause, .. } => value["cause"] = cause.to_json(),
            _ => {}
        }
        value
    }
}

/// A failed execution together with the step outcomes recorded up to,
/// and including, the step that failed.
#[derive(Debug, thiserror::Error)]
#[error("{error}")]
pub struct ExecutionFailure {
    pub flow_id: String,
    pub error: ExecutionError,
    pub steps: Vec<StepOutcome>,
}

impl ExecutionFailure {
    pub fn new(flow_id: &str, error: ExecutionError, steps: Vec<StepOutcome>) -> Self {
        Self {
            flow_id: flow_id.to_string(),
            error,
            steps,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "success": false,
            "flowId": self.flow_id,
            "error": self.error.to_json(),
            "steps": self.steps,
        })
    }
}

// ---------------------------------------------------------------------------
// axum integration (opt-in via feature flag)
// ---------------------------------------------------------------------------

#[cfg(feature = "axum")]
impl axum::response::IntoResponse for ExecutionFailure {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;

        let status = StatusCode::from_u16(self.error.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, axum::Json(self.to_json())).into_response()
    }
}

#[cfg(feature = "axum")]
impl axum::response::IntoResponse for DispatchError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;

        let status =
            StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, axum::Json(self.to_json())).into_response()
    }
}
