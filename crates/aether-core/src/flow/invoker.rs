//! Task invokers: how one task is actually called.
//!
//! The executor looks up a [`TaskInvoker`] by task type. Only `endpoint`
//! tasks ship with an implementation ([`HttpEndpointInvoker`]); `function`
//! and `script` tasks run through whatever invoker the embedding
//! application registers, and fail as unsupported otherwise.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use super::error::InvokeError;
use crate::models::agent::Agent;
use crate::models::task::{Invocation, Task, TaskKind};

/// Longest slice of an error body kept in an `InvokeError::Status`.
const MAX_ERROR_BODY: usize = 512;

#[async_trait]
pub trait TaskInvoker: Send + Sync {
    /// Call `task` on `agent` with `payload` and return the agent's reply.
    async fn invoke(&self, agent: &Agent, task: &Task, payload: &Value)
        -> Result<Value, InvokeError>;
}

/// Invokers keyed by task type.
#[derive(Clone, Default)]
pub struct InvokerRegistry {
    invokers: HashMap<TaskKind, Arc<dyn TaskInvoker>>,
}

impl InvokerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the HTTP invoker wired for `endpoint` tasks.
    pub fn with_http(client: reqwest::Client, timeout: Duration) -> Self {
        let mut registry = Self::new();
        registry.register(
            TaskKind::Endpoint,
            Arc::new(HttpEndpointInvoker::new(client, timeout)),
        );
        registry
    }

    /// Install (or replace) the invoker for a task type.
    pub fn register(&mut self, kind: TaskKind, invoker: Arc<dyn TaskInvoker>) {
        self.invokers.insert(kind, invoker);
    }

    pub fn get(&self, kind: TaskKind) -> Option<Arc<dyn TaskInvoker>> {
        self.invokers.get(&kind).cloned()
    }
}

/// Calls `endpoint` tasks over HTTP with the current payload as JSON body.
pub struct HttpEndpointInvoker {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpEndpointInvoker {
    pub fn new(client: reqwest::Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }
}

#[async_trait]
impl TaskInvoker for HttpEndpointInvoker {
    async fn invoke(
        &self,
        agent: &Agent,
        task: &Task,
        payload: &Value,
    ) -> Result<Value, InvokeError> {
        let (method, path) = match &task.invocation {
            Invocation::Endpoint { method, path } => (method, path),
            other => return Err(InvokeError::Unsupported(other.kind())),
        };

        let method = reqwest::Method::from_bytes(method.as_bytes())
            .map_err(|e| InvokeError::InvalidRequest(format!("bad method '{}': {}", method, e)))?;
        let url = join_endpoint(&agent.endpoint, path);

        tracing::debug!("[Invoker] {} {} (task {})", method, url, task.id);

        let response = self
            .client
            .request(method, &url)
            .timeout(self.timeout)
            .json(payload)
            .send()
            .await
            .map_err(|e| classify_transport_error(e, self.timeout))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| classify_transport_error(e, self.timeout))?;

        if !status.is_success() {
            return Err(InvokeError::Status {
                status: status.as_u16(),
                body: error_message(&text),
            });
        }

        parse_reply(&text)
    }
}

fn classify_transport_error(e: reqwest::Error, timeout: Duration) -> InvokeError {
    if e.is_timeout() {
        InvokeError::Timeout(timeout)
    } else {
        InvokeError::Transport(e.to_string())
    }
}

/// Prefer the agent's `{ "error": ... }` message over the raw body.
fn error_message(body: &str) -> String {
    if let Ok(Value::Object(obj)) = serde_json::from_str::<Value>(body) {
        if let Some(msg) = obj.get("error").and_then(|e| e.as_str()) {
            return msg.to_string();
        }
    }
    body.chars().take(MAX_ERROR_BODY).collect()
}

/// Turn a 2xx body into the next payload.
///
/// An empty body becomes `null`; a JSON object with `"success": false`
/// is a failure even though the status was 2xx.
fn parse_reply(body: &str) -> Result<Value, InvokeError> {
    if body.trim().is_empty() {
        return Ok(Value::Null);
    }
    let value: Value = serde_json::from_str(body)
        .map_err(|e| InvokeError::InvalidResponse(format!("body is not JSON: {}", e)))?;

    if value.get("success").and_then(|s| s.as_bool()) == Some(false) {
        let msg = value
            .get("error")
            .and_then(|e| e.as_str())
            .unwrap_or("agent replied with success=false");
        return Err(InvokeError::Rejected(msg.to_string()));
    }
    Ok(value)
}

/// Join an agent base endpoint and a task path with exactly one `/`.
pub fn join_endpoint(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Overlay a step's static config on the incoming payload.
///
/// Only applies when both are JSON objects; config keys win.
pub fn merge_config(payload: &Value, config: Option<&Value>) -> Value {
    match (payload, config) {
        (Value::Object(base), Some(Value::Object(extra))) => {
            let mut merged = base.clone();
            for (k, v) in extra {
                merged.insert(k.clone(), v.clone());
            }
            Value::Object(merged)
        }
        _ => payload.clone(),
    }
}
