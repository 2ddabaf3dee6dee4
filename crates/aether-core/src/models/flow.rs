use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An ordered pipeline of steps.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Flow {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Flow {
    pub fn new(id: String, name: String, description: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            name,
            description,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewFlow {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// One position in a flow, bound to a task.
///
/// `step_order` is a sort key: gaps are fine, duplicates within a flow are not.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FlowStep {
    pub id: String,
    pub flow_id: String,
    pub task_id: String,
    pub step_order: u32,
    /// Static fields merged over the incoming payload before the call.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewStep {
    pub task_id: String,
    pub step_order: i64,
    #[serde(default)]
    pub config: Option<serde_json::Value>,
}

/// A step as shown to the dashboard, with its task and agent resolved.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepView {
    #[serde(flatten)]
    pub step: FlowStep,
    pub task_name: Option<String>,
    pub agent_id: Option<String>,
    pub agent_slug: Option<String>,
    /// False when the referenced task no longer exists.
    pub runnable: bool,
}

/// A flow with its ordered steps and the chain of agent slugs they visit.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowDetail {
    #[serde(flatten)]
    pub flow: Flow,
    pub steps: Vec<StepView>,
    pub agents_chain: Vec<String>,
}

/// Placeholder slug shown in an agents chain for a step with a dangling task.
pub const MISSING_TASK_LABEL: &str = "(missing task)";

/// Request body of an execution: `{ "payload": { ... } }` and nothing else.
#[derive(Debug, Clone, PartialEq)]
pub struct PayloadEnvelope {
    pub payload: serde_json::Value,
}

impl PayloadEnvelope {
    /// Accept exactly one shape. Flattened bodies, extra keys and
    /// non-object payloads are refused so callers learn about the mistake.
    pub fn from_value(body: serde_json::Value) -> Result<Self, String> {
        let mut obj = match body {
            serde_json::Value::Object(obj) => obj,
            _ => return Err("Request body must be a JSON object".to_string()),
        };

        let payload = obj
            .remove("payload")
            .ok_or_else(|| "Missing required field 'payload'".to_string())?;

        if !obj.is_empty() {
            let mut extra: Vec<&String> = obj.keys().collect();
            extra.sort();
            return Err(format!(
                "Unexpected fields next to 'payload': {}",
                extra
                    .iter()
                    .map(|k| k.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            ));
        }

        if !payload.is_object() {
            return Err("'payload' must be a JSON object".to_string());
        }

        Ok(Self { payload })
    }
}
