use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How a task is invoked.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    Endpoint,
    Function,
    Script,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Endpoint => "endpoint",
            Self::Function => "function",
            Self::Script => "script",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "endpoint" => Some(Self::Endpoint),
            "function" => Some(Self::Function),
            "script" => Some(Self::Script),
            _ => None,
        }
    }
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// HTTP methods an endpoint task may use.
pub const ENDPOINT_METHODS: &[&str] = &["GET", "POST", "PUT", "PATCH", "DELETE"];

/// Type-specific invocation data of a task.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Invocation {
    /// `method` against `path`, relative to the owning agent's endpoint.
    Endpoint { method: String, path: String },
    /// Opaque descriptor handed to whichever invoker is registered for functions.
    Function { descriptor: serde_json::Value },
    /// Opaque descriptor handed to whichever invoker is registered for scripts.
    Script { descriptor: serde_json::Value },
}

impl Invocation {
    pub fn kind(&self) -> TaskKind {
        match self {
            Self::Endpoint { .. } => TaskKind::Endpoint,
            Self::Function { .. } => TaskKind::Function,
            Self::Script { .. } => TaskKind::Script,
        }
    }
}

/// One invokable operation owned by an agent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub agent_id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(flatten)]
    pub invocation: Invocation,
    /// Schema placeholders, stored but not enforced.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_contract: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_contract: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl Task {
    pub fn kind(&self) -> TaskKind {
        self.invocation.kind()
    }
}

/// Input for creating a task under an agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTask {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub kind: TaskKind,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub descriptor: Option<serde_json::Value>,
    #[serde(default)]
    pub input_contract: Option<serde_json::Value>,
    #[serde(default)]
    pub output_contract: Option<serde_json::Value>,
}

impl NewTask {
    /// Validate the type-specific fields and build the invocation.
    ///
    /// Endpoint tasks need a path and default to `POST`; function and
    /// script tasks need a descriptor. Fields belonging to another type
    /// are rejected instead of silently dropped.
    pub fn invocation(&self) -> Result<Invocation, String> {
        if self.name.trim().is_empty() {
            return Err("Task name must not be empty".to_string());
        }

        match self.kind {
            TaskKind::Endpoint => {
                if self.descriptor.is_some() {
                    return Err("Endpoint tasks do not take a descriptor".to_string());
                }
                let path = self
                    .path
                    .as_deref()
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .ok_or_else(|| "Endpoint tasks require a path".to_string())?;
                let method = self
                    .method
                    .as_deref()
                    .unwrap_or("POST")
                    .trim()
                    .to_uppercase();
                if !ENDPOINT_METHODS.contains(&method.as_str()) {
                    return Err(format!("Unsupported HTTP method: {}", method));
                }
                Ok(Invocation::Endpoint {
                    method,
                    path: path.to_string(),
                })
            }
            TaskKind::Function | TaskKind::Script => {
                if self.method.is_some() || self.path.is_some() {
                    return Err(format!(
                        "{} tasks do not take a method or path",
                        self.kind.as_str()
                    ));
                }
                let descriptor = self
                    .descriptor
                    .clone()
                    .filter(|d| !d.is_null())
                    .ok_or_else(|| format!("{} tasks require a descriptor", self.kind.as_str()))?;
                Ok(match self.kind {
                    TaskKind::Function => Invocation::Function { descriptor },
                    _ => Invocation::Script { descriptor },
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint_input(method: Option<&str>, path: Option<&str>) -> NewTask {
        NewTask {
            name: "translate".to_string(),
            description: None,
            kind: TaskKind::Endpoint,
            method: method.map(str::to_string),
            path: path.map(str::to_string),
            descriptor: None,
            input_contract: None,
            output_contract: None,
        }
    }

    #[test]
    fn test_endpoint_method_defaults_to_post() {
        let invocation = endpoint_input(None, Some("/translate")).invocation().unwrap();
        assert_eq!(
            invocation,
            Invocation::Endpoint {
                method: "POST".to_string(),
                path: "/translate".to_string()
            }
        );
    }

    #[test]
    fn test_endpoint_method_is_normalized_and_validated() {
        let invocation = endpoint_input(Some("put"), Some("x")).invocation().unwrap();
        assert!(matches!(invocation, Invocation::Endpoint { ref method, .. } if method == "PUT"));
        assert!(endpoint_input(Some("TRACE"), Some("x")).invocation().is_err());
    }

    #[test]
    fn test_endpoint_requires_path() {
        assert!(endpoint_input(None, None).invocation().is_err());
        assert!(endpoint_input(None, Some("  ")).invocation().is_err());
    }

    #[test]
    fn test_script_requires_descriptor_and_rejects_path() {
        let mut input = endpoint_input(None, None);
        input.kind = TaskKind::Script;
        assert!(input.invocation().is_err());

        input.descriptor = Some(serde_json::json!({ "entry": "run.sh" }));
        assert_eq!(input.invocation().unwrap().kind(), TaskKind::Script);

        input.path = Some("/nope".to_string());
        assert!(input.invocation().is_err());
    }

    #[test]
    fn test_task_serializes_invocation_inline() {
        let task = Task {
            id: "t1".to_string(),
            agent_id: "a1".to_string(),
            name: "translate".to_string(),
            description: None,
            invocation: Invocation::Endpoint {
                method: "POST".to_string(),
                path: "/translate".to_string(),
            },
            input_contract: None,
            output_contract: None,
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(&task).unwrap();
        assert_eq!(json["type"], "endpoint");
        assert_eq!(json["method"], "POST");
        assert_eq!(json["path"], "/translate");
        assert_eq!(json["agentId"], "a1");

        let back: Task = serde_json::from_value(json).unwrap();
        assert_eq!(back.kind(), TaskKind::Endpoint);
    }
}
