use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Reachability of an agent as last observed by the liveness prober.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum AgentStatus {
    /// Registered but not probed yet.
    Pending,
    Ready,
    Unreachable,
}

impl AgentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Ready => "READY",
            Self::Unreachable => "UNREACHABLE",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "PENDING" => Some(Self::Pending),
            "READY" => Some(Self::Ready),
            "UNREACHABLE" => Some(Self::Unreachable),
            _ => None,
        }
    }

    /// Whether a call to an agent in this state is worth attempting.
    pub fn is_attemptable(&self) -> bool {
        !matches!(self, Self::Unreachable)
    }
}

impl std::fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A registered agent service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    pub id: String,
    /// Human-readable unique handle, immutable once registered.
    pub slug: String,
    /// Base URL every endpoint task path is joined onto.
    pub endpoint: String,
    pub status: AgentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Agent {
    pub fn new(id: String, slug: String, endpoint: String, source: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            slug,
            endpoint,
            status: AgentStatus::Pending,
            source,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Input for registering an agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAgent {
    pub slug: String,
    pub endpoint: String,
    #[serde(default)]
    pub source: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trips_through_storage_string() {
        for status in [AgentStatus::Pending, AgentStatus::Ready, AgentStatus::Unreachable] {
            assert_eq!(AgentStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(AgentStatus::from_str("ready"), Some(AgentStatus::Ready));
        assert_eq!(AgentStatus::from_str("online"), None);
    }

    #[test]
    fn test_pending_is_attemptable_unreachable_is_not() {
        assert!(AgentStatus::Pending.is_attemptable());
        assert!(AgentStatus::Ready.is_attemptable());
        assert!(!AgentStatus::Unreachable.is_attemptable());
    }

    #[test]
    fn test_agent_serializes_camel_case_without_empty_source() {
        let agent = Agent::new(
            "a1".to_string(),
            "translator".to_string(),
            "http://localhost:3000".to_string(),
            None,
        );
        let json = serde_json::to_value(&agent).unwrap();
        assert_eq!(json["status"], "PENDING");
        assert!(json.get("createdAt").is_some());
        assert!(json.get("source").is_none());
    }
}
