//! Shared agent pipeline types.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// The agents a chat message can be routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentKind {
    /// On-chain actions on a single network (swap, transfer, stake, ...).
    Defi,
    /// Market data lookups.
    Tools,
    /// Cross-network asset movement.
    Bridge,
    /// Capability questions answered in-process.
    System,
    /// Knowledge graph queries.
    Analytics,
}

impl AgentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentKind::Defi => "defi",
            AgentKind::Tools => "tools",
            AgentKind::Bridge => "bridge",
            AgentKind::System => "system",
            AgentKind::Analytics => "analytics",
        }
    }
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified chat message. Anything that fails to classify collapses to
/// the [`Intent::fallback`] so the pipeline always has a route.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Intent {
    pub agent: AgentKind,
    pub action: String,
    #[serde(default)]
    pub parameters: serde_json::Map<String, Value>,
}

impl Intent {
    pub fn fallback() -> Self {
        Self {
            agent: AgentKind::System,
            action: "help".to_string(),
            parameters: serde_json::Map::new(),
        }
    }

    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).and_then(Value::as_str)
    }
}

/// Reply returned to chat and websocket clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentReply {
    pub response: String,
    pub agent_type: String,
    pub sub_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}
