//! Websocket frame protocol.
//!
//! Inbound frames are tagged by `type`; unknown tags are tolerated so older
//! clients can send frames this server ignores. Outbound frames wrap their
//! payload under `data`.

use serde::{Deserialize, Serialize};

use crate::agent::types::AgentReply;

/// Frames accepted from clients.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientFrame {
    /// A chat message to run through the agent pipeline.
    Request { content: String },
    /// A structurally valid frame with a type this server does not handle.
    #[serde(other)]
    Other,
}

/// Frames sent to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum ServerFrame {
    Success { message: String },
    Error { error: String },
    Response(AgentReply),
}

impl ServerFrame {
    pub fn success(message: impl Into<String>) -> Self {
        ServerFrame::Success {
            message: message.into(),
        }
    }

    pub fn error(error: impl Into<String>) -> Self {
        ServerFrame::Error {
            error: error.into(),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            r#"{"type":"error","data":{"error":"internal serialization failure"}}"#.to_string()
        })
    }
}
