//! Chat endpoint.
//!
//! Anonymous REST entry into the agent pipeline. Authenticated, stateful chat
//! goes over the websocket instead.

use axum::{extract::State, http::StatusCode, response::Json};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::agent::types::AgentReply;
use crate::server::AppState;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
}

/// Run one chat message through the agent pipeline
///
/// # Route
/// - **Method**: POST
/// - **Path**: `/api/chat`
///
/// Without a session, transactions are planned against the platform account.
/// The pipeline absorbs its own failures, so a valid request always gets a
/// 200 with a reply (possibly an error-typed one).
pub async fn chat(
    State(state): State<AppState>,
    Json(payload): Json<ChatRequest>,
) -> Result<Json<AgentReply>, (StatusCode, Json<Value>)> {
    if payload.message.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Message is required" })),
        ));
    }

    let reply = state.agent.process_message(&payload.message, None).await;
    Ok(Json(reply))
}
