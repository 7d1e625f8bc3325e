//! Response formatting.
//!
//! The last pipeline stage: a higher-temperature completion that turns raw
//! agent output (or a captured failure) into the markdown the frontend
//! renders.

use serde_json::{json, Value};

use crate::agent::ai_client::AiClient;
use crate::agent::types::Intent;
use crate::error::AppError;

const FORMAT_TEMPERATURE: f32 = 0.7;

const FORMAT_SYSTEM_PROMPT: &str = r#####"You are the response formatter for a DeFi assistant. You receive a JSON payload with the classified intent, the raw result of the action (if it succeeded), and an error message (if it failed). Write the reply the user sees.

Rules:
- Reply in markdown. Open with a "### " title line naming what happened.
- Include a "#### Transaction Status" section. Use "Success" when there is a result and an apology with the reason when there is an error.
- When the result contains transaction payloads, add "#### Transaction Details" summarizing them.
- When the result contains market data, add "#### Market Context" with the numbers that matter.
- Close with "#### Next Steps & Recommendations" containing one or two concrete suggestions.
- Never invent numbers that are not in the payload. Never show raw JSON, private keys, or API internals."#####;

const ERROR_SYSTEM_PROMPT: &str = r#"You are the error explainer for a DeFi assistant. You receive an internal error message. Write a short, polite markdown reply that tells the user what went wrong in plain language and what to try next. Never expose stack traces, URLs, or API internals."#;

const FORMAT_FALLBACK: &str = "Unable to process request. Please try again.";

/// Render the final user-facing reply for a processed intent.
pub async fn format_response(
    ai: &AiClient,
    intent: &Intent,
    result: Option<&Value>,
    error: Option<&str>,
) -> Result<String, AppError> {
    let payload = json!({
        "intent": intent,
        "result": result,
        "error": error,
    })
    .to_string();

    let content = ai
        .complete_text(FORMAT_SYSTEM_PROMPT, &payload, FORMAT_TEMPERATURE)
        .await?;
    if content.trim().is_empty() {
        return Ok(FORMAT_FALLBACK.to_string());
    }
    Ok(content)
}

/// Render a user-facing explanation for a pipeline-level failure.
pub async fn explain_error(ai: &AiClient, error: &str) -> Result<String, AppError> {
    let content = ai
        .complete_text(ERROR_SYSTEM_PROMPT, error, FORMAT_TEMPERATURE)
        .await?;
    if content.trim().is_empty() {
        return Ok(FORMAT_FALLBACK.to_string());
    }
    Ok(content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn client(server: &MockServer) -> AiClient {
        AiClient::new("test-key")
            .with_base_url(format!("{}/v1/chat/completions", server.base_url()))
    }

    #[tokio::test]
    async fn result_and_error_travel_in_the_payload() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/chat/completions")
                    .body_contains("response formatter")
                    .body_contains("tools action failed");
                then.status(200).json_body(json!({
                    "choices": [{"message": {"content": "### Sorry\n\n#### Transaction Status\nFailed"}}]
                }));
            })
            .await;

        let intent = Intent::fallback();
        let out = format_response(
            &client(&server),
            &intent,
            None,
            Some("tools action failed: request timed out"),
        )
        .await
        .unwrap();
        mock.assert_async().await;
        assert!(out.starts_with("### Sorry"));
    }

    #[tokio::test]
    async fn blank_completions_become_the_fallback_text() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/chat/completions");
                then.status(200)
                    .json_body(json!({"choices": [{"message": {"content": "  \n"}}]}));
            })
            .await;

        let out = explain_error(&client(&server), "boom").await.unwrap();
        assert_eq!(out, FORMAT_FALLBACK);
    }
}
