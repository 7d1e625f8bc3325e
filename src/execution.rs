//! Transaction execution client.
//!
//! Thin client over the hosted execution API that turns natural-language
//! prompts into ready-to-sign transaction payloads, plus its knowledge-graph
//! query surface. All calls carry the API key header and a hard timeout.

use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;

use crate::error::AppError;

const DEFAULT_BASE_URL: &str = "https://api.brianknows.org/api/v0";
const API_KEY_HEADER: &str = "X-Brian-Api-Key";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for the transaction execution API.
pub struct ExecutionClient {
    client: Client,
    api_key: String,
    base_url: String,
    timeout: Duration,
}

impl ExecutionClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: REQUEST_TIMEOUT,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build transaction payloads for a natural-language prompt. The acting
    /// address is the account the upstream plans the transaction for.
    pub async fn transact(
        &self,
        prompt: &str,
        address: &str,
        chain_id: u64,
    ) -> Result<Vec<Value>, AppError> {
        let body = json!({
            "prompt": prompt,
            "address": address,
            "chainId": chain_id,
            "messages": [],
        });
        let payload = self.post("/agent", &body).await?;
        Ok(match take_result(payload) {
            Value::Array(items) => items,
            other => vec![other],
        })
    }

    /// Networks the execution API can transact on.
    pub async fn supported_networks(&self) -> Result<Value, AppError> {
        let payload = self.get("/utils/networks").await?;
        Ok(take_result(payload))
    }

    /// Actions the execution API understands.
    pub async fn supported_actions(&self) -> Result<Value, AppError> {
        let payload = self.get("/utils/actions").await?;
        Ok(take_result(payload))
    }

    /// Free-form question against the knowledge graph.
    pub async fn query_knowledge(&self, query: &str) -> Result<Value, AppError> {
        let body = json!({ "query": query, "includeMetadata": true });
        let payload = self.post("/graph/query", &body).await?;
        Ok(take_result(payload))
    }

    /// Analytics for a single graph entity.
    pub async fn analytics(&self, entity_id: &str) -> Result<Value, AppError> {
        let path = format!("/graph/analytics/{entity_id}");
        let payload = self.post(&path, &json!({})).await?;
        Ok(take_result(payload))
    }

    /// Relations around a graph entity up to `depth` hops.
    pub async fn relations(&self, entity_id: &str, depth: u32) -> Result<Value, AppError> {
        let path = format!("/graph/relations/{entity_id}");
        let body = json!({ "depth": depth, "includeProperties": true });
        let payload = self.post(&path, &body).await?;
        Ok(take_result(payload))
    }

    /// Detected activity patterns over a timeframe.
    pub async fn patterns(&self, timeframe: &str, min_confidence: f64) -> Result<Value, AppError> {
        let body = json!({ "timeframe": timeframe, "minConfidence": min_confidence });
        let payload = self.post("/graph/patterns", &body).await?;
        Ok(take_result(payload))
    }

    async fn get(&self, path: &str) -> Result<Value, AppError> {
        tracing::debug!("execution request: GET {}", path);
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .get(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .timeout(self.timeout)
            .send()
            .await?;
        Self::decode(path, response).await
    }

    async fn post(&self, path: &str, body: &Value) -> Result<Value, AppError> {
        tracing::debug!("execution request: POST {}", path);
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .post(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .timeout(self.timeout)
            .json(body)
            .send()
            .await?;
        Self::decode(path, response).await
    }

    async fn decode(path: &str, response: reqwest::Response) -> Result<Value, AppError> {
        let status = response.status();
        let text = response.text().await.unwrap_or_default();

        if !status.is_success() {
            let detail = serde_json::from_str::<Value>(&text)
                .ok()
                .and_then(|body| {
                    body.get("error")
                        .and_then(Value::as_str)
                        .map(|msg| msg.to_string())
                })
                .unwrap_or_else(|| {
                    status
                        .canonical_reason()
                        .unwrap_or("request failed")
                        .to_string()
                });
            return Err(AppError::Upstream {
                status: status.as_u16(),
                body: format!("{path} request failed: {detail}"),
            });
        }

        serde_json::from_str(&text).map_err(|e| {
            AppError::InvalidResponse(format!("execution payload was not valid JSON: {e}"))
        })
    }
}

/// Upstream responses wrap their payload in a `result` field; unwrap it when
/// present, otherwise pass the body through unchanged.
fn take_result(payload: Value) -> Value {
    match payload {
        Value::Object(mut map) => match map.remove("result") {
            Some(result) => result,
            None => Value::Object(map),
        },
        other => other,
    }
}
