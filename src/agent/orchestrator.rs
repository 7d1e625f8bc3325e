//! Agent orchestrator.
//!
//! Drives a chat message through the full pipeline: classify, resolve the
//! acting address, dispatch to the owning agent, then format whatever came
//! back. Failures inside an agent are captured and formatted; failures of
//! the pipeline itself collapse into an error reply. Callers never see an
//! `Err`.

use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

use crate::agent::ai_client::AiClient;
use crate::agent::classifier;
use crate::agent::formatter;
use crate::agent::system_info;
use crate::agent::types::{AgentKind, AgentReply, Intent};
use crate::error::AppError;
use crate::execution::ExecutionClient;
use crate::market::MarketDataGateway;
use crate::storage::Storage;

const DEFAULT_CHAIN_ID: u64 = 43113;
const DEFAULT_ASSET_ID: &str = "avalanche-2";
const DEFAULT_CHART_DAYS: u32 = 7;
const DEFAULT_RELATION_DEPTH: u32 = 2;
const DEFAULT_PATTERN_TIMEFRAME: &str = "7d";
const MIN_PATTERN_CONFIDENCE: f64 = 0.7;

const LAST_RESORT_REPLY: &str = "An unexpected error occurred. Please try again later.";

/// The chat pipeline and the services it dispatches to.
pub struct AgentService {
    ai: Arc<AiClient>,
    market: Arc<MarketDataGateway>,
    execution: Arc<ExecutionClient>,
    storage: Arc<dyn Storage>,
    platform_address: String,
}

impl AgentService {
    pub fn new(
        ai: Arc<AiClient>,
        market: Arc<MarketDataGateway>,
        execution: Arc<ExecutionClient>,
        storage: Arc<dyn Storage>,
        platform_address: String,
    ) -> Self {
        Self {
            ai,
            market,
            execution,
            storage,
            platform_address,
        }
    }

    /// Process one chat message. This never fails: agent errors are turned
    /// into formatted explanations, and pipeline errors into an error reply.
    pub async fn process_message(&self, message: &str, user_id: Option<i64>) -> AgentReply {
        match self.try_process(message, user_id).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::error!("chat pipeline failed: {}", e);
                let response = match formatter::explain_error(&self.ai, &e.to_string()).await {
                    Ok(text) => text,
                    Err(explain_err) => {
                        tracing::error!("error explainer failed: {}", explain_err);
                        LAST_RESORT_REPLY.to_string()
                    }
                };
                AgentReply {
                    response,
                    agent_type: "error".to_string(),
                    sub_type: "processing_error".to_string(),
                    details: None,
                }
            }
        }
    }

    async fn try_process(
        &self,
        message: &str,
        user_id: Option<i64>,
    ) -> Result<AgentReply, AppError> {
        let intent = classifier::classify(&self.ai, message).await?;
        tracing::info!("classified message as {}/{}", intent.agent, intent.action);

        let address = self.resolve_acting_address(user_id).await;

        let (result, error) = match self.dispatch(&intent, message, &address).await {
            Ok(value) => (Some(value), None),
            Err(e) => {
                tracing::warn!("{} agent failed: {}", intent.agent, e);
                (None, Some(format!("{} action failed: {}", intent.agent, e)))
            }
        };

        let response =
            formatter::format_response(&self.ai, &intent, result.as_ref(), error.as_deref())
                .await?;

        Ok(AgentReply {
            response,
            agent_type: intent.agent.as_str().to_string(),
            sub_type: intent.action,
            details: result,
        })
    }

    /// Address transactions are planned against. A stored user wallet wins;
    /// without one the platform account acts on the user's behalf. The
    /// custodial fallback is confined to this method.
    async fn resolve_acting_address(&self, user_id: Option<i64>) -> String {
        if let Some(id) = user_id {
            match self.storage.get_user(id).await {
                Ok(Some(user)) => {
                    if let Some(address) = user.chain_address.filter(|a| !a.is_empty()) {
                        return address;
                    }
                }
                Ok(None) => {}
                Err(e) => tracing::warn!("address lookup failed for user {}: {}", id, e),
            }
        }
        self.platform_address.clone()
    }

    async fn dispatch(
        &self,
        intent: &Intent,
        message: &str,
        address: &str,
    ) -> Result<Value, AppError> {
        match intent.agent {
            AgentKind::Tools => self.dispatch_market(intent).await,
            AgentKind::Defi | AgentKind::Bridge => {
                let prompt = intent.param_str("prompt").unwrap_or(message);
                let steps = self
                    .execution
                    .transact(prompt, address, DEFAULT_CHAIN_ID)
                    .await?;
                Ok(Value::Array(steps))
            }
            AgentKind::System => Self::dispatch_system(intent),
            AgentKind::Analytics => self.dispatch_analytics(intent, message).await,
        }
    }

    async fn dispatch_market(&self, intent: &Intent) -> Result<Value, AppError> {
        let asset = intent
            .param_str("asset")
            .or_else(|| intent.param_str("assetId"))
            .unwrap_or(DEFAULT_ASSET_ID);
        match intent.action.as_str() {
            "price" => to_value(&self.market.price(asset).await?),
            "chart" => {
                let days = intent
                    .parameters
                    .get("days")
                    .and_then(Value::as_u64)
                    .map(|d| d as u32)
                    .unwrap_or(DEFAULT_CHART_DAYS);
                to_value(&self.market.chart(asset, days).await?)
            }
            "trending" => to_value(&self.market.trending().await?),
            other => Err(AppError::Unsupported(format!(
                "Unsupported tools action: {other}"
            ))),
        }
    }

    /// System intents are served from the static catalog, never an upstream.
    fn dispatch_system(intent: &Intent) -> Result<Value, AppError> {
        match intent.action.as_str() {
            "networks" => Ok(system_info::supported_networks()),
            "actions" => Ok(system_info::supported_actions()),
            "help" | "clarify" => Ok(Value::String(system_info::help_text())),
            other => Err(AppError::Unsupported(format!(
                "Unsupported system action: {other}"
            ))),
        }
    }

    async fn dispatch_analytics(
        &self,
        intent: &Intent,
        message: &str,
    ) -> Result<Value, AppError> {
        match intent.action.as_str() {
            "query" => {
                let query = intent.param_str("query").unwrap_or(message);
                self.execution.query_knowledge(query).await
            }
            "analyze" => {
                let id = intent.param_str("id").ok_or_else(|| {
                    AppError::Unsupported("analytics analyze requires an entity id".to_string())
                })?;
                self.execution.analytics(id).await
            }
            "relations" => {
                let id = intent.param_str("id").ok_or_else(|| {
                    AppError::Unsupported("analytics relations requires an entity id".to_string())
                })?;
                let depth = intent
                    .parameters
                    .get("depth")
                    .and_then(Value::as_u64)
                    .map(|d| d as u32)
                    .unwrap_or(DEFAULT_RELATION_DEPTH);
                self.execution.relations(id, depth).await
            }
            "patterns" => {
                let timeframe = intent
                    .param_str("timeframe")
                    .unwrap_or(DEFAULT_PATTERN_TIMEFRAME);
                self.execution
                    .patterns(timeframe, MIN_PATTERN_CONFIDENCE)
                    .await
            }
            other => Err(AppError::Unsupported(format!(
                "Unsupported analytics action: {other}"
            ))),
        }
    }
}

fn to_value<T: Serialize>(value: &T) -> Result<Value, AppError> {
    serde_json::to_value(value)
        .map_err(|e| AppError::InvalidResponse(format!("failed to encode agent result: {e}")))
}
