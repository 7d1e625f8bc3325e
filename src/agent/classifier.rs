//! Intent classification.
//!
//! The first pipeline stage: a low-temperature JSON-mode completion that maps
//! a chat message onto a typed [`Intent`]. Anything the model returns that
//! does not parse falls back to the system help intent instead of failing the
//! request.

use crate::agent::ai_client::AiClient;
use crate::agent::types::Intent;
use crate::error::AppError;

const CLASSIFY_TEMPERATURE: f32 = 0.3;

const CLASSIFY_SYSTEM_PROMPT: &str = r#"You are the intent classifier for a DeFi assistant. Map the user's message to exactly one agent and action. Reply with a single JSON object and nothing else:

{"agent": "<defi|tools|bridge|system|analytics>", "action": "<action>", "parameters": {}}

Agents and their actions:
- defi: on-chain actions on one network. Actions: swap, transfer, deposit, withdraw, stake.
- tools: market data lookups. Actions: price, chart, trending. Parameters: asset (an asset id such as "avalanche-2" or "bitcoin"), days for charts.
- bridge: moving assets between networks. Action: bridge.
- system: questions about what this assistant can do. Actions: networks, actions, help.
- analytics: protocol knowledge and on-chain activity questions. Actions: query, analyze, relations, patterns. Parameters: query, id, depth, timeframe.

Examples:
"swap 1 AVAX for USDC" -> {"agent": "defi", "action": "swap", "parameters": {"prompt": "swap 1 AVAX for USDC"}}
"what's the AVAX price" -> {"agent": "tools", "action": "price", "parameters": {"asset": "avalanche-2"}}
"bridge 10 USDC to Base" -> {"agent": "bridge", "action": "bridge", "parameters": {"prompt": "bridge 10 USDC to Base"}}
"what networks do you support" -> {"agent": "system", "action": "networks", "parameters": {}}
"which protocols moved the most this week" -> {"agent": "analytics", "action": "patterns", "parameters": {"timeframe": "7d"}}

If you cannot tell what the user wants, answer {"agent": "system", "action": "help", "parameters": {}}."#;

/// Classify a chat message into an [`Intent`].
pub async fn classify(ai: &AiClient, message: &str) -> Result<Intent, AppError> {
    let raw = ai
        .complete_json(CLASSIFY_SYSTEM_PROMPT, message, CLASSIFY_TEMPERATURE)
        .await?;
    Ok(parse_intent(&raw))
}

/// Parse the model's JSON into an [`Intent`], falling back to the help
/// intent when the payload is malformed or names an unknown agent.
pub fn parse_intent(raw: &str) -> Intent {
    match serde_json::from_str::<Intent>(raw) {
        Ok(intent) => intent,
        Err(e) => {
            tracing::warn!("unparseable intent {:?}: {}", raw, e);
            Intent::fallback()
        }
    }
}
