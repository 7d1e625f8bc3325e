//! Static capability catalog.
//!
//! System intents are answered from this module without touching any
//! upstream, so capability questions keep working when every external API is
//! down.

use serde_json::{json, Value};

/// Networks the assistant can transact on.
pub fn supported_networks() -> Value {
    json!([
        { "chainId": 43113, "name": "Avalanche Fuji", "testnet": true },
        { "chainId": 43114, "name": "Avalanche C-Chain", "testnet": false },
        { "chainId": 1, "name": "Ethereum", "testnet": false },
        { "chainId": 8453, "name": "Base", "testnet": false },
        { "chainId": 42161, "name": "Arbitrum One", "testnet": false },
        { "chainId": 137, "name": "Polygon", "testnet": false }
    ])
}

/// Actions grouped by the agent that handles them.
pub fn supported_actions() -> Value {
    json!({
        "defi": ["swap", "transfer", "deposit", "withdraw", "stake"],
        "tools": ["price", "chart", "trending"],
        "bridge": ["bridge"],
        "system": ["networks", "actions", "help"],
        "analytics": ["query", "analyze", "relations", "patterns"]
    })
}

pub fn help_text() -> String {
    concat!(
        "I can help you trade, look up market data, and answer questions about on-chain activity. Try:\n",
        "- \"Swap 1 AVAX for USDC\"\n",
        "- \"What's the AVAX price?\"\n",
        "- \"Bridge 10 USDC to Base\"\n",
        "- \"What networks do you support?\"\n",
        "- \"Which protocols were most active this week?\""
    )
    .to_string()
}
