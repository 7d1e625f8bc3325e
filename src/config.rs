//! Configuration module for environment variables and application settings

use std::env;
use anyhow::{Result, anyhow};

/// Session secret used when SESSION_SECRET is unset. Fine for local
/// development, loudly logged otherwise.
const INSECURE_SESSION_SECRET: &str = "your-secret-key";

#[derive(Debug, Clone)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Session/auth configuration
    pub session: SessionConfig,

    /// Language model configuration
    pub ai: AiConfig,

    /// Transaction-intent upstream configuration
    pub execution: ExecutionConfig,

    /// Market data upstream configuration
    pub market: MarketConfig,

    /// Platform signing key (0x-prefixed secp256k1) used as the custodial
    /// fallback account for on-chain intents
    pub platform_signing_key: String,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub secret: String,
    pub ttl_days: i64,
}

#[derive(Debug, Clone)]
pub struct AiConfig {
    pub api_key: String,
    pub model: String,
}

#[derive(Debug, Clone)]
pub struct ExecutionConfig {
    pub api_key: String,
    pub base_url: String,
}

#[derive(Debug, Clone)]
pub struct MarketConfig {
    pub base_url: String,
    pub feed_url: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let secret = env::var("SESSION_SECRET").unwrap_or_else(|_| {
            tracing::warn!("SESSION_SECRET not set, using an insecure default");
            INSECURE_SESSION_SECRET.to_string()
        });

        Ok(Self {
            server: ServerConfig {
                host: env::var("SERVER_HOST")
                    .unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env::var("PORT")
                    .unwrap_or_else(|_| "5000".to_string())
                    .parse()
                    .unwrap_or(5000),
                allowed_origins: env::var("ALLOWED_ORIGINS")
                    .unwrap_or_else(|_| {
                        "http://localhost:3000,http://localhost:5173".to_string()
                    })
                    .split(',')
                    .map(|origin| origin.trim().to_string())
                    .filter(|origin| !origin.is_empty())
                    .collect(),
            },

            database: DatabaseConfig {
                url: env::var("DATABASE_URL")
                    .map_err(|_| anyhow!("DATABASE_URL environment variable is required"))?,
                max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                    .unwrap_or_else(|_| "16".to_string())
                    .parse()
                    .unwrap_or(16),
            },

            session: SessionConfig {
                secret,
                ttl_days: env::var("SESSION_TTL_DAYS")
                    .unwrap_or_else(|_| "7".to_string())
                    .parse()
                    .unwrap_or(7),
            },

            ai: AiConfig {
                api_key: env::var("OPENAI_API_KEY")
                    .map_err(|_| anyhow!("OPENAI_API_KEY environment variable is required"))?,
                model: env::var("OPENAI_MODEL")
                    .unwrap_or_else(|_| "gpt-4o".to_string()),
            },

            execution: ExecutionConfig {
                api_key: env::var("BRIAN_API_KEY")
                    .map_err(|_| anyhow!("BRIAN_API_KEY environment variable is required"))?,
                base_url: env::var("BRIAN_API_URL")
                    .unwrap_or_else(|_| "https://api.brianknows.org/api/v0".to_string()),
            },

            market: MarketConfig {
                base_url: env::var("MARKET_API_URL")
                    .unwrap_or_else(|_| "https://api.coingecko.com/api/v3".to_string()),
                feed_url: env::var("MARKET_FEED_URL")
                    .unwrap_or_else(|_| "wss://ws.coincap.io/prices".to_string()),
            },

            platform_signing_key: env::var("PLATFORM_PRIVATE_KEY")
                .map_err(|_| anyhow!("PLATFORM_PRIVATE_KEY environment variable is required"))?,
        })
    }
}
