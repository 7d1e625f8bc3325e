//! Market data payloads.
//!
//! Upstream shapes are deserialized strictly enough that a schema change
//! surfaces as `AppError::InvalidResponse` instead of silently corrupt data.

use serde::{Deserialize, Serialize};

/// One asset row in the upstream simple-price response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimplePriceEntry {
    pub usd: f64,
    #[serde(default)]
    pub usd_24h_change: Option<f64>,
    #[serde(default)]
    pub usd_24h_vol: Option<f64>,
}

/// Normalized spot price returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetPrice {
    pub asset_id: String,
    pub price: f64,
    pub change_24h: f64,
    pub volume_24h: f64,
}

/// Historical chart series as the upstream returns it: `[timestamp_ms, value]`
/// pairs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketChart {
    pub prices: Vec<(f64, f64)>,
    pub market_caps: Vec<(f64, f64)>,
    pub total_volumes: Vec<(f64, f64)>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendingResponse {
    pub coins: Vec<TrendingCoin>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendingCoin {
    pub item: TrendingItem,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendingItem {
    pub id: String,
    #[serde(default)]
    pub coin_id: Option<i64>,
    pub name: String,
    pub symbol: String,
    #[serde(default)]
    pub market_cap_rank: Option<i64>,
    #[serde(default)]
    pub thumb: Option<String>,
    #[serde(default)]
    pub score: Option<i64>,
}
