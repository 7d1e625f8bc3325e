//! Market data gateway.
//!
//! Single entry point for upstream market data. Every call goes through the
//! response cache first, then the fixed-window rate limiter, so burst traffic
//! from chat users cannot exhaust the upstream quota.

use reqwest::{header, Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

use crate::error::AppError;
use crate::market::cache::ResponseCache;
use crate::market::rate_limit::RateLimiter;
use crate::market::types::{AssetPrice, MarketChart, SimplePriceEntry, TrendingResponse};

const DEFAULT_BASE_URL: &str = "https://api.coingecko.com/api/v3";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const PRICE_CACHE_TTL: Duration = Duration::from_secs(30);
const SLOW_CACHE_TTL: Duration = Duration::from_secs(300);
const MAX_REQUESTS_PER_WINDOW: u32 = 10;
const RATE_WINDOW: Duration = Duration::from_secs(60);

/// Rate-limited, cached client for the upstream market data API.
pub struct MarketDataGateway {
    client: Client,
    base_url: String,
    timeout: Duration,
    limiter: RateLimiter,
    cache: ResponseCache,
}

impl MarketDataGateway {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: REQUEST_TIMEOUT,
            limiter: RateLimiter::new(MAX_REQUESTS_PER_WINDOW, RATE_WINDOW),
            cache: ResponseCache::new(),
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

    /// Current spot price with 24h change and volume.
    pub async fn price(&self, asset_id: &str) -> Result<AssetPrice, AppError> {
        let key = format!("/simple/price?ids={asset_id}");
        if let Some(hit) = self.cache.get(&key) {
            tracing::debug!("market cache hit: {}", key);
            return from_cached(hit);
        }

        self.acquire_slot()?;
        let path = format!(
            "/simple/price?ids={asset_id}&vs_currencies=usd&include_24hr_change=true&include_24hr_vol=true"
        );
        let rows: HashMap<String, SimplePriceEntry> = self.fetch(&path).await?;
        let entry = rows.get(asset_id).ok_or_else(|| {
            AppError::InvalidResponse(format!("no price data for {asset_id}"))
        })?;

        let price = AssetPrice {
            asset_id: asset_id.to_string(),
            price: entry.usd,
            change_24h: entry.usd_24h_change.unwrap_or(0.0),
            volume_24h: entry.usd_24h_vol.unwrap_or(0.0),
        };
        self.cache_value(&key, &price, PRICE_CACHE_TTL);
        Ok(price)
    }

    /// Historical price chart over `days` days.
    pub async fn chart(&self, asset_id: &str, days: u32) -> Result<MarketChart, AppError> {
        let key = format!("/coins/{asset_id}/market_chart?days={days}");
        if let Some(hit) = self.cache.get(&key) {
            tracing::debug!("market cache hit: {}", key);
            return from_cached(hit);
        }

        self.acquire_slot()?;
        let path = format!("/coins/{asset_id}/market_chart?vs_currency=usd&days={days}");
        let chart: MarketChart = self.fetch(&path).await?;
        self.cache_value(&key, &chart, SLOW_CACHE_TTL);
        Ok(chart)
    }

    /// Assets trending on the upstream in the last 24h.
    pub async fn trending(&self) -> Result<TrendingResponse, AppError> {
        let key = "/search/trending";
        if let Some(hit) = self.cache.get(key) {
            tracing::debug!("market cache hit: {}", key);
            return from_cached(hit);
        }

        self.acquire_slot()?;
        let trending: TrendingResponse = self.fetch(key).await?;
        self.cache_value(key, &trending, SLOW_CACHE_TTL);
        Ok(trending)
    }

    fn acquire_slot(&self) -> Result<(), AppError> {
        self.limiter.try_acquire().map_err(|retry_after_secs| {
            tracing::warn!("market rate limit reached, retry in {}s", retry_after_secs);
            AppError::RateLimited { retry_after_secs }
        })
    }

    fn cache_value<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) {
        match serde_json::to_value(value) {
            Ok(value) => self.cache.put(key, value, ttl),
            Err(e) => tracing::warn!("failed to cache market response for {}: {}", key, e),
        }
    }

    async fn fetch<T: DeserializeOwned>(&self, path: &str) -> Result<T, AppError> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!("market request: GET {}", path);

        let response = self.client.get(&url).timeout(self.timeout).send().await?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(header::RETRY_AFTER)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.parse::<u64>().ok())
                .unwrap_or(60);
            return Err(AppError::RateLimited { retry_after_secs });
        }
        if status == StatusCode::FORBIDDEN {
            return Err(AppError::UpstreamUnauthorized);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| {
            AppError::InvalidResponse(format!("market payload did not match expected schema: {e}"))
        })
    }
}

fn from_cached<T: DeserializeOwned>(value: Value) -> Result<T, AppError> {
    serde_json::from_value(value)
        .map_err(|e| AppError::InvalidResponse(format!("cached market payload was corrupt: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn gateway(server: &MockServer) -> MarketDataGateway {
        MarketDataGateway::new().with_base_url(server.base_url())
    }

    #[tokio::test]
    async fn price_normalizes_upstream_rows() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/simple/price")
                    .query_param("ids", "avalanche-2")
                    .query_param("vs_currencies", "usd");
                then.status(200).json_body(json!({
                    "avalanche-2": {
                        "usd": 34.21,
                        "usd_24h_change": -1.73,
                        "usd_24h_vol": 281_450_000.5
                    }
                }));
            })
            .await;

        let price = gateway(&server).price("avalanche-2").await.unwrap();
        mock.assert_async().await;
        assert_eq!(price.asset_id, "avalanche-2");
        assert_eq!(price.price, 34.21);
        assert_eq!(price.change_24h, -1.73);
        assert_eq!(price.volume_24h, 281_450_000.5);
    }

    #[tokio::test]
    async fn price_defaults_missing_optional_fields() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/simple/price");
                then.status(200).json_body(json!({"bitcoin": {"usd": 64000.0}}));
            })
            .await;

        let price = gateway(&server).price("bitcoin").await.unwrap();
        assert_eq!(price.change_24h, 0.0);
        assert_eq!(price.volume_24h, 0.0);
    }

    #[tokio::test]
    async fn cached_price_is_served_without_a_second_upstream_call() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/simple/price");
                then.status(200)
                    .json_body(json!({"avalanche-2": {"usd": 34.21, "usd_24h_change": 0.4}}));
            })
            .await;

        let gateway = gateway(&server);
        let first = gateway.price("avalanche-2").await.unwrap();
        let second = gateway.price("avalanche-2").await.unwrap();

        assert_eq!(mock.hits_async().await, 1);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[tokio::test]
    async fn upstream_429_carries_retry_after_through() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/simple/price");
                then.status(429).header("Retry-After", "42");
            })
            .await;

        let err = gateway(&server).price("avalanche-2").await.unwrap_err();
        match err {
            AppError::RateLimited { retry_after_secs } => assert_eq!(retry_after_secs, 42),
            other => panic!("expected RateLimited, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn upstream_429_without_header_defaults_to_sixty() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/simple/price");
                then.status(429);
            })
            .await;

        let err = gateway(&server).price("avalanche-2").await.unwrap_err();
        match err {
            AppError::RateLimited { retry_after_secs } => assert_eq!(retry_after_secs, 60),
            other => panic!("expected RateLimited, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn upstream_403_maps_to_unauthorized() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/search/trending");
                then.status(403).body("blocked");
            })
            .await;

        let err = gateway(&server).trending().await.unwrap_err();
        assert!(matches!(err, AppError::UpstreamUnauthorized));
    }

    #[tokio::test]
    async fn upstream_5xx_maps_to_upstream_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/simple/price");
                then.status(503).body("maintenance");
            })
            .await;

        let err = gateway(&server).price("avalanche-2").await.unwrap_err();
        match err {
            AppError::Upstream { status, body } => {
                assert_eq!(status, 503);
                assert_eq!(body, "maintenance");
            }
            other => panic!("expected Upstream, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn schema_mismatch_maps_to_invalid_response() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/coins/avalanche-2/market_chart");
                then.status(200).json_body(json!({"prices": "not-an-array"}));
            })
            .await;

        let err = gateway(&server).chart("avalanche-2", 7).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn missing_asset_row_maps_to_invalid_response() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/simple/price");
                then.status(200).json_body(json!({}));
            })
            .await;

        let err = gateway(&server).price("avalanche-2").await.unwrap_err();
        match err {
            AppError::InvalidResponse(msg) => assert!(msg.contains("avalanche-2")),
            other => panic!("expected InvalidResponse, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn slow_upstream_times_out() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/simple/price");
                then.status(200)
                    .json_body(json!({"bitcoin": {"usd": 1.0}}))
                    .delay(Duration::from_millis(300));
            })
            .await;

        let gateway = gateway(&server).with_timeout(Duration::from_millis(50));
        let err = gateway.price("bitcoin").await.unwrap_err();
        assert!(matches!(err, AppError::Timeout));
    }

    #[tokio::test]
    async fn eleventh_request_in_window_is_rejected_locally() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/simple/price");
                then.status(200).json_body(json!({
                    "a-0": {"usd": 1.0}, "a-1": {"usd": 1.0}, "a-2": {"usd": 1.0},
                    "a-3": {"usd": 1.0}, "a-4": {"usd": 1.0}, "a-5": {"usd": 1.0},
                    "a-6": {"usd": 1.0}, "a-7": {"usd": 1.0}, "a-8": {"usd": 1.0},
                    "a-9": {"usd": 1.0}, "a-10": {"usd": 1.0}
                }));
            })
            .await;

        let gateway = gateway(&server);
        for i in 0..10 {
            gateway.price(&format!("a-{i}")).await.unwrap();
        }

        let err = gateway.price("a-10").await.unwrap_err();
        match err {
            AppError::RateLimited { retry_after_secs } => assert!(retry_after_secs <= 60),
            other => panic!("expected RateLimited, got {other:?}"),
        }
        assert_eq!(mock.hits_async().await, 10);
    }

    #[tokio::test]
    async fn chart_decodes_series() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/coins/avalanche-2/market_chart")
                    .query_param("days", "7");
                then.status(200).json_body(json!({
                    "prices": [[1_700_000_000_000.0, 33.5], [1_700_000_360_000.0, 33.9]],
                    "market_caps": [[1_700_000_000_000.0, 1.2e10]],
                    "total_volumes": [[1_700_000_000_000.0, 2.8e8]]
                }));
            })
            .await;

        let chart = gateway(&server).chart("avalanche-2", 7).await.unwrap();
        assert_eq!(chart.prices.len(), 2);
        assert_eq!(chart.prices[0].1, 33.5);
        assert_eq!(chart.total_volumes.len(), 1);
    }

    #[tokio::test]
    async fn trending_decodes_items() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/search/trending");
                then.status(200).json_body(json!({
                    "coins": [
                        {"item": {"id": "avalanche-2", "name": "Avalanche", "symbol": "AVAX",
                                  "market_cap_rank": 12, "score": 0}},
                        {"item": {"id": "bitcoin", "name": "Bitcoin", "symbol": "BTC"}}
                    ]
                }));
            })
            .await;

        let trending = gateway(&server).trending().await.unwrap();
        assert_eq!(trending.coins.len(), 2);
        assert_eq!(trending.coins[0].item.symbol, "AVAX");
        assert_eq!(trending.coins[1].item.market_cap_rank, None);
    }
}
