//! # Market Data Module
//!
//! Cached, rate-limited access to the upstream market data API plus a
//! websocket price feed multiplexer for live ticks.

pub mod cache;
pub mod feed;
pub mod gateway;
pub mod rate_limit;
pub mod types;

pub use feed::{FeedEvent, PriceFeedManager};
pub use gateway::MarketDataGateway;
