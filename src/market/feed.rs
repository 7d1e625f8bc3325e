//! Real-time price feed manager.
//!
//! Multiplexes per-asset upstream websocket subscriptions into one broadcast
//! channel. Each subscription runs as its own task with exponential reconnect
//! backoff; after the reconnect budget is spent the task emits a terminal
//! event and stops, leaving the decision to resubscribe with the caller.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::StreamExt;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

const DEFAULT_FEED_URL: &str = "wss://ws.coincap.io/prices";
const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);
const MAX_RECONNECT_ATTEMPTS: u32 = 5;
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Events published by feed tasks.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    /// A tick from the upstream: asset id to price string.
    PriceUpdate(HashMap<String, String>),
    /// A connection-level failure; the task will retry unless the budget
    /// is spent.
    Error { asset_id: String, message: String },
    /// The reconnect budget for this asset is exhausted and its task has
    /// stopped.
    MaxReconnectAttemptsReached { asset_id: String },
}

/// Owns one upstream websocket task per subscribed asset.
pub struct PriceFeedManager {
    feed_url: String,
    base_delay: Duration,
    events: broadcast::Sender<FeedEvent>,
    connections: DashMap<String, JoinHandle<()>>,
}

impl PriceFeedManager {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            feed_url: DEFAULT_FEED_URL.to_string(),
            base_delay: DEFAULT_BASE_DELAY,
            events,
            connections: DashMap::new(),
        }
    }

    pub fn with_feed_url(mut self, feed_url: impl Into<String>) -> Self {
        self.feed_url = feed_url.into();
        self
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    /// Receiver for all feed events across every subscribed asset.
    pub fn subscribe_events(&self) -> broadcast::Receiver<FeedEvent> {
        self.events.subscribe()
    }

    /// Start streaming ticks for an asset. Subscribing twice is a no-op.
    pub fn subscribe(&self, asset_id: &str) {
        match self.connections.entry(asset_id.to_string()) {
            Entry::Occupied(_) => {
                tracing::debug!("already subscribed to price feed for {}", asset_id);
            }
            Entry::Vacant(slot) => {
                let url = format!("{}?assets={}", self.feed_url, asset_id);
                let handle = tokio::spawn(run_feed(
                    url,
                    asset_id.to_string(),
                    self.base_delay,
                    self.events.clone(),
                ));
                slot.insert(handle);
                tracing::info!("subscribed to price feed for {}", asset_id);
            }
        }
    }

    /// Stop streaming ticks for an asset and drop its task.
    pub fn unsubscribe(&self, asset_id: &str) {
        if let Some((_, handle)) = self.connections.remove(asset_id) {
            handle.abort();
            tracing::info!("unsubscribed from price feed for {}", asset_id);
        }
    }

    pub fn is_subscribed(&self, asset_id: &str) -> bool {
        self.connections.contains_key(asset_id)
    }
}

async fn run_feed(
    url: String,
    asset_id: String,
    base_delay: Duration,
    events: broadcast::Sender<FeedEvent>,
) {
    let mut attempts: u32 = 0;
    loop {
        match connect_async(url.as_str()).await {
            Ok((mut stream, _)) => {
                tracing::info!("price feed connected for {}", asset_id);
                while let Some(message) = stream.next().await {
                    match message {
                        Ok(Message::Text(text)) => {
                            match serde_json::from_str::<HashMap<String, String>>(&text) {
                                Ok(prices) => {
                                    let _ = events.send(FeedEvent::PriceUpdate(prices));
                                }
                                Err(e) => {
                                    // Malformed ticks are dropped, not fatal.
                                    tracing::warn!(
                                        "dropping malformed feed tick for {}: {}",
                                        asset_id,
                                        e
                                    );
                                }
                            }
                        }
                        Ok(Message::Close(_)) => {
                            tracing::info!("price feed for {} closed by upstream", asset_id);
                            break;
                        }
                        Ok(_) => {}
                        Err(e) => {
                            let _ = events.send(FeedEvent::Error {
                                asset_id: asset_id.clone(),
                                message: e.to_string(),
                            });
                            break;
                        }
                    }
                }
            }
            Err(e) => {
                let _ = events.send(FeedEvent::Error {
                    asset_id: asset_id.clone(),
                    message: e.to_string(),
                });
            }
        }

        if attempts >= MAX_RECONNECT_ATTEMPTS {
            tracing::warn!(
                "price feed for {} stopping after {} reconnect attempts",
                asset_id,
                attempts
            );
            let _ = events.send(FeedEvent::MaxReconnectAttemptsReached { asset_id });
            return;
        }

        let delay = base_delay * 2u32.pow(attempts);
        attempts += 1;
        tracing::info!("price feed for {} reconnecting in {:?}", asset_id, delay);
        tokio::time::sleep(delay).await;
    }
}
