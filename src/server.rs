//! # Server Module
//!
//! Service wiring, router assembly, and server startup.

use axum::http::HeaderValue;
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::agent::ai_client::AiClient;
use crate::agent::AgentService;
use crate::auth::middleware::SessionAuth;
use crate::auth::session::SessionService;
use crate::config::Config;
use crate::database::connection::{DatabaseConfig, DatabaseConnection};
use crate::database::migrations;
use crate::error::AppError;
use crate::execution::ExecutionClient;
use crate::market::{MarketDataGateway, PriceFeedManager};
use crate::routes::auth as auth_routes;
use crate::routes::chat as chat_routes;
use crate::routes::health::ping;
use crate::routes::wallet as wallet_routes;
use crate::storage::{PgStorage, Storage};
use crate::wallet::derive_evm_address;
use crate::ws::{ws_handler, ConnectionRegistry};

/// Application state shared across all route handlers
#[derive(Clone)]
pub struct AppState {
    pub agent: Arc<AgentService>,
    pub feed: Arc<PriceFeedManager>,
    pub sessions: Arc<SessionService>,
    pub storage: Arc<dyn Storage>,
    pub registry: Arc<ConnectionRegistry>,
}

/// Wire every service together from configuration. Storage is injected so
/// tests can run the full stack against in-memory state.
pub fn build_state(config: &Config, storage: Arc<dyn Storage>) -> Result<AppState, AppError> {
    let platform_address = derive_evm_address(&config.platform_signing_key)?;
    tracing::info!("🔑 Platform account: {}", platform_address);

    let ai = Arc::new(
        AiClient::new(config.ai.api_key.clone()).with_model(config.ai.model.clone()),
    );
    let market = Arc::new(MarketDataGateway::new().with_base_url(config.market.base_url.clone()));
    let execution = Arc::new(
        ExecutionClient::new(config.execution.api_key.clone())
            .with_base_url(config.execution.base_url.clone()),
    );
    let agent = Arc::new(AgentService::new(
        ai,
        market,
        execution,
        storage.clone(),
        platform_address,
    ));

    let sessions = Arc::new(
        SessionService::new(&config.session.secret)
            .with_ttl(chrono::Duration::days(config.session.ttl_days)),
    );
    let registry = Arc::new(ConnectionRegistry::new());
    let feed = Arc::new(PriceFeedManager::new().with_feed_url(config.market.feed_url.clone()));

    Ok(AppState {
        agent,
        feed,
        sessions,
        storage,
        registry,
    })
}

/// Assemble the router: public routes, session-protected routes, CORS, and
/// request tracing.
pub fn build_router(state: AppState, allowed_origins: &[String]) -> Router {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("ignoring unparseable CORS origin {:?}", origin);
                None
            }
        })
        .collect();

    // Session-protected endpoints. The websocket upgrade sits behind the same
    // middleware, so an unauthenticated upgrade is rejected with 401 before
    // any frame is exchanged.
    let protected = Router::new()
        .route("/api/user", get(auth_routes::me))
        .route("/api/update-wallet", post(wallet_routes::update_wallet))
        .route("/ws", get(ws_handler))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            SessionAuth::validate,
        ));

    Router::new()
        .route("/ping", get(ping)) // Health check endpoint
        .route("/api/chat", post(chat_routes::chat))
        .merge(auth_routes::create_routes())
        .merge(protected)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(
                    CorsLayer::new()
                        .allow_origin(AllowOrigin::list(origins))
                        .allow_methods([
                            axum::http::Method::GET,
                            axum::http::Method::POST,
                            axum::http::Method::OPTIONS,
                        ])
                        .allow_headers([
                            axum::http::header::ORIGIN,
                            axum::http::header::CONTENT_TYPE,
                            axum::http::header::ACCEPT,
                            axum::http::header::AUTHORIZATION,
                        ])
                        .allow_credentials(true), // Allow cookies for auth
                ),
        )
        .with_state(state)
}

/// Start the server: connect storage, run migrations, wire services, spawn
/// the heartbeat driver, and serve until the process is terminated.
pub async fn start(config: Config) -> anyhow::Result<()> {
    let mut db_config = DatabaseConfig::from_url(&config.database.url)?;
    db_config.max_size = config.database.max_connections as usize;
    let db = DatabaseConnection::new(db_config).await?;
    migrations::run_migrations(db.pool()).await?;
    let storage: Arc<dyn Storage> = Arc::new(PgStorage::new(db));

    let state = build_state(&config, storage)?;
    tokio::spawn(state.registry.clone().run_heartbeat());

    let app = build_router(state, &config.server.allowed_origins);

    let addr: std::net::SocketAddr =
        format!("{}:{}", config.server.host, config.server.port).parse()?;
    let listener = TcpListener::bind(addr).await?;

    // Log server startup information
    tracing::info!("🚀 Chat server starting...");
    tracing::info!("📡 Listening on http://{}", addr);
    tracing::info!("🏥 Health check available at http://{}/ping", addr);
    tracing::info!("💬 Chat endpoint available at http://{}/api/chat", addr);
    tracing::info!("🔌 Websocket available at ws://{}/ws", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
