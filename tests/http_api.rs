//! End-to-end HTTP API tests.
//!
//! The full router is served on an ephemeral port with in-memory storage, and
//! exercised with a real HTTP client. Upstream services (completion API,
//! market data, transaction intents) are mocked per test.

use std::net::SocketAddr;
use std::sync::Arc;

use httpmock::prelude::*;
use serde_json::{json, Value};

use avachat_server::agent::ai_client::AiClient;
use avachat_server::agent::AgentService;
use avachat_server::auth::session::SessionService;
use avachat_server::execution::ExecutionClient;
use avachat_server::market::{MarketDataGateway, PriceFeedManager};
use avachat_server::storage::{MemStorage, Storage};
use avachat_server::ws::ConnectionRegistry;
use avachat_server::{build_router, AppState};

const PLATFORM_ADDRESS: &str = "0x0000000000000000000000000000000000001337";

fn test_state(ai: &MockServer, market: &MockServer, execution: &MockServer) -> AppState {
    let storage: Arc<dyn Storage> = Arc::new(MemStorage::new());
    let agent = Arc::new(AgentService::new(
        Arc::new(
            AiClient::new("test-key")
                .with_base_url(format!("{}/v1/chat/completions", ai.base_url())),
        ),
        Arc::new(MarketDataGateway::new().with_base_url(market.base_url())),
        Arc::new(ExecutionClient::new("exec-key").with_base_url(execution.base_url())),
        storage.clone(),
        PLATFORM_ADDRESS.to_string(),
    ));

    AppState {
        agent,
        feed: Arc::new(PriceFeedManager::new()),
        sessions: Arc::new(SessionService::new("test_secret")),
        storage,
        registry: Arc::new(ConnectionRegistry::new()),
    }
}

async fn spawn_server(state: AppState) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("listener address");
    let router = build_router(state, &[]);
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("serve");
    });
    addr
}

async fn mocked_server() -> (SocketAddr, MockServer, MockServer, MockServer) {
    let ai = MockServer::start_async().await;
    let market = MockServer::start_async().await;
    let execution = MockServer::start_async().await;
    let addr = spawn_server(test_state(&ai, &market, &execution)).await;
    (addr, ai, market, execution)
}

fn completion(content: &str) -> Value {
    json!({"choices": [{"message": {"content": content}}]})
}

/// Pull the `access_token=...` pair out of a Set-Cookie header so it can be
/// sent back manually. The test client does not keep a cookie jar.
fn session_cookie(response: &reqwest::Response) -> String {
    response
        .headers()
        .get(reqwest::header::SET_COOKIE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .map(|pair| pair.to_string())
        .expect("response should carry a session cookie")
}

async fn register(client: &reqwest::Client, addr: SocketAddr, username: &str) -> String {
    let response = client
        .post(format!("http://{addr}/api/register"))
        .json(&json!({"username": username, "password": "hunter2"}))
        .send()
        .await
        .expect("register request");
    assert_eq!(response.status(), reqwest::StatusCode::CREATED);
    session_cookie(&response)
}

#[tokio::test]
async fn ping_answers_pong() {
    let (addr, _ai, _market, _execution) = mocked_server().await;

    let response = reqwest::get(format!("http://{addr}/ping")).await.unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({"status": "pong"}));
}

#[tokio::test]
async fn register_issues_a_session_and_normalizes_the_username() {
    let (addr, _ai, _market, _execution) = mocked_server().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("http://{addr}/api/register"))
        .json(&json!({"username": "  Ada ", "password": "hunter2"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::CREATED);

    let cookie = session_cookie(&response);
    assert!(cookie.starts_with("access_token="));

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["user"]["username"], "ada");
    assert_eq!(body["user"]["id"], 1);
    assert!(body["user"].get("passwordHash").is_none());
}

#[tokio::test]
async fn register_rejects_duplicates_and_missing_credentials() {
    let (addr, _ai, _market, _execution) = mocked_server().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("http://{addr}/api/register"))
        .json(&json!({"username": "", "password": "hunter2"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);

    register(&client, addr, "ada").await;
    let response = client
        .post(format!("http://{addr}/api/register"))
        .json(&json!({"username": "ADA", "password": "other"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::CONFLICT);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Username already exists");
}

#[tokio::test]
async fn login_checks_the_password() {
    let (addr, _ai, _market, _execution) = mocked_server().await;
    let client = reqwest::Client::new();
    register(&client, addr, "ada").await;

    let response = client
        .post(format!("http://{addr}/api/login"))
        .json(&json!({"username": "ada", "password": "wrong"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::UNAUTHORIZED);

    let response = client
        .post(format!("http://{addr}/api/login"))
        .json(&json!({"username": "ada", "password": "hunter2"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let cookie = session_cookie(&response);

    let response = client
        .get(format!("http://{addr}/api/user"))
        .header(reqwest::header::COOKIE, cookie)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["username"], "ada");
}

#[tokio::test]
async fn protected_routes_reject_anonymous_requests() {
    let (addr, _ai, _market, _execution) = mocked_server().await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("http://{addr}/api/user"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::UNAUTHORIZED);

    let response = client
        .post(format!("http://{addr}/api/update-wallet"))
        .json(&json!({"avalancheAddress": "0xabc", "privateKey": "0xdef"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn logout_revokes_the_session_server_side() {
    let (addr, _ai, _market, _execution) = mocked_server().await;
    let client = reqwest::Client::new();
    let cookie = register(&client, addr, "ada").await;

    let response = client
        .get(format!("http://{addr}/api/user"))
        .header(reqwest::header::COOKIE, cookie.clone())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    let response = client
        .post(format!("http://{addr}/api/logout"))
        .header(reqwest::header::COOKIE, cookie.clone())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::NO_CONTENT);

    // The token still carries a valid signature, but its session row is gone.
    let response = client
        .get(format!("http://{addr}/api/user"))
        .header(reqwest::header::COOKIE, cookie)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn update_wallet_links_an_address_without_echoing_credentials() {
    let (addr, _ai, _market, _execution) = mocked_server().await;
    let client = reqwest::Client::new();
    let cookie = register(&client, addr, "ada").await;

    let response = client
        .post(format!("http://{addr}/api/update-wallet"))
        .header(reqwest::header::COOKIE, cookie.clone())
        .json(&json!({
            "avalancheAddress": "0x00000000000000000000000000000000000000aa",
            "privateKey": "0xsecret"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    let body: Value = response.json().await.unwrap();
    assert_eq!(
        body["chainAddress"],
        "0x00000000000000000000000000000000000000aa"
    );
    assert!(body.get("privateKey").is_none());
    assert!(body.get("passwordHash").is_none());

    // The linked address shows up on subsequent profile reads.
    let response = client
        .get(format!("http://{addr}/api/user"))
        .header(reqwest::header::COOKIE, cookie)
        .send()
        .await
        .unwrap();
    let body: Value = response.json().await.unwrap();
    assert_eq!(
        body["chainAddress"],
        "0x00000000000000000000000000000000000000aa"
    );
}

#[tokio::test]
async fn update_wallet_requires_an_address() {
    let (addr, _ai, _market, _execution) = mocked_server().await;
    let client = reqwest::Client::new();
    let cookie = register(&client, addr, "ada").await;

    let response = client
        .post(format!("http://{addr}/api/update-wallet"))
        .header(reqwest::header::COOKIE, cookie)
        .json(&json!({"avalancheAddress": "  ", "privateKey": "0xsecret"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "avalancheAddress is required");
}

#[tokio::test]
async fn chat_rejects_blank_messages() {
    let (addr, _ai, _market, _execution) = mocked_server().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("http://{addr}/api/chat"))
        .json(&json!({"message": "   "}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Message is required");

    // A missing field defaults to empty and is rejected the same way.
    let response = client
        .post(format!("http://{addr}/api/chat"))
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn chat_runs_the_full_pipeline_for_anonymous_users() {
    let (addr, ai, market, execution) = mocked_server().await;
    let client = reqwest::Client::new();

    let classify = ai
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v1/chat/completions")
                .body_contains("intent classifier");
            then.status(200).json_body(completion(
                &json!({"agent": "system", "action": "networks", "parameters": {}}).to_string(),
            ));
        })
        .await;
    let format = ai
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v1/chat/completions")
                .body_contains("response formatter");
            then.status(200)
                .json_body(completion("### Supported Networks\n\nSuccess"));
        })
        .await;
    // A system intent must resolve locally.
    let market_catchall = market
        .mock_async(|when, then| {
            when.method(GET);
            then.status(200).json_body(json!({}));
        })
        .await;
    let execution_catchall = execution
        .mock_async(|when, then| {
            when.method(POST);
            then.status(200).json_body(json!({"result": []}));
        })
        .await;

    let response = client
        .post(format!("http://{addr}/api/chat"))
        .json(&json!({"message": "Show supported networks"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["agentType"], "system");
    assert_eq!(body["subType"], "networks");
    assert!(body["response"].as_str().unwrap().contains("Success"));

    classify.assert_async().await;
    format.assert_async().await;
    assert_eq!(market_catchall.hits_async().await, 0);
    assert_eq!(execution_catchall.hits_async().await, 0);
}
