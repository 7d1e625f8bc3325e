//! Auth routes for registration, login, logout, and user info

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Extension, Json, Router};
use axum_extra::extract::cookie::{Cookie, SameSite};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use crate::auth::middleware::extract_token;
use crate::auth::models::AuthUser;
use crate::database::models::{SessionRecord, User};
use crate::server::AppState;
use crate::storage::NewUser;

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

/// Cookie carrying the session token. Its lifetime matches the session row,
/// so the browser drops the cookie when the server would reject it anyway.
fn session_cookie(token: String, record: &SessionRecord) -> Cookie<'static> {
    let mut cookie = Cookie::new("access_token", token);
    cookie.set_http_only(true);
    cookie.set_same_site(SameSite::Lax);
    cookie.set_path("/");
    let max_age = (record.expires_at - Utc::now()).num_seconds();
    if max_age > 0 {
        cookie.set_max_age(time::Duration::seconds(max_age));
    }
    cookie
}

fn clearing_cookie() -> Cookie<'static> {
    let mut cookie = Cookie::new("access_token", "");
    cookie.set_http_only(true);
    cookie.set_same_site(SameSite::Lax);
    cookie.set_path("/");
    cookie.set_max_age(time::Duration::seconds(0));
    cookie
}

/// Issue a token, persist the session row, and build the cookie response.
async fn issue_session(state: &AppState, user: &User, status: StatusCode) -> Response {
    let (token, record) = match state.sessions.issue(user) {
        Ok(issued) => issued,
        Err(e) => {
            tracing::error!("session token issuance failed: {}", e);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Login failed");
        }
    };
    if let Err(e) = state.storage.create_session(record.clone()).await {
        tracing::error!("session persistence failed: {}", e);
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Login failed");
    }

    let cookie = session_cookie(token, &record);
    (
        status,
        [(header::SET_COOKIE, cookie.to_string())],
        Json(json!({ "user": user.public() })),
    )
        .into_response()
}

pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Response {
    let username = payload.username.trim().to_lowercase();
    if username.is_empty() || payload.password.is_empty() {
        return error_response(
            StatusCode::BAD_REQUEST,
            "Username and password are required",
        );
    }

    match state.storage.get_user_by_username(&username).await {
        Ok(Some(_)) => return error_response(StatusCode::CONFLICT, "Username already exists"),
        Ok(None) => {}
        Err(e) => {
            tracing::error!("user lookup failed during registration: {}", e);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Registration failed");
        }
    }

    let salt = SaltString::generate(&mut OsRng);
    let password_hash = match Argon2::default().hash_password(payload.password.as_bytes(), &salt)
    {
        Ok(hash) => hash.to_string(),
        Err(e) => {
            tracing::error!("password hashing failed: {}", e);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Registration failed");
        }
    };

    let user = match state
        .storage
        .create_user(NewUser {
            username,
            password_hash,
        })
        .await
    {
        Ok(user) => user,
        Err(e) => {
            tracing::error!("user creation failed: {}", e);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Registration failed");
        }
    };

    tracing::info!("registered user {} ({})", user.username, user.id);
    issue_session(&state, &user, StatusCode::CREATED).await
}

pub async fn login(State(state): State<AppState>, Json(payload): Json<LoginRequest>) -> Response {
    let username = payload.username.trim().to_lowercase();

    let user = match state.storage.get_user_by_username(&username).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            return error_response(StatusCode::UNAUTHORIZED, "Invalid username or password")
        }
        Err(e) => {
            tracing::error!("user lookup failed during login: {}", e);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Login failed");
        }
    };

    let parsed_hash = match PasswordHash::new(&user.password_hash) {
        Ok(hash) => hash,
        Err(e) => {
            tracing::error!("stored password hash for user {} is unreadable: {}", user.id, e);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Login failed");
        }
    };
    if Argon2::default()
        .verify_password(payload.password.as_bytes(), &parsed_hash)
        .is_err()
    {
        return error_response(StatusCode::UNAUTHORIZED, "Invalid username or password");
    }

    tracing::info!("user {} logged in", user.id);
    issue_session(&state, &user, StatusCode::OK).await
}

/// Revokes the session row so the token dies server-side, then clears the
/// cookie.
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Some(token) = extract_token(&headers) {
        if let Ok(claims) = state.sessions.decode_claims(&token) {
            if let Err(e) = state.storage.delete_session(claims.sid).await {
                tracing::warn!("session deletion failed during logout: {}", e);
            }
        }
    }
    (
        StatusCode::NO_CONTENT,
        [(header::SET_COOKIE, clearing_cookie().to_string())],
    )
        .into_response()
}

/// GET `/api/user`. Registered behind the session middleware in `server.rs`.
pub async fn me(State(state): State<AppState>, Extension(auth): Extension<AuthUser>) -> Response {
    match state.storage.get_user(auth.id).await {
        Ok(Some(user)) => Json(user.public()).into_response(),
        Ok(None) => error_response(StatusCode::NOT_FOUND, "User not found"),
        Err(e) => {
            tracing::error!("user lookup failed: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Lookup failed")
        }
    }
}

/// Public account routes. `/api/user` lives on the protected router instead.
pub fn create_routes() -> Router<AppState> {
    Router::new()
        .route("/api/register", post(register))
        .route("/api/login", post(login))
        .route("/api/logout", post(logout))
}
