//! Authentication Middleware
//!
//! Axum middleware for session token validation and user authentication.
//! Tokens are checked cryptographically first, then against the sessions
//! table so revoked logins fail even before expiry.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};

use crate::auth::models::AuthUser;
use crate::server::AppState;

/// Extract a session token from the Authorization header (Bearer) or the
/// `access_token` cookie.
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .and_then(|auth_header| {
            auth_header
                .strip_prefix("Bearer ")
                .map(|token| token.to_string())
        })
        .or_else(|| {
            // Fallback: try to get from cookie
            headers
                .get(header::COOKIE)
                .and_then(|cookie_header| cookie_header.to_str().ok())
                .and_then(|cookie_str| {
                    for cookie in cookie_str.split(';') {
                        let cookie = cookie.trim();
                        if let Some(rest) = cookie.strip_prefix("access_token=") {
                            return Some(rest.to_string());
                        }
                    }
                    None
                })
        })
}

/// Authentication middleware that validates session tokens and injects user info
pub struct SessionAuth;

impl SessionAuth {
    /// Middleware function for validating session tokens
    pub async fn validate(
        State(state): State<AppState>,
        mut req: Request,
        next: Next,
    ) -> Result<Response, StatusCode> {
        tracing::debug!("[SessionAuth] Incoming request: {} {}", req.method(), req.uri());

        let token = match extract_token(req.headers()) {
            Some(token) => token,
            None => {
                tracing::warn!("[SessionAuth] Missing Authorization header and access_token cookie");
                return Err(StatusCode::UNAUTHORIZED);
            }
        };

        let claims = match state.sessions.validate_token(&token) {
            Ok(data) => data.claims,
            Err(e) => {
                tracing::warn!("[SessionAuth] Token validation failed: {:?}", e);
                return Err(StatusCode::UNAUTHORIZED);
            }
        };

        // The sid must still exist in storage; logout deletes it.
        match state.storage.get_session(claims.sid).await {
            Ok(Some(_)) => {}
            Ok(None) => {
                tracing::warn!("[SessionAuth] Session {} not found or expired", claims.sid);
                return Err(StatusCode::UNAUTHORIZED);
            }
            Err(e) => {
                tracing::error!("[SessionAuth] Session lookup failed: {}", e);
                return Err(StatusCode::INTERNAL_SERVER_ERROR);
            }
        }

        let auth_user = AuthUser {
            id: claims.sub,
            username: claims.username,
        };
        tracing::debug!("[SessionAuth] Authenticated user id={}", auth_user.id);

        // Insert the user into request extensions for downstream handlers
        req.extensions_mut().insert(auth_user);

        Ok(next.run(req).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn extracts_bearer_token_before_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; access_token=xyz"),
        );
        assert_eq!(extract_token(&headers).as_deref(), Some("abc"));
    }

    #[test]
    fn falls_back_to_access_token_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; access_token=xyz"),
        );
        assert_eq!(extract_token(&headers).as_deref(), Some("xyz"));
    }

    #[test]
    fn missing_credentials_yield_none() {
        let headers = HeaderMap::new();
        assert_eq!(extract_token(&headers), None);
    }
}
