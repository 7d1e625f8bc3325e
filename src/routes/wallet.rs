//! # Wallet Routes
//!
//! Linking a user-controlled wallet to an account. Once linked, chat-driven
//! transactions are planned against that wallet instead of the platform
//! account.
//!
//! All endpoints require authentication via the session middleware.

use axum::{extract::State, http::StatusCode, response::Json, Extension};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info};

use crate::auth::models::AuthUser;
use crate::database::models::PublicUser;
use crate::server::AppState;

/// Request body for linking a wallet
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateWalletRequest {
    /// 0x-prefixed EVM address of the wallet
    pub avalanche_address: String,
    /// Private key the server keeps for custodial signing
    pub private_key: String,
}

/// Link a wallet to the authenticated account
///
/// # Route
/// - **Method**: POST
/// - **Path**: `/api/update-wallet`
///
/// # Returns
/// The updated public user record. Credentials never appear in the response.
pub async fn update_wallet(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(payload): Json<UpdateWalletRequest>,
) -> Result<Json<PublicUser>, (StatusCode, Json<Value>)> {
    info!("Updating wallet for user {}", auth.id);

    if payload.avalanche_address.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "avalancheAddress is required" })),
        ));
    }

    match state
        .storage
        .update_user_wallet(
            auth.id,
            payload.avalanche_address.trim(),
            &payload.private_key,
        )
        .await
    {
        Ok(user) => Ok(Json(user.public())),
        Err(e) => {
            error!("Failed to update wallet for user {}: {}", auth.id, e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": "Failed to update wallet",
                    "details": e.to_string()
                })),
            ))
        }
    }
}
