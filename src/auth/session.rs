//! Session Token Service
//!
//! Handles session token creation, validation, and claims management. Every
//! token carries a session id (`sid`) that must still exist in storage, so a
//! logout revokes the token even before its expiry.

use anyhow::{Context, Result};
use chrono::Duration;
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, TokenData, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::database::models::{SessionRecord, User};

const ISSUER: &str = "avachat-server";

/// Claims structure containing user information and token metadata
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// User unique identifier
    pub sub: i64,
    /// Username at issuance time
    pub username: String,
    /// Server-side session id, checked against storage on every request
    pub sid: Uuid,
    /// Token issued at timestamp
    pub iat: i64,
    /// Token expiration timestamp
    pub exp: i64,
    /// Token issuer
    pub iss: String,
}

/// Session service for token operations
#[derive(Clone)]
pub struct SessionService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl SessionService {
    /// Create a new session service with the provided secret
    pub fn new(secret: &str) -> Self {
        let encoding_key = EncodingKey::from_secret(secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(secret.as_bytes());

        let mut validation = Validation::default();
        validation.set_issuer(&[ISSUER]);

        Self {
            encoding_key,
            decoding_key,
            validation,
            ttl: Duration::days(7),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Issue a token for a user along with the session record to persist.
    pub fn issue(&self, user: &User) -> Result<(String, SessionRecord)> {
        let now = Utc::now();
        let expiration = now + self.ttl;
        let sid = Uuid::new_v4();

        let claims = Claims {
            sub: user.id,
            username: user.username.clone(),
            sid,
            iat: now.timestamp(),
            exp: expiration.timestamp(),
            iss: ISSUER.to_string(),
        };

        let token = encode(&Header::default(), &claims, &self.encoding_key)
            .context("Failed to encode session token")?;

        let record = SessionRecord {
            id: sid,
            user_id: user.id,
            created_at: now,
            expires_at: expiration,
        };

        Ok((token, record))
    }

    /// Validate and decode a session token
    pub fn validate_token(&self, token: &str) -> Result<TokenData<Claims>> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .context("Failed to validate session token")
    }

    /// Extract claims from a token
    pub fn decode_claims(&self, token: &str) -> Result<Claims> {
        let token_data = self.validate_token(token)?;
        Ok(token_data.claims)
    }
}
