//! Authentication Models
//!
//! Data structures shared between the session middleware and handlers.

use serde::{Deserialize, Serialize};

/// Authenticated user information extracted from a validated session token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: i64,
    pub username: String,
}
