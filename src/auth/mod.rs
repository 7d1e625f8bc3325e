//! # Authentication Module
//!
//! Handles session token issuance, validation, and middleware for securing
//! API endpoints and the websocket upgrade.

pub mod middleware;
pub mod models;
pub mod session;
