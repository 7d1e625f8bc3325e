// # Routes Module
//
// - This module contains all HTTP route handlers for the chat server.
// - Routes are organized by functionality into separate submodules.
//
//  ## Available Route Modules
// - `health`: Health check and monitoring endpoints
// - `auth`: Account registration, login, logout, and user info
// - `chat`: The chat pipeline endpoint
// - `wallet`: Wallet linking endpoints

/// Account registration, login, logout, and user info
pub mod auth;

/// Chat pipeline endpoint
pub mod chat;

/// Health check and monitoring endpoints
pub mod health;

/// Wallet linking endpoints
pub mod wallet;
