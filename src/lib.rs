//! # Avalanche Chat Server
//!
//! Chat-driven DeFi assistant backend. Messages are classified into typed
//! intents, dispatched to the owning agent (market data, transaction
//! execution, knowledge graph analytics, or the static system catalog), and
//! formatted back into markdown replies. Chat runs over REST for anonymous
//! use and over a session-authenticated websocket for account holders.

pub mod agent;
pub mod auth;
pub mod config;
pub mod database;
pub mod error;
pub mod execution;
pub mod market;
pub mod routes;
pub mod server;
pub mod storage;
pub mod wallet;
pub mod ws;

pub use error::AppError;
pub use server::{build_router, build_state, AppState};
