//! # Database Module
//!
//! PostgreSQL integration using tokio-postgres with deadpool pooling.
//! Includes connection management, row models, and embedded migrations.

pub mod connection;
pub mod models;
pub mod migrations;

pub use connection::{DatabaseConnection, DatabaseConfig};
pub use models::*;
