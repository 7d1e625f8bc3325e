//! # Websocket Module
//!
//! Session-authenticated chat over websockets: frame protocol, per-user
//! connection registry with heartbeats, and the upgrade handler.

pub mod connection;
pub mod protocol;
pub mod registry;

pub use connection::ws_handler;
pub use registry::ConnectionRegistry;
