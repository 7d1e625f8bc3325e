//! Connection registry and heartbeat driver.
//!
//! One registered connection per user. Each heartbeat sweep probes every
//! connection that answered since the previous sweep and shuts down the ones
//! that did not, so two silent intervals disconnect a dead socket.

use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use uuid::Uuid;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Control messages delivered to a connection task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionControl {
    Ping,
    Shutdown,
}

/// Server-side handle to one live websocket connection.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    pub conn_id: Uuid,
    alive: Arc<AtomicBool>,
    control: mpsc::UnboundedSender<ConnectionControl>,
}

/// Tracks the registered connection per user and drives heartbeats.
pub struct ConnectionRegistry {
    connections: DashMap<i64, ConnectionHandle>,
    heartbeat_interval: Duration,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
            heartbeat_interval: HEARTBEAT_INTERVAL,
        }
    }

    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Register a connection for a user. An existing connection for the same
    /// user is told to shut down.
    pub fn register(
        &self,
        user_id: i64,
    ) -> (ConnectionHandle, mpsc::UnboundedReceiver<ConnectionControl>) {
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let handle = ConnectionHandle {
            conn_id: Uuid::new_v4(),
            alive: Arc::new(AtomicBool::new(true)),
            control: control_tx,
        };
        if let Some(previous) = self.connections.insert(user_id, handle.clone()) {
            tracing::warn!(
                "user {} opened a new websocket, shutting down the previous one",
                user_id
            );
            let _ = previous.control.send(ConnectionControl::Shutdown);
        }
        (handle, control_rx)
    }

    /// Drop a connection, but only while it is still the registered one for
    /// this user. A displaced connection cannot remove its replacement.
    pub fn deregister(&self, user_id: i64, conn_id: Uuid) {
        self.connections
            .remove_if(&user_id, |_, handle| handle.conn_id == conn_id);
    }

    /// Record a heartbeat answer. Guarded by conn id for the same reason as
    /// [`ConnectionRegistry::deregister`].
    pub fn mark_alive(&self, user_id: i64, conn_id: Uuid) {
        if let Some(handle) = self.connections.get(&user_id) {
            if handle.conn_id == conn_id {
                handle.alive.store(true, Ordering::SeqCst);
            }
        }
    }

    pub fn contains(&self, user_id: i64) -> bool {
        self.connections.contains_key(&user_id)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// One heartbeat pass. Connections that answered since the last pass get
    /// a fresh probe; the rest are shut down and dropped.
    pub fn sweep(&self) {
        let mut stale: Vec<(i64, Uuid)> = Vec::new();
        for entry in self.connections.iter() {
            let handle = entry.value();
            if handle.alive.swap(false, Ordering::SeqCst) {
                let _ = handle.control.send(ConnectionControl::Ping);
            } else {
                tracing::info!(
                    "disconnecting unresponsive websocket for user {}",
                    entry.key()
                );
                let _ = handle.control.send(ConnectionControl::Shutdown);
                stale.push((*entry.key(), handle.conn_id));
            }
        }
        // Removal happens outside the iteration to keep the map unlocked.
        for (user_id, conn_id) in stale {
            self.deregister(user_id, conn_id);
        }
    }

    /// Periodic heartbeat driver, spawned once at startup.
    pub async fn run_heartbeat(self: Arc<Self>) {
        let mut interval = tokio::time::interval(self.heartbeat_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; skip it so a fresh connection
        // is not probed the instant it registers.
        interval.tick().await;
        loop {
            interval.tick().await;
            self.sweep();
        }
    }
}
