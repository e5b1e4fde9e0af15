//! In-process admin room backed by a broadcast channel.
//!
//! Whatever serves admin dashboards (websocket gateway, SSE endpoint) subscribes to the room
//! and forwards events to its sessions. Emitting with nobody connected is not an error.

use super::RealtimeBroadcaster;
use crate::errors::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::debug;

/// Default number of events buffered per subscriber
pub const DEFAULT_CAPACITY: usize = 64;

/// One event delivered to the admin room.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdminEvent {
    /// Event name, e.g. `new_demand`
    pub name: String,
    /// Event body
    pub payload: Value,
    /// When the event was emitted
    pub emitted_at: DateTime<Utc>,
}

/// Broadcast room for connected admin sessions.
#[derive(Debug, Clone)]
pub struct AdminRoom {
    sender: broadcast::Sender<AdminEvent>,
}

impl AdminRoom {
    /// Creates a room buffering up to `capacity` events per subscriber.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Joins the room. Events emitted before this call are not replayed.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<AdminEvent> {
        self.sender.subscribe()
    }

    /// Number of connected sessions.
    #[must_use]
    pub fn connected(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Sends an event to every connected session.
    pub fn emit(&self, name: &str, payload: Value) -> usize {
        let event = AdminEvent {
            name: name.to_string(),
            payload,
            emitted_at: Utc::now(),
        };
        // send only fails when nobody is subscribed
        self.sender.send(event).unwrap_or_else(|_| {
            debug!(event = name, "No admin connected, event dropped");
            0
        })
    }
}

impl Default for AdminRoom {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl RealtimeBroadcaster for AdminRoom {
    fn emit_to_admin_room(&self, event: &str, payload: Value) -> Result<usize> {
        Ok(self.emit(event, payload))
    }
}
