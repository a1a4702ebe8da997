//! Typing indicator aggregation.
//!
//! Per room, a map from connection id to display identity. Entries come and
//! go on explicit start/stop signals; there is no server-side expiry, so a
//! client that crashes without sending stop leaves its entry until disconnect
//! cleanup sweeps it. The server does no debouncing; clients rate-limit
//! their own signals.

use dashmap::DashMap;
use slchat_proto::ConnId;
use std::collections::HashMap;

/// Per-room roster of currently-typing connections.
#[derive(Default)]
pub struct TypingRoster {
    rooms: DashMap<String, HashMap<ConnId, String>>,
}

impl TypingRoster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a start/stop signal and return the room's resulting display
    /// list, for republication to the whole room (including the typer).
    pub fn set(&self, room: &str, cid: &str, identity: &str, is_typing: bool) -> Vec<String> {
        let mut entry = self.rooms.entry(room.to_string()).or_default();
        if is_typing {
            entry.insert(cid.to_string(), identity.to_string());
        } else {
            entry.remove(cid);
        }
        let mut users: Vec<String> = entry.values().cloned().collect();
        users.sort();
        users
    }

    /// Current display list for a room.
    pub fn list(&self, room: &str) -> Vec<String> {
        let mut users: Vec<String> = self
            .rooms
            .get(room)
            .map(|entry| entry.values().cloned().collect())
            .unwrap_or_default();
        users.sort();
        users
    }

    /// Drop a connection's entry from every room. Returns each affected room
    /// with its refreshed display list so callers can republish them.
    pub fn clear_connection(&self, cid: &str) -> Vec<(String, Vec<String>)> {
        let mut affected = Vec::new();
        for mut entry in self.rooms.iter_mut() {
            if entry.value_mut().remove(cid).is_some() {
                let mut users: Vec<String> = entry.values().cloned().collect();
                users.sort();
                affected.push((entry.key().clone(), users));
            }
        }
        affected.sort_by(|a, b| a.0.cmp(&b.0));
        affected
    }
}
