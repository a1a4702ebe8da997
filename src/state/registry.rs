//! Connection Registry: the single source of truth for who is online.
//!
//! Owns the mapping from connection id to identity and current room. Created
//! on transport-level connect, destroyed on transport-level disconnect; no
//! other component stores identities.

use crate::error::HandlerError;
use dashmap::{DashMap, Entry};
use slchat_proto::{ConnId, UserInfo};

/// A live, authenticated connection.
#[derive(Debug, Clone)]
pub struct Connection {
    pub cid: ConnId,
    /// Externally authenticated username; immutable for the connection's life.
    pub identity: String,
    /// None means not currently in any room.
    pub current_room: Option<String>,
}

/// Registry of live connections, keyed by connection id.
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: DashMap<ConnId, Connection>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a fresh connection. Fails with `DuplicateConnection` if the
    /// id is already present; the transport layer guarantees fresh ids, so a
    /// duplicate is an invariant violation.
    pub fn register(&self, cid: &str, identity: &str) -> Result<(), HandlerError> {
        match self.connections.entry(cid.to_string()) {
            Entry::Occupied(_) => Err(HandlerError::DuplicateConnection(cid.to_string())),
            Entry::Vacant(slot) => {
                slot.insert(Connection {
                    cid: cid.to_string(),
                    identity: identity.to_string(),
                    current_room: None,
                });
                Ok(())
            }
        }
    }

    /// Remove a connection. Idempotent: disconnect cleanup may race with an
    /// explicit logout, so unregistering an absent id is a no-op.
    pub fn unregister(&self, cid: &str) -> Option<Connection> {
        self.connections.remove(cid).map(|(_, conn)| conn)
    }

    /// Look up a connection by id.
    pub fn lookup(&self, cid: &str) -> Option<Connection> {
        self.connections.get(cid).map(|c| c.clone())
    }

    /// The room a connection currently considers home, if any.
    pub fn current_room(&self, cid: &str) -> Option<String> {
        self.connections.get(cid).and_then(|c| c.current_room.clone())
    }

    /// Update a connection's current-room pointer. No-op if unregistered.
    pub fn set_current_room(&self, cid: &str, room: Option<String>) {
        if let Some(mut conn) = self.connections.get_mut(cid) {
            conn.current_room = room;
        }
    }

    pub fn contains(&self, cid: &str) -> bool {
        self.connections.contains_key(cid)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Presence roster snapshot, ordered by connection id for stable output.
    pub fn roster(&self) -> Vec<UserInfo> {
        let mut users: Vec<UserInfo> = self
            .connections
            .iter()
            .map(|c| UserInfo { cid: c.cid.clone(), username: c.identity.clone() })
            .collect();
        users.sort_by(|a, b| a.cid.cmp(&b.cid));
        users
    }

    /// Resolve a set of connection ids to user infos, skipping ids that have
    /// since disconnected.
    pub fn resolve(&self, cids: &[ConnId]) -> Vec<UserInfo> {
        let mut users: Vec<UserInfo> = cids
            .iter()
            .filter_map(|cid| {
                self.connections.get(cid).map(|c| UserInfo {
                    cid: c.cid.clone(),
                    username: c.identity.clone(),
                })
            })
            .collect();
        users.sort_by(|a, b| a.cid.cmp(&b.cid));
        users
    }
}
