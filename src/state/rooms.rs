//! Room membership management.
//!
//! Rooms are pre-provisioned at startup; there is no dynamic creation. The
//! whole directory sits behind one `RwLock`: the room set is small and fixed,
//! and a single writer section is what makes the leave-then-join transfer
//! atomic: no observer can catch a connection absent from every room or
//! present in two at once. Locks are released before any notification is sent.

use crate::error::HandlerError;
use parking_lot::RwLock;
use slchat_proto::ConnId;
use std::collections::{HashMap, HashSet};

/// Result of an atomic room transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomTransfer {
    /// Room the connection was removed from, if it was a member anywhere.
    pub left: Option<String>,
    /// Room the connection now belongs to.
    pub joined: String,
    /// Members of the joined room (including the mover) at the instant the
    /// transfer committed.
    pub members: Vec<ConnId>,
}

/// Directory of provisioned rooms and their member sets.
pub struct RoomDirectory {
    rooms: RwLock<HashMap<String, HashSet<ConnId>>>,
}

impl RoomDirectory {
    /// Provision the fixed room set.
    pub fn new<S: AsRef<str>>(names: &[S]) -> Self {
        let rooms = names
            .iter()
            .map(|name| (name.as_ref().to_string(), HashSet::new()))
            .collect();
        Self { rooms: RwLock::new(rooms) }
    }

    /// Whether `name` is a provisioned room.
    pub fn contains(&self, name: &str) -> bool {
        self.rooms.read().contains_key(name)
    }

    /// Provisioned room names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.rooms.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Atomically move a connection into `room`, removing it from whichever
    /// room it currently occupies. Membership is exclusive: after this
    /// returns the connection is a member of exactly one room.
    pub fn join(&self, cid: &str, room: &str) -> Result<RoomTransfer, HandlerError> {
        let mut rooms = self.rooms.write();
        if !rooms.contains_key(room) {
            return Err(HandlerError::NotARoom(room.to_string()));
        }

        let mut left = None;
        for (name, members) in rooms.iter_mut() {
            if members.remove(cid) {
                left = Some(name.clone());
            }
        }

        let members = rooms.get_mut(room).expect("room checked above");
        members.insert(cid.to_string());
        let mut snapshot: Vec<ConnId> = members.iter().cloned().collect();
        snapshot.sort();

        Ok(RoomTransfer { left, joined: room.to_string(), members: snapshot })
    }

    /// Remove a connection from `room`. Returns whether it was a member;
    /// leaving a room you are not in is a no-op, not an error.
    pub fn leave(&self, cid: &str, room: &str) -> Result<bool, HandlerError> {
        let mut rooms = self.rooms.write();
        let members = rooms
            .get_mut(room)
            .ok_or_else(|| HandlerError::NotARoom(room.to_string()))?;
        Ok(members.remove(cid))
    }

    /// Remove a connection from every room. Returns the rooms it was removed
    /// from; used by disconnect cleanup and safe to call repeatedly.
    pub fn remove_everywhere(&self, cid: &str) -> Vec<String> {
        let mut rooms = self.rooms.write();
        let mut removed: Vec<String> = rooms
            .iter_mut()
            .filter_map(|(name, members)| members.remove(cid).then(|| name.clone()))
            .collect();
        removed.sort();
        removed
    }

    /// Member connection ids of `room`, sorted. Empty for unknown rooms.
    pub fn members(&self, room: &str) -> Vec<ConnId> {
        let rooms = self.rooms.read();
        let mut members: Vec<ConnId> = rooms
            .get(room)
            .map(|m| m.iter().cloned().collect())
            .unwrap_or_default();
        members.sort();
        members
    }

    /// Whether `cid` is a member of `room`.
    pub fn is_member(&self, room: &str, cid: &str) -> bool {
        self.rooms.read().get(room).is_some_and(|m| m.contains(cid))
    }
}
