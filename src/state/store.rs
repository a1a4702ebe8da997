//! In-memory message store.
//!
//! One capacity-bounded, append-only log per provisioned room. Messages are
//! immutable except for their `read_by` and `reactions` sub-fields. When a
//! log outgrows its retention capacity the oldest entry is evicted; ids are
//! unique only while the message survives, and operations referencing an
//! evicted id report `NotFound` for callers to drop silently. Nothing here
//! survives a restart; durable history is explicitly out of scope.

use crate::error::HandlerError;
use chrono::Utc;
use dashmap::DashMap;
use slchat_proto::{ChatMessage, MessageContent, Reactions, ReadSet};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

/// Per-room message logs with fixed retention.
pub struct MessageStore {
    logs: DashMap<String, VecDeque<ChatMessage>>,
    capacity: usize,
    last_id: AtomicU64,
}

impl MessageStore {
    /// Create a store with one empty log per provisioned room.
    pub fn new<S: AsRef<str>>(rooms: &[S], capacity: usize) -> Self {
        let logs = rooms
            .iter()
            .map(|room| (room.as_ref().to_string(), VecDeque::new()))
            .collect();
        Self {
            logs,
            capacity,
            last_id: AtomicU64::new(0),
        }
    }

    /// Timestamp-derived id, strictly monotonic so burst sends within one
    /// millisecond still get distinct ids.
    fn next_id(&self) -> u64 {
        let now = Utc::now().timestamp_millis().max(0) as u64;
        let prev = self
            .last_id
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(last.max(now.saturating_sub(1)) + 1)
            })
            .unwrap_or(0);
        (prev + 1).max(now)
    }

    /// Append a message to a room's log, evicting the oldest entry if the
    /// log would exceed capacity. Returns the created message for fan-out.
    pub fn append(
        &self,
        room: &str,
        sender_cid: &str,
        sender: &str,
        content: MessageContent,
    ) -> Result<ChatMessage, HandlerError> {
        let mut log = self
            .logs
            .get_mut(room)
            .ok_or_else(|| HandlerError::NotARoom(room.to_string()))?;

        let message = ChatMessage {
            id: self.next_id(),
            room: room.to_string(),
            sender: sender.to_string(),
            sender_cid: sender_cid.to_string(),
            content,
            timestamp: Utc::now(),
            read_by: ReadSet::from([sender_cid.to_string()]),
            reactions: Reactions::new(),
        };

        log.push_back(message.clone());
        while log.len() > self.capacity {
            log.pop_front();
        }

        Ok(message)
    }

    /// Add a connection to a message's read set.
    ///
    /// Returns the updated set for broadcast, or `Ok(None)` when the
    /// connection had already read the message; callers skip the broadcast
    /// in that case. Evicted/unknown ids are `NotFound`.
    pub fn mark_read(
        &self,
        room: &str,
        message_id: u64,
        cid: &str,
    ) -> Result<Option<ReadSet>, HandlerError> {
        let mut log = self
            .logs
            .get_mut(room)
            .ok_or(HandlerError::NotFound(message_id))?;
        let message = log
            .iter_mut()
            .find(|m| m.id == message_id)
            .ok_or(HandlerError::NotFound(message_id))?;

        if message.read_by.insert(cid.to_string()) {
            Ok(Some(message.read_by.clone()))
        } else {
            Ok(None)
        }
    }

    /// Toggle a connection's reaction on a message: present removes, absent
    /// adds. Emoji keys with empty sets are dropped entirely. Returns the
    /// full reactions map for broadcast.
    pub fn toggle_reaction(
        &self,
        room: &str,
        message_id: u64,
        cid: &str,
        emoji: &str,
    ) -> Result<Reactions, HandlerError> {
        let mut log = self
            .logs
            .get_mut(room)
            .ok_or(HandlerError::NotFound(message_id))?;
        let message = log
            .iter_mut()
            .find(|m| m.id == message_id)
            .ok_or(HandlerError::NotFound(message_id))?;

        let reactors = message.reactions.entry(emoji.to_string()).or_default();
        if !reactors.insert(cid.to_string()) {
            reactors.remove(cid);
        }
        if reactors.is_empty() {
            message.reactions.remove(emoji);
        }

        Ok(message.reactions.clone())
    }

    /// Number of messages currently retained for a room.
    pub fn room_len(&self, room: &str) -> usize {
        self.logs.get(room).map(|log| log.len()).unwrap_or(0)
    }

    /// Snapshot of every retained message across all rooms, ordered by id.
    /// Serves the read-only HTTP query surface.
    pub fn all_messages(&self) -> Vec<ChatMessage> {
        let mut messages: Vec<ChatMessage> = self
            .logs
            .iter()
            .flat_map(|log| log.iter().cloned().collect::<Vec<_>>())
            .collect();
        messages.sort_by_key(|m| m.id);
        messages
    }
}
