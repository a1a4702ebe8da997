//! The chat message model.
//!
//! Messages are immutable once created except for two sub-fields: `read_by`
//! (append-only set of connection ids) and `reactions` (toggle-mutated
//! per-emoji sets). Ordered collections are used so serialized output is
//! deterministic.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Opaque connection identifier, unique for the process lifetime of a link.
pub type ConnId = String;

/// Set of connections that have acknowledged reading a message.
pub type ReadSet = BTreeSet<ConnId>;

/// Per-emoji sets of connections that reacted with it.
pub type Reactions = BTreeMap<String, BTreeSet<ConnId>>;

/// Body of a message: either text or a reference into the external blob store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MessageContent {
    Text {
        body: String,
    },
    File {
        url: String,
        mime_type: String,
        original_name: String,
    },
}

/// A message appended to a room's log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Unique within the store while the message survives retention.
    pub id: u64,
    pub room: String,
    /// Display identity of the sender.
    pub sender: String,
    /// Connection the message was sent from.
    pub sender_cid: ConnId,
    #[serde(flatten)]
    pub content: MessageContent,
    pub timestamp: DateTime<Utc>,
    /// Seeded with the sender's connection id.
    pub read_by: ReadSet,
    pub reactions: Reactions,
}

/// A direct message between two connections. Never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivateMessage {
    pub id: u64,
    pub sender: String,
    pub sender_cid: ConnId,
    pub to: ConnId,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_content_tags_by_kind() {
        let text = MessageContent::Text { body: "hi".into() };
        assert_eq!(
            serde_json::to_string(&text).unwrap(),
            r#"{"kind":"text","body":"hi"}"#
        );

        let file = MessageContent::File {
            url: "/uploads/abc".into(),
            mime_type: "image/png".into(),
            original_name: "cat.png".into(),
        };
        let json = serde_json::to_string(&file).unwrap();
        assert!(json.contains(r#""kind":"file""#));
        assert!(json.contains(r#""mime_type":"image/png""#));
    }

    #[test]
    fn chat_message_flattens_content() {
        let msg = ChatMessage {
            id: 7,
            room: "general".into(),
            sender: "alice".into(),
            sender_cid: "C01AAAAAA".into(),
            content: MessageContent::Text { body: "hello".into() },
            timestamp: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
            read_by: ReadSet::from(["C01AAAAAA".to_string()]),
            reactions: Reactions::new(),
        };
        let json = serde_json::to_string(&msg).unwrap();
        // `content` must not appear as a nested object on the wire.
        assert!(!json.contains(r#""content""#));
        assert!(json.contains(r#""kind":"text""#));
        assert!(json.contains(r#""body":"hello""#));

        let back: ChatMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back, msg);
    }
}
