//! Typed client and server events.
//!
//! Every frame on the wire is a JSON object `{"event": <name>, "data": ...}`.
//! Event names are stable wire contract; `ClientEvent::name` and
//! `ServerEvent::name` expose them for dispatch and metrics labels.

use crate::message::{ChatMessage, ConnId, PrivateMessage, Reactions, ReadSet};
use serde::{Deserialize, Serialize};

/// A connected user as shown in presence rosters and room member lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub cid: ConnId,
    pub username: String,
}

/// Payload of `send_message`.
///
/// `room` is optional: when absent the coordinator falls back to the sender's
/// current room, then to the default room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,
    #[serde(flatten)]
    pub content: crate::message::MessageContent,
}

/// Events accepted from a client connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    /// First event on a fresh connection: the externally-minted identity
    /// assertion. Anything else before authentication closes the link.
    Auth { token: String },
    JoinRoom { room: String },
    LeaveRoom { room: String },
    SendMessage(SendMessage),
    MessageRead { message_id: u64, room: String },
    MessageReaction { message_id: u64, room: String, emoji: String },
    Typing { is_typing: bool },
    PrivateMessage { to: ConnId, message: String },
}

impl ClientEvent {
    /// Stable wire name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Auth { .. } => "auth",
            Self::JoinRoom { .. } => "join_room",
            Self::LeaveRoom { .. } => "leave_room",
            Self::SendMessage(_) => "send_message",
            Self::MessageRead { .. } => "message_read",
            Self::MessageReaction { .. } => "message_reaction",
            Self::Typing { .. } => "typing",
            Self::PrivateMessage { .. } => "private_message",
        }
    }
}

/// Events emitted to client connections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Full presence roster, re-published on every connect/disconnect.
    UserList { users: Vec<UserInfo> },
    UserJoined { username: String, cid: ConnId },
    UserLeft { username: String, cid: ConnId },
    /// Sent to the joining connection only, with the room's member list.
    JoinedRoom { room: String, users: Vec<UserInfo> },
    /// Sent to the rest of the room when someone joins.
    UserJoinedRoom { username: String, cid: ConnId, room: String },
    UserLeftRoom { username: String, cid: ConnId, room: String },
    ReceiveMessage { message: ChatMessage },
    MessageRead { message_id: u64, read_by: ReadSet },
    MessageReaction { message_id: u64, reactions: Reactions },
    /// Display identities currently typing in a room.
    TypingUsers { room: String, users: Vec<String> },
    PrivateMessage { message: PrivateMessage },
    /// Terminal error notice, sent before the server closes the link.
    Error { code: String, reason: String },
}

impl ServerEvent {
    /// Stable wire name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            Self::UserList { .. } => "user_list",
            Self::UserJoined { .. } => "user_joined",
            Self::UserLeft { .. } => "user_left",
            Self::JoinedRoom { .. } => "joined_room",
            Self::UserJoinedRoom { .. } => "user_joined_room",
            Self::UserLeftRoom { .. } => "user_left_room",
            Self::ReceiveMessage { .. } => "receive_message",
            Self::MessageRead { .. } => "message_read",
            Self::MessageReaction { .. } => "message_reaction",
            Self::TypingUsers { .. } => "typing_users",
            Self::PrivateMessage { .. } => "private_message",
            Self::Error { .. } => "error",
        }
    }
}
