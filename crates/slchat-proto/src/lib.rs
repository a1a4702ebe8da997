//! Wire protocol for the Straylight chat daemon.
//!
//! Defines the typed events exchanged between clients and the coordinator,
//! the chat message model (read receipts, reactions), and the identity
//! assertion contract shared with the external auth service.
//!
//! Enable the `tokio` feature for the newline-delimited JSON codec used by
//! raw TCP transports.

pub mod assertion;
mod error;
mod event;
mod message;
#[cfg(feature = "tokio")]
pub mod transport;

pub use error::ProtocolError;
pub use event::{ClientEvent, SendMessage, ServerEvent, UserInfo};
pub use message::{ChatMessage, ConnId, MessageContent, PrivateMessage, Reactions, ReadSet};
#[cfg(feature = "tokio")]
pub use transport::{ClientCodec, EventCodec, ServerCodec};
