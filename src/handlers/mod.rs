//! Client event handlers.
//!
//! Contains the Handler trait and the registry that dispatches authenticated
//! client events to the component that owns the relevant state. Validation
//! failures are absorbed at each handler's boundary: a malformed or stale
//! event affects at most the connection that sent it, never global state.

mod messaging;
mod receipts;
mod room;
mod typing;

pub use messaging::{PrivateMessageHandler, SendMessageHandler};
pub use receipts::{MessageReactionHandler, MessageReadHandler};
pub use room::{JoinRoomHandler, LeaveRoomHandler};
pub use typing::TypingHandler;

use crate::error::HandlerResult;
use crate::state::SharedHub;
use async_trait::async_trait;
use slchat_proto::ClientEvent;
use std::collections::HashMap;
use tracing::debug;

/// Handler context passed to each event handler.
pub struct Context<'a> {
    /// The connection the event arrived on.
    pub cid: &'a str,
    /// Its authenticated display identity.
    pub identity: &'a str,
    /// Shared coordinator state.
    pub hub: &'a SharedHub,
}

/// An event handler. One per inbound event type.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, ctx: &Context<'_>, event: &ClientEvent) -> HandlerResult;
}

/// Registry mapping wire event names to handlers.
pub struct Registry {
    handlers: HashMap<&'static str, Box<dyn Handler>>,
}

impl Registry {
    pub fn new() -> Self {
        let mut handlers: HashMap<&'static str, Box<dyn Handler>> = HashMap::new();
        handlers.insert("join_room", Box::new(JoinRoomHandler));
        handlers.insert("leave_room", Box::new(LeaveRoomHandler));
        handlers.insert("send_message", Box::new(SendMessageHandler));
        handlers.insert("message_read", Box::new(MessageReadHandler));
        handlers.insert("message_reaction", Box::new(MessageReactionHandler));
        handlers.insert("typing", Box::new(TypingHandler));
        handlers.insert("private_message", Box::new(PrivateMessageHandler));
        Self { handlers }
    }

    /// Dispatch a post-handshake event.
    ///
    /// Silent business outcomes (`NotARoom`, `NotFound`) are counted and
    /// swallowed here so handlers can report them uniformly.
    pub async fn dispatch(&self, ctx: &Context<'_>, event: &ClientEvent) -> HandlerResult {
        let name = event.name();
        crate::metrics::events_received(name).inc();

        let Some(handler) = self.handlers.get(name) else {
            // `auth` after the handshake lands here; ignore it.
            debug!(cid = %ctx.cid, event = name, "No handler for event");
            return Ok(());
        };

        match handler.handle(ctx, event).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_silent() => {
                debug!(cid = %ctx.cid, event = name, code = e.error_code(), "Event ignored");
                crate::metrics::event_errors(e.error_code()).inc();
                Ok(())
            }
            Err(e) => {
                crate::metrics::event_errors(e.error_code()).inc();
                Err(e)
            }
        }
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

/// The room an event applies to when the payload names none: the sender's
/// current room, falling back to the default room for roomless connections.
pub(crate) fn event_room(ctx: &Context<'_>, explicit: Option<&str>) -> String {
    explicit
        .map(str::to_string)
        .or_else(|| ctx.hub.registry.current_room(ctx.cid))
        .unwrap_or_else(|| ctx.hub.server_info.default_room.clone())
}
