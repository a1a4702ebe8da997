//! Typing indicator handler.

use super::{event_room, Context, Handler};
use crate::error::{HandlerError, HandlerResult};
use async_trait::async_trait;
use slchat_proto::{ClientEvent, ServerEvent};

/// Handler for the `typing` event.
///
/// The event names no room: it applies to the sender's current room (default
/// room for roomless connections). The resulting display list goes to the
/// whole room, typer included. No server-side debouncing; the client is
/// expected to rate-limit its own start/stop signals.
pub struct TypingHandler;

#[async_trait]
impl Handler for TypingHandler {
    async fn handle(&self, ctx: &Context<'_>, event: &ClientEvent) -> HandlerResult {
        let ClientEvent::Typing { is_typing } = event else {
            return Ok(());
        };

        let room = event_room(ctx, None);
        if !ctx.hub.rooms.contains(&room) {
            return Err(HandlerError::NotARoom(room));
        }

        let users = ctx.hub.typing.set(&room, ctx.cid, ctx.identity, *is_typing);
        ctx.hub
            .to_room(&room, ServerEvent::TypingUsers { room: room.clone(), users }, None);
        Ok(())
    }
}
