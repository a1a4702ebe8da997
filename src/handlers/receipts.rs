//! Read receipt and reaction handlers.
//!
//! Both operate on stored messages and tolerate eviction races: a receipt or
//! reaction referencing an evicted id simply has no visible effect.

use super::{Context, Handler};
use crate::error::HandlerResult;
use async_trait::async_trait;
use slchat_proto::{ClientEvent, ServerEvent};
use tracing::debug;

/// Handler for the `message_read` event.
pub struct MessageReadHandler;

#[async_trait]
impl Handler for MessageReadHandler {
    async fn handle(&self, ctx: &Context<'_>, event: &ClientEvent) -> HandlerResult {
        let ClientEvent::MessageRead { message_id, room } = event else {
            return Ok(());
        };

        // Already-read is not re-broadcast; the set cannot have changed.
        let Some(read_by) = ctx.hub.store.mark_read(room, *message_id, ctx.cid)? else {
            return Ok(());
        };

        debug!(cid = %ctx.cid, id = message_id, "Read receipt recorded");
        ctx.hub.to_room(
            room,
            ServerEvent::MessageRead { message_id: *message_id, read_by },
            None,
        );
        Ok(())
    }
}

/// Handler for the `message_reaction` event.
pub struct MessageReactionHandler;

#[async_trait]
impl Handler for MessageReactionHandler {
    async fn handle(&self, ctx: &Context<'_>, event: &ClientEvent) -> HandlerResult {
        let ClientEvent::MessageReaction { message_id, room, emoji } = event else {
            return Ok(());
        };

        let reactions = ctx
            .hub
            .store
            .toggle_reaction(room, *message_id, ctx.cid, emoji)?;

        debug!(cid = %ctx.cid, id = message_id, emoji = %emoji, "Reaction toggled");
        ctx.hub.to_room(
            room,
            ServerEvent::MessageReaction { message_id: *message_id, reactions },
            None,
        );
        Ok(())
    }
}
