//! Room membership handlers.
//!
//! Handles join_room and leave_room events.

use super::{Context, Handler};
use crate::error::HandlerResult;
use async_trait::async_trait;
use slchat_proto::{ClientEvent, ServerEvent};
use tracing::debug;

/// Handler for the `join_room` event.
pub struct JoinRoomHandler;

#[async_trait]
impl Handler for JoinRoomHandler {
    async fn handle(&self, ctx: &Context<'_>, event: &ClientEvent) -> HandlerResult {
        let ClientEvent::JoinRoom { room } = event else {
            return Ok(());
        };

        // Unknown rooms are reported by the directory; place_in_room already
        // treats that as a counted no-op, matching the silent-ignore policy.
        ctx.hub.place_in_room(ctx.cid, ctx.identity, room);
        Ok(())
    }
}

/// Handler for the `leave_room` event.
///
/// Leaving your current room deliberately leaves the connection roomless;
/// it is not moved back to the default room.
pub struct LeaveRoomHandler;

#[async_trait]
impl Handler for LeaveRoomHandler {
    async fn handle(&self, ctx: &Context<'_>, event: &ClientEvent) -> HandlerResult {
        let ClientEvent::LeaveRoom { room } = event else {
            return Ok(());
        };

        let was_member = ctx.hub.rooms.leave(ctx.cid, room)?;
        if !was_member {
            debug!(cid = %ctx.cid, room = %room, "Leave ignored: not a member");
            return Ok(());
        }

        ctx.hub.to_room(
            room,
            ServerEvent::UserLeftRoom {
                username: ctx.identity.to_string(),
                cid: ctx.cid.to_string(),
                room: room.clone(),
            },
            None,
        );

        for (affected, users) in ctx.hub.typing.clear_connection(ctx.cid) {
            ctx.hub.to_room(
                &affected,
                ServerEvent::TypingUsers { room: affected.clone(), users },
                None,
            );
        }

        if ctx.hub.registry.current_room(ctx.cid).as_deref() == Some(room.as_str()) {
            ctx.hub.registry.set_current_room(ctx.cid, None);
        }

        debug!(cid = %ctx.cid, room = %room, "Left room");
        Ok(())
    }
}
