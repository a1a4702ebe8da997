//! Messaging handlers.
//!
//! Handles send_message (room messages) and private_message (direct
//! connection-to-connection delivery, never stored).

use super::{event_room, Context, Handler};
use crate::error::HandlerResult;
use async_trait::async_trait;
use chrono::Utc;
use slchat_proto::{ClientEvent, PrivateMessage, ServerEvent};
use tracing::debug;

/// Handler for the `send_message` event.
pub struct SendMessageHandler;

#[async_trait]
impl Handler for SendMessageHandler {
    async fn handle(&self, ctx: &Context<'_>, event: &ClientEvent) -> HandlerResult {
        let ClientEvent::SendMessage(send) = event else {
            return Ok(());
        };

        let room = event_room(ctx, send.room.as_deref());
        let message = ctx
            .hub
            .store
            .append(&room, ctx.cid, ctx.identity, send.content.clone())?;
        crate::metrics::messages_stored().inc();

        debug!(cid = %ctx.cid, room = %room, id = message.id, "Message stored");

        // The sender is a room member, so it receives its own copy too.
        ctx.hub
            .to_room(&room, ServerEvent::ReceiveMessage { message }, None);
        Ok(())
    }
}

/// Handler for the `private_message` event.
pub struct PrivateMessageHandler;

#[async_trait]
impl Handler for PrivateMessageHandler {
    async fn handle(&self, ctx: &Context<'_>, event: &ClientEvent) -> HandlerResult {
        let ClientEvent::PrivateMessage { to, message } = event else {
            return Ok(());
        };

        let private = PrivateMessage {
            id: Utc::now().timestamp_millis().max(0) as u64,
            sender: ctx.identity.to_string(),
            sender_cid: ctx.cid.to_string(),
            to: to.clone(),
            message: message.clone(),
            timestamp: Utc::now(),
        };

        // Deliver to the target and echo to the sender. An unknown target is
        // dropped silently; the sender still gets its echo.
        let delivered = ctx
            .hub
            .to_connection(to, ServerEvent::PrivateMessage { message: private.clone() });
        if !delivered {
            debug!(cid = %ctx.cid, to = %to, "Private message target gone");
        }
        ctx.hub
            .to_connection(ctx.cid, ServerEvent::PrivateMessage { message: private });
        Ok(())
    }
}
