//! Newline-delimited JSON framing for raw TCP transports.
//!
//! One event per line. The codec is direction-generic: the server decodes
//! [`ClientEvent`]s and encodes [`ServerEvent`]s, a client the reverse; use
//! the [`ServerCodec`] / [`ClientCodec`] aliases.

use crate::error::ProtocolError;
use crate::event::{ClientEvent, ServerEvent};
use bytes::{BufMut, BytesMut};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;
use tokio_util::codec::{Decoder, Encoder};

/// Maximum size of a single event frame. Lines beyond this are a protocol
/// violation: the stream cannot be re-synchronized, so the connection drops.
pub const MAX_FRAME_BYTES: usize = 64 * 1024;

/// JSON-lines codec, generic over inbound and outbound event types.
pub struct EventCodec<In, Out> {
    _direction: PhantomData<fn(Out) -> In>,
}

/// Codec for the server side of a connection.
pub type ServerCodec = EventCodec<ClientEvent, ServerEvent>;

/// Codec for the client side of a connection (test harnesses, tooling).
pub type ClientCodec = EventCodec<ServerEvent, ClientEvent>;

impl<In, Out> EventCodec<In, Out> {
    pub fn new() -> Self {
        Self { _direction: PhantomData }
    }
}

impl<In, Out> Default for EventCodec<In, Out> {
    fn default() -> Self {
        Self::new()
    }
}

impl<In: DeserializeOwned, Out> Decoder for EventCodec<In, Out> {
    type Item = In;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<In>, ProtocolError> {
        let Some(pos) = src.iter().position(|&b| b == b'\n') else {
            if src.len() > MAX_FRAME_BYTES {
                return Err(ProtocolError::FrameTooLong(src.len()));
            }
            return Ok(None);
        };
        if pos > MAX_FRAME_BYTES {
            return Err(ProtocolError::FrameTooLong(pos));
        }

        let line = src.split_to(pos + 1);
        let line = &line[..pos];
        // Tolerate CRLF line endings and skip blank keep-alive lines.
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        if line.is_empty() {
            return self.decode(src);
        }
        Ok(Some(serde_json::from_slice(line)?))
    }
}

impl<'a, In, Out: Serialize> Encoder<&'a Out> for EventCodec<In, Out> {
    type Error = ProtocolError;

    fn encode(&mut self, event: &'a Out, dst: &mut BytesMut) -> Result<(), ProtocolError> {
        let json = serde_json::to_vec(event)?;
        dst.reserve(json.len() + 1);
        dst.put_slice(&json);
        dst.put_u8(b'\n');
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_one_event_per_line() {
        let mut codec = ServerCodec::new();
        let mut buf = BytesMut::from(
            &br#"{"event":"typing","data":{"is_typing":true}}
{"event":"leave_room","data":{"room":"tech"}}
"#[..],
        );
        assert_eq!(
            codec.decode(&mut buf).unwrap(),
            Some(ClientEvent::Typing { is_typing: true })
        );
        assert_eq!(
            codec.decode(&mut buf).unwrap(),
            Some(ClientEvent::LeaveRoom { room: "tech".into() })
        );
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
    }

    #[test]
    fn partial_frame_waits_for_more_data() {
        let mut codec = ServerCodec::new();
        let mut buf = BytesMut::from(&br#"{"event":"typing","#[..]);
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
        buf.extend_from_slice(b"\"data\":{\"is_typing\":false}}\r\n");
        assert_eq!(
            codec.decode(&mut buf).unwrap(),
            Some(ClientEvent::Typing { is_typing: false })
        );
    }

    #[test]
    fn malformed_line_is_recoverable() {
        let mut codec = ServerCodec::new();
        let mut buf = BytesMut::from(&b"{nonsense}\n"[..]);
        let err = codec.decode(&mut buf).unwrap_err();
        assert!(err.is_recoverable());
        // The bad line was consumed; the stream continues.
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
    }

    #[test]
    fn oversized_frame_is_fatal() {
        let mut codec = ServerCodec::new();
        let mut buf = BytesMut::from(vec![b'x'; MAX_FRAME_BYTES + 2].as_slice());
        let err = codec.decode(&mut buf).unwrap_err();
        assert!(!err.is_recoverable());
    }

    #[test]
    fn encode_appends_newline() {
        let mut codec = ServerCodec::new();
        let mut buf = BytesMut::new();
        let ev = ServerEvent::UserLeft { username: "bob".into(), cid: "C01AAAAAB".into() };
        codec.encode(&ev, &mut buf).unwrap();
        assert!(buf.ends_with(b"}\n"));
        assert!(buf.starts_with(br#"{"event":"user_left""#));
    }
}
