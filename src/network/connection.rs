//! Per-connection task.
//!
//! Each accepted link runs a two-phase lifecycle:
//! - Phase 1: handshake. The client must present its identity assertion
//!   within the configured timeout, before any state is created.
//! - Phase 2: unified event loop. Inbound events dispatch to handlers while
//!   queued outbound events drain to the transport.
//!
//! Whatever ends phase 2 (clean close, half-closed socket, protocol fault),
//! the session is detached through the Hub's canonical cleanup.

use crate::auth;
use crate::error::HandlerError;
use crate::handlers::{Context, Registry};
use crate::state::SharedHub;
use futures_util::{SinkExt, StreamExt};
use slchat_proto::{ClientEvent, ConnId, ProtocolError, ServerCodec, ServerEvent};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_rustls::server::TlsStream;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::WebSocketStream;
use tokio_util::codec::Framed;
use tracing::{debug, info, warn};

/// Transport over which events flow, one variant per listener type.
pub enum Transport {
    Tcp(Framed<TcpStream, ServerCodec>),
    Tls(Framed<TlsStream<TcpStream>, ServerCodec>),
    WebSocket(WebSocketStream<TcpStream>),
}

impl Transport {
    /// Read the next inbound event. `None` means the peer closed the link.
    async fn next_event(&mut self) -> Option<Result<ClientEvent, ProtocolError>> {
        match self {
            Self::Tcp(framed) => framed.next().await,
            Self::Tls(framed) => framed.next().await,
            Self::WebSocket(ws) => loop {
                let frame = match ws.next().await? {
                    Ok(frame) => frame,
                    Err(e) => {
                        return Some(Err(ProtocolError::Io(std::io::Error::other(e))));
                    }
                };
                match frame {
                    WsMessage::Text(text) => {
                        return Some(serde_json::from_str(&text).map_err(ProtocolError::Malformed));
                    }
                    WsMessage::Binary(bytes) => {
                        return Some(
                            serde_json::from_slice(&bytes).map_err(ProtocolError::Malformed),
                        );
                    }
                    WsMessage::Close(_) => return None,
                    // Ping/pong are handled by tungstenite; keep reading.
                    WsMessage::Ping(_) | WsMessage::Pong(_) | WsMessage::Frame(_) => continue,
                }
            },
        }
    }

    /// Write one event to the peer.
    async fn send_event(&mut self, event: &ServerEvent) -> Result<(), ProtocolError> {
        match self {
            Self::Tcp(framed) => framed.send(event).await,
            Self::Tls(framed) => framed.send(event).await,
            Self::WebSocket(ws) => {
                let json = serde_json::to_string(event).map_err(ProtocolError::Malformed)?;
                ws.send(WsMessage::Text(json))
                    .await
                    .map_err(|e| ProtocolError::Io(std::io::Error::other(e)))
            }
        }
    }
}

/// A single client connection.
pub struct Connection {
    cid: ConnId,
    transport: Transport,
    addr: SocketAddr,
    hub: SharedHub,
    registry: Arc<Registry>,
}

impl Connection {
    pub fn new_plaintext(
        cid: ConnId,
        stream: TcpStream,
        addr: SocketAddr,
        hub: SharedHub,
        registry: Arc<Registry>,
    ) -> Self {
        Self {
            cid,
            transport: Transport::Tcp(Framed::new(stream, ServerCodec::new())),
            addr,
            hub,
            registry,
        }
    }

    pub fn new_tls(
        cid: ConnId,
        stream: TlsStream<TcpStream>,
        addr: SocketAddr,
        hub: SharedHub,
        registry: Arc<Registry>,
    ) -> Self {
        Self {
            cid,
            transport: Transport::Tls(Framed::new(stream, ServerCodec::new())),
            addr,
            hub,
            registry,
        }
    }

    pub fn new_websocket(
        cid: ConnId,
        stream: WebSocketStream<TcpStream>,
        addr: SocketAddr,
        hub: SharedHub,
        registry: Arc<Registry>,
    ) -> Self {
        Self {
            cid,
            transport: Transport::WebSocket(stream),
            addr,
            hub,
            registry,
        }
    }

    /// Drive the connection to completion.
    pub async fn run(mut self) -> anyhow::Result<()> {
        crate::metrics::sessions_started().inc();

        // Phase 1: the client must authenticate before it exists anywhere.
        let identity = match self.handshake().await {
            Ok(identity) => identity,
            Err(e) => {
                info!(cid = %self.cid, addr = %self.addr, code = e.error_code(), "Handshake rejected");
                if let Some(event) = e.to_client_event() {
                    let _ = self.transport.send_event(&event).await;
                }
                return Ok(());
            }
        };

        let (tx, mut rx) = mpsc::unbounded_channel();
        if let Err(e) = self.hub.attach_session(&self.cid, &identity, tx) {
            if let Some(event) = e.to_client_event() {
                let _ = self.transport.send_event(&event).await;
            }
            return Ok(());
        }

        // Phase 2: unified event loop.
        self.event_loop(&identity, &mut rx).await;

        // Cleanup is unconditional and idempotent: it runs the same way for
        // graceful closes and abrupt transport faults.
        self.hub.detach_session(&self.cid);
        Ok(())
    }

    /// Wait for a valid `auth` event, bounded by the handshake timeout.
    async fn handshake(&mut self) -> Result<String, HandlerError> {
        let deadline = Instant::now() + self.hub.auth.handshake_timeout;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                crate::metrics::auth_failures().inc();
                return Err(HandlerError::Authentication("handshake timeout"));
            }

            let result = tokio::time::timeout(remaining, self.transport.next_event()).await;
            match result {
                Ok(Some(Ok(ClientEvent::Auth { token }))) => {
                    let identity = auth::verify_token(&token, &self.hub.auth.secret)?;
                    debug!(cid = %self.cid, identity = %identity, "Assertion accepted");
                    return Ok(identity);
                }
                Ok(Some(Ok(other))) => {
                    debug!(cid = %self.cid, event = other.name(), "Event before authentication");
                    crate::metrics::auth_failures().inc();
                    return Err(HandlerError::NotAuthenticated);
                }
                Ok(Some(Err(e))) => {
                    debug!(cid = %self.cid, error = %e, "Unreadable handshake frame");
                    crate::metrics::auth_failures().inc();
                    return Err(HandlerError::Authentication("malformed handshake"));
                }
                Ok(None) => {
                    return Err(HandlerError::Authentication("closed during handshake"));
                }
                Err(_) => {
                    // Timed out; the loop check above produces the error.
                    continue;
                }
            }
        }
    }

    /// Process inbound events and drain the outbound queue until the link
    /// drops or faults.
    async fn event_loop(&mut self, identity: &str, rx: &mut mpsc::UnboundedReceiver<ServerEvent>) {
        debug!(cid = %self.cid, "Entering event loop");

        loop {
            if !self.hub.registry.contains(&self.cid) {
                info!(cid = %self.cid, "Session removed from registry - disconnecting");
                break;
            }

            tokio::select! {
                result = self.transport.next_event() => {
                    match result {
                        Some(Ok(event)) => {
                            let ctx = Context {
                                cid: &self.cid,
                                identity,
                                hub: &self.hub,
                            };
                            if let Err(e) = self.registry.dispatch(&ctx, &event).await {
                                // Silent outcomes are absorbed in dispatch;
                                // anything else is fatal for this link only.
                                warn!(cid = %self.cid, code = e.error_code(), "Dispatch failed");
                                break;
                            }
                        }
                        Some(Err(e)) if e.is_recoverable() => {
                            warn!(cid = %self.cid, error = %e, "Dropping malformed event");
                        }
                        Some(Err(e)) => {
                            debug!(cid = %self.cid, error = %e, "Transport error");
                            break;
                        }
                        None => {
                            info!(cid = %self.cid, "Client disconnected");
                            break;
                        }
                    }
                }

                Some(event) = rx.recv() => {
                    if let Err(e) = self.transport.send_event(&event).await {
                        debug!(cid = %self.cid, error = %e, "Write error");
                        break;
                    }
                }
            }
        }
    }
}
