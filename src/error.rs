//! Unified error handling for slchatd.
//!
//! One taxonomy covers handshake and event handling, with a static
//! `error_code` per variant for metrics labeling and a policy mapping each
//! variant to what (if anything) the client gets to see.

use slchat_proto::{ConnId, ServerEvent};
use thiserror::Error;

/// Errors that can occur while processing a connection's events.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// Missing/invalid identity assertion. The connection is rejected before
    /// any state is created.
    #[error("authentication failed: {0}")]
    Authentication(&'static str),

    /// A connection id already present in the registry. Transport guarantees
    /// make this an invariant violation: logged and rejected.
    #[error("duplicate connection id: {0}")]
    DuplicateConnection(ConnId),

    /// Operation referenced a room name outside the provisioned set.
    /// Silently ignored: no state change, nothing surfaced to the client.
    #[error("not a room: {0}")]
    NotARoom(String),

    /// Operation referenced an unknown or already-evicted message id.
    /// Silently ignored.
    #[error("message not found: {0}")]
    NotFound(u64),

    /// An event other than `auth` arrived before authentication completed.
    #[error("not authenticated")]
    NotAuthenticated,
}

/// Result type for event handlers.
pub type HandlerResult = Result<(), HandlerError>;

impl HandlerError {
    /// Static error code string for metrics labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Authentication(_) => "authentication_error",
            Self::DuplicateConnection(_) => "duplicate_connection",
            Self::NotARoom(_) => "not_a_room",
            Self::NotFound(_) => "not_found",
            Self::NotAuthenticated => "not_authenticated",
        }
    }

    /// Whether the error is a silent no-op from the client's point of view.
    ///
    /// `NotARoom` and `NotFound` are normal business outcomes of racing
    /// against room changes and retention eviction; the action simply has no
    /// visible effect.
    pub fn is_silent(&self) -> bool {
        matches!(self, Self::NotARoom(_) | Self::NotFound(_))
    }

    /// Convert to a client-visible error event, for errors that close the
    /// connection. Returns `None` for everything else.
    pub fn to_client_event(&self) -> Option<ServerEvent> {
        match self {
            Self::Authentication(reason) => Some(ServerEvent::Error {
                code: self.error_code().to_string(),
                reason: (*reason).to_string(),
            }),
            Self::DuplicateConnection(_) | Self::NotAuthenticated => Some(ServerEvent::Error {
                code: self.error_code().to_string(),
                reason: self.to_string(),
            }),
            Self::NotARoom(_) | Self::NotFound(_) => None,
        }
    }
}
