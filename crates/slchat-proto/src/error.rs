//! Protocol-level errors.

use thiserror::Error;

/// Errors produced while reading or writing wire events.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The peer sent a frame that is not valid JSON for the expected event set.
    #[error("malformed event: {0}")]
    Malformed(#[from] serde_json::Error),

    /// A single frame exceeded the maximum permitted size.
    #[error("event frame too long: {0} bytes")]
    FrameTooLong(usize),

    /// Underlying transport failure.
    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProtocolError {
    /// Whether the connection can survive this error.
    ///
    /// Malformed frames are recoverable (the offending frame is dropped);
    /// oversized frames and I/O failures are not, because the stream can no
    /// longer be re-synchronized.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Malformed(_))
    }
}
