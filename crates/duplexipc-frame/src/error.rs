use duplexipc_transport::TransportError;

use crate::codec::FrameType;

/// Errors that can occur during frame encoding, decoding and transfer.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The preamble carries a type tag outside the four known frame types.
    #[error("unknown frame type {0:#04x}")]
    UnknownType(u8),

    /// Fewer bytes than a preamble.
    #[error("malformed preamble ({len} bytes, need {min})")]
    Malformed { len: usize, min: usize },

    /// Fewer bytes available than the preamble declares.
    #[error("truncated frame ({actual} of {expected} bytes)")]
    Truncated { expected: usize, actual: usize },

    /// More bytes available than the preamble declares.
    #[error("trailing bytes after frame ({actual} bytes, frame is {expected})")]
    TrailingBytes { expected: usize, actual: usize },

    /// A chunk ran past the end of the frame being reassembled.
    #[error("chunk overruns frame ({received} bytes received, frame is {expected})")]
    Overrun { expected: usize, received: usize },

    /// The application header exceeds the preamble's header budget.
    #[error("header too large ({size} bytes, max {max})")]
    HeaderTooLarge { size: usize, max: usize },

    /// The body does not fit the preamble's length field.
    #[error("body too large for wire format ({size} bytes, max {max})")]
    BodyTooLarge { size: usize, max: usize },

    /// The body exceeds the configured size ceiling.
    #[error("payload too large ({size} bytes, limit {limit})")]
    LimitExceeded {
        frame_type: FrameType,
        size: usize,
        limit: usize,
    },

    /// The channel was closed locally.
    #[error("channel closed")]
    Closed,

    /// The datagram transport failed.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl FrameError {
    /// Returns true for wire-format violations.
    pub fn is_protocol(&self) -> bool {
        matches!(
            self,
            FrameError::UnknownType(_)
                | FrameError::Malformed { .. }
                | FrameError::Truncated { .. }
                | FrameError::TrailingBytes { .. }
                | FrameError::Overrun { .. }
                | FrameError::HeaderTooLarge { .. }
                | FrameError::BodyTooLarge { .. }
        )
    }

    /// Type of the frame the error belongs to, when one can be named.
    ///
    /// Only a drained oversized frame qualifies; wire-format and transport
    /// errors cannot be tied to a particular frame.
    pub fn frame_type(&self) -> Option<FrameType> {
        match self {
            FrameError::LimitExceeded { frame_type, .. } => Some(*frame_type),
            _ => None,
        }
    }

    /// Returns true if the error is a receive poll timeout rather than a failure.
    pub fn is_timeout(&self) -> bool {
        match self {
            FrameError::Transport(TransportError::Io(err)) => matches!(
                err.kind(),
                std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
            ),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
