use duplexipc_frame::FrameError;
use duplexipc_transport::TransportError;

/// Coarse classification of endpoint failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Peer address missing or unreachable.
    Connection,
    /// Transport read/write failure.
    Io,
    /// Malformed or unexpected traffic.
    Protocol,
    /// Payload over the configured ceiling.
    LimitExceeded,
    /// Channel closed locally; ends loops rather than signalling a failure.
    Closed,
    /// Operation not valid in the endpoint's current state.
    State,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Connection => "connection",
            ErrorKind::Io => "io",
            ErrorKind::Protocol => "protocol",
            ErrorKind::LimitExceeded => "limit_exceeded",
            ErrorKind::Closed => "closed",
            ErrorKind::State => "state",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur in endpoint operations.
#[derive(Debug, thiserror::Error)]
pub enum EndpointError {
    /// The channel could not be bound, or the peer could not be reached.
    #[error("connection error: {0}")]
    Connection(#[source] TransportError),

    /// Transport I/O failure.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Wire-format violation or a frame type the endpoint does not accept.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Body over the configured size ceiling.
    #[error("payload too large ({size} bytes, limit {limit})")]
    LimitExceeded { size: usize, limit: usize },

    /// The channel was closed.
    #[error("channel closed")]
    Closed,

    /// Operation attempted on an endpoint that is closed or not started.
    #[error("invalid state: {0}")]
    State(String),
}

impl EndpointError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EndpointError::Connection(_) => ErrorKind::Connection,
            EndpointError::Io(_) => ErrorKind::Io,
            EndpointError::Protocol(_) => ErrorKind::Protocol,
            EndpointError::LimitExceeded { .. } => ErrorKind::LimitExceeded,
            EndpointError::Closed => ErrorKind::Closed,
            EndpointError::State(_) => ErrorKind::State,
        }
    }

    pub(crate) fn endpoint_closed() -> Self {
        EndpointError::State("endpoint closed".to_string())
    }

    pub(crate) fn not_started() -> Self {
        EndpointError::State("server not started".to_string())
    }
}

impl From<FrameError> for EndpointError {
    fn from(err: FrameError) -> Self {
        match err {
            FrameError::Closed => EndpointError::Closed,
            FrameError::LimitExceeded { size, limit, .. } => {
                EndpointError::LimitExceeded { size, limit }
            }
            FrameError::Transport(TransportError::Io(err)) => EndpointError::Io(err),
            FrameError::Transport(err) => EndpointError::Connection(err),
            other => EndpointError::Protocol(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, EndpointError>;

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use duplexipc_frame::FrameType;

    use super::*;

    #[test]
    fn frame_errors_are_classified() {
        let unreachable = FrameError::Transport(TransportError::Connect {
            path: PathBuf::from("/tmp/x.up"),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        });
        assert_eq!(EndpointError::from(unreachable).kind(), ErrorKind::Connection);

        let in_use = FrameError::Transport(TransportError::AddressInUse {
            path: PathBuf::from("/tmp/x.up"),
        });
        assert_eq!(EndpointError::from(in_use).kind(), ErrorKind::Connection);

        let io = FrameError::Transport(TransportError::Io(std::io::Error::other("boom")));
        assert_eq!(EndpointError::from(io).kind(), ErrorKind::Io);

        assert_eq!(
            EndpointError::from(FrameError::UnknownType(9)).kind(),
            ErrorKind::Protocol
        );
        assert_eq!(
            EndpointError::from(FrameError::Truncated {
                expected: 10,
                actual: 4
            })
            .kind(),
            ErrorKind::Protocol
        );
        assert_eq!(EndpointError::from(FrameError::Closed).kind(), ErrorKind::Closed);
    }

    #[test]
    fn limit_error_keeps_sizes() {
        let err = EndpointError::from(FrameError::LimitExceeded {
            frame_type: FrameType::Request,
            size: 101,
            limit: 100,
        });
        assert!(matches!(
            err,
            EndpointError::LimitExceeded {
                size: 101,
                limit: 100
            }
        ));
        assert_eq!(err.to_string(), "payload too large (101 bytes, limit 100)");
    }

    #[test]
    fn closed_endpoint_is_state_error() {
        let err = EndpointError::endpoint_closed();
        assert_eq!(err.kind(), ErrorKind::State);
        assert_eq!(err.to_string(), "invalid state: endpoint closed");
    }
}
