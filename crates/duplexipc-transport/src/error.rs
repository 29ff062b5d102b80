use std::path::PathBuf;

/// Errors that can occur in datagram transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to bind the local receive address.
    #[error("failed to bind to {path}: {source}")]
    Bind {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The peer's receive address is missing or refuses datagrams.
    #[error("failed to reach {path}: {source}")]
    Connect {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Another live process already owns the address.
    #[error("address already owned by a live socket: {path}")]
    AddressInUse { path: PathBuf },

    /// An I/O error occurred on the socket.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The socket path is too long for the platform.
    #[error("socket path too long ({len} bytes, max {max}): {path}")]
    PathTooLong {
        path: PathBuf,
        len: usize,
        max: usize,
    },
}

impl TransportError {
    /// Returns true if the error means the peer is not reachable.
    pub fn is_unreachable(&self) -> bool {
        matches!(self, TransportError::Connect { .. })
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;
