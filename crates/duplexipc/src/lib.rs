//! Duplex request/response and push-notify IPC for processes on one host.
//!
//! duplexipc carries typed frames over a pair of Unix datagram addresses
//! derived from one base path. A server answers correlated requests and can
//! push notifications at any time; a client issues blocking round trips from
//! any thread while one background thread receives everything the server
//! sends.
//!
//! # Crate Structure
//!
//! - [`transport`]: Unix datagram endpoints and address derivation
//! - [`frame`]: Frame codec, chunking and duplex channels
//! - [`endpoint`]: Server and client endpoints (behind `endpoint` feature)
//! - [`calc`]: Payloads of the calculator demo service

pub mod calc;

/// Re-export transport types.
pub mod transport {
    pub use duplexipc_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use duplexipc_frame::*;
}

/// Re-export endpoint types (requires `endpoint` feature).
#[cfg(feature = "endpoint")]
pub mod endpoint {
    pub use duplexipc_endpoint::*;
}
