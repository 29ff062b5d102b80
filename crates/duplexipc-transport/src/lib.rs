//! Datagram transport for duplexipc.
//!
//! A logical duplex channel is built from two one-directional Unix datagram
//! sockets derived from a single base path. Each side binds only its own
//! receive address and transmits to the peer's receive address through an
//! unbound socket.
//!
//! This is the lowest layer of duplexipc. Framing and chunking live in
//! `duplexipc-frame`.

pub mod address;
pub mod error;
pub mod traits;

#[cfg(unix)]
pub mod uds;

pub use address::{ChannelAddress, Role};
pub use error::{Result, TransportError};
pub use traits::{DatagramSink, DatagramSource};

#[cfg(unix)]
pub use uds::{DatagramReceiver, DatagramSender, MAX_DATAGRAM_SIZE};
