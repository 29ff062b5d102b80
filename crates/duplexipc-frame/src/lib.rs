//! Typed message framing for duplexipc.
//!
//! Every message is one frame:
//! - An 8-byte preamble: type tag, reserved byte, header length (u16 LE),
//!   body length (u32 LE)
//! - An opaque application header of at most 511 bytes
//! - An opaque body, bounded by a configurable size limit
//!
//! Frames larger than one datagram are split into marked chunks and
//! reassembled on receipt. No partial reads reach user code.

pub mod channel;
pub mod codec;
pub mod error;
pub mod reader;
pub mod writer;

pub use channel::DuplexChannel;
pub use codec::{
    decode_frame, encode_frame, Frame, FrameConfig, FrameType, Preamble, SizeLimit,
    CHUNK_CONTINUE, CHUNK_PAYLOAD_SIZE, CHUNK_START, DEFAULT_LIMIT_SIZE, MAX_HEADER_LEN,
    PREAMBLE_SIZE,
};
pub use error::{FrameError, Result};
pub use reader::FrameReader;
pub use writer::FrameWriter;

pub use duplexipc_transport::{ChannelAddress, Role};
