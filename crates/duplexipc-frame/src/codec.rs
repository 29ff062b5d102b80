use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use duplexipc_transport::MAX_DATAGRAM_SIZE;

use crate::error::{FrameError, Result};

/// Preamble: type (1) + reserved (1) + header length (2) + body length (4) = 8 bytes.
pub const PREAMBLE_SIZE: usize = 8;

/// Largest application header carried by a frame.
pub const MAX_HEADER_LEN: usize = 511;

/// Default body size ceiling: 0xFFFFFF bytes (just under 16 MiB).
pub const DEFAULT_LIMIT_SIZE: usize = 0x00FF_FFFF;

/// Chunk marker: datagram starts a new frame (preamble follows).
pub const CHUNK_START: u8 = 0x01;

/// Chunk marker: datagram continues the frame being reassembled.
pub const CHUNK_CONTINUE: u8 = 0x02;

/// Frame bytes carried per datagram, after the one-byte chunk marker.
pub const CHUNK_PAYLOAD_SIZE: usize = MAX_DATAGRAM_SIZE - 1;

/// Discriminates the four frame kinds on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FrameType {
    /// Liveness probe; answered with another `Ping`.
    Ping = 1,
    /// Client → server call.
    Request = 2,
    /// Server → client answer to the outstanding request.
    Response = 3,
    /// Unsolicited server → client push.
    Notify = 4,
}

impl FrameType {
    pub fn tag(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            FrameType::Ping => "PING",
            FrameType::Request => "REQUEST",
            FrameType::Response => "RESPONSE",
            FrameType::Notify => "NOTIFY",
        }
    }
}

impl TryFrom<u8> for FrameType {
    type Error = FrameError;

    fn try_from(tag: u8) -> Result<Self> {
        match tag {
            1 => Ok(FrameType::Ping),
            2 => Ok(FrameType::Request),
            3 => Ok(FrameType::Response),
            4 => Ok(FrameType::Notify),
            other => Err(FrameError::UnknownType(other)),
        }
    }
}

impl std::fmt::Display for FrameType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// One protocol message: type plus opaque application header and body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub frame_type: FrameType,
    pub header: Bytes,
    pub body: Bytes,
}

impl Frame {
    /// Create a new frame.
    pub fn new(frame_type: FrameType, header: impl Into<Bytes>, body: impl Into<Bytes>) -> Self {
        Self {
            frame_type,
            header: header.into(),
            body: body.into(),
        }
    }

    /// A frame with empty header and body.
    pub fn empty(frame_type: FrameType) -> Self {
        Self::new(frame_type, Bytes::new(), Bytes::new())
    }

    /// The total wire size of this frame (preamble + header + body).
    pub fn wire_size(&self) -> usize {
        PREAMBLE_SIZE + self.header.len() + self.body.len()
    }

    /// Encode into a fresh buffer.
    pub fn encode(&self) -> Result<Bytes> {
        let mut dst = BytesMut::with_capacity(self.wire_size());
        encode_frame(self, &mut dst)?;
        Ok(dst.freeze())
    }

    /// Decode a complete frame from `src`.
    pub fn decode(src: &[u8]) -> Result<Self> {
        decode_frame(src)
    }
}

/// Fixed-size prefix of every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Preamble {
    pub frame_type: FrameType,
    pub header_len: u16,
    pub body_len: u32,
}

impl Preamble {
    /// Build the preamble describing `frame`, checking field capacities.
    pub fn for_frame(frame: &Frame) -> Result<Self> {
        if frame.header.len() > MAX_HEADER_LEN {
            return Err(FrameError::HeaderTooLarge {
                size: frame.header.len(),
                max: MAX_HEADER_LEN,
            });
        }
        let body_len = u32::try_from(frame.body.len()).map_err(|_| FrameError::BodyTooLarge {
            size: frame.body.len(),
            max: u32::MAX as usize,
        })?;
        Ok(Self {
            frame_type: frame.frame_type,
            header_len: frame.header.len() as u16,
            body_len,
        })
    }

    /// Parse the first `PREAMBLE_SIZE` bytes of `src`.
    pub fn decode(src: &[u8]) -> Result<Self> {
        if src.len() < PREAMBLE_SIZE {
            return Err(FrameError::Malformed {
                len: src.len(),
                min: PREAMBLE_SIZE,
            });
        }
        let mut cursor = &src[..PREAMBLE_SIZE];
        let frame_type = FrameType::try_from(cursor.get_u8())?;
        let _reserved = cursor.get_u8();
        let header_len = cursor.get_u16_le();
        let body_len = cursor.get_u32_le();

        if header_len as usize > MAX_HEADER_LEN {
            return Err(FrameError::HeaderTooLarge {
                size: header_len as usize,
                max: MAX_HEADER_LEN,
            });
        }

        Ok(Self {
            frame_type,
            header_len,
            body_len,
        })
    }

    pub fn encode(&self, dst: &mut BytesMut) {
        dst.put_u8(self.frame_type.tag());
        dst.put_u8(0);
        dst.put_u16_le(self.header_len);
        dst.put_u32_le(self.body_len);
    }

    /// Total size of the frame this preamble announces.
    pub fn wire_size(&self) -> usize {
        PREAMBLE_SIZE + self.header_len as usize + self.body_len as usize
    }
}

/// Encode a frame into the wire format.
///
/// Wire format:
/// ```text
/// ┌──────────┬──────────┬─────────────┬─────────────┬─────────────┬─────────────┐
/// │ Type     │ Reserved │ Header len  │ Body len    │ Header      │ Body        │
/// │ (1B)     │ (1B, 0)  │ (2B LE)     │ (4B LE)     │ (≤ 511B)    │ (≤ limit)   │
/// └──────────┴──────────┴─────────────┴─────────────┴─────────────┴─────────────┘
/// ```
pub fn encode_frame(frame: &Frame, dst: &mut BytesMut) -> Result<()> {
    let preamble = Preamble::for_frame(frame)?;
    dst.reserve(frame.wire_size());
    preamble.encode(dst);
    dst.put_slice(&frame.header);
    dst.put_slice(&frame.body);
    Ok(())
}

/// Decode exactly one frame occupying all of `src`.
pub fn decode_frame(src: &[u8]) -> Result<Frame> {
    let preamble = Preamble::decode(src)?;
    let expected = preamble.wire_size();
    if src.len() < expected {
        return Err(FrameError::Truncated {
            expected,
            actual: src.len(),
        });
    }
    if src.len() > expected {
        return Err(FrameError::TrailingBytes {
            expected,
            actual: src.len(),
        });
    }

    let header_end = PREAMBLE_SIZE + preamble.header_len as usize;
    let header = Bytes::copy_from_slice(&src[PREAMBLE_SIZE..header_end]);
    let body = Bytes::copy_from_slice(&src[header_end..expected]);

    Ok(Frame {
        frame_type: preamble.frame_type,
        header,
        body,
    })
}

/// Shared, adjustable body size ceiling. `0` means unlimited.
///
/// Clones observe the same value, so a reader and writer configured from one
/// `SizeLimit` change together.
#[derive(Clone)]
pub struct SizeLimit(Arc<AtomicUsize>);

impl SizeLimit {
    pub fn new(limit: usize) -> Self {
        Self(Arc::new(AtomicUsize::new(limit)))
    }

    pub fn unlimited() -> Self {
        Self::new(0)
    }

    pub fn get(&self) -> usize {
        self.0.load(Ordering::Relaxed)
    }

    pub fn set(&self, limit: usize) {
        self.0.store(limit, Ordering::Relaxed);
    }

    /// Returns true if a body of `size` bytes passes the ceiling.
    pub fn allows(&self, size: usize) -> bool {
        let limit = self.get();
        limit == 0 || size <= limit
    }

    /// Error out if a `frame_type` body of `size` bytes exceeds the ceiling.
    pub fn check(&self, frame_type: FrameType, size: usize) -> Result<()> {
        if self.allows(size) {
            Ok(())
        } else {
            Err(FrameError::LimitExceeded {
                frame_type,
                size,
                limit: self.get(),
            })
        }
    }
}

impl Default for SizeLimit {
    fn default() -> Self {
        Self::new(DEFAULT_LIMIT_SIZE)
    }
}

impl std::fmt::Debug for SizeLimit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("SizeLimit").field(&self.get()).finish()
    }
}

/// Configuration for a duplex channel and its frame reader/writer.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Body size ceiling. Default: 0xFFFFFF bytes.
    pub limit: SizeLimit,
    /// How often a blocked receive re-checks whether the channel was closed.
    pub poll_interval: Duration,
    /// Permission mode of the bound receive address.
    pub socket_mode: u32,
}

impl FrameConfig {
    /// Default config with an explicit body limit (`0` = unlimited).
    pub fn with_limit(limit: usize) -> Self {
        Self {
            limit: SizeLimit::new(limit),
            ..Self::default()
        }
    }
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            limit: SizeLimit::default(),
            poll_interval: Duration::from_millis(100),
            socket_mode: 0o600,
        }
    }
}
