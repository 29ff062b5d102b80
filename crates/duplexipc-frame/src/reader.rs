use bytes::BytesMut;
use duplexipc_transport::{DatagramSource, MAX_DATAGRAM_SIZE};
use tracing::{trace, warn};

use crate::codec::{
    decode_frame, Frame, Preamble, SizeLimit, CHUNK_CONTINUE, CHUNK_START,
};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Reassembly progress of the frame currently being received.
#[derive(Debug)]
struct Pending {
    preamble: Preamble,
    expected: usize,
    received: usize,
    /// Body exceeds the limit: consume the chunks but keep no bytes.
    discard: bool,
}

/// Reads complete frames from a datagram source.
///
/// Reassembles chunked frames internally; callers only ever see complete
/// frames. Progress survives receive timeouts, so a timed-out call can simply
/// be retried.
pub struct FrameReader<T> {
    inner: T,
    datagram: Vec<u8>,
    buf: BytesMut,
    pending: Option<Pending>,
    limit: SizeLimit,
}

impl<T: DatagramSource> FrameReader<T> {
    /// Create a new frame reader with the default body limit.
    pub fn new(inner: T) -> Self {
        Self::with_limit(inner, SizeLimit::default())
    }

    /// Create a new frame reader sharing an explicit body limit.
    pub fn with_limit(inner: T, limit: SizeLimit) -> Self {
        Self {
            inner,
            datagram: vec![0u8; MAX_DATAGRAM_SIZE],
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            pending: None,
            limit,
        }
    }

    /// Read the next complete frame (blocking).
    ///
    /// Returns `Err(FrameError::Closed)` on an empty read, which is what a shut
    /// down source yields. Like a timeout, this keeps any partial frame, so the
    /// owner of the source decides whether the stream really ended. A frame
    /// whose body exceeds the limit is consumed entirely and then reported as
    /// `FrameError::LimitExceeded`; the next call reads the following frame.
    pub fn read_frame(&mut self) -> Result<Frame> {
        loop {
            let n = self.inner.recv_datagram(&mut self.datagram)?;
            if n == 0 {
                return Err(FrameError::Closed);
            }
            if let Some(frame) = self.accept_datagram(n)? {
                return Ok(frame);
            }
        }
    }

    fn accept_datagram(&mut self, n: usize) -> Result<Option<Frame>> {
        let marker = self.datagram[0];
        let chunk = &self.datagram[1..n];

        match marker {
            CHUNK_START => {
                if let Some(stale) = self.pending.take() {
                    warn!(
                        expected = stale.expected,
                        received = stale.received,
                        "discarding incomplete frame"
                    );
                }
                self.buf.clear();

                let preamble = Preamble::decode(chunk)?;
                let expected = preamble.wire_size();
                if chunk.len() > expected {
                    return Err(FrameError::Overrun {
                        expected,
                        received: chunk.len(),
                    });
                }

                let discard = !self.limit.allows(preamble.body_len as usize);
                if !discard {
                    self.buf.reserve(expected);
                    self.buf.extend_from_slice(chunk);
                }
                self.pending = Some(Pending {
                    preamble,
                    expected,
                    received: chunk.len(),
                    discard,
                });
            }
            CHUNK_CONTINUE => {
                let Some(pending) = self.pending.as_mut() else {
                    warn!(size = chunk.len(), "dropping continuation without a started frame");
                    return Ok(None);
                };
                let received = pending.received + chunk.len();
                if received > pending.expected {
                    let expected = pending.expected;
                    self.pending = None;
                    self.buf.clear();
                    return Err(FrameError::Overrun { expected, received });
                }
                if !pending.discard {
                    self.buf.extend_from_slice(chunk);
                }
                pending.received = received;
            }
            other => {
                warn!(marker = other, size = n, "dropping datagram with unknown chunk marker");
                return Ok(None);
            }
        }

        match self.pending.take() {
            Some(pending) if pending.received == pending.expected => {
                if pending.discard {
                    self.buf.clear();
                    return Err(FrameError::LimitExceeded {
                        frame_type: pending.preamble.frame_type,
                        size: pending.preamble.body_len as usize,
                        limit: self.limit.get(),
                    });
                }
                let frame = decode_frame(&self.buf);
                self.buf.clear();
                let frame = frame?;
                trace!(
                    frame_type = %frame.frame_type,
                    size = pending.expected,
                    "frame read"
                );
                Ok(Some(frame))
            }
            incomplete => {
                self.pending = incomplete;
                Ok(None)
            }
        }
    }

    /// Borrow the underlying source.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Consume the reader and return the inner source.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// The body limit applied to incoming frames.
    pub fn limit(&self) -> &SizeLimit {
        &self.limit
    }

    /// Returns true while a chunked frame is partially reassembled.
    pub fn is_mid_frame(&self) -> bool {
        self.pending.is_some()
    }
}
