use bytes::BytesMut;
use duplexipc_transport::{DatagramSink, MAX_DATAGRAM_SIZE};
use tracing::trace;

use crate::codec::{encode_frame, Frame, SizeLimit, CHUNK_CONTINUE, CHUNK_PAYLOAD_SIZE, CHUNK_START};
use crate::error::Result;

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Writes complete frames to a datagram sink, splitting them into chunks.
///
/// The first datagram of a frame carries `CHUNK_START`, the rest
/// `CHUNK_CONTINUE`. The body limit is checked before anything is sent, so a
/// rejected frame never reaches the peer.
pub struct FrameWriter<T> {
    inner: T,
    buf: BytesMut,
    datagram: Vec<u8>,
    limit: SizeLimit,
}

impl<T: DatagramSink> FrameWriter<T> {
    /// Create a new frame writer with the default body limit.
    pub fn new(inner: T) -> Self {
        Self::with_limit(inner, SizeLimit::default())
    }

    /// Create a new frame writer sharing an explicit body limit.
    pub fn with_limit(inner: T, limit: SizeLimit) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            datagram: Vec::with_capacity(MAX_DATAGRAM_SIZE),
            limit,
        }
    }

    /// Write a complete frame (blocking).
    pub fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        self.limit.check(frame.frame_type, frame.body.len())?;

        self.buf.clear();
        encode_frame(frame, &mut self.buf)?;

        let mut marker = CHUNK_START;
        let mut chunks = 0usize;
        for piece in self.buf.chunks(CHUNK_PAYLOAD_SIZE) {
            self.datagram.clear();
            self.datagram.push(marker);
            self.datagram.extend_from_slice(piece);
            self.inner.send_datagram(&self.datagram)?;
            marker = CHUNK_CONTINUE;
            chunks += 1;
        }

        trace!(
            frame_type = %frame.frame_type,
            size = frame.wire_size(),
            chunks,
            "frame written"
        );
        Ok(())
    }

    /// Borrow the underlying sink.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Consume the writer and return the inner sink.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// The body limit applied to outgoing frames.
    pub fn limit(&self) -> &SizeLimit {
        &self.limit
    }
}
