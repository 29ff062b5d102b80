use bytes::{Bytes, BytesMut};
use duplexipc_frame::{Frame, FrameType};
use tracing::{error, warn};

use crate::error::EndpointError;

/// Application payload of a request, response or notification.
///
/// Header and body are opaque to the endpoints. Use the `bytes::Buf`
/// cursor methods (`get_i32_le`, ...) to read typed values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    pub header: Bytes,
    pub body: Bytes,
}

impl Message {
    pub fn new(header: impl Into<Bytes>, body: impl Into<Bytes>) -> Self {
        Self {
            header: header.into(),
            body: body.into(),
        }
    }

    /// A message with an empty header.
    pub fn from_body(body: impl Into<Bytes>) -> Self {
        Self::new(Bytes::new(), body)
    }

    pub(crate) fn into_frame(self, frame_type: FrameType) -> Frame {
        Frame::new(frame_type, self.header, self.body)
    }
}

impl From<Frame> for Message {
    fn from(frame: Frame) -> Self {
        Self {
            header: frame.header,
            body: frame.body,
        }
    }
}

/// Output buffers a request handler fills in.
///
/// Write typed values with the `bytes::BufMut` methods (`put_i32_le`, ...).
/// Whatever the handler leaves here is sent back as the response.
#[derive(Debug, Default)]
pub struct Reply {
    pub header: BytesMut,
    pub body: BytesMut,
}

impl Reply {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_message(self) -> Message {
        Message::new(self.header.freeze(), self.body.freeze())
    }
}

/// Server-side request processing.
///
/// `received` runs on the dispatch thread; no other frame is read until it
/// returns.
pub trait RequestHandler: Send + Sync {
    /// Fill `reply` with the answer to `request`.
    fn received(&self, request: &Message, reply: &mut Reply);

    /// Called when the dispatch loop fails to read a frame or receives one a
    /// server does not accept.
    fn receive_error(&self, err: &EndpointError) {
        log_receive_error(err);
    }

    /// Called when a response could not be sent back.
    fn response_error(&self, err: &EndpointError) {
        log_response_error(err);
    }
}

impl<F> RequestHandler for F
where
    F: Fn(&Message, &mut Reply) + Send + Sync,
{
    fn received(&self, request: &Message, reply: &mut Reply) {
        self(request, reply)
    }
}

/// Client-side receiver for server pushes.
///
/// Runs on the client's receiver thread. Responses queue up behind it, so it
/// must return promptly and must not call back into the same client.
pub trait NotifyReceiver: Send + Sync {
    fn receive_notify(&self, notification: &Message);
}

impl<F> NotifyReceiver for F
where
    F: Fn(&Message) + Send + Sync,
{
    fn receive_notify(&self, notification: &Message) {
        self(notification)
    }
}

pub(crate) fn log_receive_error(err: &EndpointError) {
    warn!(error = %err, kind = %err.kind(), "receive failed");
}

pub(crate) fn log_response_error(err: &EndpointError) {
    error!(error = %err, kind = %err.kind(), "response not delivered");
}
