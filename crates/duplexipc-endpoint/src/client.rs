use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::thread::{self, JoinHandle};

use duplexipc_frame::{ChannelAddress, DuplexChannel, Frame, FrameConfig, FrameError, FrameType, Role};
use tracing::{debug, error, info, warn};

use crate::correlation::CorrelationSlot;
use crate::error::{EndpointError, Result};
use crate::handler::{Message, NotifyReceiver};

const RECEIVER_THREAD_NAME: &str = "duplexipc-client";

struct ClientShared {
    channel: DuplexChannel,
    slot: CorrelationSlot,
    notify: RwLock<Option<Arc<dyn NotifyReceiver>>>,
}

/// Peer side of a duplex channel.
///
/// One background thread reads everything the server sends: replies go to
/// the caller waiting in [`send_receive`](Self::send_receive) or
/// [`ping`](Self::ping), notifications go to the registered
/// [`NotifyReceiver`]. Round trips from concurrent callers are serialized.
pub struct ClientEndpoint {
    shared: Arc<ClientShared>,
    send_lock: Mutex<()>,
    receiver: Mutex<Option<JoinHandle<()>>>,
}

impl ClientEndpoint {
    /// Connect with default configuration.
    ///
    /// The server does not need to be running yet.
    pub fn connect(path: impl AsRef<Path>) -> Result<Self> {
        Self::connect_with_config(path, FrameConfig::default())
    }

    pub fn connect_with_config(path: impl AsRef<Path>, config: FrameConfig) -> Result<Self> {
        let address = ChannelAddress::new(path);
        let channel = DuplexChannel::open(&address, Role::Peer, config)?;
        let shared = Arc::new(ClientShared {
            channel,
            slot: CorrelationSlot::default(),
            notify: RwLock::new(None),
        });

        let background = Arc::clone(&shared);
        let receiver = thread::Builder::new()
            .name(RECEIVER_THREAD_NAME.to_string())
            .spawn(move || background.receive_loop())
            .map_err(|err| {
                shared.channel.close();
                EndpointError::Io(err)
            })?;

        info!(path = ?address.base(), "client connected");
        Ok(Self {
            shared,
            send_lock: Mutex::new(()),
            receiver: Mutex::new(Some(receiver)),
        })
    }

    /// Send a request and block until its response arrives.
    ///
    /// Concurrent callers queue behind the one in flight. There is no
    /// timeout; closing the endpoint releases a waiting caller.
    pub fn send_receive(&self, request: Message) -> Result<Message> {
        self.round_trip(request.into_frame(FrameType::Request))
    }

    /// Round trip an empty `PING`.
    ///
    /// Fails with a connection error while no server is listening.
    pub fn ping(&self) -> Result<()> {
        self.round_trip(Frame::empty(FrameType::Ping)).map(|_| ())
    }

    fn round_trip(&self, frame: Frame) -> Result<Message> {
        let _round_trip = self.send_lock.lock().unwrap_or_else(PoisonError::into_inner);

        self.shared.slot.begin()?;
        if let Err(err) = self.shared.channel.send_frame(&frame) {
            self.shared.slot.abandon();
            return Err(match err {
                FrameError::Closed => EndpointError::endpoint_closed(),
                other => other.into(),
            });
        }
        debug!(frame_type = %frame.frame_type, size = frame.wire_size(), "awaiting reply");
        self.shared.slot.wait()
    }

    /// Replace the notification receiver. Takes effect from the next push.
    ///
    /// The receiver runs on the receive thread, so it must not call
    /// `send_receive` or `ping` on this client.
    pub fn set_notify_receiver(&self, receiver: impl NotifyReceiver + 'static) {
        self.set_notify_receiver_arc(Arc::new(receiver));
    }

    pub fn set_notify_receiver_arc(&self, receiver: Arc<dyn NotifyReceiver>) {
        *self
            .shared
            .notify
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(receiver);
    }

    pub fn clear_notify_receiver(&self) {
        *self
            .shared
            .notify
            .write()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Body size ceiling for both directions (`0` = unlimited).
    pub fn set_limit_size(&self, limit: usize) {
        self.shared.channel.set_limit_size(limit);
    }

    pub fn limit_size(&self) -> usize {
        self.shared.channel.limit_size()
    }

    /// Close the channel and stop the receiver thread. Idempotent.
    pub fn close(&self) {
        self.shared.channel.close();

        let receiver = self
            .receiver
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(receiver) = receiver {
            if receiver.thread().id() == thread::current().id() {
                return;
            }
            if receiver.join().is_err() {
                error!("client receiver thread panicked");
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        !self.shared.channel.is_open() || self.shared.slot.is_closed()
    }

    /// Base path of the channel.
    pub fn path(&self) -> &Path {
        self.shared.channel.address().base()
    }
}

impl Drop for ClientEndpoint {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for ClientEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientEndpoint")
            .field("path", &self.path())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl ClientShared {
    fn notify_receiver(&self) -> Option<Arc<dyn NotifyReceiver>> {
        self.notify
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn receive_loop(&self) {
        loop {
            match self.channel.receive_frame() {
                Ok(frame) => self.handle_frame(frame),
                Err(FrameError::Closed) => break,
                Err(err) => self.handle_error(err),
            }
        }
        self.slot.close();
        debug!(path = ?self.channel.address().base(), "client receiver stopped");
    }

    /// Only a failed reply may complete the pending call. Anything else would
    /// leave the call's real reply in flight for the next caller to pick up.
    fn handle_error(&self, err: FrameError) {
        match err.frame_type() {
            Some(frame_type @ (FrameType::Response | FrameType::Ping)) => {
                if let Some(Err(err)) = self.slot.deliver(Err(EndpointError::from(err))) {
                    warn!(%frame_type, error = %err, "dropping failed reply with no call pending");
                }
            }
            frame_type => {
                warn!(?frame_type, error = %err, "dropping unreadable frame");
            }
        }
    }

    fn handle_frame(&self, frame: Frame) {
        match frame.frame_type {
            FrameType::Response | FrameType::Ping => {
                let frame_type = frame.frame_type;
                if self.slot.deliver(Ok(Message::from(frame))).is_some() {
                    warn!(%frame_type, "dropping reply with no call pending");
                }
            }
            FrameType::Notify => match self.notify_receiver() {
                Some(receiver) => receiver.receive_notify(&Message::from(frame)),
                None => debug!(size = frame.body.len(), "no notify receiver; dropping push"),
            },
            FrameType::Request => {
                warn!("unexpected REQUEST frame on client; dropping");
            }
        }
    }
}
