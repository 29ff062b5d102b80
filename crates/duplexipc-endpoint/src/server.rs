use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::thread::{self, JoinHandle};

use bytes::Bytes;
use duplexipc_frame::{ChannelAddress, DuplexChannel, Frame, FrameConfig, FrameError, FrameType, Role};
use tracing::{debug, error, info};

use crate::error::{EndpointError, Result};
use crate::handler::{log_receive_error, log_response_error, Message, Reply, RequestHandler};

const DISPATCH_THREAD_NAME: &str = "duplexipc-server";

/// Lifecycle of a [`ServerEndpoint`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    /// No channel bound.
    Stopped,
    /// Channel bound; the dispatch loop has not picked it up yet.
    Listening,
    /// The dispatch loop is reading frames.
    Dispatching,
}

impl std::fmt::Display for ServerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ServerState::Stopped => "stopped",
            ServerState::Listening => "listening",
            ServerState::Dispatching => "dispatching",
        })
    }
}

struct Control {
    state: ServerState,
    channel: Option<Arc<DuplexChannel>>,
    worker: Option<JoinHandle<()>>,
}

struct ServerShared {
    address: ChannelAddress,
    config: FrameConfig,
    control: Mutex<Control>,
    handler: RwLock<Option<Arc<dyn RequestHandler>>>,
}

/// Owner side of a duplex channel.
///
/// Answers `REQUEST` frames through the registered [`RequestHandler`] and
/// pushes `NOTIFY` frames to the client at any time. Nothing is bound until
/// [`start`](Self::start).
pub struct ServerEndpoint {
    shared: Arc<ServerShared>,
}

impl ServerEndpoint {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self::with_config(path, FrameConfig::default())
    }

    pub fn with_config(path: impl AsRef<Path>, config: FrameConfig) -> Self {
        Self {
            shared: Arc::new(ServerShared {
                address: ChannelAddress::new(path),
                config,
                control: Mutex::new(Control {
                    state: ServerState::Stopped,
                    channel: None,
                    worker: None,
                }),
                handler: RwLock::new(None),
            }),
        }
    }

    /// Bind the channel and run the dispatch loop.
    ///
    /// With `blocking`, the loop runs on the calling thread and this returns
    /// once [`stop`](Self::stop) is called from elsewhere. Otherwise the loop
    /// runs on a background thread and this returns immediately.
    pub fn start(&self, blocking: bool) -> Result<()> {
        let mut control = self.shared.lock_control();
        if control.state != ServerState::Stopped {
            return Err(EndpointError::State(format!(
                "server already {}",
                control.state
            )));
        }
        // A worker left over from a stop issued on the dispatch thread.
        drop(control.worker.take());

        let channel = Arc::new(DuplexChannel::open(
            &self.shared.address,
            Role::Owner,
            self.shared.config.clone(),
        )?);
        control.channel = Some(Arc::clone(&channel));
        control.state = ServerState::Listening;

        if blocking {
            drop(control);
            info!(path = ?self.shared.address.base(), blocking, "server listening");
            self.shared.dispatch(channel);
            return Ok(());
        }

        // The handle is stored before the lock drops, so a racing `stop`
        // always finds the worker to join.
        let shared = Arc::clone(&self.shared);
        let worker_channel = Arc::clone(&channel);
        let spawned = thread::Builder::new()
            .name(DISPATCH_THREAD_NAME.to_string())
            .spawn(move || shared.dispatch(worker_channel));
        match spawned {
            Ok(handle) => {
                control.worker = Some(handle);
                drop(control);
                info!(path = ?self.shared.address.base(), blocking, "server listening");
                Ok(())
            }
            Err(err) => {
                control.channel = None;
                control.state = ServerState::Stopped;
                drop(control);
                channel.close();
                Err(EndpointError::Io(err))
            }
        }
    }

    /// Close the channel and end the dispatch loop. Idempotent.
    ///
    /// Waits for the background dispatch thread unless called from it.
    pub fn stop(&self) {
        let (channel, worker) = {
            let mut control = self.shared.lock_control();
            control.state = ServerState::Stopped;
            (control.channel.take(), control.worker.take())
        };

        let Some(channel) = channel else {
            return;
        };
        channel.close();
        info!(path = ?self.shared.address.base(), "server stopped");

        if let Some(worker) = worker {
            if worker.thread().id() == thread::current().id() {
                return;
            }
            if worker.join().is_err() {
                error!("dispatch thread panicked");
            }
        }
    }

    /// Push a notification to the client.
    pub fn notify(&self, header: impl Into<Bytes>, body: impl Into<Bytes>) -> Result<()> {
        let channel = self.shared.channel().ok_or_else(EndpointError::not_started)?;
        channel.send_frame(&Frame::new(FrameType::Notify, header, body))?;
        Ok(())
    }

    pub fn notify_message(&self, message: &Message) -> Result<()> {
        self.notify(message.header.clone(), message.body.clone())
    }

    /// Local liveness check: succeeds while the channel is bound.
    pub fn ping(&self) -> Result<()> {
        match self.state() {
            ServerState::Listening | ServerState::Dispatching => Ok(()),
            ServerState::Stopped => Err(EndpointError::not_started()),
        }
    }

    pub fn state(&self) -> ServerState {
        self.shared.lock_control().state
    }

    /// Replace the request handler. Takes effect from the next request.
    pub fn set_request_handler(&self, handler: impl RequestHandler + 'static) {
        self.set_request_handler_arc(Arc::new(handler));
    }

    pub fn set_request_handler_arc(&self, handler: Arc<dyn RequestHandler>) {
        *self
            .shared
            .handler
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(handler);
    }

    pub fn clear_request_handler(&self) {
        *self
            .shared
            .handler
            .write()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Body size ceiling for both directions (`0` = unlimited).
    pub fn set_limit_size(&self, limit: usize) {
        self.shared.config.limit.set(limit);
    }

    pub fn limit_size(&self) -> usize {
        self.shared.config.limit.get()
    }

    /// Base path of the channel.
    pub fn path(&self) -> &Path {
        self.shared.address.base()
    }
}

impl Drop for ServerEndpoint {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for ServerEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerEndpoint")
            .field("path", &self.path())
            .field("state", &self.state())
            .finish()
    }
}

impl ServerShared {
    fn lock_control(&self) -> MutexGuard<'_, Control> {
        self.control.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn channel(&self) -> Option<Arc<DuplexChannel>> {
        self.lock_control().channel.clone()
    }

    fn handler(&self) -> Option<Arc<dyn RequestHandler>> {
        self.handler
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Apply `state` if `channel` is still the one this server runs.
    fn transition(&self, channel: &Arc<DuplexChannel>, state: ServerState) {
        let mut control = self.lock_control();
        if control
            .channel
            .as_ref()
            .is_some_and(|current| Arc::ptr_eq(current, channel))
        {
            control.state = state;
            if state == ServerState::Stopped {
                control.channel = None;
            }
        }
    }

    fn dispatch(&self, channel: Arc<DuplexChannel>) {
        self.transition(&channel, ServerState::Dispatching);
        debug!(path = ?self.address.base(), "dispatch loop running");

        let mut missing_handler_reported = false;
        loop {
            match channel.receive_frame() {
                Ok(frame) => self.handle_frame(&channel, frame, &mut missing_handler_reported),
                Err(FrameError::Closed) => break,
                Err(err) => self.receive_error(&EndpointError::from(err)),
            }
        }

        self.transition(&channel, ServerState::Stopped);
        debug!(path = ?self.address.base(), "dispatch loop ended");
    }

    fn handle_frame(&self, channel: &DuplexChannel, frame: Frame, missing_handler_reported: &mut bool) {
        match frame.frame_type {
            FrameType::Ping => match channel.send_frame(&Frame::empty(FrameType::Ping)) {
                Ok(()) | Err(FrameError::Closed) => {}
                Err(err) => self.response_error(&EndpointError::from(err)),
            },
            FrameType::Request => {
                let Some(handler) = self.handler() else {
                    if !*missing_handler_reported {
                        error!(
                            path = ?self.address.base(),
                            "no request handler registered; requests go unanswered"
                        );
                        *missing_handler_reported = true;
                    }
                    return;
                };

                let request = Message::from(frame);
                let mut reply = Reply::new();
                handler.received(&request, &mut reply);

                let response = reply.into_message().into_frame(FrameType::Response);
                match channel.send_frame(&response) {
                    Ok(()) => {}
                    // Stopped while the handler ran.
                    Err(FrameError::Closed) => debug!("response dropped: server stopped"),
                    Err(err) => handler.response_error(&EndpointError::from(err)),
                }
            }
            other @ (FrameType::Notify | FrameType::Response) => {
                self.receive_error(&EndpointError::Protocol(format!(
                    "unexpected {other} frame on server"
                )));
            }
        }
    }

    fn receive_error(&self, err: &EndpointError) {
        match self.handler() {
            Some(handler) => handler.receive_error(err),
            None => log_receive_error(err),
        }
    }

    fn response_error(&self, err: &EndpointError) {
        match self.handler() {
            Some(handler) => handler.response_error(err),
            None => log_response_error(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{Duration, Instant};

    use bytes::BufMut;
    use duplexipc_frame::SizeLimit;

    use super::*;

    fn make_base(tag: &str) -> PathBuf {
        let dir = PathBuf::from(format!(
            "/tmp/dxe-{}-{}-{}",
            tag,
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("time should be after epoch")
                .as_nanos()
        ));
        std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
        dir.join("server")
    }

    fn fast_config() -> FrameConfig {
        FrameConfig {
            poll_interval: Duration::from_millis(20),
            ..FrameConfig::default()
        }
    }

    fn cleanup(base: &Path) {
        if let Some(parent) = base.parent() {
            let _ = std::fs::remove_dir_all(parent);
        }
    }

    fn peer_channel(base: &Path) -> DuplexChannel {
        DuplexChannel::open(&ChannelAddress::new(base), Role::Peer, fast_config())
            .expect("peer channel should open")
    }

    #[test]
    fn state_follows_start_and_stop() {
        let base = make_base("state");
        let server = ServerEndpoint::with_config(&base, fast_config());
        assert_eq!(server.state(), ServerState::Stopped);
        assert!(server.ping().is_err());

        server.start(false).expect("server should start");
        assert!(matches!(
            server.state(),
            ServerState::Listening | ServerState::Dispatching
        ));
        server.ping().expect("ping should succeed while running");

        let err = server.start(false).unwrap_err();
        assert!(matches!(err, EndpointError::State(_)));

        server.stop();
        assert_eq!(server.state(), ServerState::Stopped);
        server.stop();

        server.start(false).expect("server should restart");
        server.stop();
        cleanup(&base);
    }

    #[test]
    fn stop_right_after_start_joins_worker() {
        let base = make_base("quickstop");
        let server = ServerEndpoint::with_config(&base, fast_config());

        for _ in 0..50 {
            server.start(false).expect("server should start");
            server.stop();
            let control = server.shared.lock_control();
            assert!(control.worker.is_none());
            assert!(control.channel.is_none());
            assert_eq!(control.state, ServerState::Stopped);
        }
        cleanup(&base);
    }

    #[test]
    fn answers_ping_without_handler() {
        let base = make_base("ping");
        let server = ServerEndpoint::with_config(&base, fast_config());
        server.start(false).expect("server should start");

        let peer = peer_channel(&base);
        peer.send_frame(&Frame::empty(FrameType::Ping)).unwrap();
        let reply = peer.receive_frame().unwrap();
        assert_eq!(reply, Frame::empty(FrameType::Ping));

        server.stop();
        cleanup(&base);
    }

    #[test]
    fn request_is_answered_by_handler() {
        let base = make_base("request");
        let server = ServerEndpoint::with_config(&base, fast_config());
        server.set_request_handler(|request: &Message, reply: &mut Reply| {
            reply.header.put_slice(b"echo");
            reply.body.put_slice(&request.body);
        });
        server.start(false).expect("server should start");

        let peer = peer_channel(&base);
        peer.send_frame(&Frame::new(FrameType::Request, Bytes::new(), &b"abc"[..]))
            .unwrap();
        let reply = peer.receive_frame().unwrap();
        assert_eq!(reply.frame_type, FrameType::Response);
        assert_eq!(reply.header.as_ref(), b"echo");
        assert_eq!(reply.body.as_ref(), b"abc");

        server.stop();
        cleanup(&base);
    }

    #[test]
    fn unexpected_frames_go_to_receive_error() {
        struct Counting {
            receive_errors: Arc<AtomicUsize>,
        }

        impl RequestHandler for Counting {
            fn received(&self, _request: &Message, _reply: &mut Reply) {}

            fn receive_error(&self, err: &EndpointError) {
                if err.kind() == crate::ErrorKind::Protocol {
                    self.receive_errors.fetch_add(1, Ordering::SeqCst);
                }
            }
        }

        let base = make_base("unexpected");
        let receive_errors = Arc::new(AtomicUsize::new(0));
        let server = ServerEndpoint::with_config(&base, fast_config());
        server.set_request_handler(Counting {
            receive_errors: Arc::clone(&receive_errors),
        });
        server.start(false).expect("server should start");

        let peer = peer_channel(&base);
        peer.send_frame(&Frame::empty(FrameType::Notify)).unwrap();
        peer.send_frame(&Frame::empty(FrameType::Response)).unwrap();
        peer.send_frame(&Frame::empty(FrameType::Ping)).unwrap();
        peer.receive_frame().unwrap();

        assert_eq!(receive_errors.load(Ordering::SeqCst), 2);
        server.stop();
        cleanup(&base);
    }

    #[test]
    fn missing_handler_leaves_request_unanswered() {
        let base = make_base("nohandler");
        let server = ServerEndpoint::with_config(&base, fast_config());
        server.start(false).expect("server should start");

        let peer = peer_channel(&base);
        peer.send_frame(&Frame::empty(FrameType::Request)).unwrap();
        peer.send_frame(&Frame::empty(FrameType::Ping)).unwrap();
        let first = peer.receive_frame().unwrap();
        assert_eq!(first.frame_type, FrameType::Ping);

        server.stop();
        cleanup(&base);
    }

    #[test]
    fn notify_requires_started_server() {
        let base = make_base("notifystate");
        let server = ServerEndpoint::with_config(&base, fast_config());
        let err = server.notify(Bytes::new(), &b"early"[..]).unwrap_err();
        assert!(matches!(err, EndpointError::State(_)));

        server.start(false).expect("server should start");
        let err = server.notify(Bytes::new(), &b"nobody"[..]).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Connection);

        let peer = peer_channel(&base);
        server
            .notify_message(&Message::new(&b"h"[..], &b"tick"[..]))
            .expect("notify should reach the peer");
        let pushed = peer.receive_frame().unwrap();
        assert_eq!(pushed.frame_type, FrameType::Notify);
        assert_eq!(pushed.body.as_ref(), b"tick");

        server.stop();
        cleanup(&base);
    }

    #[test]
    fn stop_returns_blocking_start() {
        let base = make_base("blocking");
        let server = Arc::new(ServerEndpoint::with_config(&base, fast_config()));

        let runner = Arc::clone(&server);
        let started = thread::spawn(move || runner.start(true));

        let deadline = Instant::now() + Duration::from_secs(2);
        while server.state() != ServerState::Dispatching {
            assert!(Instant::now() < deadline, "server never started dispatching");
            thread::sleep(Duration::from_millis(5));
        }

        let stopping = Instant::now();
        server.stop();
        started
            .join()
            .expect("blocking start thread should finish")
            .expect("blocking start should return Ok");
        assert!(stopping.elapsed() < Duration::from_secs(2));
        assert_eq!(server.state(), ServerState::Stopped);
        cleanup(&base);
    }

    #[test]
    fn stop_from_handler_does_not_deadlock() {
        let base = make_base("selfstop");
        let server = Arc::new(ServerEndpoint::with_config(&base, fast_config()));
        let weak = Arc::downgrade(&server);
        server.set_request_handler(move |_request: &Message, _reply: &mut Reply| {
            if let Some(server) = weak.upgrade() {
                server.stop();
            }
        });
        server.start(false).expect("server should start");

        let peer = peer_channel(&base);
        peer.send_frame(&Frame::empty(FrameType::Request)).unwrap();

        let deadline = Instant::now() + Duration::from_secs(2);
        while server.state() != ServerState::Stopped {
            assert!(Instant::now() < deadline, "server never stopped");
            thread::sleep(Duration::from_millis(5));
        }
        server.clear_request_handler();
        cleanup(&base);
    }

    #[test]
    fn limit_applies_to_channel_opened_later() {
        let base = make_base("limit");
        let config = FrameConfig {
            limit: SizeLimit::new(8),
            ..fast_config()
        };
        let server = ServerEndpoint::with_config(&base, config);
        assert_eq!(server.limit_size(), 8);
        server.set_limit_size(100);
        server.start(false).expect("server should start");

        let _peer = peer_channel(&base);
        let err = server.notify(Bytes::new(), vec![0u8; 101]).unwrap_err();
        assert!(matches!(
            err,
            EndpointError::LimitExceeded {
                size: 101,
                limit: 100
            }
        ));

        server.stop();
        cleanup(&base);
    }
}
