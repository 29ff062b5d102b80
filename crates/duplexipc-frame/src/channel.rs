//! Duplex channel over two one-directional datagram addresses.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use duplexipc_transport::{ChannelAddress, DatagramReceiver, DatagramSender, Role};
use tracing::{debug, info, warn};

use crate::codec::{Frame, FrameConfig, SizeLimit};
use crate::error::{FrameError, Result};
use crate::reader::FrameReader;
use crate::writer::FrameWriter;

/// One side of a logical duplex channel.
///
/// Sending and receiving take separate locks, so one thread can sit in
/// [`receive_frame`](Self::receive_frame) while others send. Concurrent
/// senders are serialized frame by frame.
pub struct DuplexChannel {
    address: ChannelAddress,
    role: Role,
    limit: SizeLimit,
    closed: AtomicBool,
    writer: Mutex<FrameWriter<DatagramSender>>,
    reader: Mutex<FrameReader<DatagramReceiver>>,
    /// Second handle on the receive socket, used to interrupt a blocked reader.
    rx_control: DatagramReceiver,
}

impl DuplexChannel {
    /// Bind this side's receive address and prepare the transmit socket.
    ///
    /// The peer does not need to exist yet; a missing peer surfaces on the
    /// first [`send_frame`](Self::send_frame).
    pub fn open(address: &ChannelAddress, role: Role, config: FrameConfig) -> Result<Self> {
        let rx_path = address.rx_path(role);
        let tx_path = address.tx_path(role);

        let receiver = DatagramReceiver::bind_with_mode(&rx_path, config.socket_mode)?;
        receiver.set_read_timeout(Some(config.poll_interval))?;
        let rx_control = receiver.try_clone()?;
        let sender = DatagramSender::new(&tx_path)?;

        info!(
            base = ?address.base(),
            ?role,
            rx = ?rx_path,
            tx = ?tx_path,
            "channel opened"
        );

        Ok(Self {
            address: address.clone(),
            role,
            limit: config.limit.clone(),
            closed: AtomicBool::new(false),
            writer: Mutex::new(FrameWriter::with_limit(sender, config.limit.clone())),
            reader: Mutex::new(FrameReader::with_limit(receiver, config.limit)),
            rx_control,
        })
    }

    /// Close the channel. Safe to call more than once and from any thread.
    ///
    /// A thread blocked in `receive_frame` returns `FrameError::Closed`.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Err(err) = self.rx_control.shutdown() {
            debug!(error = %err, "receive shutdown failed; reader stops on next poll");
        }
        self.rx_control.release();
        info!(base = ?self.address.base(), role = ?self.role, "channel closed");
    }

    pub fn is_open(&self) -> bool {
        !self.closed.load(Ordering::SeqCst)
    }

    /// Send one frame to the peer.
    pub fn send_frame(&self, frame: &Frame) -> Result<()> {
        if !self.is_open() {
            return Err(FrameError::Closed);
        }
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        writer.write_frame(frame)
    }

    /// Block until the next complete frame arrives or the channel is closed.
    pub fn receive_frame(&self) -> Result<Frame> {
        let mut reader = self.reader.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            if !self.is_open() {
                return Err(FrameError::Closed);
            }
            match reader.read_frame() {
                Ok(frame) => {
                    debug!(
                        frame_type = %frame.frame_type,
                        size = frame.wire_size(),
                        "frame received"
                    );
                    return Ok(frame);
                }
                Err(err) if err.is_timeout() => continue,
                Err(FrameError::Closed) if self.is_open() => {
                    warn!(base = ?self.address.base(), "dropping empty datagram");
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Set the body size ceiling for both directions (`0` = unlimited).
    pub fn set_limit_size(&self, limit: usize) {
        self.limit.set(limit);
    }

    pub fn limit_size(&self) -> usize {
        self.limit.get()
    }

    pub fn address(&self) -> &ChannelAddress {
        &self.address
    }

    pub fn role(&self) -> Role {
        self.role
    }
}

impl Drop for DuplexChannel {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for DuplexChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DuplexChannel")
            .field("base", &self.address.base())
            .field("role", &self.role)
            .field("open", &self.is_open())
            .field("limit", &self.limit.get())
            .finish()
    }
}
