use std::io::ErrorKind;
use std::net::Shutdown;
use std::os::fd::{AsRawFd, RawFd};
use std::os::unix::fs::{FileTypeExt, MetadataExt, PermissionsExt};
use std::os::unix::net::UnixDatagram;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::traits::{DatagramSink, DatagramSource};

/// Largest datagram either side sends or accepts.
///
/// Socket buffers are sized from this so one datagram always fits, including
/// on platforms with a small default (macOS caps local datagrams at 2 KiB).
pub const MAX_DATAGRAM_SIZE: usize = 32 * 1024;

const SEND_BUFFER_SIZE: usize = MAX_DATAGRAM_SIZE * 4;
const RECV_BUFFER_SIZE: usize = MAX_DATAGRAM_SIZE * 16;

/// Maximum socket path length.
/// Unix `sockaddr_un.sun_path` is typically 108 bytes on Linux, 104 on macOS.
#[cfg(target_os = "linux")]
const MAX_PATH_LEN: usize = 108;
#[cfg(not(target_os = "linux"))]
const MAX_PATH_LEN: usize = 104;

/// The bound, receiving half of a channel direction.
///
/// Owns the socket file at `path` and removes it on drop, unless the path
/// was replaced by another file in the meantime.
pub struct DatagramReceiver {
    socket: UnixDatagram,
    path: PathBuf,
    created_inode: Option<(u64, u64)>,
    /// Whether the path should be removed on drop. False for clones.
    cleanup_on_drop: bool,
}

impl DatagramReceiver {
    /// Default permission mode for created socket paths.
    pub const DEFAULT_SOCKET_MODE: u32 = 0o600;

    /// Bind a datagram socket at `path`.
    ///
    /// A stale socket file (no live owner) is removed first. A socket that
    /// still has a live owner is never taken over.
    pub fn bind(path: impl AsRef<Path>) -> Result<Self> {
        Self::bind_with_mode(path, Self::DEFAULT_SOCKET_MODE)
    }

    /// Bind a datagram socket at `path` with explicit mode.
    pub fn bind_with_mode(path: impl AsRef<Path>, mode: u32) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let path_bytes = path.as_os_str().len();
        if path_bytes >= MAX_PATH_LEN {
            return Err(TransportError::PathTooLong {
                path,
                len: path_bytes,
                max: MAX_PATH_LEN,
            });
        }

        if let Ok(metadata) = std::fs::symlink_metadata(&path) {
            if !metadata.file_type().is_socket() {
                return Err(TransportError::Bind {
                    path: path.clone(),
                    source: std::io::Error::new(
                        ErrorKind::AlreadyExists,
                        "existing path is not a unix socket",
                    ),
                });
            }
            if has_live_owner(&path) {
                return Err(TransportError::AddressInUse { path });
            }
            debug!(?path, "removing stale socket");
            std::fs::remove_file(&path).map_err(|e| TransportError::Bind {
                path: path.clone(),
                source: e,
            })?;
        }

        let socket = UnixDatagram::bind(&path).map_err(|e| TransportError::Bind {
            path: path.clone(),
            source: e,
        })?;

        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(mode)).map_err(|e| {
            TransportError::Bind {
                path: path.clone(),
                source: e,
            }
        })?;
        let created_metadata =
            std::fs::symlink_metadata(&path).map_err(|e| TransportError::Bind {
                path: path.clone(),
                source: e,
            })?;
        let created_inode = Some((created_metadata.dev(), created_metadata.ino()));

        size_socket_buffer(socket.as_raw_fd(), libc::SO_RCVBUF, RECV_BUFFER_SIZE);

        info!(?path, "bound datagram receive address");

        Ok(Self {
            socket,
            path,
            created_inode,
            cleanup_on_drop: true,
        })
    }

    /// Receive one datagram (blocking, subject to the read timeout).
    pub fn recv(&self, buf: &mut [u8]) -> Result<usize> {
        loop {
            match self.socket.recv(buf) {
                Ok(n) => return Ok(n),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(TransportError::Io(err)),
            }
        }
    }

    /// Set the read timeout used by `recv`.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.socket.set_read_timeout(timeout).map_err(Into::into)
    }

    /// Shut down the read side, waking a blocked `recv` with `Ok(0)`.
    pub fn shutdown(&self) -> Result<()> {
        match self.socket.shutdown(Shutdown::Read) {
            Ok(()) => Ok(()),
            // Some platforms refuse shutdown on unconnected datagram sockets.
            Err(err) if err.kind() == ErrorKind::NotConnected => Ok(()),
            Err(err) => Err(TransportError::Io(err)),
        }
    }

    /// Try to clone this receiver (creates a new file descriptor).
    ///
    /// The clone never removes the socket file on drop.
    pub fn try_clone(&self) -> Result<Self> {
        Ok(Self {
            socket: self.socket.try_clone()?,
            path: self.path.clone(),
            created_inode: self.created_inode,
            cleanup_on_drop: false,
        })
    }

    /// Remove the socket file if it is still the one this receiver created.
    pub fn release(&self) {
        let Some((expected_dev, expected_ino)) = self.created_inode else {
            return;
        };
        if let Ok(metadata) = std::fs::symlink_metadata(&self.path) {
            if metadata.file_type().is_socket()
                && metadata.dev() == expected_dev
                && metadata.ino() == expected_ino
            {
                debug!(path = ?self.path, "cleaning up socket file");
                let _ = std::fs::remove_file(&self.path);
            } else {
                debug!(
                    path = ?self.path,
                    "socket path identity changed; skipping cleanup"
                );
            }
        }
    }

    /// The path this socket is bound to.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DatagramSource for DatagramReceiver {
    fn recv_datagram(&self, buf: &mut [u8]) -> Result<usize> {
        self.recv(buf)
    }
}

impl Drop for DatagramReceiver {
    fn drop(&mut self) {
        if self.cleanup_on_drop {
            self.release();
        }
    }
}

impl std::fmt::Debug for DatagramReceiver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatagramReceiver")
            .field("path", &self.path)
            .finish()
    }
}

/// The unbound, transmitting half of a channel direction.
pub struct DatagramSender {
    socket: UnixDatagram,
    target: PathBuf,
}

impl DatagramSender {
    /// Create a sender addressing the peer's receive path.
    ///
    /// The target does not need to exist yet.
    pub fn new(target: impl AsRef<Path>) -> Result<Self> {
        let socket = UnixDatagram::unbound()?;
        size_socket_buffer(socket.as_raw_fd(), libc::SO_SNDBUF, SEND_BUFFER_SIZE);
        Ok(Self {
            socket,
            target: target.as_ref().to_path_buf(),
        })
    }

    /// Send one datagram to the target (blocking while the peer queue is full).
    pub fn send(&self, datagram: &[u8]) -> Result<()> {
        loop {
            match self.socket.send_to(datagram, &self.target) {
                Ok(_) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err)
                    if matches!(
                        err.kind(),
                        ErrorKind::NotFound | ErrorKind::ConnectionRefused | ErrorKind::BrokenPipe
                    ) =>
                {
                    return Err(TransportError::Connect {
                        path: self.target.clone(),
                        source: err,
                    });
                }
                Err(err) => return Err(TransportError::Io(err)),
            }
        }
    }

    /// The peer address this sender transmits to.
    pub fn target(&self) -> &Path {
        &self.target
    }
}

impl DatagramSink for DatagramSender {
    fn send_datagram(&self, datagram: &[u8]) -> Result<()> {
        self.send(datagram)
    }
}

impl std::fmt::Debug for DatagramSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatagramSender")
            .field("target", &self.target)
            .finish()
    }
}

/// A socket file is live when some process still has it bound.
fn has_live_owner(path: &Path) -> bool {
    match UnixDatagram::unbound() {
        Ok(probe) => probe.connect(path).is_ok(),
        Err(_) => false,
    }
}

fn size_socket_buffer(fd: RawFd, option: libc::c_int, size: usize) {
    let value = libc::c_int::try_from(size).unwrap_or(libc::c_int::MAX);

    // SAFETY: `value` is a valid readable c_int for the duration of the call,
    // the length matches its size, and `fd` is an open socket owned by the caller.
    let rc = unsafe {
        libc::setsockopt(
            fd,
            libc::SOL_SOCKET,
            option,
            (&value as *const libc::c_int).cast::<libc::c_void>(),
            std::mem::size_of::<libc::c_int>() as libc::socklen_t,
        )
    };

    if rc != 0 {
        debug!(
            option,
            size,
            error = %std::io::Error::last_os_error(),
            "could not resize socket buffer"
        );
    }
}
