use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Suffix of the client → server datagram address.
pub const UPSTREAM_SUFFIX: &str = ".up";
/// Suffix of the server → client datagram address.
pub const DOWNSTREAM_SUFFIX: &str = ".down";

/// Which side of a duplex channel a process plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Server side. Receives on the upstream address.
    Owner,
    /// Client side. Receives on the downstream address.
    Peer,
}

impl Role {
    /// The opposite side of the channel.
    pub fn opposite(self) -> Self {
        match self {
            Role::Owner => Role::Peer,
            Role::Peer => Role::Owner,
        }
    }
}

/// Names one logical connection by a filesystem base path.
///
/// Both sides must agree on the base path. One side's transmit address is
/// always the other side's receive address:
///
/// ```text
///   Owner (server)                         Peer (client)
///   rx  <base>.up    <──────────────────   tx  <base>.up
///   tx  <base>.down  ──────────────────>   rx  <base>.down
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelAddress {
    base: PathBuf,
}

impl ChannelAddress {
    pub fn new(base: impl AsRef<Path>) -> Self {
        Self {
            base: base.as_ref().to_path_buf(),
        }
    }

    /// The base path both sides agreed on.
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Address this role binds and receives on.
    pub fn rx_path(&self, role: Role) -> PathBuf {
        match role {
            Role::Owner => self.with_suffix(UPSTREAM_SUFFIX),
            Role::Peer => self.with_suffix(DOWNSTREAM_SUFFIX),
        }
    }

    /// Address this role transmits to.
    pub fn tx_path(&self, role: Role) -> PathBuf {
        self.rx_path(role.opposite())
    }

    fn with_suffix(&self, suffix: &str) -> PathBuf {
        let mut raw: OsString = self.base.as_os_str().to_owned();
        raw.push(suffix);
        PathBuf::from(raw)
    }
}

impl From<&Path> for ChannelAddress {
    fn from(path: &Path) -> Self {
        Self::new(path)
    }
}

impl From<PathBuf> for ChannelAddress {
    fn from(base: PathBuf) -> Self {
        Self { base }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tx_of_one_side_is_rx_of_the_other() {
        let addr = ChannelAddress::new("/tmp/duplexipc-demo");
        assert_eq!(addr.tx_path(Role::Owner), addr.rx_path(Role::Peer));
        assert_eq!(addr.tx_path(Role::Peer), addr.rx_path(Role::Owner));
        assert_ne!(addr.rx_path(Role::Owner), addr.rx_path(Role::Peer));
    }

    #[test]
    fn derived_paths_keep_base_and_append_suffix() {
        let addr = ChannelAddress::new("/tmp/chan.sock");
        assert_eq!(
            addr.rx_path(Role::Owner),
            PathBuf::from("/tmp/chan.sock.up")
        );
        assert_eq!(
            addr.rx_path(Role::Peer),
            PathBuf::from("/tmp/chan.sock.down")
        );
    }
}
