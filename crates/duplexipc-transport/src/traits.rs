use crate::error::Result;

/// Something that delivers whole datagrams to one fixed destination.
///
/// A datagram is either delivered entirely or the call fails.
pub trait DatagramSink {
    fn send_datagram(&self, datagram: &[u8]) -> Result<()>;
}

/// Something that yields whole datagrams.
pub trait DatagramSource {
    /// Receive one datagram into `buf` (blocking).
    ///
    /// Returns `Ok(0)` once the source has been shut down. Read timeouts
    /// surface as `TransportError::Io` with `WouldBlock` or `TimedOut`.
    fn recv_datagram(&self, buf: &mut [u8]) -> Result<usize>;
}

impl<T: DatagramSink + ?Sized> DatagramSink for &T {
    fn send_datagram(&self, datagram: &[u8]) -> Result<()> {
        (**self).send_datagram(datagram)
    }
}

impl<T: DatagramSource + ?Sized> DatagramSource for &T {
    fn recv_datagram(&self, buf: &mut [u8]) -> Result<usize> {
        (**self).recv_datagram(buf)
    }
}

impl<T: DatagramSink + ?Sized> DatagramSink for std::sync::Arc<T> {
    fn send_datagram(&self, datagram: &[u8]) -> Result<()> {
        (**self).send_datagram(datagram)
    }
}

impl<T: DatagramSource + ?Sized> DatagramSource for std::sync::Arc<T> {
    fn recv_datagram(&self, buf: &mut [u8]) -> Result<usize> {
        (**self).recv_datagram(buf)
    }
}
