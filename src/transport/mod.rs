//! Datagram transports driven by the engines.
//!
//! Engines never block on I/O. Each `poll()` asks a [`Transport`] whether a
//! datagram is waiting and how long it is, then reads it into the engine's
//! own packet buffer.

mod udp;

#[cfg(any(test, feature = "testing"))]
mod mock;

pub use udp::*;

#[cfg(any(test, feature = "testing"))]
pub use mock::*;

use crate::error::Result;
use std::io;
use std::net::SocketAddr;

/// Non-blocking datagram endpoint.
///
/// The receive side is split in two so the caller can reject an oversized
/// datagram before copying it: [`pending`](Transport::pending) stages the
/// next datagram and reports its length and source, [`read`](Transport::read)
/// copies the staged datagram out.
pub trait Transport: Send {
    /// Stage the next datagram, if any.
    ///
    /// Returns its full length and source. A datagram staged by an earlier
    /// call and never read is discarded.
    fn pending(&mut self) -> io::Result<Option<(usize, SocketAddr)>>;

    /// Copy the staged datagram into `buf`.
    ///
    /// Returns the number of bytes copied, which is less than the length
    /// reported by `pending` when `buf` is too small or nothing is staged.
    fn read(&mut self, buf: &mut [u8]) -> usize;

    /// Send one datagram.
    fn send_to(&mut self, data: &[u8], target: SocketAddr) -> Result<()>;

    /// Local bind address.
    fn local_addr(&self) -> SocketAddr;

    /// Close and reopen on the same local address.
    fn restart(&mut self) -> Result<()>;

    /// Close the endpoint. Later calls report no datagrams and fail to send.
    fn stop(&mut self);
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn pending(&mut self) -> io::Result<Option<(usize, SocketAddr)>> {
        (**self).pending()
    }

    fn read(&mut self, buf: &mut [u8]) -> usize {
        (**self).read(buf)
    }

    fn send_to(&mut self, data: &[u8], target: SocketAddr) -> Result<()> {
        (**self).send_to(data, target)
    }

    fn local_addr(&self) -> SocketAddr {
        (**self).local_addr()
    }

    fn restart(&mut self) -> Result<()> {
        (**self).restart()
    }

    fn stop(&mut self) {
        (**self).stop()
    }
}
