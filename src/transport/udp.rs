//! UDP transport over a non-blocking socket.

use super::Transport;
use crate::error::{Error, Result};
use crate::util::bind_udp_socket;
use std::io;
use std::net::{SocketAddr, UdpSocket};

/// Largest UDP payload.
const MAX_DATAGRAM: usize = 65535;

/// UDP transport for agents and managers.
///
/// Incoming datagrams are received whole into an internal staging buffer so
/// their true length is known before the engine copies them out.
pub struct UdpTransport {
    socket: Option<UdpSocket>,
    local_addr: SocketAddr,
    staged: Box<[u8]>,
    staged_len: usize,
}

impl UdpTransport {
    /// Bind to `addr`. Port 0 picks an ephemeral port.
    pub fn bind(addr: impl Into<SocketAddr>) -> Result<Self> {
        let addr = addr.into();
        let socket = bind_udp_socket(addr, None).map_err(|e| Error::io(Some(addr), e))?;
        let local_addr = socket.local_addr().map_err(|e| Error::io(Some(addr), e))?;

        tracing::debug!(target: "snmp_engine::transport", { snmp.local_addr = %local_addr }, "UDP transport bound");

        Ok(Self {
            socket: Some(socket),
            local_addr,
            staged: vec![0u8; MAX_DATAGRAM].into_boxed_slice(),
            staged_len: 0,
        })
    }
}

impl Transport for UdpTransport {
    fn pending(&mut self) -> io::Result<Option<(usize, SocketAddr)>> {
        self.staged_len = 0;
        let Some(socket) = &self.socket else {
            return Ok(None);
        };
        match socket.recv_from(&mut self.staged) {
            Ok((len, source)) => {
                self.staged_len = len;
                Ok(Some((len, source)))
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn read(&mut self, buf: &mut [u8]) -> usize {
        let n = self.staged_len.min(buf.len());
        buf[..n].copy_from_slice(&self.staged[..n]);
        self.staged_len = 0;
        n
    }

    fn send_to(&mut self, data: &[u8], target: SocketAddr) -> Result<()> {
        let Some(socket) = &self.socket else {
            return Err(Error::io(
                Some(target),
                io::Error::new(io::ErrorKind::NotConnected, "transport stopped"),
            ));
        };
        match socket.send_to(data, target) {
            Ok(n) if n == data.len() => Ok(()),
            Ok(n) => Err(Error::io(
                Some(target),
                io::Error::new(
                    io::ErrorKind::WriteZero,
                    format!("short send: {} of {} bytes", n, data.len()),
                ),
            )),
            Err(e) => Err(Error::io(Some(target), e)),
        }
    }

    fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    fn restart(&mut self) -> Result<()> {
        self.stop();
        let socket =
            bind_udp_socket(self.local_addr, None).map_err(|e| Error::io(Some(self.local_addr), e))?;
        tracing::debug!(target: "snmp_engine::transport", { snmp.local_addr = %self.local_addr }, "UDP transport restarted");
        self.socket = Some(socket);
        Ok(())
    }

    fn stop(&mut self) {
        self.socket = None;
        self.staged_len = 0;
    }
}
