//! Internal utilities.

use std::io;
use std::net::{SocketAddr, UdpSocket};

use socket2::{Domain, Protocol, Socket, Type};

/// Create and bind a non-blocking UDP socket.
///
/// For IPv6 addresses, sets `IPV6_V6ONLY = false` to enable dual-stack mode.
/// `SO_REUSEADDR` is set so a restarted transport can rebind its port
/// immediately.
pub(crate) fn bind_udp_socket(
    addr: SocketAddr,
    recv_buffer_size: Option<usize>,
) -> io::Result<UdpSocket> {
    let domain = if addr.is_ipv6() {
        Domain::IPV6
    } else {
        Domain::IPV4
    };

    let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))?;

    if addr.is_ipv6() {
        socket.set_only_v6(false)?;
    }

    socket.set_reuse_address(true)?;

    if let Some(size) = recv_buffer_size {
        // kernel caps at rmem_max
        let _ = socket.set_recv_buffer_size(size);
    }

    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;

    Ok(socket.into())
}

/// Source of request IDs for one engine.
///
/// IDs are always positive. The starting point is random so a restarted
/// process does not reuse the previous incarnation's IDs.
#[derive(Debug)]
pub(crate) struct RequestIdGen {
    next: i32,
}

impl RequestIdGen {
    pub(crate) fn new() -> Self {
        let mut seed = [0u8; 4];
        let start = match getrandom::fill(&mut seed) {
            Ok(()) => i32::from_ne_bytes(seed) & i32::MAX,
            Err(_) => {
                use std::time::{SystemTime, UNIX_EPOCH};
                SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .map(|d| d.subsec_nanos() as i32)
                    .unwrap_or(1)
            }
        };
        Self {
            next: start.max(1),
        }
    }

    /// Start from a fixed value; used by tests that assert on IDs.
    #[cfg(test)]
    pub(crate) fn starting_at(next: i32) -> Self {
        Self { next: next.max(1) }
    }

    pub(crate) fn next_id(&mut self) -> i32 {
        let id = self.next;
        self.next = if id == i32::MAX { 1 } else { id + 1 };
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_udp_socket_ipv4() {
        let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
        let socket = bind_udp_socket(addr, None).unwrap();
        let local = socket.local_addr().unwrap();
        assert!(local.is_ipv4());
        assert_ne!(local.port(), 0);
    }

    #[test]
    fn test_bind_udp_socket_is_nonblocking() {
        let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
        let socket = bind_udp_socket(addr, Some(64 * 1024)).unwrap();
        let mut buf = [0u8; 16];
        let err = socket.recv_from(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::WouldBlock);
    }

    #[test]
    fn test_request_ids_positive_and_wrap() {
        let mut ids = RequestIdGen::starting_at(i32::MAX - 1);
        assert_eq!(ids.next_id(), i32::MAX - 1);
        assert_eq!(ids.next_id(), i32::MAX);
        assert_eq!(ids.next_id(), 1);

        let mut random = RequestIdGen::new();
        for _ in 0..100 {
            assert!(random.next_id() > 0);
        }
    }
}
