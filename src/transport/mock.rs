//! In-memory transport for tests.
//!
//! Clones share state, so a test keeps one handle while the engine owns
//! another.

use super::Transport;
use crate::error::{Error, Result};
use bytes::Bytes;
use std::collections::VecDeque;
use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// A datagram waiting to be received.
#[derive(Clone, Debug)]
struct Inbound {
    data: Bytes,
    source: SocketAddr,
    /// Length reported by `pending`; differs from `data.len()` to fake a short read.
    reported_len: usize,
}

/// A datagram the engine sent.
#[derive(Clone, Debug, PartialEq)]
pub struct SentDatagram {
    /// Payload.
    pub data: Bytes,
    /// Destination.
    pub target: SocketAddr,
}

#[derive(Debug)]
struct MockTransportInner {
    local_addr: SocketAddr,
    inbound: VecDeque<Inbound>,
    staged: Option<Inbound>,
    sent: Vec<SentDatagram>,
    fail_sends: bool,
    stopped: bool,
    restarts: usize,
}

/// Programmable transport.
///
/// # Example
///
/// ```rust
/// use snmp_engine::transport::{MockTransport, Transport};
///
/// let mut mock = MockTransport::new("127.0.0.1:161".parse().unwrap());
/// let handle = mock.clone();
/// handle.push_inbound(&b"datagram"[..], "10.0.0.1:40000".parse().unwrap());
///
/// let (len, _) = mock.pending().unwrap().unwrap();
/// let mut buf = [0u8; 64];
/// assert_eq!(mock.read(&mut buf), len);
/// ```
#[derive(Clone, Debug)]
pub struct MockTransport {
    inner: Arc<Mutex<MockTransportInner>>,
}

impl MockTransport {
    /// Create a mock bound to `local_addr`.
    pub fn new(local_addr: SocketAddr) -> Self {
        Self {
            inner: Arc::new(Mutex::new(MockTransportInner {
                local_addr,
                inbound: VecDeque::new(),
                staged: None,
                sent: Vec::new(),
                fail_sends: false,
                stopped: false,
                restarts: 0,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockTransportInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue a datagram for the engine to receive.
    pub fn push_inbound(&self, data: impl Into<Bytes>, source: SocketAddr) {
        let data = data.into();
        let reported_len = data.len();
        self.lock().inbound.push_back(Inbound {
            data,
            source,
            reported_len,
        });
    }

    /// Queue a datagram whose advertised length differs from its payload.
    pub fn push_inbound_with_len(&self, data: impl Into<Bytes>, source: SocketAddr, reported_len: usize) {
        self.lock().inbound.push_back(Inbound {
            data: data.into(),
            source,
            reported_len,
        });
    }

    /// Number of datagrams still waiting.
    pub fn inbound_len(&self) -> usize {
        self.lock().inbound.len()
    }

    /// Remove and return everything sent so far.
    pub fn take_sent(&self) -> Vec<SentDatagram> {
        std::mem::take(&mut self.lock().sent)
    }

    /// Number of datagrams sent and not yet taken.
    pub fn sent_len(&self) -> usize {
        self.lock().sent.len()
    }

    /// Make every following send fail with an I/O error.
    pub fn set_fail_sends(&self, fail: bool) {
        self.lock().fail_sends = fail;
    }

    /// Whether `stop` was called without a later `restart`.
    pub fn is_stopped(&self) -> bool {
        self.lock().stopped
    }

    /// Number of `restart` calls.
    pub fn restarts(&self) -> usize {
        self.lock().restarts
    }
}

impl Transport for MockTransport {
    fn pending(&mut self) -> io::Result<Option<(usize, SocketAddr)>> {
        let mut inner = self.lock();
        if inner.stopped {
            return Ok(None);
        }
        let next = inner.inbound.pop_front();
        let result = next.as_ref().map(|d| (d.reported_len, d.source));
        inner.staged = next;
        Ok(result)
    }

    fn read(&mut self, buf: &mut [u8]) -> usize {
        let Some(staged) = self.lock().staged.take() else {
            return 0;
        };
        let n = staged.data.len().min(buf.len());
        buf[..n].copy_from_slice(&staged.data[..n]);
        n
    }

    fn send_to(&mut self, data: &[u8], target: SocketAddr) -> Result<()> {
        let mut inner = self.lock();
        if inner.fail_sends || inner.stopped {
            return Err(Error::io(
                Some(target),
                io::Error::new(io::ErrorKind::ConnectionRefused, "mock send failure"),
            ));
        }
        inner.sent.push(SentDatagram {
            data: Bytes::copy_from_slice(data),
            target,
        });
        Ok(())
    }

    fn local_addr(&self) -> SocketAddr {
        self.lock().local_addr
    }

    fn restart(&mut self) -> Result<()> {
        let mut inner = self.lock();
        inner.stopped = false;
        inner.restarts += 1;
        Ok(())
    }

    fn stop(&mut self) {
        let mut inner = self.lock();
        inner.stopped = true;
        inner.staged = None;
    }
}
