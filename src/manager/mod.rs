//! SNMP manager: periodic polling of remote agents.
//!
//! Each poller pairs a [`Device`] with a [`Handler`]. The handler's OID is
//! requested from the device every interval and the answer is written into
//! the handler's storage.
//!
//! One [`Manager::poll`] runs three steps in a fixed order:
//!
//! 1. [`teardown_old_requests`](Manager::teardown_old_requests) returns
//!    pollers whose request timed out to idle.
//! 2. [`prepare_next_polling_request`](Manager::prepare_next_polling_request)
//!    sends one GET for the due pollers of a single device.
//! 3. [`process_incoming_packets`](Manager::process_incoming_packets) handles
//!    at most one inbound datagram.

mod device;
mod polling;

pub use device::Device;
pub use polling::{PollState, PollingInfo};

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::AtomicI32;
use std::time::Duration;

use bytes::Bytes;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::codec;
use crate::error::{Error, Result};
use crate::handler::{Binding, Handler};
use crate::message::{CommunityMessage, Message};
use crate::oid::Oid;
use crate::pdu::{Pdu, PduType};
use crate::poll::PollStatus;
use crate::transport::{Transport, UdpTransport};
use crate::util::RequestIdGen;
use crate::version::Version;
use crate::{DEFAULT_POLL_INTERVAL, MAX_POLL_BINDINGS, MAX_TEARDOWN_PER_PASS, REQUEST_TIMEOUT};

const IDLE_PACING: Duration = Duration::from_millis(5);

/// One polling registration.
#[derive(Debug)]
struct Poller {
    handler: Arc<Handler>,
    device: Arc<Device>,
    info: PollingInfo,
}

/// Builder for [`Manager`].
pub struct ManagerBuilder {
    transport: Option<Box<dyn Transport>>,
    bind_addr: Option<SocketAddr>,
    community: Bytes,
    version: Version,
    timeout: Duration,
    default_interval: Duration,
}

impl ManagerBuilder {
    /// Create a builder.
    ///
    /// Defaults:
    /// - community `"public"`, SNMPv2c (for [`Manager::device`])
    /// - request timeout 5000 ms
    /// - polling interval 30000 ms
    pub fn new() -> Self {
        Self {
            transport: None,
            bind_addr: None,
            community: Bytes::from_static(b"public"),
            version: Version::V2c,
            timeout: REQUEST_TIMEOUT,
            default_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Bind a UDP transport on `addr` when building.
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = Some(addr);
        self
    }

    /// Use an already constructed transport.
    pub fn transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Some(Box::new(transport));
        self
    }

    /// Default community for devices created with [`Manager::device`].
    pub fn community(mut self, community: impl Into<Bytes>) -> Self {
        self.community = community.into();
        self
    }

    /// Default version for devices created with [`Manager::device`].
    pub fn version(mut self, version: Version) -> Self {
        self.version = version;
        self
    }

    /// How long a request may stay unanswered.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Interval used when a poller is added without one.
    pub fn default_interval(mut self, interval: Duration) -> Self {
        self.default_interval = interval;
        self
    }

    /// Build the manager.
    pub fn build(self) -> Result<Manager> {
        let transport = match (self.transport, self.bind_addr) {
            (Some(t), _) => t,
            (None, Some(addr)) => Box::new(UdpTransport::bind(addr)?),
            (None, None) => return Err(Error::config("manager needs a transport")),
        };

        tracing::debug!(target: "snmp_engine::manager", { snmp.local_addr = %transport.local_addr() }, "manager created");

        Ok(Manager {
            transport,
            community: self.community,
            version: self.version,
            timeout: self.timeout,
            default_interval: self.default_interval,
            buffer: vec![0u8; crate::MAX_PACKET_SIZE].into_boxed_slice(),
            pollers: Vec::new(),
            live_requests: HashMap::new(),
            request_ids: RequestIdGen::new(),
        })
    }
}

impl Default for ManagerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Polling SNMP manager.
pub struct Manager {
    transport: Box<dyn Transport>,
    community: Bytes,
    version: Version,
    timeout: Duration,
    default_interval: Duration,
    /// Reused for every outbound request and inbound response.
    buffer: Box<[u8]>,
    /// Registration order is scan order.
    pollers: Vec<Poller>,
    /// Request id to the PDU type that was sent.
    live_requests: HashMap<i32, PduType>,
    request_ids: RequestIdGen,
}

impl Manager {
    /// Create a builder.
    pub fn builder() -> ManagerBuilder {
        ManagerBuilder::new()
    }

    /// Local address of the transport.
    pub fn local_addr(&self) -> SocketAddr {
        self.transport.local_addr()
    }

    /// Device at `addr` using the manager's default community and version.
    pub fn device(&self, addr: SocketAddr) -> Arc<Device> {
        Arc::new(Device::new(addr, self.community.clone(), self.version))
    }

    // ---------------------------------------------------------------
    // Registration
    // ---------------------------------------------------------------

    /// Poll `handler`'s OID from `device` every `interval`
    /// (default interval if `None`).
    pub fn add_poller(
        &mut self,
        device: Arc<Device>,
        handler: Arc<Handler>,
        interval: Option<Duration>,
    ) -> Arc<Handler> {
        let interval = interval.unwrap_or(self.default_interval);
        tracing::debug!(target: "snmp_engine::manager", { snmp.target = %device.addr, snmp.oid = %handler.oid, interval_ms = interval.as_millis() as u64 }, "poller added");
        self.pollers.push(Poller {
            handler: handler.clone(),
            device,
            info: PollingInfo::new(interval),
        });
        handler
    }

    /// Poll an INTEGER into `storage`.
    pub fn add_integer_poller(
        &mut self,
        device: Arc<Device>,
        oid: &str,
        storage: Arc<AtomicI32>,
        interval: Option<Duration>,
    ) -> Result<Arc<Handler>> {
        let oid = Oid::parse(oid)?;
        let handler = Arc::new(Handler::new(
            oid,
            Binding::Integer {
                value: storage,
                min: i32::MIN,
                max: i32::MAX,
            },
            false,
        ));
        Ok(self.add_poller(device, handler, interval))
    }

    /// Remove the poller registered for exactly this handler and device.
    pub fn remove_poller(&mut self, handler: &Arc<Handler>, device: &Arc<Device>) -> bool {
        let before = self.pollers.len();
        self.pollers
            .retain(|p| !(Arc::ptr_eq(&p.handler, handler) && Arc::ptr_eq(&p.device, device)));
        before != self.pollers.len()
    }

    /// Number of registered pollers.
    pub fn poller_count(&self) -> usize {
        self.pollers.len()
    }

    /// Scheduling state of the poller for `handler` and `device`.
    pub fn polling_info(&self, handler: &Arc<Handler>, device: &Arc<Device>) -> Option<&PollingInfo> {
        self.pollers
            .iter()
            .find(|p| Arc::ptr_eq(&p.handler, handler) && Arc::ptr_eq(&p.device, device))
            .map(|p| &p.info)
    }

    /// Number of requests awaiting a response.
    pub fn live_request_count(&self) -> usize {
        self.live_requests.len()
    }

    // ---------------------------------------------------------------
    // Scheduling
    // ---------------------------------------------------------------

    /// Run one teardown, send and receive cycle.
    pub fn poll(&mut self) -> PollStatus {
        self.teardown_old_requests();
        self.prepare_next_polling_request();
        self.process_incoming_packets()
    }

    /// Call [`poll`](Manager::poll) until `cancel` fires.
    pub async fn run(&mut self, cancel: CancellationToken) {
        tracing::info!(target: "snmp_engine::manager", { snmp.local_addr = %self.local_addr() }, "manager running");
        while !cancel.is_cancelled() {
            if self.poll() == PollStatus::NoPacket {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(IDLE_PACING) => {}
                }
            }
        }
        tracing::info!(target: "snmp_engine::manager", "manager shutdown requested");
    }

    /// Return timed-out pollers to idle.
    ///
    /// Scans in registration order and cancels at most
    /// [`MAX_TEARDOWN_PER_PASS`] requests per call; the rest wait for the
    /// next call. Returns the number cancelled.
    pub fn teardown_old_requests(&mut self) -> usize {
        let now = Instant::now();
        let mut cancelled: Vec<i32> = Vec::with_capacity(MAX_TEARDOWN_PER_PASS);

        for poller in &mut self.pollers {
            if cancelled.len() == MAX_TEARDOWN_PER_PASS {
                break;
            }
            if poller.info.has_timed_out(now, self.timeout) {
                tracing::debug!(target: "snmp_engine::manager", { snmp.target = %poller.device.addr, snmp.oid = %poller.handler.oid, snmp.request_id = poller.info.last_request_id }, "request timed out");
                cancelled.push(poller.info.last_request_id);
                poller.info.reset(false);
            }
        }

        self.live_requests.retain(|id, _| !cancelled.contains(id));
        cancelled.len()
    }

    /// Send one GET for the due pollers of one device.
    ///
    /// The device is that of the first due poller in registration order.
    /// Later due pollers of the same device join the request, up to
    /// [`MAX_POLL_BINDINGS`]. Due pollers of other devices wait for a later
    /// call. Returns the request id, or `None` if nothing was sent.
    pub fn prepare_next_polling_request(&mut self) -> Option<i32> {
        let now = Instant::now();
        let mut device: Option<Arc<Device>> = None;
        let mut batch: Vec<usize> = Vec::with_capacity(MAX_POLL_BINDINGS);

        for (idx, poller) in self.pollers.iter().enumerate() {
            if let Some(d) = &device
                && !Arc::ptr_eq(d, &poller.device)
            {
                continue;
            }
            if poller.info.should_poll(now) {
                device.get_or_insert_with(|| poller.device.clone());
                batch.push(idx);
                if batch.len() == MAX_POLL_BINDINGS {
                    break;
                }
            }
        }

        let device = device?;
        let request_id = self.request_ids.next_id();
        let oids: Vec<Oid> = batch
            .iter()
            .map(|&i| self.pollers[i].handler.oid.clone())
            .collect();
        let request: Message = CommunityMessage::new(
            device.version,
            device.community.clone(),
            Pdu::get_request(request_id, &oids),
        )
        .into();

        let n = codec::encode(&request, &mut self.buffer);
        if n == 0 {
            tracing::debug!(target: "snmp_engine::manager", { snmp.target = %device.addr, bindings = batch.len() }, "request does not fit packet buffer");
            return None;
        }
        if let Err(e) = self.transport.send_to(&self.buffer[..n], device.addr) {
            tracing::warn!(target: "snmp_engine::manager", { snmp.target = %device.addr, error = %e }, "failed to send polling request");
            return None;
        }

        tracing::debug!(target: "snmp_engine::manager", { snmp.target = %device.addr, snmp.request_id = request_id, bindings = batch.len() }, "polling request sent");
        for &i in &batch {
            self.pollers[i].info.mark_sent(request_id, now);
        }
        self.live_requests.insert(request_id, PduType::GetRequest);
        Some(request_id)
    }

    /// Handle at most one inbound datagram.
    ///
    /// A Response whose request id is not a live GetRequest is unsolicited.
    /// Otherwise each binding is matched to the awaiting poller with the
    /// same request id and OID. Its value is stored and the poller returns to
    /// idle, successful only when the response carries no error, the value
    /// is not an exception and the handler accepts it. Bindings that match
    /// nothing are logged as unsolicited.
    pub fn process_incoming_packets(&mut self) -> PollStatus {
        let (len, source) = match self.transport.pending() {
            Ok(Some(p)) => p,
            Ok(None) => return PollStatus::NoPacket,
            Err(e) => {
                tracing::warn!(target: "snmp_engine::manager", { snmp.local_addr = %self.transport.local_addr(), error = %e }, "receive failed");
                return PollStatus::NoPacket;
            }
        };

        if len > self.buffer.len() {
            tracing::warn!(target: "snmp_engine::manager", { snmp.source = %source, len, max = self.buffer.len() }, "incoming packet too large");
            return PollStatus::RequestTooLarge;
        }
        let read = self.transport.read(&mut self.buffer[..len]);
        if read != len {
            tracing::warn!(target: "snmp_engine::manager", { snmp.source = %source, expected = len, actual = read }, "packet length mismatch");
            return PollStatus::RequestInvalid;
        }

        let pdu = match codec::decode(&self.buffer[..len]) {
            Ok(Message::Community(msg)) if msg.pdu.pdu_type == PduType::Response => msg.pdu,
            Ok(_) => {
                tracing::debug!(target: "snmp_engine::manager", { snmp.source = %source }, "ignoring non-response PDU");
                return PollStatus::Dropped;
            }
            Err(e) => {
                tracing::debug!(target: "snmp_engine::manager", { snmp.source = %source, error = %e }, "dropping undecodable packet");
                return PollStatus::Dropped;
            }
        };

        self.reconcile(&pdu, source);
        PollStatus::Handled
    }

    fn reconcile(&mut self, pdu: &Pdu, source: SocketAddr) {
        let sent = self.live_requests.remove(&pdu.request_id);
        if sent != Some(PduType::GetRequest) {
            for vb in &pdu.varbinds {
                tracing::info!(target: "snmp_engine::manager", { snmp.source = %source, snmp.request_id = pdu.request_id, snmp.oid = %vb.oid, error_status = pdu.error_status }, "unsolicited response");
            }
            return;
        }

        for vb in &pdu.varbinds {
            let poller = self.pollers.iter_mut().find(|p| {
                p.info.is_awaiting()
                    && p.info.last_request_id == pdu.request_id
                    && p.handler.oid == vb.oid
            });
            let Some(poller) = poller else {
                tracing::info!(target: "snmp_engine::manager", { snmp.source = %source, snmp.request_id = pdu.request_id, snmp.oid = %vb.oid, error_status = pdu.error_status }, "unsolicited response");
                continue;
            };

            let success = !pdu.is_error()
                && !vb.value.is_exception()
                && poller.handler.store(&vb.value).is_ok();
            if !success {
                tracing::debug!(target: "snmp_engine::manager", { snmp.source = %source, snmp.oid = %vb.oid, error_status = %pdu.error_status_enum(), value = %vb.value }, "poll failed");
            }
            poller.info.reset(success);
        }
    }

    /// Stop the transport.
    pub fn stop(&mut self) {
        self.transport.stop();
    }
}

impl std::fmt::Debug for Manager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Manager")
            .field("local_addr", &self.local_addr())
            .field("pollers", &self.pollers.len())
            .field("live_requests", &self.live_requests.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests;
