//! SNMP agent engine.
//!
//! The agent answers GET, GETNEXT, GETBULK and SET requests from a
//! [`Registry`] of handlers and sends traps and informs. It is driven by
//! calling [`Agent::poll`] repeatedly; each call handles at most one inbound
//! datagram and then services the inform queue. [`Agent::run`] does that in
//! an async loop until cancelled.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::sync::atomic::AtomicI32;
//! use snmp_engine::Agent;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> snmp_engine::Result<()> {
//! let mut agent = Agent::builder()
//!     .bind("0.0.0.0:1161".parse().unwrap())
//!     .community("private")
//!     .read_only_community("public")
//!     .oid_prefix("1.3.6.1.4.1.99999")
//!     .build()?;
//!
//! let temperature = Arc::new(AtomicI32::new(21));
//! agent.add_integer_handler(".1.0", temperature, -40, 125, true)?;
//! agent.sort_handlers();
//!
//! agent.run(CancellationToken::new()).await;
//! # Ok(())
//! # }
//! ```

mod dispatch;
mod set_handler;


use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicI32, AtomicU32, AtomicU64};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use bytes::Bytes;
use subtle::ConstantTimeEq;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::codec;
use crate::error::{Error, Result};
use crate::handler::{Binding, Handler};
use crate::message::{CommunityMessage, Message};
use crate::notification::{
    AgentId, InformQueue, QueueEntry, StatusCallback, Trap, TrapDelivery, deregister_agent,
    register_agent,
};
use crate::oid::Oid;
use crate::pdu::{Pdu, PduType};
use crate::poll::PollStatus;
use crate::registry::Registry;
use crate::transport::{Transport, UdpTransport};
use crate::util::RequestIdGen;
use crate::version::Version;

/// Sleep between polls in [`Agent::run`] when nothing arrived.
const IDLE_PACING: Duration = Duration::from_millis(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Access {
    ReadOnly,
    ReadWrite,
}

/// Builder for [`Agent`].
pub struct AgentBuilder {
    transports: Vec<Box<dyn Transport>>,
    bind_addrs: Vec<SocketAddr>,
    community: Bytes,
    read_only_community: Bytes,
    oid_prefix: Option<String>,
    accept_v1: bool,
}

impl AgentBuilder {
    /// Create a builder with default settings.
    ///
    /// Defaults:
    /// - read-write community `"private"`
    /// - read-only community `"public"`
    /// - no OID prefix
    /// - SNMPv1 accepted
    /// - no transports (at least one is required)
    pub fn new() -> Self {
        Self {
            transports: Vec::new(),
            bind_addrs: Vec::new(),
            community: Bytes::from_static(b"private"),
            read_only_community: Bytes::from_static(b"public"),
            oid_prefix: None,
            accept_v1: true,
        }
    }

    /// Bind a UDP transport on `addr` when building.
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addrs.push(addr);
        self
    }

    /// Add an already constructed transport.
    pub fn transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transports.push(Box::new(transport));
        self
    }

    /// Read-write community.
    pub fn community(mut self, community: impl Into<Bytes>) -> Self {
        self.community = community.into();
        self
    }

    /// Read-only community.
    pub fn read_only_community(mut self, community: impl Into<Bytes>) -> Self {
        self.read_only_community = community.into();
        self
    }

    /// Prefix prepended to OIDs given to the `add_*_handler` functions.
    pub fn oid_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.oid_prefix = Some(prefix.into());
        self
    }

    /// Whether SNMPv1 requests are answered.
    pub fn accept_v1(mut self, accept: bool) -> Self {
        self.accept_v1 = accept;
        self
    }

    /// Build the agent, binding any requested UDP transports.
    pub fn build(self) -> Result<Agent> {
        if let Some(prefix) = &self.oid_prefix {
            Oid::parse(prefix)?;
        }

        let mut transports = self.transports;
        for addr in self.bind_addrs {
            transports.push(Box::new(UdpTransport::bind(addr)?));
        }
        if transports.is_empty() {
            return Err(Error::config("agent needs at least one transport"));
        }

        let informs = Arc::new(Mutex::new(InformQueue::new()));
        let live_id = register_agent(&informs);

        tracing::debug!(target: "snmp_engine::agent", { transports = transports.len(), snmp.local_addr = %transports[0].local_addr() }, "agent created");

        Ok(Agent {
            transports,
            community: self.community,
            read_only_community: self.read_only_community,
            oid_prefix: self.oid_prefix,
            accept_v1: self.accept_v1,
            buffer: vec![0u8; crate::MAX_PACKET_SIZE].into_boxed_slice(),
            registry: Registry::new(),
            informs,
            live_id,
            request_ids: RequestIdGen::new(),
            started: Instant::now(),
            set_occurred: false,
            last_set_source: None,
        })
    }
}

impl Default for AgentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// SNMP v1/v2c agent.
pub struct Agent {
    transports: Vec<Box<dyn Transport>>,
    community: Bytes,
    read_only_community: Bytes,
    oid_prefix: Option<String>,
    accept_v1: bool,
    /// Reused for every inbound request and its response.
    buffer: Box<[u8]>,
    registry: Registry,
    informs: Arc<Mutex<InformQueue>>,
    live_id: AgentId,
    request_ids: RequestIdGen,
    started: Instant,
    set_occurred: bool,
    last_set_source: Option<SocketAddr>,
}

impl Agent {
    /// Create a builder.
    pub fn builder() -> AgentBuilder {
        AgentBuilder::new()
    }

    /// Local addresses of all transports.
    pub fn local_addrs(&self) -> Vec<SocketAddr> {
        self.transports.iter().map(|t| t.local_addr()).collect()
    }

    /// Hundredths of a second since the agent was built.
    pub fn uptime(&self) -> u32 {
        (self.started.elapsed().as_millis() / 10) as u32
    }

    // ---------------------------------------------------------------
    // Handler registration
    // ---------------------------------------------------------------

    fn resolve_oid(&self, oid: &str) -> Result<Oid> {
        match &self.oid_prefix {
            Some(prefix) => Oid::with_prefix(prefix, oid),
            None => Oid::parse(oid),
        }
    }

    /// Register a handler at an already built OID. No prefix is applied.
    pub fn add_handler_at(&mut self, oid: Oid, binding: Binding, settable: bool) -> Arc<Handler> {
        let handler = Arc::new(Handler::new(oid, binding, settable));
        self.registry.insert(handler.clone());
        handler
    }

    /// Register a handler at `oid`, relative to the configured prefix.
    pub fn add_handler(&mut self, oid: &str, binding: Binding, settable: bool) -> Result<Arc<Handler>> {
        let oid = self.resolve_oid(oid)?;
        Ok(self.add_handler_at(oid, binding, settable))
    }

    /// Register a handler at `oid`, ignoring the configured prefix.
    pub fn add_handler_absolute(
        &mut self,
        oid: &str,
        binding: Binding,
        settable: bool,
    ) -> Result<Arc<Handler>> {
        let oid = Oid::parse(oid)?;
        Ok(self.add_handler_at(oid, binding, settable))
    }

    /// INTEGER bounded by `min..=max`.
    pub fn add_integer_handler(
        &mut self,
        oid: &str,
        value: Arc<AtomicI32>,
        min: i32,
        max: i32,
        settable: bool,
    ) -> Result<Arc<Handler>> {
        self.add_handler(oid, Binding::Integer { value, min, max }, settable)
    }

    /// OCTET STRING of at most `max_len` bytes.
    pub fn add_string_handler(
        &mut self,
        oid: &str,
        value: Arc<Mutex<Vec<u8>>>,
        max_len: usize,
        settable: bool,
    ) -> Result<Arc<Handler>> {
        self.add_handler(oid, Binding::OctetString { value, max_len }, settable)
    }

    /// Fixed OCTET STRING.
    pub fn add_readonly_string_handler(
        &mut self,
        oid: &str,
        text: impl Into<Bytes>,
    ) -> Result<Arc<Handler>> {
        self.add_handler(oid, Binding::ReadOnlyOctetString(text.into()), false)
    }

    /// Opaque blob of at most `max_len` bytes.
    pub fn add_opaque_handler(
        &mut self,
        oid: &str,
        value: Arc<Mutex<Vec<u8>>>,
        max_len: usize,
        settable: bool,
    ) -> Result<Arc<Handler>> {
        self.add_handler(oid, Binding::Opaque { value, max_len }, settable)
    }

    /// TimeTicks.
    pub fn add_timestamp_handler(
        &mut self,
        oid: &str,
        value: Arc<AtomicU32>,
        settable: bool,
    ) -> Result<Arc<Handler>> {
        self.add_handler(oid, Binding::TimeTicks(value), settable)
    }

    /// Fixed OBJECT IDENTIFIER.
    pub fn add_oid_handler(&mut self, oid: &str, value: Oid) -> Result<Arc<Handler>> {
        self.add_handler(oid, Binding::ObjectIdentifier(value), false)
    }

    /// Counter32 (read-only).
    pub fn add_counter32_handler(&mut self, oid: &str, value: Arc<AtomicU32>) -> Result<Arc<Handler>> {
        self.add_handler(oid, Binding::Counter32(value), false)
    }

    /// Counter64 (read-only).
    pub fn add_counter64_handler(&mut self, oid: &str, value: Arc<AtomicU64>) -> Result<Arc<Handler>> {
        self.add_handler(oid, Binding::Counter64(value), false)
    }

    /// Gauge32 (read-only).
    pub fn add_gauge_handler(&mut self, oid: &str, value: Arc<AtomicU32>) -> Result<Arc<Handler>> {
        self.add_handler(oid, Binding::Gauge32(value), false)
    }

    /// IpAddress (read-only).
    pub fn add_ip_address_handler(
        &mut self,
        oid: &str,
        value: Arc<Mutex<Ipv4Addr>>,
    ) -> Result<Arc<Handler>> {
        self.add_handler(oid, Binding::IpAddress(value), false)
    }

    /// Unregister a handler. The handler itself stays usable.
    pub fn remove_handler(&mut self, handler: &Arc<Handler>) -> bool {
        self.registry.remove(handler)
    }

    /// Sort the registry. Required after registration for GETNEXT/GETBULK.
    pub fn sort_handlers(&mut self) {
        self.registry.sort();
    }

    /// Registered handlers.
    pub fn handlers(&self) -> &Registry {
        &self.registry
    }

    // ---------------------------------------------------------------
    // SET side effects
    // ---------------------------------------------------------------

    /// Report and clear whether a SET was applied since the last call.
    pub fn take_set_occurred(&mut self) -> bool {
        std::mem::take(&mut self.set_occurred)
    }

    /// Source of the most recent successful SET.
    pub fn last_set_source(&self) -> Option<SocketAddr> {
        self.last_set_source
    }

    // ---------------------------------------------------------------
    // Request/response cycle
    // ---------------------------------------------------------------

    /// Handle at most one inbound datagram, then service the inform queue.
    pub fn poll(&mut self) -> PollStatus {
        let status = self.receive_one();
        self.drain_informs(Instant::now());
        status
    }

    /// Call [`poll`](Agent::poll) until `cancel` fires.
    pub async fn run(&mut self, cancel: CancellationToken) {
        tracing::info!(target: "snmp_engine::agent", { snmp.local_addr = ?self.local_addrs() }, "agent running");
        while !cancel.is_cancelled() {
            if self.poll() == PollStatus::NoPacket {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(IDLE_PACING) => {}
                }
            }
        }
        tracing::info!(target: "snmp_engine::agent", "agent shutdown requested");
    }

    fn receive_one(&mut self) -> PollStatus {
        for idx in 0..self.transports.len() {
            match self.transports[idx].pending() {
                Ok(Some((len, source))) => return self.handle_datagram(idx, len, source),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(target: "snmp_engine::agent", { snmp.local_addr = %self.transports[idx].local_addr(), error = %e }, "receive failed");
                }
            }
        }
        PollStatus::NoPacket
    }

    fn handle_datagram(&mut self, idx: usize, len: usize, source: SocketAddr) -> PollStatus {
        if len > self.buffer.len() {
            tracing::warn!(target: "snmp_engine::agent", { snmp.source = %source, len, max = self.buffer.len() }, "request too large");
            return PollStatus::RequestTooLarge;
        }

        let read = self.transports[idx].read(&mut self.buffer[..len]);
        if read != len {
            tracing::warn!(target: "snmp_engine::agent", { snmp.source = %source, expected = len, actual = read }, "packet length mismatch");
            return PollStatus::RequestInvalid;
        }

        let msg = match codec::decode(&self.buffer[..len]) {
            Ok(Message::Community(msg)) => msg,
            Ok(Message::TrapV1(_)) => {
                tracing::debug!(target: "snmp_engine::agent", { snmp.source = %source }, "ignoring SNMPv1 trap");
                return PollStatus::Dropped;
            }
            Err(e) => {
                tracing::debug!(target: "snmp_engine::agent", { snmp.source = %source, error = %e }, "dropping undecodable request");
                return PollStatus::Dropped;
            }
        };

        if msg.version == Version::V1 && !self.accept_v1 {
            tracing::debug!(target: "snmp_engine::agent", { snmp.source = %source }, "SNMPv1 disabled, dropping");
            return PollStatus::Dropped;
        }

        if msg.pdu.pdu_type == PduType::Response {
            return self.handle_inform_response(&msg.pdu, source);
        }

        let Some(access) = self.access_for(&msg.community) else {
            tracing::debug!(target: "snmp_engine::agent", { snmp.source = %source }, "community mismatch, dropping");
            return PollStatus::Dropped;
        };

        let (response, set_applied) = match msg.pdu.pdu_type {
            PduType::GetRequest => (self.handle_get(msg.version, &msg.pdu), false),
            PduType::GetNextRequest => (self.handle_get_next(msg.version, &msg.pdu), false),
            PduType::GetBulkRequest if msg.version != Version::V1 => {
                (self.handle_get_bulk(msg.community.len(), &msg.pdu), false)
            }
            PduType::SetRequest if access == Access::ReadWrite => {
                self.handle_set(msg.version, &msg.pdu)
            }
            other => {
                tracing::debug!(target: "snmp_engine::agent", { snmp.source = %source, pdu_type = %other, access = ?access }, "unexpected PDU, dropping");
                return PollStatus::Dropped;
            }
        };

        if set_applied {
            self.set_occurred = true;
            self.last_set_source = Some(source);
        }

        let reply: Message = CommunityMessage::new(msg.version, msg.community, response).into();
        let n = codec::encode(&reply, &mut self.buffer);
        if n == 0 {
            tracing::debug!(target: "snmp_engine::agent", { snmp.source = %source, snmp.request_id = msg.pdu.request_id }, "response does not fit packet buffer, dropping");
        } else if let Err(e) = self.transports[idx].send_to(&self.buffer[..n], source) {
            tracing::warn!(target: "snmp_engine::agent", { snmp.source = %source, error = %e }, "failed to send response");
        }

        match (set_applied, n) {
            (true, _) => PollStatus::SetOccurred,
            (false, 0) => PollStatus::Dropped,
            (false, _) => PollStatus::Handled,
        }
    }

    fn access_for(&self, community: &[u8]) -> Option<Access> {
        let rw = bool::from(self.community.as_ref().ct_eq(community));
        let ro = bool::from(self.read_only_community.as_ref().ct_eq(community));
        if rw {
            Some(Access::ReadWrite)
        } else if ro {
            Some(Access::ReadOnly)
        } else {
            None
        }
    }

    // ---------------------------------------------------------------
    // Traps and informs
    // ---------------------------------------------------------------

    fn lock_informs(&self) -> MutexGuard<'_, InformQueue> {
        self.informs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn handle_inform_response(&mut self, pdu: &Pdu, source: SocketAddr) -> PollStatus {
        let completion = self.lock_informs().acknowledge(pdu.request_id);
        match completion {
            Some(completion) => {
                tracing::debug!(target: "snmp_engine::notification", { snmp.source = %source, snmp.request_id = pdu.request_id }, "inform acknowledged");
                completion.fire();
                PollStatus::InformResponseOccurred
            }
            None => {
                tracing::debug!(target: "snmp_engine::notification", { snmp.source = %source, snmp.request_id = pdu.request_id }, "response matches no queued inform");
                PollStatus::Dropped
            }
        }
    }

    fn agent_ipv4(&self) -> Ipv4Addr {
        match self.transports.first().map(|t| t.local_addr().ip()) {
            Some(IpAddr::V4(ip)) => ip,
            _ => Ipv4Addr::UNSPECIFIED,
        }
    }

    /// Send `trap` to `ip` on the trap's remote port.
    ///
    /// Plain traps are sent once and `on_status` receives the send outcome.
    /// Informs are queued: the first attempt goes out immediately, then one
    /// every `delivery.delay` until acknowledged or `delivery.retries`
    /// resends have gone unanswered. Returns the request id used.
    ///
    /// A notification that does not fit the packet buffer is neither sent nor
    /// queued, and `on_status` is not called; the caller gets
    /// [`Error::MessageTooLarge`].
    pub fn send_trap_to(
        &mut self,
        trap: &Trap,
        ip: IpAddr,
        on_status: Option<StatusCallback>,
        delivery: TrapDelivery,
    ) -> Result<i32> {
        let request_id = self.request_ids.next_id();
        let target = SocketAddr::new(ip, trap.port());
        let message = trap.to_message(request_id, self.uptime(), self.agent_ipv4());

        let n = codec::encode(&message, &mut self.buffer);
        if n == 0 {
            tracing::warn!(target: "snmp_engine::notification", { snmp.target = %target, snmp.request_id = request_id }, "notification does not fit packet buffer, dropping");
            return Err(Error::MessageTooLarge {
                max: self.buffer.len(),
            });
        }
        let payload = Bytes::copy_from_slice(&self.buffer[..n]);

        if !trap.is_inform() {
            let sent = self.send_unsolicited(&payload, target, request_id);
            if let Some(cb) = on_status {
                cb(request_id, sent);
            }
            return Ok(request_id);
        }

        let now = Instant::now();
        let superseded = self.lock_informs().push(
            QueueEntry {
                trap: trap.id(),
                target,
                payload,
                request_id,
                attempts_remaining: delivery.retries.saturating_add(1),
                delay: delivery.delay,
                next_send: now,
                on_status,
            },
            delivery.replace_queued,
        );
        for completion in superseded {
            tracing::debug!(target: "snmp_engine::notification", { snmp.target = %target, snmp.request_id = completion.request_id }, "queued inform superseded");
            completion.fire();
        }

        self.drain_informs(now);
        Ok(request_id)
    }

    fn send_unsolicited(&mut self, payload: &[u8], target: SocketAddr, request_id: i32) -> bool {
        let Some(transport) = self.transports.first_mut() else {
            return false;
        };
        match transport.send_to(payload, target) {
            Ok(()) => {
                tracing::trace!(target: "snmp_engine::notification", { snmp.target = %target, snmp.request_id = request_id }, "notification sent");
                true
            }
            Err(e) => {
                tracing::warn!(target: "snmp_engine::notification", { snmp.target = %target, snmp.request_id = request_id, error = %e }, "failed to send notification");
                false
            }
        }
    }

    fn drain_informs(&mut self, now: Instant) {
        let (sends, exhausted) = self.lock_informs().take_due(now);
        for send in sends {
            self.send_unsolicited(&send.payload, send.target, send.request_id);
        }
        for completion in exhausted {
            tracing::debug!(target: "snmp_engine::notification", { snmp.request_id = completion.request_id }, "inform retries exhausted");
            completion.fire();
        }
    }

    /// Number of informs awaiting acknowledgement.
    pub fn queued_informs(&self) -> usize {
        self.lock_informs().len()
    }

    // ---------------------------------------------------------------
    // Transport lifecycle
    // ---------------------------------------------------------------

    /// Stop and rebind every transport on its current address.
    pub fn restart_transports(&mut self) -> Result<()> {
        for transport in &mut self.transports {
            transport.restart()?;
        }
        Ok(())
    }

    /// Stop every transport.
    pub fn stop(&mut self) {
        for transport in &mut self.transports {
            transport.stop();
        }
    }
}

impl Drop for Agent {
    fn drop(&mut self) {
        deregister_agent(self.live_id);
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("local_addrs", &self.local_addrs())
            .field("handlers", &self.registry.len())
            .field("queued_informs", &self.queued_informs())
            .finish_non_exhaustive()
    }
}
