//! Traps, informs and their delivery queue.
//!
//! A [`Trap`] describes a notification: its kind (SNMPv1 trap, SNMPv2c trap
//! or inform), the community it is sent with and the handlers whose current
//! values travel as bindings. It is sent through
//! [`Agent::send_trap_to`](crate::Agent::send_trap_to).
//!
//! Plain traps are sent once. Informs are queued per agent and resent every
//! `delay` until a matching Response arrives or the retry budget runs out;
//! the completion callback reports which.
//!
//! Every `Trap` carries a process-unique [`TrapId`]. Queue entries refer to
//! their trap by that id only. Dropping a `Trap` removes its pending entries
//! from every live agent.

mod live;
mod queue;

pub(crate) use live::{AgentId, deregister_agent, register_agent};
pub use live::{live_agent_count, purge_trap};
pub(crate) use queue::{InformQueue, QueueEntry};
pub use queue::StatusCallback;

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use bytes::Bytes;

use crate::handler::Handler;
use crate::message::{CommunityMessage, Message, TrapV1Message};
use crate::oid::Oid;
use crate::pdu::{GenericTrap, Pdu, TrapV1Pdu};
use crate::value::Value;
use crate::varbind::VarBind;

/// sysUpTime.0
pub const SYS_UPTIME: &[u32] = &[1, 3, 6, 1, 2, 1, 1, 3, 0];
/// snmpTrapOID.0
pub const SNMP_TRAP_OID: &[u32] = &[1, 3, 6, 1, 6, 3, 1, 1, 4, 1, 0];

static NEXT_TRAP_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a [`Trap`], stable for its whole lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TrapId(u64);

impl TrapId {
    fn next() -> Self {
        TrapId(NEXT_TRAP_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for TrapId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "trap#{}", self.0)
    }
}

#[derive(Debug, Clone)]
enum TrapKind {
    V1 {
        enterprise: Oid,
        generic: GenericTrap,
        specific: i32,
    },
    V2c {
        trap_oid: Oid,
        inform: bool,
    },
}

/// A notification the agent can emit.
#[derive(Debug)]
pub struct Trap {
    id: TrapId,
    kind: TrapKind,
    community: Bytes,
    remote_port: u16,
    uptime: Option<Arc<AtomicU32>>,
    bindings: Vec<Arc<Handler>>,
}

impl Trap {
    fn with_kind(kind: TrapKind) -> Self {
        Self {
            id: TrapId::next(),
            kind,
            community: Bytes::from_static(b"public"),
            remote_port: crate::DEFAULT_TRAP_PORT,
            uptime: None,
            bindings: Vec::new(),
        }
    }

    /// SNMPv2c trap identified by `trap_oid`.
    pub fn v2c(trap_oid: Oid) -> Self {
        Self::with_kind(TrapKind::V2c {
            trap_oid,
            inform: false,
        })
    }

    /// SNMPv1 trap.
    pub fn v1(enterprise: Oid, generic: GenericTrap, specific: i32) -> Self {
        Self::with_kind(TrapKind::V1 {
            enterprise,
            generic,
            specific,
        })
    }

    /// Community string. Default `"public"`.
    pub fn community(mut self, community: impl Into<Bytes>) -> Self {
        self.community = community.into();
        self
    }

    /// Send as an InformRequest instead of a trap. Ignored for SNMPv1.
    pub fn inform(mut self, inform: bool) -> Self {
        if let TrapKind::V2c { inform: flag, .. } = &mut self.kind {
            *flag = inform;
        }
        self
    }

    /// Destination UDP port. Default 162.
    pub fn remote_port(mut self, port: u16) -> Self {
        self.remote_port = port;
        self
    }

    /// Storage read for sysUpTime.0 (v2c) or the time-stamp (v1).
    ///
    /// Without it the sending agent's own uptime is used.
    pub fn uptime(mut self, uptime: Arc<AtomicU32>) -> Self {
        self.uptime = Some(uptime);
        self
    }

    /// Append a handler whose current value is sent with the trap.
    pub fn binding(mut self, handler: Arc<Handler>) -> Self {
        self.bindings.push(handler);
        self
    }

    /// Add a handler after construction.
    pub fn add_binding(&mut self, handler: Arc<Handler>) {
        self.bindings.push(handler);
    }

    /// Remove a handler by identity.
    pub fn remove_binding(&mut self, handler: &Arc<Handler>) -> bool {
        let before = self.bindings.len();
        self.bindings.retain(|h| !Arc::ptr_eq(h, handler));
        before != self.bindings.len()
    }

    /// Identity token.
    pub fn id(&self) -> TrapId {
        self.id
    }

    /// Whether this trap is sent as an InformRequest.
    pub fn is_inform(&self) -> bool {
        matches!(self.kind, TrapKind::V2c { inform: true, .. })
    }

    /// Destination UDP port.
    pub fn port(&self) -> u16 {
        self.remote_port
    }

    /// Build the message for one send.
    ///
    /// `agent_uptime` is in hundredths of a second and is used unless the
    /// trap has its own uptime storage. `agent_addr` fills the SNMPv1
    /// agent-addr field.
    pub fn to_message(&self, request_id: i32, agent_uptime: u32, agent_addr: Ipv4Addr) -> Message {
        let uptime = self
            .uptime
            .as_ref()
            .map_or(agent_uptime, |u| u.load(Ordering::Relaxed));
        let values = self.bindings.iter().map(|h| h.varbind());

        match &self.kind {
            TrapKind::V1 {
                enterprise,
                generic,
                specific,
            } => TrapV1Message::new(
                self.community.clone(),
                TrapV1Pdu::new(
                    enterprise.clone(),
                    agent_addr.octets(),
                    *generic,
                    *specific,
                    uptime,
                    values.collect(),
                ),
            )
            .into(),
            TrapKind::V2c { trap_oid, inform } => {
                let mut varbinds = Vec::with_capacity(self.bindings.len() + 2);
                varbinds.push(VarBind::new(
                    Oid::from_slice(SYS_UPTIME),
                    Value::TimeTicks(uptime),
                ));
                varbinds.push(VarBind::new(
                    Oid::from_slice(SNMP_TRAP_OID),
                    Value::ObjectIdentifier(trap_oid.clone()),
                ));
                varbinds.extend(values);
                let pdu = if *inform {
                    Pdu::inform_request(request_id, varbinds)
                } else {
                    Pdu::trap_v2(request_id, varbinds)
                };
                CommunityMessage::v2c(self.community.clone(), pdu).into()
            }
        }
    }
}

impl Drop for Trap {
    fn drop(&mut self) {
        let purged = purge_trap(self.id);
        if purged > 0 {
            tracing::debug!(target: "snmp_engine::notification", { trap = %self.id, purged }, "purged queued deliveries of dropped trap");
        }
    }
}

/// Delivery options for [`Agent::send_trap_to`](crate::Agent::send_trap_to).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrapDelivery {
    /// Resends after the first attempt (informs only).
    pub retries: u32,
    /// Time between attempts (informs only).
    pub delay: Duration,
    /// Supersede queued deliveries of the same trap to the same target.
    pub replace_queued: bool,
}

impl Default for TrapDelivery {
    fn default() -> Self {
        Self {
            retries: 3,
            delay: Duration::from_millis(30_000),
            replace_queued: false,
        }
    }
}
