//! # snmp-engine
//!
//! Cooperative SNMP v1/v2c agent and polling manager.
//!
//! Both engines are driven by repeated calls to `poll()`. A call never
//! blocks: it handles at most one inbound datagram and any timed work
//! that is due, then returns a [`PollStatus`]. This suits a single-threaded
//! main loop; [`Agent::run`] and [`Manager::run`] wrap the same loop for
//! Tokio.
//!
//! ## Features
//!
//! - Agent answering GET, GETNEXT, GETBULK and two-phase SET from a sorted
//!   registry of typed handlers
//! - SNMPv1 traps, SNMPv2c traps and informs with retrying delivery
//! - Manager polling remote agents on per-OID intervals with request
//!   batching and timeout recovery
//! - Bounds-checked BER codec that never panics on untrusted input
//!
//! ## Agent
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::sync::atomic::AtomicI32;
//! use snmp_engine::{Agent, PollStatus};
//!
//! # fn main() -> snmp_engine::Result<()> {
//! let mut agent = Agent::builder()
//!     .bind("0.0.0.0:161".parse().unwrap())
//!     .oid_prefix("1.3.6.1.4.1.99999")
//!     .build()?;
//!
//! let setpoint = Arc::new(AtomicI32::new(20));
//! agent.add_integer_handler(".1.0", setpoint, 5, 30, true)?;
//! agent.sort_handlers();
//!
//! loop {
//!     if agent.poll() == PollStatus::SetOccurred {
//!         // persist the new configuration
//!     }
//! }
//! # }
//! ```
//!
//! ## Manager
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::sync::atomic::AtomicI32;
//! use std::time::Duration;
//! use snmp_engine::Manager;
//!
//! # fn main() -> snmp_engine::Result<()> {
//! let mut manager = Manager::builder()
//!     .bind("0.0.0.0:1162".parse().unwrap())
//!     .build()?;
//!
//! let device = manager.device("192.0.2.20:161".parse().unwrap());
//! let temperature = Arc::new(AtomicI32::new(0));
//! manager.add_integer_poller(device, "1.3.6.1.4.1.99999.1.0", temperature, Some(Duration::from_secs(10)))?;
//!
//! loop {
//!     manager.poll();
//! }
//! # }
//! ```

pub mod agent;
pub mod ber;
pub mod codec;
pub mod error;
pub mod handler;
pub mod manager;
pub mod message;
pub mod notification;
pub mod oid;
pub mod pdu;
pub mod poll;
pub mod prelude;
pub mod registry;
pub mod transport;
pub mod value;
pub mod varbind;
pub mod version;

pub(crate) mod util;

use std::time::Duration;

/// Largest datagram either engine reads or writes.
pub const MAX_PACKET_SIZE: usize = 1400;

/// Most bindings the manager puts in one polling request.
pub const MAX_POLL_BINDINGS: usize = 6;

/// How long the manager waits for a response.
pub const REQUEST_TIMEOUT: Duration = Duration::from_millis(5000);

/// Most timed-out requests the manager cancels per scheduling pass.
pub const MAX_TEARDOWN_PER_PASS: usize = 10;

/// Polling interval for pollers added without one.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(30_000);

/// Standard agent port.
pub const DEFAULT_AGENT_PORT: u16 = 161;

/// Standard trap receiver port.
pub const DEFAULT_TRAP_PORT: u16 = 162;

// Re-exports for convenience
pub use agent::{Agent, AgentBuilder};
pub use codec::CodecError;
pub use error::{DecodeErrorKind, Error, ErrorStatus, OidErrorKind, Result};
pub use handler::{Binding, Handler, SetResult};
pub use manager::{Device, Manager, ManagerBuilder, PollState, PollingInfo};
pub use message::{CommunityMessage, Message, TrapV1Message};
pub use notification::{StatusCallback, Trap, TrapDelivery, TrapId, live_agent_count, purge_trap};
pub use oid::Oid;
pub use pdu::{GenericTrap, Pdu, PduType, TrapV1Pdu};
pub use poll::PollStatus;
pub use registry::Registry;
pub use transport::{Transport, UdpTransport};
pub use value::Value;
pub use varbind::VarBind;
pub use version::Version;
