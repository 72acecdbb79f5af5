//! Common test fixtures and constants.

use std::net::SocketAddr;
use std::time::Duration;

use snmp_engine::{Agent, Oid, PollStatus, oid};

// =============================================================================
// Standard system MIB OIDs (1.3.6.1.2.1.1.*)
// =============================================================================

pub fn sys_descr() -> Oid {
    oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)
}
pub fn sys_uptime() -> Oid {
    oid!(1, 3, 6, 1, 2, 1, 1, 3, 0)
}
pub fn sys_location() -> Oid {
    oid!(1, 3, 6, 1, 2, 1, 1, 6, 0)
}

// =============================================================================
// Agent configuration
// =============================================================================

/// Enterprise prefix used by the test agents.
pub const PREFIX: &str = "1.3.6.1.4.1.99999";

/// Read-only community
pub const COMMUNITY_RO: &str = "public";
/// Read-write community
pub const COMMUNITY_RW: &str = "private";

/// Loopback address with an ephemeral port.
pub fn loopback() -> SocketAddr {
    "127.0.0.1:0".parse().unwrap()
}

/// Agent on an ephemeral loopback port with the test communities and prefix.
pub fn loopback_agent() -> Agent {
    init_tracing();
    Agent::builder()
        .bind(loopback())
        .community(COMMUNITY_RW)
        .read_only_community(COMMUNITY_RO)
        .oid_prefix(PREFIX)
        .build()
        .expect("bind loopback agent")
}

// =============================================================================
// Logging
// =============================================================================

/// Install a test subscriber honouring `RUST_LOG`. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// =============================================================================
// Driving engines
// =============================================================================

/// Upper bound on how long a loopback exchange may take.
pub const EXCHANGE_TIMEOUT: Duration = Duration::from_secs(5);

/// Poll `agent` until it reports something other than `NoPacket`.
pub async fn poll_agent_until_packet(agent: &mut Agent) -> PollStatus {
    let deadline = tokio::time::Instant::now() + EXCHANGE_TIMEOUT;
    loop {
        let status = agent.poll();
        if status.consumed_packet() {
            return status;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "agent saw no packet within {EXCHANGE_TIMEOUT:?}"
        );
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
}
