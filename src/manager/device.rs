//! Remote agents polled by a [`Manager`](super::Manager).

use std::net::SocketAddr;

use bytes::Bytes;

use crate::version::Version;

/// A remote agent: where it lives and how to talk to it.
///
/// Pollers hold `Arc<Device>` and are grouped by `Arc` identity, so two
/// `Device`s with equal fields are still polled separately.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    /// Agent address and port.
    pub addr: SocketAddr,
    /// Community sent with every request.
    pub community: Bytes,
    /// Protocol version.
    pub version: Version,
}

impl Device {
    /// Create a device.
    pub fn new(addr: SocketAddr, community: impl Into<Bytes>, version: Version) -> Self {
        Self {
            addr,
            community: community.into(),
            version,
        }
    }

    /// SNMPv2c device.
    pub fn v2c(addr: SocketAddr, community: impl Into<Bytes>) -> Self {
        Self::new(addr, community, Version::V2c)
    }

    /// SNMPv1 device.
    pub fn v1(addr: SocketAddr, community: impl Into<Bytes>) -> Self {
        Self::new(addr, community, Version::V1)
    }
}
