//! Outcome of one `poll()` call on an [`Agent`](crate::Agent) or
//! [`Manager`](crate::Manager).

/// What a single `poll()` invocation did.
///
/// Framing problems ([`RequestTooLarge`](PollStatus::RequestTooLarge),
/// [`RequestInvalid`](PollStatus::RequestInvalid)) are reported here.
/// Undecodable or unauthorized datagrams are reported as
/// [`Dropped`](PollStatus::Dropped) and never answered on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollStatus {
    /// No transport had a pending datagram.
    NoPacket,
    /// The pending datagram exceeded [`MAX_PACKET_SIZE`](crate::MAX_PACKET_SIZE).
    RequestTooLarge,
    /// Fewer bytes were read than the datagram advertised.
    RequestInvalid,
    /// A datagram was read but discarded without a reply: malformed,
    /// wrong version, wrong community, or an unexpected PDU type.
    Dropped,
    /// A SET was applied.
    SetOccurred,
    /// An inbound Response acknowledged a queued inform.
    InformResponseOccurred,
    /// A request was answered, or a manager response was processed.
    Handled,
}

impl PollStatus {
    /// True when a datagram was consumed from a transport.
    pub fn consumed_packet(self) -> bool {
        !matches!(self, PollStatus::NoPacket)
    }
}

impl std::fmt::Display for PollStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PollStatus::NoPacket => "no packet",
            PollStatus::RequestTooLarge => "request too large",
            PollStatus::RequestInvalid => "request invalid",
            PollStatus::Dropped => "dropped",
            PollStatus::SetOccurred => "set occurred",
            PollStatus::InformResponseOccurred => "inform response",
            PollStatus::Handled => "handled",
        };
        f.write_str(s)
    }
}
