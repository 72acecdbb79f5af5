//! Per-poller scheduling state.

use std::time::Duration;

use tokio::time::Instant;

/// Whether a poller has a request outstanding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    /// No request outstanding.
    Idle,
    /// A request was sent at `sent_at` and has not been answered.
    AwaitingResponse { sent_at: Instant },
}

/// Scheduling state of one (device, handler) poller.
#[derive(Debug, Clone)]
pub struct PollingInfo {
    /// Time between polls.
    pub interval: Duration,
    /// Send time of the last successful poll. `None` means due now.
    pub last_poll: Option<Instant>,
    /// Request id of the most recent request.
    pub last_request_id: i32,
    /// Current state.
    pub state: PollState,
}

impl PollingInfo {
    /// New idle poller, due immediately.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_poll: None,
            last_request_id: 0,
            state: PollState::Idle,
        }
    }

    /// Idle and at least `interval` since the last successful poll.
    pub fn should_poll(&self, now: Instant) -> bool {
        if self.is_awaiting() {
            return false;
        }
        match self.last_poll {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.interval,
        }
    }

    /// Whether a request is outstanding.
    pub fn is_awaiting(&self) -> bool {
        matches!(self.state, PollState::AwaitingResponse { .. })
    }

    /// Record that `request_id` was sent at `now`.
    pub fn mark_sent(&mut self, request_id: i32, now: Instant) {
        self.last_request_id = request_id;
        self.state = PollState::AwaitingResponse { sent_at: now };
    }

    /// Outstanding for longer than `timeout`.
    pub fn has_timed_out(&self, now: Instant, timeout: Duration) -> bool {
        match self.state {
            PollState::AwaitingResponse { sent_at } => {
                now.saturating_duration_since(sent_at) > timeout
            }
            PollState::Idle => false,
        }
    }

    /// Return to idle.
    ///
    /// A success starts the next interval from the send time. A failure
    /// leaves the poller due immediately.
    pub fn reset(&mut self, success: bool) {
        if let PollState::AwaitingResponse { sent_at } = self.state {
            self.last_poll = if success { Some(sent_at) } else { None };
        }
        self.state = PollState::Idle;
    }
}
