//! Per-agent inform delivery queue.
//!
//! The queue only tracks state. Sending is done by the owning agent, which
//! takes the due work out under the lock and performs I/O and callbacks
//! after releasing it.

use std::net::SocketAddr;
use std::time::Duration;

use bytes::Bytes;
use tokio::time::Instant;

use super::TrapId;

/// Completion callback: `(request_id, delivered)`.
pub type StatusCallback = Box<dyn FnOnce(i32, bool) + Send>;

/// One inform awaiting acknowledgement.
pub(crate) struct QueueEntry {
    pub(crate) trap: TrapId,
    pub(crate) target: SocketAddr,
    pub(crate) payload: Bytes,
    pub(crate) request_id: i32,
    /// Sends left, including the next one.
    pub(crate) attempts_remaining: u32,
    pub(crate) delay: Duration,
    pub(crate) next_send: Instant,
    pub(crate) on_status: Option<StatusCallback>,
}

impl std::fmt::Debug for QueueEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueEntry")
            .field("trap", &self.trap)
            .field("target", &self.target)
            .field("request_id", &self.request_id)
            .field("attempts_remaining", &self.attempts_remaining)
            .field("delay", &self.delay)
            .field("next_send", &self.next_send)
            .finish_non_exhaustive()
    }
}

/// A send the agent must perform.
#[derive(Debug)]
pub(crate) struct DueSend {
    pub(crate) request_id: i32,
    pub(crate) target: SocketAddr,
    pub(crate) payload: Bytes,
}

/// Callback to fire once the lock is released.
pub(crate) struct Completion {
    pub(crate) request_id: i32,
    pub(crate) delivered: bool,
    pub(crate) callback: Option<StatusCallback>,
}

impl Completion {
    pub(crate) fn fire(self) {
        if let Some(cb) = self.callback {
            cb(self.request_id, self.delivered);
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct InformQueue {
    entries: Vec<QueueEntry>,
}

impl InformQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Add an entry. With `replace_queued`, entries for the same trap and
    /// target are removed first and returned as failed completions.
    pub(crate) fn push(&mut self, entry: QueueEntry, replace_queued: bool) -> Vec<Completion> {
        let mut superseded = Vec::new();
        if replace_queued {
            let mut i = 0;
            while i < self.entries.len() {
                let e = &self.entries[i];
                if e.trap == entry.trap && e.target == entry.target {
                    let old = self.entries.remove(i);
                    superseded.push(Completion {
                        request_id: old.request_id,
                        delivered: false,
                        callback: old.on_status,
                    });
                } else {
                    i += 1;
                }
            }
        }
        self.entries.push(entry);
        superseded
    }

    /// Collect due sends and exhausted entries at `now`.
    ///
    /// A due entry with attempts left is rescheduled `delay` later and one
    /// attempt is charged. A due entry with none left is removed.
    pub(crate) fn take_due(&mut self, now: Instant) -> (Vec<DueSend>, Vec<Completion>) {
        let mut sends = Vec::new();
        let mut exhausted = Vec::new();
        let mut i = 0;
        while i < self.entries.len() {
            let entry = &mut self.entries[i];
            if entry.next_send > now {
                i += 1;
                continue;
            }
            if entry.attempts_remaining == 0 {
                let old = self.entries.remove(i);
                exhausted.push(Completion {
                    request_id: old.request_id,
                    delivered: false,
                    callback: old.on_status,
                });
                continue;
            }
            entry.attempts_remaining -= 1;
            entry.next_send = now + entry.delay;
            sends.push(DueSend {
                request_id: entry.request_id,
                target: entry.target,
                payload: entry.payload.clone(),
            });
            i += 1;
        }
        (sends, exhausted)
    }

    /// Remove the entry acknowledged by `request_id`.
    pub(crate) fn acknowledge(&mut self, request_id: i32) -> Option<Completion> {
        let idx = self
            .entries
            .iter()
            .position(|e| e.request_id == request_id)?;
        let entry = self.entries.remove(idx);
        Some(Completion {
            request_id,
            delivered: true,
            callback: entry.on_status,
        })
    }

    /// Remove every entry belonging to `trap` and hand them back.
    ///
    /// Callbacks are never fired. The caller must drop the returned entries
    /// after releasing the lock, since a callback may own another `Trap`.
    pub(crate) fn purge(&mut self, trap: TrapId) -> Vec<QueueEntry> {
        let (removed, kept) = std::mem::take(&mut self.entries)
            .into_iter()
            .partition(|e| e.trap == trap);
        self.entries = kept;
        removed
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    #[cfg(test)]
    pub(crate) fn contains_trap(&self, trap: TrapId) -> bool {
        self.entries.iter().any(|e| e.trap == trap)
    }
}
