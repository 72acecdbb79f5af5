//! Process-wide list of live agents' delivery queues.
//!
//! Agents register on construction and deregister when dropped. Only weak
//! references are held, so the list never keeps an agent's queue alive.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use super::{InformQueue, TrapId};

/// Identity of a registered agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct AgentId(u64);

static NEXT_AGENT_ID: AtomicU64 = AtomicU64::new(1);

static LIVE_AGENTS: Mutex<Vec<(AgentId, Weak<Mutex<InformQueue>>)>> = Mutex::new(Vec::new());

pub(crate) fn register_agent(queue: &Arc<Mutex<InformQueue>>) -> AgentId {
    let id = AgentId(NEXT_AGENT_ID.fetch_add(1, Ordering::Relaxed));
    let mut agents = LIVE_AGENTS.lock().unwrap_or_else(PoisonError::into_inner);
    agents.retain(|(_, q)| q.strong_count() > 0);
    agents.push((id, Arc::downgrade(queue)));
    id
}

pub(crate) fn deregister_agent(id: AgentId) {
    LIVE_AGENTS
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .retain(|(a, _)| *a != id);
}

/// Number of agents currently alive in this process.
pub fn live_agent_count() -> usize {
    LIVE_AGENTS
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .iter()
        .filter(|(_, q)| q.strong_count() > 0)
        .count()
}

/// Remove every queued delivery of `trap` from every live agent.
///
/// Returns the number of entries removed. Called automatically when a
/// [`Trap`](super::Trap) is dropped.
pub fn purge_trap(trap: TrapId) -> usize {
    let queues: Vec<Arc<Mutex<InformQueue>>> = LIVE_AGENTS
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .iter()
        .filter_map(|(_, q)| q.upgrade())
        .collect();

    let mut purged = 0;
    for queue in &queues {
        let removed = queue.lock().unwrap_or_else(PoisonError::into_inner).purge(trap);
        purged += removed.len();
        // Dropped with no lock held: a callback may own a trap whose drop purges again.
        drop(removed);
    }
    purged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::{QueueEntry, Trap};
    use crate::oid;
    use bytes::Bytes;
    use std::time::Duration;
    use tokio::time::Instant;

    fn queued(trap: TrapId) -> Arc<Mutex<InformQueue>> {
        let mut q = InformQueue::new();
        q.push(
            QueueEntry {
                trap,
                target: "192.0.2.1:162".parse().unwrap(),
                payload: Bytes::from_static(b"inform"),
                request_id: 1,
                attempts_remaining: 1,
                delay: Duration::from_secs(1),
                next_send: Instant::now(),
                on_status: None,
            },
            false,
        );
        Arc::new(Mutex::new(q))
    }

    #[test]
    fn test_purge_reaches_registered_queues_only() {
        let trap = Trap::v2c(oid!(1, 3, 6, 1, 4, 1, 1)).inform(true);
        let registered = queued(trap.id());
        let unregistered = queued(trap.id());

        let id = register_agent(&registered);
        assert_eq!(purge_trap(trap.id()), 1);
        assert_eq!(registered.lock().unwrap().len(), 0);
        assert_eq!(unregistered.lock().unwrap().len(), 1);
        deregister_agent(id);
    }

    #[test]
    fn test_deregistered_queue_is_skipped() {
        let trap = Trap::v2c(oid!(1, 3, 6, 1, 4, 1, 2)).inform(true);
        let queue = queued(trap.id());

        let id = register_agent(&queue);
        deregister_agent(id);
        assert_eq!(purge_trap(trap.id()), 0);
        assert_eq!(queue.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_dropped_queue_is_not_counted() {
        let trap = Trap::v2c(oid!(1, 3, 6, 1, 4, 1, 3)).inform(true);
        let queue = queued(trap.id());
        let id = register_agent(&queue);
        drop(queue);

        // The weak entry is dead and cannot be purged.
        assert_eq!(purge_trap(trap.id()), 0);
        deregister_agent(id);
    }
}
