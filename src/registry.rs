//! Ordered handler registry used for GET/GETNEXT dispatch.

use std::sync::Arc;

use crate::handler::Handler;
use crate::oid::Oid;

/// Ordered collection of handlers keyed by OID.
///
/// Insertion appends and leaves the registry unsorted until the next
/// [`sort`](Registry::sort). Exact lookups work in either state.
/// [`find_next`](Registry::find_next) needs a sorted registry; calling it
/// unsorted is a caller error and gives an unspecified (but memory-safe)
/// answer.
///
/// One handler per OID is expected. Duplicates are not rejected; lookups
/// resolve to the most recently inserted one.
#[derive(Debug, Default)]
pub struct Registry {
    handlers: Vec<Arc<Handler>>,
    sorted: bool,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
            sorted: true,
        }
    }

    /// Append a handler.
    pub fn insert(&mut self, handler: Arc<Handler>) {
        if let Some(last) = self.handlers.last() {
            self.sorted &= last.oid < handler.oid;
        }
        self.handlers.push(handler);
    }

    /// Remove a handler by identity, keeping the order of the rest.
    ///
    /// Returns `false` if the handler was not registered.
    pub fn remove(&mut self, handler: &Arc<Handler>) -> bool {
        match self.handlers.iter().position(|h| Arc::ptr_eq(h, handler)) {
            Some(idx) => {
                self.handlers.remove(idx);
                true
            }
            None => false,
        }
    }

    /// Restore ascending OID order.
    ///
    /// Stable, so equal OIDs keep their insertion order.
    pub fn sort(&mut self) {
        self.handlers.sort_by(|a, b| a.oid.cmp(&b.oid));
        self.sorted = true;
    }

    /// Whether the registry is currently in ascending OID order.
    pub fn is_sorted(&self) -> bool {
        self.sorted
    }

    /// Handler registered for exactly `oid`.
    pub fn find_exact(&self, oid: &Oid) -> Option<&Arc<Handler>> {
        self.handlers.iter().rev().find(|h| h.oid == *oid)
    }

    /// Handler with the smallest OID strictly greater than `oid`.
    ///
    /// `None` means end of tree.
    pub fn find_next(&self, oid: &Oid) -> Option<&Arc<Handler>> {
        if !self.sorted {
            tracing::debug!(target: "snmp_engine::agent", { snmp.oid = %oid }, "find_next on unsorted registry");
        }
        let idx = self.handlers.partition_point(|h| h.oid <= *oid);
        let first = self.handlers.get(idx)?;
        // last of a run of equal OIDs
        let run = self.handlers[idx..]
            .iter()
            .take_while(|h| h.oid == first.oid)
            .count();
        self.handlers.get(idx + run - 1)
    }

    /// True if some registered OID shares `oid`'s parent.
    ///
    /// Separates "instance missing" from "object unknown" on GET.
    pub fn has_sibling_of(&self, oid: &Oid) -> bool {
        let Some(parent) = oid.parent() else {
            return false;
        };
        self.handlers
            .iter()
            .any(|h| h.oid.len() == oid.len() && h.oid.starts_with(&parent))
    }

    /// Number of registered handlers.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Iterate in current order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Handler>> {
        self.handlers.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::Binding;
    use crate::oid;
    use crate::value::Value;
    use std::sync::atomic::AtomicI32;

    fn int_handler(oid: Oid, v: i32) -> Arc<Handler> {
        Arc::new(Handler::new(
            oid,
            Binding::Integer {
                value: Arc::new(AtomicI32::new(v)),
                min: i32::MIN,
                max: i32::MAX,
            },
            true,
        ))
    }

    #[test]
    fn test_find_next_walks_sorted_registry() {
        let mut reg = Registry::new();
        for oid in [
            oid!(1, 3, 6, 1, 4, 1, 5),
            oid!(1, 3, 6, 1, 2, 1, 1, 1, 0),
            oid!(1, 3, 6, 1, 4, 1, 2, 1),
            oid!(1, 3, 6, 1, 2, 1, 1, 3, 0),
            oid!(1, 3, 6, 1, 4, 1, 2),
        ] {
            reg.insert(int_handler(oid, 0));
        }
        assert!(!reg.is_sorted());
        reg.sort();
        assert!(reg.is_sorted());

        let mut visited = Vec::new();
        let mut cursor = Oid::empty();
        while let Some(h) = reg.find_next(&cursor) {
            visited.push(h.oid.clone());
            cursor = h.oid.clone();
        }
        assert_eq!(
            visited,
            vec![
                oid!(1, 3, 6, 1, 2, 1, 1, 1, 0),
                oid!(1, 3, 6, 1, 2, 1, 1, 3, 0),
                oid!(1, 3, 6, 1, 4, 1, 2),
                oid!(1, 3, 6, 1, 4, 1, 2, 1),
                oid!(1, 3, 6, 1, 4, 1, 5),
            ]
        );
        assert!(reg.find_next(&oid!(1, 3, 6, 1, 4, 1, 5)).is_none());
        assert!(reg.find_next(&oid!(2)).is_none());
    }

    #[test]
    fn test_find_next_between_entries() {
        let mut reg = Registry::new();
        reg.insert(int_handler(oid!(1, 3, 6, 1, 2), 0));
        reg.insert(int_handler(oid!(1, 3, 6, 1, 4), 0));
        assert_eq!(
            reg.find_next(&oid!(1, 3, 6, 1, 3, 99)).unwrap().oid,
            oid!(1, 3, 6, 1, 4)
        );
        assert_eq!(reg.find_next(&oid!(1)).unwrap().oid, oid!(1, 3, 6, 1, 2));
    }

    #[test]
    fn test_remove_by_identity_preserves_order() {
        let mut reg = Registry::new();
        let a = int_handler(oid!(1, 1), 0);
        let b = int_handler(oid!(1, 2), 0);
        let c = int_handler(oid!(1, 3), 0);
        reg.insert(a.clone());
        reg.insert(b.clone());
        reg.insert(c.clone());

        // same OID, different object: not removed
        assert!(!reg.remove(&int_handler(oid!(1, 2), 0)));
        assert!(reg.remove(&b));
        assert!(!reg.remove(&b));

        let order: Vec<_> = reg.iter().map(|h| h.oid.clone()).collect();
        assert_eq!(order, vec![oid!(1, 1), oid!(1, 3)]);
        assert!(reg.is_sorted());
        // removed handler is still usable by its owner
        assert_eq!(b.value(), Value::Integer(0));
    }

    #[test]
    fn test_duplicates_last_write_wins() {
        let mut reg = Registry::new();
        reg.insert(int_handler(oid!(1, 5), 1));
        reg.insert(int_handler(oid!(1, 5), 2));
        reg.insert(int_handler(oid!(1, 4), 0));
        reg.sort();

        assert_eq!(reg.find_exact(&oid!(1, 5)).unwrap().value(), Value::Integer(2));
        assert_eq!(reg.find_next(&oid!(1, 4)).unwrap().value(), Value::Integer(2));
        assert!(reg.find_next(&oid!(1, 5)).is_none());
    }

    #[test]
    fn test_find_exact_unsorted() {
        let mut reg = Registry::new();
        reg.insert(int_handler(oid!(1, 9), 9));
        reg.insert(int_handler(oid!(1, 1), 1));
        assert_eq!(reg.find_exact(&oid!(1, 1)).unwrap().value(), Value::Integer(1));
        assert!(reg.find_exact(&oid!(1, 2)).is_none());
    }

    #[test]
    fn test_sibling_detection() {
        let mut reg = Registry::new();
        reg.insert(int_handler(oid!(1, 3, 6, 1, 2, 1, 1, 5, 0), 0));
        assert!(reg.has_sibling_of(&oid!(1, 3, 6, 1, 2, 1, 1, 5, 1)));
        assert!(!reg.has_sibling_of(&oid!(1, 3, 6, 1, 2, 1, 1, 6, 0)));
        assert!(!reg.has_sibling_of(&oid!(1, 3, 6, 1, 2, 1, 1, 5, 0, 1)));
    }
}
