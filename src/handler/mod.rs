//! Handlers bind an OID to application-owned storage.
//!
//! A [`Handler`] pairs an [`Oid`] with a [`Binding`] and a settable flag.
//! Handlers are shared as `Arc<Handler>`: the agent's registry and the
//! manager's pollers hold clones, and removal is by `Arc` identity.
//!
//! ```rust
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicI32, Ordering};
//! use snmp_engine::handler::{Binding, Handler, SetResult};
//! use snmp_engine::{Value, oid};
//!
//! let level = Arc::new(AtomicI32::new(3));
//! let handler = Handler::new(
//!     oid!(1, 3, 6, 1, 4, 1, 99999, 1, 0),
//!     Binding::Integer { value: level.clone(), min: 0, max: 10 },
//!     true,
//! );
//!
//! assert_eq!(handler.value(), Value::Integer(3));
//! assert_eq!(handler.store(&Value::Integer(42)), SetResult::BadValue);
//! assert_eq!(handler.store(&Value::Integer(7)), SetResult::Ok);
//! assert_eq!(level.load(Ordering::Relaxed), 7);
//! ```

mod binding;
mod results;

pub use binding::Binding;
pub use results::SetResult;

use crate::oid::Oid;
use crate::value::Value;
use crate::varbind::VarBind;

/// OID-addressed view onto application storage.
#[derive(Debug, Clone)]
pub struct Handler {
    /// Object identifier this handler answers for.
    pub oid: Oid,
    /// Whether SET requests may write through this handler.
    pub settable: bool,
    /// Value kind and backing storage.
    pub binding: Binding,
}

impl Handler {
    /// Create a handler.
    pub fn new(oid: Oid, binding: Binding, settable: bool) -> Self {
        Self {
            oid,
            settable,
            binding,
        }
    }

    /// Current value.
    pub fn value(&self) -> Value {
        self.binding.value()
    }

    /// Current value as a binding, ready for a response.
    pub fn varbind(&self) -> VarBind {
        VarBind::new(self.oid.clone(), self.value())
    }

    /// Validate a SET for this handler without writing.
    pub fn test_set(&self, value: &Value) -> SetResult {
        if !self.settable {
            return SetResult::NotWritable;
        }
        self.binding.check(value)
    }

    /// Validate and write a SET.
    pub fn commit_set(&self, value: &Value) -> SetResult {
        if !self.settable {
            return SetResult::NotWritable;
        }
        self.binding.store(value)
    }

    /// Write a value regardless of the settable flag.
    ///
    /// Used when the value comes from a polled device rather than a SET.
    pub fn store(&self, value: &Value) -> SetResult {
        self.binding.store(value)
    }
}
