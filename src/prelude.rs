//! Prelude module for convenient imports.
//!
//! ```rust,no_run
//! use snmp_engine::prelude::*;
//! ```
//!
//! This imports:
//! - Engines: [`Agent`], [`Manager`], [`Device`], [`PollStatus`]
//! - Data model: [`Oid`], [`Value`], [`VarBind`], [`Version`]
//! - Handlers: [`Binding`], [`Handler`], [`SetResult`]
//! - Notifications: [`Trap`], [`TrapDelivery`]
//! - Error handling: [`Error`], [`Result`]
//! - The [`oid!`] macro

pub use crate::agent::Agent;
pub use crate::error::{Error, Result};
pub use crate::handler::{Binding, Handler, SetResult};
pub use crate::manager::{Device, Manager};
pub use crate::notification::{Trap, TrapDelivery};
pub use crate::oid::Oid;
pub use crate::poll::PollStatus;
pub use crate::value::Value;
pub use crate::varbind::VarBind;
pub use crate::version::Version;

#[doc(no_inline)]
pub use crate::oid;
