//! Two-phase SET (RFC 3416).

use std::sync::Arc;

use crate::error::ErrorStatus;
use crate::handler::{Handler, SetResult};
use crate::pdu::Pdu;
use crate::version::Version;

use super::Agent;

impl Agent {
    /// Handle SET.
    ///
    /// 1. **Test**: every binding must name a registered, settable handler
    ///    and carry a value its binding accepts. The first failure is
    ///    reported with its 1-based index and nothing is written.
    /// 2. **Commit**: values are written in request order.
    ///
    /// Returns the response and whether anything was written.
    pub(super) fn handle_set(&self, version: Version, pdu: &Pdu) -> (Pdu, bool) {
        let mut pending: Vec<&Arc<Handler>> = Vec::with_capacity(pdu.varbinds.len());

        for (index, vb) in pdu.varbinds.iter().enumerate() {
            let result = match self.registry.find_exact(&vb.oid) {
                Some(handler) => {
                    let result = handler.test_set(&vb.value);
                    if result.is_ok() {
                        pending.push(handler);
                    }
                    result
                }
                None => SetResult::NotWritable,
            };

            if !result.is_ok() {
                let mut status = result.to_error_status();
                if version == Version::V1 {
                    status = status.to_v1();
                }
                tracing::debug!(target: "snmp_engine::agent", { snmp.oid = %vb.oid, error_status = %status, index = index + 1 }, "set rejected");
                return (pdu.to_error_response(status, index as i32 + 1), false);
            }
        }

        for (handler, vb) in pending.iter().zip(&pdu.varbinds) {
            // already validated in the test phase
            let result = handler.commit_set(&vb.value);
            if !result.is_ok() {
                tracing::warn!(target: "snmp_engine::agent", { snmp.oid = %vb.oid, result = ?result }, "commit failed after successful test");
            }
            tracing::trace!(target: "snmp_engine::agent", { snmp.oid = %vb.oid, value = %vb.value }, "set");
        }

        (Pdu::response(pdu.request_id, pdu.varbinds.clone()), true)
    }
}
