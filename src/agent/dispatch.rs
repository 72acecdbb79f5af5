//! GET, GETNEXT and GETBULK dispatch against the registry.

use crate::error::ErrorStatus;
use crate::pdu::Pdu;
use crate::value::Value;
use crate::varbind::VarBind;
use crate::version::Version;

use super::Agent;

/// Upper bound on a response's bytes outside the varbinds, beyond the community.
const RESPONSE_OVERHEAD: usize = 32;

impl Agent {
    /// Handle GET.
    ///
    /// A missing OID yields noSuchInstance when a registered OID shares its
    /// parent, noSuchObject otherwise. SNMPv1 gets noSuchName instead.
    pub(super) fn handle_get(&self, version: Version, pdu: &Pdu) -> Pdu {
        let mut varbinds = Vec::with_capacity(pdu.varbinds.len());

        for (index, vb) in pdu.varbinds.iter().enumerate() {
            let value = match self.registry.find_exact(&vb.oid) {
                Some(handler) => handler.value(),
                None if version == Version::V1 => {
                    return pdu.to_error_response(ErrorStatus::NoSuchName, index as i32 + 1);
                }
                None if self.registry.has_sibling_of(&vb.oid) => Value::NoSuchInstance,
                None => Value::NoSuchObject,
            };
            tracing::trace!(target: "snmp_engine::agent", { snmp.oid = %vb.oid, value = %value }, "get");
            varbinds.push(VarBind::new(vb.oid.clone(), value));
        }

        Pdu::response(pdu.request_id, varbinds)
    }

    /// Handle GETNEXT.
    pub(super) fn handle_get_next(&self, version: Version, pdu: &Pdu) -> Pdu {
        let mut varbinds = Vec::with_capacity(pdu.varbinds.len());

        for (index, vb) in pdu.varbinds.iter().enumerate() {
            match self.registry.find_next(&vb.oid) {
                Some(handler) => {
                    tracing::trace!(target: "snmp_engine::agent", { snmp.oid = %vb.oid, next = %handler.oid }, "get-next");
                    varbinds.push(handler.varbind());
                }
                None if version == Version::V1 => {
                    return pdu.to_error_response(ErrorStatus::NoSuchName, index as i32 + 1);
                }
                None => varbinds.push(VarBind::new(vb.oid.clone(), Value::EndOfMibView)),
            }
        }

        Pdu::response(pdu.request_id, varbinds)
    }

    /// Handle GETBULK (v2c only).
    ///
    /// Stops adding bindings once the response would no longer fit in one
    /// packet. If not even the first binding fits, answers tooBig.
    pub(super) fn handle_get_bulk(&self, community_len: usize, pdu: &Pdu) -> Pdu {
        let non_repeaters = pdu.non_repeaters().min(pdu.varbinds.len());
        let max_repetitions = pdu.max_repetitions();
        let budget = crate::MAX_PACKET_SIZE.saturating_sub(RESPONSE_OVERHEAD + community_len);

        let mut varbinds = Vec::new();
        let mut used = 0usize;
        let mut push = |vb: VarBind, varbinds: &mut Vec<VarBind>| -> bool {
            let size = vb.encoded_size();
            if used + size > budget {
                return false;
            }
            used += size;
            varbinds.push(vb);
            true
        };

        for vb in &pdu.varbinds[..non_repeaters] {
            let next = match self.registry.find_next(&vb.oid) {
                Some(handler) => handler.varbind(),
                None => VarBind::new(vb.oid.clone(), Value::EndOfMibView),
            };
            if !push(next, &mut varbinds) {
                if varbinds.is_empty() {
                    return pdu.to_error_response(ErrorStatus::TooBig, 0);
                }
                return Pdu::response(pdu.request_id, varbinds);
            }
        }

        let repeaters = &pdu.varbinds[non_repeaters..];
        let mut cursors: Vec<_> = repeaters.iter().map(|vb| vb.oid.clone()).collect();
        let mut finished = vec![false; cursors.len()];

        'rows: for _ in 0..max_repetitions {
            if finished.iter().all(|&done| done) {
                break;
            }
            for (cursor, done) in cursors.iter_mut().zip(finished.iter_mut()) {
                let next = if *done {
                    VarBind::new(cursor.clone(), Value::EndOfMibView)
                } else {
                    match self.registry.find_next(cursor) {
                        Some(handler) => {
                            *cursor = handler.oid.clone();
                            handler.varbind()
                        }
                        None => {
                            *done = true;
                            VarBind::new(cursor.clone(), Value::EndOfMibView)
                        }
                    }
                };
                if !push(next, &mut varbinds) {
                    if varbinds.is_empty() {
                        return pdu.to_error_response(ErrorStatus::TooBig, 0);
                    }
                    break 'rows;
                }
            }
        }

        Pdu::response(pdu.request_id, varbinds)
    }
}
