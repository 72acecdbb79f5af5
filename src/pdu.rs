//! SNMP Protocol Data Units.
//!
//! [`Pdu`] covers every v1/v2c operation that shares the
//! `request-id, error-status, error-index, varbinds` layout. The SNMPv1
//! Trap-PDU has its own shape and lives in [`TrapV1Pdu`].

use crate::ber::{Decoder, EncodeBuf, tag};
use crate::error::{DecodeErrorKind, Error, ErrorStatus, Result};
use crate::oid::Oid;
use crate::varbind::{VarBind, decode_varbind_list, encode_varbind_list};

/// PDU type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PduType {
    GetRequest = 0xA0,
    GetNextRequest = 0xA1,
    Response = 0xA2,
    SetRequest = 0xA3,
    TrapV1 = 0xA4,
    GetBulkRequest = 0xA5,
    InformRequest = 0xA6,
    TrapV2 = 0xA7,
    Report = 0xA8,
}

impl PduType {
    /// Create from tag byte.
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            tag::pdu::GET_REQUEST => Some(Self::GetRequest),
            tag::pdu::GET_NEXT_REQUEST => Some(Self::GetNextRequest),
            tag::pdu::RESPONSE => Some(Self::Response),
            tag::pdu::SET_REQUEST => Some(Self::SetRequest),
            tag::pdu::TRAP_V1 => Some(Self::TrapV1),
            tag::pdu::GET_BULK_REQUEST => Some(Self::GetBulkRequest),
            tag::pdu::INFORM_REQUEST => Some(Self::InformRequest),
            tag::pdu::TRAP_V2 => Some(Self::TrapV2),
            tag::pdu::REPORT => Some(Self::Report),
            _ => None,
        }
    }

    /// Get the tag byte.
    pub fn tag(self) -> u8 {
        self as u8
    }
}

impl std::fmt::Display for PduType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::GetRequest => "GetRequest",
            Self::GetNextRequest => "GetNextRequest",
            Self::Response => "Response",
            Self::SetRequest => "SetRequest",
            Self::TrapV1 => "TrapV1",
            Self::GetBulkRequest => "GetBulkRequest",
            Self::InformRequest => "InformRequest",
            Self::TrapV2 => "TrapV2",
            Self::Report => "Report",
        };
        f.write_str(name)
    }
}

/// Request/response PDU.
///
/// For GETBULK the `error_status` and `error_index` slots carry
/// non-repeaters and max-repetitions; see [`Pdu::non_repeaters`].
#[derive(Debug, Clone, PartialEq)]
pub struct Pdu {
    /// PDU type
    pub pdu_type: PduType,
    /// Request ID for correlating requests and responses
    pub request_id: i32,
    /// Error status (0 for requests, error code for responses)
    pub error_status: i32,
    /// Error index (1-based index of problematic varbind)
    pub error_index: i32,
    /// Variable bindings
    pub varbinds: Vec<VarBind>,
}

impl Pdu {
    fn with_type(pdu_type: PduType, request_id: i32, varbinds: Vec<VarBind>) -> Self {
        Self {
            pdu_type,
            request_id,
            error_status: 0,
            error_index: 0,
            varbinds,
        }
    }

    /// GET request with NULL-valued bindings.
    pub fn get_request(request_id: i32, oids: &[Oid]) -> Self {
        let varbinds = oids.iter().cloned().map(VarBind::null).collect();
        Self::with_type(PduType::GetRequest, request_id, varbinds)
    }

    /// GETNEXT request with NULL-valued bindings.
    pub fn get_next_request(request_id: i32, oids: &[Oid]) -> Self {
        let varbinds = oids.iter().cloned().map(VarBind::null).collect();
        Self::with_type(PduType::GetNextRequest, request_id, varbinds)
    }

    /// SET request.
    pub fn set_request(request_id: i32, varbinds: Vec<VarBind>) -> Self {
        Self::with_type(PduType::SetRequest, request_id, varbinds)
    }

    /// GETBULK request.
    pub fn get_bulk(
        request_id: i32,
        non_repeaters: i32,
        max_repetitions: i32,
        varbinds: Vec<VarBind>,
    ) -> Self {
        Self {
            pdu_type: PduType::GetBulkRequest,
            request_id,
            error_status: non_repeaters,
            error_index: max_repetitions,
            varbinds,
        }
    }

    /// SNMPv2-Trap PDU.
    pub fn trap_v2(request_id: i32, varbinds: Vec<VarBind>) -> Self {
        Self::with_type(PduType::TrapV2, request_id, varbinds)
    }

    /// InformRequest PDU.
    pub fn inform_request(request_id: i32, varbinds: Vec<VarBind>) -> Self {
        Self::with_type(PduType::InformRequest, request_id, varbinds)
    }

    /// Successful Response carrying `varbinds`.
    pub fn response(request_id: i32, varbinds: Vec<VarBind>) -> Self {
        Self::with_type(PduType::Response, request_id, varbinds)
    }

    /// Non-repeaters of a GETBULK request, clamped to zero.
    pub fn non_repeaters(&self) -> usize {
        self.error_status.max(0) as usize
    }

    /// Max-repetitions of a GETBULK request, clamped to zero.
    pub fn max_repetitions(&self) -> usize {
        self.error_index.max(0) as usize
    }

    /// Encode to BER.
    pub fn encode(&self, buf: &mut EncodeBuf) {
        buf.push_constructed(self.pdu_type.tag(), |buf| {
            encode_varbind_list(buf, &self.varbinds);
            buf.push_integer(self.error_index);
            buf.push_integer(self.error_status);
            buf.push_integer(self.request_id);
        });
    }

    /// Decode from BER.
    ///
    /// Rejects the SNMPv1 Trap tag; use [`TrapV1Pdu::decode`] for it.
    pub fn decode(decoder: &mut Decoder) -> Result<Self> {
        let offset = decoder.offset();
        let tag = decoder.read_tag()?;
        let pdu_type = match PduType::from_tag(tag) {
            Some(t) if t != PduType::TrapV1 => t,
            _ => {
                tracing::debug!(target: "snmp_engine::ber", { snmp.offset = offset, tag }, "unknown PDU type");
                return Err(Error::decode(offset, DecodeErrorKind::UnknownPduType(tag)));
            }
        };

        let len = decoder.read_length()?;
        let mut pdu = decoder.sub_decoder(len)?;

        let request_id = pdu.read_integer()?;
        let error_status = pdu.read_integer()?;
        let error_index = pdu.read_integer()?;
        let varbinds = decode_varbind_list(&mut pdu)?;

        Ok(Pdu {
            pdu_type,
            request_id,
            error_status,
            error_index,
            varbinds,
        })
    }

    /// Check if this is an error response.
    pub fn is_error(&self) -> bool {
        self.error_status != 0
    }

    /// Get the error status as an enum.
    pub fn error_status_enum(&self) -> ErrorStatus {
        ErrorStatus::from_i32(self.error_status)
    }

    /// Response echoing the request bindings with an error status.
    pub fn to_error_response(&self, error_status: ErrorStatus, error_index: i32) -> Self {
        Self {
            pdu_type: PduType::Response,
            request_id: self.request_id,
            error_status: error_status.as_i32(),
            error_index,
            varbinds: self.varbinds.clone(),
        }
    }
}

/// SNMPv1 generic trap types (RFC 1157 Section 4.1.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum GenericTrap {
    ColdStart = 0,
    WarmStart = 1,
    LinkDown = 2,
    LinkUp = 3,
    AuthenticationFailure = 4,
    EgpNeighborLoss = 5,
    /// Vendor-specific trap, see the specific-trap field.
    EnterpriseSpecific = 6,
}

impl GenericTrap {
    /// Create from integer value.
    pub fn from_i32(v: i32) -> Option<Self> {
        match v {
            0 => Some(Self::ColdStart),
            1 => Some(Self::WarmStart),
            2 => Some(Self::LinkDown),
            3 => Some(Self::LinkUp),
            4 => Some(Self::AuthenticationFailure),
            5 => Some(Self::EgpNeighborLoss),
            6 => Some(Self::EnterpriseSpecific),
            _ => None,
        }
    }

    /// Get the integer value.
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

/// SNMPv1 Trap PDU (RFC 1157 Section 4.1.6).
#[derive(Debug, Clone, PartialEq)]
pub struct TrapV1Pdu {
    /// Enterprise OID (sysObjectID of the entity generating the trap)
    pub enterprise: Oid,
    /// Address of the agent generating the trap
    pub agent_addr: [u8; 4],
    /// Generic trap type
    pub generic_trap: i32,
    /// Specific trap code
    pub specific_trap: i32,
    /// Hundredths of a second since the agent started
    pub time_stamp: u32,
    /// Variable bindings
    pub varbinds: Vec<VarBind>,
}

impl TrapV1Pdu {
    /// Create a new SNMPv1 Trap PDU.
    pub fn new(
        enterprise: Oid,
        agent_addr: [u8; 4],
        generic_trap: GenericTrap,
        specific_trap: i32,
        time_stamp: u32,
        varbinds: Vec<VarBind>,
    ) -> Self {
        Self {
            enterprise,
            agent_addr,
            generic_trap: generic_trap.as_i32(),
            specific_trap,
            time_stamp,
            varbinds,
        }
    }

    /// Encode to BER.
    pub fn encode(&self, buf: &mut EncodeBuf) {
        buf.push_constructed(tag::pdu::TRAP_V1, |buf| {
            encode_varbind_list(buf, &self.varbinds);
            buf.push_unsigned32(tag::application::TIMETICKS, self.time_stamp);
            buf.push_integer(self.specific_trap);
            buf.push_integer(self.generic_trap);
            // NetworkAddress is APPLICATION 0 IMPLICIT OCTET STRING (SIZE (4))
            buf.push_ip_address(self.agent_addr);
            buf.push_oid(&self.enterprise);
        });
    }

    /// Decode from BER.
    pub fn decode(decoder: &mut Decoder) -> Result<Self> {
        let mut pdu = decoder.read_constructed(tag::pdu::TRAP_V1)?;

        let enterprise = pdu.read_oid()?;
        let agent_addr = pdu.read_ip_address()?;
        let generic_trap = pdu.read_integer()?;
        let specific_trap = pdu.read_integer()?;
        let len = pdu.expect_tag(tag::application::TIMETICKS)?;
        let time_stamp = pdu.read_unsigned32_value(len)?;
        let varbinds = decode_varbind_list(&mut pdu)?;

        Ok(TrapV1Pdu {
            enterprise,
            agent_addr,
            generic_trap,
            specific_trap,
            time_stamp,
            varbinds,
        })
    }
}
