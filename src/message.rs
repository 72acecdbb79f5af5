//! Community-based SNMP message format (v1/v2c).
//!
//! Both versions share `SEQUENCE { version INTEGER, community OCTET STRING, pdu }`
//! and differ only in the version number. The PDU is either a regular
//! request/response PDU or, in SNMPv1 only, a Trap-PDU.

use crate::ber::{Decoder, EncodeBuf, tag};
use crate::error::{DecodeErrorKind, Error, Result};
use crate::pdu::{Pdu, TrapV1Pdu};
use crate::version::Version;
use bytes::Bytes;

/// Community message carrying a request/response PDU.
#[derive(Debug, Clone, PartialEq)]
pub struct CommunityMessage {
    /// SNMP version (V1 or V2c)
    pub version: Version,
    /// Community string
    pub community: Bytes,
    /// Protocol data unit
    pub pdu: Pdu,
}

impl CommunityMessage {
    /// Create a new community message.
    pub fn new(version: Version, community: impl Into<Bytes>, pdu: Pdu) -> Self {
        Self {
            version,
            community: community.into(),
            pdu,
        }
    }

    /// Create a V2c message.
    pub fn v2c(community: impl Into<Bytes>, pdu: Pdu) -> Self {
        Self::new(Version::V2c, community, pdu)
    }

    /// Create a V1 message.
    pub fn v1(community: impl Into<Bytes>, pdu: Pdu) -> Self {
        Self::new(Version::V1, community, pdu)
    }

    /// Encode into a reverse buffer.
    pub fn encode_into(&self, buf: &mut EncodeBuf) {
        buf.push_sequence(|buf| {
            self.pdu.encode(buf);
            buf.push_octet_string(&self.community);
            buf.push_integer(self.version.as_i32());
        });
    }

    /// Encode to BER.
    pub fn encode(&self) -> Bytes {
        let mut buf = EncodeBuf::new();
        self.encode_into(&mut buf);
        buf.finish()
    }
}

/// SNMPv1 message carrying a Trap-PDU.
#[derive(Debug, Clone, PartialEq)]
pub struct TrapV1Message {
    /// Community string
    pub community: Bytes,
    /// Trap PDU
    pub trap: TrapV1Pdu,
}

impl TrapV1Message {
    /// Create a new v1 trap message.
    pub fn new(community: impl Into<Bytes>, trap: TrapV1Pdu) -> Self {
        Self {
            community: community.into(),
            trap,
        }
    }

    /// Encode into a reverse buffer.
    pub fn encode_into(&self, buf: &mut EncodeBuf) {
        buf.push_sequence(|buf| {
            self.trap.encode(buf);
            buf.push_octet_string(&self.community);
            buf.push_integer(Version::V1.as_i32());
        });
    }

    /// Encode to BER.
    pub fn encode(&self) -> Bytes {
        let mut buf = EncodeBuf::new();
        self.encode_into(&mut buf);
        buf.finish()
    }
}

/// Any v1/v2c message.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// Request, response, SNMPv2 trap or inform.
    Community(CommunityMessage),
    /// SNMPv1 trap.
    TrapV1(TrapV1Message),
}

impl Message {
    /// Version number carried by the message.
    pub fn version(&self) -> Version {
        match self {
            Message::Community(msg) => msg.version,
            Message::TrapV1(_) => Version::V1,
        }
    }

    /// Community string carried by the message.
    pub fn community(&self) -> &Bytes {
        match self {
            Message::Community(msg) => &msg.community,
            Message::TrapV1(msg) => &msg.community,
        }
    }

    /// Encode into a reverse buffer.
    pub fn encode_into(&self, buf: &mut EncodeBuf) {
        match self {
            Message::Community(msg) => msg.encode_into(buf),
            Message::TrapV1(msg) => msg.encode_into(buf),
        }
    }

    /// Decode a whole datagram.
    ///
    /// The outer sequence must span the entire input.
    pub fn decode(data: Bytes) -> Result<Self> {
        let mut decoder = Decoder::new(data);
        let mut seq = decoder.read_sequence()?;
        if !decoder.is_empty() {
            let offset = decoder.offset();
            tracing::debug!(target: "snmp_engine::ber", { snmp.offset = offset, remaining = decoder.remaining() }, "trailing data after message");
            return Err(Error::decode(
                offset,
                DecodeErrorKind::TrailingData {
                    remaining: decoder.remaining(),
                },
            ));
        }

        let version_offset = seq.offset();
        let version_num = seq.read_integer()?;
        let version = Version::from_i32(version_num).ok_or_else(|| {
            tracing::debug!(target: "snmp_engine::ber", { snmp.offset = version_offset, version = version_num }, "unsupported version");
            Error::decode(version_offset, DecodeErrorKind::UnknownVersion(version_num))
        })?;

        let community = seq.read_octet_string()?;

        let message = if seq.peek_tag() == Some(tag::pdu::TRAP_V1) && version == Version::V1 {
            Message::TrapV1(TrapV1Message {
                community,
                trap: TrapV1Pdu::decode(&mut seq)?,
            })
        } else {
            Message::Community(CommunityMessage {
                version,
                community,
                pdu: Pdu::decode(&mut seq)?,
            })
        };

        if !seq.is_empty() {
            return Err(Error::decode(
                seq.offset(),
                DecodeErrorKind::TrailingData {
                    remaining: seq.remaining(),
                },
            ));
        }

        Ok(message)
    }
}

impl From<CommunityMessage> for Message {
    fn from(msg: CommunityMessage) -> Self {
        Message::Community(msg)
    }
}

impl From<TrapV1Message> for Message {
    fn from(msg: TrapV1Message) -> Self {
        Message::TrapV1(msg)
    }
}
