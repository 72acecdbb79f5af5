//! SNMP value types.
//!
//! The `Value` enum represents every SMIv1/SMIv2 type an engine exchanges,
//! including the three v2c exception markers.

use crate::ber::{Decoder, EncodeBuf, tag};
use crate::error::{DecodeErrorKind, Error, Result};
use crate::oid::Oid;
use bytes::Bytes;
use std::fmt::Write as _;
use std::net::Ipv4Addr;

/// SNMP value.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum Value {
    /// INTEGER (signed 32-bit)
    Integer(i32),

    /// OCTET STRING (arbitrary bytes)
    OctetString(Bytes),

    /// NULL, used as the placeholder value in requests
    Null,

    /// OBJECT IDENTIFIER
    ObjectIdentifier(Oid),

    /// IpAddress (4 bytes, network order)
    IpAddress([u8; 4]),

    /// Counter32 (unsigned 32-bit, wrapping)
    Counter32(u32),

    /// Gauge32 / Unsigned32
    Gauge32(u32),

    /// TimeTicks (hundredths of a second)
    TimeTicks(u32),

    /// Opaque (arbitrary BER-wrapped bytes)
    Opaque(Bytes),

    /// Counter64 (unsigned 64-bit, SNMPv2c only)
    Counter64(u64),

    /// noSuchObject exception: the object type is not implemented here.
    NoSuchObject,

    /// noSuchInstance exception: the object type exists but this instance does not.
    NoSuchInstance,

    /// endOfMibView exception: nothing follows in lexicographic order.
    EndOfMibView,

    /// Unrecognized application or context tag, preserved as raw content.
    Unknown { tag: u8, data: Bytes },
}

impl Value {
    /// `Some` for [`Value::Integer`].
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::Integer(v) => Some(*v),
            _ => None,
        }
    }

    /// `Some` for Counter32, Gauge32, TimeTicks and non-negative Integer.
    pub fn as_u32(&self) -> Option<u32> {
        match self {
            Value::Counter32(v) | Value::Gauge32(v) | Value::TimeTicks(v) => Some(*v),
            Value::Integer(v) => u32::try_from(*v).ok(),
            _ => None,
        }
    }

    /// `Some` for Counter64 and anything [`as_u32`](Self::as_u32) accepts.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::Counter64(v) => Some(*v),
            other => other.as_u32().map(u64::from),
        }
    }

    /// `Some` for OctetString and Opaque.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::OctetString(v) | Value::Opaque(v) => Some(v),
            _ => None,
        }
    }

    /// `Some` when [`as_bytes`](Self::as_bytes) holds valid UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        self.as_bytes().and_then(|b| std::str::from_utf8(b).ok())
    }

    /// `Some` for [`Value::ObjectIdentifier`].
    pub fn as_oid(&self) -> Option<&Oid> {
        match self {
            Value::ObjectIdentifier(oid) => Some(oid),
            _ => None,
        }
    }

    /// `Some` for [`Value::IpAddress`].
    pub fn as_ip(&self) -> Option<Ipv4Addr> {
        match self {
            Value::IpAddress(bytes) => Some(Ipv4Addr::from(*bytes)),
            _ => None,
        }
    }

    /// Check if this is an exception value.
    pub fn is_exception(&self) -> bool {
        matches!(
            self,
            Value::NoSuchObject | Value::NoSuchInstance | Value::EndOfMibView
        )
    }

    /// Short SMI type name, for logs.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Integer(_) => "INTEGER",
            Value::OctetString(_) => "OCTET STRING",
            Value::Null => "NULL",
            Value::ObjectIdentifier(_) => "OBJECT IDENTIFIER",
            Value::IpAddress(_) => "IpAddress",
            Value::Counter32(_) => "Counter32",
            Value::Gauge32(_) => "Gauge32",
            Value::TimeTicks(_) => "TimeTicks",
            Value::Opaque(_) => "Opaque",
            Value::Counter64(_) => "Counter64",
            Value::NoSuchObject => "noSuchObject",
            Value::NoSuchInstance => "noSuchInstance",
            Value::EndOfMibView => "endOfMibView",
            Value::Unknown { .. } => "unknown",
        }
    }

    /// Encode to BER.
    pub fn encode(&self, buf: &mut EncodeBuf) {
        match self {
            Value::Integer(v) => buf.push_integer(*v),
            Value::OctetString(data) => buf.push_octet_string(data),
            Value::Null => buf.push_null(),
            Value::ObjectIdentifier(oid) => buf.push_oid(oid),
            Value::IpAddress(addr) => buf.push_ip_address(*addr),
            Value::Counter32(v) => buf.push_unsigned32(tag::application::COUNTER32, *v),
            Value::Gauge32(v) => buf.push_unsigned32(tag::application::GAUGE32, *v),
            Value::TimeTicks(v) => buf.push_unsigned32(tag::application::TIMETICKS, *v),
            Value::Opaque(data) => buf.push_tagged_bytes(tag::application::OPAQUE, data),
            Value::Counter64(v) => buf.push_counter64(*v),
            Value::NoSuchObject => buf.push_tagged_bytes(tag::context::NO_SUCH_OBJECT, &[]),
            Value::NoSuchInstance => buf.push_tagged_bytes(tag::context::NO_SUCH_INSTANCE, &[]),
            Value::EndOfMibView => buf.push_tagged_bytes(tag::context::END_OF_MIB_VIEW, &[]),
            Value::Unknown { tag: t, data } => buf.push_tagged_bytes(*t, data),
        }
    }

    /// Decode from BER.
    pub fn decode(decoder: &mut Decoder) -> Result<Self> {
        let tag = decoder.read_tag()?;
        let len = decoder.read_length()?;

        match tag {
            tag::universal::INTEGER => Ok(Value::Integer(decoder.read_integer_value(len)?)),
            tag::universal::OCTET_STRING => Ok(Value::OctetString(decoder.read_bytes(len)?)),
            tag::universal::NULL => {
                if len != 0 {
                    return Err(Error::decode(
                        decoder.offset(),
                        DecodeErrorKind::InvalidNull,
                    ));
                }
                Ok(Value::Null)
            }
            tag::universal::OBJECT_IDENTIFIER => {
                Ok(Value::ObjectIdentifier(decoder.read_oid_value(len)?))
            }
            tag::application::IP_ADDRESS => {
                Ok(Value::IpAddress(decoder.read_ip_address_value(len)?))
            }
            tag::application::COUNTER32 => {
                Ok(Value::Counter32(decoder.read_unsigned32_value(len)?))
            }
            tag::application::GAUGE32 => Ok(Value::Gauge32(decoder.read_unsigned32_value(len)?)),
            tag::application::TIMETICKS => {
                Ok(Value::TimeTicks(decoder.read_unsigned32_value(len)?))
            }
            tag::application::OPAQUE => Ok(Value::Opaque(decoder.read_bytes(len)?)),
            tag::application::COUNTER64 => {
                Ok(Value::Counter64(decoder.read_counter64_value(len)?))
            }
            tag::context::NO_SUCH_OBJECT => {
                decoder.read_bytes(len)?;
                Ok(Value::NoSuchObject)
            }
            tag::context::NO_SUCH_INSTANCE => {
                decoder.read_bytes(len)?;
                Ok(Value::NoSuchInstance)
            }
            tag::context::END_OF_MIB_VIEW => {
                decoder.read_bytes(len)?;
                Ok(Value::EndOfMibView)
            }
            tag::universal::OCTET_STRING_CONSTRUCTED => Err(Error::decode(
                decoder.offset(),
                DecodeErrorKind::ConstructedOctetString,
            )),
            _ => {
                let data = decoder.read_bytes(len)?;
                Ok(Value::Unknown { tag, data })
            }
        }
    }
}

fn hex(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len() * 2);
    for b in data {
        let _ = write!(out, "{:02x}", b);
    }
    out
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Integer(v) => write!(f, "{}", v),
            Value::OctetString(data) => match std::str::from_utf8(data) {
                Ok(s) => write!(f, "{}", s),
                Err(_) => write!(f, "0x{}", hex(data)),
            },
            Value::Null => write!(f, "NULL"),
            Value::ObjectIdentifier(oid) => write!(f, "{}", oid),
            Value::IpAddress(addr) => write!(f, "{}", Ipv4Addr::from(*addr)),
            Value::Counter32(v) | Value::Gauge32(v) => write!(f, "{}", v),
            Value::TimeTicks(v) => {
                let secs = v / 100;
                write!(
                    f,
                    "{}d {}h {}m {}s",
                    secs / 86400,
                    (secs % 86400) / 3600,
                    (secs % 3600) / 60,
                    secs % 60
                )
            }
            Value::Opaque(data) => write!(f, "Opaque(0x{})", hex(data)),
            Value::Counter64(v) => write!(f, "{}", v),
            Value::NoSuchObject => write!(f, "noSuchObject"),
            Value::NoSuchInstance => write!(f, "noSuchInstance"),
            Value::EndOfMibView => write!(f, "endOfMibView"),
            Value::Unknown { tag, data } => {
                write!(f, "Unknown(tag=0x{:02X}, data=0x{})", tag, hex(data))
            }
        }
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::OctetString(Bytes::copy_from_slice(s.as_bytes()))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::OctetString(Bytes::from(s))
    }
}

impl From<&[u8]> for Value {
    fn from(data: &[u8]) -> Self {
        Value::OctetString(Bytes::copy_from_slice(data))
    }
}

impl From<Bytes> for Value {
    fn from(data: Bytes) -> Self {
        Value::OctetString(data)
    }
}

impl From<Oid> for Value {
    fn from(oid: Oid) -> Self {
        Value::ObjectIdentifier(oid)
    }
}

impl From<Ipv4Addr> for Value {
    fn from(addr: Ipv4Addr) -> Self {
        Value::IpAddress(addr.octets())
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::Counter64(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(value: &Value) -> Bytes {
        let mut buf = EncodeBuf::new();
        value.encode(&mut buf);
        buf.finish()
    }

    fn decode(bytes: &[u8]) -> Result<Value> {
        Value::decode(&mut Decoder::from_slice(bytes))
    }

    #[test]
    fn test_wire_forms() {
        assert_eq!(&encode(&Value::Integer(42))[..], &[0x02, 0x01, 0x2A]);
        assert_eq!(&encode(&Value::Gauge32(128))[..], &[0x42, 0x02, 0x00, 0x80]);
        assert_eq!(&encode(&Value::TimeTicks(0))[..], &[0x43, 0x01, 0x00]);
        assert_eq!(
            &encode(&Value::IpAddress([10, 0, 0, 1]))[..],
            &[0x40, 0x04, 10, 0, 0, 1]
        );
        assert_eq!(&encode(&Value::EndOfMibView)[..], &[0x82, 0x00]);
        assert_eq!(&encode(&Value::Opaque(Bytes::from_static(&[1, 2])))[..], &[0x44, 0x02, 1, 2]);
    }

    #[test]
    fn test_decode_exceptions() {
        assert_eq!(decode(&[0x80, 0x00]).unwrap(), Value::NoSuchObject);
        assert_eq!(decode(&[0x81, 0x00]).unwrap(), Value::NoSuchInstance);
        assert_eq!(decode(&[0x82, 0x00]).unwrap(), Value::EndOfMibView);
    }

    #[test]
    fn test_constructed_octet_string_rejected() {
        let err = decode(&[0x24, 0x03, 0x04, 0x01, 0x41]).unwrap_err();
        assert!(matches!(
            err,
            Error::Decode {
                kind: DecodeErrorKind::ConstructedOctetString,
                ..
            }
        ));
    }

    #[test]
    fn test_null_with_content_rejected() {
        assert!(decode(&[0x05, 0x01, 0x00]).is_err());
    }

    #[test]
    fn test_unknown_tag_preserved() {
        let v = decode(&[0x47, 0x01, 0x09]).unwrap();
        assert_eq!(
            v,
            Value::Unknown {
                tag: 0x47,
                data: Bytes::from_static(&[0x09])
            }
        );
    }

    #[test]
    fn test_accessors() {
        assert_eq!(Value::Integer(-1).as_u32(), None);
        assert_eq!(Value::Gauge32(7).as_u64(), Some(7));
        assert_eq!(Value::from("hi").as_str(), Some("hi"));
        assert_eq!(
            Value::from(Ipv4Addr::new(192, 0, 2, 1)).as_ip(),
            Some(Ipv4Addr::new(192, 0, 2, 1))
        );
        assert!(Value::NoSuchInstance.is_exception());
        assert!(!Value::Null.is_exception());
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::TimeTicks(9_006_100).to_string(), "1d 1h 1m 1s");
        assert_eq!(Value::OctetString(Bytes::from_static(&[0xFF])).to_string(), "0xff");
    }
}
