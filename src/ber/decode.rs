//! BER decoding.
//!
//! Zero-copy decoding over `Bytes`. Every read is bounds-checked; a failure
//! carries the absolute byte offset within the datagram.

use super::length::decode_length;
use super::tag;
use crate::error::{DecodeErrorKind, Error, Result};
use crate::oid::Oid;
use bytes::Bytes;

/// BER decoder that reads from a byte buffer.
pub struct Decoder {
    data: Bytes,
    offset: usize,
    /// Offset of `data[0]` inside the outermost buffer.
    base: usize,
}

impl Decoder {
    /// Create a new decoder from bytes.
    pub fn new(data: Bytes) -> Self {
        Self {
            data,
            offset: 0,
            base: 0,
        }
    }

    /// Create a decoder from a byte slice (copies the data).
    pub fn from_slice(data: &[u8]) -> Self {
        Self::new(Bytes::copy_from_slice(data))
    }

    /// Absolute offset of the next byte.
    pub fn offset(&self) -> usize {
        self.base + self.offset
    }

    /// Get remaining bytes.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    /// Check if we've reached the end.
    pub fn is_empty(&self) -> bool {
        self.offset >= self.data.len()
    }

    /// Peek at the next tag without consuming it.
    pub fn peek_tag(&self) -> Option<u8> {
        self.data.get(self.offset).copied()
    }

    fn fail(&self, kind: DecodeErrorKind) -> Error {
        tracing::debug!(target: "snmp_engine::ber", { snmp.offset = %self.offset(), kind = %kind }, "decode error");
        Error::decode(self.offset(), kind)
    }

    /// Read a tag byte.
    pub fn read_tag(&mut self) -> Result<u8> {
        let Some(&byte) = self.data.get(self.offset) else {
            return Err(self.fail(DecodeErrorKind::TruncatedData));
        };
        self.offset += 1;
        Ok(byte)
    }

    /// Read a definite length.
    pub fn read_length(&mut self) -> Result<usize> {
        let (len, consumed) = decode_length(&self.data[self.offset..], self.offset())?;
        self.offset += consumed;
        Ok(len)
    }

    /// Read raw bytes without copying.
    pub fn read_bytes(&mut self, len: usize) -> Result<Bytes> {
        if len > self.remaining() {
            return Err(self.fail(DecodeErrorKind::InsufficientData {
                needed: len,
                available: self.remaining(),
            }));
        }
        let bytes = self.data.slice(self.offset..self.offset + len);
        self.offset += len;
        Ok(bytes)
    }

    /// Read and expect a specific tag, returning the content length.
    pub fn expect_tag(&mut self, expected: u8) -> Result<usize> {
        let tag = self.read_tag()?;
        if tag != expected {
            self.offset -= 1;
            return Err(self.fail(DecodeErrorKind::UnexpectedTag {
                expected,
                actual: tag,
            }));
        }
        self.read_length()
    }

    /// Read a BER INTEGER.
    pub fn read_integer(&mut self) -> Result<i32> {
        let len = self.expect_tag(tag::universal::INTEGER)?;
        self.read_integer_value(len)
    }

    /// Read INTEGER content of `len` octets.
    pub fn read_integer_value(&mut self, len: usize) -> Result<i32> {
        if len == 0 {
            return Err(self.fail(DecodeErrorKind::ZeroLengthInteger));
        }
        if len > 4 {
            return Err(self.fail(DecodeErrorKind::IntegerOverflow));
        }

        let bytes = self.read_bytes(len)?;
        let seed: i32 = if bytes[0] & 0x80 != 0 { -1 } else { 0 };
        Ok(bytes
            .iter()
            .fold(seed, |acc, &b| (acc << 8) | i32::from(b)))
    }

    /// Read unsigned content of `len` octets that must fit in `max_bits`.
    fn read_unsigned_value(&mut self, len: usize, max_bits: u32) -> Result<u64> {
        if len == 0 {
            return Err(self.fail(DecodeErrorKind::ZeroLengthInteger));
        }
        let max_len = (max_bits / 8) as usize + 1;
        if len > max_len {
            return Err(self.fail(DecodeErrorKind::Integer64TooLong { length: len }));
        }

        let bytes = self.read_bytes(len)?;
        let mut value: u64 = 0;
        for &b in bytes.iter() {
            if value >> (max_bits - 8) != 0 {
                return Err(self.fail(DecodeErrorKind::IntegerOverflow));
            }
            value = (value << 8) | u64::from(b);
        }
        Ok(value)
    }

    /// Read Counter32/Gauge32/TimeTicks content of `len` octets.
    pub fn read_unsigned32_value(&mut self, len: usize) -> Result<u32> {
        let value = self.read_unsigned_value(len, 32)?;
        u32::try_from(value).map_err(|_| self.fail(DecodeErrorKind::IntegerOverflow))
    }

    /// Read Counter64 content of `len` octets.
    pub fn read_counter64_value(&mut self, len: usize) -> Result<u64> {
        self.read_unsigned_value(len, 64)
    }

    /// Read an OCTET STRING.
    pub fn read_octet_string(&mut self) -> Result<Bytes> {
        let len = self.expect_tag(tag::universal::OCTET_STRING)?;
        self.read_bytes(len)
    }

    /// Read a NULL.
    pub fn read_null(&mut self) -> Result<()> {
        let len = self.expect_tag(tag::universal::NULL)?;
        if len != 0 {
            return Err(self.fail(DecodeErrorKind::InvalidNull));
        }
        Ok(())
    }

    /// Read an OBJECT IDENTIFIER.
    pub fn read_oid(&mut self) -> Result<Oid> {
        let len = self.expect_tag(tag::universal::OBJECT_IDENTIFIER)?;
        self.read_oid_value(len)
    }

    /// Read OID content of `len` octets.
    pub fn read_oid_value(&mut self, len: usize) -> Result<Oid> {
        let start = self.offset();
        let bytes = self.read_bytes(len)?;
        Oid::from_ber(&bytes).map_err(|e| match e {
            Error::Decode { offset, kind } => Error::decode(start + offset, kind),
            other => other,
        })
    }

    /// Read an IpAddress.
    pub fn read_ip_address(&mut self) -> Result<[u8; 4]> {
        let len = self.expect_tag(tag::application::IP_ADDRESS)?;
        self.read_ip_address_value(len)
    }

    /// Read IpAddress content, which must be exactly four octets.
    pub fn read_ip_address_value(&mut self, len: usize) -> Result<[u8; 4]> {
        if len != 4 {
            return Err(self.fail(DecodeErrorKind::InvalidIpAddressLength { length: len }));
        }
        let bytes = self.read_bytes(4)?;
        Ok([bytes[0], bytes[1], bytes[2], bytes[3]])
    }

    /// Read a SEQUENCE, returning a decoder for its contents.
    pub fn read_sequence(&mut self) -> Result<Decoder> {
        self.read_constructed(tag::universal::SEQUENCE)
    }

    /// Read a constructed value with `expected_tag`, returning a decoder for its contents.
    pub fn read_constructed(&mut self, expected_tag: u8) -> Result<Decoder> {
        let len = self.expect_tag(expected_tag)?;
        self.sub_decoder(len)
    }

    /// Split off the next `len` bytes as their own decoder.
    pub fn sub_decoder(&mut self, len: usize) -> Result<Decoder> {
        let base = self.offset();
        let content = self.read_bytes(len)?;
        Ok(Decoder {
            data: content,
            offset: 0,
            base,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_integer() {
        let mut d = Decoder::from_slice(&[0x02, 0x02, 0xFF, 0x7F]);
        assert_eq!(d.read_integer().unwrap(), -129);
        assert!(d.is_empty());
    }

    #[test]
    fn test_read_integer_rejects_oversized() {
        let mut d = Decoder::from_slice(&[0x02, 0x05, 1, 2, 3, 4, 5]);
        assert!(d.read_integer().is_err());
    }

    #[test]
    fn test_read_unsigned32_with_pad() {
        let mut d = Decoder::from_slice(&[0x00, 0xFF, 0xFF, 0xFF, 0xFF]);
        assert_eq!(d.read_unsigned32_value(5).unwrap(), u32::MAX);
    }

    #[test]
    fn test_read_unsigned32_overflow() {
        let mut d = Decoder::from_slice(&[0x01, 0x00, 0x00, 0x00, 0x00]);
        assert!(d.read_unsigned32_value(5).is_err());
    }

    #[test]
    fn test_read_counter64() {
        let mut d = Decoder::from_slice(&[0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]);
        assert_eq!(d.read_counter64_value(9).unwrap(), u64::MAX);
    }

    #[test]
    fn test_unexpected_tag_reports_offset() {
        let mut d = Decoder::from_slice(&[0x02, 0x01, 0x00, 0x04, 0x00]);
        d.read_integer().unwrap();
        let err = d.read_null().unwrap_err();
        assert!(matches!(
            err,
            Error::Decode {
                offset: 3,
                kind: DecodeErrorKind::UnexpectedTag {
                    expected: 0x05,
                    actual: 0x04
                }
            }
        ));
    }

    #[test]
    fn test_sub_decoder_offsets_are_absolute() {
        // SEQUENCE { NULL, <truncated integer> }
        let mut d = Decoder::from_slice(&[0x30, 0x04, 0x05, 0x00, 0x02, 0x00]);
        let mut seq = d.read_sequence().unwrap();
        seq.read_null().unwrap();
        let err = seq.read_integer().unwrap_err();
        assert!(matches!(err, Error::Decode { offset: 6, .. }));
    }

    #[test]
    fn test_read_bytes_past_end() {
        let mut d = Decoder::from_slice(&[0x04, 0x10, b'a']);
        assert!(d.read_octet_string().is_err());
    }
}
