//! BER encoding.
//!
//! Content is written back to front: a constructed value encodes its children
//! first, then prepends its own length and tag. Children of a SEQUENCE must
//! therefore be pushed in reverse order.

use super::length::encode_length;
use super::tag;
use crate::oid::Oid;
use bytes::Bytes;

/// Reverse-order BER writer.
pub struct EncodeBuf {
    buf: Vec<u8>,
}

impl EncodeBuf {
    /// Create an encode buffer sized for one SNMP datagram.
    pub fn new() -> Self {
        Self::with_capacity(crate::MAX_PACKET_SIZE)
    }

    /// Create an encode buffer with specified capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    /// Prepend raw content octets.
    pub fn push_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend(bytes.iter().rev());
    }

    /// Prepend a BER length.
    pub fn push_length(&mut self, len: usize) {
        let (bytes, count) = encode_length(len);
        self.buf.extend_from_slice(&bytes[..count]);
    }

    /// Prepend a tag octet.
    pub fn push_tag(&mut self, tag: u8) {
        self.buf.push(tag);
    }

    /// Bytes written so far.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Encode a constructed value whose content is produced by `f`.
    pub fn push_constructed<F>(&mut self, tag: u8, f: F)
    where
        F: FnOnce(&mut Self),
    {
        let start_len = self.len();
        f(self);
        let content_len = self.len() - start_len;
        self.push_length(content_len);
        self.push_tag(tag);
    }

    /// Encode a SEQUENCE.
    pub fn push_sequence<F>(&mut self, f: F)
    where
        F: FnOnce(&mut Self),
    {
        self.push_constructed(tag::universal::SEQUENCE, f);
    }

    /// Encode an INTEGER.
    pub fn push_integer(&mut self, value: i32) {
        let (arr, len) = encode_integer_stack(value);
        self.push_bytes(&arr[4 - len..]);
        self.push_length(len);
        self.push_tag(tag::universal::INTEGER);
    }

    /// Encode a Counter64.
    pub fn push_counter64(&mut self, value: u64) {
        let (arr, len) = encode_unsigned_stack::<9>(value);
        self.push_bytes(&arr[9 - len..]);
        self.push_length(len);
        self.push_tag(tag::application::COUNTER64);
    }

    /// Encode an unsigned 32-bit application type (Counter32, Gauge32, TimeTicks).
    pub fn push_unsigned32(&mut self, tag: u8, value: u32) {
        let (arr, len) = encode_unsigned_stack::<5>(u64::from(value));
        self.push_bytes(&arr[5 - len..]);
        self.push_length(len);
        self.push_tag(tag);
    }

    /// Encode a primitive whose content is `data` under `tag`.
    pub fn push_tagged_bytes(&mut self, tag: u8, data: &[u8]) {
        self.push_bytes(data);
        self.push_length(data.len());
        self.push_tag(tag);
    }

    /// Encode an OCTET STRING.
    pub fn push_octet_string(&mut self, data: &[u8]) {
        self.push_tagged_bytes(tag::universal::OCTET_STRING, data);
    }

    /// Encode a NULL.
    pub fn push_null(&mut self) {
        self.push_length(0);
        self.push_tag(tag::universal::NULL);
    }

    /// Encode an OBJECT IDENTIFIER.
    pub fn push_oid(&mut self, oid: &Oid) {
        let ber = oid.to_ber_smallvec();
        self.push_tagged_bytes(tag::universal::OBJECT_IDENTIFIER, &ber);
    }

    /// Encode an IpAddress.
    pub fn push_ip_address(&mut self, addr: [u8; 4]) {
        self.push_tagged_bytes(tag::application::IP_ADDRESS, &addr);
    }

    /// Finalize and return the encoded bytes in wire order.
    pub fn finish(mut self) -> Bytes {
        self.buf.reverse();
        Bytes::from(self.buf)
    }

    /// Copy the encoding into `out` in wire order.
    ///
    /// Returns the number of bytes written, or `0` when the encoding does not
    /// fit. Nothing is written in that case.
    pub fn finish_into(self, out: &mut [u8]) -> usize {
        let len = self.buf.len();
        let Some(dst) = out.get_mut(..len) else {
            return 0;
        };
        for (d, s) in dst.iter_mut().zip(self.buf.iter().rev()) {
            *d = *s;
        }
        len
    }
}

impl Default for EncodeBuf {
    fn default() -> Self {
        Self::new()
    }
}

/// Minimal two's-complement INTEGER content.
///
/// The valid bytes are at the END of the array (for reverse-buffer compatibility).
#[inline]
fn encode_integer_stack(value: i32) -> ([u8; 4], usize) {
    let bytes = value.to_be_bytes();

    let mut start = 0;
    if value >= 0 {
        while start < 3 && bytes[start] == 0 && bytes[start + 1] & 0x80 == 0 {
            start += 1;
        }
    } else {
        while start < 3 && bytes[start] == 0xFF && bytes[start + 1] & 0x80 != 0 {
            start += 1;
        }
    }

    (bytes, 4 - start)
}

/// Minimal unsigned content with a 0x00 pad when the top bit is set.
///
/// `N` is the width of the value in bytes plus one for the pad.
#[inline]
fn encode_unsigned_stack<const N: usize>(value: u64) -> ([u8; N], usize) {
    let width = N - 1;
    let mut out = [0u8; N];
    let be = value.to_be_bytes();
    out[1..].copy_from_slice(&be[8 - width..]);

    let mut start = 1;
    while start < N - 1 && out[start] == 0 {
        start += 1;
    }
    if out[start] & 0x80 != 0 {
        start -= 1;
    }
    (out, N - start)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_integer(value: i32) -> Vec<u8> {
        let (arr, len) = encode_integer_stack(value);
        arr[4 - len..].to_vec()
    }

    fn encode_unsigned32(value: u32) -> Vec<u8> {
        let (arr, len) = encode_unsigned_stack::<5>(u64::from(value));
        arr[5 - len..].to_vec()
    }

    fn encode_counter64(value: u64) -> Vec<u8> {
        let (arr, len) = encode_unsigned_stack::<9>(value);
        arr[9 - len..].to_vec()
    }

    #[test]
    fn test_encode_integer() {
        assert_eq!(encode_integer(0), vec![0]);
        assert_eq!(encode_integer(127), vec![127]);
        assert_eq!(encode_integer(128), vec![0, 128]);
        assert_eq!(encode_integer(-1), vec![0xFF]);
        assert_eq!(encode_integer(-128), vec![0x80]);
        assert_eq!(encode_integer(-129), vec![0xFF, 0x7F]);
    }

    #[test]
    fn test_encode_unsigned32() {
        assert_eq!(encode_unsigned32(0), vec![0]);
        assert_eq!(encode_unsigned32(127), vec![127]);
        assert_eq!(encode_unsigned32(128), vec![0, 128]);
        assert_eq!(encode_unsigned32(256), vec![1, 0]);
        assert_eq!(encode_unsigned32(u32::MAX), vec![0, 0xFF, 0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn test_encode_counter64() {
        assert_eq!(encode_counter64(0), vec![0]);
        assert_eq!(encode_counter64(1 << 32), vec![1, 0, 0, 0, 0]);
        assert_eq!(encode_counter64(u64::MAX), {
            let mut v = vec![0];
            v.extend([0xFF; 8]);
            v
        });
    }

    #[test]
    fn test_encode_sequence() {
        let mut buf = EncodeBuf::new();
        buf.push_sequence(|buf| {
            // Reverse buffer: push in reverse order for forward output
            buf.push_integer(2);
            buf.push_integer(1);
        });
        let bytes = buf.finish();
        assert_eq!(
            &bytes[..],
            &[0x30, 0x06, 0x02, 0x01, 0x01, 0x02, 0x01, 0x02]
        );
    }

    #[test]
    fn test_finish_into_respects_capacity() {
        let mut buf = EncodeBuf::new();
        buf.push_octet_string(b"public");
        let mut small = [0u8; 4];
        assert_eq!(buf.finish_into(&mut small), 0);
        assert_eq!(small, [0u8; 4]);

        let mut buf = EncodeBuf::new();
        buf.push_octet_string(b"public");
        let mut out = [0u8; 16];
        assert_eq!(buf.finish_into(&mut out), 8);
        assert_eq!(&out[..8], b"\x04\x06public");
    }
}
