//! BER definite-length encoding (X.690 Section 8.1.3).
//!
//! Indefinite lengths (0x80) never appear in SNMP and are rejected.

use crate::error::{DecodeErrorKind, Error, Result};

/// Largest length the decoder accepts.
///
/// Nothing an SNMP engine receives comes close; a larger claim is a
/// malformed or hostile datagram.
pub const MAX_LENGTH: usize = 0xFFFF;

/// Encode a length for the reverse encode buffer.
///
/// Returns the octets in reverse order and how many of them are used.
pub fn encode_length(len: usize) -> ([u8; 5], usize) {
    let mut buf = [0u8; 5];

    if len <= 127 {
        buf[0] = len as u8;
        return (buf, 1);
    }

    let mut count = 0;
    let mut rest = len;
    while rest > 0 && count < 4 {
        buf[count] = rest as u8;
        rest >>= 8;
        count += 1;
    }
    buf[count] = 0x80 | count as u8;
    (buf, count + 1)
}

/// Decode a length, returning `(length, bytes_consumed)`.
///
/// `base_offset` is where `data` starts inside the datagram, for error reporting.
pub fn decode_length(data: &[u8], base_offset: usize) -> Result<(usize, usize)> {
    let Some(&first) = data.first() else {
        return Err(Error::decode(base_offset, DecodeErrorKind::TruncatedData));
    };

    if first == 0x80 {
        return Err(Error::decode(
            base_offset,
            DecodeErrorKind::IndefiniteLength,
        ));
    }

    if first & 0x80 == 0 {
        return Ok((first as usize, 1));
    }

    let num_octets = (first & 0x7F) as usize;
    if num_octets > 4 {
        return Err(Error::decode(
            base_offset,
            DecodeErrorKind::LengthTooLong { octets: num_octets },
        ));
    }
    let Some(octets) = data.get(1..1 + num_octets) else {
        return Err(Error::decode(base_offset, DecodeErrorKind::TruncatedData));
    };

    let len = octets
        .iter()
        .fold(0usize, |acc, &b| (acc << 8) | b as usize);

    if len > MAX_LENGTH {
        return Err(Error::decode(
            base_offset,
            DecodeErrorKind::LengthExceedsMax {
                length: len,
                max: MAX_LENGTH,
            },
        ));
    }

    Ok((len, 1 + num_octets))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn forward(len: usize) -> Vec<u8> {
        let (buf, count) = encode_length(len);
        buf[..count].iter().rev().copied().collect()
    }

    #[test]
    fn test_short_form() {
        assert_eq!(forward(0), vec![0x00]);
        assert_eq!(forward(127), vec![0x7F]);
        assert_eq!(decode_length(&[0x7F], 0).unwrap(), (127, 1));
    }

    #[test]
    fn test_long_form() {
        assert_eq!(forward(128), vec![0x81, 0x80]);
        assert_eq!(forward(256), vec![0x82, 0x01, 0x00]);
        assert_eq!(decode_length(&[0x81, 0x80], 0).unwrap(), (128, 2));
        assert_eq!(decode_length(&[0x82, 0x01, 0x00], 0).unwrap(), (256, 3));
    }

    #[test]
    fn test_rejects_indefinite() {
        let err = decode_length(&[0x80], 7).unwrap_err();
        assert!(matches!(
            err,
            Error::Decode {
                offset: 7,
                kind: DecodeErrorKind::IndefiniteLength
            }
        ));
    }

    #[test]
    fn test_rejects_truncated_long_form() {
        assert!(decode_length(&[0x82, 0x01], 0).is_err());
        assert!(decode_length(&[], 0).is_err());
    }

    #[test]
    fn test_rejects_oversized() {
        assert!(decode_length(&[0x83, 0x01, 0x00, 0x00], 0).is_err());
        assert!(decode_length(&[0x85, 1, 1, 1, 1, 1], 0).is_err());
    }

    #[test]
    fn test_long_form_with_zero_octets_is_zero() {
        // 0x80 is indefinite, but 0x81 0x00 is a legal (non-minimal) zero
        assert_eq!(decode_length(&[0x81, 0x00], 0).unwrap(), (0, 2));
    }
}
