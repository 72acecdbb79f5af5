//! Codec boundary between the engines and the wire.
//!
//! The engines never touch BER directly. Inbound datagrams go through
//! [`decode`], outbound messages through [`encode`], which writes straight
//! into the engine's packet buffer.

use crate::ber::EncodeBuf;
use crate::error::{DecodeErrorKind, Error};
use crate::message::Message;
use bytes::Bytes;

/// Why a datagram could not be decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// Not a well-formed v1/v2c message.
    #[error("malformed message")]
    Malformed,
    /// Well-formed framing, but a version this engine does not speak.
    #[error("unsupported SNMP version")]
    VersionUnsupported,
}

impl From<Error> for CodecError {
    fn from(err: Error) -> Self {
        match err {
            Error::Decode {
                kind: DecodeErrorKind::UnknownVersion(_),
                ..
            } => CodecError::VersionUnsupported,
            _ => CodecError::Malformed,
        }
    }
}

/// Decode one datagram.
pub fn decode(data: &[u8]) -> Result<Message, CodecError> {
    Ok(Message::decode(Bytes::copy_from_slice(data))?)
}

/// Encode `message` into `out`.
///
/// Returns the number of bytes written, or `0` when the encoding does not
/// fit. `out` is left untouched in that case.
pub fn encode(message: &Message, out: &mut [u8]) -> usize {
    let mut buf = EncodeBuf::with_capacity(out.len());
    message.encode_into(&mut buf);
    buf.finish_into(out)
}
