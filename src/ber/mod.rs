//! BER (Basic Encoding Rules) primitives for SNMP v1/v2c.
//!
//! Encoding writes into a reverse buffer so lengths never need to be
//! precomputed. Decoding is bounds-checked everywhere and reports the byte
//! offset of the first problem.

mod decode;
mod encode;
mod length;
pub mod tag;

pub use decode::Decoder;
pub use encode::EncodeBuf;
pub use length::{MAX_LENGTH, decode_length, encode_length};
