#![no_main]

use bytes::Bytes;
use libfuzzer_sys::fuzz_target;

use snmp_engine::ber::Decoder;
use snmp_engine::message::Message;
use snmp_engine::pdu::{Pdu, TrapV1Pdu};

fuzz_target!(|data: &[u8]| {
    let bytes = Bytes::copy_from_slice(data);

    let _ = Message::decode(bytes.clone());

    let mut decoder = Decoder::new(bytes.clone());
    let _ = Pdu::decode(&mut decoder);

    let mut decoder = Decoder::new(bytes);
    let _ = TrapV1Pdu::decode(&mut decoder);
});
