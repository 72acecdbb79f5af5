#![no_main]

use bytes::Bytes;
use libfuzzer_sys::fuzz_target;

use snmp_engine::ber::Decoder;
use snmp_engine::value::Value;
use snmp_engine::varbind::{VarBind, decode_varbind_list};

fuzz_target!(|data: &[u8]| {
    let bytes = Bytes::copy_from_slice(data);

    let mut decoder = Decoder::new(bytes.clone());
    let _ = decoder.read_integer();

    let mut decoder = Decoder::new(bytes.clone());
    let _ = decoder.read_octet_string();

    let mut decoder = Decoder::new(bytes.clone());
    let _ = decoder.read_oid();

    let mut decoder = Decoder::new(bytes.clone());
    let _ = decoder.read_ip_address();

    let mut decoder = Decoder::new(bytes.clone());
    let _ = Value::decode(&mut decoder);

    let mut decoder = Decoder::new(bytes.clone());
    let _ = VarBind::decode(&mut decoder);

    let mut decoder = Decoder::new(bytes);
    let _ = decode_varbind_list(&mut decoder);
});
