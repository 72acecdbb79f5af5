#![no_main]

use libfuzzer_sys::fuzz_target;

use snmp_engine::codec;

fuzz_target!(|data: &[u8]| {
    // Whatever decodes must re-encode into a packet-sized buffer or report 0.
    if let Ok(message) = codec::decode(data) {
        let mut buf = [0u8; snmp_engine::MAX_PACKET_SIZE];
        let n = codec::encode(&message, &mut buf);
        assert!(n <= buf.len());
    }
});
