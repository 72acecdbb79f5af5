#![no_main]

use libfuzzer_sys::fuzz_target;

use snmp_engine::oid::Oid;

fuzz_target!(|data: &[u8]| {
    // BER content octets
    let _ = Oid::from_ber(data);

    // Dotted notation
    if let Ok(s) = std::str::from_utf8(data) {
        let _ = Oid::parse(s);
    }
});
