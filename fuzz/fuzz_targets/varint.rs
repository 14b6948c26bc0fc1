#![no_main]

use libfuzzer_sys::fuzz_target;

// Fuzz target: varint decoding.
//
// Decoding must never panic on arbitrary bytes, and whatever decodes
// must re-encode to the bytes that were consumed.
fuzz_target!(|data: &[u8]| {
    if let Ok((value, consumed)) = o5m_wire::varint::decode_uvarint(data) {
        let mut buf = [0u8; o5m_wire::varint::MAX_VARINT_BYTES];
        let len = o5m_wire::varint::encode_uvarint(value, &mut buf);
        // Canonical encodings roundtrip exactly; non-canonical input
        // (redundant trailing zero groups) may re-encode shorter.
        assert!(len <= consumed);
        let (again, _) = o5m_wire::varint::decode_uvarint(&buf[..len]).unwrap();
        assert_eq!(again, value);
    }

    if let Ok((value, _)) = o5m_wire::varint::decode_svarint(data) {
        let roundtrip = o5m_wire::varint::zigzag_decode(o5m_wire::varint::zigzag_encode(value));
        assert_eq!(roundtrip, value);
    }
});
