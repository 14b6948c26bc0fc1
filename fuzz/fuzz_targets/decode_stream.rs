#![no_main]

use libfuzzer_sys::fuzz_target;
use o5m_decoder::{O5mDecoder, ReaderOptions};

// Fuzz target: the full decoder entry point on arbitrary input bytes.
//
// Catches panics in:
// - prelude validation (magic, variant, version)
// - dataset framing (length varints, marker classification)
// - metadata, user-block and tag decoding
// - reference table indexing
// - delta accumulation (must wrap, not overflow)
// - record building in the packed buffer
fuzz_target!(|data: &[u8]| {
    let options = ReaderOptions {
        // Small buffers so growth and chaining run constantly.
        buffer_capacity: 256,
        ..ReaderOptions::default()
    };
    let _ = O5mDecoder::decode(data, &options);
});
