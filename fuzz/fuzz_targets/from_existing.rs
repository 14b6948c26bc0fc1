#![no_main]

use libfuzzer_sys::fuzz_target;
use o5m_store::PackedItemBuffer;

// Fuzz target: reloading arbitrary bytes as a packed buffer.
//
// The record-framing validation must reject garbage without panicking,
// and whatever validates must be walkable end to end. Field-level views
// are out of contract here: framing validation does not vouch for
// payload content, only records written by this crate do.
fuzz_target!(|data: &[u8]| {
    if let Ok(buffer) = PackedItemBuffer::from_existing(data.to_vec()) {
        let mut total = 0;
        for item in &buffer {
            let _ = item.kind();
            let _ = item.removed();
            total += item.padded_size();
        }
        assert!(total <= buffer.committed());
    }
});
