use crate::error::DecodeError;

/// Number of slots in the reference table, fixed by the o5m format.
pub const TABLE_ENTRIES: usize = 15_000;

/// Size of one slot in bytes, fixed by the o5m format.
pub const ENTRY_SIZE: usize = 256;

/// Longest string eligible for interning, terminating NUL bytes
/// included. Longer strings are handed to the caller but never become
/// referable.
pub const MAX_STRING_LEN: usize = 250 + 2;

/// The o5m string dictionary: a FIFO ring of 15 000 slots of 256 bytes.
///
/// Short inline strings are copied into the slot under the write cursor
/// as they are decoded; later datasets refer back to them with a
/// positive index, 1 meaning "the most recently inserted string". Slots
/// are reused in insertion order once the ring wraps.
///
/// The backing store is allocated lazily on first insert. The table
/// lives inside a parser that may be moved to its worker thread before
/// it starts, and an empty table keeps that move trivially cheap.
#[derive(Clone, Debug, Default)]
pub struct ReferenceTable {
    table: Vec<u8>,
    current: usize,
    live: usize,
}

impl ReferenceTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget all entries. The backing store is kept for reuse.
    pub fn clear(&mut self) {
        self.current = 0;
        self.live = 0;
    }

    /// Insert a string at the write cursor.
    ///
    /// Strings longer than [`MAX_STRING_LEN`] are silently not inserted;
    /// they never become referable and the cursor does not move.
    pub fn add(&mut self, bytes: &[u8]) {
        if bytes.len() > MAX_STRING_LEN {
            return;
        }
        if self.table.is_empty() {
            self.table = vec![0u8; TABLE_ENTRIES * ENTRY_SIZE];
        }

        let slot = &mut self.table[self.current * ENTRY_SIZE..(self.current + 1) * ENTRY_SIZE];
        slot[..bytes.len()].copy_from_slice(bytes);
        slot[bytes.len()..].fill(0);

        self.current = (self.current + 1) % TABLE_ENTRIES;
        self.live = (self.live + 1).min(TABLE_ENTRIES);
    }

    /// Fetch the `index`-th most recently inserted string still in the
    /// table (1 = newest).
    ///
    /// The returned slice is the full slot; the caller reinterprets it
    /// according to context (tag pair, user block, role) using the NUL
    /// separators stored with the content.
    ///
    /// # Errors
    ///
    /// [`DecodeError::ReferenceInvalid`] for index 0, an index above
    /// [`TABLE_ENTRIES`], or an index beyond the live entries.
    pub fn get(&self, index: u64) -> Result<&[u8], DecodeError> {
        if index == 0 || index > self.live as u64 {
            return Err(DecodeError::ReferenceInvalid { index });
        }
        let index = index as usize;
        let slot = (self.current + TABLE_ENTRIES - index) % TABLE_ENTRIES;
        Ok(&self.table[slot * ENTRY_SIZE..(slot + 1) * ENTRY_SIZE])
    }
}
