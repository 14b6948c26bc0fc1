/// Errors raised by the packed item store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A reservation could not be satisfied in a buffer that is not
    /// allowed to grow.
    #[error("buffer is full: {requested} bytes requested, {available} available")]
    BufferFull { requested: usize, available: usize },

    /// A byte length handed to the store was not a multiple of the
    /// record alignment.
    #[error("size {size} is not a multiple of the record alignment")]
    Misaligned { size: usize },

    /// A record header in externally supplied bytes was truncated,
    /// carried an unknown kind tag, or pointed past the end of the data.
    #[error("truncated or corrupt record at offset {offset}")]
    CorruptRecord { offset: usize },

    /// A single record payload exceeded the 24-bit length field.
    #[error("item payload of {size} bytes exceeds the record size limit")]
    ItemTooLarge { size: usize },

    /// A string component (user name, role, tag key or value) exceeded
    /// the 16-bit length field of the record layout.
    #[error("string of {len} bytes exceeds the record field limit")]
    StringTooLong { len: usize },
}
