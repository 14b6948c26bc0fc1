/// Errors raised by the byte-level wire primitives.
///
/// These stay deliberately low-level: they describe what went wrong with
/// the raw bytes, not what the decoder was trying to parse at the time.
/// The decoder crate wraps them with that context.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    /// No terminating varint group within the 10-byte limit.
    #[error("unterminated varint (more than 10 bytes)")]
    VarintTooLong,

    /// The input ran out mid-field; `offset` is where reading stopped.
    #[error("input ended early at offset {offset}")]
    UnexpectedEof { offset: usize },

    /// The 5-byte file magic did not match `FF E0 04 6F 35`.
    #[error("invalid o5m magic: got {found:02X?}")]
    InvalidMagic { found: [u8; 5] },

    /// The variant byte was neither `m` (data) nor `c` (change).
    #[error("invalid o5m file variant byte {found:#04X}, expected 'm' or 'c'")]
    InvalidVariant { found: u8 },

    /// The format version byte was not `'2'`.
    #[error("unsupported o5m format version byte {found:#04X}, expected '2'")]
    UnsupportedVersion { found: u8 },
}
