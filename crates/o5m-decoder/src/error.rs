use o5m_store::StoreError;
use o5m_wire::WireError;

/// Errors terminating an o5m decode.
///
/// Every decoding error is fatal to the current stream: there is no
/// partial-record recovery. The producer surfaces the error as its
/// terminal status.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// The file prelude (magic, variant byte, version byte) failed
    /// validation; the wrapped [`WireError`] says which part.
    #[error("malformed o5m header: {0}")]
    Header(WireError),

    /// The input ended mid-dataset or mid-varint.
    #[error("premature end of input")]
    PrematureEnd,

    /// A varint ran past the 10-byte limit without terminating.
    #[error("varint exceeded the 10-byte limit")]
    VarintOverflow,

    /// A numeric field (uid, version, coordinate) left its representable
    /// domain.
    #[error("field {field} out of range")]
    FieldOutOfRange { field: &'static str },

    /// An expected NUL terminator was missing inside the payload, or a
    /// string reference appeared where none is allowed.
    #[error("malformed string: {0}")]
    StringMalformed(&'static str),

    /// A reference table index of 0, above 15 000, or beyond the live
    /// entries of the table.
    #[error("invalid string reference (index {index})")]
    ReferenceInvalid { index: u64 },

    /// A relation member type character outside `'0'..='2'`.
    #[error("unknown relation member type {found:#04X}")]
    UnknownMemberType { found: u8 },

    /// A sub-section length spilled past the end of its outer payload.
    #[error("section length spills past the payload end")]
    PayloadLengthMismatch,

    /// No parser constructor registered for the requested format tag.
    #[error("unknown input format {0:?}")]
    UnknownFormat(String),

    /// The downstream consumer hung up; the producer stopped on its next
    /// hand-off.
    #[error("downstream consumer hung up")]
    Cancelled,

    /// The output store refused a write (for instance a fixed buffer
    /// filled up).
    #[error(transparent)]
    Store(#[from] StoreError),

    /// An I/O error from the upstream byte source.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<WireError> for DecodeError {
    fn from(e: WireError) -> Self {
        match e {
            WireError::VarintTooLong => DecodeError::VarintOverflow,
            WireError::UnexpectedEof { .. } => DecodeError::PrematureEnd,
            other => DecodeError::Header(other),
        }
    }
}
