/// Dataset type bytes as they appear on the wire.
///
/// Everything at `0xEF` and below is framed as
/// `<type:1><length:uvarint><payload:length bytes>`; everything above
/// `0xEF` is a bare one-byte marker with no length and no payload.
pub mod dataset_type {
    pub const NODE: u8 = 0x10;
    pub const WAY: u8 = 0x11;
    pub const RELATION: u8 = 0x12;
    pub const BOUNDING_BOX: u8 = 0xDB;
    pub const TIMESTAMP: u8 = 0xDC;
    pub const FILE_HEADER: u8 = 0xE0;
    pub const SYNC: u8 = 0xEE;
    pub const JUMP: u8 = 0xEF;
    pub const RESET: u8 = 0xFF;
}

/// Highest type byte that still carries a length-prefixed payload.
pub const MAX_PAYLOAD_TYPE: u8 = dataset_type::JUMP;

/// A classified dataset type byte.
///
/// `Unknown` covers length-prefixed datasets this decoder does not
/// interpret (their payload is skipped); `UnknownMarker` covers bare
/// marker bytes above `0xEF` other than reset (ignored entirely).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dataset {
    Node,
    Way,
    Relation,
    BoundingBox,
    Timestamp,
    FileHeader,
    Sync,
    Jump,
    Reset,
    Unknown(u8),
    UnknownMarker(u8),
}

impl Dataset {
    /// Classify a raw dataset type byte.
    #[must_use]
    pub fn from_type_byte(byte: u8) -> Self {
        match byte {
            dataset_type::NODE => Dataset::Node,
            dataset_type::WAY => Dataset::Way,
            dataset_type::RELATION => Dataset::Relation,
            dataset_type::BOUNDING_BOX => Dataset::BoundingBox,
            dataset_type::TIMESTAMP => Dataset::Timestamp,
            dataset_type::FILE_HEADER => Dataset::FileHeader,
            dataset_type::SYNC => Dataset::Sync,
            dataset_type::JUMP => Dataset::Jump,
            dataset_type::RESET => Dataset::Reset,
            other if other <= MAX_PAYLOAD_TYPE => Dataset::Unknown(other),
            other => Dataset::UnknownMarker(other),
        }
    }

    /// Is this dataset followed by a `length:uvarint` and payload?
    #[must_use]
    pub fn has_payload(self) -> bool {
        !matches!(self, Dataset::Reset | Dataset::UnknownMarker(_))
    }
}
