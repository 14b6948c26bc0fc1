use crate::error::WireError;

/// Magic prefix of every o5m/o5c file: `0xFF 0xE0 0x04 'o' '5'`.
///
/// The leading `0xFF` is the o5m reset dataset, so even a tool that does
/// not understand the header resynchronises its delta state at byte 0.
pub const O5M_MAGIC: [u8; 5] = [0xFF, 0xE0, 0x04, b'o', b'5'];

/// Variant byte of a data file (`.o5m`).
pub const VARIANT_DATA: u8 = b'm';

/// Variant byte of a change file (`.o5c`).
pub const VARIANT_CHANGE: u8 = b'c';

/// The only supported format version byte.
pub const FORMAT_VERSION: u8 = b'2';

/// Total length of the file prelude: magic + variant + version.
pub const PRELUDE_LEN: usize = O5M_MAGIC.len() + 2;

/// Which flavour of file the prelude announced.
///
/// A change file carries multiple versions of the same object, which the
/// decoder records on the file header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileVariant {
    /// `.o5m` data file: one version per object.
    Data,
    /// `.o5c` change file: may carry multiple versions per object.
    Change,
}

impl FileVariant {
    /// Does this variant imply multiple versions of the same object?
    #[must_use]
    pub fn has_multiple_object_versions(self) -> bool {
        matches!(self, FileVariant::Change)
    }
}

/// Parse the 7-byte file prelude.
///
/// The three parts are checked left to right, each with its own error,
/// so a truncated download, a renamed PBF file, and a future format
/// revision all produce distinguishable diagnostics.
///
/// # Errors
///
/// - [`WireError::UnexpectedEof`] if fewer than [`PRELUDE_LEN`] bytes are given.
/// - [`WireError::InvalidMagic`] if the magic does not match.
/// - [`WireError::InvalidVariant`] if the variant byte is not `m`/`c`.
/// - [`WireError::UnsupportedVersion`] if the version byte is not `'2'`.
pub fn parse_prelude(buf: &[u8]) -> Result<FileVariant, WireError> {
    if buf.len() < PRELUDE_LEN {
        return Err(WireError::UnexpectedEof { offset: buf.len() });
    }

    if buf[..5] != O5M_MAGIC {
        let mut found = [0u8; 5];
        found.copy_from_slice(&buf[..5]);
        return Err(WireError::InvalidMagic { found });
    }

    let variant = match buf[5] {
        VARIANT_DATA => FileVariant::Data,
        VARIANT_CHANGE => FileVariant::Change,
        other => return Err(WireError::InvalidVariant { found: other }),
    };

    if buf[6] != FORMAT_VERSION {
        return Err(WireError::UnsupportedVersion { found: buf[6] });
    }

    Ok(variant)
}
