use o5m_wire::varint::{decode_svarint, decode_uvarint};

use crate::error::DecodeError;

/// Read cursor over one dataset payload.
///
/// `rest` hands out slices with the payload's own lifetime rather than
/// the cursor borrow, so decoded string slices stay usable while the
/// cursor keeps advancing.
pub(crate) struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn peek(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    pub fn rest(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }

    pub fn advance(&mut self, n: usize) {
        debug_assert!(n <= self.remaining());
        self.pos += n;
    }

    pub fn uvarint(&mut self) -> Result<u64, DecodeError> {
        let (value, consumed) = decode_uvarint(self.rest())?;
        self.pos += consumed;
        Ok(value)
    }

    pub fn svarint(&mut self) -> Result<i64, DecodeError> {
        let (value, consumed) = decode_svarint(self.rest())?;
        self.pos += consumed;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn varints_advance_the_cursor() {
        let mut cur = Cursor::new(&[0xAC, 0x02, 0x03, 0x07]);
        assert_eq!(cur.uvarint().unwrap(), 300);
        assert_eq!(cur.svarint().unwrap(), -2);
        assert_eq!(cur.remaining(), 1);
        assert_eq!(cur.peek(), Some(0x07));
    }

    #[test]
    fn truncated_varint_is_premature_end() {
        let mut cur = Cursor::new(&[0x80]);
        assert!(matches!(cur.uvarint(), Err(DecodeError::PrematureEnd)));
    }

    #[test]
    fn rest_outlives_cursor_moves() {
        let data = [1u8, 2, 3, 4];
        let mut cur = Cursor::new(&data);
        let rest = cur.rest();
        cur.advance(4);
        assert_eq!(rest, &[1, 2, 3, 4]);
        assert!(cur.is_empty());
    }
}
