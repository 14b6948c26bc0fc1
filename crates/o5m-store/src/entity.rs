//! Borrowed views over committed records.
//!
//! A view never copies: it wraps the record's payload slice and decodes
//! fields on access, the same way the record builders wrote them. Views
//! are valid until the owning buffer reserves more space.

use crate::item::{
    self, padded_length, read_payload_len, ItemKind, ITEM_HEADER_SIZE, META_SIZE, OFF_CHANGESET,
    OFF_FLAGS, OFF_ID, OFF_TIMESTAMP, OFF_UID, OFF_USER_LEN, OFF_VERSION, REMOVED_BIT,
};
use crate::location::Location;

/// The type of entity a relation member points at.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MemberType {
    Node = 0,
    Way = 1,
    Relation = 2,
}

impl MemberType {
    /// Index into per-type state tables (0, 1, 2).
    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Recover a member type from its stored byte.
    #[must_use]
    pub fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(MemberType::Node),
            1 => Some(MemberType::Way),
            2 => Some(MemberType::Relation),
            _ => None,
        }
    }
}

/// One key/value tag. Both components are UTF-8 by convention but are
/// exposed as raw bytes; render lossily at the presentation edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Tag<'a> {
    pub key: &'a [u8],
    pub value: &'a [u8],
}

/// One relation member.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Member<'a> {
    pub mtype: MemberType,
    pub mref: i64,
    pub role: &'a [u8],
}

/// An untyped borrow of one committed record.
#[derive(Clone, Copy, Debug)]
pub struct ItemRef<'a> {
    offset: usize,
    kind: ItemKind,
    removed: bool,
    payload: &'a [u8],
}

impl<'a> ItemRef<'a> {
    /// Parse the record starting at `offset` inside `data`.
    ///
    /// Returns `None` at the end of the data or when the framing is
    /// inconsistent (which stops iteration instead of panicking).
    pub(crate) fn parse(data: &'a [u8], offset: usize) -> Option<Self> {
        let header = data.get(offset..offset + ITEM_HEADER_SIZE)?;
        let kind = ItemKind::from_tag(header[0])?;
        let payload_len = read_payload_len(header);
        if offset + padded_length(ITEM_HEADER_SIZE + payload_len) > data.len() {
            return None;
        }
        let start = offset + ITEM_HEADER_SIZE;
        Some(Self {
            offset,
            kind,
            removed: header[0] & REMOVED_BIT != 0,
            payload: &data[start..start + payload_len],
        })
    }

    /// Offset of this record inside its buffer. Stable until the buffer
    /// is purged or cleared.
    #[must_use]
    pub fn offset(&self) -> usize {
        self.offset
    }

    #[must_use]
    pub fn kind(&self) -> ItemKind {
        self.kind
    }

    /// Is the tombstone bit set on this record?
    #[must_use]
    pub fn removed(&self) -> bool {
        self.removed
    }

    /// The aligned payload bytes of this record.
    #[must_use]
    pub fn payload(&self) -> &'a [u8] {
        self.payload
    }

    /// Record size in the buffer, padding included.
    #[must_use]
    pub fn padded_size(&self) -> usize {
        padded_length(ITEM_HEADER_SIZE + self.payload.len())
    }

    #[must_use]
    pub fn as_node(&self) -> Option<NodeRef<'a>> {
        (self.kind == ItemKind::Node).then(|| NodeRef {
            payload: self.payload,
        })
    }

    #[must_use]
    pub fn as_way(&self) -> Option<WayRef<'a>> {
        (self.kind == ItemKind::Way).then(|| WayRef {
            payload: self.payload,
        })
    }

    #[must_use]
    pub fn as_relation(&self) -> Option<RelationRef<'a>> {
        (self.kind == ItemKind::Relation).then(|| RelationRef {
            payload: self.payload,
        })
    }
}

macro_rules! meta_accessors {
    () => {
        /// OSM object id.
        #[must_use]
        pub fn id(&self) -> i64 {
            item::read_i64(self.payload, OFF_ID)
        }

        /// Object version, 0 when the object carried no metadata.
        #[must_use]
        pub fn version(&self) -> u32 {
            item::read_u32(self.payload, OFF_VERSION)
        }

        /// Edit timestamp in seconds since the UNIX epoch, 0 when absent.
        #[must_use]
        pub fn timestamp(&self) -> i64 {
            item::read_i64(self.payload, OFF_TIMESTAMP)
        }

        /// Changeset id, 0 when absent.
        #[must_use]
        pub fn changeset(&self) -> u64 {
            item::read_u64(self.payload, OFF_CHANGESET)
        }

        /// User id, 0 for anonymous edits.
        #[must_use]
        pub fn uid(&self) -> u32 {
            item::read_u32(self.payload, OFF_UID)
        }

        /// False for deleted objects.
        #[must_use]
        pub fn visible(&self) -> bool {
            self.payload[OFF_FLAGS] & item::FLAG_VISIBLE != 0
        }

        /// User name bytes, empty for anonymous edits.
        #[must_use]
        pub fn user(&self) -> &'a [u8] {
            let len = usize::from(item::read_u16(self.payload, OFF_USER_LEN));
            &self.payload[META_SIZE..META_SIZE + len]
        }

        fn meta_end(&self) -> usize {
            META_SIZE + usize::from(item::read_u16(self.payload, OFF_USER_LEN))
        }
    };
}

/// Borrowed view of a node record.
#[derive(Clone, Copy, Debug)]
pub struct NodeRef<'a> {
    payload: &'a [u8],
}

impl<'a> NodeRef<'a> {
    meta_accessors!();

    /// The node's location; undefined for deleted nodes.
    #[must_use]
    pub fn location(&self) -> Location {
        let base = self.meta_end();
        Location::new(
            item::read_i32(self.payload, base),
            item::read_i32(self.payload, base + 4),
        )
    }

    /// Iterate over the node's tags.
    #[must_use]
    pub fn tags(&self) -> Tags<'a> {
        Tags {
            rest: &self.payload[self.meta_end() + 8..],
        }
    }
}

/// Borrowed view of a way record.
#[derive(Clone, Copy, Debug)]
pub struct WayRef<'a> {
    payload: &'a [u8],
}

impl<'a> WayRef<'a> {
    meta_accessors!();

    /// Iterate over the referenced node ids in order.
    #[must_use]
    pub fn node_refs(&self) -> WayNodes<'a> {
        let base = self.meta_end();
        let count = item::read_u32(self.payload, base) as usize;
        WayNodes {
            rest: &self.payload[base + 4..base + 4 + count * 8],
        }
    }

    /// Iterate over the way's tags.
    #[must_use]
    pub fn tags(&self) -> Tags<'a> {
        let base = self.meta_end();
        let count = item::read_u32(self.payload, base) as usize;
        Tags {
            rest: &self.payload[base + 4 + count * 8..],
        }
    }
}

/// Borrowed view of a relation record.
#[derive(Clone, Copy, Debug)]
pub struct RelationRef<'a> {
    payload: &'a [u8],
}

impl<'a> RelationRef<'a> {
    meta_accessors!();

    /// Iterate over the relation's members in order.
    #[must_use]
    pub fn members(&self) -> Members<'a> {
        let base = self.meta_end();
        Members {
            payload: self.payload,
            offset: base + 4,
            remaining: item::read_u32(self.payload, base),
        }
    }

    /// Iterate over the relation's tags.
    #[must_use]
    pub fn tags(&self) -> Tags<'a> {
        let mut members = self.members();
        while members.next().is_some() {}
        Tags {
            rest: &self.payload[members.offset..],
        }
    }
}

/// Iterator over the tag section of a record.
pub struct Tags<'a> {
    rest: &'a [u8],
}

impl<'a> Iterator for Tags<'a> {
    type Item = Tag<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.rest.is_empty() {
            return None;
        }
        debug_assert!(self.rest.len() >= 4, "truncated tag entry");
        if self.rest.len() < 4 {
            return None;
        }
        let key_len = usize::from(item::read_u16(self.rest, 0));
        let value_len = usize::from(item::read_u16(self.rest, 2));
        let end = 4 + key_len + value_len;
        if end > self.rest.len() {
            debug_assert!(false, "tag entry spills past payload");
            return None;
        }
        let tag = Tag {
            key: &self.rest[4..4 + key_len],
            value: &self.rest[4 + key_len..end],
        };
        self.rest = &self.rest[end..];
        Some(tag)
    }
}

/// Iterator over the node refs of a way.
pub struct WayNodes<'a> {
    rest: &'a [u8],
}

impl<'a> Iterator for WayNodes<'a> {
    type Item = i64;

    fn next(&mut self) -> Option<Self::Item> {
        if self.rest.len() < 8 {
            return None;
        }
        let id = item::read_i64(self.rest, 0);
        self.rest = &self.rest[8..];
        Some(id)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.rest.len() / 8;
        (n, Some(n))
    }
}

impl ExactSizeIterator for WayNodes<'_> {}

/// Iterator over the members of a relation.
pub struct Members<'a> {
    payload: &'a [u8],
    offset: usize,
    remaining: u32,
}

impl<'a> Iterator for Members<'a> {
    type Item = Member<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let base = self.offset;
        if base + 11 > self.payload.len() {
            debug_assert!(false, "truncated member entry");
            self.remaining = 0;
            return None;
        }
        let mref = item::read_i64(self.payload, base);
        let mtype = match MemberType::from_index(self.payload[base + 8]) {
            Some(t) => t,
            None => {
                debug_assert!(false, "invalid member type byte");
                self.remaining = 0;
                return None;
            }
        };
        let role_len = usize::from(item::read_u16(self.payload, base + 9));
        let role_start = base + 11;
        if role_start + role_len > self.payload.len() {
            debug_assert!(false, "member role spills past payload");
            self.remaining = 0;
            return None;
        }
        self.offset = role_start + role_len;
        self.remaining -= 1;
        Some(Member {
            mtype,
            mref,
            role: &self.payload[role_start..role_start + role_len],
        })
    }
}
