//! Record builders.
//!
//! A builder reserves space in its buffer field by field, then pads the
//! record to the alignment and patches the framing header on `finish`.
//! The record's start offset is never stored: it is always derived as
//! `written − bytes_built_so_far`, which keeps it correct when a
//! reservation triggers an in-place reallocation or a chain split (a
//! split rebases the uncommitted tail to offset 0).
//!
//! Holding a builder mutably borrows the buffer, so no second builder
//! can write to it at the same time; the buffer's open-builder counter
//! double-checks that in debug builds.
//!
//! The caller commits (or rolls back) the buffer after the builder is
//! finished (or dropped).

use crate::buffer::PackedItemBuffer;
use crate::error::StoreError;
use crate::item::{padded_length, ItemKind, FLAG_VISIBLE, ITEM_HEADER_SIZE, MAX_PAYLOAD_LEN};
use crate::location::Location;

/// The metadata common to all three entity kinds, written first into
/// every record.
#[derive(Clone, Copy, Debug)]
pub struct ObjectMeta<'a> {
    pub id: i64,
    pub version: u32,
    pub timestamp: i64,
    pub changeset: u64,
    pub uid: u32,
    pub visible: bool,
    /// User name bytes; empty for anonymous or metadata-free objects.
    pub user: &'a [u8],
}

impl Default for ObjectMeta<'_> {
    fn default() -> Self {
        Self {
            id: 0,
            version: 0,
            timestamp: 0,
            changeset: 0,
            uid: 0,
            visible: true,
            user: b"",
        }
    }
}

/// Untyped incremental record builder.
struct ItemBuilder<'a> {
    buf: &'a mut PackedItemBuffer,
    len: usize,
    kind: ItemKind,
}

impl<'a> ItemBuilder<'a> {
    fn new(buf: &'a mut PackedItemBuffer, kind: ItemKind) -> Result<Self, StoreError> {
        buf.reserve(ITEM_HEADER_SIZE)?;
        buf.builder_opened();
        Ok(Self {
            buf,
            len: ITEM_HEADER_SIZE,
            kind,
        })
    }

    fn push(&mut self, bytes: &[u8]) -> Result<(), StoreError> {
        let offset = self.buf.reserve(bytes.len())?;
        self.buf.bytes_mut(offset, bytes.len()).copy_from_slice(bytes);
        self.len += bytes.len();
        Ok(())
    }

    fn push_u8(&mut self, value: u8) -> Result<(), StoreError> {
        self.push(&[value])
    }

    fn push_u16(&mut self, value: u16) -> Result<(), StoreError> {
        self.push(&value.to_le_bytes())
    }

    fn push_u32(&mut self, value: u32) -> Result<(), StoreError> {
        self.push(&value.to_le_bytes())
    }

    fn push_i32(&mut self, value: i32) -> Result<(), StoreError> {
        self.push(&value.to_le_bytes())
    }

    fn push_u64(&mut self, value: u64) -> Result<(), StoreError> {
        self.push(&value.to_le_bytes())
    }

    fn push_i64(&mut self, value: i64) -> Result<(), StoreError> {
        self.push(&value.to_le_bytes())
    }

    /// Offset of the next byte to be written, relative to record start.
    fn position(&self) -> usize {
        self.len
    }

    /// Overwrite already written bytes at `rel` from the record start.
    fn patch(&mut self, rel: usize, bytes: &[u8]) {
        debug_assert!(rel + bytes.len() <= self.len);
        let start = self.buf.written() - self.len;
        self.buf
            .bytes_mut(start + rel, bytes.len())
            .copy_from_slice(bytes);
    }

    fn finish(mut self) -> Result<usize, StoreError> {
        let payload_len = self.len - ITEM_HEADER_SIZE;
        if payload_len > MAX_PAYLOAD_LEN {
            return Err(StoreError::ItemTooLarge { size: payload_len });
        }

        let pad = padded_length(self.len) - self.len;
        if pad > 0 {
            let offset = self.buf.reserve(pad)?;
            self.buf.bytes_mut(offset, pad).fill(0);
            self.len += pad;
        }

        self.patch(
            0,
            &[
                self.kind.tag(),
                (payload_len & 0xFF) as u8,
                ((payload_len >> 8) & 0xFF) as u8,
                ((payload_len >> 16) & 0xFF) as u8,
            ],
        );

        Ok(self.buf.written() - self.len)
    }
}

impl Drop for ItemBuilder<'_> {
    fn drop(&mut self) {
        self.buf.builder_closed();
    }
}

fn push_meta(inner: &mut ItemBuilder<'_>, meta: &ObjectMeta<'_>) -> Result<(), StoreError> {
    debug_assert_eq!(
        inner.position(),
        ITEM_HEADER_SIZE,
        "meta must be the first section of a record"
    );
    let user_len =
        u16::try_from(meta.user.len()).map_err(|_| StoreError::StringTooLong {
            len: meta.user.len(),
        })?;

    inner.push_i64(meta.id)?;
    inner.push_i64(meta.timestamp)?;
    inner.push_u64(meta.changeset)?;
    inner.push_u32(meta.version)?;
    inner.push_u32(meta.uid)?;
    inner.push_u8(if meta.visible { FLAG_VISIBLE } else { 0 })?;
    inner.push_u16(user_len)?;
    inner.push(meta.user)
}

fn push_tag(inner: &mut ItemBuilder<'_>, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
    let key_len =
        u16::try_from(key.len()).map_err(|_| StoreError::StringTooLong { len: key.len() })?;
    let value_len =
        u16::try_from(value.len()).map_err(|_| StoreError::StringTooLong { len: value.len() })?;
    inner.push_u16(key_len)?;
    inner.push_u16(value_len)?;
    inner.push(key)?;
    inner.push(value)
}

/// Builds one node record. Call order: `meta`, `location`, any number of
/// `tag`, `finish`.
pub struct NodeBuilder<'a> {
    inner: ItemBuilder<'a>,
}

impl<'a> NodeBuilder<'a> {
    /// Start a node record in `buf`.
    ///
    /// # Errors
    ///
    /// Propagates reservation failures from the buffer.
    pub fn new(buf: &'a mut PackedItemBuffer) -> Result<Self, StoreError> {
        Ok(Self {
            inner: ItemBuilder::new(buf, ItemKind::Node)?,
        })
    }

    pub fn meta(&mut self, meta: &ObjectMeta<'_>) -> Result<(), StoreError> {
        push_meta(&mut self.inner, meta)
    }

    pub fn location(&mut self, location: Location) -> Result<(), StoreError> {
        self.inner.push_i32(location.lon())?;
        self.inner.push_i32(location.lat())
    }

    pub fn tag(&mut self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        push_tag(&mut self.inner, key, value)
    }

    /// Finish the record and return its offset in the buffer.
    pub fn finish(self) -> Result<usize, StoreError> {
        self.inner.finish()
    }
}

/// Builds one way record. Call order: `meta`, any number of `node_ref`,
/// any number of `tag`, `finish`.
pub struct WayBuilder<'a> {
    inner: ItemBuilder<'a>,
    count_rel: usize,
    count: u32,
}

impl<'a> WayBuilder<'a> {
    /// Start a way record in `buf`.
    ///
    /// # Errors
    ///
    /// Propagates reservation failures from the buffer.
    pub fn new(buf: &'a mut PackedItemBuffer) -> Result<Self, StoreError> {
        Ok(Self {
            inner: ItemBuilder::new(buf, ItemKind::Way)?,
            count_rel: 0,
            count: 0,
        })
    }

    pub fn meta(&mut self, meta: &ObjectMeta<'_>) -> Result<(), StoreError> {
        push_meta(&mut self.inner, meta)?;
        self.count_rel = self.inner.position();
        self.inner.push_u32(0)
    }

    pub fn node_ref(&mut self, id: i64) -> Result<(), StoreError> {
        self.count += 1;
        self.inner.push_i64(id)
    }

    pub fn tag(&mut self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        push_tag(&mut self.inner, key, value)
    }

    /// Finish the record and return its offset in the buffer.
    pub fn finish(mut self) -> Result<usize, StoreError> {
        let count = self.count;
        let count_rel = self.count_rel;
        self.inner.patch(count_rel, &count.to_le_bytes());
        self.inner.finish()
    }
}

/// Builds one relation record. Call order: `meta`, any number of
/// `member`, any number of `tag`, `finish`.
pub struct RelationBuilder<'a> {
    inner: ItemBuilder<'a>,
    count_rel: usize,
    count: u32,
}

impl<'a> RelationBuilder<'a> {
    /// Start a relation record in `buf`.
    ///
    /// # Errors
    ///
    /// Propagates reservation failures from the buffer.
    pub fn new(buf: &'a mut PackedItemBuffer) -> Result<Self, StoreError> {
        Ok(Self {
            inner: ItemBuilder::new(buf, ItemKind::Relation)?,
            count_rel: 0,
            count: 0,
        })
    }

    pub fn meta(&mut self, meta: &ObjectMeta<'_>) -> Result<(), StoreError> {
        push_meta(&mut self.inner, meta)?;
        self.count_rel = self.inner.position();
        self.inner.push_u32(0)
    }

    pub fn member(
        &mut self,
        mtype: crate::entity::MemberType,
        mref: i64,
        role: &[u8],
    ) -> Result<(), StoreError> {
        let role_len =
            u16::try_from(role.len()).map_err(|_| StoreError::StringTooLong { len: role.len() })?;
        self.count += 1;
        self.inner.push_i64(mref)?;
        self.inner.push_u8(mtype as u8)?;
        self.inner.push_u16(role_len)?;
        self.inner.push(role)
    }

    pub fn tag(&mut self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        push_tag(&mut self.inner, key, value)
    }

    /// Finish the record and return its offset in the buffer.
    pub fn finish(mut self) -> Result<usize, StoreError> {
        let count = self.count;
        let count_rel = self.count_rel;
        self.inner.patch(count_rel, &count.to_le_bytes());
        self.inner.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::GrowthPolicy;
    use crate::entity::MemberType;
    use crate::item::ALIGNMENT;

    fn sample_meta() -> ObjectMeta<'static> {
        ObjectMeta {
            id: 4711,
            version: 3,
            timestamp: 1_600_000_000,
            changeset: 987_654,
            uid: 42,
            visible: true,
            user: b"mapper",
        }
    }

    #[test]
    fn node_roundtrip_through_views() {
        let mut buffer = PackedItemBuffer::with_capacity(4096, GrowthPolicy::None);

        let mut builder = NodeBuilder::new(&mut buffer).unwrap();
        builder.meta(&sample_meta()).unwrap();
        builder
            .location(Location::new(134_500_000, 481_200_000))
            .unwrap();
        builder.tag(b"highway", b"residential").unwrap();
        builder.tag(b"name", b"Broad Street").unwrap();
        let offset = builder.finish().unwrap();
        assert_eq!(buffer.commit(), 0);

        let item = buffer.item_at(offset).unwrap();
        assert_eq!(item.kind(), ItemKind::Node);
        assert!(!item.removed());

        let node = item.as_node().unwrap();
        assert_eq!(node.id(), 4711);
        assert_eq!(node.version(), 3);
        assert_eq!(node.timestamp(), 1_600_000_000);
        assert_eq!(node.changeset(), 987_654);
        assert_eq!(node.uid(), 42);
        assert!(node.visible());
        assert_eq!(node.user(), b"mapper");
        assert_eq!(node.location(), Location::new(134_500_000, 481_200_000));

        let tags: Vec<_> = node.tags().collect();
        assert_eq!(tags.len(), 2);
        assert_eq!(tags[0].key, b"highway");
        assert_eq!(tags[0].value, b"residential");
        assert_eq!(tags[1].key, b"name");
        assert_eq!(tags[1].value, b"Broad Street");
    }

    #[test]
    fn deleted_node_has_undefined_location() {
        let mut buffer = PackedItemBuffer::with_capacity(256, GrowthPolicy::None);

        let mut builder = NodeBuilder::new(&mut buffer).unwrap();
        builder
            .meta(&ObjectMeta {
                visible: false,
                user: b"",
                ..sample_meta()
            })
            .unwrap();
        builder.location(Location::undefined()).unwrap();
        builder.finish().unwrap();
        buffer.commit();

        let node = buffer.iter().next().unwrap().as_node().unwrap();
        assert!(!node.visible());
        assert!(!node.location().is_defined());
        assert_eq!(node.tags().count(), 0);
    }

    #[test]
    fn way_roundtrip_through_views() {
        let mut buffer = PackedItemBuffer::with_capacity(4096, GrowthPolicy::None);

        let mut builder = WayBuilder::new(&mut buffer).unwrap();
        builder.meta(&sample_meta()).unwrap();
        for id in [100, 101, 102, 250] {
            builder.node_ref(id).unwrap();
        }
        builder.tag(b"highway", b"service").unwrap();
        builder.finish().unwrap();
        buffer.commit();

        let way = buffer.iter().next().unwrap().as_way().unwrap();
        assert_eq!(way.id(), 4711);
        let refs: Vec<_> = way.node_refs().collect();
        assert_eq!(refs, vec![100, 101, 102, 250]);
        let tags: Vec<_> = way.tags().collect();
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].key, b"highway");
    }

    #[test]
    fn relation_roundtrip_through_views() {
        let mut buffer = PackedItemBuffer::with_capacity(4096, GrowthPolicy::None);

        let mut builder = RelationBuilder::new(&mut buffer).unwrap();
        builder.meta(&sample_meta()).unwrap();
        builder.member(MemberType::Way, 100, b"outer").unwrap();
        builder.member(MemberType::Node, 50, b"").unwrap();
        builder.member(MemberType::Relation, 999, b"subarea").unwrap();
        builder.tag(b"type", b"multipolygon").unwrap();
        builder.finish().unwrap();
        buffer.commit();

        let relation = buffer.iter().next().unwrap().as_relation().unwrap();
        let members: Vec<_> = relation.members().collect();
        assert_eq!(members.len(), 3);
        assert_eq!(members[0].mtype, MemberType::Way);
        assert_eq!(members[0].mref, 100);
        assert_eq!(members[0].role, b"outer");
        assert_eq!(members[1].mtype, MemberType::Node);
        assert_eq!(members[1].role, b"");
        assert_eq!(members[2].mref, 999);

        let tags: Vec<_> = relation.tags().collect();
        assert_eq!(tags[0].value, b"multipolygon");
    }

    #[test]
    fn records_are_aligned_after_commit() {
        let mut buffer = PackedItemBuffer::with_capacity(4096, GrowthPolicy::None);
        for user in [&b"a"[..], b"ab", b"abc", b"abcd"] {
            let mut builder = NodeBuilder::new(&mut buffer).unwrap();
            builder
                .meta(&ObjectMeta {
                    user,
                    ..sample_meta()
                })
                .unwrap();
            builder.location(Location::new(1, 2)).unwrap();
            builder.finish().unwrap();
            buffer.commit();
            assert_eq!(buffer.committed() % ALIGNMENT, 0);
            assert!(buffer.is_aligned());
        }
        assert_eq!(buffer.iter().count(), 4);
    }

    #[test]
    fn builder_survives_chain_split() {
        // Capacity fits the first record but not the second; the split
        // happens while the second builder is open.
        let mut buffer = PackedItemBuffer::with_capacity(64, GrowthPolicy::Chain);

        let mut builder = NodeBuilder::new(&mut buffer).unwrap();
        builder.meta(&ObjectMeta::default()).unwrap();
        builder.location(Location::new(1, 1)).unwrap();
        builder.finish().unwrap();
        buffer.commit();

        let mut builder = NodeBuilder::new(&mut buffer).unwrap();
        builder.meta(&ObjectMeta::default()).unwrap();
        builder.location(Location::new(2, 2)).unwrap();
        builder.tag(b"key", b"value").unwrap();
        let offset = builder.finish().unwrap();
        assert_eq!(offset, 0, "second record rebased into fresh storage");
        buffer.commit();

        assert!(buffer.has_predecessor());
        let first = buffer.detach_deepest_predecessor().unwrap();
        assert_eq!(first.iter().count(), 1);
        assert_eq!(
            first.iter().next().unwrap().as_node().unwrap().location(),
            Location::new(1, 1)
        );
        let second = buffer.iter().next().unwrap().as_node().unwrap();
        assert_eq!(second.location(), Location::new(2, 2));
        assert_eq!(second.tags().count(), 1);
    }

    #[test]
    fn purge_removed_keeps_order_and_reports_moves() {
        let mut buffer = PackedItemBuffer::with_capacity(4096, GrowthPolicy::None);
        let mut offsets = Vec::new();
        for id in 0..5 {
            let mut builder = NodeBuilder::new(&mut buffer).unwrap();
            builder
                .meta(&ObjectMeta {
                    id,
                    ..ObjectMeta::default()
                })
                .unwrap();
            builder.location(Location::new(1, 1)).unwrap();
            let offset = builder.finish().unwrap();
            buffer.commit();
            offsets.push(offset);
        }

        buffer.mark_removed(offsets[1]);
        buffer.mark_removed(offsets[3]);

        let mut moves = Vec::new();
        buffer.purge_removed_with(|old, new| moves.push((old, new)));

        let surviving: Vec<_> = buffer
            .iter()
            .map(|item| item.as_node().unwrap().id())
            .collect();
        assert_eq!(surviving, vec![0, 2, 4]);

        // Record 0 never moved; 2 and 4 moved forward.
        assert_eq!(moves.len(), 2);
        for &(old, new) in &moves {
            assert!(new < old);
        }
        assert!(moves.windows(2).all(|w| w[0].1 < w[1].1));

        let total: usize = buffer.iter().map(|item| item.padded_size()).sum();
        assert_eq!(buffer.committed(), total);
    }

    #[test]
    fn from_existing_roundtrip() {
        let mut buffer = PackedItemBuffer::with_capacity(4096, GrowthPolicy::None);
        let mut builder = NodeBuilder::new(&mut buffer).unwrap();
        builder.meta(&sample_meta()).unwrap();
        builder.location(Location::new(7, 8)).unwrap();
        builder.finish().unwrap();
        buffer.commit();

        let bytes = buffer.committed_bytes().to_vec();
        let restored = PackedItemBuffer::from_existing(bytes).unwrap();
        let node = restored.iter().next().unwrap().as_node().unwrap();
        assert_eq!(node.id(), 4711);
        assert_eq!(node.location(), Location::new(7, 8));

        // External buffers never grow.
        let mut restored = restored;
        let free = restored.capacity() - restored.written();
        assert!(matches!(
            restored.reserve(free + 1),
            Err(StoreError::BufferFull { .. })
        ));
    }
}
