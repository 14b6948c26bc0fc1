//! A minimal o5m writer used to build test fixtures.
//!
//! Mirrors the decoder's per-stream state: one delta encoder per
//! delta-encoded field and a model of the 15 000-entry reference table,
//! so repeated strings come out as back-references exactly like
//! production encoders emit them.

use std::collections::HashMap;

use o5m_store::MemberType;
use o5m_wire::dataset::dataset_type;
use o5m_wire::magic::{FileVariant, FORMAT_VERSION, O5M_MAGIC, VARIANT_CHANGE, VARIANT_DATA};
use o5m_wire::varint::{encode_svarint, encode_uvarint, MAX_VARINT_BYTES};

/// Metadata of one written object.
#[derive(Clone, Copy, Debug)]
pub struct Meta<'a> {
    pub version: u64,
    pub timestamp: i64,
    pub changeset: i64,
    /// `(uid, name)`; `(0, b"")` writes the anonymous short form.
    pub user: Option<(u64, &'a [u8])>,
}

#[derive(Default)]
struct DeltaEncoder {
    prev: i64,
}

impl DeltaEncoder {
    fn encode(&mut self, value: i64) -> i64 {
        let delta = value.wrapping_sub(self.prev);
        self.prev = value;
        delta
    }

    fn clear(&mut self) {
        self.prev = 0;
    }
}

/// Writer-side model of the decoder's reference table: remembers the
/// insertion number of each eligible string so the current back-index
/// can be computed, and forgets entries once the ring would have
/// evicted them.
#[derive(Default)]
struct TableMirror {
    inserted: HashMap<Vec<u8>, u64>,
    count: u64,
}

impl TableMirror {
    fn back_index(&self, bytes: &[u8]) -> Option<u64> {
        let n = *self.inserted.get(bytes)?;
        let index = self.count - n + 1;
        (index <= 15_000).then_some(index)
    }

    fn insert(&mut self, bytes: &[u8]) {
        if bytes.len() <= 252 {
            self.count += 1;
            self.inserted.insert(bytes.to_vec(), self.count);
        }
    }

    fn clear(&mut self) {
        self.inserted.clear();
        self.count = 0;
    }
}

/// Streaming o5m/o5c writer.
///
/// Like production o5m writers, a reset dataset is emitted automatically
/// whenever the entity kind changes; without it, a reader that skips one
/// kind could not delta-decode the next section.
pub struct O5mWriter {
    out: Vec<u8>,
    id: DeltaEncoder,
    timestamp: DeltaEncoder,
    changeset: DeltaEncoder,
    lon: DeltaEncoder,
    lat: DeltaEncoder,
    way_node: DeltaEncoder,
    member_ids: [DeltaEncoder; 3],
    table: TableMirror,
    last_body: Option<u8>,
}

impl O5mWriter {
    #[must_use]
    pub fn new(variant: FileVariant) -> Self {
        let mut out = Vec::new();
        out.extend_from_slice(&O5M_MAGIC);
        out.push(match variant {
            FileVariant::Data => VARIANT_DATA,
            FileVariant::Change => VARIANT_CHANGE,
        });
        out.push(FORMAT_VERSION);
        Self {
            out,
            id: DeltaEncoder::default(),
            timestamp: DeltaEncoder::default(),
            changeset: DeltaEncoder::default(),
            lon: DeltaEncoder::default(),
            lat: DeltaEncoder::default(),
            way_node: DeltaEncoder::default(),
            member_ids: Default::default(),
            table: TableMirror::default(),
            last_body: None,
        }
    }

    /// Write a reset dataset before a body dataset of a different kind
    /// than the previous one.
    fn body_transition(&mut self, type_byte: u8) {
        if self.last_body.is_some_and(|last| last != type_byte) {
            self.reset();
        }
        self.last_body = Some(type_byte);
    }

    /// Write a reset dataset and clear the writer's own state.
    pub fn reset(&mut self) {
        self.out.push(dataset_type::RESET);
        self.id.clear();
        self.timestamp.clear();
        self.changeset.clear();
        self.lon.clear();
        self.lat.clear();
        self.way_node.clear();
        for delta in &mut self.member_ids {
            delta.clear();
        }
        self.table.clear();
    }

    /// Write a bare marker byte (no length, no payload).
    pub fn marker(&mut self, type_byte: u8) {
        self.out.push(type_byte);
    }

    /// Write an arbitrary length-prefixed dataset verbatim.
    pub fn raw_dataset(&mut self, type_byte: u8, payload: &[u8]) {
        self.out.push(type_byte);
        push_uvarint(&mut self.out, payload.len() as u64);
        self.out.extend_from_slice(payload);
    }

    /// Write a bounding box dataset (raw 1e7 fixed-point coordinates).
    pub fn bbox(&mut self, sw_lon: i64, sw_lat: i64, ne_lon: i64, ne_lat: i64) {
        let mut payload = Vec::new();
        push_svarint(&mut payload, sw_lon);
        push_svarint(&mut payload, sw_lat);
        push_svarint(&mut payload, ne_lon);
        push_svarint(&mut payload, ne_lat);
        self.raw_dataset(dataset_type::BOUNDING_BOX, &payload);
    }

    /// Write a file timestamp dataset (seconds since the epoch).
    pub fn file_timestamp(&mut self, seconds: i64) {
        let mut payload = Vec::new();
        push_svarint(&mut payload, seconds);
        self.raw_dataset(dataset_type::TIMESTAMP, &payload);
    }

    /// Write a node. `location = None` writes the deleted form (`tags`
    /// must be empty then).
    pub fn node(
        &mut self,
        id: i64,
        meta: Option<&Meta<'_>>,
        location: Option<(i64, i64)>,
        tags: &[(&[u8], &[u8])],
    ) {
        self.body_transition(dataset_type::NODE);
        let mut payload = Vec::new();
        push_svarint(&mut payload, self.id.encode(id));
        self.write_meta(&mut payload, meta);
        if let Some((lon, lat)) = location {
            push_svarint(&mut payload, self.lon.encode(lon));
            push_svarint(&mut payload, self.lat.encode(lat));
            self.write_tags(&mut payload, tags);
        } else {
            debug_assert!(tags.is_empty(), "a deleted node cannot carry tags");
        }
        self.raw_dataset(dataset_type::NODE, &payload);
    }

    /// Write a way. `refs = None` writes the deleted form.
    pub fn way(
        &mut self,
        id: i64,
        meta: Option<&Meta<'_>>,
        refs: Option<&[i64]>,
        tags: &[(&[u8], &[u8])],
    ) {
        self.body_transition(dataset_type::WAY);
        let mut payload = Vec::new();
        push_svarint(&mut payload, self.id.encode(id));
        self.write_meta(&mut payload, meta);
        if let Some(refs) = refs {
            let mut section = Vec::new();
            for &node_id in refs {
                push_svarint(&mut section, self.way_node.encode(node_id));
            }
            push_uvarint(&mut payload, section.len() as u64);
            payload.extend_from_slice(&section);
            self.write_tags(&mut payload, tags);
        } else {
            debug_assert!(tags.is_empty(), "a deleted way cannot carry tags");
        }
        self.raw_dataset(dataset_type::WAY, &payload);
    }

    /// Write a relation. `members = None` writes the deleted form.
    pub fn relation(
        &mut self,
        id: i64,
        meta: Option<&Meta<'_>>,
        members: Option<&[(MemberType, i64, &[u8])]>,
        tags: &[(&[u8], &[u8])],
    ) {
        self.body_transition(dataset_type::RELATION);
        let mut payload = Vec::new();
        push_svarint(&mut payload, self.id.encode(id));
        self.write_meta(&mut payload, meta);
        if let Some(members) = members {
            let mut section = Vec::new();
            for &(mtype, mref, role) in members {
                push_svarint(&mut section, self.member_ids[mtype.index()].encode(mref));
                let mut content = Vec::with_capacity(role.len() + 2);
                content.push(b'0' + mtype as u8);
                content.extend_from_slice(role);
                content.push(0x00);
                self.write_string(&mut section, &content);
            }
            push_uvarint(&mut payload, section.len() as u64);
            payload.extend_from_slice(&section);
            self.write_tags(&mut payload, tags);
        } else {
            debug_assert!(tags.is_empty(), "a deleted relation cannot carry tags");
        }
        self.raw_dataset(dataset_type::RELATION, &payload);
    }

    /// The bytes written so far.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.out
    }

    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.out
    }

    fn write_meta(&mut self, payload: &mut Vec<u8>, meta: Option<&Meta<'_>>) {
        let Some(meta) = meta else {
            payload.push(0x00);
            return;
        };
        push_uvarint(payload, meta.version);
        push_svarint(payload, self.timestamp.encode(meta.timestamp));
        if meta.timestamp == 0 {
            return;
        }
        push_svarint(payload, self.changeset.encode(meta.changeset));
        if let Some((uid, name)) = meta.user {
            let mut content = Vec::with_capacity(name.len() + 3);
            push_uvarint(&mut content, uid);
            content.push(0x00);
            if uid != 0 {
                content.extend_from_slice(name);
                content.push(0x00);
            }
            self.write_string(payload, &content);
        }
    }

    fn write_tags(&mut self, payload: &mut Vec<u8>, tags: &[(&[u8], &[u8])]) {
        for &(key, value) in tags {
            let mut content = Vec::with_capacity(key.len() + value.len() + 2);
            content.extend_from_slice(key);
            content.push(0x00);
            content.extend_from_slice(value);
            content.push(0x00);
            self.write_string(payload, &content);
        }
    }

    /// Write one interned string: a back-reference when the content is
    /// still in the table model, the inline form otherwise.
    fn write_string(&mut self, payload: &mut Vec<u8>, content: &[u8]) {
        if let Some(index) = self.table.back_index(content) {
            push_uvarint(payload, index);
        } else {
            payload.push(0x00);
            payload.extend_from_slice(content);
            self.table.insert(content);
        }
    }
}

fn push_uvarint(out: &mut Vec<u8>, value: u64) {
    let mut buf = [0u8; MAX_VARINT_BYTES];
    let len = encode_uvarint(value, &mut buf);
    out.extend_from_slice(&buf[..len]);
}

fn push_svarint(out: &mut Vec<u8>, value: i64) {
    let mut buf = [0u8; MAX_VARINT_BYTES];
    let len = encode_svarint(value, &mut buf);
    out.extend_from_slice(&buf[..len]);
}
