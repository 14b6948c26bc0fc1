//! Dataset payload decoding.
//!
//! Each function consumes the payload of one body dataset and appends a
//! record to the output buffer. All interned string bytes are copied
//! into the record at decode time: the reference table is consulted,
//! never referenced, so buffer splits and compaction cannot invalidate
//! anything (the central ownership rule of the store).

use o5m_store::location::{MAX_LAT, MAX_LON};
use o5m_store::{
    BoundingBox, FileHeader, Location, MemberType, NodeBuilder, ObjectMeta, PackedItemBuffer,
    RelationBuilder, StoreError, WayBuilder,
};

use crate::cursor::Cursor;
use crate::delta::DeltaDecoder;
use crate::error::DecodeError;
use crate::reference_table::ReferenceTable;

/// All mutable per-stream parse state: the string dictionary and one
/// delta decoder per delta-encoded field. A reset dataset clears the
/// whole struct at once.
#[derive(Clone, Debug, Default)]
pub(crate) struct ParseState {
    pub refs: ReferenceTable,
    pub id: DeltaDecoder,
    pub timestamp: DeltaDecoder,
    pub changeset: DeltaDecoder,
    pub lon: DeltaDecoder,
    pub lat: DeltaDecoder,
    pub way_node: DeltaDecoder,
    pub member_ids: [DeltaDecoder; 3],
}

impl ParseState {
    pub fn reset(&mut self) {
        self.refs.clear();
        self.id.clear();
        self.timestamp.clear();
        self.changeset.clear();
        self.lon.clear();
        self.lat.clear();
        self.way_node.clear();
        for delta in &mut self.member_ids {
            delta.clear();
        }
    }
}

/// Decoded metadata section of one object.
struct Meta<'a> {
    version: u32,
    timestamp: i64,
    changeset: u64,
    uid: u32,
    user: &'a [u8],
}

/// How an interned string starts on the wire.
enum StrSource {
    /// A `0x00` prefix: the string body follows inline and, if short
    /// enough, gets registered in the reference table.
    Inline,
    /// Any other first byte: a uvarint back-index into the table.
    Backref(u64),
}

fn str_source(cur: &mut Cursor<'_>) -> Result<StrSource, DecodeError> {
    match cur.peek() {
        None => Err(DecodeError::StringMalformed(
            "string reference at end of payload",
        )),
        Some(0x00) => {
            cur.advance(1);
            if cur.is_empty() {
                return Err(DecodeError::StringMalformed("empty inline string"));
            }
            Ok(StrSource::Inline)
        }
        Some(_) => Ok(StrSource::Backref(cur.uvarint()?)),
    }
}

fn find_nul(bytes: &[u8], what: &'static str) -> Result<usize, DecodeError> {
    bytes
        .iter()
        .position(|&b| b == 0)
        .ok_or(DecodeError::StringMalformed(what))
}

/// Decode one interned `key\0value\0` tag pair.
fn decode_tag<'r, 'p: 'r>(
    refs: &'r mut ReferenceTable,
    cur: &mut Cursor<'p>,
) -> Result<(&'r [u8], &'r [u8]), DecodeError> {
    let bytes: &'r [u8] = match str_source(cur)? {
        StrSource::Inline => {
            let rest = cur.rest();
            let key_end = find_nul(rest, "no NUL byte in tag key")?;
            let value_end =
                key_end + 1 + find_nul(&rest[key_end + 1..], "no NUL byte in tag value")?;
            let extent = value_end + 1;
            refs.add(&rest[..extent]);
            cur.advance(extent);
            &rest[..extent]
        }
        StrSource::Backref(index) => refs.get(index)?,
    };

    let key_end = find_nul(bytes, "no NUL byte in tag key")?;
    let value_end = key_end + 1 + find_nul(&bytes[key_end + 1..], "no NUL byte in tag value")?;
    Ok((&bytes[..key_end], &bytes[key_end + 1..value_end]))
}

/// Decode an interned user block: `uid:uvarint 0x00 name 0x00`.
///
/// The inline `uid = 0` short form is the anonymous user; it consumes
/// only the uid and its separator, and registers the canonical two-NUL
/// sentinel in the table so later back-references resolve.
fn decode_user<'r, 'p: 'r>(
    refs: &'r mut ReferenceTable,
    cur: &mut Cursor<'p>,
) -> Result<(u32, &'r [u8]), DecodeError> {
    match str_source(cur)? {
        StrSource::Inline => {
            let rest = cur.rest();
            let mut sub = Cursor::new(rest);
            let uid = read_uid(&mut sub)?;
            if sub.is_empty() {
                return Err(DecodeError::StringMalformed("missing user name"));
            }
            sub.advance(1); // separator after the uid; writers emit 0x00

            if uid == 0 {
                let extent = sub.pos();
                refs.add(b"\0\0");
                cur.advance(extent);
                return Ok((0, b""));
            }

            let name_start = sub.pos();
            let name_len = find_nul(sub.rest(), "no NUL byte in user name")?;
            let extent = name_start + name_len + 1;
            refs.add(&rest[..extent]);
            cur.advance(extent);
            Ok((uid, &rest[name_start..name_start + name_len]))
        }
        StrSource::Backref(index) => {
            let slot = refs.get(index)?;
            let mut sub = Cursor::new(slot);
            let uid = read_uid(&mut sub)?;
            if sub.is_empty() {
                return Err(DecodeError::StringMalformed("missing user name"));
            }
            sub.advance(1);
            let name_start = sub.pos();
            let name_len = find_nul(sub.rest(), "no NUL byte in user name")?;
            Ok((uid, &slot[name_start..name_start + name_len]))
        }
    }
}

fn read_uid(cur: &mut Cursor<'_>) -> Result<u32, DecodeError> {
    let uid = cur.uvarint()?;
    u32::try_from(uid).map_err(|_| DecodeError::FieldOutOfRange { field: "uid" })
}

/// Decode an interned relation role: `type_char role 0x00`.
fn decode_role<'r, 'p: 'r>(
    refs: &'r mut ReferenceTable,
    cur: &mut Cursor<'p>,
) -> Result<(MemberType, &'r [u8]), DecodeError> {
    let bytes: &'r [u8] = match str_source(cur)? {
        StrSource::Inline => {
            let rest = cur.rest();
            let role_len = find_nul(&rest[1..], "no NUL byte in role")?;
            let extent = 1 + role_len + 1;
            refs.add(&rest[..extent]);
            cur.advance(extent);
            &rest[..extent]
        }
        StrSource::Backref(index) => refs.get(index)?,
    };

    let mtype = member_type_from_char(bytes[0])?;
    let role_len = find_nul(&bytes[1..], "no NUL byte in role")?;
    Ok((mtype, &bytes[1..1 + role_len]))
}

fn member_type_from_char(c: u8) -> Result<MemberType, DecodeError> {
    match c {
        b'0' => Ok(MemberType::Node),
        b'1' => Ok(MemberType::Way),
        b'2' => Ok(MemberType::Relation),
        other => Err(DecodeError::UnknownMemberType { found: other }),
    }
}

/// Decode the metadata section shared by all body datasets.
///
/// A leading `0x00` byte means no metadata at all. A timestamp that
/// accumulates to zero ends the section early; an exhausted payload
/// after the changeset means an object without author information.
fn decode_meta<'r, 'p: 'r>(
    timestamp: &mut DeltaDecoder,
    changeset: &mut DeltaDecoder,
    refs: &'r mut ReferenceTable,
    cur: &mut Cursor<'p>,
) -> Result<Meta<'r>, DecodeError> {
    if cur.is_empty() {
        return Err(DecodeError::PrematureEnd);
    }

    if cur.peek() == Some(0x00) {
        cur.advance(1);
        return Ok(Meta {
            version: 0,
            timestamp: 0,
            changeset: 0,
            uid: 0,
            user: b"",
        });
    }

    let version = cur.uvarint()?;
    let version =
        u32::try_from(version).map_err(|_| DecodeError::FieldOutOfRange { field: "version" })?;

    let ts = timestamp.update(cur.svarint()?);
    if ts == 0 {
        return Ok(Meta {
            version,
            timestamp: 0,
            changeset: 0,
            uid: 0,
            user: b"",
        });
    }

    let cs = changeset.update(cur.svarint()?) as u64;
    if cur.is_empty() {
        return Ok(Meta {
            version,
            timestamp: ts,
            changeset: cs,
            uid: 0,
            user: b"",
        });
    }

    let (uid, user) = decode_user(refs, cur)?;
    Ok(Meta {
        version,
        timestamp: ts,
        changeset: cs,
        uid,
        user,
    })
}

fn decode_tags<'p, F>(
    refs: &mut ReferenceTable,
    cur: &mut Cursor<'p>,
    mut add: F,
) -> Result<(), DecodeError>
where
    F: FnMut(&[u8], &[u8]) -> Result<(), StoreError>,
{
    while !cur.is_empty() {
        let (key, value) = decode_tag(refs, cur)?;
        add(key, value)?;
    }
    Ok(())
}

fn coordinate(value: i64, field: &'static str, max: i32) -> Result<i32, DecodeError> {
    let value =
        i32::try_from(value).map_err(|_| DecodeError::FieldOutOfRange { field })?;
    if !(-max..=max).contains(&value) {
        return Err(DecodeError::FieldOutOfRange { field });
    }
    Ok(value)
}

/// Map errors from a bounded sub-section: running out of a sub-section
/// is a length mismatch against the outer payload, not stream end.
fn in_section(e: DecodeError) -> DecodeError {
    match e {
        DecodeError::PrematureEnd => DecodeError::PayloadLengthMismatch,
        other => other,
    }
}

pub(crate) fn decode_node(
    state: &mut ParseState,
    buf: &mut PackedItemBuffer,
    payload: &[u8],
) -> Result<(), DecodeError> {
    let mut cur = Cursor::new(payload);
    let id = state.id.update(cur.svarint()?);
    let meta = decode_meta(
        &mut state.timestamp,
        &mut state.changeset,
        &mut state.refs,
        &mut cur,
    )?;

    // A payload that ends right after the metadata is a deleted node.
    let deleted = cur.is_empty();
    let location = if deleted {
        Location::undefined()
    } else {
        let lon = coordinate(state.lon.update(cur.svarint()?), "lon", MAX_LON)?;
        let lat = coordinate(state.lat.update(cur.svarint()?), "lat", MAX_LAT)?;
        Location::new(lon, lat)
    };

    let mut builder = NodeBuilder::new(buf)?;
    builder.meta(&ObjectMeta {
        id,
        version: meta.version,
        timestamp: meta.timestamp,
        changeset: meta.changeset,
        uid: meta.uid,
        visible: !deleted,
        user: meta.user,
    })?;
    builder.location(location)?;
    if !deleted && !cur.is_empty() {
        decode_tags(&mut state.refs, &mut cur, |key, value| {
            builder.tag(key, value)
        })?;
    }
    builder.finish()?;
    Ok(())
}

pub(crate) fn decode_way(
    state: &mut ParseState,
    buf: &mut PackedItemBuffer,
    payload: &[u8],
) -> Result<(), DecodeError> {
    let mut cur = Cursor::new(payload);
    let id = state.id.update(cur.svarint()?);
    let meta = decode_meta(
        &mut state.timestamp,
        &mut state.changeset,
        &mut state.refs,
        &mut cur,
    )?;

    // No reference section at all: the way is deleted.
    let deleted = cur.is_empty();

    let mut builder = WayBuilder::new(buf)?;
    builder.meta(&ObjectMeta {
        id,
        version: meta.version,
        timestamp: meta.timestamp,
        changeset: meta.changeset,
        uid: meta.uid,
        visible: !deleted,
        user: meta.user,
    })?;

    if !deleted {
        let refs_len = section_length(&mut cur)?;
        if refs_len > 0 {
            let mut sub = Cursor::new(&cur.rest()[..refs_len]);
            while !sub.is_empty() {
                let delta = sub.svarint().map_err(in_section)?;
                builder.node_ref(state.way_node.update(delta))?;
            }
            cur.advance(refs_len);
        }
        if !cur.is_empty() {
            decode_tags(&mut state.refs, &mut cur, |key, value| {
                builder.tag(key, value)
            })?;
        }
    }

    builder.finish()?;
    Ok(())
}

pub(crate) fn decode_relation(
    state: &mut ParseState,
    buf: &mut PackedItemBuffer,
    payload: &[u8],
) -> Result<(), DecodeError> {
    let mut cur = Cursor::new(payload);
    let id = state.id.update(cur.svarint()?);
    let meta = decode_meta(
        &mut state.timestamp,
        &mut state.changeset,
        &mut state.refs,
        &mut cur,
    )?;

    let deleted = cur.is_empty();

    let mut builder = RelationBuilder::new(buf)?;
    builder.meta(&ObjectMeta {
        id,
        version: meta.version,
        timestamp: meta.timestamp,
        changeset: meta.changeset,
        uid: meta.uid,
        visible: !deleted,
        user: meta.user,
    })?;

    if !deleted {
        let refs_len = section_length(&mut cur)?;
        if refs_len > 0 {
            let mut sub = Cursor::new(&cur.rest()[..refs_len]);
            while !sub.is_empty() {
                let delta = sub.svarint().map_err(in_section)?;
                if sub.is_empty() {
                    return Err(DecodeError::PayloadLengthMismatch);
                }
                let (mtype, role) =
                    decode_role(&mut state.refs, &mut sub).map_err(in_section)?;
                let mref = state.member_ids[mtype.index()].update(delta);
                builder.member(mtype, mref, role)?;
            }
            cur.advance(refs_len);
        }
        if !cur.is_empty() {
            decode_tags(&mut state.refs, &mut cur, |key, value| {
                builder.tag(key, value)
            })?;
        }
    }

    builder.finish()?;
    Ok(())
}

/// Read a sub-section length and check it against the remaining payload.
fn section_length(cur: &mut Cursor<'_>) -> Result<usize, DecodeError> {
    let len = cur.uvarint()?;
    let len = usize::try_from(len).map_err(|_| DecodeError::PayloadLengthMismatch)?;
    if len > cur.remaining() {
        return Err(DecodeError::PayloadLengthMismatch);
    }
    Ok(len)
}

pub(crate) fn decode_bbox(header: &mut FileHeader, payload: &[u8]) -> Result<(), DecodeError> {
    let mut cur = Cursor::new(payload);
    let sw_lon = coordinate(cur.svarint()?, "bbox lon", MAX_LON)?;
    let sw_lat = coordinate(cur.svarint()?, "bbox lat", MAX_LAT)?;
    let ne_lon = coordinate(cur.svarint()?, "bbox lon", MAX_LON)?;
    let ne_lat = coordinate(cur.svarint()?, "bbox lat", MAX_LAT)?;
    header.bounding_box = Some(BoundingBox {
        sw: Location::new(sw_lon, sw_lat),
        ne: Location::new(ne_lon, ne_lat),
    });
    Ok(())
}

pub(crate) fn decode_timestamp(
    header: &mut FileHeader,
    payload: &[u8],
) -> Result<(), DecodeError> {
    let mut cur = Cursor::new(payload);
    let seconds = cur.svarint()?;
    header.timestamp = Some(seconds);
    header.set_option("o5m_timestamp", &seconds.to_string());
    Ok(())
}
