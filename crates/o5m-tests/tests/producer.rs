//! Producer/consumer pipeline tests: ordering guarantees, buffer
//! fan-out across capacity limits, kind masks, and cancellation.

use std::io::Cursor;

use o5m_decoder::{spawn, DecodeError, ReaderOptions, NODE_SIZE_ESTIMATE};
use o5m_store::{EntityKinds, ItemKind, PackedItemBuffer};
use o5m_tests::O5mWriter;
use o5m_wire::magic::FileVariant;

fn node_file(count: i64) -> Vec<u8> {
    let mut writer = O5mWriter::new(FileVariant::Data);
    for id in 1..=count {
        writer.node(id, None, Some((id * 10, id * 20)), &[]);
    }
    writer.into_bytes()
}

fn node_ids(buffer: &PackedItemBuffer) -> Vec<i64> {
    buffer
        .iter()
        .map(|item| item.as_node().unwrap().id())
        .collect()
}

/// Padded size of the plain nodes written by `node_file`: 4 bytes of
/// framing, 43 bytes of payload (empty user, no tags), padded to 48.
const PLAIN_NODE_SIZE: usize = 48;

#[test]
fn header_arrives_before_any_buffer() {
    let mut reader = spawn(Cursor::new(node_file(10)), ReaderOptions::default()).unwrap();
    let header = reader.header().unwrap();
    assert!(!header.has_multiple_object_versions);

    let buffer = reader.next_buffer().expect("one buffer expected");
    assert_eq!(node_ids(&buffer), (1..=10).collect::<Vec<i64>>());
    drop(buffer);
    assert!(reader.next_buffer().is_none());
    reader.finish().unwrap();
}

#[test]
fn header_is_available_after_buffers_were_consumed() {
    // Consuming the buffer stream first must not lose the header: it was
    // published before the first buffer and waits in its own channel.
    let mut reader = spawn(Cursor::new(node_file(5)), ReaderOptions::default()).unwrap();
    let buffer = reader.next_buffer().expect("one buffer expected");
    assert_eq!(node_ids(&buffer).len(), 5);
    drop(buffer);
    assert!(reader.next_buffer().is_none());
    assert!(reader.header().is_ok());
    reader.finish().unwrap();
}

#[test]
fn buffers_split_at_the_capacity_threshold() {
    // Capacity chosen so the estimate check flushes exactly after 99
    // nodes: 99 plain nodes fill 4752 bytes, and 4752 + estimate exceeds
    // the capacity while 98 nodes plus the estimate still fit.
    let capacity = 98 * PLAIN_NODE_SIZE + NODE_SIZE_ESTIMATE + PLAIN_NODE_SIZE / 2;
    let capacity = capacity - capacity % 8;
    let options = ReaderOptions {
        buffer_capacity: capacity,
        ..ReaderOptions::default()
    };

    let mut reader = spawn(Cursor::new(node_file(100)), options).unwrap();
    reader.header().unwrap();

    let first = reader.next_buffer().expect("first buffer");
    let second = reader.next_buffer().expect("second buffer");
    assert!(reader.next_buffer().is_none());

    let first_ids = node_ids(&first);
    let second_ids = node_ids(&second);
    assert_eq!(first_ids.len(), 99);
    assert_eq!(*first_ids.last().unwrap(), 99);
    assert_eq!(second_ids, vec![100]);

    // No node duplicated or dropped across the boundary.
    let mut all = first_ids;
    all.extend(&second_ids);
    assert_eq!(all, (1..=100).collect::<Vec<i64>>());

    drop(first);
    drop(second);
    reader.finish().unwrap();
}

#[test]
fn chained_overflow_is_drained_in_file_order() {
    // Small nodes fill the buffer to just under the flush threshold,
    // then a node with a fat tag overflows mid-build. The chain split
    // buffer must come out before the record that caused it.
    let mut writer = O5mWriter::new(FileVariant::Data);
    for id in 1..=18 {
        writer.node(id, None, Some((id, id)), &[]);
    }
    let value = vec![b'v'; 180];
    writer.node(19, None, Some((19, 19)), &[(b"note", &value)]);
    let bytes = writer.into_bytes();

    let options = ReaderOptions {
        buffer_capacity: 1024,
        ..ReaderOptions::default()
    };
    let mut reader = spawn(Cursor::new(bytes), options).unwrap();
    reader.header().unwrap();

    let mut ids = Vec::new();
    let mut buffers = 0;
    while let Some(buffer) = reader.next_buffer() {
        buffers += 1;
        ids.extend(node_ids(&buffer));
    }
    reader.finish().unwrap();

    assert!(buffers >= 2, "expected a chain split, got {buffers} buffer(s)");
    assert_eq!(ids, (1..=19).collect::<Vec<i64>>());
}

#[test]
fn empty_kind_mask_yields_header_and_no_buffers() {
    let options = ReaderOptions {
        read_kinds: EntityKinds::NOTHING,
        ..ReaderOptions::default()
    };
    let mut reader = spawn(Cursor::new(node_file(50)), options).unwrap();
    assert!(reader.header().is_ok());
    assert!(reader.next_buffer().is_none());
    reader.finish().unwrap();
}

#[test]
fn kind_mask_is_applied_by_the_producer() {
    let mut writer = O5mWriter::new(FileVariant::Data);
    writer.node(1, None, Some((1, 1)), &[]);
    writer.way(2, None, Some(&[1]), &[]);
    writer.node(3, None, Some((3, 3)), &[]);
    let bytes = writer.into_bytes();

    let options = ReaderOptions {
        read_kinds: EntityKinds::NODES,
        ..ReaderOptions::default()
    };
    let mut reader = spawn(Cursor::new(bytes), options).unwrap();
    reader.header().unwrap();

    let buffer = reader.next_buffer().expect("one buffer expected");
    let kinds: Vec<ItemKind> = buffer.iter().map(|item| item.kind()).collect();
    assert_eq!(kinds, vec![ItemKind::Node, ItemKind::Node]);
    drop(buffer);
    assert!(reader.next_buffer().is_none());
    reader.finish().unwrap();
}

#[test]
fn decode_errors_surface_as_the_terminal_status() {
    let mut bytes = node_file(3);
    bytes.truncate(bytes.len() - 2);
    let mut reader = spawn(Cursor::new(bytes), ReaderOptions::default()).unwrap();
    // The header was published before the broken dataset.
    reader.header().unwrap();
    while reader.next_buffer().is_some() {}
    assert!(matches!(
        reader.finish(),
        Err(DecodeError::PrematureEnd)
    ));
}

#[test]
fn header_failure_reports_through_the_header_call() {
    let mut reader = spawn(&b"not an o5m file"[..], ReaderOptions::default()).unwrap();
    assert!(matches!(reader.header(), Err(DecodeError::Header(_))));
}

#[test]
fn dropping_the_reader_cancels_the_producer() {
    // A deep file with a tiny queue: the producer will block on the
    // hand-off. Taking one buffer and finishing early must terminate it
    // cleanly rather than deadlock.
    let options = ReaderOptions {
        buffer_capacity: 1024,
        queue_depth: 1,
        ..ReaderOptions::default()
    };
    let mut reader = spawn(Cursor::new(node_file(2000)), options).unwrap();
    reader.header().unwrap();
    let first = reader.next_buffer().expect("first buffer");
    assert!(!node_ids(&first).is_empty());
    drop(first);

    // Consumer-initiated cancellation reports as success.
    reader.finish().unwrap();
}

#[test]
fn buffers_arrive_in_strict_file_order() {
    let options = ReaderOptions {
        buffer_capacity: 512,
        queue_depth: 2,
        ..ReaderOptions::default()
    };
    let mut reader = spawn(Cursor::new(node_file(300)), options).unwrap();
    reader.header().unwrap();

    let mut previous = 0i64;
    while let Some(buffer) = reader.next_buffer() {
        for id in node_ids(&buffer) {
            assert_eq!(id, previous + 1, "ids must be contiguous across buffers");
            previous = id;
        }
    }
    assert_eq!(previous, 300);
    reader.finish().unwrap();
}
