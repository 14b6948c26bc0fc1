//! The o5m dataset state machine.
//!
//! The decoder pulls bytes from an upstream reader, verifies the file
//! prelude, dispatches datasets, rebuilds entities into packed buffers
//! and hands completed buffers to a [`Sink`]. The file header is
//! published to the sink exactly once: on the first body dataset, or on
//! clean end of input for header-only files.

use std::io::Read;

use o5m_store::{EntityKinds, FileHeader, GrowthPolicy, ItemKind, PackedItemBuffer};
use o5m_wire::dataset::Dataset;
use o5m_wire::magic::{parse_prelude, PRELUDE_LEN};
use o5m_wire::varint::{decode_uvarint, MAX_VARINT_BYTES};
use o5m_wire::WireError;

use crate::body::{self, ParseState};
use crate::error::DecodeError;
use crate::input::InputBuffer;

/// Default capacity of one output buffer.
pub const DEFAULT_BUFFER_CAPACITY: usize = 800 * 1024;

/// Default depth of the producer-to-consumer buffer queue.
pub const DEFAULT_QUEUE_DEPTH: usize = 8;

/// Worst-case record estimates used to decide when a buffer is too full
/// to start another entity of the given kind. An underestimate is
/// harmless: the buffer chains out and the overflow is drained after
/// the dataset.
pub const NODE_SIZE_ESTIMATE: usize = 128;
pub const WAY_SIZE_ESTIMATE: usize = 1024;
pub const RELATION_SIZE_ESTIMATE: usize = 2048;

/// Decoder configuration, shared by the synchronous entry point and the
/// producer thread.
#[derive(Clone, Debug)]
pub struct ReaderOptions {
    /// Which entity kinds to materialise. Datasets of other kinds are
    /// skipped without touching the delta state.
    pub read_kinds: EntityKinds,
    /// Capacity of each output buffer.
    pub buffer_capacity: usize,
    /// Bounded depth of the buffer hand-off queue.
    pub queue_depth: usize,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            read_kinds: EntityKinds::ALL,
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            queue_depth: DEFAULT_QUEUE_DEPTH,
        }
    }
}

/// The sink has gone away; the decoder stops at the next hand-off.
#[derive(Debug)]
pub struct SinkClosed;

/// Downstream target for the decoder's output.
pub trait Sink {
    /// Receive the file header. Called exactly once, before the first
    /// buffer.
    fn publish_header(&mut self, header: FileHeader) -> Result<(), SinkClosed>;

    /// Receive one completed buffer, in file order.
    fn push_buffer(&mut self, buffer: PackedItemBuffer) -> Result<(), SinkClosed>;
}

/// A [`Sink`] that collects everything in memory.
#[derive(Debug, Default)]
pub struct CollectSink {
    pub header: Option<FileHeader>,
    pub buffers: Vec<PackedItemBuffer>,
}

impl Sink for CollectSink {
    fn publish_header(&mut self, header: FileHeader) -> Result<(), SinkClosed> {
        self.header = Some(header);
        Ok(())
    }

    fn push_buffer(&mut self, buffer: PackedItemBuffer) -> Result<(), SinkClosed> {
        self.buffers.push(buffer);
        Ok(())
    }
}

/// Result of a whole-stream synchronous decode.
#[derive(Debug)]
pub struct Decoded {
    pub header: FileHeader,
    pub buffers: Vec<PackedItemBuffer>,
}

/// Streaming o5m/o5c decoder over any [`Read`] source.
pub struct O5mDecoder<R> {
    input: InputBuffer<R>,
    state: ParseState,
    header: FileHeader,
    header_published: bool,
    read_kinds: EntityKinds,
    buffer_capacity: usize,
    buffer: PackedItemBuffer,
}

impl<R: Read> O5mDecoder<R> {
    #[must_use]
    pub fn new(reader: R, options: &ReaderOptions) -> Self {
        Self {
            input: InputBuffer::new(reader),
            state: ParseState::default(),
            header: FileHeader::default(),
            header_published: false,
            read_kinds: options.read_kinds,
            buffer_capacity: options.buffer_capacity,
            buffer: PackedItemBuffer::with_capacity(options.buffer_capacity, GrowthPolicy::Chain),
        }
    }

    /// Run the decoder to completion, feeding the sink.
    ///
    /// # Errors
    ///
    /// Any [`DecodeError`]; all of them are fatal to the stream.
    pub fn run<S: Sink>(mut self, sink: &mut S) -> Result<(), DecodeError> {
        self.decode_prelude()?;
        self.decode_datasets(sink)
    }

    /// Decode a whole stream synchronously, collecting the header and
    /// every buffer in memory.
    ///
    /// # Errors
    ///
    /// Any [`DecodeError`]; all of them are fatal to the stream.
    pub fn decode(reader: R, options: &ReaderOptions) -> Result<Decoded, DecodeError> {
        let mut sink = CollectSink::default();
        Self::new(reader, options).run(&mut sink)?;
        Ok(Decoded {
            header: sink.header.unwrap_or_default(),
            buffers: sink.buffers,
        })
    }

    fn decode_prelude(&mut self) -> Result<(), DecodeError> {
        if !self.input.ensure(PRELUDE_LEN)? {
            return Err(DecodeError::Header(WireError::UnexpectedEof {
                offset: self.input.available(),
            }));
        }
        let variant =
            parse_prelude(self.input.peek(PRELUDE_LEN)).map_err(DecodeError::Header)?;
        self.header.has_multiple_object_versions = variant.has_multiple_object_versions();
        self.input.consume(PRELUDE_LEN);
        Ok(())
    }

    fn decode_datasets<S: Sink>(&mut self, sink: &mut S) -> Result<(), DecodeError> {
        loop {
            if !self.input.ensure(1)? {
                break; // clean end of input at a dataset boundary
            }
            let type_byte = self.input.peek(1)[0];
            self.input.consume(1);
            let dataset = Dataset::from_type_byte(type_byte);

            if !dataset.has_payload() {
                if dataset == Dataset::Reset {
                    log::trace!("reset dataset: clearing delta state and string table");
                    self.state.reset();
                }
                continue;
            }

            let length = self.read_stream_uvarint()?;
            if !self.input.ensure(length)? {
                return Err(DecodeError::PrematureEnd);
            }

            match dataset {
                Dataset::Node => self.decode_body_dataset(ItemKind::Node, length, sink)?,
                Dataset::Way => self.decode_body_dataset(ItemKind::Way, length, sink)?,
                Dataset::Relation => {
                    self.decode_body_dataset(ItemKind::Relation, length, sink)?;
                }
                Dataset::BoundingBox => {
                    body::decode_bbox(&mut self.header, self.input.peek(length))?;
                }
                Dataset::Timestamp => {
                    body::decode_timestamp(&mut self.header, self.input.peek(length))?;
                }
                // A header dataset in body position, sync, jump, and
                // unknown low types: payload skipped.
                _ => {}
            }
            self.input.consume(length);

            self.flush_chain(sink)?;

            if self.read_kinds.is_empty() && self.header_published {
                break;
            }
        }

        self.publish_header(sink)?;
        self.flush_final(sink)
    }

    fn decode_body_dataset<S: Sink>(
        &mut self,
        kind: ItemKind,
        length: usize,
        sink: &mut S,
    ) -> Result<(), DecodeError> {
        self.publish_header(sink)?;
        if !self.read_kinds.contains(kind) {
            return Ok(());
        }

        self.rotate_buffer_if_full(kind, sink)?;

        let payload = self.input.peek(length);
        match kind {
            ItemKind::Node => body::decode_node(&mut self.state, &mut self.buffer, payload)?,
            ItemKind::Way => body::decode_way(&mut self.state, &mut self.buffer, payload)?,
            ItemKind::Relation => {
                body::decode_relation(&mut self.state, &mut self.buffer, payload)?;
            }
        }
        self.buffer.commit();
        Ok(())
    }

    /// Hand the current buffer downstream when it cannot be expected to
    /// hold another entity of the given kind, and start a fresh one.
    fn rotate_buffer_if_full<S: Sink>(
        &mut self,
        kind: ItemKind,
        sink: &mut S,
    ) -> Result<(), DecodeError> {
        let estimate = match kind {
            ItemKind::Node => NODE_SIZE_ESTIMATE,
            ItemKind::Way => WAY_SIZE_ESTIMATE,
            ItemKind::Relation => RELATION_SIZE_ESTIMATE,
        };
        if self.buffer.committed() > 0
            && self.buffer.committed() + estimate > self.buffer.capacity()
        {
            let fresh =
                PackedItemBuffer::with_capacity(self.buffer_capacity, GrowthPolicy::Chain);
            let full = std::mem::replace(&mut self.buffer, fresh);
            debug_assert!(!full.has_predecessor(), "chain drained after each dataset");
            log::debug!("flushing full buffer ({} committed bytes)", full.committed());
            sink.push_buffer(full).map_err(|_| DecodeError::Cancelled)?;
        }
        Ok(())
    }

    /// Drain overflow buffers produced by chain growth, oldest first.
    fn flush_chain<S: Sink>(&mut self, sink: &mut S) -> Result<(), DecodeError> {
        while let Some(predecessor) = self.buffer.detach_deepest_predecessor() {
            log::debug!(
                "flushing chained overflow buffer ({} committed bytes)",
                predecessor.committed()
            );
            sink.push_buffer(*predecessor)
                .map_err(|_| DecodeError::Cancelled)?;
        }
        Ok(())
    }

    fn flush_final<S: Sink>(&mut self, sink: &mut S) -> Result<(), DecodeError> {
        self.flush_chain(sink)?;
        if self.buffer.committed() > 0 {
            let last = std::mem::replace(
                &mut self.buffer,
                PackedItemBuffer::with_capacity(0, GrowthPolicy::None),
            );
            sink.push_buffer(last).map_err(|_| DecodeError::Cancelled)?;
        }
        Ok(())
    }

    fn publish_header<S: Sink>(&mut self, sink: &mut S) -> Result<(), DecodeError> {
        if self.header_published {
            return Ok(());
        }
        self.header_published = true;
        log::debug!("publishing file header");
        sink.publish_header(self.header.clone())
            .map_err(|_| DecodeError::Cancelled)
    }

    /// Read one uvarint at stream level (a dataset length).
    fn read_stream_uvarint(&mut self) -> Result<usize, DecodeError> {
        // Best effort: near the end of input fewer bytes may remain, and
        // the slice decoder reports truncation.
        self.input.ensure(MAX_VARINT_BYTES)?;
        let (value, consumed) = decode_uvarint(self.input.peek_available())?;
        self.input.consume(consumed);
        // A length that does not fit in memory can never be satisfied.
        usize::try_from(value).map_err(|_| DecodeError::PrematureEnd)
    }
}
