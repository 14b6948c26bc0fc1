//! The dedicated producer thread and its consumer-side handle.
//!
//! One thread runs the decoder; the consumer lives on another thread.
//! The only shared state is a bounded buffer queue plus a one-shot
//! header channel, so the hand-off is copy-free: whole buffers move
//! across. The producer blocks when the queue is full; the consumer
//! blocks on `next_buffer` when it is empty. Dropping the handle closes
//! both channels, which the producer observes as a failed send on its
//! next hand-off and terminates.

use std::io::Read;
use std::thread::JoinHandle;

use crossbeam_channel::{bounded, Receiver, Sender};
use o5m_store::{FileHeader, PackedItemBuffer};

use crate::decoder::{O5mDecoder, ReaderOptions, Sink, SinkClosed};
use crate::error::DecodeError;

struct ChannelSink {
    header_tx: Option<Sender<FileHeader>>,
    buffer_tx: Sender<PackedItemBuffer>,
}

impl Sink for ChannelSink {
    fn publish_header(&mut self, header: FileHeader) -> Result<(), SinkClosed> {
        match self.header_tx.take() {
            Some(tx) => tx.send(header).map_err(|_| SinkClosed),
            None => Ok(()),
        }
    }

    fn push_buffer(&mut self, buffer: PackedItemBuffer) -> Result<(), SinkClosed> {
        self.buffer_tx.send(buffer).map_err(|_| SinkClosed)
    }
}

/// Start a producer thread decoding `reader` and return the consumer
/// handle.
///
/// # Errors
///
/// [`DecodeError::Io`] if the thread cannot be spawned.
pub fn spawn<R>(reader: R, options: ReaderOptions) -> Result<O5mReader, DecodeError>
where
    R: Read + Send + 'static,
{
    let (header_tx, header_rx) = bounded(1);
    let (buffer_tx, buffer_rx) = bounded(options.queue_depth.max(1));

    let decoder = O5mDecoder::new(reader, &options);
    let handle = std::thread::Builder::new()
        .name("o5m-reader".to_string())
        .spawn(move || {
            let mut sink = ChannelSink {
                header_tx: Some(header_tx),
                buffer_tx,
            };
            decoder.run(&mut sink)
        })
        .map_err(DecodeError::Io)?;

    Ok(O5mReader {
        header_rx,
        header: None,
        buffer_rx,
        handle: Some(handle),
    })
}

/// Consumer-side handle of a running producer thread.
///
/// Buffers arrive in strict file order; the header is available before
/// the first buffer. `next_buffer` returning `None` is the end-of-stream
/// sentinel, after which [`finish`](Self::finish) reports the decoder's
/// terminal status. Dropping the handle without draining cancels the
/// producer.
pub struct O5mReader {
    header_rx: Receiver<FileHeader>,
    header: Option<FileHeader>,
    buffer_rx: Receiver<PackedItemBuffer>,
    handle: Option<JoinHandle<Result<(), DecodeError>>>,
}

impl O5mReader {
    /// The file header. Blocks until the producer has published it.
    ///
    /// # Errors
    ///
    /// The producer's terminal error if it failed before publishing.
    pub fn header(&mut self) -> Result<&FileHeader, DecodeError> {
        if self.header.is_none() {
            match self.header_rx.recv() {
                Ok(header) => self.header = Some(header),
                Err(_) => return Err(self.terminal_error()),
            }
        }
        Ok(self.header.as_ref().expect("header was just stored"))
    }

    /// The next buffer, blocking while the queue is empty. `None` means
    /// end of stream.
    pub fn next_buffer(&mut self) -> Option<PackedItemBuffer> {
        self.buffer_rx.recv().ok()
    }

    /// Wait for the producer and return its terminal status.
    ///
    /// Consumer-initiated cancellation (dropping or closing the queue
    /// before the stream ended) reports as success: the producer stopped
    /// because it was asked to.
    ///
    /// # Errors
    ///
    /// The producer's terminal [`DecodeError`].
    pub fn finish(self) -> Result<(), DecodeError> {
        let O5mReader {
            header_rx,
            header: _,
            buffer_rx,
            mut handle,
        } = self;
        // Closing the channels unblocks a producer still writing.
        drop(header_rx);
        drop(buffer_rx);

        match handle.take() {
            Some(handle) => match join(handle) {
                Err(DecodeError::Cancelled) | Ok(()) => Ok(()),
                Err(e) => Err(e),
            },
            None => Ok(()),
        }
    }

    /// Collect the producer's terminal error after a failed receive.
    fn terminal_error(&mut self) -> DecodeError {
        match self.handle.take() {
            Some(handle) => match join(handle) {
                Ok(()) => DecodeError::Cancelled,
                Err(e) => e,
            },
            None => DecodeError::Cancelled,
        }
    }
}

impl Iterator for O5mReader {
    type Item = PackedItemBuffer;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_buffer()
    }
}

fn join(handle: JoinHandle<Result<(), DecodeError>>) -> Result<(), DecodeError> {
    match handle.join() {
        Ok(result) => result,
        Err(panic) => std::panic::resume_unwind(panic),
    }
}
