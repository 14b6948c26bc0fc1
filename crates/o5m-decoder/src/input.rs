use std::io::Read;

/// How many bytes one refill asks the upstream reader for.
const READ_CHUNK: usize = 64 * 1024;

/// Incremental byte window over an upstream reader.
///
/// The decoder asks for `n` bytes before parsing a unit; the window
/// refills from the reader as needed and distinguishes a clean end of
/// input (`ensure` returns `false`) from an I/O failure. Consumed bytes
/// are dropped from the front on the next refill, so the window stays
/// proportional to the largest single dataset.
pub(crate) struct InputBuffer<R> {
    reader: R,
    buf: Vec<u8>,
    start: usize,
    eof: bool,
}

impl<R: Read> InputBuffer<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: Vec::new(),
            start: 0,
            eof: false,
        }
    }

    /// Bytes currently available without touching the reader.
    pub fn available(&self) -> usize {
        self.buf.len() - self.start
    }

    /// Make at least `n` bytes available, reading more input if needed.
    ///
    /// Returns `false` when the stream ended before `n` bytes could be
    /// gathered; whatever was read stays available.
    pub fn ensure(&mut self, n: usize) -> std::io::Result<bool> {
        while self.available() < n {
            if self.eof {
                return Ok(false);
            }
            if self.start > 0 {
                self.buf.drain(..self.start);
                self.start = 0;
            }

            let old_len = self.buf.len();
            self.buf.resize(old_len + READ_CHUNK, 0);
            let read = self.reader.read(&mut self.buf[old_len..])?;
            self.buf.truncate(old_len + read);
            if read == 0 {
                self.eof = true;
            }
        }
        Ok(true)
    }

    /// The first `n` available bytes. Call `ensure(n)` first.
    pub fn peek(&self, n: usize) -> &[u8] {
        &self.buf[self.start..self.start + n]
    }

    /// Everything currently available.
    pub fn peek_available(&self) -> &[u8] {
        &self.buf[self.start..]
    }

    /// Drop `n` bytes from the front of the window.
    pub fn consume(&mut self, n: usize) {
        debug_assert!(n <= self.available());
        self.start += n;
    }
}
