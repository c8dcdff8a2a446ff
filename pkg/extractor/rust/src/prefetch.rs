// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2025-present Datadog, Inc.

//! Double-buffered character stream with background read-ahead.
//!
//! A [`PrefetchBuffer`] owns two text buffers. The consumer drains the
//! active one character by character while a dedicated worker thread fills
//! the standby one from the underlying byte stream. Buffers travel between
//! the two sides over channels, so each buffer has exactly one owner at any
//! time and the only synchronisation point is the swap.

use std::io::{self, Read};
use std::mem;
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::thread::{self, JoinHandle};

/// Default size of each half, in bytes of decoded text.
pub const DEFAULT_CAPACITY: usize = 4 * 1024 * 1024;

const READ_CHUNK: usize = 64 * 1024;
const BYTE_ORDER_MARK: char = '\u{feff}';

/// A pull-based source of decoded characters.
pub trait CharSource {
    /// Returns the next character, or `None` at the end of the stream.
    fn next_char(&mut self) -> io::Result<Option<char>>;
}

impl CharSource for std::str::Chars<'_> {
    fn next_char(&mut self) -> io::Result<Option<char>> {
        Ok(self.next())
    }
}

pub struct PrefetchBuffer {
    active: String,
    position: usize,
    requests: Option<SyncSender<String>>,
    fills: Receiver<io::Result<String>>,
    pending: bool,
    worker: Option<JoinHandle<()>>,
}

/// Worker side of a [`PrefetchBuffer`]: receives empty buffers, fills them
/// from a reader and hands them back.
pub struct Pump {
    requests: Receiver<String>,
    fills: SyncSender<io::Result<String>>,
    capacity: usize,
}

impl Pump {
    /// Serves fill requests from `reader` until the consumer goes away or the
    /// reader fails. Read errors are delivered to the consumer.
    pub fn run<R: Read>(self, mut reader: R) -> io::Result<()> {
        let mut decoder = Utf8Decoder::default();
        let mut chunk = vec![0u8; READ_CHUNK.min(self.capacity)];

        while let Ok(mut buffer) = self.requests.recv() {
            buffer.clear();
            let filled = decoder.fill(&mut reader, &mut buffer, &mut chunk, self.capacity);
            let failed = filled.is_err();
            if self.fills.send(filled.map(|()| buffer)).is_err() || failed {
                break;
            }
        }
        Ok(())
    }
}

/// Incremental UTF-8 decoding that tolerates sequences split across reads.
#[derive(Default)]
struct Utf8Decoder {
    carry: Vec<u8>,
    started: bool,
    eof: bool,
}

impl Utf8Decoder {
    /// Appends at least `capacity` bytes of text to `out`, unless the reader
    /// hits end of stream first. An empty `out` therefore means end of stream.
    fn fill<R: Read>(
        &mut self,
        reader: &mut R,
        out: &mut String,
        chunk: &mut [u8],
        capacity: usize,
    ) -> io::Result<()> {
        while out.len() < capacity && !self.eof {
            let want = capacity.saturating_sub(out.len()).min(chunk.len()).max(1);
            let Some(window) = chunk.get_mut(..want) else {
                break;
            };
            match reader.read(window) {
                Ok(0) => self.eof = true,
                Ok(n) => self.carry.extend_from_slice(window.get(..n).unwrap_or_default()),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
            self.decode(out);
        }
        Ok(())
    }

    fn decode(&mut self, out: &mut String) {
        let mut consumed = 0;
        loop {
            let rest = self.carry.get(consumed..).unwrap_or_default();
            match std::str::from_utf8(rest) {
                Ok(text) => {
                    out.push_str(text);
                    consumed = self.carry.len();
                    break;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    if let Some(Ok(text)) = rest.get(..valid).map(std::str::from_utf8) {
                        out.push_str(text);
                    }
                    match e.error_len() {
                        Some(invalid) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            consumed += valid + invalid;
                        }
                        // Truncated sequence at the very end of the stream.
                        None if self.eof => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            consumed = self.carry.len();
                            break;
                        }
                        None => {
                            consumed += valid;
                            break;
                        }
                    }
                }
            }
        }
        self.carry.drain(..consumed);

        if !self.started && !out.is_empty() {
            self.started = true;
            if out.starts_with(BYTE_ORDER_MARK) {
                out.drain(..BYTE_ORDER_MARK.len_utf8());
            }
        }
    }
}

impl PrefetchBuffer {
    /// Wraps `reader`, which is moved to the worker thread.
    pub fn new<R: Read + Send + 'static>(reader: R, capacity: usize) -> io::Result<Self> {
        Self::spawn(capacity, move |pump| pump.run(reader))
    }

    /// Starts a worker that runs `open` to obtain its stream and then serves
    /// fills through the given [`Pump`]. This allows streams that must be
    /// created on the worker thread, such as entries borrowed from an
    /// archive.
    ///
    /// Blocks until the first half is filled, and issues the background fill
    /// of the second half before returning.
    pub fn spawn<F>(capacity: usize, open: F) -> io::Result<Self>
    where
        F: FnOnce(Pump) -> io::Result<()> + Send + 'static,
    {
        let capacity = capacity.max(1);
        let (request_tx, request_rx) = mpsc::sync_channel(1);
        let (fill_tx, fill_rx) = mpsc::sync_channel(1);
        let failures = fill_tx.clone();
        let pump = Pump {
            requests: request_rx,
            fills: fill_tx,
            capacity,
        };

        let worker = thread::Builder::new()
            .name("prefetch".to_string())
            .spawn(move || {
                if let Err(e) = open(pump) {
                    let _ = failures.send(Err(e));
                }
            })?;

        let mut buffer = PrefetchBuffer {
            active: String::new(),
            position: 0,
            requests: Some(request_tx),
            fills: fill_rx,
            pending: false,
            worker: Some(worker),
        };

        buffer.request(String::with_capacity(capacity));
        buffer.active = buffer.await_fill()?;
        if !buffer.active.is_empty() {
            buffer.request(String::with_capacity(capacity));
        }
        Ok(buffer)
    }

    /// Returns the next character. Blocks only when the active half is
    /// drained and the standby half is still being filled.
    pub fn next_char(&mut self) -> io::Result<Option<char>> {
        loop {
            let next = self
                .active
                .get(self.position..)
                .and_then(|rest| rest.chars().next());
            if let Some(c) = next {
                self.position += c.len_utf8();
                return Ok(Some(c));
            }
            if !self.swap()? {
                return Ok(None);
            }
        }
    }

    /// Reads the next line into `line` without its terminator (`\n` or
    /// `\r\n`). Returns `false` once the stream is exhausted.
    pub fn read_line(&mut self, line: &mut String) -> io::Result<bool> {
        line.clear();
        let mut read_any = false;
        loop {
            let rest = self.active.get(self.position..).unwrap_or_default();
            if !rest.is_empty() {
                read_any = true;
                match memchr::memchr(b'\n', rest.as_bytes()) {
                    Some(end) => {
                        line.push_str(rest.get(..end).unwrap_or_default());
                        self.position += end + 1;
                        if line.ends_with('\r') {
                            line.pop();
                        }
                        return Ok(true);
                    }
                    None => {
                        line.push_str(rest);
                        self.position = self.active.len();
                    }
                }
            }
            if !self.swap()? {
                if line.ends_with('\r') {
                    line.pop();
                }
                return Ok(read_any);
            }
        }
    }

    /// Waits for the outstanding fill, then stops the worker and releases
    /// the underlying stream.
    pub fn close(mut self) -> io::Result<()> {
        self.shutdown()
    }

    /// Makes the standby half active. Returns `false` at end of stream.
    fn swap(&mut self) -> io::Result<bool> {
        if !self.pending {
            return Ok(false);
        }
        let filled = self.await_fill()?;
        if filled.is_empty() {
            self.active.clear();
            self.position = 0;
            return Ok(false);
        }
        let drained = mem::replace(&mut self.active, filled);
        self.position = 0;
        self.request(drained);
        Ok(true)
    }

    fn request(&mut self, buffer: String) {
        // A worker that already stopped reports why on the next await.
        if let Some(requests) = &self.requests {
            let _ = requests.send(buffer);
        }
        self.pending = true;
    }

    fn await_fill(&mut self) -> io::Result<String> {
        self.pending = false;
        match self.fills.recv() {
            Ok(fill) => fill,
            Err(_) => Err(io::Error::other("prefetch worker stopped")),
        }
    }

    fn shutdown(&mut self) -> io::Result<()> {
        if self.pending {
            let _ = self.await_fill();
        }
        self.requests = None;
        if let Some(worker) = self.worker.take() {
            worker
                .join()
                .map_err(|_| io::Error::other("prefetch worker panicked"))?;
        }
        Ok(())
    }
}

impl CharSource for PrefetchBuffer {
    fn next_char(&mut self) -> io::Result<Option<char>> {
        PrefetchBuffer::next_char(self)
    }
}

impl Drop for PrefetchBuffer {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn drain(buffer: &mut PrefetchBuffer) -> String {
        let mut text = String::new();
        while let Some(c) = buffer.next_char().unwrap() {
            text.push(c);
        }
        text
    }

    /// Yields its data, then fails.
    struct FailingReader {
        data: Cursor<Vec<u8>>,
    }

    impl Read for FailingReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.data.read(buf)? {
                0 => Err(io::Error::other("disk on fire")),
                n => Ok(n),
            }
        }
    }

    #[test]
    fn test_reads_across_many_swaps() {
        let text = "héllo wörld ✓ 𝄞 row data\n".repeat(50);
        for capacity in [1, 3, 7, 64, DEFAULT_CAPACITY] {
            let mut buffer =
                PrefetchBuffer::new(Cursor::new(text.clone().into_bytes()), capacity).unwrap();
            assert_eq!(drain(&mut buffer), text, "capacity {capacity}");
            // End of stream is sticky.
            assert_eq!(buffer.next_char().unwrap(), None);
            buffer.close().unwrap();
        }
    }

    #[test]
    fn test_empty_stream() {
        let mut buffer = PrefetchBuffer::new(Cursor::new(Vec::new()), 16).unwrap();
        assert_eq!(buffer.next_char().unwrap(), None);
        let mut line = String::from("stale");
        assert!(!buffer.read_line(&mut line).unwrap());
        assert!(line.is_empty());
    }

    #[test]
    fn test_byte_order_mark_is_dropped() {
        let bytes = "\u{feff}Date,Time\n".as_bytes().to_vec();
        let mut buffer = PrefetchBuffer::new(Cursor::new(bytes), 2).unwrap();
        assert_eq!(drain(&mut buffer), "Date,Time\n");
    }

    #[test]
    fn test_invalid_bytes_are_replaced() {
        let bytes = vec![b'a', 0xff, b'b', 0xe2, 0x9c];
        let mut buffer = PrefetchBuffer::new(Cursor::new(bytes), 2).unwrap();
        assert_eq!(drain(&mut buffer), "a\u{fffd}b\u{fffd}");
    }

    #[test]
    fn test_read_line() {
        let text = "first\r\nsecond\n\nlast";
        let mut buffer = PrefetchBuffer::new(Cursor::new(text.as_bytes().to_vec()), 4).unwrap();
        let mut line = String::new();
        let mut lines = Vec::new();
        while buffer.read_line(&mut line).unwrap() {
            lines.push(line.clone());
        }
        assert_eq!(lines, vec!["first", "second", "", "last"]);
    }

    #[test]
    fn test_read_errors_reach_the_consumer() {
        let reader = FailingReader {
            data: Cursor::new(b"abcdefgh".to_vec()),
        };
        let mut buffer = PrefetchBuffer::new(reader, 4).unwrap();
        let mut text = String::new();
        let err = loop {
            match buffer.next_char() {
                Ok(Some(c)) => text.push(c),
                Ok(None) => break None,
                Err(e) => break Some(e),
            }
        }
        .unwrap();
        assert_eq!(text, "abcdefgh");
        assert_eq!(err.to_string(), "disk on fire");
    }

    #[test]
    fn test_open_failure_surfaces_from_spawn() {
        let result = PrefetchBuffer::spawn(16, |_pump| {
            Err(io::Error::new(io::ErrorKind::NotFound, "no such entry"))
        });
        let err = result.err().unwrap();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_drop_mid_stream_joins_worker() {
        let text = "x".repeat(10_000);
        let mut buffer = PrefetchBuffer::new(Cursor::new(text.into_bytes()), 16).unwrap();
        assert_eq!(buffer.next_char().unwrap(), Some('x'));
        drop(buffer);
    }
}
