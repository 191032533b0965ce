//! Incremental reassembly of `\n\n`-delimited event frames.
//!
//! The assistant service streams blocks of text separated by a blank line.
//! HTTP delivers those bytes in chunks that bear no relation to the block
//! boundaries, so [`FrameDecoder`] buffers text between calls to
//! [`FrameDecoder::feed`] and only yields a [`Frame`] once its terminating
//! delimiter has arrived.

use std::borrow::Cow;

use tracing::debug;

use crate::observability::{STREAM_BYTES, STREAM_DISCARDED_BYTES, STREAM_FRAMES};

/// The delimiter that terminates every frame.
pub const FRAME_DELIMITER: &str = "\n\n";

/// One delimiter-bounded unit of the response stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    /// Everything between the previous delimiter and this frame's delimiter.
    pub payload: String,
    /// The delimiter that was consumed to close this frame.
    pub delimiter: &'static str,
    /// Zero-based position of this frame within its stream.
    pub sequence: u64,
}

/// Incremental frame decoder for one response stream.
///
/// Bytes are decoded as UTF-8 as they arrive. A code point split across two
/// chunks is held back until it is complete; bytes that can never form valid
/// UTF-8 are replaced with U+FFFD. The decoder keeps a scan cursor so that text
/// already searched for a delimiter is not searched again.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: String,
    // Start of text not yet emitted as a frame.
    consumed: usize,
    // Where the next delimiter search begins; always a char boundary.
    scanned: usize,
    // Trailing bytes of an incomplete UTF-8 sequence.
    pending: Vec<u8>,
    sequence: u64,
}

impl FrameDecoder {
    /// Creates a decoder with an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `chunk` to the buffer and returns the frames it completes.
    ///
    /// The returned iterator is lazy: frames are cut from the buffer as it is
    /// advanced. Frames left unread stay buffered and are yielded by the next
    /// call.
    pub fn feed(&mut self, chunk: &[u8]) -> Frames<'_> {
        self.compact();
        STREAM_BYTES.count(chunk.len() as u64);
        self.decode_utf8(chunk);
        Frames { decoder: self }
    }

    /// Number of bytes held that do not yet belong to a complete frame.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len() - self.consumed + self.pending.len()
    }

    /// Signals the end of the stream.
    ///
    /// Anything after the last delimiter is a truncated frame and is dropped.
    pub fn finish(self) {
        let discarded = self.buffered_len();
        if discarded > 0 {
            STREAM_DISCARDED_BYTES.count(discarded as u64);
            debug!(
                discarded,
                frames = self.sequence,
                "stream ended with an unterminated frame"
            );
        }
    }

    fn compact(&mut self) {
        if self.consumed > 0 {
            self.buffer.drain(..self.consumed);
            self.scanned -= self.consumed;
            self.consumed = 0;
        }
    }

    fn decode_utf8(&mut self, chunk: &[u8]) {
        if chunk.is_empty() {
            return;
        }
        let input: Cow<'_, [u8]> = if self.pending.is_empty() {
            Cow::Borrowed(chunk)
        } else {
            let mut joined = std::mem::take(&mut self.pending);
            joined.extend_from_slice(chunk);
            Cow::Owned(joined)
        };
        let mut rest: &[u8] = &input;
        loop {
            match std::str::from_utf8(rest) {
                Ok(text) => {
                    self.buffer.push_str(text);
                    return;
                }
                Err(err) => {
                    let (valid, after) = rest.split_at(err.valid_up_to());
                    if let Ok(valid) = std::str::from_utf8(valid) {
                        self.buffer.push_str(valid);
                    }
                    match err.error_len() {
                        Some(len) => {
                            self.buffer.push(char::REPLACEMENT_CHARACTER);
                            rest = &after[len..];
                        }
                        None => {
                            self.pending.extend_from_slice(after);
                            return;
                        }
                    }
                }
            }
        }
    }

    fn next_frame(&mut self) -> Option<Frame> {
        match self.buffer[self.scanned..].find(FRAME_DELIMITER) {
            Some(offset) => {
                let end = self.scanned + offset;
                let payload = self.buffer[self.consumed..end].to_string();
                self.consumed = end + FRAME_DELIMITER.len();
                self.scanned = self.consumed;
                let sequence = self.sequence;
                self.sequence += 1;
                STREAM_FRAMES.click();
                Some(Frame {
                    payload,
                    delimiter: FRAME_DELIMITER,
                    sequence,
                })
            }
            None => {
                // A trailing newline may be the first half of a delimiter.
                let resume = if self.buffer.ends_with('\n') {
                    self.buffer.len() - 1
                } else {
                    self.buffer.len()
                };
                self.scanned = resume.max(self.consumed);
                None
            }
        }
    }
}

/// Lazy sequence of frames completed by one [`FrameDecoder::feed`] call.
pub struct Frames<'a> {
    decoder: &'a mut FrameDecoder,
}

impl Iterator for Frames<'_> {
    type Item = Frame;

    fn next(&mut self) -> Option<Frame> {
        self.decoder.next_frame()
    }
}
