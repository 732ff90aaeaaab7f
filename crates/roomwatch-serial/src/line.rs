//! Line framing and decoding.
//!
//! The device writes one JSON object per line. Bytes arrive in arbitrary
//! chunks, so `LineSplitter` reassembles them into delimiter-terminated lines
//! and `decode_line` turns each line into a `Reading`.

use crate::error::{SerialError, SerialResult};
use roomwatch_core::Reading;

/// Output of the splitter for one chunk of input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A complete line without its delimiter.
    Line(Vec<u8>),
    /// A line exceeded the length limit and was dropped.
    Overflow { discarded: usize },
}

/// Incremental delimiter-based line splitter.
///
/// A line longer than `max_line_bytes` is dropped as a whole: its buffered
/// prefix is reported as `Frame::Overflow` and the rest is skipped up to the
/// next delimiter.
#[derive(Debug)]
pub struct LineSplitter {
    delimiter: Vec<u8>,
    max_line_bytes: usize,
    buffer: Vec<u8>,
    discarding: bool,
}

impl LineSplitter {
    pub fn new(delimiter: &[u8], max_line_bytes: usize) -> Self {
        let delimiter = if delimiter.is_empty() {
            b"\n".to_vec()
        } else {
            delimiter.to_vec()
        };
        Self {
            delimiter,
            max_line_bytes: max_line_bytes.max(1),
            buffer: Vec::new(),
            discarding: false,
        }
    }

    /// Feed a chunk of bytes, returning every frame it completes.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<Frame> {
        self.buffer.extend_from_slice(bytes);
        let mut frames = Vec::new();

        while let Some(pos) = self.find_delimiter() {
            let line: Vec<u8> = self.buffer.drain(..pos).collect();
            self.buffer.drain(..self.delimiter.len());

            if self.discarding {
                // Tail of an overlong line.
                self.discarding = false;
                continue;
            }
            if line.len() > self.max_line_bytes {
                frames.push(Frame::Overflow {
                    discarded: line.len(),
                });
                continue;
            }
            frames.push(Frame::Line(line));
        }

        // A full-length line may be followed by a partial delimiter.
        let keep = self.delimiter.len() - 1;
        if self.buffer.len() > self.max_line_bytes + keep {
            // Keep enough bytes to recognise a delimiter split across chunks.
            let cut = self.buffer.len() - keep;
            self.buffer.drain(..cut);
            if !self.discarding {
                frames.push(Frame::Overflow { discarded: cut });
                self.discarding = true;
            }
        }

        frames
    }

    /// Bytes buffered for the current, incomplete line.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    fn find_delimiter(&self) -> Option<usize> {
        let d = &self.delimiter;
        if self.buffer.len() < d.len() {
            return None;
        }
        self.buffer.windows(d.len()).position(|w| w == d.as_slice())
    }
}

/// Decode one raw line into a reading.
///
/// Returns `Ok(None)` for blank lines. Anything that is not a UTF-8 JSON
/// object is a `SerialError::Decode`.
pub fn decode_line(raw: &[u8]) -> SerialResult<Option<Reading>> {
    let text = std::str::from_utf8(raw).map_err(|e| SerialError::Decode {
        line: String::from_utf8_lossy(raw).into_owned(),
        reason: format!("invalid UTF-8: {e}"),
    })?;

    let text = text.trim();
    if text.is_empty() {
        return Ok(None);
    }

    let value: serde_json::Value =
        serde_json::from_str(text).map_err(|e| SerialError::Decode {
            line: text.to_string(),
            reason: e.to_string(),
        })?;

    Reading::from_value(value)
        .map(Some)
        .map_err(|e| SerialError::Decode {
            line: text.to_string(),
            reason: e.to_string(),
        })
}
