// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Delimiter based frame reassembly.

use tracing::debug;

/// Append-only byte accumulator that splits a byte stream into
/// delimiter-terminated frames.
pub struct FrameBuffer {
    buffer: Vec<u8>,
    delimiter: Option<u8>,
}

impl FrameBuffer {
    /// Create a buffer without a configured delimiter.
    pub fn new() -> Self {
        Self {
            buffer: Vec::with_capacity(1024),
            delimiter: None,
        }
    }

    /// Create a buffer that frames on `delimiter`.
    pub fn with_delimiter(delimiter: u8) -> Self {
        let mut buf = Self::new();
        buf.delimiter = Some(delimiter);
        buf
    }

    /// Set or clear the delimiter used by [`next_frame`](Self::next_frame).
    pub fn set_delimiter(&mut self, delimiter: Option<u8>) {
        self.delimiter = delimiter;
    }

    pub fn delimiter(&self) -> Option<u8> {
        self.delimiter
    }

    /// Append a single byte.
    pub fn push(&mut self, byte: u8) {
        self.buffer.push(byte);
    }

    /// Append a chunk of bytes.
    pub fn append(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Remove and return everything up to and including the first `delim`.
    ///
    /// Returns `None` and leaves the buffer untouched when `delim` is absent.
    pub fn extract_until(&mut self, delim: u8) -> Option<Vec<u8>> {
        let pos = self.buffer.iter().position(|&b| b == delim)?;
        let rest = self.buffer.split_off(pos + 1);
        let frame = std::mem::replace(&mut self.buffer, rest);
        debug!("Frame extracted: {} bytes, {} pending", frame.len(), self.buffer.len());
        Some(frame)
    }

    /// Extract the next frame using the configured delimiter.
    ///
    /// Returns `None` when no delimiter is configured.
    pub fn next_frame(&mut self) -> Option<Vec<u8>> {
        let delim = self.delimiter?;
        self.extract_until(delim)
    }

    /// Byte at `index`, or `None` when out of range.
    pub fn get(&self, index: usize) -> Option<u8> {
        self.buffer.get(index).copied()
    }

    /// Byte at `index`, or `0x00` when out of range.
    pub fn get_or_zero(&self, index: usize) -> u8 {
        self.get(index).unwrap_or(0x00)
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buffer
    }

    /// Drop all pending bytes.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}
