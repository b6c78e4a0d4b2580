//! In-memory sink whose window is the destination vector itself.
//!
//! `VecWriter` is the canonical direct-window writer: `push` grows the
//! vector and exposes its spare tail, so producers write into destination
//! memory with no intermediate copy. It supports the full capability set
//! (random access, size, truncate, read mode), which makes it the usual
//! bottom of a layered stack and the reference sink in tests.

use crate::object::ObjectState;
use crate::reader::BytesReader;
use crate::status::Status;
use crate::writer::{write_zeros_via_push, FlushScope, Position, Writer};

const MIN_GROWTH: usize = 256;

pub struct VecWriter {
    state: ObjectState,
    dest: Vec<u8>,
    /// Absolute write index; equals `pos()`.
    cursor: usize,
    /// Logical stream size: the furthest the cursor has ever reached.
    len: usize,
}

impl VecWriter {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            state: ObjectState::new(),
            dest: vec![0; capacity],
            cursor: 0,
            len: 0,
        }
    }

    /// The bytes written so far.
    pub fn as_slice(&self) -> &[u8] {
        &self.dest[..self.len]
    }

    /// Releases the destination vector, trimmed to the bytes written.
    pub fn into_vec(mut self) -> Vec<u8> {
        self.dest.truncate(self.len);
        std::mem::take(&mut self.dest)
    }

    fn commit(&mut self) {
        if self.cursor > self.len {
            self.len = self.cursor;
        }
    }
}

impl Default for VecWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl Writer for VecWriter {
    fn push(&mut self, min_length: usize, recommended_length: usize) -> bool {
        if !self.state.check_open() {
            return false;
        }
        let wanted = min_length.max(recommended_length);
        if self.dest.len() - self.cursor < wanted {
            let grown = (self.dest.len() * 2).max(self.cursor + wanted).max(MIN_GROWTH);
            self.dest.resize(grown, 0);
        }
        true
    }

    fn chunk_mut(&mut self) -> &mut [u8] {
        &mut self.dest[self.cursor..]
    }

    fn advance(&mut self, len: usize) {
        debug_assert!(len <= self.dest.len() - self.cursor);
        self.cursor += len;
        self.commit();
    }

    fn available(&self) -> usize {
        self.dest.len() - self.cursor
    }

    fn write(&mut self, src: &[u8]) -> bool {
        if !self.push(src.len(), 0) {
            return false;
        }
        self.dest[self.cursor..self.cursor + src.len()].copy_from_slice(src);
        self.cursor += src.len();
        self.commit();
        true
    }

    fn write_zeros(&mut self, len: u64) -> bool {
        write_zeros_via_push(self, len)
    }

    fn flush(&mut self, _scope: FlushScope) -> bool {
        // Bytes land in the destination as they are written.
        self.state.check_open()
    }

    fn close(&mut self) -> bool {
        if self.state.is_open() {
            self.dest.truncate(self.len);
            self.state.mark_closed();
        }
        self.state.healthy()
    }

    fn pos(&self) -> Position {
        self.cursor as Position
    }

    fn healthy(&self) -> bool {
        self.state.healthy()
    }

    fn is_open(&self) -> bool {
        self.state.is_open()
    }

    fn status(&self) -> Option<&Status> {
        self.state.status()
    }

    fn supports_random_access(&self) -> bool {
        true
    }

    fn supports_size(&self) -> bool {
        true
    }

    fn supports_truncate(&self) -> bool {
        true
    }

    fn supports_read_mode(&self) -> bool {
        true
    }

    fn prefers_copying(&self) -> bool {
        true
    }

    fn seek(&mut self, new_pos: Position) -> bool {
        if !self.state.check_open() {
            return false;
        }
        let target = (new_pos as usize).min(self.len);
        self.cursor = target;
        target as Position == new_pos
    }

    fn size(&mut self) -> Option<Position> {
        if !self.state.check_open() {
            return None;
        }
        Some(self.len as Position)
    }

    fn truncate(&mut self, new_size: Position) -> bool {
        if !self.state.check_open() {
            return false;
        }
        if new_size > self.len as Position {
            return false;
        }
        self.len = new_size as usize;
        self.cursor = self.cursor.min(self.len);
        true
    }

    fn read_mode(&mut self, initial_pos: Position) -> Option<BytesReader> {
        if !self.state.check_open() {
            return None;
        }
        let mut reader = BytesReader::new(self.as_slice().to_vec());
        reader.seek(initial_pos.min(self.len as Position));
        Some(reader)
    }
}

impl Drop for VecWriter {
    fn drop(&mut self) {
        if self.state.is_open() {
            self.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_writes_land_in_destination() {
        let mut writer = VecWriter::new();
        assert!(writer.push(4, 0));
        writer.chunk_mut()[..4].copy_from_slice(b"abcd");
        writer.advance(4);
        assert_eq!(writer.pos(), 4);
        assert!(writer.write(b"ef"));
        assert!(writer.close());
        assert_eq!(writer.as_slice(), b"abcdef");
    }

    #[test]
    fn seek_back_overwrites() {
        let mut writer = VecWriter::new();
        assert!(writer.write(b"abcdef"));
        assert!(writer.seek(2));
        assert!(writer.write(b"XY"));
        assert_eq!(writer.size(), Some(6));
        assert_eq!(writer.as_slice(), b"abXYef");
        assert!(!writer.seek(100));
        assert_eq!(writer.pos(), 6);
    }

    #[test]
    fn truncate_and_read_mode() {
        let mut writer = VecWriter::new();
        assert!(writer.write(b"abcdef"));
        assert!(writer.truncate(4));
        assert!(!writer.truncate(10));
        let mut reader = writer.read_mode(1).unwrap();
        assert_eq!(reader.read_to_end(), &b"bcd"[..]);
    }

    #[test]
    fn close_is_idempotent() {
        let mut writer = VecWriter::new();
        assert!(writer.write(b"x"));
        assert!(writer.close());
        assert!(writer.close());
        assert!(!writer.is_open());
        assert!(!writer.write(b"y"));
        assert_eq!(
            writer.status().unwrap().kind(),
            crate::status::StatusKind::FailedPrecondition
        );
    }
}
