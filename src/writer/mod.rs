//! The byte-writer contract and its composition protocol.
//!
//! # Writers
//!
//! A [`Writer`] moves bytes from a producer into some destination: an
//! in-memory vector ([`VecWriter`]), a `write(2)`-style sink behind a buffer
//! ([`BufferedWriter`]), or another writer wrapped by a transform
//! ([`LimitingWriter`], [`FramedSnappyWriter`]). Because every layer's
//! destination is itself a writer, layers compose arbitrarily.
//!
//! # The window
//!
//! The fast path is the *cursor window*: a contiguous writable region the
//! writer currently exposes. [`Writer::push`] guarantees at least
//! `min_length` writable bytes, [`Writer::chunk_mut`] hands out the region,
//! and [`Writer::advance`] commits bytes the producer wrote into it. When
//! the destination can expose its own memory (the vector sink), producers
//! write straight into it with no copy.
//!
//! Every operation that crosses the window/destination boundary first
//! publishes the window contents into the destination (*sync-buffer*), then
//! re-acquires a window from it (*make-buffer*). Partial failures in that
//! pair latch into the layer that detected them.
//!
//! # Failure
//!
//! Operations report failure by returning `false` (or `None`) and latching a
//! [`Status`] retrievable via [`Writer::status`]. Once failed, `healthy()`
//! is false and all mutating operations short-circuit. Closing is idempotent
//! and cascades to an owned destination; dropping an open writer closes it.
//!
//! [`VecWriter`]: crate::writer::vec::VecWriter
//! [`BufferedWriter`]: crate::writer::buffered::BufferedWriter
//! [`LimitingWriter`]: crate::writer::limiting::LimitingWriter
//! [`FramedSnappyWriter`]: crate::framed::FramedSnappyWriter

use crate::reader::BytesReader;
use crate::status::Status;

pub mod buffered;
pub mod dest;
pub mod limiting;
pub mod pushable;
pub mod vec;

/// An absolute byte offset in a stream.
pub type Position = u64;

/// How far a flush must surface buffered bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushScope {
    /// This layer must hand its bytes to its destination.
    FromObject,
    /// The whole stack must hand its bytes to the operating system.
    FromProcess,
    /// The operating system must persist the bytes to stable storage.
    FromMachine,
}

/// A push-oriented byte writer. See the [module docs](self) for the window
/// protocol shared by all implementations.
pub trait Writer {
    /// Ensures the window has at least `min_length` writable bytes starting
    /// at the cursor, growing or refreshing it as needed.
    /// `recommended_length` is a sizing hint and may be 0.
    ///
    /// Returns `false` iff the writer has failed.
    fn push(&mut self, min_length: usize, recommended_length: usize) -> bool;

    /// The writable window. Empty until a `push` succeeds.
    fn chunk_mut(&mut self) -> &mut [u8];

    /// Commits `len` bytes written into `chunk_mut()`.
    ///
    /// `len` must not exceed `available()`.
    fn advance(&mut self, len: usize);

    /// Writable bytes currently in the window.
    fn available(&self) -> usize;

    /// Appends `src`, copying into the window when it fits and falling back
    /// to a destination-specific slow path (which may bypass the window)
    /// otherwise.
    fn write(&mut self, src: &[u8]) -> bool;

    /// Appends `len` zero bytes.
    fn write_zeros(&mut self, len: u64) -> bool;

    /// Surfaces buffered bytes to the given scope. A transient flush failure
    /// latches only if the layer's own semantics require it; already
    /// delivered bytes stay delivered.
    fn flush(&mut self, scope: FlushScope) -> bool;

    /// Synchronizes all layers and closes this writer, cascading to the
    /// destination iff it is owned. Idempotent. Returns `healthy()`.
    fn close(&mut self) -> bool;

    /// The logical stream position: monotonically non-decreasing across
    /// non-seeking operations.
    fn pos(&self) -> Position;

    fn healthy(&self) -> bool;

    fn is_open(&self) -> bool;

    /// The latched failure, if any.
    fn status(&self) -> Option<&Status>;

    fn supports_random_access(&self) -> bool {
        false
    }

    fn supports_size(&self) -> bool {
        false
    }

    fn supports_truncate(&self) -> bool {
        false
    }

    fn supports_read_mode(&self) -> bool {
        false
    }

    /// True if this writer would rather receive copies than expose its
    /// window for zero-copy handover.
    fn prefers_copying(&self) -> bool {
        false
    }

    /// Moves the position. Requires `supports_random_access()`; latches
    /// *unimplemented* otherwise. Returns `false` without latching when
    /// `new_pos` is past the end.
    fn seek(&mut self, new_pos: Position) -> bool;

    /// The current stream size. Requires `supports_size()`.
    fn size(&mut self) -> Option<Position>;

    /// Shrinks the stream to `new_size`. Requires `supports_truncate()`.
    fn truncate(&mut self, new_size: Position) -> bool;

    /// Switches to reading the bytes written so far, starting at
    /// `initial_pos`. Requires `supports_read_mode()`.
    fn read_mode(&mut self, initial_pos: Position) -> Option<BytesReader>;
}

/// Zero-fill over the push/window path; shared by writers without a cheaper
/// destination-specific way to write zeros.
pub(crate) fn write_zeros_via_push<W: Writer + ?Sized>(writer: &mut W, mut len: u64) -> bool {
    while len > 0 {
        let hint = len.min(1 << 16) as usize;
        if !writer.push(1, hint) {
            return false;
        }
        let n = (writer.available() as u64).min(len) as usize;
        writer.chunk_mut()[..n].fill(0);
        writer.advance(n);
        len -= n as u64;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::vec::VecWriter;

    #[test]
    fn write_zeros_crosses_window_boundaries() {
        let mut writer = VecWriter::new();
        assert!(writer.write(b"abc"));
        assert!(writer.write_zeros(5));
        assert!(writer.close());
        assert_eq!(writer.as_slice(), b"abc\0\0\0\0\0");
    }
}
