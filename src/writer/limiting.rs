//! A writer that caps the absolute position of an inner writer.
//!
//! The limiting layer owns no buffer of its own: its window is a narrowed
//! re-borrow of the inner writer's window, so the wrapper costs nothing on
//! the fast path. All capability flags and all status annotation are
//! delegated to the inner writer, so the wrapper is invisible in error
//! messages.
//!
//! On overrun the inner writer is left exactly at the cap: an oversized
//! `write` delivers the permitted prefix before latching *resource
//! exhausted*. In exact mode, closing below the cap latches *invalid
//! argument*.

use crate::object::ObjectState;
use crate::reader::BytesReader;
use crate::status::Status;
use crate::writer::dest::Dest;
use crate::writer::{FlushScope, Position, Writer};

pub struct LimitingWriter<D: Dest> {
    state: ObjectState,
    dest: D,
    max_pos: Position,
    /// Require the final position to equal `max_pos` on close.
    exact: bool,
}

impl<D: Dest> LimitingWriter<D> {
    /// Caps the inner writer at the absolute position `max_pos`.
    pub fn with_max_pos(dest: D, max_pos: Position) -> Self {
        let mut writer = Self { state: ObjectState::new(), dest, max_pos, exact: false };
        if writer.dest.get().pos() > max_pos {
            writer.state.fail(Status::invalid_argument(format!(
                "position limit {max_pos} is below the current position"
            )));
        }
        writer
    }

    /// Caps the inner writer `max_length` bytes past its current position.
    pub fn with_max_length(dest: D, max_length: u64) -> Self {
        let pos = dest.get().pos();
        match pos.checked_add(max_length) {
            Some(max_pos) => Self::with_max_pos(dest, max_pos),
            None => {
                let mut writer =
                    Self { state: ObjectState::new(), dest, max_pos: Position::MAX, exact: false };
                writer.state.fail(Status::invalid_argument(format!(
                    "Not enough data: expected {pos} + {max_length} \
                     which overflows the writer position"
                )));
                writer
            }
        }
    }

    /// In exact mode closing below the cap fails with *invalid argument*.
    pub fn exact(mut self, exact: bool) -> Self {
        self.exact = exact;
        self
    }

    pub fn max_pos(&self) -> Position {
        self.max_pos
    }

    pub fn inner(&self) -> &D::Target {
        self.dest.get()
    }

    pub fn inner_mut(&mut self) -> &mut D::Target {
        self.dest.get_mut()
    }

    fn remaining(&self) -> u64 {
        self.max_pos.saturating_sub(self.dest.get().pos())
    }

    /// Annotation is fully delegated: the inner status is adopted verbatim.
    fn fail_over_inner(&mut self) -> bool {
        let status = self
            .dest
            .get()
            .status()
            .cloned()
            .unwrap_or_else(|| Status::unknown("inner writer failed"));
        self.state.fail(status)
    }

    fn fail_limit_exceeded(&mut self) -> bool {
        self.state.fail(Status::resource_exhausted("Position limit exceeded"))
    }
}

impl<D: Dest> Writer for LimitingWriter<D> {
    fn push(&mut self, min_length: usize, recommended_length: usize) -> bool {
        if !self.state.check_open() {
            return false;
        }
        if min_length as u64 > self.remaining() {
            // A narrowed window can never satisfy this push.
            return self.fail_limit_exceeded();
        }
        let recommended = (recommended_length as u64).min(self.remaining()) as usize;
        if self.dest.get_mut().push(min_length, recommended) {
            true
        } else {
            self.fail_over_inner()
        }
    }

    fn chunk_mut(&mut self) -> &mut [u8] {
        let remaining = self.remaining().min(usize::MAX as u64) as usize;
        let window = self.dest.get_mut().chunk_mut();
        let narrowed = window.len().min(remaining);
        &mut window[..narrowed]
    }

    fn advance(&mut self, len: usize) {
        debug_assert!(len as u64 <= self.remaining());
        self.dest.get_mut().advance(len);
    }

    fn available(&self) -> usize {
        (self.dest.get().available() as u64).min(self.remaining()) as usize
    }

    fn write(&mut self, src: &[u8]) -> bool {
        if !self.state.check_open() {
            return false;
        }
        let remaining = self.remaining();
        if src.len() as u64 > remaining {
            // Deliver the permitted prefix so the inner writer ends exactly
            // at the cap, then latch.
            let take = remaining as usize;
            if take > 0 && !self.dest.get_mut().write(&src[..take]) {
                return self.fail_over_inner();
            }
            return self.fail_limit_exceeded();
        }
        if self.dest.get_mut().write(src) {
            true
        } else {
            self.fail_over_inner()
        }
    }

    fn write_zeros(&mut self, len: u64) -> bool {
        if !self.state.check_open() {
            return false;
        }
        let remaining = self.remaining();
        if len > remaining {
            if remaining > 0 && !self.dest.get_mut().write_zeros(remaining) {
                return self.fail_over_inner();
            }
            return self.fail_limit_exceeded();
        }
        if self.dest.get_mut().write_zeros(len) {
            true
        } else {
            self.fail_over_inner()
        }
    }

    fn flush(&mut self, scope: FlushScope) -> bool {
        if !self.state.check_open() {
            return false;
        }
        if self.dest.get_mut().flush(scope) {
            true
        } else {
            self.fail_over_inner()
        }
    }

    fn close(&mut self) -> bool {
        if self.state.is_open() {
            if self.state.healthy() && self.exact && self.dest.get().pos() < self.max_pos {
                self.state.fail(Status::invalid_argument(format!(
                    "Not enough data: expected {}",
                    self.max_pos
                )));
            }
            if self.dest.is_owning() && !self.dest.get_mut().close() {
                self.fail_over_inner();
            }
            self.state.mark_closed();
        }
        self.state.healthy()
    }

    fn pos(&self) -> Position {
        self.dest.get().pos()
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
        self.dest.get().supports_random_access()
    }

    fn supports_size(&self) -> bool {
        self.dest.get().supports_size()
    }

    fn supports_truncate(&self) -> bool {
        self.dest.get().supports_truncate()
    }

    fn supports_read_mode(&self) -> bool {
        self.dest.get().supports_read_mode()
    }

    fn prefers_copying(&self) -> bool {
        self.dest.get().prefers_copying()
    }

    fn seek(&mut self, new_pos: Position) -> bool {
        if !self.state.check_open() {
            return false;
        }
        let target = new_pos.min(self.max_pos);
        let ok = self.dest.get_mut().seek(target);
        if !ok && !self.dest.get().healthy() {
            return self.fail_over_inner();
        }
        ok && target == new_pos
    }

    fn size(&mut self) -> Option<Position> {
        if !self.state.check_open() {
            return None;
        }
        match self.dest.get_mut().size() {
            Some(size) => Some(size.min(self.max_pos)),
            None => {
                self.fail_over_inner();
                None
            }
        }
    }

    fn truncate(&mut self, new_size: Position) -> bool {
        if !self.state.check_open() {
            return false;
        }
        if self.dest.get_mut().truncate(new_size) {
            true
        } else if !self.dest.get().healthy() {
            self.fail_over_inner()
        } else {
            false
        }
    }

    fn read_mode(&mut self, initial_pos: Position) -> Option<BytesReader> {
        if !self.state.check_open() {
            return None;
        }
        match self.dest.get_mut().read_mode(initial_pos) {
            Some(reader) => Some(reader),
            None => {
                self.fail_over_inner();
                None
            }
        }
    }
}

impl<D: Dest> Drop for LimitingWriter<D> {
    fn drop(&mut self) {
        if self.state.is_open() {
            self.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::StatusKind;
    use crate::writer::dest::{Borrowed, Owned};
    use crate::writer::vec::VecWriter;

    #[test]
    fn writes_up_to_the_cap_succeed() {
        let mut inner = VecWriter::new();
        {
            let mut writer = LimitingWriter::with_max_pos(Borrowed(&mut inner), 10);
            assert!(writer.write(b"0123456789"));
            assert!(writer.close());
        }
        assert_eq!(inner.as_slice(), b"0123456789");
    }

    #[test]
    fn overrun_leaves_inner_at_the_cap() {
        let mut inner = VecWriter::new();
        {
            let mut writer = LimitingWriter::with_max_pos(Borrowed(&mut inner), 10);
            assert!(!writer.write(b"0123456789a"));
            assert_eq!(writer.status().unwrap().kind(), StatusKind::ResourceExhausted);
            assert_eq!(writer.pos(), 10);
        }
        assert_eq!(inner.as_slice(), b"0123456789");
    }

    #[test]
    fn exact_mode_requires_the_cap_to_be_reached() {
        let mut writer =
            LimitingWriter::with_max_pos(Owned(VecWriter::new()), 10).exact(true);
        assert!(writer.write(b"012345678"));
        assert!(!writer.close());
        let status = writer.status().unwrap();
        assert_eq!(status.kind(), StatusKind::InvalidArgument);
        assert_eq!(status.message(), "Not enough data: expected 10");
    }

    #[test]
    fn window_is_narrowed_at_the_cap() {
        let mut writer = LimitingWriter::with_max_pos(Owned(VecWriter::new()), 6);
        assert!(writer.push(4, 64));
        assert!(writer.chunk_mut().len() <= 6);
        writer.chunk_mut()[..4].copy_from_slice(b"abcd");
        writer.advance(4);
        assert_eq!(writer.available(), 2);
        assert!(!writer.push(4, 0));
        assert_eq!(writer.status().unwrap().kind(), StatusKind::ResourceExhausted);
    }

    #[test]
    fn capability_flags_delegate() {
        let mut inner = VecWriter::new();
        let mut writer = LimitingWriter::with_max_pos(Borrowed(&mut inner), 100);
        assert!(writer.supports_random_access());
        assert!(writer.supports_size());
        assert!(writer.supports_truncate());
        assert!(writer.supports_read_mode());
        assert!(writer.write(b"abcdef"));
        assert_eq!(writer.size(), Some(6));
        assert!(writer.seek(2));
        assert!(writer.write(b"XY"));
        assert!(!writer.seek(101));
        // The inner vector is only 6 bytes long, so the clamped seek stops
        // at its end without failing the writer.
        assert_eq!(writer.pos(), 6);
        assert!(writer.healthy());
    }

    #[test]
    fn seek_clamps_to_the_cap() {
        let mut inner = VecWriter::new();
        assert!(inner.write(&[0u8; 20]));
        assert!(inner.seek(0));
        let mut writer = LimitingWriter::with_max_pos(Borrowed(&mut inner), 10);
        assert!(!writer.seek(15));
        assert_eq!(writer.pos(), 10);
        assert!(writer.healthy());
    }

    #[test]
    fn size_is_clamped() {
        let mut inner = VecWriter::new();
        assert!(inner.write(&[0u8; 20]));
        assert!(inner.seek(5));
        let mut writer = LimitingWriter::with_max_pos(Borrowed(&mut inner), 10);
        assert_eq!(writer.size(), Some(10));
    }
}
