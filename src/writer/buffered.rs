//! Buffered scaffold for `write(2)`-style destinations.
//!
//! Sinks like files and pipes cannot expose their memory as a window, so
//! [`BufferedWriter`] owns a private buffer, exposes it as the window, and
//! hands filled regions to the sink in large writes. Short writes are looped
//! and `EINTR` is retried here, so concrete sinks stay trivial.
//!
//! The scaffold targets stream sinks: random access, size, truncate, and
//! read mode are unsupported and latch accordingly.

use std::fs::File;
use std::io::{self};
use std::path::Path;

use tracing::{debug, warn};

use crate::object::ObjectState;
use crate::reader::BytesReader;
use crate::status::Status;
use crate::writer::{write_zeros_via_push, FlushScope, Position, Writer};

/// Default window size: 64 KiB.
pub const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;

/// A blocking byte destination with `write(2)` semantics.
///
/// `sync` surfaces already-written bytes to stable storage (the machine
/// flush scope); in-memory destinations have nothing to do.
pub trait Sink: io::Write {
    fn sync(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Sink for File {
    fn sync(&mut self) -> io::Result<()> {
        self.sync_all()
    }
}

impl Sink for Vec<u8> {}

impl Sink for io::Cursor<Vec<u8>> {}

impl Sink for io::Sink {}

pub struct BufferedWriter<T: Sink> {
    state: ObjectState,
    dest: T,
    buf: Vec<u8>,
    /// Bytes of `buf` filled and not yet handed to the sink.
    cursor: usize,
    /// Absolute position of `buf[0]`: bytes already delivered to the sink.
    start_pos: Position,
    /// Annotation attached to every failure, e.g. the file name.
    context: Option<String>,
}

impl<T: Sink> BufferedWriter<T> {
    pub fn new(dest: T) -> Self {
        Self::with_buffer_size(dest, DEFAULT_BUFFER_SIZE)
    }

    pub fn with_buffer_size(dest: T, buffer_size: usize) -> Self {
        Self {
            state: ObjectState::new(),
            dest,
            buf: vec![0; buffer_size.max(1)],
            cursor: 0,
            start_pos: 0,
            context: None,
        }
    }

    /// Attaches context to failure messages ("writing <context>: ...").
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn sink(&self) -> &T {
        &self.dest
    }

    fn fail_io(&mut self, operation: &str, error: io::Error) -> bool {
        let mut status = Status::from(error).annotate(format!("{operation} failed"));
        if let Some(context) = &self.context {
            status = status.annotate(format!("writing {context}"));
        }
        self.state.fail(status)
    }

    fn fail_overflow(&mut self) -> bool {
        let status = Status::resource_exhausted("Writer position overflows");
        match &self.context {
            Some(context) => {
                let annotated = status.annotate(format!("writing {context}"));
                self.state.fail(annotated)
            }
            None => self.state.fail(status),
        }
    }

    /// Hands `src` to the sink, looping over short writes and retrying
    /// interrupted ones. `start_pos` advances by what the sink accepted,
    /// even on failure, so the caller can observe the delivered prefix.
    fn write_to_sink(&mut self, src: &[u8]) -> bool {
        let mut written = 0;
        while written < src.len() {
            match self.dest.write(&src[written..]) {
                Ok(0) => {
                    self.start_pos += written as Position;
                    return self.fail_io("write()", io::ErrorKind::WriteZero.into());
                }
                Ok(n) => written += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.start_pos += written as Position;
                    return self.fail_io("write()", e);
                }
            }
        }
        self.start_pos += written as Position;
        true
    }

    /// Sync-buffer: publishes the window contents into the sink.
    fn write_out(&mut self) -> bool {
        if self.cursor == 0 {
            return true;
        }
        let cursor = std::mem::replace(&mut self.cursor, 0);
        let buf = std::mem::take(&mut self.buf);
        let ok = self.write_to_sink(&buf[..cursor]);
        self.buf = buf;
        ok
    }
}

impl BufferedWriter<File> {
    /// Creates `path` (truncating) behind a buffered writer annotated with
    /// the path.
    pub fn create(path: impl AsRef<Path>) -> Result<Self, Status> {
        let path = path.as_ref();
        let file = File::create(path)
            .map_err(|e| Status::from(e).annotate(format!("opening {}", path.display())))?;
        debug!(path = %path.display(), "opened file sink");
        Ok(Self::new(file).with_context(path.display().to_string()))
    }

    /// Opens `path` for appending. The writer's position starts at 0
    /// relative to its own stream, as with any stream sink.
    pub fn append(path: impl AsRef<Path>) -> Result<Self, Status> {
        let path = path.as_ref();
        let file = File::options()
            .append(true)
            .create(true)
            .open(path)
            .map_err(|e| Status::from(e).annotate(format!("opening {}", path.display())))?;
        debug!(path = %path.display(), "opened file sink for append");
        Ok(Self::new(file).with_context(path.display().to_string()))
    }
}

/// Buffered writer over a file, the usual end of a stack that leaves the
/// process.
pub type FileWriter = BufferedWriter<File>;

impl<T: Sink> Writer for BufferedWriter<T> {
    fn push(&mut self, min_length: usize, _recommended_length: usize) -> bool {
        if !self.state.check_open() {
            return false;
        }
        if self.buf.len() - self.cursor >= min_length {
            return true;
        }
        if !self.write_out() {
            return false;
        }
        if self.buf.len() < min_length {
            self.buf.resize(min_length, 0);
        }
        true
    }

    fn chunk_mut(&mut self) -> &mut [u8] {
        &mut self.buf[self.cursor..]
    }

    fn advance(&mut self, len: usize) {
        debug_assert!(len <= self.buf.len() - self.cursor);
        self.cursor += len;
    }

    fn available(&self) -> usize {
        self.buf.len() - self.cursor
    }

    fn write(&mut self, src: &[u8]) -> bool {
        if !self.state.check_open() {
            return false;
        }
        if (Position::MAX - self.pos()) < src.len() as u64 {
            return self.fail_overflow();
        }
        if src.len() <= self.buf.len() - self.cursor {
            self.buf[self.cursor..self.cursor + src.len()].copy_from_slice(src);
            self.cursor += src.len();
            return true;
        }
        if !self.write_out() {
            return false;
        }
        if src.len() >= self.buf.len() {
            // Large writes bypass the window entirely.
            return self.write_to_sink(src);
        }
        self.buf[..src.len()].copy_from_slice(src);
        self.cursor = src.len();
        true
    }

    fn write_zeros(&mut self, len: u64) -> bool {
        if (Position::MAX - self.pos()) < len {
            return self.fail_overflow();
        }
        write_zeros_via_push(self, len)
    }

    fn flush(&mut self, scope: FlushScope) -> bool {
        if !self.state.check_open() {
            return false;
        }
        if !self.write_out() {
            return false;
        }
        match scope {
            FlushScope::FromObject => true,
            FlushScope::FromProcess => match self.dest.flush() {
                Ok(()) => true,
                Err(e) => self.fail_io("flush()", e),
            },
            FlushScope::FromMachine => {
                if let Err(e) = self.dest.flush() {
                    return self.fail_io("flush()", e);
                }
                match self.dest.sync() {
                    Ok(()) => true,
                    Err(e) => {
                        warn!(error = %e, "sync to stable storage failed");
                        // Some platforms report sync failures with no error
                        // code; the delivered bytes stay delivered either way.
                        self.fail_io("sync()", e)
                    }
                }
            }
        }
    }

    fn close(&mut self) -> bool {
        if self.state.is_open() {
            self.write_out();
            self.state.mark_closed();
        }
        self.state.healthy()
    }

    fn pos(&self) -> Position {
        self.start_pos + self.cursor as Position
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

    fn seek(&mut self, _new_pos: Position) -> bool {
        self.state
            .fail(Status::unimplemented("BufferedWriter does not support seeking"))
    }

    fn size(&mut self) -> Option<Position> {
        self.state
            .fail(Status::unimplemented("BufferedWriter does not support size"));
        None
    }

    fn truncate(&mut self, _new_size: Position) -> bool {
        self.state
            .fail(Status::unimplemented("BufferedWriter does not support truncation"))
    }

    fn read_mode(&mut self, _initial_pos: Position) -> Option<BytesReader> {
        self.state
            .fail(Status::unimplemented("BufferedWriter does not support read mode"));
        None
    }
}

impl<T: Sink> Drop for BufferedWriter<T> {
    fn drop(&mut self) {
        if self.state.is_open() && !self.close() {
            debug!("dropping failed buffered writer");
        }
    }
}
