//! Iterates the records of one decoded chunk, with per-record recovery.
//!
//! One call to [`ChunkDecoder::reset`] consumes a chunk; records then come
//! back in order. Raw reads (slice, vector, [`Bytes`]) can reach the end
//! but never fail the decoder. Message reads parse the record under the
//! decoder's [`FieldFilter`]; an unparsable record latches a *data-loss*
//! failure that [`ChunkDecoder::recover`] can skip past.
//!
//! Invariants, preserved across every transition:
//! - the end-offset table is sorted non-decreasingly and its last entry
//!   equals the values-buffer size when it is non-empty;
//! - `index() <= num_records()`;
//! - the values cursor sits at the end offset of the previous record;
//! - a recoverable failure implies `!healthy()`.

use bytes::{Buf, Bytes};
use prost::Message;
use tracing::debug;

use crate::chunk::filter::FieldFilter;
use crate::chunk::{Chunk, ChunkType};
use crate::object::ObjectState;
use crate::reader::BytesReader;
use crate::status::Status;
use crate::varint;

pub struct ChunkDecoder {
    state: ObjectState,
    filter: FieldFilter,
    /// Record end offsets into the values buffer, ascending.
    limits: Vec<usize>,
    values: BytesReader,
    index: u64,
    /// Whether `recover()` applies to the latched failure.
    recoverable: bool,
}

impl ChunkDecoder {
    pub fn new() -> Self {
        Self::with_filter(FieldFilter::all())
    }

    pub fn with_filter(filter: FieldFilter) -> Self {
        Self {
            state: ObjectState::new(),
            filter,
            limits: Vec::new(),
            values: BytesReader::new(Bytes::new()),
            index: 0,
            recoverable: false,
        }
    }

    /// Returns to the empty, healthy state.
    pub fn clear(&mut self) {
        self.state = ObjectState::new();
        self.limits.clear();
        self.values = BytesReader::new(Bytes::new());
        self.index = 0;
        self.recoverable = false;
    }

    /// Parses `chunk` and positions at its first record. On failure the
    /// decoder is failed and empty.
    pub fn reset(&mut self, chunk: &Chunk) -> bool {
        self.clear();
        match self.parse(chunk) {
            Ok(()) => true,
            Err(status) => {
                debug!(status = %status, "chunk rejected");
                self.state.fail(status)
            }
        }
    }

    fn parse(&mut self, chunk: &Chunk) -> Result<(), Status> {
        match chunk.header.chunk_type {
            ChunkType::Records => {}
            ChunkType::FileSignature | ChunkType::Padding => {
                return Err(Status::invalid_argument("chunk carries no records"));
            }
            ChunkType::Other(byte) => {
                return Err(Status::invalid_argument(format!(
                    "unknown chunk type: 0x{byte:02x}"
                )));
            }
        }
        let body = chunk.decoded()?;
        let num_records = chunk.header.num_records;
        if num_records > body.len() as u64 {
            // Every record needs at least one offset byte.
            return Err(Status::invalid_argument("record count exceeds chunk size"));
        }
        let mut cursor = body.clone();
        let mut limits = Vec::with_capacity(num_records as usize);
        let mut previous = 0usize;
        for _ in 0..num_records {
            let limit = varint::decode_u64(&mut cursor)
                .ok_or_else(|| Status::invalid_argument("malformed record offset table"))?;
            let limit = usize::try_from(limit)
                .map_err(|_| Status::invalid_argument("record offset overflows"))?;
            if limit < previous {
                return Err(Status::invalid_argument("record offsets not sorted"));
            }
            previous = limit;
            limits.push(limit);
        }
        let values = cursor.copy_to_bytes(cursor.remaining());
        match limits.last() {
            Some(&last) if last != values.len() => {
                return Err(Status::invalid_argument(format!(
                    "final record offset {last} does not match the values size {}",
                    values.len()
                )));
            }
            None if !values.is_empty() => {
                return Err(Status::invalid_argument("values present without records"));
            }
            _ => {}
        }
        self.limits = limits;
        self.values = BytesReader::new(values);
        Ok(())
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn num_records(&self) -> u64 {
        self.limits.len() as u64
    }

    pub fn healthy(&self) -> bool {
        self.state.healthy()
    }

    pub fn status(&self) -> Option<&Status> {
        self.state.status()
    }

    /// Start and end of the record at `index`, advancing the cursor.
    fn next_record_bounds(&mut self) -> Option<(usize, usize)> {
        if self.index == self.num_records() || !self.state.healthy() {
            return None;
        }
        let start = self.values.pos() as usize;
        let limit = self.limits[self.index as usize];
        debug_assert!(start <= limit, "record end offsets not sorted");
        self.index += 1;
        Some((start, limit))
    }

    /// Borrows the next record's bytes. `None` at the chunk's end or after
    /// a failure; raw reads never create one.
    pub fn read_record_slice(&mut self) -> Option<&[u8]> {
        let (start, limit) = self.next_record_bounds()?;
        self.values.read_slice(limit - start)
    }

    /// Copies the next record into `dest`.
    pub fn read_record(&mut self, dest: &mut Vec<u8>) -> bool {
        match self.read_record_slice() {
            Some(record) => {
                dest.clear();
                dest.extend_from_slice(record);
                true
            }
            None => false,
        }
    }

    /// Returns the next record without copying.
    pub fn read_record_bytes(&mut self) -> Option<Bytes> {
        let (start, limit) = self.next_record_bounds()?;
        self.values.read_bytes(limit - start)
    }

    /// Parses the next record into `record` under the field filter.
    ///
    /// Returns `false` both at the chunk's end (`healthy()` stays true) and
    /// on an unparsable record, which latches a recoverable *data-loss*
    /// failure with the cursor already past the bad record.
    pub fn read_message<M: Message + Default>(&mut self, record: &mut M) -> bool {
        let Some((start, limit)) = self.next_record_bounds() else {
            return false;
        };
        let raw = match self.values.read_bytes(limit - start) {
            Some(raw) => raw,
            None => return false,
        };
        let parsed = if self.filter.is_all() {
            M::decode(raw)
        } else {
            self.filter
                .project(&raw)
                .and_then(|projected| M::decode(&projected[..]))
        };
        match parsed {
            Ok(message) => {
                *record = message;
                true
            }
            Err(e) => {
                self.state.fail(Status::data_loss(format!(
                    "record {} unparsable: {e}",
                    self.index - 1
                )));
                self.recoverable = true;
                false
            }
        }
    }

    /// Skips past an unparsable record, restoring health. Returns `false`
    /// when the latched failure (if any) was not an unparsable record.
    pub fn recover(&mut self) -> bool {
        if !self.recoverable {
            return false;
        }
        self.recoverable = false;
        self.state.recover();
        true
    }

    /// Repositions at record `index`, clamped to the record count.
    ///
    /// Precondition: `healthy()`.
    pub fn set_index(&mut self, index: u64) {
        debug_assert!(self.state.healthy());
        if !self.state.healthy() {
            return;
        }
        self.index = index.min(self.num_records());
        let start = if self.index == 0 {
            0
        } else {
            self.limits[self.index as usize - 1] as u64
        };
        self.values.seek(start);
    }
}

impl Default for ChunkDecoder {
    fn default() -> Self {
        Self::new()
    }
}
