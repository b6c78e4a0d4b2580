//! Framed-Snappy compression layer.
//!
//! [`FramedSnappyWriter`] appends to its destination a valid framed-Snappy
//! stream containing the bytes pushed to it, per the public framing format:
//! a 10-byte stream identifier followed by typed, length-prefixed chunks.
//! Compressed (`0x00`) and uncompressed (`0x01`) chunk payloads carry a
//! masked CRC-32C of the uncompressed block, which is at most 64 KiB.
//!
//! The writer accumulates at most one block between flushes; a block is
//! emitted compressed only when compression actually shrinks it. Pushes
//! larger than a block are served through a [`Scratch`] window and replayed
//! as multiple blocks. The writer emits no padding chunks; [`decode`]
//! tolerates padding and skippable chunks and rejects reserved ones.

use snap::raw::{Decoder, Encoder};

use crate::object::ObjectState;
use crate::reader::BytesReader;
use crate::status::Status;
use crate::writer::dest::Dest;
use crate::writer::pushable::Scratch;
use crate::writer::{write_zeros_via_push, FlushScope, Position, Writer};

/// `ff 06 00 00` + "sNaPpY": the chunk that starts every stream.
pub const STREAM_IDENTIFIER: [u8; 10] =
    [0xff, 0x06, 0x00, 0x00, 0x73, 0x4e, 0x61, 0x50, 0x70, 0x59];

/// Maximum uncompressed block carried by one chunk.
pub const MAX_BLOCK_SIZE: usize = 65536;

const CHUNK_COMPRESSED: u8 = 0x00;
const CHUNK_UNCOMPRESSED: u8 = 0x01;
const CHUNK_PADDING: u8 = 0xfe;
const CHUNK_IDENTIFIER: u8 = 0xff;
const MIN_SKIPPABLE: u8 = 0x80;

const CRC_MASK_DELTA: u32 = 0xa282_ead8;

/// Masks a CRC-32C the way the framing format stores it.
fn mask_crc(crc: u32) -> u32 {
    ((crc >> 15) | (crc << 17)).wrapping_add(CRC_MASK_DELTA)
}

// ── Writer ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct FramedSnappyOptions {
    /// Expected uncompressed size. Right-sizes the block buffer; a wrong
    /// hint costs only memory.
    pub size_hint: Option<Position>,
}

pub struct FramedSnappyWriter<D: Dest> {
    state: ObjectState,
    dest: D,
    /// Uncompressed block window; grows up to [`MAX_BLOCK_SIZE`].
    block: Vec<u8>,
    block_cap: usize,
    cursor: usize,
    /// Uncompressed bytes already encoded into the destination.
    flushed: Position,
    scratch: Scratch,
    encoder: Encoder,
    /// Destination position at construction, for error annotation.
    initial_compressed_pos: Position,
}

impl<D: Dest> FramedSnappyWriter<D> {
    pub fn new(dest: D, options: FramedSnappyOptions) -> Self {
        let initial_compressed_pos = dest.get().pos();
        let block_cap = options
            .size_hint
            .map(|hint| (hint as usize).clamp(1, MAX_BLOCK_SIZE))
            .unwrap_or(MAX_BLOCK_SIZE);
        let mut writer = Self {
            state: ObjectState::new(),
            dest,
            block: Vec::new(),
            block_cap,
            cursor: 0,
            flushed: 0,
            scratch: Scratch::new(),
            encoder: Encoder::new(),
            initial_compressed_pos,
        };
        if initial_compressed_pos == 0 && !writer.dest.get_mut().write(&STREAM_IDENTIFIER) {
            writer.fail_over_dest();
        }
        writer
    }

    pub fn inner(&self) -> &D::Target {
        self.dest.get()
    }

    /// Annotates failures with the destination position relative to where
    /// this stream started.
    fn fail_over_dest(&mut self) -> bool {
        let offset = self.dest.get().pos().saturating_sub(self.initial_compressed_pos);
        let status = self
            .dest
            .get()
            .status()
            .cloned()
            .unwrap_or_else(|| Status::unknown("destination writer failed"));
        self.state.fail(status.annotate(format!("at compressed byte {offset}")))
    }

    fn ensure_block(&mut self, wanted: usize) {
        let target = wanted.max(self.block.len()).max(self.block_cap).min(MAX_BLOCK_SIZE);
        if self.block.len() < target {
            self.block.resize(target, 0);
        }
    }

    /// Encodes the buffered block, leaving the window empty.
    ///
    /// Postcondition on success: `cursor == 0`.
    fn push_internal(&mut self) -> bool {
        debug_assert!(self.state.healthy());
        let n = self.cursor;
        if n == 0 {
            return true;
        }
        let crc = mask_crc(crc32c::crc32c(&self.block[..n]));
        let compressed = match self.encoder.compress_vec(&self.block[..n]) {
            Ok(compressed) => compressed,
            Err(e) => {
                return self
                    .state
                    .fail(Status::unknown(format!("snappy compression failed: {e}")))
            }
        };
        let (chunk_type, payload): (u8, &[u8]) = if compressed.len() < n {
            (CHUNK_COMPRESSED, &compressed)
        } else {
            (CHUNK_UNCOMPRESSED, &self.block[..n])
        };
        let len = 4 + payload.len();
        debug_assert!(len < 1 << 24);
        let header = [chunk_type, len as u8, (len >> 8) as u8, (len >> 16) as u8];
        let dest = self.dest.get_mut();
        if !dest.write(&header) || !dest.write(&crc.to_le_bytes()) || !dest.write(payload) {
            return self.fail_over_dest();
        }
        self.flushed += n as Position;
        self.cursor = 0;
        true
    }

    /// Replays scratch bytes through the block path.
    fn sync_scratch(&mut self) -> bool {
        if !self.scratch.is_active() {
            return true;
        }
        let bytes = self.scratch.take();
        self.write_blocks(&bytes)
    }

    fn write_blocks(&mut self, mut src: &[u8]) -> bool {
        while !src.is_empty() {
            self.ensure_block(src.len());
            if self.cursor == self.block.len() {
                if !self.push_internal() {
                    return false;
                }
                continue;
            }
            let n = src.len().min(self.block.len() - self.cursor);
            self.block[self.cursor..self.cursor + n].copy_from_slice(&src[..n]);
            self.cursor += n;
            src = &src[n..];
        }
        true
    }
}

impl<D: Dest> Writer for FramedSnappyWriter<D> {
    fn push(&mut self, min_length: usize, recommended_length: usize) -> bool {
        if !self.state.check_open() {
            return false;
        }
        if self.scratch.is_active() {
            if self.scratch.available() >= min_length {
                return true;
            }
            if !self.sync_scratch() {
                return false;
            }
        }
        if self.block.len() - self.cursor >= min_length {
            return true;
        }
        if min_length <= MAX_BLOCK_SIZE {
            if self.cursor > 0 && self.block.len() - self.cursor < min_length {
                if !self.push_internal() {
                    return false;
                }
            }
            self.ensure_block(min_length.max(recommended_length));
            true
        } else {
            if self.cursor > 0 && !self.push_internal() {
                return false;
            }
            self.scratch.begin(min_length);
            true
        }
    }

    fn chunk_mut(&mut self) -> &mut [u8] {
        if self.scratch.is_active() {
            self.scratch.chunk_mut()
        } else {
            &mut self.block[self.cursor..]
        }
    }

    fn advance(&mut self, len: usize) {
        if self.scratch.is_active() {
            self.scratch.advance(len);
        } else {
            debug_assert!(len <= self.block.len() - self.cursor);
            self.cursor += len;
        }
    }

    fn available(&self) -> usize {
        if self.scratch.is_active() {
            self.scratch.available()
        } else {
            self.block.len() - self.cursor
        }
    }

    fn write(&mut self, src: &[u8]) -> bool {
        if !self.state.check_open() {
            return false;
        }
        if !self.sync_scratch() {
            return false;
        }
        self.write_blocks(src)
    }

    fn write_zeros(&mut self, len: u64) -> bool {
        if !self.state.check_open() {
            return false;
        }
        if !self.sync_scratch() {
            return false;
        }
        write_zeros_via_push(self, len)
    }

    fn flush(&mut self, scope: FlushScope) -> bool {
        if !self.state.check_open() {
            return false;
        }
        if !self.sync_scratch() || !self.push_internal() {
            return false;
        }
        if scope != FlushScope::FromObject || self.dest.is_owning() {
            if !self.dest.get_mut().flush(scope) {
                return self.fail_over_dest();
            }
        }
        true
    }

    fn close(&mut self) -> bool {
        if self.state.is_open() {
            if self.state.healthy() && self.sync_scratch() {
                self.push_internal();
            }
            if self.dest.is_owning() && !self.dest.get_mut().close() {
                self.fail_over_dest();
            }
            self.state.mark_closed();
        }
        self.state.healthy()
    }

    fn pos(&self) -> Position {
        self.flushed + self.cursor as Position + self.scratch.written() as Position
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

    fn supports_read_mode(&self) -> bool {
        self.dest.get().supports_read_mode()
    }

    fn seek(&mut self, _new_pos: Position) -> bool {
        self.state
            .fail(Status::unimplemented("FramedSnappyWriter does not support seeking"))
    }

    fn size(&mut self) -> Option<Position> {
        self.state
            .fail(Status::unimplemented("FramedSnappyWriter does not support size"));
        None
    }

    fn truncate(&mut self, _new_size: Position) -> bool {
        self.state
            .fail(Status::unimplemented("FramedSnappyWriter does not support truncation"))
    }

    fn read_mode(&mut self, initial_pos: Position) -> Option<BytesReader> {
        if !self.state.check_open() {
            return None;
        }
        if !self.sync_scratch() || !self.push_internal() {
            return None;
        }
        let start = self.initial_compressed_pos;
        let mut inner = match self.dest.get_mut().read_mode(start) {
            Some(reader) => reader,
            None => {
                self.fail_over_dest();
                return None;
            }
        };
        let compressed = inner.read_to_end();
        match decode(&compressed) {
            Ok(decoded) => {
                let mut reader = BytesReader::new(decoded);
                reader.seek(initial_pos.min(reader.size()));
                Some(reader)
            }
            Err(status) => {
                self.state.fail(status.annotate("rereading compressed stream"));
                None
            }
        }
    }
}

impl<D: Dest> Drop for FramedSnappyWriter<D> {
    fn drop(&mut self) {
        if self.state.is_open() {
            self.close();
        }
    }
}

// ── Decoding ─────────────────────────────────────────────────────────────────

/// Decodes a complete framed-Snappy stream back to its uncompressed bytes.
///
/// Tolerates padding and skippable chunks and repeated stream identifiers;
/// rejects reserved unskippable chunk types, truncation, and blocks whose
/// checksum does not match.
pub fn decode(src: &[u8]) -> Result<Vec<u8>, Status> {
    let mut src = src;
    let mut out = Vec::new();
    let mut first = true;
    while !src.is_empty() {
        if src.len() < 4 {
            return Err(Status::data_loss("truncated chunk header"));
        }
        let chunk_type = src[0];
        let len = u32::from_le_bytes([src[1], src[2], src[3], 0]) as usize;
        src = &src[4..];
        if src.len() < len {
            return Err(Status::data_loss("truncated chunk"));
        }
        let payload = &src[..len];
        src = &src[len..];

        if first {
            if chunk_type != CHUNK_IDENTIFIER || payload != &STREAM_IDENTIFIER[4..] {
                return Err(Status::invalid_argument("missing stream identifier"));
            }
            first = false;
            continue;
        }
        match chunk_type {
            CHUNK_COMPRESSED => {
                if payload.len() < 4 {
                    return Err(Status::data_loss("chunk too short for its checksum"));
                }
                let stored = u32::from_le_bytes([payload[0], payload[1], payload[2], payload[3]]);
                let block = Decoder::new()
                    .decompress_vec(&payload[4..])
                    .map_err(|e| Status::data_loss(format!("corrupted snappy block: {e}")))?;
                if block.len() > MAX_BLOCK_SIZE {
                    return Err(Status::data_loss("uncompressed block exceeds 64 KiB"));
                }
                if mask_crc(crc32c::crc32c(&block)) != stored {
                    return Err(Status::data_loss("block checksum mismatch"));
                }
                out.extend_from_slice(&block);
            }
            CHUNK_UNCOMPRESSED => {
                if payload.len() < 4 {
                    return Err(Status::data_loss("chunk too short for its checksum"));
                }
                let stored = u32::from_le_bytes([payload[0], payload[1], payload[2], payload[3]]);
                let block = &payload[4..];
                if block.len() > MAX_BLOCK_SIZE {
                    return Err(Status::data_loss("uncompressed block exceeds 64 KiB"));
                }
                if mask_crc(crc32c::crc32c(block)) != stored {
                    return Err(Status::data_loss("block checksum mismatch"));
                }
                out.extend_from_slice(block);
            }
            CHUNK_IDENTIFIER => {
                if payload != &STREAM_IDENTIFIER[4..] {
                    return Err(Status::data_loss("malformed stream identifier"));
                }
            }
            CHUNK_PADDING => {}
            t if t >= MIN_SKIPPABLE => {}
            t => {
                return Err(Status::invalid_argument(format!(
                    "unsupported chunk type: 0x{t:02x}"
                )))
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::StatusKind;
    use crate::writer::dest::{Borrowed, Owned};
    use crate::writer::vec::VecWriter;

    fn compress_all(data: &[u8]) -> Vec<u8> {
        let mut inner = VecWriter::new();
        {
            let mut writer =
                FramedSnappyWriter::new(Borrowed(&mut inner), FramedSnappyOptions::default());
            assert!(writer.write(data));
            assert!(writer.close());
        }
        inner.into_vec()
    }

    #[test]
    fn empty_stream_is_just_the_identifier() {
        assert_eq!(compress_all(b""), STREAM_IDENTIFIER);
    }

    #[test]
    fn one_incompressible_byte_is_stored_literally() {
        let encoded = compress_all(b"A");
        assert_eq!(&encoded[..10], &STREAM_IDENTIFIER);
        // Uncompressed chunk: 4-byte checksum + the byte itself.
        assert_eq!(encoded[10], 0x01);
        assert_eq!(&encoded[11..14], &[0x05, 0x00, 0x00]);
        let expected_crc = mask_crc(crc32c::crc32c(b"A"));
        assert_eq!(&encoded[14..18], &expected_crc.to_le_bytes());
        assert_eq!(encoded[18], b'A');
        assert_eq!(encoded.len(), 19);
    }

    #[test]
    fn compressible_block_uses_the_compressed_chunk_type() {
        let data = vec![0u8; 4096];
        let encoded = compress_all(&data);
        assert_eq!(encoded[10], 0x00);
        assert_eq!(decode(&encoded).unwrap(), data);
    }

    #[test]
    fn round_trip_across_block_boundaries() {
        for size in [
            0,
            1,
            MAX_BLOCK_SIZE - 1,
            MAX_BLOCK_SIZE,
            MAX_BLOCK_SIZE + 1,
            3 * MAX_BLOCK_SIZE,
        ] {
            let data: Vec<u8> = (0..size).map(|i| i as u8).collect();
            let encoded = compress_all(&data);
            assert_eq!(decode(&encoded).unwrap(), data, "size {size}");
        }
    }

    #[test]
    fn block_size_plus_one_emits_two_chunks() {
        let data: Vec<u8> = (0..MAX_BLOCK_SIZE + 1).map(|i| i as u8).collect();
        let encoded = compress_all(&data);
        let mut rest = &encoded[10..];
        let mut chunks = 0;
        while !rest.is_empty() {
            let len = u32::from_le_bytes([rest[1], rest[2], rest[3], 0]) as usize;
            rest = &rest[4 + len..];
            chunks += 1;
        }
        assert_eq!(chunks, 2);
        assert_eq!(decode(&encoded).unwrap(), data);
    }

    #[test]
    fn oversized_push_goes_through_scratch() {
        let want = MAX_BLOCK_SIZE * 2 + 17;
        let mut inner = VecWriter::new();
        {
            let mut writer =
                FramedSnappyWriter::new(Borrowed(&mut inner), FramedSnappyOptions::default());
            assert!(writer.push(want, 0));
            assert!(writer.available() >= want);
            for (i, byte) in writer.chunk_mut()[..want].iter_mut().enumerate() {
                *byte = (i % 251) as u8;
            }
            writer.advance(want);
            assert_eq!(writer.pos(), want as Position);
            assert!(writer.close());
        }
        let decoded = decode(&inner.into_vec()).unwrap();
        let expected: Vec<u8> = (0..want).map(|i| (i % 251) as u8).collect();
        assert_eq!(decoded, expected);
    }

    #[test]
    fn size_hint_shrinks_the_first_block() {
        let mut inner = VecWriter::new();
        {
            let mut writer = FramedSnappyWriter::new(
                Borrowed(&mut inner),
                FramedSnappyOptions { size_hint: Some(8) },
            );
            assert!(writer.write(b"12345678"));
            assert!(writer.close());
        }
        assert_eq!(decode(&inner.into_vec()).unwrap(), b"12345678");
    }

    #[test]
    fn flush_between_writes_splits_blocks() {
        let mut inner = VecWriter::new();
        {
            let mut writer =
                FramedSnappyWriter::new(Borrowed(&mut inner), FramedSnappyOptions::default());
            assert!(writer.write(b"first"));
            assert!(writer.flush(FlushScope::FromObject));
            assert!(writer.flush(FlushScope::FromObject));
            assert!(writer.write(b"second"));
            assert!(writer.close());
        }
        assert_eq!(decode(&inner.into_vec()).unwrap(), b"firstsecond");
    }

    #[test]
    fn read_mode_round_trips_through_the_destination() {
        let mut writer =
            FramedSnappyWriter::new(Owned(VecWriter::new()), FramedSnappyOptions::default());
        assert!(writer.write(b"hello framed world"));
        assert!(writer.supports_read_mode());
        let mut reader = writer.read_mode(6).unwrap();
        assert_eq!(reader.read_to_end(), &b"framed world"[..]);
    }

    #[test]
    fn decode_tolerates_padding_and_skippable_chunks() {
        let mut encoded = compress_all(b"data");
        encoded.extend_from_slice(&[CHUNK_PADDING, 3, 0, 0, 9, 9, 9]);
        encoded.extend_from_slice(&[0x90, 1, 0, 0, 42]);
        assert_eq!(decode(&encoded).unwrap(), b"data");
    }

    #[test]
    fn decode_rejects_reserved_chunks_and_corruption() {
        let mut with_reserved = compress_all(b"data");
        with_reserved.extend_from_slice(&[0x42, 0, 0, 0]);
        assert_eq!(
            decode(&with_reserved).unwrap_err().kind(),
            StatusKind::InvalidArgument
        );

        let mut corrupted = compress_all(b"A");
        let last = corrupted.len() - 1;
        corrupted[last] ^= 0xff;
        assert_eq!(decode(&corrupted).unwrap_err().kind(), StatusKind::DataLoss);

        let full = compress_all(b"A");
        assert_eq!(decode(&full[..12]).unwrap_err().kind(), StatusKind::DataLoss);

        assert_eq!(
            decode(b"\x01\x05\x00\x00AAAAA").unwrap_err().kind(),
            StatusKind::InvalidArgument
        );
    }
}
