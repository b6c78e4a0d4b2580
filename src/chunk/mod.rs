//! Record chunks: many records packed into one decodable unit.
//!
//! A chunk carries a small header (type, decoded payload size, record
//! count) and a payload. The payload starts with a one-byte compression id;
//! the body behind it is the record end-offset table (ascending unsigned
//! varints, one per record) followed by the contiguous values buffer.
//! [`encoder::ChunkEncoder`] produces this layout and
//! [`decoder::ChunkDecoder`] consumes it.

use std::io::{self, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use bytes::Bytes;

use crate::status::Status;

pub mod decoder;
pub mod encoder;
pub mod filter;

/// Zstd level for chunk bodies; framing keeps chunks small enough that a
/// mid-range level is the right trade.
const ZSTD_LEVEL: i32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkType {
    /// A chunk holding records.
    Records,
    /// The stream's leading signature chunk; holds no records.
    FileSignature,
    /// Alignment filler; holds no records.
    Padding,
    Other(u8),
}

impl ChunkType {
    pub fn byte(self) -> u8 {
        match self {
            ChunkType::Records => b'r',
            ChunkType::FileSignature => b's',
            ChunkType::Padding => b'p',
            ChunkType::Other(byte) => byte,
        }
    }
}

impl From<u8> for ChunkType {
    fn from(byte: u8) -> Self {
        match byte {
            b'r' => ChunkType::Records,
            b's' => ChunkType::FileSignature,
            b'p' => ChunkType::Padding,
            other => ChunkType::Other(other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    None,
    Snappy,
    Zstd,
}

impl Compression {
    pub fn byte(self) -> u8 {
        match self {
            Compression::None => 0,
            Compression::Snappy => 1,
            Compression::Zstd => 2,
        }
    }

    fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Compression::None),
            1 => Some(Compression::Snappy),
            2 => Some(Compression::Zstd),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChunkHeader {
    pub chunk_type: ChunkType,
    /// Payload body size after decompression.
    pub decoded_data_size: u64,
    pub num_records: u64,
}

impl ChunkHeader {
    pub fn write<W: Write>(&self, mut writer: W) -> io::Result<()> {
        writer.write_u8(self.chunk_type.byte())?;
        writer.write_u64::<LittleEndian>(self.decoded_data_size)?;
        writer.write_u64::<LittleEndian>(self.num_records)?;
        Ok(())
    }

    pub fn read<R: Read>(mut reader: R) -> io::Result<Self> {
        let chunk_type = ChunkType::from(reader.read_u8()?);
        let decoded_data_size = reader.read_u64::<LittleEndian>()?;
        let num_records = reader.read_u64::<LittleEndian>()?;
        Ok(Self { chunk_type, decoded_data_size, num_records })
    }
}

#[derive(Debug, Clone)]
pub struct Chunk {
    pub header: ChunkHeader,
    /// Compression id byte followed by the (possibly compressed) body.
    pub data: Bytes,
}

impl Chunk {
    /// Decompresses the payload body and checks it against the header's
    /// decoded size.
    pub fn decoded(&self) -> Result<Bytes, Status> {
        let Some((&compression, body)) = self.data.split_first() else {
            return Err(Status::invalid_argument("chunk payload is empty"));
        };
        let Some(compression) = Compression::from_byte(compression) else {
            return Err(Status::invalid_argument(format!(
                "unknown compression id: {compression}"
            )));
        };
        let decoded = match compression {
            Compression::None => self.data.slice(1..),
            Compression::Snappy => snap::raw::Decoder::new()
                .decompress_vec(body)
                .map_err(|e| Status::data_loss(format!("corrupted snappy body: {e}")))?
                .into(),
            Compression::Zstd => zstd::decode_all(body)
                .map_err(|e| Status::data_loss(format!("corrupted zstd body: {e}")))?
                .into(),
        };
        if decoded.len() as u64 != self.header.decoded_data_size {
            return Err(Status::data_loss(format!(
                "decoded chunk size {} does not match the header's {}",
                decoded.len(),
                self.header.decoded_data_size
            )));
        }
        Ok(decoded)
    }
}

pub(crate) fn compress_body(body: &[u8], compression: Compression) -> Result<Vec<u8>, Status> {
    let mut data = Vec::with_capacity(1 + body.len());
    data.push(compression.byte());
    match compression {
        Compression::None => data.extend_from_slice(body),
        Compression::Snappy => {
            let compressed = snap::raw::Encoder::new()
                .compress_vec(body)
                .map_err(|e| Status::unknown(format!("snappy compression failed: {e}")))?;
            data.extend_from_slice(&compressed);
        }
        Compression::Zstd => {
            let compressed = zstd::encode_all(body, ZSTD_LEVEL)
                .map_err(|e| Status::unknown(format!("zstd compression failed: {e}")))?;
            data.extend_from_slice(&compressed);
        }
    }
    Ok(data)
}
