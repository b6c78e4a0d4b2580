//! Builds record chunks in the layout the decoder consumes.

use prost::Message;

use crate::chunk::{compress_body, Chunk, ChunkHeader, ChunkType, Compression};
use crate::status::Status;
use crate::varint;

/// Accumulates records, then packs them into one [`Chunk`]: an ascending
/// end-offset table followed by the concatenated record bytes, optionally
/// compressed as a whole.
#[derive(Debug, Default)]
pub struct ChunkEncoder {
    limits: Vec<usize>,
    values: Vec<u8>,
}

impl ChunkEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_record(&mut self, record: &[u8]) {
        self.values.extend_from_slice(record);
        self.limits.push(self.values.len());
    }

    pub fn add_message<M: Message>(&mut self, message: &M) {
        self.values.extend_from_slice(&message.encode_to_vec());
        self.limits.push(self.values.len());
    }

    pub fn num_records(&self) -> u64 {
        self.limits.len() as u64
    }

    pub fn values_size(&self) -> usize {
        self.values.len()
    }

    pub fn clear(&mut self) {
        self.limits.clear();
        self.values.clear();
    }

    /// Packs the accumulated records and clears the encoder.
    pub fn encode(&mut self, compression: Compression) -> Result<Chunk, Status> {
        let mut body = Vec::with_capacity(self.limits.len() + self.values.len());
        for &limit in &self.limits {
            varint::encode_u64(&mut body, limit as u64);
        }
        body.extend_from_slice(&self.values);
        let header = ChunkHeader {
            chunk_type: ChunkType::Records,
            decoded_data_size: body.len() as u64,
            num_records: self.num_records(),
        };
        let data = compress_body(&body, compression)?;
        self.clear();
        Ok(Chunk { header, data: data.into() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_encoder_produces_an_empty_chunk() {
        let chunk = ChunkEncoder::new().encode(Compression::None).unwrap();
        assert_eq!(chunk.header.num_records, 0);
        assert_eq!(chunk.header.decoded_data_size, 0);
        assert_eq!(chunk.decoded().unwrap().len(), 0);
    }

    #[test]
    fn offsets_are_cumulative_ends() {
        let mut encoder = ChunkEncoder::new();
        encoder.add_record(b"ab");
        encoder.add_record(b"");
        encoder.add_record(b"cde");
        assert_eq!(encoder.num_records(), 3);
        let chunk = encoder.encode(Compression::None).unwrap();
        assert_eq!(encoder.num_records(), 0);
        // Varints 2, 2, 5 then the 5 value bytes.
        assert_eq!(chunk.decoded().unwrap(), &b"\x02\x02\x05abcde"[..]);
    }
}
