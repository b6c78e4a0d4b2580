//! Projection of records onto a set of top-level proto field numbers.
//!
//! A filter restricts which fields survive when a record is parsed into a
//! message; raw-byte reads ignore it. Projection rewrites the record's wire
//! bytes, keeping the byte spans of included fields and skipping the rest,
//! so excluded data is never materialized into the message.

use bytes::Buf;
use prost::encoding::{decode_key, skip_field, DecodeContext};
use prost::DecodeError;

#[derive(Debug, Clone, Default)]
pub struct FieldFilter {
    /// `None` keeps every field.
    fields: Option<Vec<u32>>,
}

impl FieldFilter {
    /// Keeps all fields; projection becomes the identity.
    pub fn all() -> Self {
        Self { fields: None }
    }

    /// Keeps only the given top-level field numbers.
    pub fn fields<I: IntoIterator<Item = u32>>(fields: I) -> Self {
        let mut fields: Vec<u32> = fields.into_iter().collect();
        fields.sort_unstable();
        fields.dedup();
        Self { fields: Some(fields) }
    }

    pub fn is_all(&self) -> bool {
        self.fields.is_none()
    }

    pub fn includes(&self, field: u32) -> bool {
        match &self.fields {
            None => true,
            Some(fields) => fields.binary_search(&field).is_ok(),
        }
    }

    /// Rewrites `record`, dropping top-level fields outside the filter.
    /// Fails iff the wire data is malformed.
    pub(crate) fn project(&self, record: &[u8]) -> Result<Vec<u8>, DecodeError> {
        let mut cursor = record;
        let mut out = Vec::with_capacity(record.len());
        while cursor.has_remaining() {
            let before = record.len() - cursor.remaining();
            let (tag, wire_type) = decode_key(&mut cursor)?;
            skip_field(wire_type, tag, &mut cursor, DecodeContext::default())?;
            let after = record.len() - cursor.remaining();
            if self.includes(tag) {
                out.extend_from_slice(&record[before..after]);
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost::Message;

    #[derive(Clone, PartialEq, Message)]
    struct Sample {
        #[prost(uint64, tag = "1")]
        id: u64,
        #[prost(string, tag = "2")]
        name: String,
        #[prost(bytes = "vec", tag = "3")]
        payload: Vec<u8>,
    }

    fn sample() -> Sample {
        Sample { id: 9, name: "nine".into(), payload: vec![1, 2, 3] }
    }

    #[test]
    fn all_is_identity() {
        let encoded = sample().encode_to_vec();
        let projected = FieldFilter::all().project(&encoded).unwrap();
        assert_eq!(projected, encoded);
    }

    #[test]
    fn projection_drops_excluded_fields() {
        let encoded = sample().encode_to_vec();
        let projected = FieldFilter::fields([1, 3]).project(&encoded).unwrap();
        let decoded = Sample::decode(&projected[..]).unwrap();
        assert_eq!(decoded.id, 9);
        assert_eq!(decoded.name, "");
        assert_eq!(decoded.payload, vec![1, 2, 3]);
    }

    #[test]
    fn malformed_wire_data_is_rejected() {
        // Field 1, wire type 2 (length-delimited), declared length 200 with
        // no bytes behind it.
        let bogus = [0x0a, 0xc8, 0x01];
        assert!(FieldFilter::fields([1]).project(&bogus).is_err());
    }
}
